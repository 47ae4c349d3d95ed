//! Unit value objects used by configuration

mod byte_size;
mod duration;

pub use byte_size::ByteSize;
pub use duration::Duration;
