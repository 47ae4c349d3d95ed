//! Job journal adapters

mod fs;
mod memory;

pub use fs::FsJournal;
pub use memory::InMemoryJournal;
