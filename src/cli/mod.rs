//! CLI layer - Command-line interface
//!
//! Argument parsing, output formatting, signal handling and the `serve` runner.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod presenter;
pub mod signals;

pub use app::{run_serve, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction, ServeArgs};
pub use presenter::Presenter;
