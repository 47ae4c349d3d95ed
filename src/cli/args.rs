//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// LabScribe - turn lab recordings into step-by-step procedures
#[derive(Parser, Debug)]
#[command(name = "labscribe")]
#[command(version)]
#[command(about = "Turn lab recordings into structured procedures using Google Gemini")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP job service
    Serve(ServeArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Options of `labscribe serve`. Unset flags fall back to env, then config file.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to listen on (e.g., 127.0.0.1:8080)
    #[arg(short = 'b', long, value_name = "ADDR")]
    pub bind: Option<String>,

    /// Directory for uploaded media awaiting transcription (in memory if unset)
    #[arg(long, value_name = "DIR")]
    pub blob_dir: Option<PathBuf>,

    /// Directory for the job journal used by restart recovery (in memory if unset)
    #[arg(long, value_name = "DIR")]
    pub journal_dir: Option<PathBuf>,

    /// Largest accepted upload (e.g., 200MB, 1GB)
    #[arg(long, value_name = "SIZE")]
    pub max_upload: Option<String>,

    /// Use scripted transcription and extraction instead of Gemini
    #[arg(long)]
    pub fake_backend: bool,

    /// Verbose logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api_key",
    "transcription_model",
    "extraction_model",
    "bind",
    "max_upload",
    "upload_timeout",
    "transcription_timeout",
    "extraction_timeout",
    "cancel_timeout",
    "result_ttl",
    "collected_grace",
    "max_concurrent_jobs",
    "blob_dir",
    "journal_dir",
    "weights.transcribing_start",
    "weights.extracting_start",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
