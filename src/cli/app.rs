//! `serve` runner: wires configuration, adapters and the HTTP server

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::api::{self, AppState};
use crate::application::jobs::{Capabilities, EngineSettings, JobManager};
use crate::application::ports::{BlobStore, ConfigStore, Extractor, JobJournal, Transcriber};
use crate::domain::config::AppConfig;
use crate::infrastructure::{
    FsBlobStore, FsJournal, GeminiClient, GeminiExtractor, GeminiTranscriber, InMemoryBlobStore,
    InMemoryJournal, ScriptedExtractor, ScriptedTranscriber, XdgConfigStore,
};

use super::args::ServeArgs;
use super::presenter::Presenter;
use super::signals::shutdown_signal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

pub const ENV_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_BIND: &str = "LABSCRIBE_BIND";

/// How often expired and stalled jobs are swept
const SWEEP_INTERVAL: StdDuration = StdDuration::from_secs(30);

/// Install the tracing subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "labscribe=debug,tower_http=debug"
    } else {
        "labscribe=info,tower_http=info"
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .try_init();
}

/// Configuration supplied on the command line
pub fn cli_config(args: &ServeArgs) -> AppConfig {
    AppConfig {
        bind: args.bind.clone(),
        max_upload: args.max_upload.clone(),
        blob_dir: args.blob_dir.as_ref().map(|p| p.to_string_lossy().to_string()),
        journal_dir: args.journal_dir.as_ref().map(|p| p.to_string_lossy().to_string()),
        ..Default::default()
    }
}

/// Configuration supplied through the environment
pub fn env_config() -> AppConfig {
    AppConfig {
        api_key: env::var(ENV_API_KEY).ok().filter(|s| !s.is_empty()),
        bind: env::var(ENV_BIND).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %store.path().display(), error = %e, "Ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

/// Build the capability adapters for a merged configuration
pub fn build_capabilities(config: &AppConfig, fake_backend: bool) -> Result<Capabilities, String> {
    let blobs: Arc<dyn BlobStore> = match &config.blob_dir {
        Some(dir) => Arc::new(FsBlobStore::new(PathBuf::from(dir))),
        None => Arc::new(InMemoryBlobStore::new()),
    };
    let journal: Arc<dyn JobJournal> = match &config.journal_dir {
        Some(dir) => Arc::new(FsJournal::new(PathBuf::from(dir))),
        None => Arc::new(InMemoryJournal::new()),
    };

    let (transcriber, extractor): (Arc<dyn Transcriber>, Arc<dyn Extractor>) = if fake_backend {
        (
            Arc::new(ScriptedTranscriber::default()),
            Arc::new(ScriptedExtractor::default()),
        )
    } else {
        let api_key = config.api_key.clone().ok_or_else(|| {
            format!(
                "Missing API key. Set {} environment variable, run 'labscribe config set api_key <key>', or pass --fake-backend",
                ENV_API_KEY
            )
        })?;
        let client = GeminiClient::new(api_key);
        (
            Arc::new(GeminiTranscriber::with_model(
                client.clone(),
                config.transcription_model_or_default(),
            )),
            Arc::new(GeminiExtractor::with_model(
                client,
                config.extraction_model_or_default(),
            )),
        )
    };

    Ok(Capabilities {
        blobs,
        transcriber,
        extractor,
        journal,
    })
}

/// Run the HTTP job service until a shutdown signal arrives
pub async fn run_serve(args: ServeArgs) -> ExitCode {
    let presenter = Presenter::new();
    init_tracing(args.verbose);

    let config = load_merged_config(cli_config(&args)).await;

    if let Some(raw) = &config.max_upload {
        if let Err(e) = raw.parse::<crate::domain::units::ByteSize>() {
            presenter.error(&format!("Invalid max-upload: {}", e));
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    }
    let settings = match EngineSettings::from_config(&config) {
        Ok(settings) => settings,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_USAGE_ERROR);
        }
    };
    let capabilities = match build_capabilities(&config, args.fake_backend) {
        Ok(capabilities) => capabilities,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let manager = JobManager::new(settings.clone(), capabilities);
    match manager.recover().await {
        Ok(report) => presenter.recovery(&report),
        Err(e) => {
            presenter.error(&format!("Startup recovery failed: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    }

    let bind = config.bind_or_default().to_string();
    let listener = match tokio::net::TcpListener::bind(&bind).await {
        Ok(listener) => listener,
        Err(e) => {
            presenter.error(&format!("Failed to bind {}: {}", bind, e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let stop = CancellationToken::new();
    let sweeper = tokio::spawn(sweep_expired(manager.clone(), stop.clone()));

    let backend = if args.fake_backend { "scripted" } else { "gemini" };
    presenter.serving(&bind, backend, settings.max_upload);
    tracing::info!(bind = %bind, backend, "Server started");

    let app = api::router(AppState::new(manager.clone()));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    stop.cancel();
    let _ = sweeper.await;
    manager.shutdown().await;

    match served {
        Ok(()) => {
            presenter.success("Server stopped");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&format!("Server error: {}", e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Periodic retention sweep
async fn sweep_expired(manager: JobManager, stop: CancellationToken) {
    let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                manager.evict_expired().await;
            }
        }
    }
}
