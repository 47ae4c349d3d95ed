//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, WeightsConfig};
use crate::domain::error::ConfigError;
use crate::domain::units::{ByteSize, Duration};

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;

    // Weight boundaries are only valid as a pair
    config.weights_or_default().map_err(|e| ConfigError::ValidationError {
        key: key.to_string(),
        message: e.to_string(),
    })?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;

    let config = store.load().await?;
    match read_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in VALID_CONFIG_KEYS {
        let value = read_value(&config, key);
        presenter.key_value(key, value.as_deref().unwrap_or(NOT_SET));
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_known_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "upload_timeout" | "transcription_timeout" | "extraction_timeout" | "cancel_timeout"
        | "result_ttl" | "collected_grace" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "max_upload" => {
            value
                .parse::<ByteSize>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "max_concurrent_jobs" => {
            parse_positive(value).map_err(|_| invalid(key, "Value must be a positive integer"))?;
        }
        "weights.transcribing_start" | "weights.extracting_start" => {
            parse_percent(value).map_err(|_| invalid(key, "Value must be a percent between 1 and 99"))?;
        }
        "bind" => {
            value
                .parse::<std::net::SocketAddr>()
                .map_err(|_| invalid(key, format!("Invalid address '{}'. Expected host:port", value)))?;
        }
        "api_key" | "transcription_model" | "extraction_model" | "blob_dir" | "journal_dir" => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Value must not be empty"));
            }
        }
        _ => {}
    }
    Ok(())
}

fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    let text = Some(value.to_string());
    match key {
        "api_key" => config.api_key = text,
        "transcription_model" => config.transcription_model = text,
        "extraction_model" => config.extraction_model = text,
        "bind" => config.bind = text,
        "max_upload" => config.max_upload = text,
        "upload_timeout" => config.upload_timeout = text,
        "transcription_timeout" => config.transcription_timeout = text,
        "extraction_timeout" => config.extraction_timeout = text,
        "cancel_timeout" => config.cancel_timeout = text,
        "result_ttl" => config.result_ttl = text,
        "collected_grace" => config.collected_grace = text,
        "max_concurrent_jobs" => {
            config.max_concurrent_jobs =
                Some(parse_positive(value).map_err(|_| invalid(key, "Value must be a positive integer"))?)
        }
        "blob_dir" => config.blob_dir = text,
        "journal_dir" => config.journal_dir = text,
        "weights.transcribing_start" | "weights.extracting_start" => {
            let percent = parse_percent(value)
                .map_err(|_| invalid(key, "Value must be a percent between 1 and 99"))?;
            let weights = config.weights.get_or_insert_with(WeightsConfig::default);
            if key == "weights.transcribing_start" {
                weights.transcribing_start = Some(percent);
            } else {
                weights.extracting_start = Some(percent);
            }
        }
        _ => return Err(invalid(key, "Unknown key")),
    }
    Ok(())
}

fn read_value(config: &AppConfig, key: &str) -> Option<String> {
    let weights = config.weights.as_ref();
    match key {
        "api_key" => config.api_key.as_deref().map(mask_api_key),
        "transcription_model" => config.transcription_model.clone(),
        "extraction_model" => config.extraction_model.clone(),
        "bind" => config.bind.clone(),
        "max_upload" => config.max_upload.clone(),
        "upload_timeout" => config.upload_timeout.clone(),
        "transcription_timeout" => config.transcription_timeout.clone(),
        "extraction_timeout" => config.extraction_timeout.clone(),
        "cancel_timeout" => config.cancel_timeout.clone(),
        "result_ttl" => config.result_ttl.clone(),
        "collected_grace" => config.collected_grace.clone(),
        "max_concurrent_jobs" => config.max_concurrent_jobs.map(|n| n.to_string()),
        "blob_dir" => config.blob_dir.clone(),
        "journal_dir" => config.journal_dir.clone(),
        "weights.transcribing_start" => weights
            .and_then(|w| w.transcribing_start)
            .map(|p| p.to_string()),
        "weights.extracting_start" => weights
            .and_then(|w| w.extracting_start)
            .map(|p| p.to_string()),
        _ => None,
    }
}

fn parse_positive(value: &str) -> Result<usize, ()> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(()),
    }
}

fn parse_percent(value: &str) -> Result<u8, ()> {
    match value.trim().parse::<u8>() {
        Ok(p) if (1..100).contains(&p) => Ok(p),
        _ => Err(()),
    }
}

/// Mask API key for display (show first 4 and last 4 chars)
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::XdgConfigStore;

    #[test]
    fn mask_api_key_long() {
        assert_eq!(mask_api_key("abcdefghijklmnop"), "abcd...mnop");
    }

    #[test]
    fn mask_api_key_short() {
        assert_eq!(mask_api_key("short"), "*****");
    }

    #[test]
    fn validate_durations() {
        assert!(validate_config_value("result_ttl", "2h").is_ok());
        assert!(validate_config_value("cancel_timeout", "2m30s").is_ok());
        assert!(validate_config_value("transcription_timeout", "soon").is_err());
    }

    #[test]
    fn validate_sizes_and_counts() {
        assert!(validate_config_value("max_upload", "512KB").is_ok());
        assert!(validate_config_value("max_upload", "lots").is_err());
        assert!(validate_config_value("max_concurrent_jobs", "8").is_ok());
        assert!(validate_config_value("max_concurrent_jobs", "0").is_err());
    }

    #[test]
    fn validate_bind_and_weights() {
        assert!(validate_config_value("bind", "0.0.0.0:8080").is_ok());
        assert!(validate_config_value("bind", "localhost").is_err());
        assert!(validate_config_value("weights.extracting_start", "85").is_ok());
        assert!(validate_config_value("weights.extracting_start", "100").is_err());
    }

    #[test]
    fn read_value_masks_api_key() {
        let config = AppConfig {
            api_key: Some("AIzaSyExampleKey1234".to_string()),
            ..Default::default()
        };
        assert_eq!(read_value(&config, "api_key").as_deref(), Some("AIza...1234"));
    }

    #[tokio::test]
    async fn set_then_get_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        handle_set(&store, &presenter, "weights.transcribing_start", "15").await.unwrap();
        handle_set(&store, &presenter, "result_ttl", "30m").await.unwrap();

        let config = store.load().await.unwrap();
        assert_eq!(config.result_ttl.as_deref(), Some("30m"));
        assert_eq!(read_value(&config, "weights.transcribing_start").as_deref(), Some("15"));
    }

    #[tokio::test]
    async fn set_rejects_inverted_weights() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));
        let presenter = Presenter::new();

        let err = handle_set(&store, &presenter, "weights.transcribing_start", "90")
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn unknown_key_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = XdgConfigStore::with_path(dir.path().join("config.toml"));

        let err = handle_get(&store, &Presenter::new(), "duration").await.unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { .. }));
    }
}
