//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where recorded sessions are stored.
    pub sessions_dir: PathBuf,

    /// Default render parameters.
    pub render: RenderDefaults,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default render parameters applied when the CLI flags leave them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderDefaults {
    /// Prefer the HEVC codec family over H.264.
    pub use_hevc: bool,

    /// Transcribe audio and burn captions into the output.
    pub captions: bool,

    /// Whisper model used for transcription.
    pub whisper_model: String,

    /// Duration cap (seconds) applied by preview/test renders.
    pub preview_limit_secs: f64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "castweld=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            sessions_dir: dirs_default_sessions(),
            render: RenderDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            use_hevc: false,
            captions: false,
            whisper_model: "base".to_string(),
            preview_limit_secs: 60.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("castweld").join("config.json")
}

/// Default sessions directory.
fn dirs_default_sessions() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("castweld").join("sessions")
}
