//! Error types shared across Castweld crates.

use std::path::PathBuf;

/// Top-level error type for Castweld operations.
#[derive(Debug, thiserror::Error)]
pub enum CastweldError {
    #[error("Session error: {message}")]
    Session { message: String },

    #[error("Cursor sample error: {message}")]
    Samples { message: String },

    #[error("Expression error: {message}")]
    Expression { message: String },

    #[error("Engine error: {message}")]
    Engine { message: String },

    #[error("Caption error: {message}")]
    Captions { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using CastweldError.
pub type CastweldResult<T> = Result<T, CastweldError>;

impl CastweldError {
    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session {
            message: msg.into(),
        }
    }

    pub fn samples(msg: impl Into<String>) -> Self {
        Self::Samples {
            message: msg.into(),
        }
    }

    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression {
            message: msg.into(),
        }
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine {
            message: msg.into(),
        }
    }

    pub fn captions(msg: impl Into<String>) -> Self {
        Self::Captions {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}
