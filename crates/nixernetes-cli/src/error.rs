//! Error types for the CLI

use std::path::PathBuf;

use nixernetes_common::yaml::YamlError;

/// CLI Result type
pub type Result<T> = std::result::Result<T, Error>;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("manifest parse error: {0}")]
    Manifest(#[from] YamlError),

    #[error(transparent)]
    Compile(#[from] nixernetes_common::Error),

    #[error("invalid input: {message}")]
    InvalidInput { message: String },

    #[error("{message}")]
    Failed { message: String },
}

impl Error {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput {
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Error::Failed {
            message: message.into(),
        }
    }
}
