//! Errors of host-side operations (project loading, configuration)
//!
//! Engine operations themselves never fail: missing blocks, unknown
//! opcodes and rejected promises are handled inside the scheduler.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid project file: {0}")]
    ProjectParse(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("failed to render configuration: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("unknown target: {0}")]
    UnknownTarget(String),

    #[error("duplicate target: {0}")]
    DuplicateTarget(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
