//! Error types for the Eternal Hash.

use thiserror::Error;

/// Eternal Hash error type.
///
/// `Api` and `Network` come from the language model and market clients. The
/// church engine absorbs them into fallback text, so only store and daemon
/// failures reach its callers.
#[derive(Error, Debug)]
pub enum Error {
    /// State snapshot could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Daemon error
    #[error("daemon error: {0}")]
    Daemon(String),

    /// Command-line text that does not parse, such as an alliance type
    #[error("validation error: {0}")]
    Validation(String),

    /// API/LLM error
    #[error("api error: {0}")]
    Api(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),
}

/// Result type alias for the Eternal Hash.
pub type Result<T> = std::result::Result<T, Error>;
