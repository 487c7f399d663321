//! Error types for the crate.
//!
//! The rendering pipeline itself never fails: completion, conversion and
//! sanitization degrade to literal text instead of raising. Errors only
//! arise at the edges: configuration we cannot use, or a listener that
//! cannot bind.

use thiserror::Error;

/// Crate error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Typing animation parameters are unusable.
    #[error("Invalid typing configuration: {0}")]
    InvalidTyping(String),

    /// Command line arguments could not be parsed.
    #[error("Invalid command line: {0}")]
    Cli(#[from] clap::Error),

    /// Layered configuration could not be built or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O failure while hosting the pipeline.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
