//! Error types for the stim_core library.

use std::io;
use std::path::PathBuf;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for stim_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dose amount outside of (0, max]
    #[error("Invalid amount {amount}mg: dose must be greater than 0 and at most {max}mg")]
    InvalidAmount { amount: f64, max: f64 },

    /// A numeric argument could not be used
    #[error("Invalid numeric input: {0}")]
    InvalidNumericInput(String),

    /// The dose store exists but cannot be decoded
    #[error("Malformed store file {}: {reason}", path.display())]
    MalformedStore { path: PathBuf, reason: String },
}
