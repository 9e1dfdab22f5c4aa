//! Error types for the tree parameter layer
//!
//! The numeric core never fails; only configuration loading, monotone
//! constraint parsing and dataset input report errors.

use thiserror::Error;

/// Errors returned while building or validating training parameters.
#[derive(Debug, Error)]
pub enum TreeParamError {
    /// A parameter is outside its declared range
    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// Monotone constraint text could not be parsed
    #[error("invalid monotone constraints: {0}")]
    MonotoneParse(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration error
    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Gradient dataset error
    #[error("dataset error: {0}")]
    Dataset(String),
}

impl TreeParamError {
    pub(crate) fn invalid(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for tree parameter operations
pub type Result<T> = std::result::Result<T, TreeParamError>;
