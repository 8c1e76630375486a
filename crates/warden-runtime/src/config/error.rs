//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or validating a [`WardenConfig`](super::WardenConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// File not found at the specified path.
    #[error("configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Failed to read the configuration file.
    #[error("failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("failed to parse configuration: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A section failed a validation rule.
    #[error("invalid configuration: {message}")]
    Validation { message: String },

    /// A plugin id used as a config-section key is not lowercase-kebab.
    #[error("invalid plugin id in configuration: {0}")]
    InvalidPluginId(String),

    /// A policy rule bootstrap entry named an unknown rule kind.
    #[error("unknown policy rule kind: {0}")]
    UnknownPolicyRuleKind(String),
}

impl ConfigError {
    /// Creates a validation error with the given message.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
