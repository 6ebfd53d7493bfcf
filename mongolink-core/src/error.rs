//! Error types for connection setup and lifecycle.

use thiserror::Error;

/// Result type for connection operations.
pub type ConnectResult<T> = Result<T, ConnectError>;

/// Errors that can occur while configuring or running a connection.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// MongoDB driver error.
    #[error("mongodb error: {0}")]
    Driver(#[from] mongodb::error::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("connection error: {0}")]
    Connection(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Referenced environment variable is not set.
    #[error("environment variable not found: {0}")]
    EnvNotFound(String),

    /// Environment variable is set but unusable.
    #[error("invalid environment variable {name}: {message}")]
    InvalidEnvValue {
        /// Variable name.
        name: String,
        /// What went wrong.
        message: String,
    },
}

impl ConnectError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Check if this is a connection error.
    ///
    /// Driver errors raised while talking to the server count as connection
    /// errors as well.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Driver(_))
    }

    /// Check if this is a configuration error, including file and
    /// environment problems.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Io(_)
                | Self::Parse(_)
                | Self::EnvNotFound(_)
                | Self::InvalidEnvValue { .. }
        )
    }
}
