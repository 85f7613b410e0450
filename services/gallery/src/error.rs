use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    MissingRequired(&'static str),

    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),
}

/// Errors raised by the gallery handlers
///
/// Only `Upstream` is expected to succeed on redelivery; the other variants
/// describe input or deployment problems that a retry cannot fix.
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid message: {0}")]
    Validation(String),

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Image already registered: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation(message.into())
    }

    /// Short label used for log fields and failure counters
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::Config(_) => "config",
            HandlerError::Validation(_) => "validation",
            HandlerError::NotFound(_) => "not_found",
            HandlerError::AlreadyExists(_) => "already_exists",
            HandlerError::Upstream(_) => "upstream",
        }
    }
}

pub type Result<T, E = HandlerError> = std::result::Result<T, E>;
