use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestorError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttestorError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound(format!("{} {} not found", entity, id))
    }

    /// The error text without the variant prefix that `Display` adds.
    pub fn message(&self) -> String {
        match self {
            Self::NotFound(msg)
            | Self::Conflict(msg)
            | Self::Validation(msg)
            | Self::Config(msg)
            | Self::Database(msg)
            | Self::Detector(msg)
            | Self::Timeout(msg)
            | Self::Cancelled(msg)
            | Self::Internal(msg) => msg.clone(),
            Self::Io(e) => e.to_string(),
            Self::Json(e) => e.to_string(),
            Self::Yaml(e) => e.to_string(),
        }
    }
}
