use crate::directory::DirectoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown tier: {0}")]
    UnknownTier(String),

    #[error("invalid period '{0}': expected YYYY-MM")]
    InvalidPeriod(String),

    #[error("category not found: {0}")]
    CategoryNotFound(String),

    #[error("failed to resolve category {category}: {source}")]
    Resolution {
        category: String,
        #[source]
        source: DirectoryError,
    },

    #[error("failed to create bucket {bucket}: {source}")]
    CreateBucket {
        bucket: String,
        #[source]
        source: DirectoryError,
    },

    #[error("a reconciliation run is already in progress")]
    AlreadyRunning,

    #[error("config file not found: {0}")]
    ConfigNotFound(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl GateError {
    /// True for failures that happen before any reconciliation can start.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            GateError::InvalidConfig(_)
                | GateError::ConfigNotFound(_)
                | GateError::UnknownTier(_)
                | GateError::Yaml(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, GateError>;
