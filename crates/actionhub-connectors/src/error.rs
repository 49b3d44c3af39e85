use actionhub_config::ConfigError;
use actionhub_core::{CoreError, Fault};
use actionhub_registry::RegistryError;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid identifier '{field}': {reason}")]
    InvalidIdentifier { field: String, reason: String },
}

impl From<ConnectorError> for Fault {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::InvalidIdentifier { field, reason } => {
                Fault::Validation { field, reason }
            }
            ConnectorError::Serialization(e) => Fault::from(e),
            #[cfg(feature = "http")]
            ConnectorError::Http(e) => Fault::Transport {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            other => Fault::unexpected(other),
        }
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
