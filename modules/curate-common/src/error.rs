use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Invalid identifier: {0}")]
    InvalidId(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
