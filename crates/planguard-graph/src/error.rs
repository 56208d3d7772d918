use thiserror::Error;

/// Graph construction errors.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to parse plan document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("circular dependency detected at {0}")]
    CircularDependency(String),

    #[error("duplicate resource address: {0}")]
    DuplicateAddress(String),
}
