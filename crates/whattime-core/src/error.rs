use thiserror::Error;

#[derive(Debug, Error)]
pub enum ActionError {
    /// Absent, released, or not visible to the caller. Authorization failures
    /// use this variant too so callers cannot probe for existence.
    #[error("no action with id {0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid action request: {0}")]
    Validation(String),

    #[error("action store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ActionError {
    pub fn store(e: impl std::fmt::Display) -> Self {
        Self::StoreUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
