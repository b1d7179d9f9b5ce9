//! # Domain Error Kinds

use thiserror::Error;
use uuid::Uuid;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("task {task_id} is in a terminal state and cannot be updated")]
    TerminalState { task_id: Uuid },

    #[error("task {task_id} is not pending (current status: {current})")]
    NotPending { task_id: Uuid, current: String },

    #[error("agent definition {id} is built-in and cannot be modified")]
    BuiltinProtected { id: String },

    #[error("failed to decrypt task secrets: {0}")]
    DecryptFailed(#[from] conductor_secure::SecureError),

    #[error("store error: {0}")]
    Store(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }
}
