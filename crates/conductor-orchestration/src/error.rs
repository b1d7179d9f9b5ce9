//! # Orchestration Error Kinds

use thiserror::Error;
use uuid::Uuid;

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Domain(#[from] conductor_domain::DomainError),

    #[error("secrets envelope error: {0}")]
    Secure(#[from] conductor_secure::SecureError),

    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("agent definition {0} not found")]
    AgentNotFound(String),

    #[error("no registered executor accepts task {0}")]
    NoExecutor(Uuid),

    #[error("no execution instance {0} found")]
    InstanceNotFound(String),

    #[error("process node {0} not found")]
    ProcessNotFound(String),

    #[error("task {0} has no running execution")]
    NoRunningExecution(Uuid),

    #[error("executor error: {0}")]
    Executor(String),
}
