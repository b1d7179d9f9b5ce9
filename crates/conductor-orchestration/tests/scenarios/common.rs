use std::sync::Arc;

use async_trait::async_trait;
use conductor_domain::stores::memory::{
    InMemoryAgentDefinitionStore, InMemoryArtifactStore, InMemoryTicketStore,
};
use conductor_domain::{AgentDefinition, Task};
use conductor_orchestration::executor::{ExecutionContext, ExecutionRequest, ExecutionResult, Executor};
use conductor_orchestration::{AgentPool, Engine, TaskManager};
use conductor_secure::EnvelopeService;

/// A fresh engine wired to in-memory stores and an identity-less envelope
/// service, with no executors registered. Each scenario registers whatever
/// backend it needs.
pub fn bare_engine() -> (Engine, Arc<TaskManager>, Arc<AgentPool>) {
    let store = Arc::new(InMemoryTicketStore::new());
    let artifacts = Arc::new(InMemoryArtifactStore::new());
    let envelope = Arc::new(EnvelopeService::without_identity());
    let task_manager = Arc::new(TaskManager::new(store, artifacts, envelope));
    let agent_pool = Arc::new(AgentPool::new(Arc::new(InMemoryAgentDefinitionStore::new())));
    let engine = Engine::new(task_manager.clone(), agent_pool.clone());
    (engine, task_manager, agent_pool)
}

pub fn general_coder_agent_type() -> String {
    conductor_domain::agent::builtin_registry()[0].id.clone()
}

/// Always reports itself able to run any task, and records whether
/// `execute` was ever invoked — used to assert rollback paths never reach
/// the backend.
#[derive(Debug, Default)]
pub struct SpyExecutor {
    pub invoked: std::sync::atomic::AtomicBool,
}

#[async_trait]
impl Executor for SpyExecutor {
    fn name(&self) -> &str {
        "spy"
    }

    fn can_execute(&self, _task: &Task, _agent_def: &AgentDefinition) -> bool {
        true
    }

    async fn execute(
        &self,
        _ctx: &ExecutionContext,
        _request: ExecutionRequest,
    ) -> Result<ExecutionResult, String> {
        self.invoked.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(ExecutionResult::ok("should never run"))
    }

    async fn stop(&self, _instance_id: &str) -> Result<(), String> {
        Ok(())
    }

    async fn is_running(&self, _instance_id: &str) -> bool {
        false
    }
}

/// Completes after `delay`, honoring cancellation: a cancel before the
/// delay elapses returns a cancelled result instead of waiting it out.
#[derive(Debug)]
pub struct DelayedExecutor {
    pub delay: std::time::Duration,
}

#[async_trait]
impl Executor for DelayedExecutor {
    fn name(&self) -> &str {
        "delayed"
    }

    fn can_execute(&self, _task: &Task, _agent_def: &AgentDefinition) -> bool {
        true
    }

    async fn execute(
        &self,
        ctx: &ExecutionContext,
        _request: ExecutionRequest,
    ) -> Result<ExecutionResult, String> {
        tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(ExecutionResult::ok("done")),
            _ = ctx.cancelled() => Ok(ExecutionResult::cancelled()),
        }
    }

    async fn stop(&self, _instance_id: &str) -> Result<(), String> {
        Ok(())
    }

    async fn is_running(&self, _instance_id: &str) -> bool {
        false
    }
}
