//! # Execution Engine (C7)
//!
//! The hardest piece of the orchestrator. Implemented exactly to the
//! documented lifecycle: strict setup ordering with rollback on failure,
//! unconditional teardown, and a race-free `execute_async` that returns only
//! once an instance id is fully registered.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::agent_pool::AgentPool;
use crate::error::{OrchestrationError, OrchestrationResult};
use crate::executor::{ExecutionContext, ExecutionRequest, ExecutionResult, Executor};
use crate::task_manager::TaskManager;
use conductor_domain::AgentInstance;

struct ActiveExecution {
    task_id: Uuid,
    ctx: ExecutionContext,
    executor: Arc<dyn Executor>,
}

struct EngineInner {
    executors: RwLock<Vec<Arc<dyn Executor>>>,
    active: RwLock<HashMap<String, ActiveExecution>>,
    task_manager: Arc<TaskManager>,
    agent_pool: Arc<AgentPool>,
}

/// A cheap-to-clone handle; `execute_async`'s background run-and-teardown
/// task holds its own clone so it outlives the call that spawned it.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

/// The product of the setup phase, carried into the run-and-teardown phase.
struct SetupOutcome {
    instance_id: String,
    task_id: Uuid,
    request: ExecutionRequest,
    executor: Arc<dyn Executor>,
    run_ctx: ExecutionContext,
}

impl Engine {
    pub fn new(task_manager: Arc<TaskManager>, agent_pool: Arc<AgentPool>) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                executors: RwLock::new(Vec::new()),
                active: RwLock::new(HashMap::new()),
                task_manager,
                agent_pool,
            }),
        }
    }

    /// First-match order matters for `find_executor`; appended, never sorted.
    pub fn register_executor(&self, executor: Arc<dyn Executor>) {
        self.inner.executors.write().unwrap().push(executor);
    }

    #[instrument(skip(self, ctx), fields(task_id = %task_id))]
    pub async fn execute(&self, ctx: &ExecutionContext, task_id: Uuid) -> OrchestrationResult<ExecutionResult> {
        let setup = self.setup(ctx, task_id).await?;
        self.run_and_teardown(setup).await
    }

    /// Setup runs synchronously; by the time this returns, `stop(instance_id)`
    /// is valid even before the spawned run-and-teardown task is scheduled.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn execute_async(&self, task_id: Uuid) -> OrchestrationResult<String> {
        let ctx = ExecutionContext::new();
        let setup = self.setup(&ctx, task_id).await?;
        let instance_id = setup.instance_id.clone();

        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run_and_teardown(setup).await {
                error!(error = %e, "background execution failed");
            }
        });

        Ok(instance_id)
    }

    pub async fn stop(&self, instance_id: &str) -> OrchestrationResult<()> {
        let (ctx, executor) = {
            let active = self.inner.active.read().unwrap();
            let entry = active
                .get(instance_id)
                .ok_or_else(|| OrchestrationError::InstanceNotFound(instance_id.to_string()))?;
            (entry.ctx.clone(), entry.executor.clone())
        };
        ctx.cancel();
        executor.stop(instance_id).await.map_err(OrchestrationError::Executor)?;
        Ok(())
    }

    pub async fn stop_task(&self, task_id: Uuid) -> OrchestrationResult<()> {
        let instance_id = {
            let active = self.inner.active.read().unwrap();
            active
                .iter()
                .find(|(_, exec)| exec.task_id == task_id)
                .map(|(id, _)| id.clone())
        }
        .ok_or(OrchestrationError::NoRunningExecution(task_id))?;
        self.stop(&instance_id).await
    }

    pub fn active_executions(&self) -> Vec<String> {
        self.inner.active.read().unwrap().keys().cloned().collect()
    }

    pub fn is_executing(&self, task_id: Uuid) -> bool {
        self.inner
            .active
            .read()
            .unwrap()
            .values()
            .any(|exec| exec.task_id == task_id)
    }

    /// Strict setup order with rollback on failure. No
    /// lock is held while calling into the task manager, agent pool, or an
    /// executor.
    async fn setup(&self, ctx: &ExecutionContext, task_id: Uuid) -> OrchestrationResult<SetupOutcome> {
        let instance_id = conductor_shared::ids::instance_id(&task_id.to_string());

        let (task, secrets) = self.inner.task_manager.get_with_secrets(task_id).await?;
        secrets?;

        let agent_def = self.inner.agent_pool.get_required(&task.agent_type).await?;

        let executor = {
            let executors = self.inner.executors.read().unwrap();
            executors
                .iter()
                .find(|e| e.can_execute(&task, &agent_def))
                .cloned()
        }
        .ok_or(OrchestrationError::NoExecutor(task_id))?;

        let run_ctx = ctx.child();

        {
            let mut active = self.inner.active.write().unwrap();
            active.insert(
                instance_id.clone(),
                ActiveExecution {
                    task_id,
                    ctx: run_ctx.clone(),
                    executor: executor.clone(),
                },
            );
        }

        let instance = AgentInstance::new(
            instance_id.clone(),
            task.agent_type.clone(),
            task_id,
            executor.name().to_string(),
        );
        self.inner.agent_pool.register(instance);

        if let Err(err) = self.inner.task_manager.assign(task_id, &instance_id).await {
            warn!(%instance_id, error = %err, "assign failed during setup; rolling back");
            self.inner.agent_pool.unregister(&instance_id);
            self.inner.active.write().unwrap().remove(&instance_id);
            run_ctx.cancel();
            return Err(err);
        }

        let request = ExecutionRequest {
            instance_id: instance_id.clone(),
            task,
            agent_def,
        };

        Ok(SetupOutcome {
            instance_id,
            task_id,
            request,
            executor,
            run_ctx,
        })
    }

    /// Runs the executor and unconditionally tears down, regardless of how
    /// `execute` returned: teardown runs whether the call succeeds, errors,
    /// or its context was cancelled. An `Err` from the executor itself and a
    /// successfully returned `ExecutionResult { success: false, .. }` are
    /// distinct outcomes: both fail the task, but only the former is
    /// propagated as an `Err` from this call.
    async fn run_and_teardown(&self, setup: SetupOutcome) -> OrchestrationResult<ExecutionResult> {
        let SetupOutcome {
            instance_id,
            task_id,
            request,
            executor,
            run_ctx,
        } = setup;

        let outcome = executor.execute(&run_ctx, request).await;

        self.inner.active.write().unwrap().remove(&instance_id);
        self.inner.agent_pool.unregister(&instance_id);
        run_ctx.cancel();

        match outcome {
            Err(message) => {
                if let Err(e) = self.inner.task_manager.fail(task_id, message.clone()).await {
                    error!(%task_id, error = %e, "failed to record execution failure");
                }
                Err(OrchestrationError::Executor(message))
            }
            Ok(result) if result.success => {
                if let Err(e) = self
                    .inner
                    .task_manager
                    .complete(task_id, result.output.clone(), Vec::new())
                    .await
                {
                    error!(%task_id, error = %e, "failed to record execution success");
                }
                Ok(result)
            }
            Ok(result) => {
                let message = result.error_message.clone().unwrap_or_default();
                if let Err(e) = self.inner.task_manager.fail(task_id, message).await {
                    error!(%task_id, error = %e, "failed to record execution failure");
                }
                Ok(result)
            }
        }
    }
}

#[cfg(all(test, feature = "test-utils"))]
mod tests {
    use super::*;
    use crate::executor::in_process::InProcessExecutor;
    use conductor_domain::stores::memory::{InMemoryArtifactStore, InMemoryTicketStore};
    use conductor_domain::{agent::builtin_registry, stores::memory::InMemoryAgentDefinitionStore, Task};
    use conductor_secure::EnvelopeService;

    fn engine() -> (Engine, Arc<TaskManager>) {
        let store = Arc::new(InMemoryTicketStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let envelope = Arc::new(EnvelopeService::without_identity());
        let task_manager = Arc::new(TaskManager::new(store, artifacts, envelope));
        let agent_pool = Arc::new(AgentPool::new(Arc::new(InMemoryAgentDefinitionStore::new())));
        let engine = Engine::new(task_manager.clone(), agent_pool);
        engine.register_executor(Arc::new(InProcessExecutor::new()));
        (engine, task_manager)
    }

    #[tokio::test]
    async fn happy_path_runs_and_completes() {
        let (engine, task_manager) = engine();
        let agent_type = builtin_registry()[0].id.clone();
        let task = task_manager
            .create(Task::new("demo".into(), agent_type))
            .await
            .unwrap();

        let ctx = ExecutionContext::new();
        let result = engine.execute(&ctx, task.id).await.unwrap();
        assert!(result.success);

        let finished = task_manager.get(task.id).await.unwrap().unwrap();
        assert_eq!(finished.status, conductor_domain::TaskStatus::Completed);
        assert!(!engine.is_executing(task.id));
    }

    #[tokio::test]
    async fn no_executor_fails_without_leaking_state() {
        let store = Arc::new(InMemoryTicketStore::new());
        let artifacts = Arc::new(InMemoryArtifactStore::new());
        let envelope = Arc::new(EnvelopeService::without_identity());
        let task_manager = Arc::new(TaskManager::new(store, artifacts, envelope));
        let agent_pool = Arc::new(AgentPool::new(Arc::new(InMemoryAgentDefinitionStore::new())));
        let engine = Engine::new(task_manager.clone(), agent_pool);

        let agent_type = builtin_registry()[0].id.clone();
        let task = task_manager
            .create(Task::new("no-backend".into(), agent_type))
            .await
            .unwrap();

        let ctx = ExecutionContext::new();
        let err = engine.execute(&ctx, task.id).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::NoExecutor(_)));
        assert!(engine.active_executions().is_empty());

        let untouched = task_manager.get(task.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, conductor_domain::TaskStatus::Pending);
    }

    #[tokio::test]
    async fn execute_async_registers_before_returning() {
        let (engine, task_manager) = engine();
        let agent_type = builtin_registry()[0].id.clone();
        let task = task_manager
            .create(Task::new("async-demo".into(), agent_type))
            .await
            .unwrap();

        let instance_id = engine.execute_async(task.id).await.unwrap();
        assert!(engine.is_executing(task.id));

        // Racing stop(instance_id) immediately after is explicitly valid.
        let _ = engine.stop(&instance_id).await;
    }

    #[tokio::test]
    async fn stop_unknown_instance_is_not_found() {
        let (engine, _task_manager) = engine();
        let err = engine.stop("does-not-exist").await.unwrap_err();
        assert!(matches!(err, OrchestrationError::InstanceNotFound(_)));
    }

    #[tokio::test]
    async fn stop_task_without_running_execution_errors() {
        let (engine, task_manager) = engine();
        let agent_type = builtin_registry()[0].id.clone();
        let task = task_manager
            .create(Task::new("idle".into(), agent_type))
            .await
            .unwrap();

        let err = engine.stop_task(task.id).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::NoRunningExecution(_)));
    }
}
