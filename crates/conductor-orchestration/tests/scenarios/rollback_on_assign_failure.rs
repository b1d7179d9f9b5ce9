//! Scenario 3: if the ticket store rejects `assign` (the task is no longer
//! pending by the time setup reaches it), the engine must never call the
//! executor and must leave no trace in the active-execution map or the
//! agent pool.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use conductor_domain::{Task, TaskPatch, TaskStatus};
use conductor_orchestration::executor::ExecutionContext;
use conductor_orchestration::OrchestrationError;

use crate::common::{bare_engine, general_coder_agent_type, SpyExecutor};

#[tokio::test]
async fn assign_rejection_rolls_back_before_the_executor_ever_runs() {
    let (engine, task_manager, agent_pool) = bare_engine();
    let spy = Arc::new(SpyExecutor::default());
    engine.register_executor(spy.clone());

    let task = task_manager
        .create(Task::new("already claimed", general_coder_agent_type()))
        .await
        .unwrap();

    // Move the task out of `pending` without going through `assign`, so
    // `execute`'s own call to `assign` is the one that fails.
    task_manager
        .update(
            task.id,
            TaskPatch {
                status: Some(TaskStatus::Running),
                ..TaskPatch::default()
            },
        )
        .await
        .unwrap();

    let ctx = ExecutionContext::new();
    let err = engine.execute(&ctx, task.id).await.unwrap_err();

    assert!(matches!(
        err,
        OrchestrationError::Domain(conductor_domain::DomainError::NotPending { .. })
    ));
    assert!(!spy.invoked.load(Ordering::SeqCst));
    assert!(engine.active_executions().is_empty());
    assert_eq!(agent_pool.count(), 0);
}
