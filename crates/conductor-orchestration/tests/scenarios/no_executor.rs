//! Scenario 4: with zero executors registered, `execute` must fail with
//! `no_executor` and leave the task untouched.

use conductor_domain::{Task, TaskStatus};
use conductor_orchestration::executor::ExecutionContext;
use conductor_orchestration::OrchestrationError;

use crate::common::{bare_engine, general_coder_agent_type};

#[tokio::test]
async fn no_registered_executor_leaves_the_task_pending() {
    let (engine, task_manager, agent_pool) = bare_engine();

    let task = task_manager
        .create(Task::new("nobody to run this", general_coder_agent_type()))
        .await
        .unwrap();

    let ctx = ExecutionContext::new();
    let err = engine.execute(&ctx, task.id).await.unwrap_err();
    assert!(matches!(err, OrchestrationError::NoExecutor(_)));

    let untouched = task_manager.get(task.id).await.unwrap().unwrap();
    assert_eq!(untouched.status, TaskStatus::Pending);
    assert_eq!(agent_pool.count(), 0);
}
