//! Scenario 1: create a task, register an executor that succeeds after a
//! short delay, run it to completion with `execute`.

use std::sync::Arc;
use std::time::Duration;

use conductor_domain::{Task, TaskStatus};
use conductor_orchestration::executor::ExecutionContext;

use crate::common::{bare_engine, general_coder_agent_type, DelayedExecutor};

#[tokio::test]
async fn single_shot_task_completes_with_its_output() {
    let (engine, task_manager, agent_pool) = bare_engine();
    engine.register_executor(Arc::new(DelayedExecutor {
        delay: Duration::from_millis(50),
    }));

    let task = Task::new("fix typo", general_coder_agent_type());
    assert_eq!(task.priority, 5);
    let task = task_manager.create(task).await.unwrap();

    let ctx = ExecutionContext::new();
    let result = engine.execute(&ctx, task.id).await.unwrap();
    assert!(result.success);
    assert_eq!(result.output, "done");

    let finished = task_manager.get(task.id).await.unwrap().unwrap();
    assert_eq!(finished.status, TaskStatus::Completed);
    assert_eq!(finished.result.as_deref(), Some("done"));
    assert_eq!(engine.active_executions().len(), 0);
    assert_eq!(agent_pool.count(), 0);
}
