//! Scenario 2: `execute_async` then `stop` shortly after must cancel the
//! run rather than waiting out a long-running backend.

use std::sync::Arc;
use std::time::Duration;

use conductor_domain::{Task, TaskStatus};

use crate::common::{bare_engine, general_coder_agent_type, DelayedExecutor};

#[tokio::test]
async fn stop_after_execute_async_cancels_a_long_running_task() {
    let (engine, task_manager, _agent_pool) = bare_engine();
    engine.register_executor(Arc::new(DelayedExecutor {
        delay: Duration::from_secs(10),
    }));

    let task = task_manager
        .create(Task::new("long running", general_coder_agent_type()))
        .await
        .unwrap();

    let instance_id = engine.execute_async(task.id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    engine.stop(&instance_id).await.unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        let current = task_manager.get(task.id).await.unwrap().unwrap();
        if current.status == TaskStatus::Failed {
            assert!(current.error_message.unwrap_or_default().contains("cancel"));
            break;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("task did not reach failed within 1s of stop()");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert!(!engine.is_executing(task.id));
}
