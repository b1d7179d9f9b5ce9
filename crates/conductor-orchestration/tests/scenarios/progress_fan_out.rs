//! Scenario 5: two watchers receive every update in order; a third, slow
//! watcher that never reads loses overflow but never blocks the publisher.

use std::time::Duration;

use conductor_domain::{Task, TaskProgress};
use tokio_stream::StreamExt;

use crate::common::{bare_engine, general_coder_agent_type};

#[tokio::test]
async fn two_watchers_see_every_update_and_a_slow_one_only_drops_overflow() {
    let (_engine, task_manager, _agent_pool) = bare_engine();
    let task = task_manager
        .create(Task::new("watched task", general_coder_agent_type()))
        .await
        .unwrap();

    let (mut watcher_a, _handle_a) = task_manager.watch_progress(task.id);
    let (mut watcher_b, _handle_b) = task_manager.watch_progress(task.id);

    for pct in [0u8, 25, 50, 75, 100] {
        task_manager.report_progress(TaskProgress {
            task_id: task.id,
            message: format!("{pct}%"),
            percent_complete: pct,
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    for expected in [0u8, 25, 50, 75, 100] {
        let got_a = tokio::time::timeout(Duration::from_millis(500), watcher_a.next())
            .await
            .unwrap()
            .unwrap();
        let got_b = tokio::time::timeout(Duration::from_millis(500), watcher_b.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got_a.percent_complete, expected);
        assert_eq!(got_b.percent_complete, expected);
    }

    // A slow watcher that never reads: its buffer (capacity 10) fills, and
    // everything past that is dropped, but publishing 200 updates must never
    // block the caller of this test.
    let (_slow_watcher, _slow_handle) = task_manager.watch_progress(task.id);
    for pct in 0..200u16 {
        task_manager.report_progress(TaskProgress {
            task_id: task.id,
            message: "tick".into(),
            percent_complete: (pct % 100) as u8,
        });
    }

    // The first two watchers still have their own buffers and still receive
    // updates in order, unaffected by the slow watcher's overflow.
    for expected in [0u8, 1, 2] {
        let got_a = tokio::time::timeout(Duration::from_millis(500), watcher_a.next())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got_a.percent_complete, expected);
    }
}
