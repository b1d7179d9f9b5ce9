//! Scenario 6: a root process with three children, one of which has its
//! own child, produces a 5-node graph with 4 edges and the expected shape
//! under `tree()`.
//!
//! `discover_children` walks the real OS process table, which makes it
//! unsuitable for a deterministic test with literal pids; this test builds
//! the same shape directly through `register`, exercising `graph()` and
//! `tree()` the same way `discover_children` would have populated them.

use std::time::Duration;
use uuid::Uuid;

use conductor_domain::{ProcessFilter, ProcessNode};
use conductor_orchestration::ProcessTracker;

#[tokio::test]
async fn a_root_with_three_children_and_one_grandchild_builds_a_five_node_graph() {
    let tracker = ProcessTracker::new(None, Duration::from_millis(50), 100);
    let task_id = Uuid::new_v4();

    let root = tracker
        .register(ProcessNode::new_root(
            1000,
            task_id,
            "inst-1",
            "claude",
            "claude-agent",
            Vec::new(),
            None,
        ))
        .await
        .unwrap();

    let child_1001 = tracker.register(ProcessNode::child_of(&root, 1001, "worker")).await.unwrap();
    let child_1002 = tracker.register(ProcessNode::child_of(&root, 1002, "worker")).await.unwrap();
    let child_1003 = tracker.register(ProcessNode::child_of(&root, 1003, "worker")).await.unwrap();
    let grandchild_1004 = tracker
        .register(ProcessNode::child_of(&child_1002, 1004, "sub-worker"))
        .await
        .unwrap();

    let graph = tracker.graph(&ProcessFilter::default()).await.unwrap();
    assert_eq!(graph.nodes.len(), 5);
    assert_eq!(graph.edges.len(), 4);
    assert!(graph.nodes.iter().all(|n| n.label == "claude"));

    let tree = tracker.tree(&root.id);
    assert_eq!(tree.len(), 5);

    let has_grandchild_edge = graph
        .edges
        .iter()
        .any(|e| e.parent_id == child_1002.id && e.child_id == grandchild_1004.id);
    assert!(has_grandchild_edge);

    let child_1002_children = tree
        .iter()
        .filter(|n| n.parent_id.as_deref() == Some(child_1002.id.as_str()))
        .count();
    assert_eq!(child_1002_children, 1);

    let _ = (&child_1001, &child_1003);
}
