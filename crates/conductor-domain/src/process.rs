//! # Process Tracking Types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Starting,
    Running,
    Completed,
    Failed,
    Terminated,
}

impl ProcessStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Terminated)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessNode {
    pub id: String,
    pub pid: u32,
    pub parent_id: Option<String>,
    pub parent_pid: Option<u32>,
    pub task_id: Uuid,
    pub instance_id: String,
    pub agent_type: String,
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<String>,
    pub status: ProcessStatus,
    pub exit_code: Option<i32>,
    pub cpu_percent: f32,
    pub memory_bytes: u64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_agent_root: bool,
}

impl ProcessNode {
    #[allow(clippy::too_many_arguments)]
    pub fn new_root(
        pid: u32,
        task_id: Uuid,
        instance_id: impl Into<String>,
        agent_type: impl Into<String>,
        command: impl Into<String>,
        args: Vec<String>,
        working_dir: Option<String>,
    ) -> Self {
        Self {
            id: String::new(),
            pid,
            parent_id: None,
            parent_pid: None,
            task_id,
            instance_id: instance_id.into(),
            agent_type: agent_type.into(),
            command: command.into(),
            args,
            working_dir,
            status: ProcessStatus::Starting,
            exit_code: None,
            cpu_percent: 0.0,
            memory_bytes: 0,
            started_at: Utc::now(),
            ended_at: None,
            is_agent_root: true,
        }
    }

    /// Build a non-root descendant inheriting attribution from its parent.
    pub fn child_of(parent: &ProcessNode, pid: u32, command: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            pid,
            parent_id: Some(parent.id.clone()),
            parent_pid: Some(parent.pid),
            task_id: parent.task_id,
            instance_id: parent.instance_id.clone(),
            agent_type: parent.agent_type.clone(),
            command: command.into(),
            args: Vec::new(),
            working_dir: parent.working_dir.clone(),
            status: ProcessStatus::Starting,
            exit_code: None,
            cpu_percent: 0.0,
            memory_bytes: 0,
            started_at: Utc::now(),
            ended_at: None,
            is_agent_root: false,
        }
    }

    /// Denormalized label used by `graph()`: agent_type, else command, else "PID <pid>".
    pub fn label(&self) -> String {
        if !self.agent_type.is_empty() {
            self.agent_type.clone()
        } else if !self.command.is_empty() {
            self.command.clone()
        } else {
            format!("PID {}", self.pid)
        }
    }

    pub fn elapsed_secs(&self) -> i64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessEventType {
    Started,
    StatusChange,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEvent {
    pub event_type: ProcessEventType,
    pub old_status: Option<ProcessStatus>,
    pub new_status: ProcessStatus,
    pub exit_code: Option<i32>,
    pub process_id: String,
    pub pid: u32,
    pub task_id: Uuid,
    pub instance_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    pub status: ProcessStatus,
    pub elapsed_secs: i64,
    pub cpu_percent: f32,
    pub memory_mb: f64,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub parent_id: String,
    pub child_id: String,
}

/// Counts and averages over running processes only.
#[derive(Debug, Clone, Default)]
pub struct TrackerStats {
    pub total: usize,
    pub starting: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub terminated: usize,
    pub avg_cpu_percent: f32,
    pub avg_memory_bytes: f64,
}

impl TrackerStats {
    pub fn build<'a>(nodes: impl Iterator<Item = &'a ProcessNode>) -> Self {
        let mut stats = Self::default();
        let mut cpu_sum = 0.0f32;
        let mut mem_sum = 0.0f64;
        let mut running_count = 0usize;

        for node in nodes {
            stats.total += 1;
            match node.status {
                ProcessStatus::Starting => stats.starting += 1,
                ProcessStatus::Running => {
                    stats.running += 1;
                    running_count += 1;
                    cpu_sum += node.cpu_percent;
                    mem_sum += node.memory_bytes as f64;
                }
                ProcessStatus::Completed => stats.completed += 1,
                ProcessStatus::Failed => stats.failed += 1,
                ProcessStatus::Terminated => stats.terminated += 1,
            }
        }

        if running_count > 0 {
            stats.avg_cpu_percent = cpu_sum / running_count as f32;
            stats.avg_memory_bytes = mem_sum / running_count as f64;
        }

        stats
    }
}

#[derive(Debug, Clone)]
pub struct ProcessGraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: TrackerStats,
}

impl ProcessGraphData {
    /// Builds a graph view over `nodes`; callers are responsible for
    /// filtering and deduplicating the set first.
    pub fn build<'a>(nodes: impl Iterator<Item = &'a ProcessNode> + Clone) -> Self {
        let graph_nodes = nodes
            .clone()
            .map(|n| GraphNode {
                id: n.id.clone(),
                label: n.label(),
                status: n.status,
                elapsed_secs: n.elapsed_secs(),
                cpu_percent: n.cpu_percent,
                memory_mb: n.memory_bytes as f64 / (1024.0 * 1024.0),
            })
            .collect();

        let edges = nodes
            .clone()
            .filter_map(|n| {
                n.parent_id.as_ref().map(|parent_id| GraphEdge {
                    parent_id: parent_id.clone(),
                    child_id: n.id.clone(),
                })
            })
            .collect();

        let stats = TrackerStats::build(nodes);

        Self {
            nodes: graph_nodes,
            edges,
            stats,
        }
    }
}
