//! # Task
//!
//! The central workload unit. `TaskStatus` transitions only along a fixed
//! graph; terminal states are absorbing. The transition table lives here,
//! next to the type it governs, so every caller (task manager, tests)
//! consults the same source of truth rather than re-deriving it.

use chrono::{DateTime, Utc};
use conductor_secure::EncryptedPayload;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses are absorbing: no transition out of them is valid.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `self -> to` is a valid edge of the task status state graph.
    /// Reassignment (`running -> running`) is explicitly idempotent.
    pub fn can_transition_to(self, to: Self) -> bool {
        use TaskStatus::*;
        match (self, to) {
            (Running, Running) => true,
            (from, _) if from.is_terminal() => false,
            (Pending, Assigned) | (Pending, Running) | (Pending, Cancelled) => true,
            (Assigned, Running) | (Assigned, Failed) | (Assigned, Cancelled) => true,
            (Running, Completed) | (Running, Failed) | (Running, Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    SingleShot,
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::SingleShot
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    pub description: String,
    pub agent_type: String,
    pub status: TaskStatus,
    pub priority: u8,
    pub execution_mode: ExecutionMode,
    pub labels: BTreeSet<String>,
    pub worktree: Option<String>,
    pub secrets: Option<EncryptedPayload>,
    pub result: Option<String>,
    pub error_message: Option<String>,
    /// Correlation id threaded through every span touching this task, so
    /// logs from the task manager, engine, and tracker can be joined for
    /// one run even though they live in different crates.
    pub correlation_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Build a new pending task with the manager's defaults filled in
    /// (status=pending, priority=5, execution_mode=single_shot).
    pub fn new(title: impl Into<String>, agent_type: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            title: title.into(),
            description: String::new(),
            agent_type: agent_type.into(),
            status: TaskStatus::Pending,
            priority: 5,
            execution_mode: ExecutionMode::SingleShot,
            labels: BTreeSet::new(),
            worktree: None,
            secrets: None,
            result: None,
            error_message: None,
            correlation_id: Uuid::new_v4(),
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

/// A sparse update applied by `TicketStore::update`. Every field
/// is optional; `None` means "leave unchanged". Timestamp fields set by the
/// caller win only if they are not already set on the stored task.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub result: Option<String>,
    pub error_message: Option<String>,
    pub worktree: Option<String>,
    pub secrets: Option<EncryptedPayload>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::TaskStatus::*;

    #[test]
    fn terminal_states_accept_no_transitions() {
        for terminal in [Completed, Failed, Cancelled] {
            for to in [Pending, Assigned, Running, Completed, Failed, Cancelled] {
                assert!(!terminal.can_transition_to(to), "{terminal:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn running_to_running_is_idempotent() {
        assert!(Running.can_transition_to(Running));
    }

    #[test]
    fn pending_can_reach_assigned_running_or_cancelled_only() {
        assert!(Pending.can_transition_to(Assigned));
        assert!(Pending.can_transition_to(Running));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Failed));
    }

    #[test]
    fn assigned_can_fail_or_cancel_as_well_as_run() {
        assert!(Assigned.can_transition_to(Running));
        assert!(Assigned.can_transition_to(Failed));
        assert!(Assigned.can_transition_to(Cancelled));
        assert!(!Assigned.can_transition_to(Completed));
    }

    #[test]
    fn running_reaches_every_terminal_state() {
        assert!(Running.can_transition_to(Completed));
        assert!(Running.can_transition_to(Failed));
        assert!(Running.can_transition_to(Cancelled));
    }
}
