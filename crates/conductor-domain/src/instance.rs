//! # Agent Instance
//!
//! A live execution record. Created at setup, destroyed at teardown —
//! never persisted; transient for the lifetime of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Starting,
    Running,
    Stopping,
    Ended,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    pub id: String,
    pub agent_type: String,
    pub task_id: Uuid,
    pub executor_id: String,
    pub status: InstanceStatus,
    pub started_at: DateTime<Utc>,
}

impl AgentInstance {
    pub fn new(id: impl Into<String>, agent_type: impl Into<String>, task_id: Uuid, executor_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent_type: agent_type.into(),
            task_id,
            executor_id: executor_id.into(),
            status: InstanceStatus::Starting,
            started_at: Utc::now(),
        }
    }
}
