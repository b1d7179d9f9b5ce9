//! # Query Filters

use crate::process::ProcessStatus;
use crate::task::TaskStatus;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<Vec<TaskStatus>>,
    pub agent_type: Option<String>,
    pub parent_id: Option<Uuid>,
}

impl TaskFilter {
    pub fn matches(&self, task: &crate::task::Task) -> bool {
        if let Some(statuses) = &self.status {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some(agent_type) = &self.agent_type {
            if &task.agent_type != agent_type {
                return false;
            }
        }
        if let Some(parent_id) = &self.parent_id {
            if task.parent_id.as_ref() != Some(parent_id) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessFilter {
    pub task_id: Option<Uuid>,
    pub instance_id: Option<String>,
    pub status: Option<Vec<ProcessStatus>>,
}

impl ProcessFilter {
    pub fn matches(&self, node: &crate::process::ProcessNode) -> bool {
        if let Some(task_id) = &self.task_id {
            if &node.task_id != task_id {
                return false;
            }
        }
        if let Some(instance_id) = &self.instance_id {
            if &node.instance_id != instance_id {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&node.status) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskStats {
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}
