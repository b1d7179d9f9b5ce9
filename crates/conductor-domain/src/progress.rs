//! # Task Progress
//!
//! In-flight progress beacon. Not persisted; broadcast only — diagnostic,
//! never authoritative.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskProgress {
    pub task_id: Uuid,
    pub message: String,
    pub percent_complete: u8,
}

/// Secrets attached to a task before encryption.
/// An arbitrary JSON bag — the task manager never inspects its shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSecrets(pub serde_json::Value);
