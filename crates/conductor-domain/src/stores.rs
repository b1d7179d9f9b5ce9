//! # External Store Interfaces
//!
//! The core never implements persistence; these traits are the contracts
//! collaborators (a Fossil-style append-only store, a wiki store, a
//! filesystem-backed artifact store, ...) fulfill. `conductor-domain` only
//! ships lightweight in-memory reference implementations, behind
//! `test-utils`, as stand-ins for the real database-backed stores.

use crate::agent::AgentDefinition;
use crate::error::DomainResult;
use crate::filter::{ProcessFilter, TaskFilter};
use crate::process::{ProcessEvent, ProcessGraphData, ProcessNode};
use crate::task::{Task, TaskPatch};
use async_trait::async_trait;
use uuid::Uuid;

/// Persist and query tasks and task updates (component C2). `update` MUST
/// be atomic per task — the task manager relies on it for `assign`.
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn create(&self, task: Task) -> DomainResult<Task>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;
    async fn update(&self, id: Uuid, patch: TaskPatch) -> DomainResult<Task>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>>;
    async fn count(&self, filter: &TaskFilter) -> DomainResult<usize>;
    /// Highest-priority pending task (lowest numeric priority, ties broken by
    /// oldest `created_at`), optionally constrained to `agent_type`.
    async fn next(&self, agent_type: Option<&str>) -> DomainResult<Option<Task>>;
}

/// Persist and retrieve task artifacts by task + name (component C3).
/// Names are opaque; mime detection is the store's responsibility.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, task_id: Uuid, name: &str, bytes: Vec<u8>) -> DomainResult<()>;
    async fn put_base64(&self, task_id: Uuid, name: &str, base64: &str) -> DomainResult<()>;
    async fn get(&self, task_id: Uuid, name: &str) -> DomainResult<(Vec<u8>, String)>;
    async fn list(&self, task_id: Uuid) -> DomainResult<Vec<String>>;
    async fn delete_all(&self, task_id: Uuid) -> DomainResult<()>;
}

/// Wiki-like store for user-defined agent definitions.
#[async_trait]
pub trait AgentDefinitionStore: Send + Sync {
    async fn get(&self, id: &str) -> DomainResult<Option<AgentDefinition>>;
    async fn list(&self) -> DomainResult<Vec<AgentDefinition>>;
    async fn save(&self, def: AgentDefinition) -> DomainResult<()>;
    async fn delete(&self, id: &str) -> DomainResult<()>;
}

/// Optional persistent backing for the process tracker; the
/// tracker works without one, as an in-memory-only implementation.
#[async_trait]
pub trait ProcessEventStore: Send + Sync {
    async fn put_event(&self, event: ProcessEvent) -> DomainResult<()>;
    async fn put_node(&self, node: ProcessNode) -> DomainResult<()>;
    async fn update_node(&self, node: ProcessNode) -> DomainResult<()>;
    async fn get_node(&self, id: &str) -> DomainResult<Option<ProcessNode>>;
    async fn get_node_by_pid(&self, pid: u32) -> DomainResult<Option<ProcessNode>>;
    async fn list(&self, filter: &ProcessFilter) -> DomainResult<Vec<ProcessNode>>;
    async fn tree(&self, root_id: &str) -> DomainResult<Vec<ProcessNode>>;
    async fn graph(&self, filter: &ProcessFilter) -> DomainResult<ProcessGraphData>;
    async fn events(&self, process_id: &str, limit: usize) -> DomainResult<Vec<ProcessEvent>>;
}

#[cfg(feature = "test-utils")]
pub mod memory {
    //! In-memory reference implementations of the store traits, used by the
    //! orchestration crate's integration tests and as a model for real
    //! implementers.

    use super::*;
    use std::collections::HashMap;
    use tokio::sync::RwLock;

    #[derive(Default)]
    pub struct InMemoryTicketStore {
        tasks: RwLock<HashMap<Uuid, Task>>,
    }

    impl InMemoryTicketStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn apply_patch(task: &mut Task, patch: TaskPatch) {
            if let Some(status) = patch.status {
                task.status = status;
            }
            if let Some(result) = patch.result {
                task.result = Some(result);
            }
            if let Some(error_message) = patch.error_message {
                task.error_message = Some(error_message);
            }
            if let Some(worktree) = patch.worktree {
                task.worktree = Some(worktree);
            }
            if let Some(secrets) = patch.secrets {
                task.secrets = Some(secrets);
            }
            if task.started_at.is_none() {
                if let Some(started_at) = patch.started_at {
                    task.started_at = Some(started_at);
                }
            }
            if task.completed_at.is_none() {
                if let Some(completed_at) = patch.completed_at {
                    task.completed_at = Some(completed_at);
                }
            }
        }
    }

    #[async_trait]
    impl TicketStore for InMemoryTicketStore {
        async fn create(&self, task: Task) -> DomainResult<Task> {
            let mut tasks = self.tasks.write().await;
            tasks.insert(task.id, task.clone());
            Ok(task)
        }

        async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
            Ok(self.tasks.read().await.get(&id).cloned())
        }

        async fn update(&self, id: Uuid, patch: TaskPatch) -> DomainResult<Task> {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| crate::error::DomainError::not_found("task", id.to_string()))?;

            if task.status.is_terminal() {
                if let Some(new_status) = patch.status {
                    if new_status != task.status {
                        return Err(crate::error::DomainError::TerminalState { task_id: id });
                    }
                }
            }

            Self::apply_patch(task, patch);
            Ok(task.clone())
        }

        async fn delete(&self, id: Uuid) -> DomainResult<()> {
            self.tasks.write().await.remove(&id);
            Ok(())
        }

        async fn list(&self, filter: &TaskFilter) -> DomainResult<Vec<Task>> {
            Ok(self
                .tasks
                .read()
                .await
                .values()
                .filter(|t| filter.matches(t))
                .cloned()
                .collect())
        }

        async fn count(&self, filter: &TaskFilter) -> DomainResult<usize> {
            Ok(self.list(filter).await?.len())
        }

        async fn next(&self, agent_type: Option<&str>) -> DomainResult<Option<Task>> {
            let tasks = self.tasks.read().await;
            let best = tasks
                .values()
                .filter(|t| t.status == crate::task::TaskStatus::Pending)
                .filter(|t| agent_type.map(|at| t.agent_type == at).unwrap_or(true))
                .min_by(|a, b| {
                    a.priority
                        .cmp(&b.priority)
                        .then_with(|| a.created_at.cmp(&b.created_at))
                });
            Ok(best.cloned())
        }
    }

    #[derive(Default)]
    pub struct InMemoryArtifactStore {
        artifacts: RwLock<HashMap<(Uuid, String), (Vec<u8>, String)>>,
    }

    impl InMemoryArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        fn sniff_mime(name: &str) -> String {
            if name.ends_with(".json") {
                "application/json".to_string()
            } else if name.ends_with(".png") {
                "image/png".to_string()
            } else if name.ends_with(".txt") || name.ends_with(".md") {
                "text/plain".to_string()
            } else {
                "application/octet-stream".to_string()
            }
        }
    }

    #[async_trait]
    impl ArtifactStore for InMemoryArtifactStore {
        async fn put(&self, task_id: Uuid, name: &str, bytes: Vec<u8>) -> DomainResult<()> {
            let mime = Self::sniff_mime(name);
            self.artifacts
                .write()
                .await
                .insert((task_id, name.to_string()), (bytes, mime));
            Ok(())
        }

        async fn put_base64(&self, task_id: Uuid, name: &str, base64: &str) -> DomainResult<()> {
            use base64::Engine as _;
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(base64)
                .map_err(|e| crate::error::DomainError::validation(format!("invalid base64: {e}")))?;
            self.put(task_id, name, bytes).await
        }

        async fn get(&self, task_id: Uuid, name: &str) -> DomainResult<(Vec<u8>, String)> {
            self.artifacts
                .read()
                .await
                .get(&(task_id, name.to_string()))
                .cloned()
                .ok_or_else(|| crate::error::DomainError::not_found("artifact", name))
        }

        async fn list(&self, task_id: Uuid) -> DomainResult<Vec<String>> {
            Ok(self
                .artifacts
                .read()
                .await
                .keys()
                .filter(|(tid, _)| *tid == task_id)
                .map(|(_, name)| name.clone())
                .collect())
        }

        async fn delete_all(&self, task_id: Uuid) -> DomainResult<()> {
            self.artifacts
                .write()
                .await
                .retain(|(tid, _), _| *tid != task_id);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryAgentDefinitionStore {
        defs: RwLock<HashMap<String, AgentDefinition>>,
    }

    impl InMemoryAgentDefinitionStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl AgentDefinitionStore for InMemoryAgentDefinitionStore {
        async fn get(&self, id: &str) -> DomainResult<Option<AgentDefinition>> {
            Ok(self.defs.read().await.get(id).cloned())
        }

        async fn list(&self) -> DomainResult<Vec<AgentDefinition>> {
            Ok(self.defs.read().await.values().cloned().collect())
        }

        async fn save(&self, mut def: AgentDefinition) -> DomainResult<()> {
            let mut defs = self.defs.write().await;
            if let Some(existing) = defs.get(&def.id) {
                def.version = existing.version + 1;
            }
            defs.insert(def.id.clone(), def);
            Ok(())
        }

        async fn delete(&self, id: &str) -> DomainResult<()> {
            self.defs.write().await.remove(id);
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryProcessEventStore {
        nodes: RwLock<HashMap<String, ProcessNode>>,
        events: RwLock<HashMap<String, Vec<ProcessEvent>>>,
    }

    impl InMemoryProcessEventStore {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl ProcessEventStore for InMemoryProcessEventStore {
        async fn put_event(&self, event: ProcessEvent) -> DomainResult<()> {
            self.events
                .write()
                .await
                .entry(event.process_id.clone())
                .or_default()
                .push(event);
            Ok(())
        }

        async fn put_node(&self, node: ProcessNode) -> DomainResult<()> {
            self.nodes.write().await.insert(node.id.clone(), node);
            Ok(())
        }

        async fn update_node(&self, node: ProcessNode) -> DomainResult<()> {
            self.put_node(node).await
        }

        async fn get_node(&self, id: &str) -> DomainResult<Option<ProcessNode>> {
            Ok(self.nodes.read().await.get(id).cloned())
        }

        async fn get_node_by_pid(&self, pid: u32) -> DomainResult<Option<ProcessNode>> {
            Ok(self
                .nodes
                .read()
                .await
                .values()
                .find(|n| n.pid == pid)
                .cloned())
        }

        async fn list(&self, filter: &ProcessFilter) -> DomainResult<Vec<ProcessNode>> {
            Ok(self
                .nodes
                .read()
                .await
                .values()
                .filter(|n| filter.matches(n))
                .cloned()
                .collect())
        }

        async fn tree(&self, root_id: &str) -> DomainResult<Vec<ProcessNode>> {
            let nodes = self.nodes.read().await;
            let mut result = Vec::new();
            let mut stack = vec![root_id.to_string()];
            while let Some(id) = stack.pop() {
                if let Some(node) = nodes.get(&id) {
                    result.push(node.clone());
                    stack.extend(
                        nodes
                            .values()
                            .filter(|n| n.parent_id.as_deref() == Some(id.as_str()))
                            .map(|n| n.id.clone()),
                    );
                }
            }
            Ok(result)
        }

        async fn graph(&self, filter: &ProcessFilter) -> DomainResult<ProcessGraphData> {
            let nodes = self.nodes.read().await;
            Ok(ProcessGraphData::build(
                nodes.values().filter(|n| filter.matches(n)),
            ))
        }

        async fn events(&self, process_id: &str, limit: usize) -> DomainResult<Vec<ProcessEvent>> {
            Ok(self
                .events
                .read()
                .await
                .get(process_id)
                .map(|events| events.iter().rev().take(limit).cloned().collect())
                .unwrap_or_default())
        }
    }
}
