//! # Agent Pool (C5)
//!
//! Resolves built-in and user-defined agent definitions, and tracks live
//! `AgentInstance`s. Instance counts are bounded by concurrent executions,
//! so `get_by_task` is a deliberate linear scan rather than an index.

use conductor_domain::{
    agent::builtin_registry, AgentDefinition, AgentDefinitionStore, AgentInstance, InstanceStatus,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{OrchestrationError, OrchestrationResult};

pub struct AgentPool {
    builtins: HashMap<String, AgentDefinition>,
    wiki: Arc<dyn AgentDefinitionStore>,
    instances: RwLock<HashMap<String, AgentInstance>>,
}

impl std::fmt::Debug for AgentPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentPool")
            .field("builtin_count", &self.builtins.len())
            .field("instance_count", &self.instances.read().len())
            .finish()
    }
}

impl AgentPool {
    pub fn new(wiki: Arc<dyn AgentDefinitionStore>) -> Self {
        let builtins = builtin_registry()
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();
        Self {
            builtins,
            wiki,
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Resolution order: wiki (user-defined) first, falling back to built-in.
    pub async fn get(&self, id: &str) -> OrchestrationResult<Option<AgentDefinition>> {
        if let Some(def) = self.wiki.get(id).await? {
            return Ok(Some(def));
        }
        Ok(self.builtins.get(id).cloned())
    }

    pub async fn get_required(&self, id: &str) -> OrchestrationResult<AgentDefinition> {
        self.get(id)
            .await?
            .ok_or_else(|| OrchestrationError::AgentNotFound(id.to_string()))
    }

    /// Built-ins first, then wiki definitions, deduplicated by id with wiki winning.
    pub async fn list(&self) -> OrchestrationResult<Vec<AgentDefinition>> {
        let wiki_defs = self.wiki.list().await?;
        let wiki_ids: std::collections::HashSet<_> = wiki_defs.iter().map(|d| d.id.clone()).collect();

        let mut result: Vec<AgentDefinition> = self
            .builtins
            .values()
            .filter(|def| !wiki_ids.contains(&def.id))
            .cloned()
            .collect();
        result.extend(wiki_defs);
        Ok(result)
    }

    pub async fn delete(&self, id: &str) -> OrchestrationResult<()> {
        if self.builtins.contains_key(id) {
            return Err(conductor_domain::DomainError::BuiltinProtected { id: id.to_string() }.into());
        }
        self.wiki.delete(id).await?;
        Ok(())
    }

    pub fn register(&self, mut instance: AgentInstance) -> AgentInstance {
        instance.status = InstanceStatus::Running;
        instance.started_at = chrono::Utc::now();
        self.instances
            .write()
            .insert(instance.id.clone(), instance.clone());
        instance
    }

    /// Missing id is not an error — unregister is idempotent.
    pub fn unregister(&self, id: &str) {
        self.instances.write().remove(id);
    }

    pub fn get_by_task(&self, task_id: Uuid) -> Vec<AgentInstance> {
        self.instances
            .read()
            .values()
            .filter(|i| i.task_id == task_id)
            .cloned()
            .collect()
    }

    pub fn update_status(&self, id: &str, status: InstanceStatus) {
        if let Some(instance) = self.instances.write().get_mut(id) {
            instance.status = status;
        }
    }

    pub fn count(&self) -> usize {
        self.instances.read().len()
    }

    pub fn count_by_agent(&self, agent_type: &str) -> usize {
        self.instances
            .read()
            .values()
            .filter(|i| i.agent_type == agent_type)
            .count()
    }
}
