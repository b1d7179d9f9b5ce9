//! # Agent Definition
//!
//! An immutable-per-version recipe. Built-in definitions are hard-coded
//! defaults; user-defined definitions are persisted externally (a
//! wiki-like store) and override built-ins by id. Built-ins are never
//! deleted.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub max_turns: u32,
    pub timeout_minutes: u32,
    pub max_cost_usd: f64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_turns: 50,
            timeout_minutes: 30,
            max_cost_usd: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentDefinitionOrigin {
    BuiltIn,
    UserDefined,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub base_runtime: String,
    pub system_prompt: String,
    pub mcp_servers: Vec<String>,
    pub default_model: String,
    pub resource_limits: ResourceLimits,
    pub origin: AgentDefinitionOrigin,
    /// Bumped on every `save` of a user-defined override.
    pub version: u32,
}

impl AgentDefinition {
    pub fn builtin(
        id: &str,
        name: &str,
        description: &str,
        system_prompt: &str,
        default_model: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            base_runtime: "local-shell".to_string(),
            system_prompt: system_prompt.to_string(),
            mcp_servers: Vec::new(),
            default_model: default_model.to_string(),
            resource_limits: ResourceLimits::default(),
            origin: AgentDefinitionOrigin::BuiltIn,
            version: 1,
        }
    }
}

/// The built-in registry seeded at process start: a general-purpose coder
/// plus two illustrative specialists.
pub fn builtin_registry() -> Vec<AgentDefinition> {
    vec![
        AgentDefinition::builtin(
            "general-coder",
            "General Coder",
            "General-purpose coding agent for arbitrary tasks.",
            "You are a careful, methodical software engineer.",
            "claude-default",
        ),
        AgentDefinition::builtin(
            "reviewer",
            "Code Reviewer",
            "Reviews a diff for correctness and style issues.",
            "You are a thorough, skeptical code reviewer.",
            "claude-default",
        ),
        AgentDefinition::builtin(
            "test-writer",
            "Test Writer",
            "Writes tests for existing, untested code.",
            "You write focused, realistic tests, not mechanical round-trips.",
            "claude-default",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_distinct_ids() {
        let ids: std::collections::HashSet<_> =
            builtin_registry().into_iter().map(|d| d.id).collect();
        assert_eq!(ids.len(), 3);
    }
}
