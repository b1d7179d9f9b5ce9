//! # conductor-domain
//!
//! The data model shared by every other crate in the workspace:
//! `Task`, `AgentDefinition`, `AgentInstance`, `ProcessNode`/`ProcessEvent`,
//! `TaskProgress`, and the store traits external collaborators implement.
//! No engine logic lives here — see `conductor-orchestration`.

pub mod agent;
pub mod error;
pub mod filter;
pub mod instance;
pub mod process;
pub mod progress;
pub mod stores;
pub mod task;

pub use agent::{AgentDefinition, AgentDefinitionOrigin, ResourceLimits};
pub use conductor_secure::EncryptedPayload;
pub use error::{DomainError, DomainResult};
pub use filter::{ProcessFilter, TaskFilter, TaskStats};
pub use instance::{AgentInstance, InstanceStatus};
pub use process::{
    GraphEdge, GraphNode, ProcessEvent, ProcessEventType, ProcessGraphData, ProcessNode,
    ProcessStatus, TrackerStats,
};
pub use progress::{TaskProgress, TaskSecrets};
pub use stores::{AgentDefinitionStore, ArtifactStore, ProcessEventStore, TicketStore};
pub use task::{ExecutionMode, Task, TaskPatch, TaskStatus};
