//! # conductor-orchestration
//!
//! The hard engineering of the orchestrator (components C4-C8): the
//! task manager, the agent pool, the executor capability set, the execution
//! engine, and the process tracker. Everything here is built against the
//! store and executor traits in `conductor-domain`; no persistence or
//! subprocess plumbing lives in this crate itself.

pub mod agent_pool;
pub mod engine;
pub mod error;
pub mod executor;
pub mod task_manager;
pub mod tracker;

pub use agent_pool::AgentPool;
pub use engine::Engine;
pub use error::{OrchestrationError, OrchestrationResult};
pub use executor::{ExecutionContext, ExecutionRequest, ExecutionResult, Executor};
pub use task_manager::{ProgressWatchHandle, TaskManager};
pub use tracker::{GraphEdge, GraphNode, ProcessGraphData, ProcessTracker, TrackerStats};
