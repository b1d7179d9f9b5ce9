//! # The `Conductor` Facade
//!
//! Wires the task manager, agent pool, execution engine, and process tracker
//! together over caller-supplied store implementations, the way a host
//! process (the HTTP/MCP surface, external to this core) would assemble
//! them once at startup.

use std::sync::Arc;

use conductor_domain::{AgentDefinitionStore, ArtifactStore, ProcessEventStore, TicketStore};
use conductor_orchestration::{AgentPool, Engine, ProcessTracker, TaskManager};
use conductor_secure::EnvelopeService;
use conductor_shared::CoreConfig;

/// The store implementations a caller provides: ticket store, artifact
/// store, agent-definition store, process event store. The process event
/// store is optional; the tracker runs in-memory-only without one.
pub struct ConductorStores {
    pub tickets: Arc<dyn TicketStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub agent_definitions: Arc<dyn AgentDefinitionStore>,
    pub process_events: Option<Arc<dyn ProcessEventStore>>,
}

/// One constructed orchestrator core: task manager, agent pool, execution
/// engine, and process tracker, sharing one envelope service identity.
pub struct Conductor {
    pub task_manager: Arc<TaskManager>,
    pub agent_pool: Arc<AgentPool>,
    pub engine: Engine,
    pub tracker: ProcessTracker,
    pub envelope: Arc<EnvelopeService>,
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor").finish_non_exhaustive()
    }
}

impl Conductor {
    /// Assemble a core from caller-supplied stores and configuration. Loads
    /// (or generates) the process identity at `config.envelope.identity_path`.
    pub fn new(stores: ConductorStores, config: &CoreConfig) -> conductor_secure::SecureResult<Self> {
        let envelope = Arc::new(EnvelopeService::with_identity_file(
            &config.envelope.identity_path,
        )?);

        let task_manager = Arc::new(TaskManager::new(
            stores.tickets,
            stores.artifacts,
            envelope.clone(),
        ));
        let agent_pool = Arc::new(AgentPool::new(stores.agent_definitions));
        let engine = Engine::new(task_manager.clone(), agent_pool.clone());
        let tracker = ProcessTracker::new(
            stores.process_events,
            config.tracker.tick(),
            config.tracker.subscriber_buffer_capacity,
        );

        Ok(Self {
            task_manager,
            agent_pool,
            engine,
            tracker,
            envelope,
        })
    }

    /// Register an execution backend with the engine. Order matters:
    /// `find_executor` picks the first registered backend whose
    /// `can_execute` accepts the task.
    pub fn register_executor(&self, executor: Arc<dyn conductor_orchestration::Executor>) {
        self.engine.register_executor(executor);
    }

    /// Start the tracker's background reconciliation loop.
    pub fn start(&self) {
        self.tracker.spawn_reconciliation_loop();
    }

    /// Stop the tracker's background reconciliation loop.
    pub fn stop(&self) {
        self.tracker.stop();
    }
}
