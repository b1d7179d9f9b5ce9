//! # conductor-core
//!
//! Stable re-export facade over the conductor workspace: `conductor-shared`
//! (ambient stack), `conductor-secure` (the encrypted-envelope service),
//! `conductor-domain` (data model and store traits), and
//! `conductor-orchestration` (task manager, agent pool, execution engine,
//! process tracker). Downstream consumers depend on this crate alone; the
//! workspace split exists for compile-time isolation and independent
//! versioning, not as a public API surface of its own.
//!
//! # Modules
//!
//! - [`shared`] — typed errors, layered configuration, tracing init, id generation
//! - [`secure`] — the encrypted-envelope service (component C1)
//! - [`domain`] — `Task`, `AgentDefinition`, `AgentInstance`, `ProcessNode`,
//!   and the store traits external collaborators implement
//! - [`orchestration`] — the task manager, agent pool, execution engine, and
//!   process tracker (components C4-C8)
//!
//! [`Conductor`] wires the four together for a caller that wants one
//! constructed object instead of assembling the pieces by hand.

pub mod domain {
    pub use conductor_domain::*;
}

pub mod orchestration {
    pub use conductor_orchestration::*;
}

pub mod secure {
    pub use conductor_secure::*;
}

pub mod shared {
    pub use conductor_shared::*;
}

mod conductor;

pub use conductor::{Conductor, ConductorStores};
