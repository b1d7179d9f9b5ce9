//! # conductor-secure
//!
//! Asymmetric per-recipient encrypted envelope service (component C1).
//! Task secrets and provider credentials travel as [`EncryptedPayload`]s
//! alongside tasks; this crate is the only thing that ever sees plaintext.

pub mod envelope;
pub mod error;
pub mod identity;
pub mod service;

pub use envelope::EncryptedPayload;
pub use error::{SecureError, SecureResult};
pub use identity::Identity;
pub use service::EnvelopeService;
