//! # Shared Error Kinds
//!
//! One `thiserror` enum covering the error categories not owned by a
//! single downstream crate. Each
//! downstream crate (`conductor-secure`, `conductor-domain`,
//! `conductor-orchestration`) defines its own error enum and converts into or
//! out of this one at the boundary via `#[from]`, following a
//! one-enum-per-crate convention rather than a single god-enum.

use thiserror::Error;

/// Result alias used throughout `conductor-shared`.
pub type SharedResult<T> = Result<T, SharedError>;

#[derive(Debug, Error)]
pub enum SharedError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

impl SharedError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
