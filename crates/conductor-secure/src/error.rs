//! Error kinds for the envelope service: the decrypt_failed family plus
//! identity and key-format failures.

use thiserror::Error;

pub type SecureResult<T> = Result<T, SecureError>;

#[derive(Debug, Error)]
pub enum SecureError {
    #[error("no recipient public key supplied, or it is malformed")]
    NoRecipients,

    #[error("envelope service has no configured identity")]
    NoIdentity,

    #[error("envelope version {found} is not supported (only version 1 is defined)")]
    VersionMismatch { found: u32 },

    #[error("envelope payload is corrupt: {reason}")]
    CorruptPayload { reason: String },

    #[error("identity does not match the recipient used at encryption time")]
    WrongRecipient,

    #[error("identity file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
