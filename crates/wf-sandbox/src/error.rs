//! Error types for the sandbox runtime
//!
//! Provides error handling for:
//! - Code rejected by the safety re-check at mount time
//! - Nonce reuse across mounts
//! - Transport failures
//! - Malformed inbound messages

use wf_validation::SafetyViolation;

/// Sandbox runtime errors
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Code failed the safety re-check and was not mounted
    #[error("refusing to mount unsafe code: {0}")]
    Unsafe(#[from] SafetyViolation),

    /// Policy nonce was already used by an earlier mount
    #[error("nonce reuse rejected: {nonce}")]
    NonceReuse {
        /// The reused nonce
        nonce: String,
    },

    /// Transport could not deliver the document
    #[error("transport error: {0}")]
    Transport(String),

    /// Transport was closed by the other side
    #[error("transport closed")]
    Closed,
}

/// Inbound message failed shape validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// Payload is not a JSON object
    #[error("message is not an object")]
    NotAnObject,

    /// `type` missing or not a string
    #[error("message has no string `type` field")]
    MissingType,

    /// `type` is not part of the protocol
    #[error("unknown message type `{0}`")]
    UnknownType(String),

    /// Field not allowed for this message type
    #[error("unexpected field `{field}` in `{kind}` message")]
    UnexpectedField {
        /// Message type
        kind: &'static str,
        /// Offending field
        field: String,
    },

    /// Field present but of the wrong shape
    #[error("invalid `{kind}` message: {reason}")]
    InvalidField {
        /// Message type
        kind: &'static str,
        /// Decoder message
        reason: String,
    },
}
