//! Sandbox message protocol
//!
//! Messages are tagged by a kebab-case `type` field. Inbound payloads are
//! checked against the allowed field set of their type before any field is
//! decoded; anything else is a [`ProtocolError`].

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Origin reported for frames running with an opaque origin
pub const OPAQUE_ORIGIN: &str = "null";

/// Allowed fields per message type, besides `type`
const MESSAGE_FIELDS: &[(&str, &[&str])] = &[
    ("ready", &[]),
    ("runtime-error", &["message", "stack"]),
    ("runtime-log", &["data"]),
    ("load", &["js"]),
    ("security-violation", &["directive", "blocked_uri"]),
];

/// Message crossing the sandbox boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxMessage {
    /// Document finished mounting
    Ready,
    /// Uncaught error or unhandled rejection
    RuntimeError {
        /// Error message
        message: String,
        /// Stack trace, if any
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    /// Diagnostic log forwarded by the document
    RuntimeLog {
        /// Arbitrary JSON payload
        data: Value,
    },
    /// Host-to-sandbox code delivery
    Load {
        /// Script source
        js: String,
    },
    /// CSP violation observed in the document
    SecurityViolation {
        /// Violated directive
        directive: String,
        /// Blocked resource, if reported
        #[serde(default, skip_serializing_if = "Option::is_none")]
        blocked_uri: Option<String>,
    },
}

impl SandboxMessage {
    /// Wire name of the message type
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::RuntimeError { .. } => "runtime-error",
            Self::RuntimeLog { .. } => "runtime-log",
            Self::Load { .. } => "load",
            Self::SecurityViolation { .. } => "security-violation",
        }
    }

    /// Whether this message only flows host to sandbox
    #[inline]
    #[must_use]
    pub fn is_host_direction(&self) -> bool {
        matches!(self, Self::Load { .. })
    }

    /// Validate shape and decode
    ///
    /// # Errors
    /// Returns [`ProtocolError`] for non-objects, unknown types, extra or
    /// missing fields, and fields of the wrong JSON type.
    pub fn from_value(value: &Value) -> Result<Self, ProtocolError> {
        let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::MissingType)?;

        let &(kind, allowed) = MESSAGE_FIELDS
            .iter()
            .find(|(name, _)| *name == kind)
            .ok_or_else(|| ProtocolError::UnknownType(kind.to_string()))?;

        if let Some(field) = object
            .keys()
            .find(|key| key.as_str() != "type" && !allowed.contains(&key.as_str()))
        {
            return Err(ProtocolError::UnexpectedField {
                kind,
                field: field.clone(),
            });
        }

        serde_json::from_value(value.clone()).map_err(|e| ProtocolError::InvalidField {
            kind,
            reason: e.to_string(),
        })
    }
}

/// One inbound delivery from a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Mount the sending document belongs to
    pub mount_id: u64,
    /// Origin reported by the channel
    pub origin: String,
    /// Raw payload, not yet validated
    pub payload: Value,
}

impl Envelope {
    /// Create envelope
    #[inline]
    #[must_use]
    pub fn new(mount_id: u64, origin: impl Into<String>, payload: Value) -> Self {
        Self {
            mount_id,
            origin: origin.into(),
            payload,
        }
    }
}

/// Validated sandbox event delivered to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxEvent {
    /// Document mounted
    Ready,
    /// Sanitized runtime error
    RuntimeError {
        /// Sanitized message
        message: String,
        /// Sanitized stack, at most five lines
        stack: Option<String>,
    },
    /// Log payload
    RuntimeLog {
        /// Arbitrary JSON payload
        data: Value,
    },
    /// Sanitized CSP violation
    SecurityViolation {
        /// Violated directive
        directive: String,
        /// Sanitized blocked resource
        blocked_uri: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn ready_roundtrip_shape() {
        let value = serde_json::to_value(SandboxMessage::Ready).unwrap();
        assert_eq!(value, json!({ "type": "ready" }));
        assert_eq!(SandboxMessage::from_value(&value).unwrap(), SandboxMessage::Ready);
    }

    #[test]
    fn runtime_error_with_optional_stack() {
        let msg = SandboxMessage::from_value(&json!({
            "type": "runtime-error",
            "message": "boom",
        }))
        .unwrap();
        assert_eq!(
            msg,
            SandboxMessage::RuntimeError {
                message: "boom".to_string(),
                stack: None
            }
        );
    }

    #[test]
    fn rejects_non_objects_and_unknown_types() {
        assert_eq!(
            SandboxMessage::from_value(&json!("ready")),
            Err(ProtocolError::NotAnObject)
        );
        assert_eq!(
            SandboxMessage::from_value(&json!({ "kind": "ready" })),
            Err(ProtocolError::MissingType)
        );
        assert_eq!(
            SandboxMessage::from_value(&json!({ "type": "exec" })),
            Err(ProtocolError::UnknownType("exec".to_string()))
        );
    }

    #[test]
    fn rejects_extra_fields() {
        let err = SandboxMessage::from_value(&json!({ "type": "ready", "js": "x" })).unwrap_err();
        assert!(matches!(err, ProtocolError::UnexpectedField { kind: "ready", .. }));
    }

    #[test]
    fn rejects_wrong_field_types() {
        let err = SandboxMessage::from_value(&json!({ "type": "load", "js": 42 })).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { kind: "load", .. }));

        let err = SandboxMessage::from_value(&json!({ "type": "runtime-error" })).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField { kind: "runtime-error", .. }));
    }

    #[test]
    fn load_is_host_direction() {
        let msg = SandboxMessage::from_value(&json!({ "type": "load", "js": "1" })).unwrap();
        assert!(msg.is_host_direction());
        assert_eq!(msg.kind(), "load");
    }
}
