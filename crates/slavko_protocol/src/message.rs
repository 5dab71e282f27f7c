//! Protocol message model.
//!
//! A [`SlavkoMessage`] is the unit that travels on the bus and, in wire
//! form, inside a single line of model output. `module` and `status` are
//! mandatory; `action` and `payload` are optional. The timestamp is stamped
//! by the bus at emission time, never by the producer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ProtocolError, ProtocolResult};

/// Lifecycle marker on a protocol message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Init,
    Ready,
    Waiting,
    Done,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Init => "INIT",
            Status::Ready => "READY",
            Status::Waiting => "WAITING",
            Status::Done => "DONE",
            Status::Error => "ERROR",
        }
    }

    /// Parse a wire spelling. Case-sensitive: `done` is not a status.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(Status::Init),
            "READY" => Some(Status::Ready),
            "WAITING" => Some(Status::Waiting),
            "DONE" => Some(Status::Done),
            "ERROR" => Some(Status::Error),
            _ => None,
        }
    }

    pub fn all() -> Vec<Self> {
        vec![
            Status::Init,
            Status::Ready,
            Status::Waiting,
            Status::Done,
            Status::Error,
        ]
    }

    /// Whether this status ends a logical operation's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subsystem tag on a protocol message.
///
/// Known tags get a variant; anything else is preserved verbatim in
/// [`Module::Other`] so that new directive vocabularies flow through the
/// bus without a code change. Tags are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Module {
    Kernel,
    Deploy,
    HealthCheck,
    Cleanup,
    Session,
    Other(String),
}

impl Module {
    pub fn as_str(&self) -> &str {
        match self {
            Module::Kernel => "KERNEL",
            Module::Deploy => "DEPLOY",
            Module::HealthCheck => "HEALTH_CHECK",
            Module::Cleanup => "CLEANUP",
            Module::Session => "SESSION",
            Module::Other(tag) => tag,
        }
    }

    /// Map a wire tag to a module. Unknown tags are preserved, not
    /// rejected; only the empty tag is invalid.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "" => None,
            "KERNEL" => Some(Module::Kernel),
            "DEPLOY" => Some(Module::Deploy),
            "HEALTH_CHECK" => Some(Module::HealthCheck),
            "CLEANUP" => Some(Module::Cleanup),
            "SESSION" => Some(Module::Session),
            other => Some(Module::Other(other.to_string())),
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for Module {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Module {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Module::from_tag(&tag).ok_or_else(|| serde::de::Error::custom("empty module tag"))
    }
}

/// A single protocol message.
///
/// Immutable once constructed: the bus delivers each message to
/// subscribers by shared reference, and subscribers only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlavkoMessage {
    /// Subsystem the message concerns.
    pub module: Module,
    /// Operation within the module. Absence is distinct from `Some("")`;
    /// both are legal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    /// Lifecycle marker.
    pub status: Status,
    /// Untyped structured data, interpreted only by the subscriber
    /// matching on `module`/`action`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Stamped by the bus at emission; `None` until then.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl SlavkoMessage {
    /// Create a new message with the mandatory fields.
    pub fn new(module: Module, status: Status) -> Self {
        Self {
            module,
            action: None,
            status,
            payload: None,
            timestamp: None,
        }
    }

    /// Set the action.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the payload.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether this message ends a logical operation's lifecycle.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Validate a raw candidate into a message.
    ///
    /// Rejects structurally malformed input only: a candidate without a
    /// recognizable `module` or `status`, or with a `status` outside the
    /// five lifecycle values. An unknown module is not an error.
    pub fn validate(raw: Value) -> ProtocolResult<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ProtocolError::InvalidMessage("not an object".to_string()))?;

        let module_tag = obj
            .get("module")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidMessage("missing module".to_string()))?;
        let module = Module::from_tag(module_tag)
            .ok_or_else(|| ProtocolError::InvalidMessage("empty module".to_string()))?;

        let status_tag = obj
            .get("status")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidMessage("missing status".to_string()))?;
        let status = Status::from_str(status_tag)
            .ok_or_else(|| ProtocolError::UnknownStatus(status_tag.to_string()))?;

        let action = match obj.get("action") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "action must be a string, got {}",
                    other
                )))
            }
        };

        let payload = match obj.get("payload") {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        };

        Ok(Self {
            module,
            action,
            status,
            payload,
            timestamp: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_spellings() {
        for status in Status::all() {
            assert_eq!(Status::from_str(status.as_str()), Some(status));
        }
        assert_eq!(Status::from_str("done"), None);
        assert_eq!(Status::from_str("PENDING"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(Status::Done.is_terminal());
        assert!(Status::Error.is_terminal());
        assert!(!Status::Waiting.is_terminal());
    }

    #[test]
    fn test_unknown_module_preserved() {
        let module = Module::from_tag("TELEMETRY").unwrap();
        assert_eq!(module, Module::Other("TELEMETRY".to_string()));
        assert_eq!(module.as_str(), "TELEMETRY");
        // Case-sensitive: lowercase is an unknown tag, not DEPLOY.
        assert_eq!(
            Module::from_tag("deploy").unwrap(),
            Module::Other("deploy".to_string())
        );
        assert_eq!(Module::from_tag(""), None);
    }

    #[test]
    fn test_validate_accepts_minimal() {
        let msg =
            SlavkoMessage::validate(json!({"module": "DEPLOY", "status": "INIT"})).unwrap();
        assert_eq!(msg.module, Module::Deploy);
        assert_eq!(msg.status, Status::Init);
        assert_eq!(msg.action, None);
        assert_eq!(msg.payload, None);
        assert_eq!(msg.timestamp, None);
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert!(SlavkoMessage::validate(json!("DEPLOY")).is_err());
        assert!(SlavkoMessage::validate(json!({"status": "DONE"})).is_err());
        assert!(SlavkoMessage::validate(json!({"module": "DEPLOY"})).is_err());
        assert!(
            SlavkoMessage::validate(json!({"module": "DEPLOY", "status": "RUNNING"})).is_err()
        );
        assert!(SlavkoMessage::validate(json!({"module": "", "status": "DONE"})).is_err());
    }

    #[test]
    fn test_validate_keeps_unknown_module() {
        let msg = SlavkoMessage::validate(json!({
            "module": "TELEMETRY",
            "action": "FLUSH",
            "status": "DONE",
            "payload": {"count": 3},
        }))
        .unwrap();
        assert_eq!(msg.module, Module::Other("TELEMETRY".to_string()));
        assert_eq!(msg.action.as_deref(), Some("FLUSH"));
        assert_eq!(msg.payload, Some(json!({"count": 3})));
    }

    #[test]
    fn test_empty_action_is_distinct_from_absent() {
        let absent =
            SlavkoMessage::validate(json!({"module": "DEPLOY", "status": "DONE"})).unwrap();
        let empty = SlavkoMessage::validate(
            json!({"module": "DEPLOY", "action": "", "status": "DONE"}),
        )
        .unwrap();
        assert_eq!(absent.action, None);
        assert_eq!(empty.action, Some(String::new()));
        assert_ne!(absent, empty);
    }

    #[test]
    fn test_serde_round_trip() {
        let msg = SlavkoMessage::new(Module::HealthCheck, Status::Waiting)
            .with_action("PING")
            .with_payload(json!({"url": "https://x"}));
        let encoded = serde_json::to_string(&msg).unwrap();
        let decoded: SlavkoMessage = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }
}
