//! Line-delimited JSON messages exchanged over the external command socket.
//!
//! Every message is a flat JSON object with a numeric `message_type` field
//! followed by the type's own fields, e.g.
//! `{"message_type": 3, "key": 5, "duration": 2.0}`.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};

use crate::error::{DpError, Result};

pub const DEFAULT_COMMAND_HOST: &str = "127.0.0.1";
pub const DEFAULT_COMMAND_PORT: u16 = 27876;
pub const DEFAULT_PUSH_DURATION: f64 = 2.0;
/// Longest hold a push may request, in seconds.
pub const MAX_PUSH_DURATION: f64 = 3600.0;

/// Numeric message type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum ExternalMessageType {
    Error = 0,
    Echo = 1,
    Pong = 2,
    Push = 3,
    PushAck = 4,
}

impl ExternalMessageType {
    const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Error),
            1 => Some(Self::Echo),
            2 => Some(Self::Pong),
            3 => Some(Self::Push),
            4 => Some(Self::PushAck),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExternalCommandMessage {
    /// Reply to a line that could not be handled.
    Error { message: String },
    /// Liveness check; answered with [`ExternalCommandMessage::Pong`].
    Echo { message: String },
    Pong {
        message: String,
        echo: Option<String>,
    },
    /// Press `key` for `duration` seconds.
    Push { key: u32, duration: f64 },
    PushAck {
        key: i64,
        duration: f64,
        success: bool,
        error: Option<String>,
    },
    /// A message type this build does not know, kept verbatim.
    Unknown {
        message_type: i64,
        payload: Map<String, Value>,
    },
}

impl ExternalCommandMessage {
    pub fn echo(message: impl Into<String>) -> Self {
        Self::Echo {
            message: message.into(),
        }
    }

    pub fn pong(echo: Option<String>) -> Self {
        Self::Pong {
            message: "PONG".to_string(),
            echo,
        }
    }

    /// Build a validated push command.
    pub fn push(key: i64, duration: f64) -> Result<Self> {
        if key < 0 {
            return Err(DpError::CommandMessage("key must be >= 0".into()));
        }
        let key = u32::try_from(key)
            .map_err(|_| DpError::CommandMessage(format!("key {key} out of range")))?;
        if !duration.is_finite() || duration <= 0.0 {
            return Err(DpError::CommandMessage("duration must be > 0".into()));
        }
        if duration > MAX_PUSH_DURATION {
            return Err(DpError::CommandMessage(format!(
                "duration must be at most {MAX_PUSH_DURATION} seconds"
            )));
        }
        Ok(Self::Push { key, duration })
    }

    pub fn push_ack(key: u32, duration: f64, outcome: std::result::Result<(), String>) -> Self {
        Self::PushAck {
            key: i64::from(key),
            duration,
            success: outcome.is_ok(),
            error: outcome.err(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn message_type(&self) -> i64 {
        match self {
            Self::Error { .. } => ExternalMessageType::Error as i64,
            Self::Echo { .. } => ExternalMessageType::Echo as i64,
            Self::Pong { .. } => ExternalMessageType::Pong as i64,
            Self::Push { .. } => ExternalMessageType::Push as i64,
            Self::PushAck { .. } => ExternalMessageType::PushAck as i64,
            Self::Unknown { message_type, .. } => *message_type,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert("message_type".into(), json!(self.message_type()));
        match self {
            Self::Error { message } | Self::Echo { message } => {
                object.insert("message".into(), json!(message));
            }
            Self::Pong { message, echo } => {
                object.insert("message".into(), json!(message));
                if let Some(echo) = echo {
                    object.insert("echo".into(), json!(echo));
                }
            }
            Self::Push { key, duration } => {
                object.insert("key".into(), json!(key));
                object.insert("duration".into(), json!(duration));
            }
            Self::PushAck {
                key,
                duration,
                success,
                error,
            } => {
                object.insert("key".into(), json!(key));
                object.insert("duration".into(), json!(duration));
                object.insert("success".into(), json!(success));
                if let Some(error) = error.as_ref().filter(|e| !e.is_empty()) {
                    object.insert("error".into(), json!(error));
                }
            }
            Self::Unknown { payload, .. } => {
                for (k, v) in payload {
                    object.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
        Value::Object(object)
    }

    /// Serialize as a single JSON line (no trailing newline).
    pub fn to_json(&self) -> String {
        self.to_value().to_string()
    }

    pub fn parse_line(line: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(line.trim())
            .map_err(|e| DpError::CommandMessage(format!("invalid JSON: {e}")))?;
        Self::from_value(&value)
    }

    pub fn from_value(raw: &Value) -> Result<Self> {
        let object = raw
            .as_object()
            .ok_or_else(|| DpError::CommandMessage("message must be a JSON object".into()))?;
        let code = object
            .get("message_type")
            .ok_or_else(|| DpError::CommandMessage("message_type field is required".into()))
            .and_then(|v| as_int(v, "message_type"))?;

        let text = |field: &str, default: &str| {
            object
                .get(field)
                .map_or_else(|| default.to_string(), value_to_string)
        };

        let Some(kind) = ExternalMessageType::from_code(code) else {
            let mut payload = object.clone();
            payload.remove("message_type");
            return Ok(Self::Unknown {
                message_type: code,
                payload,
            });
        };

        match kind {
            ExternalMessageType::Error => Ok(Self::error(text("message", ""))),
            ExternalMessageType::Echo => Ok(Self::echo(text("message", ""))),
            ExternalMessageType::Pong => Ok(Self::Pong {
                message: text("message", "PONG"),
                echo: object.get("echo").filter(|v| !v.is_null()).map(value_to_string),
            }),
            ExternalMessageType::Push => {
                let key = object.get("key").ok_or_else(|| {
                    DpError::CommandMessage("push command requires a 'key' field".into())
                })?;
                let duration = match object.get("duration") {
                    Some(v) => as_float(v, "duration")?,
                    None => DEFAULT_PUSH_DURATION,
                };
                Self::push(as_int(key, "key")?, duration)
            }
            ExternalMessageType::PushAck => Ok(Self::PushAck {
                key: object.get("key").map_or(Ok(-1), |v| as_int(v, "key"))?,
                duration: object
                    .get("duration")
                    .map_or(Ok(0.0), |v| as_float(v, "duration"))?,
                success: object.get("success").and_then(Value::as_bool).unwrap_or(false),
                error: object.get("error").filter(|v| !v.is_null()).map(value_to_string),
            }),
        }
    }
}

impl Serialize for ExternalCommandMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation)] // Integral floats only
fn as_int(value: &Value, field: &str) -> Result<i64> {
    let bad = || DpError::CommandMessage(format!("'{field}' must be an integer"));
    match value {
        Value::Number(n) => n.as_i64().map_or_else(
            || {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| f as i64)
                    .ok_or_else(bad)
            },
            Ok,
        ),
        Value::String(s) => s.trim().parse().map_err(|_| bad()),
        _ => Err(bad()),
    }
}

fn as_float(value: &Value, field: &str) -> Result<f64> {
    let bad = || DpError::CommandMessage(format!("'{field}' must be a number"));
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(bad),
        Value::String(s) => s.trim().parse().map_err(|_| bad()),
        _ => Err(bad()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_defaults_duration() {
        let msg = ExternalCommandMessage::parse_line(r#"{"message_type": 3, "key": 5}"#).unwrap();
        assert_eq!(
            msg,
            ExternalCommandMessage::Push {
                key: 5,
                duration: 2.0
            }
        );
    }

    #[test]
    fn test_push_validation() {
        assert!(ExternalCommandMessage::parse_line(r#"{"message_type": 3}"#).is_err());
        assert!(ExternalCommandMessage::parse_line(r#"{"message_type": 3, "key": -1}"#).is_err());
        assert!(
            ExternalCommandMessage::parse_line(r#"{"message_type": 3, "key": 1, "duration": 0}"#)
                .is_err()
        );
    }

    #[test]
    fn test_push_duration_upper_bound() {
        assert!(ExternalCommandMessage::push(1, MAX_PUSH_DURATION).is_ok());
        for duration in ["3600.5", "1e18", "1e20"] {
            let line = format!(r#"{{"message_type": 3, "key": 0, "duration": {duration}}}"#);
            let err = ExternalCommandMessage::parse_line(&line).unwrap_err();
            assert!(err.to_string().contains("at most"), "{duration}: {err}");
        }
    }

    #[test]
    fn test_missing_message_type() {
        let err = ExternalCommandMessage::parse_line(r#"{"message": "hi"}"#).unwrap_err();
        assert!(err.to_string().contains("message_type"));
    }

    #[test]
    fn test_unknown_type_keeps_payload() {
        let msg =
            ExternalCommandMessage::parse_line(r#"{"message_type": 42, "foo": "bar"}"#).unwrap();
        let ExternalCommandMessage::Unknown {
            message_type,
            payload,
        } = &msg
        else {
            panic!("expected unknown message, got {msg:?}");
        };
        assert_eq!(*message_type, 42);
        assert_eq!(payload.get("foo"), Some(&json!("bar")));
        assert_eq!(msg.to_value(), json!({"message_type": 42, "foo": "bar"}));
    }

    #[test]
    fn test_pong_wire_format() {
        let pong = ExternalCommandMessage::pong(Some("PING".into()));
        assert_eq!(
            pong.to_value(),
            json!({"message_type": 2, "message": "PONG", "echo": "PING"})
        );
        assert_eq!(
            ExternalCommandMessage::pong(None).to_value(),
            json!({"message_type": 2, "message": "PONG"})
        );
    }

    #[test]
    fn test_push_ack_omits_empty_error() {
        let ok = ExternalCommandMessage::push_ack(1, 0.5, Ok(()));
        assert_eq!(
            ok.to_value(),
            json!({"message_type": 4, "key": 1, "duration": 0.5, "success": true})
        );
        let failed = ExternalCommandMessage::push_ack(99, 1.0, Err("key out of range".into()));
        assert_eq!(failed.to_value()["error"], "key out of range");
        assert_eq!(failed.to_value()["success"], false);
    }

    #[test]
    fn test_message_type_accepts_numeric_strings() {
        let msg = ExternalCommandMessage::parse_line(r#"{"message_type": "1", "message": "x"}"#)
            .unwrap();
        assert_eq!(msg, ExternalCommandMessage::echo("x"));
    }
}
