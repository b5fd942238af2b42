//! Engine wire protocol: newline-delimited JSON over a Unix stream socket.
//!
//! One request line, one response line. A `subscribe-events` connection
//! stays open after its response and carries one [`ConfigEvent`] per line
//! until the engine closes it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CMD_LIST_CONFIGS: &str = "list-configs";
pub const CMD_INSPECT_CONFIG: &str = "inspect-config";
pub const CMD_LIST_SERVICES: &str = "list-services";
pub const CMD_SUBSCRIBE_EVENTS: &str = "subscribe-events";

/// JSON newline-delimited request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRequest {
    pub cmd: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SourceRequest {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            id: None,
        }
    }

    pub fn with_id(cmd: &str, id: impl Into<String>) -> Self {
        Self {
            cmd: cmd.to_string(),
            id: Some(id.into()),
        }
    }
}

/// JSON newline-delimited response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Unwrap the payload or surface the engine's error message.
    pub fn into_data(self) -> Result<Value, crate::SourceError> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(crate::SourceError::Protocol(
                self.error
                    .unwrap_or_else(|| "unknown engine error".to_string()),
            ))
        }
    }
}
