//! IPC Protocol definitions for daemon-client communication
//!
//! Uses JSON-RPC style request/response format over Unix socket, one JSON
//! document per line. After a successful `shutter.subscribe` the server keeps
//! the connection open and writes a [`Notification`] per shutter event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AccessoryConfig;
use crate::shutter::{Line, Position, PositionState, ShutterEvent, ShutterSnapshot};
use crate::Error;

/// JSON-RPC style request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

impl Request {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method: method.into(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }
}

/// JSON-RPC style response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl Response {
    pub fn success(id: Uuid, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Uuid, code: i32, message: impl Into<String>) -> Self {
        Self {
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Error response for a shutter error, carrying what the client needs to
    /// rebuild it
    pub fn from_error(id: Uuid, err: &Error) -> Self {
        let (code, data) = match err {
            Error::InvalidTarget(position) => (ERR_INVALID_TARGET, Some(ErrorData::InvalidTarget { position: *position })),
            Error::ActuationFailure { line, reason } => (
                ERR_ACTUATION,
                Some(ErrorData::Actuation {
                    line: *line,
                    reason: reason.clone(),
                }),
            ),
            Error::LineFaulted(line) => (ERR_ACTUATION, Some(ErrorData::Faulted { line: *line })),
            _ => (ERR_INTERNAL, None),
        };

        let mut response = Self::error(id, code, err.to_string());
        if let (Some(error), Some(data)) = (response.error.as_mut(), data) {
            error.data = serde_json::to_value(data).ok();
        }
        response
    }

    pub fn ok(id: Uuid) -> Self {
        Self::success(id, serde_json::json!({"ok": true}))
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Server-initiated message on a subscribed connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub method: String,
    pub params: ShutterEvent,
}

impl Notification {
    pub fn event(event: ShutterEvent) -> Self {
        Self {
            method: methods::SHUTTER_EVENT.to_string(),
            params: event,
        }
    }
}

/// RPC error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcError {
    /// Turn the wire error back into the crate error it was made from
    pub fn into_error(self) -> Error {
        let data = self
            .data
            .and_then(|value| serde_json::from_value::<ErrorData>(value).ok());

        match (self.code, data) {
            (ERR_INVALID_TARGET, Some(ErrorData::InvalidTarget { position })) => Error::InvalidTarget(position),
            (ERR_ACTUATION, Some(ErrorData::Actuation { line, reason })) => Error::ActuationFailure { line, reason },
            (ERR_ACTUATION, Some(ErrorData::Faulted { line })) => Error::LineFaulted(line),
            _ => Error::Other(format!("RPC error {}: {}", self.code, self.message)),
        }
    }
}

/// Structured detail attached to shutter errors
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorData {
    InvalidTarget { position: i64 },
    Actuation { line: Line, reason: String },
    Faulted { line: Line },
}

// Error codes
pub const ERR_PARSE: i32 = -32700;
pub const ERR_INVALID_REQUEST: i32 = -32600;
pub const ERR_METHOD_NOT_FOUND: i32 = -32601;
pub const ERR_INVALID_PARAMS: i32 = -32602;
pub const ERR_INTERNAL: i32 = -32603;
pub const ERR_DAEMON_NOT_RUNNING: i32 = -32000;
pub const ERR_INVALID_TARGET: i32 = -32001;
pub const ERR_ACTUATION: i32 = -32002;

// Method names
pub mod methods {
    pub const PING: &str = "ping";
    pub const STATUS: &str = "status";
    pub const ACCESSORY_INFO: &str = "accessory.info";

    // Shutter characteristics
    pub const SHUTTER_CURRENT_POSITION: &str = "shutter.current_position";
    pub const SHUTTER_TARGET_POSITION: &str = "shutter.target_position";
    pub const SHUTTER_POSITION_STATE: &str = "shutter.position_state";
    pub const SHUTTER_SNAPSHOT: &str = "shutter.snapshot";
    pub const SHUTTER_SET_TARGET: &str = "shutter.set_target";
    pub const SHUTTER_SUBSCRIBE: &str = "shutter.subscribe";

    // Notifications
    pub const SHUTTER_EVENT: &str = "shutter.event";
}

// Parameter structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTargetParams {
    pub position: i64,
    /// Skip the debounce window and wait for the press
    #[serde(default)]
    pub immediate: bool,
}

// Response structures

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub running: bool,
    pub uptime_secs: u64,
    pub started_at: DateTime<Utc>,
    pub shutter: ShutterSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionResponse {
    pub position: Position,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionStateResponse {
    pub state: PositionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessoryInfoResponse {
    pub name: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub firmware_revision: String,
}

impl From<&AccessoryConfig> for AccessoryInfoResponse {
    fn from(config: &AccessoryConfig) -> Self {
        Self {
            name: config.name.clone(),
            manufacturer: config.manufacturer.clone(),
            model: config.model.clone(),
            serial_number: config.serial_number.clone(),
            firmware_revision: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
