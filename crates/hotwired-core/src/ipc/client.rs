//! IPC Client for connecting to daemon
//!
//! Provides a type-safe interface for communicating with the daemon.

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

use super::protocol::*;
use crate::shutter::{Position, PositionState, ShutterEvent, ShutterSnapshot};
use crate::{Error, Result};

/// Client for communicating with the daemon
#[derive(Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Create a new daemon client
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    /// Check if daemon is running by sending a ping
    pub async fn ping(&self) -> Result<bool> {
        match self.call(methods::PING, serde_json::Value::Null).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<StatusResponse> {
        let result = self.call(methods::STATUS, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn accessory_info(&self) -> Result<AccessoryInfoResponse> {
        let result = self.call(methods::ACCESSORY_INFO, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn current_position(&self) -> Result<Position> {
        let result = self.call(methods::SHUTTER_CURRENT_POSITION, serde_json::Value::Null).await?;
        let response: PositionResponse = serde_json::from_value(result)?;
        Ok(response.position)
    }

    pub async fn target_position(&self) -> Result<Position> {
        let result = self.call(methods::SHUTTER_TARGET_POSITION, serde_json::Value::Null).await?;
        let response: PositionResponse = serde_json::from_value(result)?;
        Ok(response.position)
    }

    pub async fn position_state(&self) -> Result<PositionState> {
        let result = self.call(methods::SHUTTER_POSITION_STATE, serde_json::Value::Null).await?;
        let response: PositionStateResponse = serde_json::from_value(result)?;
        Ok(response.state)
    }

    pub async fn snapshot(&self) -> Result<ShutterSnapshot> {
        let result = self.call(methods::SHUTTER_SNAPSHOT, serde_json::Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Request a new target position
    ///
    /// With `immediate` the debounce window is skipped and the call returns
    /// once the button press has completed.
    pub async fn set_target(&self, position: i64, immediate: bool) -> Result<()> {
        let params = serde_json::json!({
            "position": position,
            "immediate": immediate
        });
        self.call(methods::SHUTTER_SET_TARGET, params).await?;
        Ok(())
    }

    /// Open a connection that receives every shutter event
    pub async fn subscribe(&self) -> Result<EventStream> {
        let (mut reader, mut writer) = self.connect().await?;
        let request = Request::new(methods::SHUTTER_SUBSCRIBE);
        send_request(&mut writer, &request).await?;
        read_response(&mut reader).await?;

        Ok(EventStream {
            reader,
            _writer: writer,
            line: String::new(),
        })
    }

    async fn connect(&self) -> Result<(BufReader<OwnedReadHalf>, OwnedWriteHalf)> {
        let stream = UnixStream::connect(&self.socket_path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to connect to daemon at {}: {}. Is the daemon running?",
                self.socket_path.display(),
                e
            ))
        })?;

        let (reader, writer) = stream.into_split();
        Ok((BufReader::new(reader), writer))
    }

    /// Send a request and receive a response
    pub(crate) async fn call(&self, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
        let (mut reader, mut writer) = self.connect().await?;
        let request = Request::new(method).with_params(params);
        send_request(&mut writer, &request).await?;
        read_response(&mut reader).await
    }
}

async fn send_request(writer: &mut OwnedWriteHalf, request: &Request) -> Result<()> {
    let request_json = serde_json::to_string(request)?;
    writer.write_all(request_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn read_response(reader: &mut BufReader<OwnedReadHalf>) -> Result<serde_json::Value> {
    let mut response_line = String::new();
    reader.read_line(&mut response_line).await?;

    let response: Response = serde_json::from_str(&response_line)?;

    if let Some(error) = response.error {
        return Err(error.into_error());
    }

    response.result.ok_or_else(|| Error::Other("Empty response".to_string()))
}

/// Shutter events pushed by the daemon on a subscribed connection
pub struct EventStream {
    reader: BufReader<OwnedReadHalf>,
    // Dropping the write half would half-close the connection
    _writer: OwnedWriteHalf,
    line: String,
}

impl EventStream {
    /// Next event, or `None` once the daemon closes the connection
    pub async fn next(&mut self) -> Result<Option<ShutterEvent>> {
        self.line.clear();
        if self.reader.read_line(&mut self.line).await? == 0 {
            return Ok(None);
        }
        let notification: Notification = serde_json::from_str(&self.line)?;
        Ok(Some(notification.params))
    }
}

/// Check if daemon is reachable
pub async fn is_daemon_running(socket_path: &std::path::Path) -> bool {
    let client = DaemonClient::new(socket_path.to_path_buf());
    client.ping().await.unwrap_or(false)
}
