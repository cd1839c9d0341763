//! IPC Server for daemon
//!
//! Listens on Unix socket and answers host requests against the shutter
//! service. Subscribed connections receive every shutter event.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::protocol::*;
use crate::config::AppConfig;
use crate::shutter::{ShutterEvent, ShutterHandle};
use crate::Result;

/// State shared by every connection
struct ServerContext {
    shutter: ShutterHandle,
    config: Arc<AppConfig>,
    start_time: Instant,
    started_at: DateTime<Utc>,
}

/// IPC Server that handles client connections
pub struct DaemonServer {
    context: Arc<ServerContext>,
    socket_path: PathBuf,
}

impl DaemonServer {
    pub fn new(shutter: ShutterHandle, config: Arc<AppConfig>) -> Self {
        let socket_path = config.socket_path();
        Self {
            context: Arc::new(ServerContext {
                shutter,
                config,
                start_time: Instant::now(),
                started_at: Utc::now(),
            }),
            socket_path,
        }
    }

    /// Run the IPC server
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        // Remove old socket file if exists
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        // Ensure parent directory exists
        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on: {}", self.socket_path.display());

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _)) => {
                            let context = self.context.clone();
                            let shutdown = shutdown_rx.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, context, shutdown).await {
                                    warn!("Error handling connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                result = shutdown_rx.changed() => {
                    if result.is_err() || *shutdown_rx.borrow() {
                        info!("IPC server shutting down");
                        break;
                    }
                }
            }
        }

        // Cleanup socket file
        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }
}

async fn write_line<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(value)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

async fn handle_connection(
    stream: UnixStream,
    context: Arc<ServerContext>,
    shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // Connection closed
        }

        let request = match serde_json::from_str::<Request>(&line) {
            Ok(request) => request,
            Err(e) => {
                warn!("Failed to parse request: {}", e);
                let response = Response::error(Uuid::nil(), ERR_PARSE, format!("Parse error: {}", e));
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        debug!("Received request: {} (id: {})", request.method, request.id);

        if request.method == methods::SHUTTER_SUBSCRIBE {
            // Subscribe before acknowledging so no event slips in between
            let events = context.shutter.subscribe();
            write_line(&mut writer, &Response::ok(request.id)).await?;
            return stream_events(&mut writer, events, shutdown).await;
        }

        let response = handle_request(request, &context).await;
        write_line(&mut writer, &response).await?;
    }

    Ok(())
}

/// Forward shutter events until the client goes away or the daemon stops
async fn stream_events<W: AsyncWrite + Unpin>(
    writer: &mut W,
    mut events: broadcast::Receiver<ShutterEvent>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if let Err(e) = write_line(writer, &Notification::event(event)).await {
                        debug!("Subscriber disconnected: {}", e);
                        return Ok(());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Subscriber lagging, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_request(request: Request, context: &ServerContext) -> Response {
    let id = request.id;
    let shutter = &context.shutter;

    match request.method.as_str() {
        methods::PING => Response::success(id, serde_json::json!({"ok": true})),

        methods::STATUS => {
            let status = StatusResponse {
                running: true,
                uptime_secs: context.start_time.elapsed().as_secs(),
                started_at: context.started_at,
                shutter: shutter.snapshot(),
            };
            match serde_json::to_value(status) {
                Ok(value) => Response::success(id, value),
                Err(e) => Response::error(id, ERR_INTERNAL, e.to_string()),
            }
        }

        methods::ACCESSORY_INFO => {
            let info = AccessoryInfoResponse::from(&context.config.accessory);
            match serde_json::to_value(info) {
                Ok(value) => Response::success(id, value),
                Err(e) => Response::error(id, ERR_INTERNAL, e.to_string()),
            }
        }

        methods::SHUTTER_CURRENT_POSITION => Response::success(
            id,
            serde_json::json!({ "position": shutter.current_position() }),
        ),

        methods::SHUTTER_TARGET_POSITION => Response::success(
            id,
            serde_json::json!({ "position": shutter.target_position() }),
        ),

        methods::SHUTTER_POSITION_STATE => Response::success(
            id,
            serde_json::json!({ "state": shutter.position_state() }),
        ),

        methods::SHUTTER_SNAPSHOT => match serde_json::to_value(shutter.snapshot()) {
            Ok(value) => Response::success(id, value),
            Err(e) => Response::error(id, ERR_INTERNAL, e.to_string()),
        },

        methods::SHUTTER_SET_TARGET => {
            match serde_json::from_value::<SetTargetParams>(request.params) {
                Ok(params) => {
                    let result = if params.immediate {
                        shutter.move_to(params.position).await
                    } else {
                        shutter.set_target_position(params.position)
                    };
                    match result {
                        Ok(()) => Response::ok(id),
                        Err(e) => Response::from_error(id, &e),
                    }
                }
                Err(e) => Response::error(id, ERR_INVALID_PARAMS, e.to_string()),
            }
        }

        _ => Response::error(id, ERR_METHOD_NOT_FOUND, "Method not found"),
    }
}
