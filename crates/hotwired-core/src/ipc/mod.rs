//! IPC module for daemon-client communication
//!
//! This module provides Unix socket based IPC so hosts (the CLI, a HomeKit
//! bridge, scripts) can read and drive the shutter owned by the daemon.

mod client;
mod protocol;
mod server;

pub use client::{is_daemon_running, DaemonClient, EventStream};
pub use protocol::*;
pub use server::DaemonServer;
