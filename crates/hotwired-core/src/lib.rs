pub mod config;
pub mod error;
pub mod hardware;
pub mod ipc;
pub mod shutter;

pub use config::{AccessoryConfig, AppConfig, ControllerConfig};
pub use error::{Error, Result};
pub use ipc::{DaemonClient, DaemonServer};
pub use shutter::{Position, PositionState, ShutterEvent, ShutterHandle, ShutterService, ShutterSnapshot};
