use thiserror::Error;

use crate::shutter::Line;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid target position: {0} (expected a multiple of 10 between 0 and 100)")]
    InvalidTarget(i64),

    #[error("Actuation failure on {line} line: {reason}")]
    ActuationFailure { line: Line, reason: String },

    #[error("{0} line is faulted and will not be driven again")]
    LineFaulted(Line),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shutter service is not running")]
    ServiceStopped,

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
