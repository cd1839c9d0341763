//! Output line access
//!
//! The controller only ever presses buttons: a [`LineDriver`] sets raw pin
//! levels and the [`LineActuator`] turns that into timed presses on the up,
//! down and preset lines.

mod actuator;
mod mock;
mod sysfs;

pub use actuator::{LineActuator, PULSE_DURATION};
pub use mock::MockLineDriver;
pub use sysfs::SysfsGpio;

use std::sync::Arc;

use crate::config::HardwareConfig;
use crate::{Error, Result};

/// Electrical level of an output pin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    pub fn inverted(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Raw access to output pins
#[async_trait::async_trait]
pub trait LineDriver: Send + Sync {
    /// Claim `pin` as an output and drive it to `idle`
    async fn configure(&self, pin: u32, idle: Level) -> Result<()>;

    /// Drive `pin` to `level`
    async fn write(&self, pin: u32, level: Level) -> Result<()>;
}

/// Create the line driver selected by the hardware configuration
pub fn create_driver(config: &HardwareConfig) -> Result<Arc<dyn LineDriver>> {
    match config.backend.as_str() {
        "sysfs" => Ok(Arc::new(SysfsGpio::new(config.gpio_root.clone()))),
        "mock" => Ok(Arc::new(MockLineDriver::new())),
        other => Err(Error::Config(format!("unknown hardware backend '{}'", other))),
    }
}
