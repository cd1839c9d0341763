use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use super::{Level, LineDriver};
use crate::shutter::{Line, LinePins};
use crate::{Error, Result};

/// How long a button is held for one press
pub const PULSE_DURATION: Duration = Duration::from_millis(500);

/// Presses the remote's buttons
///
/// A press drives the line active, holds it, and always drives it back to
/// idle. When the line cannot be returned to idle it is marked faulted and
/// never driven again, since the motor may be left energized.
pub struct LineActuator {
    driver: Arc<dyn LineDriver>,
    pins: LinePins,
    active: Level,
    faulted: HashSet<Line>,
}

impl LineActuator {
    pub fn new(driver: Arc<dyn LineDriver>, pins: LinePins, active_low: bool) -> Self {
        Self {
            driver,
            pins,
            active: if active_low { Level::Low } else { Level::High },
            faulted: HashSet::new(),
        }
    }

    fn idle(&self) -> Level {
        self.active.inverted()
    }

    /// Claim all three lines and park them at their idle level
    pub async fn configure(&self) -> Result<()> {
        for line in Line::ALL {
            let pin = self.pins.pin(line);
            self.driver
                .configure(pin, self.idle())
                .await
                .map_err(|e| Error::ActuationFailure {
                    line,
                    reason: format!("configuring pin {}: {}", pin, e),
                })?;
            debug!(%line, pin, "Line configured");
        }
        Ok(())
    }

    pub fn is_faulted(&self, line: Line) -> bool {
        self.faulted.contains(&line)
    }

    /// Press `line` for [`PULSE_DURATION`]
    pub async fn pulse(&mut self, line: Line) -> Result<()> {
        if self.is_faulted(line) {
            return Err(Error::LineFaulted(line));
        }

        let pin = self.pins.pin(line);
        debug!(%line, pin, "Pressing line");

        if let Err(e) = self.driver.write(pin, self.active).await {
            // The write may have partially happened, put the line back regardless
            self.restore(line, pin).await?;
            return Err(Error::ActuationFailure {
                line,
                reason: e.to_string(),
            });
        }

        tokio::time::sleep(PULSE_DURATION).await;

        self.restore(line, pin).await
    }

    async fn restore(&mut self, line: Line, pin: u32) -> Result<()> {
        match self.driver.write(pin, self.idle()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                error!(%line, pin, "Failed to release line, marking it faulted: {}", e);
                self.faulted.insert(line);
                Err(Error::ActuationFailure {
                    line,
                    reason: format!("line could not be released: {}", e),
                })
            }
        }
    }
}
