//! Linux sysfs GPIO backend
//!
//! Pins are exported through `<root>/export`; the direction file is written
//! with the idle level so the line never glitches active while being claimed.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::{Level, LineDriver};
use crate::Result;

/// Attempts made while udev fixes up permissions of a freshly exported pin
const EXPORT_SETTLE_ATTEMPTS: u32 = 10;
const EXPORT_SETTLE_DELAY: Duration = Duration::from_millis(50);

pub struct SysfsGpio {
    root: PathBuf,
}

impl SysfsGpio {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn pin_dir(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{}", pin))
    }

    async fn export(&self, pin: u32) -> Result<()> {
        if tokio::fs::metadata(self.pin_dir(pin)).await.is_ok() {
            return Ok(());
        }

        debug!(pin, "Exporting GPIO");
        tokio::fs::write(self.root.join("export"), pin.to_string()).await?;
        Ok(())
    }
}

fn level_value(level: Level) -> &'static str {
    match level {
        Level::Low => "0",
        Level::High => "1",
    }
}

fn direction_value(idle: Level) -> &'static str {
    match idle {
        Level::Low => "low",
        Level::High => "high",
    }
}

#[async_trait::async_trait]
impl LineDriver for SysfsGpio {
    async fn configure(&self, pin: u32, idle: Level) -> Result<()> {
        self.export(pin).await?;

        let direction = self.pin_dir(pin).join("direction");
        let mut attempt = 0;
        loop {
            match tokio::fs::write(&direction, direction_value(idle)).await {
                Ok(()) => return Ok(()),
                Err(e)
                    if e.kind() == std::io::ErrorKind::PermissionDenied
                        && attempt < EXPORT_SETTLE_ATTEMPTS =>
                {
                    attempt += 1;
                    tokio::time::sleep(EXPORT_SETTLE_DELAY).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn write(&self, pin: u32, level: Level) -> Result<()> {
        tokio::fs::write(self.pin_dir(pin).join("value"), level_value(level)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_root(name: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!("hotwired-sysfs-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        root
    }

    #[tokio::test]
    async fn test_configure_existing_pin_writes_idle_direction() {
        let root = scratch_root("configure");
        std::fs::create_dir_all(root.join("gpio17")).unwrap();

        let gpio = SysfsGpio::new(root.clone());
        gpio.configure(17, Level::High).await.unwrap();

        let direction = std::fs::read_to_string(root.join("gpio17/direction")).unwrap();
        assert_eq!(direction, "high");
        assert!(!root.join("export").exists());

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_configure_exports_missing_pin() {
        let root = scratch_root("export");
        let gpio = SysfsGpio::new(root.clone());

        // No kernel behind the scratch dir, so the pin directory never appears
        assert!(gpio.configure(27, Level::High).await.is_err());
        assert_eq!(std::fs::read_to_string(root.join("export")).unwrap(), "27");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn test_write_levels() {
        let root = scratch_root("write");
        std::fs::create_dir_all(root.join("gpio22")).unwrap();
        let gpio = SysfsGpio::new(root.clone());

        gpio.write(22, Level::Low).await.unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio22/value")).unwrap(), "0");
        gpio.write(22, Level::High).await.unwrap();
        assert_eq!(std::fs::read_to_string(root.join("gpio22/value")).unwrap(), "1");

        let _ = std::fs::remove_dir_all(&root);
    }
}
