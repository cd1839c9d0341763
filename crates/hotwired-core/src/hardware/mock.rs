//! In-memory line driver
//!
//! Records every level change so a dry run (or a test) can see exactly which
//! buttons would have been pressed. Writes can be made to fail per pin and
//! level to exercise the failure paths.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::info;

use super::{Level, LineDriver};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    levels: HashMap<u32, Level>,
    writes: Vec<(u32, Level)>,
    failing: HashSet<(u32, Level)>,
}

/// Cloneable handle; clones share the same recorded state
#[derive(Debug, Clone, Default)]
pub struct MockLineDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockLineDriver {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        // A panic while holding the lock leaves plain data behind, keep going
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every write of `level` to `pin` fail
    pub fn fail_writes(&self, pin: u32, level: Level) {
        self.state().failing.insert((pin, level));
    }

    pub fn clear_failures(&self) {
        self.state().failing.clear();
    }

    /// Current level of `pin`, if it has been configured or written
    pub fn level(&self, pin: u32) -> Option<Level> {
        self.state().levels.get(&pin).copied()
    }

    /// Every successful write, in order (configuration excluded)
    pub fn writes(&self) -> Vec<(u32, Level)> {
        self.state().writes.clone()
    }

    /// Number of successful writes of `level` to `pin`
    pub fn count_writes(&self, pin: u32, level: Level) -> usize {
        self.state()
            .writes
            .iter()
            .filter(|(p, l)| *p == pin && *l == level)
            .count()
    }

    pub fn clear_writes(&self) {
        self.state().writes.clear();
    }
}

#[async_trait::async_trait]
impl LineDriver for MockLineDriver {
    async fn configure(&self, pin: u32, idle: Level) -> Result<()> {
        info!(pin, ?idle, "Mock line configured");
        self.state().levels.insert(pin, idle);
        Ok(())
    }

    async fn write(&self, pin: u32, level: Level) -> Result<()> {
        let mut state = self.state();
        if state.failing.contains(&(pin, level)) {
            return Err(Error::Other(format!("injected failure writing {:?} to pin {}", level, pin)));
        }
        state.levels.insert(pin, level);
        state.writes.push((pin, level));
        Ok(())
    }
}
