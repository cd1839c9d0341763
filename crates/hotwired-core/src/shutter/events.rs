use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tracing::trace;

use super::{Line, Position, PositionState};

/// Buffered events per subscriber before the slowest one starts lagging
const EVENT_CAPACITY: usize = 64;

/// Last published controller state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShutterSnapshot {
    pub current_position: Position,
    pub target_position: Position,
    pub position_state: PositionState,
    pub updated_at: DateTime<Utc>,
}

impl ShutterSnapshot {
    pub fn new(current_position: Position, target_position: Position, position_state: PositionState) -> Self {
        Self {
            current_position,
            target_position,
            position_state,
            updated_at: Utc::now(),
        }
    }

    pub fn is_moving(&self) -> bool {
        self.position_state != PositionState::Idle
    }
}

/// Change notifications pushed to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ShutterEvent {
    /// A movement toward `target` has been accepted
    TargetChanged { target: Position },
    /// The simulated position advanced one step
    PositionChanged { position: Position },
    StateChanged { state: PositionState },
    /// The simulated position reached the target and the session ended
    MovementCompleted { position: Position },
    /// A press failed and the movement was abandoned
    ActuationFailed { line: Line, message: String },
}

/// Sending side of the snapshot and event channels
pub struct Publisher {
    snapshot_tx: watch::Sender<ShutterSnapshot>,
    event_tx: broadcast::Sender<ShutterEvent>,
}

impl Publisher {
    pub fn new(initial: ShutterSnapshot) -> Self {
        let (snapshot_tx, _) = watch::channel(initial);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { snapshot_tx, event_tx }
    }

    pub fn snapshot(&self) -> ShutterSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<ShutterSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn event_sender(&self) -> broadcast::Sender<ShutterEvent> {
        self.event_tx.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutterEvent> {
        self.event_tx.subscribe()
    }

    /// Replace the snapshot and notify subscribers of `event`
    pub fn publish(&self, snapshot: ShutterSnapshot, event: ShutterEvent) {
        self.snapshot_tx.send_replace(snapshot);
        if self.event_tx.send(event).is_err() {
            trace!("No event subscribers");
        }
    }
}
