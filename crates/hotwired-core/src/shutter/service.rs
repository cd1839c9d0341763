use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::controller::MovementController;
use super::debounce::Debouncer;
use super::events::{ShutterEvent, ShutterSnapshot};
use super::{Position, PositionState};
use crate::config::ControllerConfig;
use crate::hardware::LineActuator;
use crate::{Error, Result};

enum Command {
    /// Debounced target from a host (slider drags arrive in bursts)
    SetTarget(Position),
    /// Start moving right away and report the outcome of the press
    MoveTo(Position, oneshot::Sender<Result<()>>),
}

/// What woke the service loop
enum Wake {
    Shutdown,
    Command(Command),
    Debounced(Position),
    Tick,
}

/// Cloneable access to a running [`ShutterService`]
#[derive(Clone)]
pub struct ShutterHandle {
    command_tx: mpsc::UnboundedSender<Command>,
    snapshot_rx: watch::Receiver<ShutterSnapshot>,
    event_tx: broadcast::Sender<ShutterEvent>,
}

impl ShutterHandle {
    pub fn snapshot(&self) -> ShutterSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn current_position(&self) -> Position {
        self.snapshot_rx.borrow().current_position
    }

    pub fn target_position(&self) -> Position {
        self.snapshot_rx.borrow().target_position
    }

    pub fn position_state(&self) -> PositionState {
        self.snapshot_rx.borrow().position_state
    }

    /// Request a new target; bursts of requests collapse to the last one
    ///
    /// Only validation errors are reported here. Press failures happen after
    /// the debounce window and are published as
    /// [`ShutterEvent::ActuationFailed`].
    pub fn set_target_position(&self, value: i64) -> Result<()> {
        let target = Position::new(value)?;
        self.command_tx
            .send(Command::SetTarget(target))
            .map_err(|_| Error::ServiceStopped)
    }

    /// Move to `value` without debouncing, waiting for the first press
    pub async fn move_to(&self, value: i64) -> Result<()> {
        let target = Position::new(value)?;
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(Command::MoveTo(target, reply_tx))
            .map_err(|_| Error::ServiceStopped)?;
        reply_rx.await.map_err(|_| Error::ServiceStopped)?
    }

    /// Receive every position and state change from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ShutterEvent> {
        self.event_tx.subscribe()
    }

    /// Follow the latest snapshot
    pub fn watch(&self) -> watch::Receiver<ShutterSnapshot> {
        self.snapshot_rx.clone()
    }
}

/// Single owner of the shutter: lines, position estimate, debouncer and
/// movement session all live in this task, so commands, debounce expiry and
/// ticks are handled strictly one at a time
pub struct ShutterService {
    controller: MovementController,
    debouncer: Debouncer<Position>,
    command_rx: mpsc::UnboundedReceiver<Command>,
}

impl ShutterService {
    pub fn new(config: ControllerConfig, actuator: LineActuator) -> (Self, ShutterHandle) {
        let debouncer = Debouncer::new(config.debounce_window());
        let controller = MovementController::new(config, actuator);
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let handle = ShutterHandle {
            command_tx,
            snapshot_rx: controller.publisher().watch(),
            event_tx: controller.publisher().event_sender(),
        };

        let service = Self {
            controller,
            debouncer,
            command_rx,
        };

        (service, handle)
    }

    /// Claim the output lines; call once before [`run`](Self::run)
    pub async fn configure_lines(&self) -> Result<()> {
        self.controller.configure_lines().await
    }

    /// Run until the shutdown signal fires or every handle is dropped
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let initial = self.controller.snapshot();
        info!(
            "Shutter service started at {} (debounce window {}ms)",
            initial.current_position,
            self.debouncer.window().as_millis()
        );

        loop {
            let wake = tokio::select! {
                result = shutdown.changed() => {
                    if result.is_ok() && !*shutdown.borrow() {
                        continue;
                    }
                    Wake::Shutdown
                }
                command = self.command_rx.recv() => match command {
                    Some(command) => Wake::Command(command),
                    None => Wake::Shutdown,
                },
                target = self.debouncer.expired() => Wake::Debounced(target),
                _ = self.controller.next_tick() => Wake::Tick,
            };

            match wake {
                Wake::Shutdown => {
                    info!("Shutter service received shutdown signal");
                    break;
                }
                Wake::Command(Command::SetTarget(target)) => {
                    debug!("Target {} requested", target);
                    if let Some(superseded) = self.debouncer.push(target) {
                        debug!("Dropping superseded target {}", superseded);
                    }
                }
                Wake::Command(Command::MoveTo(target, reply)) => {
                    if let Some(superseded) = self.debouncer.cancel() {
                        debug!("Dropping pending target {} for immediate move", superseded);
                    }
                    let result = self.controller.request_target(target).await;
                    if reply.send(result).is_err() {
                        warn!("Move requester went away before the result");
                    }
                }
                Wake::Debounced(target) => {
                    if let Err(e) = self.controller.request_target(target).await {
                        error!("Movement to {} failed: {}", target, e);
                    }
                }
                Wake::Tick => {
                    if let Err(e) = self.controller.on_tick().await {
                        error!("Movement tick failed: {}", e);
                    }
                }
            }
        }

        if self.controller.is_moving() {
            warn!(
                "Stopping while moving, position estimate {} will not be completed",
                self.controller.snapshot().current_position
            );
        }
        info!("Shutter service stopped");
    }
}
