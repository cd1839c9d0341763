use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::estimator::{PositionEstimator, TickOutcome};
use super::events::{Publisher, ShutterEvent, ShutterSnapshot};
use super::{Line, Position, PositionState};
use crate::config::ControllerConfig;
use crate::hardware::LineActuator;
use crate::{Error, Result};

/// One accepted movement, from the first press until the estimate reaches
/// its target or a newer movement replaces it
struct MovementSession {
    target: Position,
    /// The motor only stops by itself at 0, 10 and 100; anywhere else it has
    /// to be stopped with a preset press once the target is reached
    intermediate: bool,
    ticker: Interval,
}

impl MovementSession {
    fn start(target: Position, intermediate: bool, period: Duration) -> Self {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            target,
            intermediate,
            ticker,
        }
    }
}

/// Line, reported direction and stop requirement for a movement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovementPlan {
    pub line: Line,
    pub state: PositionState,
    pub intermediate: bool,
}

/// Turns target positions into button presses and a simulated position
///
/// Owns the lines, the position estimate and at most one movement session.
/// Starting a movement drops the previous session first, so two sessions
/// never tick concurrently.
pub struct MovementController {
    config: ControllerConfig,
    actuator: LineActuator,
    estimator: PositionEstimator,
    session: Option<MovementSession>,
    publisher: Publisher,
}

impl MovementController {
    pub fn new(config: ControllerConfig, actuator: LineActuator) -> Self {
        let estimator = PositionEstimator::new(config.default_position);
        let publisher = Publisher::new(estimator.snapshot());
        Self {
            config,
            actuator,
            estimator,
            session: None,
            publisher,
        }
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn snapshot(&self) -> ShutterSnapshot {
        self.estimator.snapshot()
    }

    pub fn is_moving(&self) -> bool {
        self.session.is_some()
    }

    /// Claim and park the output lines
    pub async fn configure_lines(&self) -> Result<()> {
        self.actuator.configure().await
    }

    /// Decide how to reach `target` from the current estimate
    pub fn plan(&self, target: Position) -> MovementPlan {
        let current = self.estimator.current();
        let (line, state, intermediate) = match target {
            Position::OPEN => (Line::Up, self.config.open_state, false),
            Position::PRESET => {
                let state = if target > current {
                    PositionState::Increasing
                } else {
                    PositionState::Decreasing
                };
                (Line::Preset, state, false)
            }
            Position::CLOSED => (Line::Down, PositionState::Increasing, false),
            _ if target > current => (Line::Up, PositionState::Increasing, true),
            _ => (Line::Down, PositionState::Decreasing, true),
        };

        MovementPlan {
            line,
            state,
            intermediate,
        }
    }

    /// Start moving toward `target`, replacing any movement in progress
    ///
    /// Returns once the press is done and the first estimator step has run;
    /// later steps happen on [`on_tick`](Self::on_tick).
    pub async fn request_target(&mut self, target: Position) -> Result<()> {
        if let Some(previous) = self.session.take() {
            debug!("Abandoning movement toward {}", previous.target);
        }

        self.estimator.set_target(target);
        self.publish(ShutterEvent::TargetChanged { target });

        let plan = self.plan(target);
        match target {
            Position::OPEN => info!("Opening shutters"),
            Position::PRESET => info!("Going to preset position"),
            Position::CLOSED => info!("Closing shutters"),
            _ => info!("Opening shutters to {}", target),
        }

        if let Err(e) = self.actuator.pulse(plan.line).await {
            self.abort(plan.line, &e);
            return Err(e);
        }

        self.estimator.set_state(plan.state);
        self.publish(ShutterEvent::StateChanged { state: plan.state });

        if self.step(plan.intermediate).await? {
            return Ok(());
        }

        let period = self.config.step_interval(plan.state);
        debug!(period_ms = period.as_millis() as u64, "Movement session started");
        self.session = Some(MovementSession::start(target, plan.intermediate, period));
        Ok(())
    }

    /// Wait for the active session's next tick; never resolves when idle
    pub async fn next_tick(&mut self) {
        match self.session.as_mut() {
            Some(session) => {
                session.ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Advance the active session by one step
    pub async fn on_tick(&mut self) -> Result<()> {
        let Some(intermediate) = self.session.as_ref().map(|s| s.intermediate) else {
            return Ok(());
        };
        self.step(intermediate).await.map(|_| ())
    }

    /// One estimator step; returns true when the movement is finished
    async fn step(&mut self, intermediate: bool) -> Result<bool> {
        match self.estimator.tick() {
            TickOutcome::Moved(position) => {
                debug!("Estimated position {}", position);
                self.publish(ShutterEvent::PositionChanged { position });
                Ok(false)
            }
            TickOutcome::Reached => {
                self.session = None;

                if intermediate {
                    if let Err(e) = self.actuator.pulse(Line::Preset).await {
                        self.abort(Line::Preset, &e);
                        return Err(e);
                    }
                }

                info!("Operation completed at {}", self.estimator.current());
                self.estimator.set_state(PositionState::Idle);
                self.publish(ShutterEvent::StateChanged {
                    state: PositionState::Idle,
                });
                self.publish(ShutterEvent::MovementCompleted {
                    position: self.estimator.current(),
                });
                Ok(true)
            }
        }
    }

    /// Stop tracking after a failed press; the movement cannot be trusted
    fn abort(&mut self, line: Line, err: &Error) {
        error!("Movement aborted: {}", err);
        self.session = None;
        self.estimator.set_state(PositionState::Idle);
        self.publish(ShutterEvent::StateChanged {
            state: PositionState::Idle,
        });
        self.publish(ShutterEvent::ActuationFailed {
            line,
            message: err.to_string(),
        });
    }

    fn publish(&self, event: ShutterEvent) {
        self.publisher.publish(self.estimator.snapshot(), event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::broadcast;

    use super::*;
    use crate::hardware::{Level, MockLineDriver};
    use crate::shutter::LinePins;

    const PINS: LinePins = LinePins { up: 17, down: 27, preset: 22 };

    fn pos(value: i64) -> Position {
        Position::new(value).unwrap()
    }

    fn config(start: Position) -> ControllerConfig {
        ControllerConfig {
            pins: PINS,
            duration_up: 20.0,
            duration_down: 30.0,
            step_scale_ms: 100,
            default_position: start,
            open_state: PositionState::Decreasing,
        }
    }

    fn controller(start: Position) -> (MovementController, MockLineDriver) {
        let driver = MockLineDriver::new();
        let actuator = LineActuator::new(Arc::new(driver.clone()), PINS, true);
        (MovementController::new(config(start), actuator), driver)
    }

    fn presses(driver: &MockLineDriver, line: Line) -> usize {
        driver.count_writes(PINS.pin(line), Level::Low)
    }

    async fn settle(controller: &mut MovementController) {
        while controller.is_moving() {
            controller.next_tick().await;
            controller.on_tick().await.unwrap();
        }
    }

    fn drain_positions(events: &mut broadcast::Receiver<ShutterEvent>) -> Vec<u8> {
        let mut positions = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ShutterEvent::PositionChanged { position } = event {
                positions.push(position.value());
            }
        }
        positions
    }

    #[test]
    fn test_plan_dispatch() {
        let (controller, _) = controller(pos(40));

        let open = controller.plan(Position::OPEN);
        assert_eq!((open.line, open.state, open.intermediate), (Line::Up, PositionState::Decreasing, false));

        let closed = controller.plan(Position::CLOSED);
        assert_eq!((closed.line, closed.state, closed.intermediate), (Line::Down, PositionState::Increasing, false));

        let preset = controller.plan(Position::PRESET);
        assert_eq!((preset.line, preset.state, preset.intermediate), (Line::Preset, PositionState::Decreasing, false));

        let up = controller.plan(pos(70));
        assert_eq!((up.line, up.state, up.intermediate), (Line::Up, PositionState::Increasing, true));

        let down = controller.plan(pos(20));
        assert_eq!((down.line, down.state, down.intermediate), (Line::Down, PositionState::Decreasing, true));
    }

    #[test]
    fn test_plan_open_without_legacy_label() {
        let driver = MockLineDriver::new();
        let actuator = LineActuator::new(Arc::new(driver), PINS, true);
        let mut cfg = config(Position::CLOSED);
        cfg.open_state = PositionState::Increasing;
        let controller = MovementController::new(cfg, actuator);

        assert_eq!(controller.plan(Position::OPEN).state, PositionState::Increasing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_ticks_without_overshoot() {
        let (mut controller, driver) = controller(pos(30));
        let mut events = controller.publisher().subscribe();

        controller.request_target(Position::OPEN).await.unwrap();
        assert_eq!(controller.snapshot().position_state, PositionState::Decreasing);
        settle(&mut controller).await;

        let positions = drain_positions(&mut events);
        assert_eq!(positions.len() as u32, pos(30).steps_to(Position::OPEN));
        assert_eq!(positions, vec![40, 50, 60, 70, 80, 90, 100]);

        assert_eq!(presses(&driver, Line::Up), 1);
        assert_eq!(presses(&driver, Line::Preset), 0);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.current_position, Position::OPEN);
        assert_eq!(snapshot.position_state, PositionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_uses_down_duration_with_legacy_label() {
        let (mut controller, _) = controller(Position::CLOSED);

        controller.request_target(Position::OPEN).await.unwrap();
        let start = Instant::now();
        controller.next_tick().await;

        assert_eq!(start.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_preset_from_above() {
        let (mut controller, driver) = controller(Position::OPEN);

        controller.request_target(Position::PRESET).await.unwrap();
        assert_eq!(controller.snapshot().position_state, PositionState::Decreasing);
        settle(&mut controller).await;

        assert_eq!(presses(&driver, Line::Preset), 1);
        assert_eq!(presses(&driver, Line::Up), 0);
        assert_eq!(presses(&driver, Line::Down), 0);
        assert_eq!(controller.snapshot().current_position, Position::PRESET);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preset_from_below() {
        let (mut controller, driver) = controller(Position::CLOSED);

        controller.request_target(Position::PRESET).await.unwrap();
        assert_eq!(controller.snapshot().position_state, PositionState::Increasing);
        settle(&mut controller).await;

        assert_eq!(presses(&driver, Line::Preset), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermediate_target_stops_with_preset() {
        let (mut controller, driver) = controller(Position::CLOSED);
        let mut events = controller.publisher().subscribe();

        controller.request_target(pos(50)).await.unwrap();
        assert_eq!(presses(&driver, Line::Up), 1);
        assert_eq!(presses(&driver, Line::Preset), 0);

        settle(&mut controller).await;

        assert_eq!(drain_positions(&mut events), vec![10, 20, 30, 40, 50]);
        assert_eq!(presses(&driver, Line::Up), 1);
        assert_eq!(presses(&driver, Line::Preset), 1);

        // The stop press is the last thing that happens
        let writes = driver.writes();
        assert_eq!(writes[writes.len() - 2], (PINS.preset, Level::Low));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_up_duration() {
        let (mut controller, _) = controller(Position::CLOSED);

        controller.request_target(pos(50)).await.unwrap();
        let start = Instant::now();
        controller.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
        controller.on_tick().await.unwrap();
        controller.next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_target_restarts_session() {
        let (mut controller, driver) = controller(Position::CLOSED);

        controller.request_target(pos(50)).await.unwrap();
        controller.next_tick().await;
        controller.on_tick().await.unwrap();
        assert_eq!(controller.snapshot().current_position, pos(20));

        controller.request_target(pos(50)).await.unwrap();
        assert_eq!(presses(&driver, Line::Up), 2);
        assert_eq!(controller.snapshot().current_position, pos(30));

        settle(&mut controller).await;
        assert_eq!(controller.snapshot().current_position, pos(50));
        assert_eq!(presses(&driver, Line::Preset), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reversal_mid_travel() {
        let (mut controller, driver) = controller(Position::CLOSED);

        controller.request_target(pos(80)).await.unwrap();
        controller.next_tick().await;
        controller.on_tick().await.unwrap();
        assert_eq!(controller.snapshot().current_position, pos(20));

        // Superseding does not press stop, the new movement takes over
        controller.request_target(Position::CLOSED).await.unwrap();
        assert_eq!(presses(&driver, Line::Preset), 0);
        assert_eq!(presses(&driver, Line::Down), 1);

        settle(&mut controller).await;
        assert_eq!(controller.snapshot().current_position, Position::CLOSED);
        assert_eq!(presses(&driver, Line::Preset), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_target_equal_to_current_finishes_immediately() {
        let (mut controller, driver) = controller(pos(40));

        controller.request_target(pos(40)).await.unwrap();

        assert!(!controller.is_moving());
        assert_eq!(controller.snapshot().position_state, PositionState::Idle);
        assert_eq!(presses(&driver, Line::Down), 1);
        assert_eq!(presses(&driver, Line::Preset), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_press_aborts() {
        let (mut controller, driver) = controller(Position::CLOSED);
        let mut events = controller.publisher().subscribe();
        driver.fail_writes(PINS.up, Level::Low);

        let err = controller.request_target(Position::OPEN).await.unwrap_err();
        assert!(matches!(err, Error::ActuationFailure { line: Line::Up, .. }));

        assert!(!controller.is_moving());
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.position_state, PositionState::Idle);
        assert_eq!(snapshot.current_position, Position::CLOSED);

        let mut failed = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, ShutterEvent::ActuationFailed { line: Line::Up, .. }) {
                failed = true;
            }
        }
        assert!(failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_press_still_ends_session() {
        let (mut controller, driver) = controller(Position::CLOSED);
        driver.fail_writes(PINS.preset, Level::Low);

        controller.request_target(pos(20)).await.unwrap();
        controller.next_tick().await;
        controller.on_tick().await.unwrap();
        controller.next_tick().await;
        assert!(controller.on_tick().await.is_err());

        assert!(!controller.is_moving());
        assert_eq!(controller.snapshot().position_state, PositionState::Idle);
        assert_eq!(controller.snapshot().current_position, pos(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_tick_without_session_is_noop() {
        let (mut controller, driver) = controller(Position::CLOSED);
        controller.on_tick().await.unwrap();
        assert!(driver.writes().is_empty());
    }
}
