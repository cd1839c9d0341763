use super::{Position, PositionState, ShutterSnapshot};

/// Result of one estimator step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Position advanced one step to the contained value
    Moved(Position),
    /// Position already equals the target
    Reached,
}

/// Open-loop position model
///
/// There is no sensor on the motor, so position is inferred from time:
/// every tick moves the estimate one 10% step toward the target.
#[derive(Debug, Clone)]
pub struct PositionEstimator {
    current: Position,
    target: Position,
    state: PositionState,
}

impl PositionEstimator {
    pub fn new(initial: Position) -> Self {
        Self {
            current: initial,
            target: initial,
            state: PositionState::Idle,
        }
    }

    pub fn current(&self) -> Position {
        self.current
    }

    pub fn target(&self) -> Position {
        self.target
    }

    pub fn state(&self) -> PositionState {
        self.state
    }

    pub fn set_target(&mut self, target: Position) {
        self.target = target;
    }

    pub fn set_state(&mut self, state: PositionState) {
        self.state = state;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.current == self.target {
            return TickOutcome::Reached;
        }
        self.current = self.current.step_toward(self.target);
        TickOutcome::Moved(self.current)
    }

    pub fn snapshot(&self) -> ShutterSnapshot {
        ShutterSnapshot::new(self.current, self.target, self.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(value: i64) -> Position {
        Position::new(value).unwrap()
    }

    #[test]
    fn test_new_is_idle_at_initial() {
        let estimator = PositionEstimator::new(Position::OPEN);
        assert_eq!(estimator.current(), Position::OPEN);
        assert_eq!(estimator.target(), Position::OPEN);
        assert_eq!(estimator.state(), PositionState::Idle);
    }

    #[test]
    fn test_ticks_up_to_target() {
        let mut estimator = PositionEstimator::new(pos(30));
        estimator.set_target(Position::OPEN);

        let mut moves = Vec::new();
        while let TickOutcome::Moved(p) = estimator.tick() {
            moves.push(p.value());
        }

        assert_eq!(moves, vec![40, 50, 60, 70, 80, 90, 100]);
        assert_eq!(estimator.tick(), TickOutcome::Reached);
    }

    #[test]
    fn test_ticks_down_to_target() {
        let mut estimator = PositionEstimator::new(Position::OPEN);
        estimator.set_target(pos(70));

        assert_eq!(estimator.tick(), TickOutcome::Moved(pos(90)));
        assert_eq!(estimator.tick(), TickOutcome::Moved(pos(80)));
        assert_eq!(estimator.tick(), TickOutcome::Moved(pos(70)));
        assert_eq!(estimator.tick(), TickOutcome::Reached);
        assert_eq!(estimator.current(), pos(70));
    }

    #[test]
    fn test_retarget_mid_travel() {
        let mut estimator = PositionEstimator::new(Position::CLOSED);
        estimator.set_target(Position::OPEN);
        estimator.tick();
        estimator.tick();

        estimator.set_target(Position::PRESET);
        assert_eq!(estimator.tick(), TickOutcome::Moved(Position::PRESET));
        assert_eq!(estimator.tick(), TickOutcome::Reached);
    }
}
