//! Position-control state machine
//!
//! The shutter motor reports nothing back, so position is simulated: a press
//! on the up, down or preset line starts a movement session, and a periodic
//! tick moves the estimate one 10% step at a time until it reaches the target.
//!
//! ```text
//! ShutterHandle --> Debouncer --> MovementController --> LineActuator
//!                                   |        ^
//!                                   v        | stop press
//!                              PositionEstimator (ticks)
//! ```

mod controller;
mod debounce;
mod estimator;
mod events;
mod position;
mod service;

pub use events::{ShutterEvent, ShutterSnapshot};
pub use position::{Line, LinePins, Position, PositionState};
pub use service::{ShutterHandle, ShutterService};
