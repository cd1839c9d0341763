use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Sleep};

/// Cancellable delay that only ever delivers the most recent value
///
/// Every [`push`](Debouncer::push) replaces the pending value and restarts the
/// quiet window. [`expired`](Debouncer::expired) resolves once a window
/// elapses with no further pushes, and is cancel safe: dropping it early
/// leaves the pending value in place.
pub struct Debouncer<T> {
    window: Duration,
    pending: Option<T>,
    delay: Pin<Box<Sleep>>,
}

impl<T> Debouncer<T> {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            delay: Box::pin(tokio::time::sleep(window)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Schedule `value`, returning the value it superseded
    pub fn push(&mut self, value: T) -> Option<T> {
        self.delay.as_mut().reset(Instant::now() + self.window);
        self.pending.replace(value)
    }

    /// Drop the pending value without delivering it
    pub fn cancel(&mut self) -> Option<T> {
        self.pending.take()
    }

    /// Wait for the quiet window to elapse and take the pending value.
    /// Never resolves while nothing is pending.
    pub async fn expired(&mut self) -> T {
        loop {
            if self.pending.is_none() {
                std::future::pending::<()>().await;
            }
            self.delay.as_mut().await;
            if let Some(value) = self.pending.take() {
                return value;
            }
        }
    }
}
