use std::future::pending;

use tokio::time::{sleep_until, Duration, Instant};

/// A one-shot timer owned by the FSM driver.
///
/// The timer lives for the life of the FSM and is dormant until armed.
/// `reset` arms it for a fresh interval, discarding any latent expiry from
/// a previous arming; `drain` disarms it without waiting. `fired` resolves
/// once the armed deadline passes and disarms the timer; while dormant it
/// never resolves, which makes it safe to keep in a `select!` arm.
#[derive(Debug, Default)]
pub(crate) struct Timer {
    deadline: Option<Instant>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reset(&mut self, after: Duration) {
        self.deadline = Some(Instant::now() + after);
    }

    pub(crate) fn drain(&mut self) {
        self.deadline = None;
    }

    pub(crate) async fn fired(&mut self) {
        match self.deadline {
            Some(deadline) => {
                sleep_until(deadline).await;
                self.deadline = None;
            }
            None => pending().await,
        }
    }
}
