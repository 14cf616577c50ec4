//! The tap battle countdown.
//!
//! A one-shot deadline meant to sit in a `tokio::select!` next to the
//! session's event stream:
//!
//! ```ignore
//! tokio::select! {
//!     event = session.next_event() => { /* room changed */ }
//!     () = timer.expired() => { /* submit taps */ }
//! }
//! ```

use std::time::Duration;

use tokio::time::{self, Instant};

/// A restartable one-shot timer.
///
/// While disarmed, [`expired`](Self::expired) never completes, so the
/// `select!` arm simply never fires.
#[derive(Debug, Default)]
pub struct TapTimer {
    deadline: Option<Instant>,
}

impl TapTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to fire `duration` from now, replacing any earlier
    /// deadline.
    pub fn start(&mut self, duration: Duration) {
        self.deadline = Some(Instant::now() + duration);
    }

    /// Disarms the timer.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the deadline; `None` while disarmed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Completes at the deadline and disarms the timer.
    ///
    /// Cancel-safe: dropping the future early leaves the deadline in place.
    pub async fn expired(&mut self) {
        let Some(deadline) = self.deadline else {
            // Disarmed: pend forever and let other select! arms win.
            std::future::pending::<()>().await;
            return;
        };
        time::sleep_until(deadline).await;
        self.deadline = None;
    }
}
