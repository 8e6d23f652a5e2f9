use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Poll-until-predicate-or-timeout wait; with no predicate it is a plain pause.
#[derive(Debug, Clone, Copy)]
pub struct Wait {
    pub timeout: Duration,
    pub poll: Duration,
}

impl Wait {
    pub const fn new(timeout: Duration, poll: Duration) -> Self {
        Self { timeout, poll }
    }

    pub async fn pause(&self) {
        if !self.timeout.is_zero() {
            sleep(self.timeout).await;
        }
    }

    /// Re-run `probe` until it reports true. Returns false if the timeout
    /// passes first. The probe always runs at least once.
    pub async fn until<F, Fut>(&self, mut probe: F) -> bool
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        let deadline = Instant::now() + self.timeout;
        loop {
            if probe().await {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let step = self.poll.min(deadline - now);
            sleep(step.max(Duration::from_millis(1))).await;
        }
    }
}

/// Waits used while driving the page.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Content to show up after a navigation.
    pub settle: Wait,
    /// Lazy-loaded results after a scroll.
    pub scroll: Wait,
}

impl Pacing {
    pub fn with_scroll_pause(mut self, pause: Duration) -> Self {
        self.scroll = Wait::new(pause, pause);
        self
    }

    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            settle: Wait::new(Duration::ZERO, Duration::ZERO),
            scroll: Wait::new(Duration::ZERO, Duration::ZERO),
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            settle: Wait::new(Duration::from_secs(3), Duration::from_millis(250)),
            scroll: Wait::new(Duration::from_millis(1500), Duration::from_millis(1500)),
        }
    }
}
