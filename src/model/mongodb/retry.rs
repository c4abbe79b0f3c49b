use std::time::{Duration, Instant};

use rand::Rng;
use rocket::tokio::time::sleep;

/// How to space out retries of a database operation, and when to give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// No retry starts once this long has passed since the first attempt.
    pub deadline: Duration,
}

impl Backoff {
    /// For transactions that lost a write conflict, and for commits with an unknown outcome.
    pub const TRANSACTION: Self = Self {
        initial: Duration::from_millis(5),
        max: Duration::from_millis(500),
        deadline: Duration::from_secs(10),
    };

    /// Start counting retries from now.
    pub fn start(self) -> Retries {
        Retries {
            backoff: self,
            started: Instant::now(),
            retries: 0,
        }
    }

    /// The longest delay before retry number `retry` (counting from zero).
    fn ceiling(&self, retry: u32) -> Duration {
        let factor = 2_u32.saturating_pow(retry);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

/// Retry state for one logical operation.
#[derive(Debug)]
pub struct Retries {
    backoff: Backoff,
    started: Instant,
    retries: u32,
}

impl Retries {
    /// Retries waited for so far.
    pub fn count(&self) -> u32 {
        self.retries
    }

    /// Wait before the next retry. Returns `false`, without waiting, once the deadline has passed.
    ///
    /// Delays double each time up to the maximum, with random jitter.
    pub async fn wait(&mut self) -> bool {
        if self.started.elapsed() >= self.backoff.deadline {
            return false;
        }
        let ceiling = self.backoff.ceiling(self.retries);
        let delay = rand::thread_rng().gen_range(ceiling / 2..=ceiling);
        self.retries += 1;
        sleep(delay).await;
        true
    }
}
