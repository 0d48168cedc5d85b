use std::time::Duration;

/// The retry schedule used for every network round-trip in this mesh:
/// 1000ms, 2000ms, 4000ms, capped at 8000ms, for up to `max_attempts`
/// tries (spec §5: "bounded timeouts starting at 1000ms doubling to at
/// most 8000ms, 3 attempts").
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
    cap: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Backoff {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts,
            base: Duration::from_millis(1000),
            cap: Duration::from_millis(8000),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timeout to apply for the upcoming attempt (1-indexed: the first
    /// call after construction returns the timeout for attempt 1).
    pub fn next_timeout(&mut self) -> Duration {
        self.attempt += 1;
        let multiplier = 1u32 << (self.attempt - 1).min(3);
        (self.base * multiplier).min(self.cap)
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    pub fn exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }
}

/// Runs `op` under the standard backoff schedule, retrying on `Err` until
/// attempts are exhausted. `op` receives the per-attempt timeout it should
/// enforce on its own I/O (the caller is expected to wrap its network call
/// in `tokio::time::timeout`).
pub async fn retry_with_backoff<F, Fut, T, E>(mut op: F) -> Result<T, E>
where
    F: FnMut(Duration, u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut backoff = Backoff::default();
    loop {
        let timeout = backoff.next_timeout();
        let attempt = backoff.attempt;
        match op(timeout, attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if backoff.exhausted() {
                    return Err(err);
                }
            }
        }
    }
}
