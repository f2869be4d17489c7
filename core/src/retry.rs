//! Retry with capped exponential backoff, an overall time budget and
//! cooperative cancellation. Every store call that can fail transiently goes
//! through `RetryPolicy::run` instead of hand-rolled loops.

use crate::{
    config::RetryConfig,
    error::{LedgerError, LedgerResult},
};
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short slices. Returns false if cancelled
    /// before the full duration elapsed.
    pub fn sleep(&self, duration: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(10);
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts:  usize,
    pub base_delay_ms: u64,
    pub max_delay_ms:  u64,
    pub jitter_pct:    f64,
    /// Budget for all attempts plus waits. `None` means unbounded.
    pub timeout_ms:    Option<u64>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: usize,
        base_delay_ms: u64,
        max_delay_ms: u64,
        jitter_pct: f64,
        timeout_ms: Option<u64>,
    ) -> Self {
        let base_delay_ms = base_delay_ms.max(1);
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms: max_delay_ms.max(base_delay_ms),
            jitter_pct: jitter_pct.clamp(0.0, 1.0),
            timeout_ms,
        }
    }

    /// Fixed delay between a fixed number of attempts.
    pub fn fixed(max_attempts: usize, delay_ms: u64) -> Self {
        Self::new(max_attempts, delay_ms, delay_ms, 0.0, None)
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(
            cfg.max_attempts,
            cfg.base_delay_ms,
            cfg.max_delay_ms,
            cfg.jitter_pct,
            cfg.timeout_ms,
        )
    }

    fn next_delay(&self, attempt: usize) -> Duration {
        let exp = 2_u64.saturating_pow(attempt as u32);
        let delay = self.base_delay_ms.saturating_mul(exp).min(self.max_delay_ms);
        let delay = if self.jitter_pct > 0.0 {
            let spread = (delay as f64 * self.jitter_pct) as i64;
            let delta = rand::thread_rng().gen_range(-spread..=spread);
            delay.saturating_add_signed(delta)
        } else {
            delay
        };
        Duration::from_millis(delay)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, runs
    /// out of attempts, exceeds the time budget, or `token` is cancelled.
    /// `op` receives the zero-based attempt number.
    pub fn run<T, F>(&self, token: &CancellationToken, mut op: F) -> LedgerResult<T>
    where
        F: FnMut(usize) -> LedgerResult<T>,
    {
        let started = Instant::now();
        let mut attempt = 0;
        loop {
            if token.is_cancelled() {
                return Err(LedgerError::Cancelled);
            }
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if !err.is_retryable() {
                return Err(err);
            }
            attempt += 1;
            if attempt >= self.max_attempts {
                log::warn!("Giving up after {attempt} attempts: {err}");
                return Err(err);
            }

            let delay = self.next_delay(attempt - 1);
            if let Some(budget) = self.timeout_ms {
                let elapsed = started.elapsed();
                if elapsed + delay > Duration::from_millis(budget) {
                    return Err(LedgerError::Timeout {
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }
            }
            log::warn!(
                "Attempt {attempt}/{} failed ({err}); retrying in {} ms",
                self.max_attempts,
                delay.as_millis()
            );
            if !token.sleep(delay) {
                return Err(LedgerError::Cancelled);
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
