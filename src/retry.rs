/*
 * Copyright 2025 Flamewire
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::error::IndexerError;
use tracing::warn;

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        let next = (delay.as_millis() as f32 * self.backoff_multiplier) as u64;
        Duration::from_millis(next).min(self.max_delay)
    }
}

/// Trips after `threshold` consecutive failures and stays open for `cooldown`.
///
/// An open breaker delays work, it never rejects it: callers wait out the
/// cooldown so the block being processed is retried rather than skipped.
pub struct CircuitBreaker {
    failures: AtomicUsize,
    threshold: usize,
    cooldown: Duration,
    open_until: Mutex<Option<Instant>>,
}

impl CircuitBreaker {
    pub fn new(threshold: usize, cooldown: Duration) -> Self {
        Self {
            failures: AtomicUsize::new(0),
            threshold,
            cooldown,
            open_until: Mutex::new(None),
        }
    }

    fn open_until(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.open_until
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_open(&self) -> bool {
        self.remaining().is_some()
    }

    /// Time left before the breaker closes again.
    pub fn remaining(&self) -> Option<Duration> {
        let until = (*self.open_until())?;
        until.checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    pub fn record_success(&self) {
        self.failures.store(0, Ordering::Relaxed);
        *self.open_until() = None;
    }

    pub fn record_failure(&self) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= self.threshold {
            *self.open_until() = Some(Instant::now() + self.cooldown);
            self.failures.store(0, Ordering::Relaxed);
        }
    }

    async fn wait_until_closed(&self) {
        if let Some(left) = self.remaining() {
            warn!(target: "indexer", cooldown_ms = left.as_millis() as u64, "circuit open, waiting");
            sleep(left).await;
        }
    }
}

pub fn is_retryable_error(err: &IndexerError) -> bool {
    match err {
        IndexerError::BlockNotFound { .. }
        | IndexerError::InvalidConfig { .. }
        | IndexerError::BlockFailed { .. }
        | IndexerError::Halted { .. } => false,
        IndexerError::RpcResponse { code, .. } => {
            // JSON-RPC "invalid request/params/method" will not change on retry.
            !matches!(code, -32600 | -32601 | -32602)
        }
        _ => true,
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget runs out. The last error is returned in the latter cases.
pub async fn retry_with_backoff<F, Fut, T>(
    mut op: F,
    config: &RetryConfig,
    circuit_breaker: &CircuitBreaker,
) -> Result<T, IndexerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IndexerError>>,
{
    let attempts = config.max_retries.max(1);
    let mut delay = config.initial_delay;
    let mut attempt = 0;
    loop {
        circuit_breaker.wait_until_closed().await;
        attempt += 1;
        match op().await {
            Ok(val) => {
                circuit_breaker.record_success();
                return Ok(val);
            }
            Err(e) => {
                if !is_retryable_error(&e) {
                    return Err(e);
                }
                circuit_breaker.record_failure();
                if attempt >= attempts {
                    return Err(e);
                }
                warn!(target: "indexer", attempt, error = %e, "retrying in {:?}", delay);
                sleep(delay).await;
                delay = config.next_delay(delay);
            }
        }
    }
}
