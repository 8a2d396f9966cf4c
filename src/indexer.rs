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

use crate::chain::ChainReader;
use crate::classifier::DomainClassifier;
use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::extractor::EventExtractor;
use crate::retry::{retry_with_backoff, CircuitBreaker, RetryConfig};
use crate::storage::Storage;
use crate::types::{BlockHeight, EventContext};
use crate::validated_types::ContractAddress;
use futures::future::try_join;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, instrument, trace};

const PROGRESS_EVERY: BlockHeight = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Backfilling,
    RealTime,
    /// Shut down on request after finishing the block in flight.
    Stopped,
    /// A block exhausted its retries; the cursor will not move again.
    Halted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexerStatus {
    pub phase: Phase,
    pub cursor: BlockHeight,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackfillOutcome {
    Completed { head: BlockHeight },
    Stopped { cursor: BlockHeight },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Processed { from: BlockHeight, to: BlockHeight },
    UpToDate,
    /// Another tick (or the backfill) was still running.
    Skipped,
    Stopped { cursor: BlockHeight },
}

/// Requests a graceful stop. The indexer finishes the block in flight first.
#[derive(Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.send_replace(true);
    }
}

/// Scans blocks in order and stores the records found in them.
///
/// The cursor is the highest height whose records are all stored. It only
/// moves forward, one block at a time, and only after that block is done;
/// anyone watching it never sees a height that is still being written.
pub struct Indexer {
    config: IndexerConfig,
    chain: Arc<dyn ChainReader>,
    store: Arc<dyn Storage>,
    extractor: EventExtractor,
    classifier: DomainClassifier,
    retry_config: RetryConfig,
    circuit_breaker: CircuitBreaker,
    cursor: watch::Sender<BlockHeight>,
    phase: watch::Sender<Phase>,
    run_guard: Mutex<()>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl Indexer {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        store: Arc<dyn Storage>,
        config: IndexerConfig,
    ) -> Result<Self, IndexerError> {
        config.validate()?;
        let contract = ContractAddress::parse(&config.contract_address)?;
        let (cursor, _) = watch::channel(config.start_height);
        let (phase, _) = watch::channel(Phase::Uninitialized);
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            retry_config: RetryConfig::default().with_max_retries(config.max_block_retries),
            circuit_breaker: CircuitBreaker::new(10, Duration::from_secs(30)),
            extractor: EventExtractor::new(contract),
            classifier: DomainClassifier::new(config.action_key.clone()),
            chain,
            store,
            config,
            cursor,
            phase,
            run_guard: Mutex::new(()),
            shutdown: Arc::new(shutdown),
        })
    }

    /// Replace the block-level retry policy and circuit breaker.
    pub fn with_retry(mut self, retry_config: RetryConfig, circuit_breaker: CircuitBreaker) -> Self {
        self.retry_config = retry_config;
        self.circuit_breaker = circuit_breaker;
        self
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    pub fn cursor(&self) -> BlockHeight {
        *self.cursor.borrow()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn status(&self) -> IndexerStatus {
        IndexerStatus {
            phase: self.phase(),
            cursor: self.cursor(),
        }
    }

    pub fn subscribe_cursor(&self) -> watch::Receiver<BlockHeight> {
        self.cursor.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown.clone())
    }

    fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Set the cursor from configuration (and the checkpoint, when resuming).
    pub async fn initialize(&self) -> Result<BlockHeight, IndexerError> {
        let _guard = self.run_guard.lock().await;
        self.initialize_locked().await
    }

    async fn initialize_locked(&self) -> Result<BlockHeight, IndexerError> {
        let mut start = self.config.start_height;
        if self.config.resume_from_checkpoint {
            let stored = self
                .with_retry_budget(|| self.timed("load_checkpoint", self.store.load_checkpoint()))
                .await?;
            if let Some(checkpoint) = stored {
                start = start.max(checkpoint);
            }
        }
        self.cursor.send_replace(start);
        self.phase.send_replace(Phase::Backfilling);
        info!(
            target: "indexer",
            cursor = start,
            contract = %self.extractor.contract(),
            backend = self.store.backend(),
            "indexer initialized"
        );
        Ok(start)
    }

    /// Process every block up to the chain height observed on entry.
    ///
    /// Blocks produced meanwhile are left to the first real-time tick.
    pub async fn run_backfill(&self) -> Result<BackfillOutcome, IndexerError> {
        let _guard = self.run_guard.lock().await;
        self.ensure_not_halted()?;
        if self.phase() == Phase::Uninitialized {
            self.initialize_locked().await?;
        }
        self.phase.send_replace(Phase::Backfilling);

        let head = self.head().await?;
        info!(target: "indexer", from = self.cursor() + 1, head, "backfill started");

        while self.cursor() < head {
            if self.is_shutdown() {
                return Ok(BackfillOutcome::Stopped {
                    cursor: self.stop(),
                });
            }
            let next = self.cursor() + 1;
            self.index_block(next).await?;
            if next % PROGRESS_EVERY == 0 {
                info!(target: "indexer", block = next, head, "backfill progress");
            }
        }

        self.phase.send_replace(Phase::RealTime);
        info!(target: "indexer", head, "backfill complete");
        Ok(BackfillOutcome::Completed { head })
    }

    /// Catch up from the cursor to the current chain height.
    ///
    /// Never runs concurrently with another tick or the backfill: if either
    /// is in flight this returns [`TickOutcome::Skipped`] without touching
    /// the chain.
    pub async fn real_time_tick(&self) -> Result<TickOutcome, IndexerError> {
        let Ok(_guard) = self.run_guard.try_lock() else {
            debug!(target: "indexer", "previous run still in flight, skipping tick");
            return Ok(TickOutcome::Skipped);
        };
        self.ensure_not_halted()?;
        if self.phase() == Phase::Uninitialized {
            self.initialize_locked().await?;
        }

        let head = self.head().await?;
        let from = self.cursor() + 1;
        if head < from {
            trace!(target: "indexer", head, cursor = self.cursor(), "up to date");
            return Ok(TickOutcome::UpToDate);
        }

        for height in from..=head {
            if self.is_shutdown() {
                return Ok(TickOutcome::Stopped {
                    cursor: self.stop(),
                });
            }
            self.index_block(height).await?;
        }
        Ok(TickOutcome::Processed { from, to: head })
    }

    /// Initialize, backfill, then poll until shutdown or a fatal error.
    pub async fn run(&self) -> Result<(), IndexerError> {
        if self.phase() == Phase::Uninitialized {
            self.initialize().await?;
        }
        if let BackfillOutcome::Stopped { .. } = self.run_backfill().await? {
            return Ok(());
        }

        let mut shutdown = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            target: "indexer",
            interval_ms = self.config.poll_interval.as_millis() as u64,
            "real-time polling started"
        );

        loop {
            if self.is_shutdown() {
                self.stop();
                return Ok(());
            }
            tokio::select! {
                _ = ticker.tick() => {
                    match self.real_time_tick().await? {
                        TickOutcome::Processed { from, to } => {
                            info!(target: "indexer", from, to, "caught up");
                        }
                        TickOutcome::Stopped { .. } => return Ok(()),
                        TickOutcome::UpToDate | TickOutcome::Skipped => {}
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.stop();
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Fetch one block and store every record it yields. Single attempt;
    /// the cursor is not touched.
    #[instrument(target = "indexer", level = "debug", skip(self))]
    pub async fn process_block(&self, height: BlockHeight) -> Result<usize, IndexerError> {
        let (header, txs) = try_join(
            self.timed("block_header", self.chain.block_header(height)),
            self.timed("transactions_at", self.chain.transactions_at(height)),
        )
        .await?;

        let mut stored = 0;
        for tx in &txs {
            if !tx.is_success() {
                trace!(target: "indexer", tx = %tx.hash, code = tx.code, "skipping failed transaction");
                continue;
            }
            for (event_index, event) in self.extractor.extract(&tx.events) {
                let ctx = EventContext::new(tx.hash.clone(), height, event_index, header.time);
                let Some(record) = self.classifier.classify(event, &ctx) else {
                    continue;
                };
                self.timed("store", self.store.store(&record)).await?;
                debug!(target: "indexer", kind = record.kind(), tx = %tx.hash, event_index, "record stored");
                stored += 1;
            }
        }
        Ok(stored)
    }

    /// Process `height` under the retry budget, then advance the cursor.
    /// Exhausting the budget halts the indexer.
    async fn index_block(&self, height: BlockHeight) -> Result<usize, IndexerError> {
        let mut attempts = 0;
        let result = retry_with_backoff(
            || {
                attempts += 1;
                self.process_block(height)
            },
            &self.retry_config,
            &self.circuit_breaker,
        )
        .await;
        let stored = result.map_err(|e| self.halt(height, attempts, e))?;

        if self.config.resume_from_checkpoint {
            let mut attempts = 0;
            let result = retry_with_backoff(
                || {
                    attempts += 1;
                    self.timed("store_checkpoint", self.store.store_checkpoint(height))
                },
                &self.retry_config,
                &self.circuit_breaker,
            )
            .await;
            result.map_err(|e| self.halt(height, attempts, e))?;
        }

        self.cursor.send_if_modified(|cursor| {
            if height > *cursor {
                *cursor = height;
                true
            } else {
                false
            }
        });
        if stored > 0 {
            debug!(target: "indexer", block = height, records = stored, "block indexed");
        }
        Ok(stored)
    }

    async fn head(&self) -> Result<BlockHeight, IndexerError> {
        self.with_retry_budget(|| self.timed("current_height", self.chain.current_height()))
            .await
    }

    async fn with_retry_budget<F, Fut, T>(&self, op: F) -> Result<T, IndexerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexerError>>,
    {
        retry_with_backoff(op, &self.retry_config, &self.circuit_breaker)
            .await
            .inspect_err(|e| {
                error!(target: "indexer", error = %e, "retries exhausted, halting");
                self.phase.send_replace(Phase::Halted);
            })
    }

    async fn timed<T>(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<T, IndexerError>>,
    ) -> Result<T, IndexerError> {
        let limit = self.config.request_timeout;
        timeout(limit, fut)
            .await
            .map_err(|_| IndexerError::Timeout {
                operation: operation.to_string(),
                after: limit,
            })?
    }

    fn halt(&self, height: BlockHeight, attempts: usize, err: IndexerError) -> IndexerError {
        error!(
            target: "indexer",
            block = height,
            attempts,
            cursor = self.cursor(),
            error = %err,
            "block could not be indexed, halting"
        );
        self.phase.send_replace(Phase::Halted);
        IndexerError::BlockFailed {
            block: height,
            attempts,
            source: Box::new(err),
        }
    }

    fn stop(&self) -> BlockHeight {
        let cursor = self.cursor();
        self.phase.send_replace(Phase::Stopped);
        info!(target: "indexer", cursor, "indexer stopped");
        cursor
    }

    fn ensure_not_halted(&self) -> Result<(), IndexerError> {
        if self.phase() == Phase::Halted {
            return Err(IndexerError::Halted {
                cursor: self.cursor(),
            });
        }
        Ok(())
    }
}
