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

use crate::error::IndexerError;
use crate::types::BlockHeight;
use crate::validated_types::{ContractAddress, DatabaseUrl, HttpUrl};
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(30_000);
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_BLOCK_RETRIES: usize = 5;
pub const DEFAULT_ACTION_KEY: &str = "action";

/// Configuration for the [`Indexer`](crate::indexer::Indexer).
#[derive(Clone, Debug)]
pub struct IndexerConfig {
    pub rpc_url: String,
    pub contract_address: String,
    /// Highest height treated as already processed; scanning begins one above it.
    pub start_height: BlockHeight,
    pub database_url: Option<String>,
    pub poll_interval: Duration,
    /// Applied to every chain call and every storage write.
    pub request_timeout: Duration,
    pub max_block_retries: usize,
    pub resume_from_checkpoint: bool,
    /// Wasm attribute naming the contract operation.
    pub action_key: String,
}

impl IndexerConfig {
    /// Create a new [`IndexerConfigBuilder`].
    pub fn builder() -> IndexerConfigBuilder {
        IndexerConfigBuilder::new()
    }

    /// Validate this configuration.
    pub fn validate(&self) -> Result<(), IndexerError> {
        if self.rpc_url.trim().is_empty() {
            return Err(IndexerError::invalid_config("rpc_url", "cannot be empty"));
        }
        HttpUrl::parse(&self.rpc_url)?;
        ContractAddress::parse(&self.contract_address)?;

        if let Some(db) = &self.database_url {
            DatabaseUrl::parse(db)?;
        }

        if self.poll_interval.is_zero() {
            return Err(IndexerError::invalid_config(
                "poll_interval",
                "must be greater than zero",
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(IndexerError::invalid_config(
                "request_timeout",
                "must be greater than zero",
            ));
        }

        if self.max_block_retries == 0 {
            return Err(IndexerError::invalid_config(
                "max_block_retries",
                "must be at least 1",
            ));
        }

        if self.action_key.trim().is_empty() {
            return Err(IndexerError::invalid_config("action_key", "cannot be empty"));
        }

        Ok(())
    }
}

/// Builder pattern for [`IndexerConfig`].
pub struct IndexerConfigBuilder {
    rpc_url: String,
    contract_address: String,
    start_height: BlockHeight,
    database_url: Option<String>,
    poll_interval: Duration,
    request_timeout: Duration,
    max_block_retries: usize,
    resume_from_checkpoint: bool,
    action_key: String,
}

impl Default for IndexerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexerConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            rpc_url: String::new(),
            contract_address: String::new(),
            start_height: 0,
            database_url: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_block_retries: DEFAULT_MAX_BLOCK_RETRIES,
            resume_from_checkpoint: false,
            action_key: DEFAULT_ACTION_KEY.to_string(),
        }
    }

    /// Set the CometBFT RPC endpoint.
    pub fn rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    /// Set the contract whose events are indexed.
    pub fn contract_address(mut self, address: impl Into<String>) -> Self {
        self.contract_address = address.into();
        self
    }

    /// Store records at `url`; the scheme picks the backend.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Configure a PostgreSQL backend.
    pub fn with_postgres(self, url: impl Into<String>) -> Self {
        self.database_url(url)
    }

    /// Configure a SQLite backend.
    pub fn with_sqlite(self, url: impl Into<String>) -> Self {
        self.database_url(url)
    }

    /// Treat `height` as processed; the first scanned block is `height + 1`.
    pub fn start_from_height(mut self, height: BlockHeight) -> Self {
        self.start_height = height;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_block_retries(mut self, retries: usize) -> Self {
        self.max_block_retries = retries;
        self
    }

    /// Resume from the stored checkpoint when it is ahead of the start height.
    pub fn resume_from_checkpoint(mut self, resume: bool) -> Self {
        self.resume_from_checkpoint = resume;
        self
    }

    pub fn action_key(mut self, key: impl Into<String>) -> Self {
        self.action_key = key.into();
        self
    }

    /// Build the configuration and validate it.
    pub fn build(self) -> Result<IndexerConfig, IndexerError> {
        let config = IndexerConfig {
            rpc_url: self.rpc_url,
            contract_address: self.contract_address.trim().to_string(),
            start_height: self.start_height,
            database_url: self.database_url,
            poll_interval: self.poll_interval,
            request_timeout: self.request_timeout,
            max_block_retries: self.max_block_retries,
            resume_from_checkpoint: self.resume_from_checkpoint,
            action_key: self.action_key,
        };
        config.validate()?;
        Ok(config)
    }
}
