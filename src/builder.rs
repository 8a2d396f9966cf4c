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

use std::sync::Arc;
use std::time::Duration;

use crate::chain::{ChainReader, TendermintClient};
use crate::config::IndexerConfig;
use crate::error::IndexerError;
use crate::indexer::Indexer;
use crate::storage::init::init_store;
use crate::storage::Storage;
use crate::types::BlockHeight;
use crate::validated_types::{ContractAddress, HttpUrl};

/// Convenient builder for creating an [`Indexer`].
#[derive(Default)]
pub struct IndexerBuilder {
    rpc_url: Option<HttpUrl>,
    contract: Option<ContractAddress>,
    database_url: Option<String>,
    start_height: Option<BlockHeight>,
    poll_interval: Option<Duration>,
    request_timeout: Option<Duration>,
    max_block_retries: Option<usize>,
    resume_from_checkpoint: bool,
    action_key: Option<String>,
    chain: Option<Arc<dyn ChainReader>>,
    store: Option<Arc<dyn Storage>>,
}

impl IndexerBuilder {
    /// Create a new builder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already validated configuration.
    pub fn from_config(config: &IndexerConfig) -> Result<Self, IndexerError> {
        config.validate()?;
        Ok(Self {
            rpc_url: Some(HttpUrl::parse(&config.rpc_url)?),
            contract: Some(ContractAddress::parse(&config.contract_address)?),
            database_url: config.database_url.clone(),
            start_height: Some(config.start_height),
            poll_interval: Some(config.poll_interval),
            request_timeout: Some(config.request_timeout),
            max_block_retries: Some(config.max_block_retries),
            resume_from_checkpoint: config.resume_from_checkpoint,
            action_key: Some(config.action_key.clone()),
            chain: None,
            store: None,
        })
    }

    /// Connect to the given CometBFT RPC endpoint.
    pub fn connect(mut self, url: HttpUrl) -> Self {
        self.rpc_url = Some(url);
        self
    }

    /// Index events emitted by this contract.
    pub fn contract(mut self, address: ContractAddress) -> Self {
        self.contract = Some(address);
        self
    }

    /// Store records at `url`. `postgres://`, `postgresql://` and
    /// `sqlite:` are accepted.
    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Use a PostgreSQL store.
    pub fn with_postgres(self, url: impl Into<String>) -> Self {
        self.database_url(url)
    }

    /// Use a SQLite store.
    pub fn with_sqlite(self, url: impl Into<String>) -> Self {
        self.database_url(url)
    }

    /// Use an already constructed chain reader instead of the RPC client.
    pub fn with_chain(mut self, chain: Arc<dyn ChainReader>) -> Self {
        self.chain = Some(chain);
        self
    }

    /// Use an already constructed store instead of one derived from the URL.
    pub fn with_store(mut self, store: Arc<dyn Storage>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn start_from_height(mut self, height: BlockHeight) -> Self {
        self.start_height = Some(height);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn max_block_retries(mut self, retries: usize) -> Self {
        self.max_block_retries = Some(retries);
        self
    }

    pub fn resume_from_checkpoint(mut self, resume: bool) -> Self {
        self.resume_from_checkpoint = resume;
        self
    }

    pub fn action_key(mut self, key: impl Into<String>) -> Self {
        self.action_key = Some(key.into());
        self
    }

    /// Build the indexer. The configuration is validated before anything
    /// connects.
    pub async fn build(self) -> Result<Indexer, IndexerError> {
        let contract = self
            .contract
            .ok_or_else(|| IndexerError::invalid_config("contract_address", "is required"))?;
        let rpc_url = match (self.rpc_url, &self.chain) {
            (Some(url), _) => url,
            (None, Some(_)) => HttpUrl::parse("http://127.0.0.1:26657")?,
            (None, None) => return Err(IndexerError::invalid_config("rpc_url", "missing")),
        };

        let mut cfg_builder = IndexerConfig::builder()
            .rpc_url(rpc_url.as_str())
            .contract_address(contract.as_str())
            .resume_from_checkpoint(self.resume_from_checkpoint);
        if let Some(ref db) = self.database_url {
            cfg_builder = cfg_builder.database_url(db);
        }
        if let Some(height) = self.start_height {
            cfg_builder = cfg_builder.start_from_height(height);
        }
        if let Some(interval) = self.poll_interval {
            cfg_builder = cfg_builder.poll_interval(interval);
        }
        if let Some(timeout) = self.request_timeout {
            cfg_builder = cfg_builder.request_timeout(timeout);
        }
        if let Some(retries) = self.max_block_retries {
            cfg_builder = cfg_builder.max_block_retries(retries);
        }
        if let Some(key) = self.action_key {
            cfg_builder = cfg_builder.action_key(key);
        }
        let config = cfg_builder.build()?;

        let chain: Arc<dyn ChainReader> = match self.chain {
            Some(chain) => chain,
            None => Arc::new(TendermintClient::new(rpc_url, config.request_timeout)?),
        };
        let store = match self.store {
            Some(store) => store,
            None => init_store(config.database_url.clone()).await?,
        };

        Indexer::new(chain, store, config)
    }
}
