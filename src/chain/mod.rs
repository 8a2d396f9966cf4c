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

pub mod tendermint;

use crate::error::IndexerError;
use crate::types::{BlockHeader, BlockHeight, TxResult};
use async_trait::async_trait;

pub use tendermint::TendermintClient;

/// Read access to the chain. Every call may fail transiently.
#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn current_height(&self) -> Result<BlockHeight, IndexerError>;

    async fn block_header(&self, height: BlockHeight) -> Result<BlockHeader, IndexerError>;

    /// All transactions included at `height`, in block order.
    async fn transactions_at(&self, height: BlockHeight) -> Result<Vec<TxResult>, IndexerError>;
}
