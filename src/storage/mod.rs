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

pub mod init;
#[cfg(feature = "json-storage")]
pub mod json;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use crate::error::IndexerError;
use crate::records::DomainRecord;
use crate::types::BlockHeight;
use async_trait::async_trait;

pub use init::init_store;
pub use memory::MemoryStore;

/// Durable destination for indexed records.
///
/// `store` must be idempotent on [`RecordKey`](crate::records::RecordKey):
/// storing a record whose key already exists succeeds and leaves the first
/// copy in place.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn store(&self, record: &DomainRecord) -> Result<(), IndexerError>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn load_checkpoint(&self) -> Result<Option<BlockHeight>, IndexerError>;

    async fn store_checkpoint(&self, height: BlockHeight) -> Result<(), IndexerError>;
}

/// Unsigned value as a signed 64-bit SQL integer, clamped at `i64::MAX`.
#[cfg_attr(not(any(feature = "postgres", feature = "sqlite")), allow(dead_code))]
pub(crate) fn sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// A backend that keeps both records and the scan checkpoint.
pub trait Storage: RecordSink + CheckpointStore {
    fn backend(&self) -> &'static str;
}
