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
use crate::records::{DomainRecord, RecordKey};
use crate::storage::{CheckpointStore, RecordSink, Storage};
use crate::types::BlockHeight;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// In-process store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<RecordKey, DomainRecord>>,
    checkpoint: Mutex<Option<BlockHeight>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of stored records ordered by key.
    pub async fn records(&self) -> Vec<DomainRecord> {
        self.records.lock().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordSink for MemoryStore {
    async fn store(&self, record: &DomainRecord) -> Result<(), IndexerError> {
        self.records
            .lock()
            .await
            .entry(record.key().clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for MemoryStore {
    async fn load_checkpoint(&self) -> Result<Option<BlockHeight>, IndexerError> {
        Ok(*self.checkpoint.lock().await)
    }

    async fn store_checkpoint(&self, height: BlockHeight) -> Result<(), IndexerError> {
        *self.checkpoint.lock().await = Some(height);
        Ok(())
    }
}

impl Storage for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }
}
