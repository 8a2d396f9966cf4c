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
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

#[derive(Default, Serialize, Deserialize)]
struct JsonDocument {
    last_block: Option<BlockHeight>,
    #[serde(default)]
    records: Vec<DomainRecord>,
}

#[derive(Default)]
struct State {
    last_block: Option<BlockHeight>,
    records: BTreeMap<RecordKey, DomainRecord>,
}

/// Keeps everything in one JSON file, rewritten on every change.
/// Meant for development and small deployments.
pub struct JsonStore {
    path: PathBuf,
    state: Mutex<Option<State>>,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(None),
        }
    }

    fn io_error(&self, operation: &str, err: std::io::Error) -> IndexerError {
        IndexerError::CheckpointError {
            operation: operation.into(),
            backend: "json".into(),
            source: Box::new(err),
        }
    }

    async fn load(&self) -> Result<State, IndexerError> {
        if !tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| self.io_error("load", e))?
        {
            return Ok(State::default());
        }
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error("load", e))?;
        let doc: JsonDocument = serde_json::from_str(&data)?;
        let records = doc
            .records
            .into_iter()
            .map(|r| (r.key().clone(), r))
            .collect();
        Ok(State {
            last_block: doc.last_block,
            records,
        })
    }

    async fn persist(&self, state: &State) -> Result<(), IndexerError> {
        let doc = JsonDocument {
            last_block: state.last_block,
            records: state.records.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&doc)?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.io_error("persist", e))?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| self.io_error("persist", e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error("persist", e))?;
        Ok(())
    }

    pub async fn records(&self) -> Result<Vec<DomainRecord>, IndexerError> {
        let mut guard = self.state.lock().await;
        if guard.is_none() {
            *guard = Some(self.load().await?);
        }
        Ok(guard
            .as_ref()
            .map(|s| s.records.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl RecordSink for JsonStore {
    async fn store(&self, record: &DomainRecord) -> Result<(), IndexerError> {
        let mut guard = self.state.lock().await;
        let state = match guard.take() {
            Some(state) => state,
            None => self.load().await?,
        };
        let state = guard.insert(state);
        if state.records.contains_key(record.key()) {
            return Ok(());
        }
        state.records.insert(record.key().clone(), record.clone());
        if let Err(e) = self.persist(state).await {
            state.records.remove(record.key());
            return Err(IndexerError::StorageError {
                record: record.kind().into(),
                backend: "json".into(),
                source: Box::new(e),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for JsonStore {
    async fn load_checkpoint(&self) -> Result<Option<BlockHeight>, IndexerError> {
        let mut guard = self.state.lock().await;
        let state = match guard.take() {
            Some(state) => state,
            None => self.load().await?,
        };
        Ok(guard.insert(state).last_block)
    }

    async fn store_checkpoint(&self, height: BlockHeight) -> Result<(), IndexerError> {
        let mut guard = self.state.lock().await;
        let state = match guard.take() {
            Some(state) => state,
            None => self.load().await?,
        };
        let state = guard.insert(state);
        let previous = state.last_block.replace(height);
        if let Err(e) = self.persist(state).await {
            state.last_block = previous;
            return Err(e);
        }
        Ok(())
    }
}

impl Storage for JsonStore {
    fn backend(&self) -> &'static str {
        "json"
    }
}
