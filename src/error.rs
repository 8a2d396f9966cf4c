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

use crate::types::BlockHeight;
use std::error::Error as StdError;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("RPC request {method} to {url} failed: {source}")]
    Rpc {
        method: String,
        url: String,
        #[source]
        source: Box<reqwest::Error>,
    },

    #[error("RPC {method} returned error {code}: {message}")]
    RpcResponse {
        method: String,
        code: i64,
        message: String,
    },

    #[error("Malformed {method} response: {message}")]
    MalformedResponse { method: String, message: String },

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Database error: {0}")]
    Database(Box<sqlx::Error>),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Block {block} not found")]
    BlockNotFound { block: BlockHeight },

    #[error("Invalid config for `{field}`: {message}")]
    InvalidConfig { field: String, message: String },

    #[error("Storing {record} record failed using {backend}: {source}")]
    StorageError {
        record: String,
        backend: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Checkpoint {operation} failed using {backend}: {source}")]
    CheckpointError {
        operation: String,
        backend: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("Block {block} failed after {attempts} attempts: {source}")]
    BlockFailed {
        block: BlockHeight,
        attempts: usize,
        #[source]
        source: Box<IndexerError>,
    },

    #[error("Indexer halted at block {cursor}")]
    Halted { cursor: BlockHeight },
}

impl IndexerError {
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn malformed(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. } | Self::BlockFailed { .. } | Self::Halted { .. }
        )
    }
}

impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(Box::new(err))
    }
}
