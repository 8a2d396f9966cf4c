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

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type BlockHeight = u64;

/// A single key/value pair attached to a chain event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An event emitted while executing one transaction, as reported by the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawContractEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<Attribute>,
}

impl RawContractEvent {
    pub fn new(kind: impl Into<String>, attributes: Vec<Attribute>) -> Self {
        Self {
            kind: kind.into(),
            attributes,
        }
    }

    /// First value for `key`, in emission order.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.key == key)
            .map(|attr| attr.value.as_str())
    }
}

/// Result of a transaction included in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxResult {
    pub hash: String,
    pub height: BlockHeight,
    pub code: u32,
    pub events: Vec<RawContractEvent>,
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub height: BlockHeight,
    pub time: DateTime<Utc>,
}

/// Where a contract event came from. Handed to the classifier alongside the event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub tx_hash: String,
    pub height: BlockHeight,
    pub event_index: u32,
    /// Block header time, never the transaction time.
    pub timestamp: DateTime<Utc>,
}

impl EventContext {
    pub fn new(
        tx_hash: impl Into<String>,
        height: BlockHeight,
        event_index: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            height,
            event_index,
            timestamp,
        }
    }
}
