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

use crate::types::{BlockHeight, EventContext};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Natural identity of a record. Storage backends deduplicate on it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    pub tx_hash: String,
    pub height: BlockHeight,
    /// Position of the event in the transaction's event list.
    pub event_index: u32,
}

impl From<&EventContext> for RecordKey {
    fn from(ctx: &EventContext) -> Self {
        Self {
            tx_hash: ctx.tx_hash.clone(),
            height: ctx.height,
            event_index: ctx.event_index,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StakeRecord {
    #[serde(flatten)]
    pub key: RecordKey,
    pub staker: String,
    pub regen_amount: String,
    pub dregen_amount: String,
    pub exchange_rate: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnbondRecord {
    #[serde(flatten)]
    pub key: RecordKey,
    pub user: String,
    pub dregen_amount: String,
    pub regen_amount: String,
    pub unbonding_id: u64,
    /// When the unbonding period ends and funds can be claimed.
    pub completion_time: DateTime<Utc>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RewardRecord {
    #[serde(flatten)]
    pub key: RecordKey,
    pub claimer: String,
    pub timestamp: DateTime<Utc>,
}

/// Typed record produced from one contract event. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainRecord {
    Stake(StakeRecord),
    Unbond(UnbondRecord),
    Reward(RewardRecord),
}

impl DomainRecord {
    pub fn key(&self) -> &RecordKey {
        match self {
            Self::Stake(r) => &r.key,
            Self::Unbond(r) => &r.key,
            Self::Reward(r) => &r.key,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stake(_) => "stake",
            Self::Unbond(_) => "unbond",
            Self::Reward(_) => "reward",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Stake(r) => r.timestamp,
            Self::Unbond(r) => r.timestamp,
            Self::Reward(r) => r.timestamp,
        }
    }
}
