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
use crate::records::DomainRecord;
use crate::storage::{sql_int, CheckpointStore, RecordSink, Storage};
use crate::types::BlockHeight;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};

const CHECKPOINT_ID: &str = "regen-liquid-staking";

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS stake_events (
        id BIGSERIAL PRIMARY KEY,
        tx_hash TEXT NOT NULL,
        height BIGINT NOT NULL,
        event_index BIGINT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        staker TEXT NOT NULL,
        regen_amount TEXT NOT NULL,
        dregen_amount TEXT NOT NULL,
        exchange_rate DOUBLE PRECISION,
        UNIQUE (tx_hash, height, event_index)
    )",
    "CREATE TABLE IF NOT EXISTS unbond_events (
        id BIGSERIAL PRIMARY KEY,
        tx_hash TEXT NOT NULL,
        height BIGINT NOT NULL,
        event_index BIGINT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        \"user\" TEXT NOT NULL,
        dregen_amount TEXT NOT NULL,
        regen_amount TEXT NOT NULL,
        unbonding_id BIGINT NOT NULL,
        completion_time TIMESTAMPTZ NOT NULL,
        UNIQUE (tx_hash, height, event_index)
    )",
    "CREATE TABLE IF NOT EXISTS reward_events (
        id BIGSERIAL PRIMARY KEY,
        tx_hash TEXT NOT NULL,
        height BIGINT NOT NULL,
        event_index BIGINT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        claimer TEXT,
        UNIQUE (tx_hash, height, event_index)
    )",
    "CREATE TABLE IF NOT EXISTS indexer_checkpoint (
        id TEXT PRIMARY KEY,
        last_block BIGINT NOT NULL
    )",
];

pub struct PostgreSQLStore {
    pool: PgPool,
}

impl PostgreSQLStore {
    pub async fn new(database_url: &str) -> Result<Self, IndexerError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| IndexerError::CheckpointError {
                operation: "connect".into(),
                backend: "postgres".into(),
                source: Box::new(e),
            })?;

        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&pool)
                .await
                .map_err(|e| IndexerError::CheckpointError {
                    operation: "init".into(),
                    backend: "postgres".into(),
                    source: Box::new(e),
                })?;
        }

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordSink for PostgreSQLStore {
    async fn store(&self, record: &DomainRecord) -> Result<(), IndexerError> {
        let key = record.key();
        let query = match record {
            DomainRecord::Stake(r) => sqlx::query(
                "INSERT INTO stake_events
                    (tx_hash, height, event_index, timestamp, staker, regen_amount, dregen_amount, exchange_rate)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                 ON CONFLICT (tx_hash, height, event_index) DO NOTHING",
            )
            .bind(&key.tx_hash)
            .bind(sql_int(key.height))
            .bind(i64::from(key.event_index))
            .bind(r.timestamp)
            .bind(&r.staker)
            .bind(&r.regen_amount)
            .bind(&r.dregen_amount)
            .bind(r.exchange_rate),
            DomainRecord::Unbond(r) => sqlx::query(
                "INSERT INTO unbond_events
                    (tx_hash, height, event_index, timestamp, \"user\", dregen_amount, regen_amount, unbonding_id, completion_time)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                 ON CONFLICT (tx_hash, height, event_index) DO NOTHING",
            )
            .bind(&key.tx_hash)
            .bind(sql_int(key.height))
            .bind(i64::from(key.event_index))
            .bind(r.timestamp)
            .bind(&r.user)
            .bind(&r.dregen_amount)
            .bind(&r.regen_amount)
            .bind(sql_int(r.unbonding_id))
            .bind(r.completion_time),
            DomainRecord::Reward(r) => sqlx::query(
                "INSERT INTO reward_events (tx_hash, height, event_index, timestamp, claimer)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (tx_hash, height, event_index) DO NOTHING",
            )
            .bind(&key.tx_hash)
            .bind(sql_int(key.height))
            .bind(i64::from(key.event_index))
            .bind(r.timestamp)
            .bind(&r.claimer),
        };

        query
            .execute(&self.pool)
            .await
            .map_err(|e| IndexerError::StorageError {
                record: record.kind().into(),
                backend: "postgres".into(),
                source: Box::new(e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for PostgreSQLStore {
    async fn load_checkpoint(&self) -> Result<Option<BlockHeight>, IndexerError> {
        let row: Option<i64> =
            sqlx::query_scalar("SELECT last_block FROM indexer_checkpoint WHERE id = $1")
                .bind(CHECKPOINT_ID)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IndexerError::CheckpointError {
                    operation: "load_checkpoint".into(),
                    backend: "postgres".into(),
                    source: Box::new(e),
                })?;

        Ok(row.map(|v| u64::try_from(v).unwrap_or(0)))
    }

    async fn store_checkpoint(&self, height: BlockHeight) -> Result<(), IndexerError> {
        sqlx::query(
            "INSERT INTO indexer_checkpoint (id, last_block)
             VALUES ($1, $2)
             ON CONFLICT (id) DO UPDATE SET last_block = EXCLUDED.last_block",
        )
        .bind(CHECKPOINT_ID)
        .bind(sql_int(height))
        .execute(&self.pool)
        .await
        .map_err(|e| IndexerError::CheckpointError {
            operation: "store_checkpoint".into(),
            backend: "postgres".into(),
            source: Box::new(e),
        })?;

        Ok(())
    }
}

impl Storage for PostgreSQLStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }
}
