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

use regen_staking_indexer::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Blocks scanned behind the current head.
const WINDOW: u64 = 50;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Init tracing subscriber
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .with_level(true)
        .compact()
        .init();

    let rpc = HttpUrl::parse("https://rpc.regen.network")?;
    let contract = ContractAddress::parse(&std::env::var("CONTRACT_ADDRESS")?)?;

    let chain = Arc::new(TendermintClient::new(rpc.clone(), Duration::from_secs(10))?);
    let head = chain.current_height().await?;
    let store = Arc::new(MemoryStore::new());

    let indexer = IndexerBuilder::new()
        .connect(rpc)
        .contract(contract)
        .with_chain(chain)
        .with_store(store.clone())
        .start_from_height(head.saturating_sub(WINDOW))
        .build()
        .await?;

    let outcome = indexer.run_backfill().await?;
    info!(?outcome, status = ?indexer.status(), "Backfill finished");

    for record in store.records().await {
        let key = record.key();
        info!(
            kind = record.kind(),
            height = key.height,
            tx = %key.tx_hash,
            "Record"
        );
    }

    Ok(())
}
