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

#[path = "../common/mod.rs"]
mod common;
use chrono::{TimeZone, Utc};
use common::*;
use regen_staking_indexer::storage::CheckpointStore;
use regen_staking_indexer::{
    BackfillOutcome, DomainRecord, IndexerBuilder, IndexerError, IndexerStatus, MemoryStore, Phase,
    TickOutcome,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn stake_event_is_indexed_end_to_end() {
    let chain = Arc::new(MockChain::new(100).with_tx(tx(
        "ABC123",
        100,
        vec![
            message_event(),
            stake_event("addr1", "1000000", "950000", "1.0526"),
        ],
    )));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store.clone(), test_config(99));
    assert_eq!(
        indexer.status(),
        IndexerStatus {
            phase: Phase::Uninitialized,
            cursor: 99
        }
    );

    let outcome = indexer.run_backfill().await.unwrap();
    assert_eq!(outcome, BackfillOutcome::Completed { head: 100 });
    assert_eq!(
        indexer.status(),
        IndexerStatus {
            phase: Phase::RealTime,
            cursor: 100
        }
    );

    let records = store.records().await;
    assert_eq!(records.len(), 1);
    match &records[0] {
        DomainRecord::Stake(stake) => {
            assert_eq!(stake.staker, "addr1");
            assert_eq!(stake.regen_amount, "1000000");
            assert_eq!(stake.dregen_amount, "950000");
            assert_eq!(stake.exchange_rate, 1.0526);
            assert_eq!(
                stake.timestamp,
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
            );
            assert_eq!(stake.key.tx_hash, "ABC123");
            assert_eq!(stake.key.height, 100);
            assert_eq!(stake.key.event_index, 1);
        }
        other => panic!("expected stake record, got {other:?}"),
    }
}

#[tokio::test]
async fn every_matching_event_yields_one_record() {
    let chain = Arc::new(MockChain::new(1).with_tx(tx(
        "T1",
        1,
        vec![
            stake_event("alice", "10", "9", "1.1"),
            message_event(),
            unbond_event("bob", "3", "1700000000"),
            claim_event("carol"),
        ],
    )));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    assert_eq!(indexer.process_block(1).await.unwrap(), 3);
    let kinds: Vec<_> = store.records().await.iter().map(|r| r.kind()).collect();
    assert_eq!(kinds, vec!["stake", "unbond", "reward"]);
    let indices: Vec<_> = store
        .records()
        .await
        .iter()
        .map(|r| r.key().event_index)
        .collect();
    assert_eq!(indices, vec![0, 2, 3]);
}

#[tokio::test]
async fn foreign_contracts_and_unknown_actions_are_ignored() {
    let chain = Arc::new(MockChain::new(1).with_tx(tx(
        "T1",
        1,
        vec![
            wasm_event(OTHER_CONTRACT, &[("action", "stake"), ("staker", "mallory")]),
            wasm_event(CONTRACT, &[("action", "update_config")]),
            wasm_event(CONTRACT, &[("staker", "no-action")]),
            message_event(),
        ],
    )));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    assert_eq!(indexer.process_block(1).await.unwrap(), 0);
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn failed_transactions_contribute_nothing() {
    let chain = Arc::new(
        MockChain::new(1)
            .with_tx(failed_tx("BAD", 1, vec![stake_event("x", "1", "1", "1")]))
            .with_tx(tx("GOOD", 1, vec![claim_event("y")])),
    );
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    indexer.run_backfill().await.unwrap();
    let records = store.records().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key().tx_hash, "GOOD");
}

#[tokio::test]
async fn processing_a_block_twice_is_idempotent() {
    let chain = Arc::new(MockChain::new(5).with_tx(tx(
        "T5",
        5,
        vec![stake_event("a", "1", "1", "1"), claim_event("a")],
    )));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    indexer.process_block(5).await.unwrap();
    let once = store.records().await;
    indexer.process_block(5).await.unwrap();
    assert_eq!(store.records().await, once);
    assert_eq!(once.len(), 2);
}

#[tokio::test]
async fn unbond_completion_time_is_converted_from_seconds() {
    let chain = Arc::new(MockChain::new(1).with_tx(tx(
        "T1",
        1,
        vec![unbond_event("bob", "42", "1700000000")],
    )));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    indexer.run_backfill().await.unwrap();
    match &store.records().await[0] {
        DomainRecord::Unbond(unbond) => {
            assert_eq!(unbond.unbonding_id, 42);
            assert_eq!(
                unbond.completion_time,
                Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20).unwrap()
            );
        }
        other => panic!("expected unbond record, got {other:?}"),
    }
}

#[tokio::test]
async fn cursor_only_moves_forward() {
    let chain = Arc::new(MockChain::new(5));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    let mut rx = indexer.subscribe_cursor();
    let watcher = tokio::spawn(async move {
        let mut seen = Vec::new();
        while rx.changed().await.is_ok() {
            let value = *rx.borrow_and_update();
            seen.push(value);
            if value >= 5 {
                break;
            }
        }
        seen
    });

    indexer.run_backfill().await.unwrap();
    let seen = tokio::time::timeout(Duration::from_secs(1), watcher)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(seen.last(), Some(&5));
    assert!(seen.windows(2).all(|w| w[0] < w[1]));

    // Re-processing an old block leaves the cursor alone.
    indexer.process_block(2).await.unwrap();
    assert_eq!(indexer.cursor(), 5);
    assert_eq!(indexer.real_time_tick().await.unwrap(), TickOutcome::UpToDate);
    assert_eq!(indexer.cursor(), 5);
}

#[tokio::test]
async fn handoff_gap_is_processed_exactly_once() {
    let chain = Arc::new(MockChain::new(10));
    chain.bump_head_after(5, 13);
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    let outcome = indexer.run_backfill().await.unwrap();
    assert_eq!(outcome, BackfillOutcome::Completed { head: 10 });
    assert_eq!(indexer.cursor(), 10);

    let tick = indexer.real_time_tick().await.unwrap();
    assert_eq!(tick, TickOutcome::Processed { from: 11, to: 13 });
    assert_eq!(indexer.real_time_tick().await.unwrap(), TickOutcome::UpToDate);

    assert_eq!(chain.fetched(), (1..=13).collect::<Vec<_>>());
}

#[tokio::test]
async fn overlapping_tick_is_skipped() {
    let chain = Arc::new(MockChain::new(3));
    chain.set_delay(Duration::from_millis(50));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    let (first, second) = tokio::join!(indexer.real_time_tick(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        indexer.real_time_tick().await
    });

    assert_eq!(first.unwrap(), TickOutcome::Processed { from: 1, to: 3 });
    assert_eq!(second.unwrap(), TickOutcome::Skipped);
    assert_eq!(chain.fetched(), vec![1, 2, 3]);
}

#[tokio::test]
async fn tick_is_skipped_while_backfill_runs() {
    let chain = Arc::new(MockChain::new(4));
    chain.set_delay(Duration::from_millis(20));
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    let (backfill, tick) = tokio::join!(indexer.run_backfill(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        indexer.real_time_tick().await
    });

    assert_eq!(backfill.unwrap(), BackfillOutcome::Completed { head: 4 });
    assert_eq!(tick.unwrap(), TickOutcome::Skipped);
    assert_eq!(chain.fetched(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let chain = Arc::new(MockChain::new(5));
    chain.fail_block(2, 2);
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    indexer.run_backfill().await.unwrap();
    assert_eq!(indexer.cursor(), 5);
    assert_eq!(chain.fetched(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn exhausted_retries_halt_without_advancing() {
    let chain = Arc::new(MockChain::new(5));
    chain.fail_block(3, 100);
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    let err = indexer.run_backfill().await.unwrap_err();
    assert!(err.is_fatal());
    match err {
        IndexerError::BlockFailed {
            block, attempts, ..
        } => {
            assert_eq!(block, 3);
            assert_eq!(attempts, 3);
        }
        other => panic!("expected BlockFailed, got {other:?}"),
    }
    assert_eq!(indexer.cursor(), 2);
    assert_eq!(indexer.phase(), Phase::Halted);
    assert_eq!(chain.fetched(), vec![1, 2]);

    let again = indexer.real_time_tick().await.unwrap_err();
    assert!(matches!(again, IndexerError::Halted { cursor: 2 }));
    assert!(matches!(
        indexer.run_backfill().await,
        Err(IndexerError::Halted { cursor: 2 })
    ));
}

#[tokio::test]
async fn storage_failure_halts_the_block() {
    let chain = Arc::new(MockChain::new(2).with_tx(tx("T1", 1, vec![claim_event("a")])));
    let store = Arc::new(FlakyStore::failing(usize::MAX));
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    let err = indexer.run_backfill().await.unwrap_err();
    assert!(matches!(err, IndexerError::BlockFailed { block: 1, .. }));
    assert_eq!(indexer.cursor(), 0);
    assert_eq!(store.attempts.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert!(store.inner.is_empty().await);
}

#[tokio::test]
async fn storage_recovers_within_retry_budget() {
    let chain = Arc::new(MockChain::new(2).with_tx(tx("T1", 1, vec![claim_event("a")])));
    let store = Arc::new(FlakyStore::failing(2));
    let indexer = test_indexer(chain, store.clone(), test_config(0));

    indexer.run_backfill().await.unwrap();
    assert_eq!(indexer.cursor(), 2);
    assert_eq!(store.inner.len().await, 1);
}

#[tokio::test]
async fn unreachable_head_halts() {
    let chain = Arc::new(MockChain::new(5));
    chain.fail_head(100);
    let store = Arc::new(MemoryStore::new());
    let indexer = test_indexer(chain.clone(), store, test_config(0));

    assert!(indexer.run_backfill().await.is_err());
    assert_eq!(indexer.phase(), Phase::Halted);
    assert_eq!(indexer.cursor(), 0);
    assert_eq!(chain.head_calls(), 3);
    assert!(chain.fetched().is_empty());
}

#[tokio::test]
async fn shutdown_stops_between_blocks() {
    let chain = Arc::new(MockChain::new(1_000));
    chain.set_delay(Duration::from_millis(5));
    let store = Arc::new(MemoryStore::new());
    let indexer = Arc::new(test_indexer(chain.clone(), store, test_config(0)));
    let shutdown = indexer.shutdown_handle();

    let runner = indexer.clone();
    let handle = tokio::spawn(async move { runner.run().await });
    tokio::time::sleep(Duration::from_millis(40)).await;
    shutdown.trigger();

    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(indexer.phase(), Phase::Stopped);
    let cursor = indexer.cursor();
    assert!(cursor > 0 && cursor < 1_000);
    assert_eq!(chain.fetched(), (1..=cursor).collect::<Vec<_>>());
}

#[tokio::test]
async fn run_keeps_polling_until_shutdown() {
    let chain = Arc::new(MockChain::new(2));
    let store = Arc::new(MemoryStore::new());
    let indexer = Arc::new(test_indexer(chain.clone(), store.clone(), test_config(0)));
    let shutdown = indexer.shutdown_handle();
    let mut cursor = indexer.subscribe_cursor();

    let runner = indexer.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::timeout(Duration::from_secs(2), cursor.wait_for(|c| *c == 2))
        .await
        .unwrap()
        .unwrap();
    chain.add_tx(tx("LATE", 4, vec![stake_event("late", "5", "5", "1")]));
    chain.set_head(4);
    tokio::time::timeout(Duration::from_secs(2), cursor.wait_for(|c| *c == 4))
        .await
        .unwrap()
        .unwrap();

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(indexer.phase(), Phase::Stopped);
    assert_eq!(store.len().await, 1);
    assert_eq!(chain.fetched(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn resumes_from_stored_checkpoint() {
    let chain = Arc::new(MockChain::new(9));
    let store = Arc::new(MemoryStore::new());
    store.store_checkpoint(7).await.unwrap();
    let mut config = test_config(3);
    config.resume_from_checkpoint = true;
    let indexer = test_indexer(chain.clone(), store.clone(), config);

    assert_eq!(indexer.initialize().await.unwrap(), 7);
    indexer.run_backfill().await.unwrap();
    assert_eq!(chain.fetched(), vec![8, 9]);
    assert_eq!(store.load_checkpoint().await.unwrap(), Some(9));
}

#[tokio::test]
async fn checkpoint_is_ignored_unless_resuming() {
    let chain = Arc::new(MockChain::new(5));
    let store = Arc::new(MemoryStore::new());
    store.store_checkpoint(4).await.unwrap();
    let indexer = test_indexer(chain.clone(), store.clone(), test_config(2));

    assert_eq!(indexer.initialize().await.unwrap(), 2);
    indexer.run_backfill().await.unwrap();
    assert_eq!(chain.fetched(), vec![3, 4, 5]);
    assert_eq!(store.load_checkpoint().await.unwrap(), Some(4));
}

#[tokio::test]
async fn invalid_config_is_rejected_before_scanning() {
    let chain = Arc::new(MockChain::new(5));
    let mut config = test_config(0);
    config.contract_address = String::new();

    let result = regen_staking_indexer::Indexer::new(chain.clone(), Arc::new(MemoryStore::new()), config);
    assert!(matches!(result, Err(IndexerError::InvalidConfig { .. })));
    assert_eq!(chain.head_calls(), 0);
}

#[tokio::test]
async fn builder_wires_injected_components() {
    let chain = Arc::new(MockChain::new(2).with_tx(tx("T2", 2, vec![claim_event("z")])));
    let store = Arc::new(MemoryStore::new());

    let indexer = IndexerBuilder::new()
        .contract(regen_staking_indexer::ContractAddress::parse(CONTRACT).unwrap())
        .with_chain(chain.clone())
        .with_store(store.clone())
        .start_from_height(1)
        .build()
        .await
        .unwrap();

    indexer.run_backfill().await.unwrap();
    assert_eq!(chain.fetched(), vec![2]);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn builder_forwards_database_url() {
    let indexer = IndexerBuilder::new()
        .contract(regen_staking_indexer::ContractAddress::parse(CONTRACT).unwrap())
        .with_chain(Arc::new(MockChain::new(1)))
        .with_store(Arc::new(MemoryStore::new()))
        .database_url("sqlite://staking.db")
        .build()
        .await
        .unwrap();
    assert_eq!(
        indexer.config().database_url.as_deref(),
        Some("sqlite://staking.db")
    );

    let result = IndexerBuilder::new()
        .contract(regen_staking_indexer::ContractAddress::parse(CONTRACT).unwrap())
        .with_chain(Arc::new(MockChain::new(1)))
        .with_store(Arc::new(MemoryStore::new()))
        .database_url("mysql://localhost/db")
        .build()
        .await;
    assert!(matches!(result, Err(IndexerError::InvalidConfig { .. })));
}

#[tokio::test]
async fn builder_requires_contract() {
    let result = IndexerBuilder::new()
        .with_chain(Arc::new(MockChain::new(1)))
        .build()
        .await;
    assert!(matches!(result, Err(IndexerError::InvalidConfig { .. })));
}
