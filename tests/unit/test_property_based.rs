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
use common::*;
use once_cell::sync::Lazy;
use proptest::prelude::*;
use regen_staking_indexer::classifier::{parse_rate, parse_unix_seconds};
use regen_staking_indexer::{
    config::IndexerConfig, DomainClassifier, DomainRecord, EventContext, IndexerError,
    MemoryStore, RawContractEvent,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

static RT: Lazy<Runtime> = Lazy::new(|| Runtime::new().unwrap());

#[derive(Clone, Debug)]
enum EventShape {
    Stake,
    Unbond,
    Claim,
    Foreign,
    UnknownAction,
    NotWasm,
}

impl EventShape {
    fn recognized(&self) -> bool {
        matches!(self, Self::Stake | Self::Unbond | Self::Claim)
    }

    fn build(&self, i: usize) -> RawContractEvent {
        let who = format!("addr{i}");
        match self {
            Self::Stake => stake_event(&who, "100", "95", "1.05"),
            Self::Unbond => unbond_event(&who, &i.to_string(), "1700000000"),
            Self::Claim => claim_event(&who),
            Self::Foreign => wasm_event(OTHER_CONTRACT, &[("action", "stake"), ("staker", &who)]),
            Self::UnknownAction => wasm_event(CONTRACT, &[("action", "withdraw")]),
            Self::NotWasm => message_event(),
        }
    }
}

fn shape() -> impl Strategy<Value = EventShape> {
    prop_oneof![
        Just(EventShape::Stake),
        Just(EventShape::Unbond),
        Just(EventShape::Claim),
        Just(EventShape::Foreign),
        Just(EventShape::UnknownAction),
        Just(EventShape::NotWasm),
    ]
}

// N matching events with a known action yield exactly N records, once.
#[test]
fn prop_block_processing_is_complete_and_idempotent() {
    proptest!(|(shapes in proptest::collection::vec(shape(), 0..12), failed in any::<bool>())| {
        let events: Vec<_> = shapes.iter().enumerate().map(|(i, s)| s.build(i)).collect();
        let expected = if failed { 0 } else { shapes.iter().filter(|s| s.recognized()).count() };
        let transaction = if failed { failed_tx("T", 1, events) } else { tx("T", 1, events) };

        let chain = Arc::new(MockChain::new(1).with_tx(transaction));
        let store = Arc::new(MemoryStore::new());
        let indexer = test_indexer(chain, store.clone(), test_config(0));

        let stored = RT.block_on(indexer.process_block(1)).unwrap();
        prop_assert_eq!(stored, expected);
        let first = RT.block_on(store.records());
        RT.block_on(indexer.process_block(1)).unwrap();
        let second = RT.block_on(store.records());
        prop_assert_eq!(first.len(), expected);
        prop_assert_eq!(first, second);
    });
}

#[test]
fn prop_backfill_visits_every_height_once() {
    proptest!(|(start in 0u64..50, span in 0u64..40)| {
        let head = start + span;
        let chain = Arc::new(MockChain::new(head));
        let indexer = test_indexer(chain.clone(), Arc::new(MemoryStore::new()), test_config(start));

        RT.block_on(indexer.run_backfill()).unwrap();
        prop_assert_eq!(indexer.cursor(), head);
        prop_assert_eq!(chain.fetched(), ((start + 1)..=head).collect::<Vec<_>>());
    });
}

#[test]
fn prop_stake_amounts_never_fail() {
    proptest!(|(regen in ".{0,12}", rate in ".{0,12}")| {
        let event = wasm_event(
            CONTRACT,
            &[("action", "stake"), ("regen_amount", &regen), ("exchange_rate", &rate)],
        );
        let ctx = EventContext::new("H", 1, 0, genesis_time());
        let record = DomainClassifier::default().classify(&event, &ctx);
        let Some(DomainRecord::Stake(stake)) = record else {
            panic!("stake event must classify");
        };
        if regen.trim().is_empty() {
            prop_assert_eq!(stake.regen_amount, "0");
        } else {
            prop_assert_eq!(stake.regen_amount, regen.trim());
        }
        prop_assert!(stake.exchange_rate.is_finite());
        prop_assert_eq!(stake.exchange_rate, parse_rate(Some(rate.as_str())));
    });
}

#[test]
fn prop_unix_seconds_round_trip() {
    proptest!(|(secs in 0i64..10_000_000_000)| {
        let time = parse_unix_seconds(Some(&secs.to_string()));
        prop_assert_eq!(time.timestamp(), secs);
    });
}

#[test]
fn prop_config_validation() {
    proptest!(|(secure in any::<bool>(), host in "[a-z0-9]{1,20}", port in 1u32..65535, contract in "regen1[a-z0-9]{10,40}")| {
        let proto = if secure { "https" } else { "http" };
        let url = format!("{proto}://{host}:{port}");

        let built = IndexerConfig::builder()
            .rpc_url(url.clone())
            .contract_address(contract.clone())
            .with_postgres("postgres://user@localhost/db")
            .build()
            .unwrap();
        prop_assert_eq!(&built.rpc_url, &url);
        prop_assert_eq!(&built.contract_address, &contract);

        let bad = format!("ws://{host}:{port}");
        let err = IndexerConfig::builder().rpc_url(bad).contract_address(contract).build().err().unwrap();
        match err { IndexerError::InvalidConfig { field, .. } => prop_assert_eq!(field, "rpc_url"), _ => panic!("wrong error") }
    });
}
