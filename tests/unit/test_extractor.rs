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
use regen_staking_indexer::{Attribute, ContractAddress, EventExtractor, RawContractEvent};

fn extractor() -> EventExtractor {
    EventExtractor::new(ContractAddress::parse(CONTRACT).unwrap())
}

#[test]
fn keeps_only_wasm_events_of_the_contract() {
    let events = vec![
        message_event(),
        stake_event("a", "1", "1", "1"),
        wasm_event(OTHER_CONTRACT, &[("action", "stake")]),
        RawContractEvent::new(
            "execute",
            vec![Attribute::new("_contract_address", CONTRACT)],
        ),
        claim_event("b"),
    ];
    let matched: Vec<u32> = extractor().extract(&events).into_iter().map(|(i, _)| i).collect();
    assert_eq!(matched, vec![1, 4]);
}

#[test]
fn event_without_contract_address_is_dropped() {
    let event = RawContractEvent::new("wasm", vec![Attribute::new("action", "stake")]);
    assert!(!extractor().matches(&event));
}

#[test]
fn extraction_preserves_order_and_references() {
    let events = vec![claim_event("x"), stake_event("y", "1", "1", "1")];
    let matched = extractor().extract(&events);
    assert_eq!(matched.len(), 2);
    assert!(std::ptr::eq(matched[0].1, &events[0]));
    assert!(std::ptr::eq(matched[1].1, &events[1]));
}

#[test]
fn empty_input() {
    assert!(extractor().extract(&[]).is_empty());
    assert_eq!(extractor().contract().as_str(), CONTRACT);
}
