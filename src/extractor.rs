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

use crate::types::RawContractEvent;
use crate::validated_types::ContractAddress;

pub const WASM_EVENT_TYPE: &str = "wasm";
pub const CONTRACT_ADDRESS_KEY: &str = "_contract_address";

/// Selects the wasm events emitted by one contract.
#[derive(Clone, Debug)]
pub struct EventExtractor {
    contract: ContractAddress,
}

impl EventExtractor {
    pub fn new(contract: ContractAddress) -> Self {
        Self { contract }
    }

    pub fn contract(&self) -> &ContractAddress {
        &self.contract
    }

    pub fn matches(&self, event: &RawContractEvent) -> bool {
        event.kind == WASM_EVENT_TYPE
            && event
                .attributes
                .iter()
                .any(|a| a.key == CONTRACT_ADDRESS_KEY && a.value == self.contract.as_str())
    }

    /// Matching events paired with their index in `events`, in emission order.
    pub fn extract<'a>(&self, events: &'a [RawContractEvent]) -> Vec<(u32, &'a RawContractEvent)> {
        events
            .iter()
            .enumerate()
            .filter(|(_, event)| self.matches(event))
            .map(|(index, event)| (index as u32, event))
            .collect()
    }
}
