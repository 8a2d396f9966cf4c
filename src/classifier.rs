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

use crate::config::DEFAULT_ACTION_KEY;
use crate::records::{DomainRecord, RecordKey, RewardRecord, StakeRecord, UnbondRecord};
use crate::types::{EventContext, RawContractEvent};
use chrono::{DateTime, TimeZone, Utc};

pub const ACTION_STAKE: &str = "stake";
pub const ACTION_UNBOND: &str = "unbond";
pub const ACTION_CLAIM_REWARDS: &str = "claim_rewards";

/// Maps a contract event to a typed record based on its action attribute.
///
/// Classification never fails: missing or malformed attributes fall back to
/// empty strings, zero amounts and the Unix epoch, and unknown actions yield
/// no record at all.
#[derive(Clone, Debug)]
pub struct DomainClassifier {
    action_key: String,
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ACTION_KEY)
    }
}

impl DomainClassifier {
    pub fn new(action_key: impl Into<String>) -> Self {
        Self {
            action_key: action_key.into(),
        }
    }

    pub fn action_key(&self) -> &str {
        &self.action_key
    }

    pub fn classify(&self, event: &RawContractEvent, ctx: &EventContext) -> Option<DomainRecord> {
        let key = RecordKey::from(ctx);
        let timestamp = ctx.timestamp;
        match event.attribute(&self.action_key)? {
            ACTION_STAKE => Some(DomainRecord::Stake(StakeRecord {
                key,
                staker: text(event, "staker"),
                regen_amount: amount(event, "regen_amount"),
                dregen_amount: amount(event, "dregen_amount"),
                exchange_rate: parse_rate(event.attribute("exchange_rate")),
                timestamp,
            })),
            ACTION_UNBOND => Some(DomainRecord::Unbond(UnbondRecord {
                key,
                user: text(event, "user"),
                dregen_amount: amount(event, "dregen_amount"),
                regen_amount: amount(event, "regen_amount"),
                unbonding_id: parse_id(event.attribute("unbonding_id")),
                completion_time: parse_unix_seconds(event.attribute("completion_time")),
                timestamp,
            })),
            ACTION_CLAIM_REWARDS => Some(DomainRecord::Reward(RewardRecord {
                key,
                claimer: text(event, "claimer"),
                timestamp,
            })),
            _ => None,
        }
    }
}

fn text(event: &RawContractEvent, key: &str) -> String {
    event.attribute(key).unwrap_or_default().to_string()
}

fn amount(event: &RawContractEvent, key: &str) -> String {
    match event.attribute(key).map(str::trim) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => "0".to_string(),
    }
}

/// Longest numeric prefix of `raw` after leading whitespace: optional sign,
/// digits and, when `fractional`, a decimal point and exponent. `None` when
/// no digit leads the value.
fn leading_number(raw: &str, fractional: bool) -> Option<&str> {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let digits = |from: usize| {
        from + bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let sign = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    let mut end = digits(sign);
    let mut any_digit = end > sign;

    if fractional {
        if bytes.get(end) == Some(&b'.') {
            let frac_end = digits(end + 1);
            if any_digit || frac_end > end + 1 {
                any_digit = true;
                end = frac_end;
            }
        }
        if any_digit && matches!(bytes.get(end), Some(b'e' | b'E')) {
            let exp_sign = usize::from(matches!(bytes.get(end + 1), Some(b'+' | b'-')));
            let exp_end = digits(end + 1 + exp_sign);
            if exp_end > end + 1 + exp_sign {
                end = exp_end;
            }
        }
    }

    any_digit.then(|| &s[..end])
}

/// Leading decimal number of the value; `0.0` when there is none or it is
/// not finite. `"1.0526abc"` reads as `1.0526`.
pub fn parse_rate(raw: Option<&str>) -> f64 {
    raw.and_then(|v| leading_number(v, true))
        .and_then(|n| n.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Leading integer of the value. Negative ids and ids beyond `i64::MAX`
/// (the widest integer column the stores offer) read as `0`.
pub fn parse_id(raw: Option<&str>) -> u64 {
    raw.and_then(|v| leading_number(v, false))
        .and_then(|n| n.parse::<i64>().ok())
        .and_then(|id| u64::try_from(id).ok())
        .unwrap_or(0)
}

/// Leading integer of the value as seconds since the Unix epoch, converted
/// through milliseconds. Falls back to the epoch.
pub fn parse_unix_seconds(raw: Option<&str>) -> DateTime<Utc> {
    let seconds = raw
        .and_then(|v| leading_number(v, false))
        .and_then(|n| n.parse::<i64>().ok())
        .unwrap_or(0);
    seconds
        .checked_mul(1000)
        .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
        .unwrap_or(DateTime::UNIX_EPOCH)
}
