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

//! CometBFT JSON-RPC client.
//!
//! Responses are deserialised into private wire structs and converted into
//! the crate's typed shapes before anything else sees them. Anything that
//! does not fit (unparsable heights, bad timestamps, transactions from the
//! wrong height) is rejected as a malformed response.

use crate::chain::ChainReader;
use crate::error::IndexerError;
use crate::types::{Attribute, BlockHeader, BlockHeight, RawContractEvent, TxResult};
use crate::validated_types::HttpUrl;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::trace;

const TX_PAGE_SIZE: usize = 100;

pub struct TendermintClient {
    url: HttpUrl,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl TendermintClient {
    pub fn new(url: HttpUrl, request_timeout: Duration) -> Result<Self, IndexerError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| IndexerError::Rpc {
                method: "connect".into(),
                url: url.to_string(),
                source: Box::new(e),
            })?;
        Ok(Self {
            url,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &HttpUrl {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, IndexerError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        trace!(target: "indexer", method, id, "rpc request");

        let transport = |e: reqwest::Error| IndexerError::Rpc {
            method: method.to_string(),
            url: self.url.to_string(),
            source: Box::new(e),
        };
        let resp = self
            .http
            .post(self.url.as_str())
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        let bytes = resp.bytes().await.map_err(transport)?;

        let envelope: RpcEnvelope<T> = match serde_json::from_slice(&bytes) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                let excerpt = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
                return Err(IndexerError::RpcResponse {
                    method: method.to_string(),
                    code: i64::from(status.as_u16()),
                    message: excerpt.into_owned(),
                });
            }
            Err(e) => return Err(IndexerError::malformed(method, e.to_string())),
        };
        open_envelope(method, envelope)
    }
}

#[async_trait]
impl ChainReader for TendermintClient {
    async fn current_height(&self) -> Result<BlockHeight, IndexerError> {
        let status: StatusResult = self.call("status", json!({})).await?;
        parse_number("status", &status.sync_info.latest_block_height)
    }

    async fn block_header(&self, height: BlockHeight) -> Result<BlockHeader, IndexerError> {
        let block: BlockResult = self
            .call("block", json!({ "height": height.to_string() }))
            .await
            .map_err(|e| unavailable_as_not_found(e, height))?;
        into_header(height, block)
    }

    async fn transactions_at(&self, height: BlockHeight) -> Result<Vec<TxResult>, IndexerError> {
        let mut txs = Vec::new();
        let mut page = 1usize;
        loop {
            let result: TxSearchResult = self
                .call(
                    "tx_search",
                    json!({
                        "query": format!("tx.height={height}"),
                        "prove": false,
                        "page": page.to_string(),
                        "per_page": TX_PAGE_SIZE.to_string(),
                        "order_by": "asc",
                    }),
                )
                .await
                .map_err(|e| unavailable_as_not_found(e, height))?;
            let (total, fetched) = collect_page(height, result, &mut txs)?;
            if fetched == 0 || txs.len() >= total {
                break;
            }
            page += 1;
        }
        txs.sort_by_key(|(index, _)| *index);
        Ok(txs.into_iter().map(|(_, tx)| tx).collect())
    }
}

// Wire shapes

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

#[derive(Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Deserialize)]
struct BlockResult {
    block: WireBlock,
}

#[derive(Deserialize)]
struct WireBlock {
    header: WireHeader,
}

#[derive(Deserialize)]
struct WireHeader {
    height: String,
    time: String,
}

#[derive(Deserialize)]
struct TxSearchResult {
    #[serde(default)]
    txs: Vec<WireTx>,
    total_count: String,
}

#[derive(Deserialize)]
struct WireTx {
    hash: String,
    height: String,
    #[serde(default)]
    index: u32,
    tx_result: WireTxResult,
}

#[derive(Deserialize)]
struct WireTxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    events: Vec<WireEvent>,
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    attributes: Vec<WireAttribute>,
}

#[derive(Deserialize)]
struct WireAttribute {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
}

// Conversion into typed shapes

fn open_envelope<T>(method: &str, envelope: RpcEnvelope<T>) -> Result<T, IndexerError> {
    if let Some(err) = envelope.error {
        let message = match err.data {
            Some(Value::String(data)) => format!("{}: {data}", err.message),
            Some(Value::Null) | None => err.message,
            Some(other) => format!("{}: {other}", err.message),
        };
        return Err(IndexerError::RpcResponse {
            method: method.to_string(),
            code: err.code,
            message,
        });
    }
    envelope
        .result
        .ok_or_else(|| IndexerError::malformed(method, "missing result"))
}

/// Pruned nodes answer "height N is not available, lowest height is M".
/// Retrying cannot help there.
fn unavailable_as_not_found(err: IndexerError, height: BlockHeight) -> IndexerError {
    match err {
        IndexerError::RpcResponse { ref message, .. }
            if message.contains("is not available") || message.contains("lowest height") =>
        {
            IndexerError::BlockNotFound { block: height }
        }
        other => other,
    }
}

fn parse_number(method: &str, raw: &str) -> Result<u64, IndexerError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| IndexerError::malformed(method, format!("`{raw}` is not a valid number")))
}

fn into_header(requested: BlockHeight, block: BlockResult) -> Result<BlockHeader, IndexerError> {
    let height = parse_number("block", &block.block.header.height)?;
    if height != requested {
        return Err(IndexerError::malformed(
            "block",
            format!("asked for height {requested}, got {height}"),
        ));
    }
    let time = DateTime::parse_from_rfc3339(&block.block.header.time)
        .map_err(|e| {
            IndexerError::malformed("block", format!("bad header time `{}`: {e}", block.block.header.time))
        })?
        .with_timezone(&Utc);
    Ok(BlockHeader { height, time })
}

fn into_tx(requested: BlockHeight, tx: WireTx) -> Result<(u32, TxResult), IndexerError> {
    if tx.hash.trim().is_empty() {
        return Err(IndexerError::malformed("tx_search", "transaction without hash"));
    }
    let height = parse_number("tx_search", &tx.height)?;
    if height != requested {
        return Err(IndexerError::malformed(
            "tx_search",
            format!("transaction {} is at height {height}, expected {requested}", tx.hash),
        ));
    }
    let events = tx
        .tx_result
        .events
        .into_iter()
        .map(|event| {
            let attributes = event
                .attributes
                .into_iter()
                .map(|a| Attribute::new(a.key.unwrap_or_default(), a.value.unwrap_or_default()))
                .collect();
            RawContractEvent::new(event.kind, attributes)
        })
        .collect();
    Ok((
        tx.index,
        TxResult {
            hash: tx.hash,
            height,
            code: tx.tx_result.code,
            events,
        },
    ))
}

fn collect_page(
    requested: BlockHeight,
    page: TxSearchResult,
    out: &mut Vec<(u32, TxResult)>,
) -> Result<(usize, usize), IndexerError> {
    let total = parse_number("tx_search", &page.total_count)? as usize;
    let fetched = page.txs.len();
    for tx in page.txs {
        out.push(into_tx(requested, tx)?);
    }
    Ok((total, fetched))
}
