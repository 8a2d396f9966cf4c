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

//! Regen liquid staking indexer.
//!
//! ```bash
//! CONTRACT_ADDRESS=regen1... DATABASE_URL=postgres://localhost/staking regen-staking-indexer
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use regen_staking_indexer::config::{DEFAULT_ACTION_KEY, DEFAULT_MAX_BLOCK_RETRIES};
use regen_staking_indexer::{IndexerBuilder, IndexerConfig, IndexerError, Phase};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "regen-staking-indexer")]
#[command(about = "Indexes stake, unbond and reward events of the Regen liquid staking contract")]
#[command(version)]
struct Cli {
    /// CometBFT RPC endpoint.
    #[arg(long, env = "RPC_ENDPOINT", default_value = "https://rpc.regen.network")]
    rpc_endpoint: String,

    /// Bech32 address of the liquid staking contract.
    #[arg(long, env = "CONTRACT_ADDRESS")]
    contract_address: String,

    /// Last height considered processed; scanning starts right after it.
    #[arg(long, env = "START_HEIGHT", default_value_t = 0, allow_negative_numbers = true)]
    start_height: i64,

    /// postgres:// or sqlite:// URL. Records go to a JSON file when unset.
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 30_000)]
    poll_interval_ms: u64,

    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    request_timeout_ms: u64,

    #[arg(long, env = "MAX_BLOCK_RETRIES", default_value_t = DEFAULT_MAX_BLOCK_RETRIES)]
    max_block_retries: usize,

    /// Continue from the stored checkpoint instead of START_HEIGHT.
    #[arg(long, env = "RESUME_FROM_CHECKPOINT")]
    resume_from_checkpoint: bool,

    /// Attribute holding the action name.
    #[arg(long, env = "ACTION_KEY", default_value = DEFAULT_ACTION_KEY)]
    action_key: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,
}

impl Cli {
    fn to_config(&self) -> Result<IndexerConfig, IndexerError> {
        let mut builder = IndexerConfig::builder()
            .rpc_url(&self.rpc_endpoint)
            .contract_address(&self.contract_address)
            .start_from_height(self.start_height.max(0) as u64)
            .poll_interval(Duration::from_millis(self.poll_interval_ms))
            .request_timeout(Duration::from_millis(self.request_timeout_ms))
            .max_block_retries(self.max_block_retries)
            .resume_from_checkpoint(self.resume_from_checkpoint)
            .action_key(&self.action_key);
        if let Some(url) = &self.database_url {
            builder = builder.database_url(url);
        }
        builder.build()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.json_logs);

    let config = cli.to_config().context("Invalid configuration")?;
    let database = config
        .database_url
        .as_deref()
        .map(mask_password)
        .unwrap_or_else(|| "json".to_string());
    info!(
        rpc = %config.rpc_url,
        contract = %config.contract_address,
        start_height = config.start_height,
        database = %database,
        "starting indexer"
    );

    let indexer = IndexerBuilder::from_config(&config)?
        .build()
        .await
        .context("Failed to set up indexer")?;
    let indexer = Arc::new(indexer);
    let shutdown = indexer.shutdown_handle();

    let runner = indexer.clone();
    let mut handle = tokio::spawn(async move { runner.run().await });

    let finished = tokio::select! {
        joined = &mut handle => Some(joined),
        _ = shutdown_signal() => None,
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            info!("shutdown requested, finishing current block");
            shutdown.trigger();
            match tokio::time::timeout(Duration::from_secs(30), handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!("indexer did not stop within 30s");
                    bail!("shutdown timed out at block {}", indexer.cursor());
                }
            }
        }
    };

    match joined.context("Indexer task panicked")? {
        Ok(()) => {
            info!(cursor = indexer.cursor(), "indexer stopped");
            Ok(())
        }
        Err(e) => {
            error!(cursor = indexer.cursor(), error = %e, "indexer failed");
            if indexer.phase() == Phase::Halted {
                bail!("indexer halted at block {}: {e}", indexer.cursor());
            }
            Err(e.into())
        }
    }
}

fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).with_target(false).init();
    }
}

fn mask_password(url_str: &str) -> String {
    match url::Url::parse(url_str) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("****"));
            }
            url.to_string()
        }
        Err(_) => url_str.to_string(),
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
