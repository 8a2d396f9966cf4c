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
use std::fmt;
use std::path::PathBuf;
use url::Url;

/// Validated CometBFT RPC endpoint (http:// or https://).
#[derive(Clone, Debug)]
pub struct HttpUrl(Url);

impl HttpUrl {
    pub fn parse(input: &str) -> Result<Self, IndexerError> {
        let url =
            Url::parse(input).map_err(|_| IndexerError::invalid_config("rpc_url", "invalid URL"))?;
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            _ => Err(IndexerError::invalid_config(
                "rpc_url",
                "must start with http:// or https://",
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for HttpUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for HttpUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Bech32 address of the contract whose events are indexed.
///
/// Only the shape is checked (non-empty, single token); the chain is the
/// authority on whether the address exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractAddress(String);

impl ContractAddress {
    pub fn parse(input: &str) -> Result<Self, IndexerError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(IndexerError::invalid_config(
                "contract_address",
                "is required",
            ));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(IndexerError::invalid_config(
                "contract_address",
                "must not contain whitespace",
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ContractAddress {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ContractAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub const SQLITE_MEMORY: &str = "sqlite::memory:";

/// Where records are kept, chosen by URL scheme.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatabaseUrl {
    Postgres(String),
    Sqlite(PathBuf),
    SqliteMemory,
}

impl DatabaseUrl {
    pub fn parse(input: &str) -> Result<Self, IndexerError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(IndexerError::invalid_config("database_url", "cannot be empty"));
        }
        if input == SQLITE_MEMORY {
            return Ok(Self::SqliteMemory);
        }
        if let Some(path) = input.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(IndexerError::invalid_config(
                    "database_url",
                    "sqlite path cannot be empty",
                ));
            }
            return Ok(Self::Sqlite(PathBuf::from(path)));
        }
        let url = Url::parse(input)
            .map_err(|_| IndexerError::invalid_config("database_url", "invalid URL"))?;
        match url.scheme() {
            "postgres" | "postgresql" => Ok(Self::Postgres(input.to_string())),
            other => Err(IndexerError::invalid_config(
                "database_url",
                format!("unsupported scheme `{other}`"),
            )),
        }
    }

    /// Name of the storage backend serving this URL.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) | Self::SqliteMemory => "sqlite",
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Postgres(url) => f.write_str(url),
            Self::Sqlite(path) => write!(f, "sqlite://{}", path.display()),
            Self::SqliteMemory => f.write_str(SQLITE_MEMORY),
        }
    }
}
