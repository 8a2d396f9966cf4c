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
#[cfg(feature = "json-storage")]
use crate::storage::json::JsonStore;
#[cfg(feature = "postgres")]
use crate::storage::postgres::PostgreSQLStore;
#[cfg(feature = "sqlite")]
use crate::storage::sqlite::SQLiteStore;
use crate::storage::Storage;
use crate::validated_types::DatabaseUrl;
#[cfg(feature = "sqlite")]
use crate::validated_types::SQLITE_MEMORY;
use std::sync::Arc;
use tracing::info;

/// Open the backend named by `database_url`. Without a URL records go to
/// `database/indexer.json`.
pub async fn init_store(database_url: Option<String>) -> Result<Arc<dyn Storage>, IndexerError> {
    let Some(raw) = database_url else {
        return default_store();
    };
    let target = DatabaseUrl::parse(&raw)?;
    let backend = target.backend();
    let store: Arc<dyn Storage> = match target {
        #[cfg(feature = "postgres")]
        DatabaseUrl::Postgres(url) => Arc::new(PostgreSQLStore::new(&url).await?),
        #[cfg(feature = "sqlite")]
        DatabaseUrl::Sqlite(path) => Arc::new(SQLiteStore::new(&path.to_string_lossy()).await?),
        #[cfg(feature = "sqlite")]
        DatabaseUrl::SqliteMemory => Arc::new(SQLiteStore::new(SQLITE_MEMORY).await?),
        #[allow(unreachable_patterns)]
        _ => {
            return Err(IndexerError::invalid_config(
                "database_url",
                format!("{backend} feature disabled"),
            ))
        }
    };
    info!(target: "indexer", backend, "storage ready");
    Ok(store)
}

#[cfg(feature = "json-storage")]
fn default_store() -> Result<Arc<dyn Storage>, IndexerError> {
    let path = std::path::Path::new("database").join("indexer.json");
    info!(target: "indexer", backend = "json", path = %path.display(), "storage ready");
    Ok(Arc::new(JsonStore::new(path)))
}

#[cfg(not(feature = "json-storage"))]
fn default_store() -> Result<Arc<dyn Storage>, IndexerError> {
    Err(IndexerError::invalid_config(
        "database_url",
        "required when json-storage is disabled",
    ))
}
