use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::RwLock;
use tracing::warn;

use shared::{
    domain::{FieldMap, ProductTag, SessionCredential, WorkflowRecord},
    steps::credential_key,
};

mod resolve;

pub use resolve::{is_empty_value, CredentialField, FallbackChain, FieldSource};

/// Injectable keyed byte store underneath the resolution layer.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;
    async fn put_raw(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

/// Durable per-session store backed by a single SQLite table.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS records (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )",
        )
        .execute(&pool)
        .await
        .context("failed to ensure records table exists")?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM records WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO records (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM records WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM records").execute(&self.pool).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Keyed store for workflow records and session credentials, plus the
/// fallback-chain resolver. Reads never fail: absent, corrupt, or unreadable
/// content degrades to absent.
#[derive(Clone)]
pub struct ResolutionStore {
    inner: Arc<dyn KeyValueStore>,
}

impl ResolutionStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub async fn get(&self, key: &str) -> FieldMap {
        self.get_record(key)
            .await
            .map(|record| record.fields)
            .unwrap_or_default()
    }

    pub async fn get_record(&self, key: &str) -> Option<WorkflowRecord> {
        let raw = match self.inner.get_raw(key).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%key, %error, "record read failed, treating as absent");
                return None;
            }
        };
        match serde_json::from_str::<WorkflowRecord>(&raw) {
            Ok(record) => Some(record),
            Err(error) => {
                warn!(%key, %error, "corrupt record, treating as absent");
                None
            }
        }
    }

    /// Replaces the record at `key` wholesale.
    pub async fn put(&self, key: &str, record: &WorkflowRecord) -> Result<()> {
        let raw = serde_json::to_string(record)?;
        self.inner.put_raw(key, &raw).await
    }

    /// Read-merge-write: readers never observe a half-applied update.
    pub async fn merge(&self, key: &str, fields: FieldMap) -> Result<()> {
        let (mut merged, credential_key) = match self.get_record(key).await {
            Some(record) => (record.fields, record.credential_key),
            None => (FieldMap::new(), String::new()),
        };
        for (name, value) in fields {
            merged.insert(name, value);
        }
        self.put(key, &WorkflowRecord::new(merged, credential_key))
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.inner.clear().await
    }

    /// Stores the credential and invalidates the other product's one.
    pub async fn store_credential(&self, credential: &SessionCredential) -> Result<()> {
        let raw = serde_json::to_string(credential)?;
        self.inner
            .put_raw(&credential_key(credential.product), &raw)
            .await?;
        self.inner
            .delete(&credential_key(credential.product.other()))
            .await
    }

    pub async fn active_credential(&self, product: ProductTag) -> Option<SessionCredential> {
        let key = credential_key(product);
        let raw = match self.inner.get_raw(&key).await {
            Ok(raw) => raw?,
            Err(error) => {
                warn!(%key, %error, "credential read failed, treating as absent");
                return None;
            }
        };
        match serde_json::from_str::<SessionCredential>(&raw) {
            Ok(credential) => Some(credential),
            Err(error) => {
                warn!(%key, %error, "corrupt credential, treating as absent");
                None
            }
        }
    }

    pub async fn invalidate_credential(&self, product: ProductTag) -> Result<()> {
        self.inner.delete(&credential_key(product)).await
    }

    /// A non-empty `form_value` always wins; otherwise the first non-empty
    /// source in chain order does, else the static default. Never errors.
    pub async fn resolve(&self, chain: &FallbackChain, form_value: Option<&Value>) -> Value {
        if let Some(value) = form_value {
            if !is_empty_value(value) {
                return value.clone();
            }
        }
        for source in &chain.sources {
            let candidate = match source {
                FieldSource::Record { key, field } => self.get(key).await.get(field.as_str()).cloned(),
                FieldSource::Credential { product, field } => self
                    .active_credential(*product)
                    .await
                    .map(|credential| match field {
                        CredentialField::Token => Value::String(credential.token),
                        CredentialField::CompanyId => Value::String(credential.company_id),
                    }),
            };
            if let Some(value) = candidate {
                if !is_empty_value(&value) {
                    return value;
                }
            }
        }
        chain.default.clone()
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
