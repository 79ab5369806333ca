// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Ephemeral key-value cache backed by a single redb file.

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, trace};

use super::stats::CacheStats;
use super::CacheError;

const RESPONSES: TableDefinition<&str, &[u8]> = TableDefinition::new("responses");
const DATABASE_FILE: &str = "cache.redb";

/// Upper bound for a single blocking store operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    touched_at_ms: i64,
    value: T,
}

#[derive(Deserialize)]
struct EnvelopeHeader {
    touched_at_ms: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

pub(super) struct Inner {
    db: Database,
    ttl: Duration,
    stats: Mutex<CacheStats>,
    // Declared after `db` so the file is closed before the directory goes.
    _dir: TempDir,
}

impl Inner {
    fn is_expired(&self, touched_at_ms: i64, now_ms: i64) -> bool {
        let age_ms = now_ms.saturating_sub(touched_at_ms).max(0) as u128;
        age_ms >= self.ttl.as_millis()
    }

    /// Whether stored bytes can no longer be served at `now_ms`.
    fn is_stale(&self, bytes: &[u8], now_ms: i64) -> bool {
        match serde_json::from_slice::<EnvelopeHeader>(bytes) {
            Ok(header) => self.is_expired(header.touched_at_ms, now_ms),
            // Unreadable entries can never be served.
            Err(_) => true,
        }
    }

    fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut stats);
    }

    fn read(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(RESPONSES)?;
        let value = table.get(key)?.map(|guard| guard.value().to_vec());
        Ok(value)
    }

    fn write(&self, key: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(RESPONSES)?;
            table.insert(key, bytes)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(RESPONSES)?;
            let previous = table.remove(key)?;
            previous.is_some()
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Remove `key` only if the entry stored now is still expired, so a
    /// fresh write that landed after the caller's read survives.
    fn remove_if_expired(&self, key: &str, now_ms: i64) -> Result<bool, CacheError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(RESPONSES)?;
            let stale = match table.get(key)? {
                Some(guard) => self.is_stale(guard.value(), now_ms),
                None => false,
            };
            if stale {
                table.remove(key)?;
            }
            stale
        };
        write_txn.commit()?;
        Ok(removed)
    }

    /// Restart the TTL of a live entry. The stored value is kept as is.
    fn touch(&self, key: &str, now_ms: i64) -> Result<bool, CacheError> {
        let write_txn = self.db.begin_write()?;
        let touched = {
            let mut table = write_txn.open_table(RESPONSES)?;
            let current = table.get(key)?.map(|guard| guard.value().to_vec());
            match current {
                Some(bytes) if !self.is_stale(&bytes, now_ms) => {
                    let mut envelope: Envelope<serde_json::Value> =
                        serde_json::from_slice(&bytes)?;
                    envelope.touched_at_ms = now_ms;
                    table.insert(key, serde_json::to_vec(&envelope)?.as_slice())?;
                    true
                }
                _ => false,
            }
        };
        write_txn.commit()?;
        Ok(touched)
    }

    fn purge_expired(&self, now_ms: i64) -> Result<usize, CacheError> {
        let write_txn = self.db.begin_write()?;
        let purged = {
            let mut table = write_txn.open_table(RESPONSES)?;
            let mut expired = Vec::new();
            for item in table.iter()? {
                let (key, value) = item?;
                if self.is_stale(value.value(), now_ms) {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            expired.len()
        };
        write_txn.commit()?;
        Ok(purged)
    }
}

/// Response cache living in a private temporary directory.
///
/// Entries older than the TTL are never returned. The directory and its
/// database file are deleted when the last clone of the store is dropped.
#[derive(Clone)]
pub struct CacheStore {
    pub(super) inner: Arc<Inner>,
    pub(super) op_timeout: Duration,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("path", &self.inner._dir.path())
            .field("ttl", &self.inner.ttl)
            .finish()
    }
}

impl CacheStore {
    /// Create a store in a fresh temporary directory.
    pub fn new(ttl: Duration) -> Result<Self, CacheError> {
        let dir = tempfile::Builder::new().prefix("lookglass-cache-").tempdir()?;
        let path = dir.path().join(DATABASE_FILE);
        let db = Database::create(&path)?;

        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(RESPONSES)?;
        }
        write_txn.commit()?;

        debug!("Response cache created at {:?} (ttl {:?})", path, ttl);

        Ok(Self {
            inner: Arc::new(Inner {
                db,
                ttl,
                stats: Mutex::new(CacheStats::default()),
                _dir: dir,
            }),
            op_timeout: DEFAULT_OPERATION_TIMEOUT,
        })
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Fetch a live entry and restart its TTL. Expired entries are removed
    /// and reported as absent.
    pub async fn get<T>(&self, key: &str) -> Result<Option<T>, CacheError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let owned_key = key.to_string();
        let result = self
            .blocking(move |inner| {
                let Some(bytes) = inner.read(&owned_key)? else {
                    return Ok(None);
                };
                let now = now_ms();
                let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
                if inner.is_expired(envelope.touched_at_ms, now) {
                    if inner.remove_if_expired(&owned_key, now)? {
                        inner.record(|s| s.ttl_evictions += 1);
                        trace!("Cache entry expired: {}", owned_key);
                    }
                    return Ok(None);
                }
                inner.touch(&owned_key, now)?;
                Ok(Some(envelope.value))
            })
            .await?;

        match &result {
            Some(_) => {
                self.inner.record(|s| s.hits += 1);
                trace!("Cache hit: {}", key);
            }
            None => {
                self.inner.record(|s| s.misses += 1);
                trace!("Cache miss: {}", key);
            }
        }
        Ok(result)
    }

    /// Insert or replace an entry. Writers are serialized; the last one wins.
    pub async fn set<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let bytes = serde_json::to_vec(&Envelope {
            touched_at_ms: now_ms(),
            value,
        })?;
        let owned_key = key.to_string();
        self.blocking(move |inner| inner.write(&owned_key, &bytes))
            .await?;
        self.inner.record(|s| s.writes += 1);
        trace!("Cache write: {}", key);
        Ok(())
    }

    /// Remove an entry. Returns whether one was present.
    pub async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        let owned_key = key.to_string();
        self.blocking(move |inner| inner.remove(&owned_key)).await
    }

    /// Drop every expired entry. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<usize, CacheError> {
        let purged = self
            .blocking(|inner| inner.purge_expired(now_ms()))
            .await?;
        if purged > 0 {
            self.inner.record(|s| s.ttl_evictions += purged as u64);
            debug!("Purged {} expired cache entries", purged);
        }
        Ok(purged)
    }

    pub fn stats(&self) -> CacheStats {
        *self.inner.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn blocking<F, R>(&self, op: F) -> Result<R, CacheError>
    where
        F: FnOnce(&Inner) -> Result<R, CacheError> + Send + 'static,
        R: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let task = tokio::task::spawn_blocking(move || op(&inner));
        match tokio::time::timeout(self.op_timeout, task).await {
            Ok(joined) => joined?,
            Err(_) => Err(CacheError::Timeout(self.op_timeout)),
        }
    }
}
