//! Decision cache: `(agent, fingerprint) → FixResult`.
//!
//! Two layers. An in-memory LRU with TTL answers most lookups; an optional
//! SQLite table keeps decisions across runs, also bounded by TTL. Only
//! successful results at or above the confidence threshold are ever stored.

use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use lru::LruCache;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;

use crate::config::CacheConfig;
use crate::domain::FixResult;
use crate::error::{Result, TidyError};

type Key = (String, String);

#[derive(Debug, Clone)]
struct CachedDecision {
    result: FixResult,
    created_at: DateTime<Utc>,
}

/// Counters and sizes for `tidyloop cache stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub memory_entries: usize,
    pub disk_entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub stores: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    stores: u64,
}

pub struct DecisionCache {
    memory: Mutex<LruCache<Key, CachedDecision>>,
    disk: Option<Mutex<Connection>>,
    ttl: Duration,
    min_confidence: f64,
    counters: Mutex<Counters>,
}

impl DecisionCache {
    /// Memory-only cache.
    pub fn in_memory(capacity: usize, ttl: Duration, min_confidence: f64) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            disk: None,
            ttl,
            min_confidence,
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Cache backed by the SQLite database at `db_path`.
    pub fn open(db_path: &Path, capacity: usize, ttl: Duration, min_confidence: f64) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| TidyError::Cache(format!("Failed to create {}: {}", parent.display(), e)))?;
        }
        let db = Connection::open(db_path)
            .map_err(|e| TidyError::Cache(format!("Failed to open {}: {}", db_path.display(), e)))?;
        Self::init_schema(&db)?;

        let mut cache = Self::in_memory(capacity, ttl, min_confidence);
        cache.disk = Some(Mutex::new(db));
        log::debug!("Decision cache opened at {}", db_path.display());
        Ok(cache)
    }

    pub fn from_config(config: &CacheConfig, min_confidence: f64) -> Result<Self> {
        if config.persist {
            Self::open(&config.db_path(), config.memory_capacity, config.ttl(), min_confidence)
        } else {
            Ok(Self::in_memory(config.memory_capacity, config.ttl(), min_confidence))
        }
    }

    fn init_schema(db: &Connection) -> Result<()> {
        db.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                agent TEXT NOT NULL,
                fingerprint TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                json_data TEXT NOT NULL,
                PRIMARY KEY (agent, fingerprint)
            );

            CREATE INDEX IF NOT EXISTS idx_decisions_created ON decisions(created_at);
            "#,
        )
        .map_err(|e| TidyError::Cache(format!("Failed to initialize schema: {}", e)))
    }

    pub fn min_confidence(&self) -> f64 {
        self.min_confidence
    }

    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(36_500))
    }

    fn is_expired(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(created_at) > self.ttl()
    }

    fn memory(&self) -> std::sync::MutexGuard<'_, LruCache<Key, CachedDecision>> {
        self.memory.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn count(&self, f: impl FnOnce(&mut Counters)) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut *counters);
    }

    fn with_disk<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> Result<Option<T>> {
        let Some(disk) = &self.disk else {
            return Ok(None);
        };
        let db = disk.lock().unwrap_or_else(|e| e.into_inner());
        f(&*db).map(Some).map_err(|e| TidyError::Cache(e.to_string()))
    }

    /// Look up a decision, memory first, then disk.
    pub fn get(&self, agent: &str, fingerprint: &str) -> Result<Option<FixResult>> {
        let key = (agent.to_string(), fingerprint.to_string());
        let now = Utc::now();

        let cached = self.memory().get(&key).cloned();
        if let Some(entry) = cached {
            if !self.is_expired(entry.created_at, now) {
                self.count(|c| c.hits += 1);
                return Ok(Some(entry.result));
            }
            self.memory().pop(&key);
        }

        let row = self
            .with_disk(|db| {
                db.query_row(
                    "SELECT created_at, json_data FROM decisions WHERE agent = ?1 AND fingerprint = ?2",
                    params![agent, fingerprint],
                    |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()
            })?
            .flatten();

        let Some((created_secs, json)) = row else {
            self.count(|c| c.misses += 1);
            return Ok(None);
        };

        let created_at = Utc.timestamp_opt(created_secs, 0).single().unwrap_or_default();
        let parsed = serde_json::from_str::<FixResult>(&json);
        match parsed {
            Ok(result) if !self.is_expired(created_at, now) && result.is_cacheable(self.min_confidence) => {
                self.memory().put(key, CachedDecision {
                    result: result.clone(),
                    created_at,
                });
                self.count(|c| c.hits += 1);
                Ok(Some(result))
            }
            Ok(_) => {
                self.delete_disk(agent, fingerprint)?;
                self.count(|c| c.misses += 1);
                Ok(None)
            }
            Err(e) => {
                log::warn!("Dropping unreadable cache entry for {}/{}: {}", agent, fingerprint, e);
                self.delete_disk(agent, fingerprint)?;
                self.count(|c| c.misses += 1);
                Ok(None)
            }
        }
    }

    /// Store a decision if it is cacheable. Returns whether it was stored.
    pub fn put(&self, agent: &str, fingerprint: &str, result: &FixResult) -> Result<bool> {
        self.put_at(agent, fingerprint, result, Utc::now())
    }

    fn put_at(&self, agent: &str, fingerprint: &str, result: &FixResult, created_at: DateTime<Utc>) -> Result<bool> {
        if !result.is_cacheable(self.min_confidence) {
            return Ok(false);
        }

        let json = serde_json::to_string(result)?;
        self.with_disk(|db| {
            db.execute(
                "INSERT OR REPLACE INTO decisions (agent, fingerprint, created_at, json_data) VALUES (?1, ?2, ?3, ?4)",
                params![agent, fingerprint, created_at.timestamp(), json],
            )
        })?;

        self.memory().put(
            (agent.to_string(), fingerprint.to_string()),
            CachedDecision {
                result: result.clone(),
                created_at,
            },
        );
        self.count(|c| c.stores += 1);
        Ok(true)
    }

    /// Remove a decision from both layers.
    pub fn invalidate(&self, agent: &str, fingerprint: &str) -> Result<()> {
        self.memory().pop(&(agent.to_string(), fingerprint.to_string()));
        self.delete_disk(agent, fingerprint)
    }

    fn delete_disk(&self, agent: &str, fingerprint: &str) -> Result<()> {
        self.with_disk(|db| {
            db.execute(
                "DELETE FROM decisions WHERE agent = ?1 AND fingerprint = ?2",
                params![agent, fingerprint],
            )
        })?;
        Ok(())
    }

    /// Drop every expired entry. Returns how many disk rows were removed.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        {
            let mut memory = self.memory();
            let expired: Vec<Key> = memory
                .iter()
                .filter(|(_, entry)| self.is_expired(entry.created_at, now))
                .map(|(key, _)| key.clone())
                .collect();
            for key in expired {
                memory.pop(&key);
            }
        }

        let cutoff = now.checked_sub_signed(self.ttl()).unwrap_or_default().timestamp();
        let removed = self
            .with_disk(|db| db.execute("DELETE FROM decisions WHERE created_at < ?1", params![cutoff]))?
            .unwrap_or(0);
        if removed > 0 {
            log::info!("Purged {} expired cache entries", removed);
        }
        Ok(removed)
    }

    /// Remove everything.
    pub fn clear(&self) -> Result<()> {
        self.memory().clear();
        self.with_disk(|db| db.execute("DELETE FROM decisions", []))?;
        Ok(())
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let disk_entries = self
            .with_disk(|db| db.query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get::<_, i64>(0)))?
            .unwrap_or(0);
        let counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        Ok(CacheStats {
            memory_entries: self.memory().len(),
            disk_entries: disk_entries.max(0) as usize,
            hits: counters.hits,
            misses: counters.misses,
            stores: counters.stores,
        })
    }
}
