// ============================================================================
// SubscriberDb — Embedded Database (redb)
// ============================================================================
// Persistent local storage for subscribers, reading progress and the access
// policy. Default path: ~/.paradox/subscribers.redb (override via
// PARADOX_DB_PATH, see config.rs)
// ============================================================================

pub mod types;

pub use types::{DbStats, SubscriberRecord, SubscriptionStatus};

use anyhow::{anyhow, Result};
use redb::{Database, ReadableTable, TableDefinition, TableHandle};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::access::{AccessPolicy, ContentType, SubscriptionTier};
use crate::config::ParadoxConfig;
use crate::progress::{progress_key, ReadingProgress};
use crate::types::{normalize_email, ParadoxError};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

// Table definitions
const SUBSCRIBERS: Table = TableDefinition::new("subscribers");
const PROGRESS: Table = TableDefinition::new("progress");
const CONFIG: Table = TableDefinition::new("config");

const POLICY_KEY: &str = "config:access_policy";
const SECS_PER_DAY: i64 = 86_400;

/// Embedded database for subscriber state
pub struct SubscriberDb {
    db: Database,
    path: PathBuf,
}

impl SubscriberDb {
    /// Open (or create) the database at the given path.
    /// If `path` is None, uses ~/.paradox/subscribers.redb
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let db_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let home = dirs::home_dir().ok_or_else(|| anyhow!("Cannot determine home directory"))?;
                let paradox_dir = home.join(".paradox");
                std::fs::create_dir_all(&paradox_dir)
                    .map_err(|e| anyhow!("Failed to create .paradox directory: {}", e))?;
                paradox_dir.join("subscribers.redb")
            }
        };

        info!("Opening subscriber database at: {}", db_path.display());

        let db = Database::create(&db_path)
            .map_err(|e| anyhow!("Failed to open database: {}", e))?;

        // Ensure tables exist by doing a write transaction
        let write_txn = db
            .begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        for table in [SUBSCRIBERS, PROGRESS, CONFIG] {
            write_txn
                .open_table(table)
                .map_err(|e| anyhow!("Failed to create {} table: {}", table.name(), e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit init: {}", e))?;

        info!("Subscriber database ready");

        Ok(Self { db, path: db_path })
    }

    /// Open using the configured path
    pub fn open_with_config(config: &ParadoxConfig) -> Result<Self> {
        Self::open(config.db_path.as_deref())
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ========================================================================
    // Subscriber Operations
    // ========================================================================

    /// Store a record under its normalized email
    pub fn upsert_subscriber(&self, record: &SubscriberRecord) -> Result<()> {
        let mut record = record.clone();
        record.email = normalize_email(&record.email)?;
        self.put(SUBSCRIBERS, &subscriber_key(&record.email), &record)?;
        debug!("Stored subscriber: {} ({})", record.email, record.tier);
        Ok(())
    }

    pub fn get_subscriber(&self, email: &str) -> Result<Option<SubscriberRecord>> {
        let email = normalize_email(email)?;
        self.get(SUBSCRIBERS, &subscriber_key(&email))
    }

    /// List subscribers, optionally only those on a given (stored) tier
    pub fn list_subscribers(&self, tier_filter: Option<SubscriptionTier>) -> Result<Vec<SubscriberRecord>> {
        let all: Vec<SubscriberRecord> = self.scan(SUBSCRIBERS)?;
        Ok(match tier_filter {
            Some(tier) => all.into_iter().filter(|r| r.tier == tier).collect(),
            None => all,
        })
    }

    /// Create the subscriber or move an existing one onto `tier`.
    /// The subscription is (re)activated with the given end date.
    pub fn set_tier(&self, email: &str, tier: SubscriptionTier, expires_at: Option<i64>) -> Result<SubscriberRecord> {
        let email = normalize_email(email)?;
        let now = chrono::Utc::now().timestamp();

        let mut record = self
            .get(SUBSCRIBERS, &subscriber_key(&email))?
            .unwrap_or_else(|| SubscriberRecord::new(&email, tier, now));
        record.tier = tier;
        record.status = SubscriptionStatus::Active;
        record.expires_at = expires_at;
        record.updated_at = now;

        self.upsert_subscriber(&record)?;
        info!("Subscriber {} set to {} tier", email, tier);
        Ok(record)
    }

    pub fn set_status(&self, email: &str, status: SubscriptionStatus) -> Result<SubscriberRecord> {
        let email = normalize_email(email)?;
        let mut record = self
            .get::<SubscriberRecord>(SUBSCRIBERS, &subscriber_key(&email))?
            .ok_or_else(|| ParadoxError::SubscriberNotFound(email.clone()))?;

        record.status = status;
        record.updated_at = chrono::Utc::now().timestamp();
        self.upsert_subscriber(&record)?;
        info!("Subscriber {} status set to {}", email, status);
        Ok(record)
    }

    /// Remove a subscriber and all of their progress entries in one transaction
    pub fn delete_subscriber(&self, email: &str) -> Result<bool> {
        let email = normalize_email(email)?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        let mut progress_removed = 0;
        {
            let mut subscribers = write_txn.open_table(SUBSCRIBERS)
                .map_err(|e| anyhow!("Failed to open {} table: {}", SUBSCRIBERS.name(), e))?;
            removed = subscribers.remove(subscriber_key(&email).as_str())
                .map_err(|e| anyhow!("Failed to remove subscriber {}: {}", email, e))?
                .is_some();

            let mut progress = write_txn.open_table(PROGRESS)
                .map_err(|e| anyhow!("Failed to open {} table: {}", PROGRESS.name(), e))?;
            let mut keys = Vec::new();
            for entry in progress.range::<&str>(..)
                .map_err(|e| anyhow!("Failed to iterate {}: {}", PROGRESS.name(), e))?
            {
                let (key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
                let entry: ReadingProgress = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize {} entry: {}", PROGRESS.name(), e))?;
                if entry.email == email {
                    keys.push(key.value().to_string());
                }
            }
            for key in &keys {
                progress.remove(key.as_str())
                    .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?;
                progress_removed += 1;
            }
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;

        if removed {
            debug!("Deleted subscriber {} and {} progress entries", email, progress_removed);
        }
        Ok(removed)
    }

    // ========================================================================
    // Progress Operations
    // ========================================================================

    /// Advance a reader's position on an item, capped at `cap` percent.
    /// Creates the entry on first use.
    pub fn record_progress(
        &self,
        email: &str,
        content_type: ContentType,
        content_id: &str,
        percent: u8,
        cap: u8,
    ) -> Result<ReadingProgress> {
        let email = normalize_email(email)?;
        let now = chrono::Utc::now().timestamp();
        let key = progress_key(&email, content_type, content_id);

        let existing: Option<ReadingProgress> = self.get(PROGRESS, &key)?;
        let is_new = existing.is_none();
        let mut progress =
            existing.unwrap_or_else(|| ReadingProgress::new(&email, content_type, content_id, now));

        if progress.advance(percent, cap, now) || is_new {
            self.put(PROGRESS, &key, &progress)?;
            debug!("Progress {} -> {}%", key, progress.percent);
        }
        Ok(progress)
    }

    pub fn get_progress(
        &self,
        email: &str,
        content_type: ContentType,
        content_id: &str,
    ) -> Result<Option<ReadingProgress>> {
        let email = normalize_email(email)?;
        self.get(PROGRESS, &progress_key(&email, content_type, content_id))
    }

    /// Progress entries, for one subscriber or for everyone
    pub fn list_progress(&self, email: Option<&str>) -> Result<Vec<ReadingProgress>> {
        let all: Vec<ReadingProgress> = self.scan(PROGRESS)?;
        match email {
            Some(email) => {
                let email = normalize_email(email)?;
                Ok(all.into_iter().filter(|p| p.email == email).collect())
            }
            None => Ok(all),
        }
    }

    // ========================================================================
    // Config Operations
    // ========================================================================

    pub fn store_policy(&self, policy: &AccessPolicy) -> Result<()> {
        self.put(CONFIG, POLICY_KEY, policy)?;
        debug!("Stored access policy");
        Ok(())
    }

    pub fn get_policy(&self) -> Result<Option<AccessPolicy>> {
        self.get(CONFIG, POLICY_KEY)
    }

    // ========================================================================
    // Pruning Operations
    // ========================================================================

    /// Delete canceled or expired subscribers not touched for the given number
    /// of days. Returns the number deleted.
    pub fn prune_lapsed_subscribers(&self, older_than_days: i64) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let cutoff = cutoff_for_days(now, older_than_days)?;

        let mut deleted = 0;
        for record in self.list_subscribers(None)? {
            if record.is_lapsed(now) && record.updated_at < cutoff && self.delete_subscriber(&record.email)? {
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!("Pruned {} lapsed subscribers older than {} days", deleted, older_than_days);
        }
        Ok(deleted)
    }

    /// Delete unfinished progress entries not updated for the given number of
    /// days. Completed entries are kept for the dashboard.
    pub fn prune_stale_progress(&self, older_than_days: i64) -> Result<usize> {
        let cutoff = cutoff_for_days(chrono::Utc::now().timestamp(), older_than_days)?;

        let mut deleted = 0;
        for entry in self.list_progress(None)? {
            if !entry.completed && entry.updated_at < cutoff && self.remove(PROGRESS, &entry.key())? {
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!("Pruned {} stale progress entries older than {} days", deleted, older_than_days);
        }
        Ok(deleted)
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    pub fn stats(&self) -> Result<DbStats> {
        let now = chrono::Utc::now().timestamp();
        let subscribers = self.list_subscribers(None)?;
        let progress = self.list_progress(None)?;

        let mut tier_counts = HashMap::new();
        let mut status_counts = HashMap::new();
        for record in &subscribers {
            *tier_counts.entry(record.effective_tier(now).to_string()).or_insert(0usize) += 1;
            *status_counts.entry(record.status.to_string()).or_insert(0usize) += 1;
        }

        Ok(DbStats {
            total_subscribers: subscribers.len(),
            tier_counts,
            status_counts,
            total_progress_entries: progress.len(),
            completed_progress_entries: progress.iter().filter(|p| p.completed).count(),
        })
    }

    // ========================================================================
    // Table helpers
    // ========================================================================

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)
            .map_err(|e| anyhow!("Failed to serialize {} entry: {}", table.name(), e))?;

        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        {
            let mut t = write_txn.open_table(table)
                .map_err(|e| anyhow!("Failed to open {} table: {}", table.name(), e))?;
            t.insert(key, bytes.as_slice())
                .map_err(|e| anyhow!("Failed to insert into {}: {}", table.name(), e))?;
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit: {}", e))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> Result<Option<T>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let t = read_txn.open_table(table)
            .map_err(|e| anyhow!("Failed to open {} table: {}", table.name(), e))?;

        match t.get(key).map_err(|e| anyhow!("Failed to get {} from {}: {}", key, table.name(), e))? {
            Some(value) => {
                let decoded = bincode::deserialize(value.value())
                    .map_err(|e| anyhow!("Failed to deserialize {}: {}", key, e))?;
                Ok(Some(decoded))
            }
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, table: Table) -> Result<Vec<T>> {
        let read_txn = self.db.begin_read()
            .map_err(|e| anyhow!("Failed to begin read: {}", e))?;
        let t = read_txn.open_table(table)
            .map_err(|e| anyhow!("Failed to open {} table: {}", table.name(), e))?;

        let mut results = Vec::new();
        let iter = t.range::<&str>(..)
            .map_err(|e| anyhow!("Failed to iterate {}: {}", table.name(), e))?;
        for entry in iter {
            let (_key, value) = entry.map_err(|e| anyhow!("Failed to read entry: {}", e))?;
            let decoded = bincode::deserialize(value.value())
                .map_err(|e| anyhow!("Failed to deserialize {} entry: {}", table.name(), e))?;
            results.push(decoded);
        }
        Ok(results)
    }

    fn remove(&self, table: Table, key: &str) -> Result<bool> {
        let write_txn = self.db.begin_write()
            .map_err(|e| anyhow!("Failed to begin write: {}", e))?;
        let removed;
        {
            let mut t = write_txn.open_table(table)
                .map_err(|e| anyhow!("Failed to open {} table: {}", table.name(), e))?;
            removed = t.remove(key)
                .map_err(|e| anyhow!("Failed to remove {}: {}", key, e))?
                .is_some();
        }
        write_txn.commit().map_err(|e| anyhow!("Failed to commit delete: {}", e))?;
        Ok(removed)
    }
}

/// Timestamp `days` days before `now`; negative or overflowing counts are rejected
pub fn cutoff_for_days(now: i64, days: i64) -> Result<i64> {
    if days < 0 {
        return Err(anyhow!("Day count must not be negative (got {})", days));
    }
    days.checked_mul(SECS_PER_DAY)
        .and_then(|secs| now.checked_sub(secs))
        .ok_or_else(|| anyhow!("Day count {} is out of range", days))
}

/// Timestamp `days` days after `now`, for subscription end dates
pub fn expiry_after_days(now: i64, days: i64) -> Result<i64> {
    if days < 0 {
        return Err(anyhow!("Day count must not be negative (got {})", days));
    }
    days.checked_mul(SECS_PER_DAY)
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| anyhow!("Day count {} is out of range", days))
}

fn subscriber_key(email: &str) -> String {
    format!("subscribers:{}", email)
}
