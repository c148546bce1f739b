//! Durable visitor identity
//!
//! The visitor identifier is read once at startup from a key/value store whose
//! entries expire. A visitor without a live identifier gets a fresh UUID that
//! is written back with the configured lifetime.

use crate::config::IdentityConfig;
use crate::error::TelemetryError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Key/value storage with per-entry expiry
pub trait IdentityStore {
    /// Live value for `key`; expired entries read as absent
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str, ttl_days: u32) -> Result<(), TelemetryError>;
}

/// A stored value and the instant it stops being valid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl IdentityEntry {
    /// Fails when the expiry falls outside the representable date range
    pub fn new(
        value: impl Into<String>,
        ttl_days: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, TelemetryError> {
        let expires_at = now
            .checked_add_signed(Duration::days(i64::from(ttl_days)))
            .ok_or_else(|| {
                TelemetryError::IdentityError(format!(
                    "identifier lifetime of {ttl_days} days is out of range"
                ))
            })?;
        Ok(Self {
            value: value.into(),
            expires_at,
        })
    }

    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Process-local identity store
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    entries: HashMap<String, IdentityEntry>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry with an explicit expiry
    pub fn insert_entry(&mut self, key: impl Into<String>, entry: IdentityEntry) {
        self.entries.insert(key.into(), entry);
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = Utc::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl_days: u32) -> Result<(), TelemetryError> {
        let entry = IdentityEntry::new(value, ttl_days, Utc::now())?;
        self.entries.insert(key.to_string(), entry);
        Ok(())
    }
}

/// Identity store persisted as a JSON object of entries
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
    entries: HashMap<String, IdentityEntry>,
}

impl FileIdentityStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = fs::read_to_string(&path)?;
            serde_json::from_str(&content).map_err(|e| {
                TelemetryError::IdentityError(format!(
                    "cannot read identity file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            HashMap::new()
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored entries, live or expired
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) -> Result<(), TelemetryError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl IdentityStore for FileIdentityStore {
    fn get(&self, key: &str) -> Option<String> {
        let now = Utc::now();
        self.entries
            .get(key)
            .filter(|entry| entry.is_live_at(now))
            .map(|entry| entry.value.clone())
    }

    fn set(&mut self, key: &str, value: &str, ttl_days: u32) -> Result<(), TelemetryError> {
        let entry = IdentityEntry::new(value, ttl_days, Utc::now())?;
        self.entries.insert(key.to_string(), entry);
        self.persist()
    }
}

/// Read the visitor identifier, minting and storing a new one if needed.
///
/// A store that cannot be written still yields a usable identifier for this
/// page view; the failure is logged.
pub fn resolve_visitor_id<S: IdentityStore + ?Sized>(store: &mut S, config: &IdentityConfig) -> String {
    if let Some(existing) = store.get(&config.key) {
        return existing;
    }

    let minted = Uuid::new_v4().to_string();
    if let Err(e) = store.set(&config.key, &minted, config.ttl_days) {
        log::warn!("could not persist visitor id under {}: {e}", config.key);
    }
    minted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expiry() {
        let now = Utc::now();
        let entry = IdentityEntry::new("v", 90, now).unwrap();
        assert!(entry.is_live_at(now + Duration::days(89)));
        assert!(!entry.is_live_at(now + Duration::days(90)));
    }

    #[test]
    fn test_entry_rejects_unrepresentable_expiry() {
        let result = IdentityEntry::new("v", u32::MAX, Utc::now());
        assert!(matches!(result, Err(TelemetryError::IdentityError(_))));

        let mut store = MemoryIdentityStore::new();
        assert!(store.set("interactid", "v", u32::MAX).is_err());
        assert_eq!(store.get("interactid"), None);
    }

    #[test]
    fn test_resolve_survives_unwritable_lifetime() {
        let mut store = MemoryIdentityStore::new();
        let config = IdentityConfig {
            key: "interactid".to_string(),
            ttl_days: u32::MAX,
        };

        let id = resolve_visitor_id(&mut store, &config);
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(store.get("interactid"), None);
    }

    #[test]
    fn test_resolve_mints_once() {
        let mut store = MemoryIdentityStore::new();
        let config = IdentityConfig::default();

        let first = resolve_visitor_id(&mut store, &config);
        assert!(Uuid::parse_str(&first).is_ok());
        assert_eq!(store.get("interactid"), Some(first.clone()));

        let second = resolve_visitor_id(&mut store, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn test_expired_identifier_is_replaced() {
        let mut store = MemoryIdentityStore::new();
        let long_ago = Utc::now() - Duration::days(365);
        store.insert_entry("interactid", IdentityEntry::new("stale", 90, long_ago).unwrap());
        assert_eq!(store.get("interactid"), None);

        let id = resolve_visitor_id(&mut store, &IdentityConfig::default());
        assert_ne!(id, "stale");
    }

    #[test]
    fn test_file_store_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("identity.json");

        let mut store = FileIdentityStore::open(&path).unwrap();
        assert!(store.is_empty());
        let id = resolve_visitor_id(&mut store, &IdentityConfig::default());

        let reopened = FileIdentityStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.get("interactid"), Some(id));
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        fs::write(&path, "not json").unwrap();

        let result = FileIdentityStore::open(&path);
        assert!(matches!(result, Err(TelemetryError::IdentityError(_))));
    }
}
