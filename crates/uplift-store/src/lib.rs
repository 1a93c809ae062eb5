use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

mod file_store;
mod memory;

pub use file_store::{JsonFileStore, StateLayout};
pub use memory::MemoryStore;

/// Stable key namespace for the persisted store surface.
pub mod keys {
    /// Highest version the client has fully processed.
    pub const VERSION: &str = "app_version";
    /// Timestamp of the last migration pass.
    pub const LAST_UPDATE: &str = "last_update";
    /// Primary domain collection.
    pub const CHANNELS: &str = "channels";
    pub const CONTENT: &str = "content";
    pub const EARNINGS: &str = "earnings";
    pub const AUTOPILOT: &str = "autopilot";
    pub const NOTIFICATIONS: &str = "notifications";
    /// Timestamp of the last explicit rollback.
    pub const ROLLBACK_AT: &str = "rollback_at";
    pub const BACKUP_PREFIX: &str = "backup_";

    pub fn backup(timestamp_unix: u64) -> String {
        format!("{BACKUP_PREFIX}{timestamp_unix}")
    }
}

/// Flat key-value namespace holding serializable documents.
///
/// Injected into the orchestrator and snapshot service so the engine is
/// testable against an in-memory fake. Single logical client; no locking
/// and no transactional guarantees.
pub trait StateStore {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&mut self, key: &str, value: Value) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;

    fn get_doc<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
    where
        Self: Sized,
    {
        match self.get(key)? {
            Some(value) => {
                let doc = serde_json::from_value(value)
                    .with_context(|| format!("failed to decode stored document '{key}'"))?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    fn set_doc<T: Serialize>(&mut self, key: &str, doc: &T) -> Result<()>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(doc)
            .with_context(|| format!("failed to encode document for '{key}'"))?;
        self.set(key, value)
    }
}

pub fn current_unix_timestamp() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time is before unix epoch")?
        .as_secs())
}

pub(crate) fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 64 {
        return Err(anyhow!("invalid store key: {key:?}"));
    }
    let mut chars = key.chars();
    let first = chars.next().unwrap_or('_');
    if !first.is_ascii_lowercase() {
        return Err(anyhow!("invalid store key: {key:?}"));
    }
    if key
        .chars()
        .any(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' || ch == '-'))
    {
        return Err(anyhow!("invalid store key: {key:?}"));
    }
    Ok(())
}
