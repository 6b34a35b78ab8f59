//! Soft session snapshots.
//!
//! A snapshot only hints that a wallet was connected recently. It is never
//! trusted on its own: restoring one always goes through a live reconnect.

use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::BackendKind;
use crate::error::WalletError;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub is_connected: bool,
    pub account: Option<String>,
    pub chain_id: Option<u64>,
    pub service_type: BackendKind,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl SessionRecord {
    pub fn capture(snapshot: &SessionSnapshot, service_type: BackendKind, now_ms: u64) -> Self {
        Self {
            is_connected: snapshot.is_connected(),
            account: snapshot.account.as_ref().map(ToString::to_string),
            chain_id: snapshot.chain.map(|c| c.id()),
            service_type,
            timestamp: now_ms,
        }
    }

    /// True while the record is younger than `ttl`. Records from the
    /// future are treated as stale.
    pub fn is_fresh(&self, now_ms: u64, ttl: Duration) -> bool {
        match now_ms.checked_sub(self.timestamp) {
            Some(age) => u128::from(age) <= ttl.as_millis(),
            None => false,
        }
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Client-side key-value persistence for one [`SessionRecord`].
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionRecord>, WalletError>;
    fn save(&self, record: &SessionRecord) -> Result<(), WalletError>;
    fn clear(&self) -> Result<(), WalletError>;
}

#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    record: Mutex<Option<SessionRecord>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<T>(&self, f: impl FnOnce(&mut Option<SessionRecord>) -> T) -> T {
        match self.record.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self) -> Result<Option<SessionRecord>, WalletError> {
        Ok(self.with(|r| r.clone()))
    }

    fn save(&self, record: &SessionRecord) -> Result<(), WalletError> {
        self.with(|r| *r = Some(record.clone()));
        Ok(())
    }

    fn clear(&self) -> Result<(), WalletError> {
        self.with(|r| *r = None);
        Ok(())
    }
}

/// Stores the record as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSnapshotStore {
    path: PathBuf,
}

impl JsonFileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SnapshotStore for JsonFileSnapshotStore {
    fn load(&self) -> Result<Option<SessionRecord>, WalletError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WalletError::Storage(format!("{}: {e}", self.path.display()))),
        };
        match serde_json::from_str(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                // An unreadable hint is as good as none.
                debug!(path = %self.path.display(), error = %e, "discarding corrupt snapshot");
                Ok(None)
            }
        }
    }

    fn save(&self, record: &SessionRecord) -> Result<(), WalletError> {
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| WalletError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| WalletError::Storage(format!("{}: {e}", parent.display())))?;
        }
        std::fs::write(&self.path, json)
            .map_err(|e| WalletError::Storage(format!("{}: {e}", self.path.display())))
    }

    fn clear(&self) -> Result<(), WalletError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WalletError::Storage(format!("{}: {e}", self.path.display()))),
        }
    }
}
