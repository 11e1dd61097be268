//! Typed get/set/delete over an external key-value store with per-key expiry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::record::SessionRecord;

/// Every write refreshes the record's expiry to this value unless configured otherwise.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

/// Category of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    /// Store unreachable or command failed.
    Connection,
    /// The call did not complete within the configured bound.
    Timeout,
    /// Stored payload could not be encoded or decoded.
    Serialization,
}

/// Structured error from a session store.
#[derive(Debug, Clone)]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Connection, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Timeout, message)
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(StoreErrorKind::Serialization, message)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for StoreError {}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Session persistence used by the conversation service.
///
/// `get` returning `Ok(None)` means the session is fresh: never seen, deleted,
/// or evicted by TTL. The service does not distinguish between those.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<SessionRecord>>;

    async fn set(&self, key: &str, record: &SessionRecord, ttl: Duration) -> StoreResult<()>;

    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// In-process store. Expired entries are dropped on read and on every write.
/// Used for development and tests.
#[derive(Default)]
pub struct InMemorySessionStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

struct StoredEntry {
    payload: String,
    expires_at: Instant,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map(|entries| entries.values().filter(|e| e.expires_at > now).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes a raw payload, bypassing serialization. Lets tests plant corrupt data.
    pub fn insert_raw(&self, key: &str, payload: impl Into<String>, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key.to_string(),
                StoredEntry {
                    payload: payload.into(),
                    expires_at: Instant::now() + ttl,
                },
            );
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<SessionRecord>> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::connection("session map poisoned"))?;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };
        if entry.expires_at <= Instant::now() {
            entries.remove(key);
            return Ok(None);
        }
        serde_json::from_str(&entry.payload)
            .map(Some)
            .map_err(|e| StoreError::serialization(format!("decode session {key}: {e}")))
    }

    async fn set(&self, key: &str, record: &SessionRecord, ttl: Duration) -> StoreResult<()> {
        let payload = serde_json::to_string(record)
            .map_err(|e| StoreError::serialization(format!("encode session {key}: {e}")))?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::connection("session map poisoned"))?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            StoredEntry {
                payload,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::connection("session map poisoned"))?;
        entries.remove(key);
        Ok(())
    }
}
