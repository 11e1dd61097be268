//! Redis-backed session store.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;

use super::record::SessionRecord;
use super::store::{SessionStore, StoreError, StoreResult};

/// Stores each session as one JSON document under `{prefix}:session:{key}`
/// with `SETEX`, so the state tag and form data always expire together.
pub struct RedisSessionStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSessionStore {
    /// Create a store from a connection URL such as `redis://localhost:6379`.
    ///
    /// No connection is made here; an unreachable server surfaces on first use.
    pub fn new(connection_url: &str, key_prefix: impl Into<String>) -> StoreResult<Self> {
        let client = redis::Client::open(connection_url)
            .map_err(|e| StoreError::connection(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            key_prefix: key_prefix.into(),
        })
    }

    fn session_key(&self, key: &str) -> String {
        format!("{}:session:{}", self.key_prefix, key)
    }

    async fn connection(&self) -> StoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::connection(e.to_string()))
    }

    /// Round-trips a `PING`. Used at startup to log store availability.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, key: &str) -> StoreResult<Option<SessionRecord>> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn
            .get(self.session_key(key))
            .await
            .map_err(|e| StoreError::connection(e.to_string()))?;
        payload
            .map(|s| {
                serde_json::from_str(&s)
                    .map_err(|e| StoreError::serialization(format!("decode session {key}: {e}")))
            })
            .transpose()
    }

    async fn set(&self, key: &str, record: &SessionRecord, ttl: Duration) -> StoreResult<()> {
        let payload = serde_json::to_string(record)
            .map_err(|e| StoreError::serialization(format!("encode session {key}: {e}")))?;
        let mut conn = self.connection().await?;
        conn.set_ex::<_, _, ()>(self.session_key(key), payload, ttl.as_secs().max(1))
            .await
            .map_err(|e| StoreError::connection(e.to_string()))
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.session_key(key))
            .await
            .map_err(|e| StoreError::connection(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_keys_are_prefixed() {
        let store = RedisSessionStore::new("redis://localhost:6379", "qibot").unwrap();
        assert_eq!(store.session_key("5544999"), "qibot:session:5544999");
    }

    #[test]
    fn rejects_malformed_url() {
        let err = RedisSessionStore::new("not a url", "qibot")
            .err()
            .expect("malformed url must fail");
        assert_eq!(err.kind, crate::session::StoreErrorKind::Connection);
    }
}
