//! Per-caller session state: record model, identity resolution and storage.

pub mod identity;
mod record;
mod redis_store;
mod store;

pub use record::{MAX_AI_ATTEMPTS, ServiceType, SessionRecord, State};
pub use redis_store::RedisSessionStore;
pub use store::{
    DEFAULT_SESSION_TTL, InMemorySessionStore, SessionStore, StoreError, StoreErrorKind,
    StoreResult,
};
