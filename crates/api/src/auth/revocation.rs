//! Token revocation store
//!
//! Records explicitly invalidated tokens until they would have expired anyway.
//! Entries carry a TTL equal to the token's remaining lifetime, so the store
//! never has to be cleaned up by hand.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use sha2::{Digest, Sha256};

const KEY_PREFIX: &str = "revoked:";
const REVOKED_VALUE: &str = "revoked";

/// Storage interface for revoked tokens
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Mark a token as revoked for `ttl`. A zero TTL is a no-op.
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), RevocationError>;

    /// Point lookup; absence means not revoked
    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError>;

    /// Connectivity check for readiness probes
    async fn ping(&self) -> Result<(), RevocationError>;
}

/// Cache key for a token. Raw tokens are never used as keys.
fn revocation_key(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{KEY_PREFIX}{}", hex::encode(hasher.finalize()))
}

// =============================================================================
// Redis
// =============================================================================

/// Redis-backed store shared by every API instance
#[derive(Clone)]
pub struct RedisRevocationStore {
    conn: ConnectionManager,
}

impl RedisRevocationStore {
    pub async fn connect(redis_url: &str) -> Result<Self, RevocationError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis revocation store");
        Ok(Self { conn })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), RevocationError> {
        // SET EX takes whole seconds; round up so the entry never expires before the token
        let seconds = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
        if seconds == 0 {
            tracing::debug!("Skipping revocation of already-expired token");
            return Ok(());
        }

        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(revocation_key(token), REVOKED_VALUE, seconds)
            .await?;

        tracing::info!(ttl_secs = seconds, "Token revoked");
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(revocation_key(token)).await?;
        Ok(value.as_deref() == Some(REVOKED_VALUE))
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Process-local store with per-entry deadlines.
/// Used in tests and single-node development setups.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: RwLock<HashMap<String, Instant>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries that have not yet expired
    pub fn active_entries(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .map(|entries| entries.values().filter(|deadline| **deadline > now).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn revoke(&self, token: &str, ttl: Duration) -> Result<(), RevocationError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let mut entries = self
            .entries
            .write()
            .map_err(|_| RevocationError::Unavailable("lock poisoned".to_string()))?;
        // Expired entries are purged on write so the map stays bounded by live tokens
        let now = Instant::now();
        entries.retain(|_, deadline| *deadline > now);
        entries.insert(revocation_key(token), now + ttl);
        Ok(())
    }

    async fn is_revoked(&self, token: &str) -> Result<bool, RevocationError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| RevocationError::Unavailable("lock poisoned".to_string()))?;
        Ok(entries
            .get(&revocation_key(token))
            .is_some_and(|deadline| *deadline > Instant::now()))
    }

    async fn ping(&self) -> Result<(), RevocationError> {
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    #[error("Revocation store error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Revocation store unavailable: {0}")]
    Unavailable(String),
}
