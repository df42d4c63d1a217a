use anyhow::Result;
use bytes::Bytes;
use dashmap::DashMap;
use redis::{AsyncCommands, Client};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::AppConfig;

const KEY_PREFIX: &str = "yatube:page:";

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let body: Option<Vec<u8>> = conn.get(key).await?;
        Ok(body.map(Bytes::from))
    }

    async fn set(&self, key: &str, body: &[u8], ttl: Duration) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.set_ex::<_, _, ()>(key, body, ttl.as_secs()).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(format!("{}*", KEY_PREFIX))
                .await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };
        if !keys.is_empty() {
            conn.del::<_, ()>(&keys).await?;
        }
        Ok(keys.len())
    }
}

struct LocalEntry {
    body: Bytes,
    expires_at: Instant,
}

/// In-process fallback used when no Redis URL is configured.
#[derive(Clone, Default)]
pub struct LocalCache {
    entries: Arc<DashMap<String, LocalEntry>>,
}

impl LocalCache {
    fn get(&self, key: &str) -> Option<Bytes> {
        let hit = self
            .entries
            .get(key)
            .map(|entry| (entry.body.clone(), entry.expires_at));
        match hit {
            Some((body, expires_at)) if expires_at > Instant::now() => Some(body),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, body: Bytes, ttl: Duration) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
        self.entries.insert(
            key.to_string(),
            LocalEntry {
                body,
                expires_at: now + ttl,
            },
        );
    }

    fn clear(&self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }
}

/// Whole-response cache for rendered pages.
#[derive(Clone)]
pub enum PageCache {
    Redis(RedisCache),
    Local(LocalCache),
}

impl PageCache {
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        match config.redis_url.as_deref() {
            Some(url) => Ok(Self::Redis(RedisCache::connect(url).await?)),
            None => Ok(Self::local()),
        }
    }

    pub fn local() -> Self {
        Self::Local(LocalCache::default())
    }

    pub async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        match self {
            Self::Redis(cache) => cache.get(key).await,
            Self::Local(cache) => Ok(cache.get(key)),
        }
    }

    pub async fn set(&self, key: &str, body: Bytes, ttl: Duration) -> Result<()> {
        if ttl.is_zero() {
            return Ok(());
        }
        match self {
            Self::Redis(cache) => cache.set(key, &body, ttl).await,
            Self::Local(cache) => {
                cache.set(key, body, ttl);
                Ok(())
            }
        }
    }

    /// Drops every cached page. Returns how many entries were removed.
    pub async fn clear(&self) -> Result<usize> {
        match self {
            Self::Redis(cache) => cache.clear().await,
            Self::Local(cache) => Ok(cache.clear()),
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match self {
            Self::Redis(cache) => cache.ping().await,
            Self::Local(_) => Ok(()),
        }
    }
}

/// Cache key for a page: the request path and query, varied on the cookie header.
pub fn page_key(path_and_query: &str, cookie: Option<&str>) -> String {
    let cookie_hash = hex::encode(Sha256::digest(cookie.unwrap_or_default().as_bytes()));
    format!("{}{}:{}", KEY_PREFIX, path_and_query, cookie_hash)
}
