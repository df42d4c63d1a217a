pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::time::Duration;

use crate::config::AppConfig;
use crate::infra::{cache::PageCache, db::Db, storage::MediaStorage};

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub cache: PageCache,
    pub storage: MediaStorage,
    pub posts_per_page: i64,
    pub index_cache_ttl: Duration,
    pub session_ttl_days: i64,
    pub upload_max_bytes: usize,
}

impl AppState {
    /// Connects the database, applies migrations and opens the page cache and media root.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let db = Db::connect(config).await?;
        db.migrate().await?;
        let cache = PageCache::from_config(config).await?;
        let storage = MediaStorage::new(config).await?;

        Ok(Self {
            db,
            cache,
            storage,
            posts_per_page: config.posts_per_page,
            index_cache_ttl: Duration::from_secs(config.index_cache_seconds),
            session_ttl_days: config.session_ttl_days,
            upload_max_bytes: config.upload_max_bytes,
        })
    }
}
