use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    /// Page cache lives in-process when unset.
    pub redis_url: Option<String>,
    pub media_root: PathBuf,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub posts_per_page: i64,
    pub index_cache_seconds: u64,
    pub session_ttl_days: i64,
    pub upload_max_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://yatube.sqlite3".to_string(),
            redis_url: None,
            media_root: PathBuf::from("media"),
            db_max_connections: 5,
            db_connect_timeout_seconds: 5,
            db_idle_timeout_seconds: 300,
            db_max_lifetime_seconds: 1800,
            posts_per_page: 10,
            index_cache_seconds: 20,
            session_ttl_days: 14,
            upload_max_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let http_addr = env_or("HTTP_ADDR", &defaults.http_addr);
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let posts_per_page: i64 = env_or_parse("POSTS_PER_PAGE", "10")?;
        if posts_per_page < 1 {
            return Err(anyhow!("invalid POSTS_PER_PAGE: must be at least 1"));
        }

        Ok(Self {
            http_addr,
            database_url: env_or("DATABASE_URL", &defaults.database_url),
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            media_root: PathBuf::from(env_or("MEDIA_ROOT", "media")),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "5")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            posts_per_page,
            index_cache_seconds: env_or_parse("INDEX_CACHE_SECONDS", "20")?,
            session_ttl_days: env_or_parse("SESSION_TTL_DAYS", "14")?,
            upload_max_bytes: env_or_parse("UPLOAD_MAX_BYTES", "10485760")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.posts_per_page, 10);
        assert_eq!(config.index_cache_seconds, 20);
        assert_eq!(config.session_ttl_days, 14);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn env_or_parse_reports_the_offending_key() {
        let err = env_or_parse::<u32>("YATUBE_TEST_SURELY_UNSET_KEY", "not-a-number")
            .unwrap_err()
            .to_string();
        assert!(err.starts_with("invalid YATUBE_TEST_SURELY_UNSET_KEY"));
    }
}
