use anyhow::{anyhow, Result};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::AppConfig;

/// Uploaded files on the local filesystem, served back under `/media/`.
#[derive(Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.media_root).await?;
        Ok(Self {
            root: config.media_root.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `bytes` under `dir` and returns the stored path relative to the root.
    /// A taken name gets a random suffix before its extension.
    pub async fn save(&self, dir: &str, file_name: &str, bytes: &[u8]) -> Result<String> {
        let file_name = sanitize_file_name(file_name)
            .ok_or_else(|| anyhow!("invalid upload file name: {:?}", file_name))?;
        let target_dir = self.root.join(dir);
        tokio::fs::create_dir_all(&target_dir).await?;

        let mut candidate = file_name.clone();
        loop {
            let path = target_dir.join(&candidate);
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(bytes).await?;
                    file.flush().await?;
                    return Ok(format!("{}/{}", dir, candidate));
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&file_name);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    pub async fn delete(&self, stored_path: &str) -> Result<()> {
        match tokio::fs::remove_file(self.root.join(stored_path)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn sanitize_file_name(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned)
    }
}

fn with_random_suffix(file_name: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(7)
        .map(char::from)
        .collect();
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", file_name, suffix),
    }
}
