//! Local clone cache for remote repositories.
//!
//! Every remote URL maps to one slot directory under the configured cache
//! root, `<cache_dir>/<prefix>_<key>`, where `key` is a truncated SHA-256 of
//! the URL. A slot is reused only when it is a working copy whose `origin`
//! fetch URL is exactly the requested URL; anything else is purged and cloned
//! again.

use crate::config::Config;
use crate::error::{GitMcpError, Result};
use crate::git::GitExecutor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const KEY_LEN: usize = 16;

/// Deterministic, filesystem-safe fingerprint of a repository URL.
pub fn cache_key(url: &str) -> String {
    let digest = hex::encode(Sha256::digest(url.as_bytes()));
    digest[..KEY_LEN].to_string()
}

pub struct RepoCache {
    config: Arc<Config>,
    executor: Arc<GitExecutor>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RepoCache {
    pub fn new(config: Arc<Config>, executor: Arc<GitExecutor>) -> Self {
        Self {
            config,
            executor,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.config.cache_dir
    }

    pub fn slot_path(&self, url: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("{}_{}", self.config.cache_prefix, cache_key(url)))
    }

    fn lock_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Return the path of a ready working copy of `url`, refreshing a valid
    /// cached clone or cloning a fresh one.
    ///
    /// Callers for the same URL are serialised; a refresh failure is returned
    /// as-is and leaves the slot in place.
    pub async fn acquire(&self, url: &str) -> Result<PathBuf> {
        if url.trim().is_empty() {
            return Err(GitMcpError::InvalidInput(
                "repo_url must not be empty".to_string(),
            ));
        }

        let key = cache_key(url);
        let lock = self.lock_for(&key);
        let result = {
            let _guard = lock.lock().await;
            self.acquire_locked(url)
        };
        self.release_lock(&key, lock);
        result
    }

    /// Forget the lock for `key` unless another caller still holds or awaits it.
    fn release_lock(&self, key: &str, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
    }

    fn acquire_locked(&self, url: &str) -> Result<PathBuf> {
        let path = self.slot_path(url);

        if path.exists() {
            match self.origin_url(&path) {
                Ok(remote) if remote == url => {
                    tracing::info!("Reusing cached clone of {} at {}", url, path.display());
                    self.refresh(&path)?;
                    return Ok(path);
                }
                Ok(remote) => {
                    tracing::warn!(
                        "Cache slot {} tracks {} instead of {}, recloning",
                        path.display(),
                        remote,
                        url
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Cache slot {} is not a usable working copy ({}), recloning",
                        path.display(),
                        e
                    );
                }
            }
            purge(&path)?;
        }

        self.clone_into(url, &path)?;
        Ok(path)
    }

    fn origin_url(&self, path: &Path) -> Result<String> {
        let toplevel = self
            .executor
            .execute_in_dir(path, &["rev-parse", "--show-toplevel"])?;
        let toplevel = PathBuf::from(toplevel.trim()).canonicalize()?;
        if toplevel != path.canonicalize()? {
            return Err(GitMcpError::RepositoryNotFound(path.display().to_string()));
        }

        let output = self
            .executor
            .execute_in_dir(path, &["remote", "get-url", "origin"])?;
        Ok(output.trim().to_string())
    }

    fn refresh(&self, path: &Path) -> Result<()> {
        self.executor
            .execute_in_dir(path, &["pull"])
            .map(|_| ())
            .map_err(|e| GitMcpError::RefreshFailed {
                path: path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn clone_into(&self, url: &str, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path)?;
        tracing::info!("Cloning {} into {}", url, path.display());

        if let Err(e) = self
            .executor
            .execute_in_dir(path, &["clone", "--", url, "."])
        {
            tracing::error!("Clone of {} failed: {}", url, e);
            if let Err(cleanup) = std::fs::remove_dir_all(path) {
                tracing::warn!("Could not remove {}: {}", path.display(), cleanup);
            }
            return Err(GitMcpError::CloneFailed {
                url: url.to_string(),
                reason: e.to_string(),
            });
        }

        Ok(())
    }
}

fn purge(path: &Path) -> Result<()> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)?;
    } else {
        std::fs::remove_file(path)?;
    }
    Ok(())
}
