pub mod advanced;
pub mod branching;
pub mod browse;
pub mod history;
pub mod remote;
pub mod repo;
pub mod repo_files;
pub mod staging;

use crate::cache::RepoCache;
use crate::config::Config;
use crate::error::{GitMcpError, Result};
use crate::git::GitExecutor;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct ToolContext {
    pub config: Arc<Config>,
    pub executor: Arc<GitExecutor>,
    pub cache: Arc<RepoCache>,
}

impl ToolContext {
    pub fn new(config: Config) -> Self {
        Self::from_shared(Arc::new(config))
    }

    pub fn from_shared(config: Arc<Config>) -> Self {
        let executor = Arc::new(GitExecutor::new(config.clone()));
        let cache = Arc::new(RepoCache::new(config.clone(), executor.clone()));
        Self {
            config,
            executor,
            cache,
        }
    }

    /// Turn a tool's location arguments into a local working copy path.
    pub async fn resolve(&self, location: &RepoLocation) -> Result<PathBuf> {
        if let Some(path) = location.repo_path.as_deref().filter(|p| !p.is_empty()) {
            return self.config.validate_path(&PathBuf::from(path));
        }
        if let Some(url) = location.repo_url.as_deref() {
            return self.cache.acquire(url).await;
        }
        if let Some(base) = &self.config.git_base_dir {
            return self.config.validate_path(base);
        }
        Err(GitMcpError::InvalidInput(
            "Either repo_url or repo_path is required".to_string(),
        ))
    }
}

/// Where a tool should operate: a remote (through the clone cache) or a local
/// repository path.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct RepoLocation {
    #[schemars(description = "Remote repository URL; the tool runs against a cached clone")]
    pub repo_url: Option<String>,

    #[schemars(description = "Path to a local git repository (takes precedence over repo_url)")]
    pub repo_path: Option<String>,
}

impl RepoLocation {
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            repo_url: Some(url.into()),
            repo_path: None,
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            repo_url: None,
            repo_path: Some(path.into()),
        }
    }
}

/// Borrow a non-empty optional argument, or fail naming the operation that needs it.
pub(crate) fn required<'a>(value: &'a Option<String>, field: &str, operation: &str) -> Result<&'a str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GitMcpError::InvalidInput(format!("{} is required for {}", field, operation)))
}
