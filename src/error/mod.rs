use thiserror::Error;

#[derive(Error, Debug)]
pub enum GitMcpError {
    #[error("Git command failed: {0}")]
    GitCommandFailed(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to clone repository {url}: {reason}")]
    CloneFailed { url: String, reason: String },

    #[error("Failed to refresh cached repository at {path}: {reason}")]
    RefreshFailed { path: String, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, GitMcpError>;
