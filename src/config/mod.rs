use crate::cache::KEY_LEN;
use crate::error::{GitMcpError, Result};
use clap::{Parser, ValueEnum};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_CACHE_PREFIX: &str = "git_mcp_repo";

#[derive(Debug, Clone)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub cache_prefix: String,
    pub git_base_dir: Option<PathBuf>,
    pub git_username: Option<String>,
    pub git_email: Option<String>,
    pub git_sign_commits: bool,
    pub log_level: String,
    pub transport_type: TransportType,
    pub http_host: String,
    pub http_port: u16,
    pub http_endpoint_path: String,
    pub session_mode: SessionMode,
    pub auth_mode: AuthMode,
    pub auth_secret_key: Option<String>,
    pub allowed_origins: Vec<String>,
    pub response_format: ResponseFormat,
    pub response_verbosity: ResponseVerbosity,
}

#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum TransportType {
    Stdio,
    Http,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionMode {
    Stateless,
    Stateful,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AuthMode {
    None,
    Jwt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseFormat {
    Json,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResponseVerbosity {
    Minimal,
    Standard,
}

/// Command line overrides. Anything left unset falls back to the environment.
#[derive(Debug, Default, Parser)]
#[command(name = "git-repo-mcp", version, about = "Git repository tools over MCP")]
pub struct Cli {
    /// Transport to serve on
    #[arg(long, value_enum)]
    pub transport: Option<TransportType>,

    /// Directory holding cached clones
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Restrict local repository paths to this directory
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// HTTP bind host
    #[arg(long)]
    pub host: Option<String>,

    /// HTTP bind port
    #[arg(long)]
    pub port: Option<u16>,

    /// Log filter, e.g. `info` or `git_repo_mcp=debug`
    #[arg(long)]
    pub log_level: Option<String>,
}

fn env_flag(name: &str) -> bool {
    env::var(name).unwrap_or_default().to_lowercase() == "true"
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: env::var("GIT_MCP_CACHE_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            cache_prefix: env::var("GIT_MCP_CACHE_PREFIX")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_CACHE_PREFIX.to_string()),
            git_base_dir: env::var("GIT_BASE_DIR").ok().map(PathBuf::from),
            git_username: env::var("GIT_USERNAME")
                .or_else(|_| env::var("GIT_AUTHOR_NAME"))
                .or_else(|_| env::var("GIT_USER"))
                .ok(),
            git_email: env::var("GIT_EMAIL")
                .or_else(|_| env::var("GIT_AUTHOR_EMAIL"))
                .or_else(|_| env::var("GIT_USER_EMAIL"))
                .ok(),
            git_sign_commits: env_flag("GIT_SIGN_COMMITS"),
            log_level: env::var("MCP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            transport_type: match env::var("MCP_TRANSPORT_TYPE")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "http" => TransportType::Http,
                _ => TransportType::Stdio,
            },
            http_host: env::var("MCP_HTTP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            http_port: env::var("MCP_HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3015),
            http_endpoint_path: env::var("MCP_HTTP_ENDPOINT_PATH")
                .unwrap_or_else(|_| "/mcp".to_string()),
            session_mode: match env::var("MCP_SESSION_MODE")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "stateless" => SessionMode::Stateless,
                "stateful" => SessionMode::Stateful,
                _ => SessionMode::Auto,
            },
            auth_mode: match env::var("MCP_AUTH_MODE")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "jwt" => AuthMode::Jwt,
                _ => AuthMode::None,
            },
            auth_secret_key: env::var("MCP_AUTH_SECRET_KEY").ok(),
            allowed_origins: env::var("MCP_ALLOWED_ORIGINS")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            response_format: match env::var("MCP_RESPONSE_FORMAT")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "markdown" => ResponseFormat::Markdown,
                _ => ResponseFormat::Json,
            },
            response_verbosity: match env::var("MCP_RESPONSE_VERBOSITY")
                .unwrap_or_default()
                .to_lowercase()
                .as_str()
            {
                "minimal" => ResponseVerbosity::Minimal,
                _ => ResponseVerbosity::Standard,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Apply command line overrides on top of the environment configuration.
    pub fn with_cli(mut self, cli: Cli) -> Self {
        if let Some(transport) = cli.transport {
            self.transport_type = transport;
        }
        if let Some(dir) = cli.cache_dir {
            self.cache_dir = dir;
        }
        if let Some(dir) = cli.base_dir {
            self.git_base_dir = Some(dir);
        }
        if let Some(host) = cli.host {
            self.http_host = host;
        }
        if let Some(port) = cli.port {
            self.http_port = port;
        }
        if let Some(level) = cli.log_level {
            self.log_level = level;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.auth_mode == AuthMode::Jwt && self.auth_secret_key.is_none() {
            return Err(GitMcpError::ConfigError(
                "MCP_AUTH_SECRET_KEY is required when MCP_AUTH_MODE=jwt".to_string(),
            ));
        }
        if !self.http_endpoint_path.starts_with('/') {
            return Err(GitMcpError::ConfigError(format!(
                "HTTP endpoint path must start with '/': {}",
                self.http_endpoint_path
            )));
        }
        Ok(())
    }

    pub fn validate_path(&self, path: &Path) -> Result<PathBuf> {
        let canonical = path
            .canonicalize()
            .map_err(|_| GitMcpError::InvalidPath(path.display().to_string()))?;

        if self.is_cache_slot(&canonical) {
            return Ok(canonical);
        }

        if let Some(base) = &self.git_base_dir {
            let base_canonical = base
                .canonicalize()
                .map_err(|_| GitMcpError::InvalidPath(base.display().to_string()))?;

            if !canonical.starts_with(&base_canonical) {
                return Err(GitMcpError::InvalidPath(format!(
                    "Path {} is outside allowed directory {}",
                    path.display(),
                    base.display()
                )));
            }
        }

        Ok(canonical)
    }

    /// Whether `canonical` lies inside a clone slot (`<cache_dir>/<prefix>_<key>`).
    /// Other paths under the cache root get no special treatment.
    fn is_cache_slot(&self, canonical: &Path) -> bool {
        let Ok(cache_root) = self.cache_dir.canonicalize() else {
            return false;
        };
        let Some(slot) = canonical
            .strip_prefix(&cache_root)
            .ok()
            .and_then(|rest| rest.components().next())
        else {
            return false;
        };

        slot.as_os_str()
            .to_str()
            .and_then(|name| name.strip_prefix(self.cache_prefix.as_str()))
            .and_then(|rest| rest.strip_prefix('_'))
            .is_some_and(|key| key.len() == KEY_LEN && key.bytes().all(|b| b.is_ascii_hexdigit()))
    }
}
