//! Tools that manage files git reads from the repository itself: hook scripts
//! and `.gitattributes`.

use crate::error::{GitMcpError, Result};
use crate::tools::{required, RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const STANDARD_HOOKS: &[&str] = &[
    "applypatch-msg",
    "pre-applypatch",
    "post-applypatch",
    "pre-commit",
    "pre-merge-commit",
    "prepare-commit-msg",
    "commit-msg",
    "post-commit",
    "pre-rebase",
    "post-checkout",
    "post-merge",
    "pre-push",
    "pre-receive",
    "update",
    "post-receive",
    "post-update",
    "push-to-checkout",
    "pre-auto-gc",
    "post-rewrite",
];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitHooksInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: list, get, create")]
    pub mode: Option<String>,

    #[schemars(description = "Hook name (e.g. pre-commit)")]
    pub name: Option<String>,

    #[schemars(description = "Script body for create")]
    pub script: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitHookInfo {
    pub name: String,
    /// Sample hooks (`*.sample`) are shipped by `git init` and never run.
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitHooksOutput {
    pub success: bool,
    pub hooks: Vec<GitHookInfo>,
    pub content: Option<String>,
    pub message: String,
}

pub async fn git_hooks(ctx: ToolContext, input: GitHooksInput) -> Result<GitHooksOutput> {
    let path = ctx.resolve(&input.location).await?;
    let hooks_dir = hooks_dir(&ctx, &path)?;

    match input.mode.as_deref().unwrap_or("list") {
        "list" => Ok(GitHooksOutput {
            success: true,
            hooks: list_hooks(&hooks_dir)?,
            content: None,
            message: String::new(),
        }),
        "get" => {
            let name = standard_hook(&input.name)?;
            let file = hooks_dir.join(name);
            if !file.is_file() {
                return Err(GitMcpError::NotFound(format!("hook {} is not installed", name)));
            }
            Ok(GitHooksOutput {
                success: true,
                hooks: vec![],
                content: Some(std::fs::read_to_string(&file)?),
                message: String::new(),
            })
        }
        "create" => {
            let name = standard_hook(&input.name)?;
            let script = required(&input.script, "script", "create")?;
            std::fs::create_dir_all(&hooks_dir)?;
            let file = hooks_dir.join(name);
            std::fs::write(&file, script)?;
            make_executable(&file)?;
            tracing::info!("Installed {} hook at {}", name, file.display());
            Ok(GitHooksOutput {
                success: true,
                hooks: vec![],
                content: None,
                message: format!("Created hook: {}", name),
            })
        }
        other => Err(GitMcpError::InvalidInput(format!(
            "Unknown hooks operation: {}",
            other
        ))),
    }
}

fn hooks_dir(ctx: &ToolContext, repo: &Path) -> Result<PathBuf> {
    let output = ctx
        .executor
        .execute_in_dir(repo, &["rev-parse", "--git-path", "hooks"])?;
    let dir = PathBuf::from(output.trim());
    Ok(if dir.is_absolute() { dir } else { repo.join(dir) })
}

fn standard_hook(name: &Option<String>) -> Result<&str> {
    let name = required(name, "name", "hooks")?;
    if !STANDARD_HOOKS.contains(&name) {
        return Err(GitMcpError::InvalidInput(format!(
            "{} is not a standard git hook",
            name
        )));
    }
    Ok(name)
}

fn list_hooks(dir: &Path) -> Result<Vec<GitHookInfo>> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut hooks: Vec<GitHookInfo> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .filter_map(|entry| {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let (name, active) = match file_name.strip_suffix(".sample") {
                Some(base) => (base.to_string(), false),
                None => (file_name, true),
            };
            STANDARD_HOOKS
                .contains(&name.as_str())
                .then_some(GitHookInfo { name, active })
        })
        .collect();
    hooks.sort_by(|a, b| a.name.cmp(&b.name).then(b.active.cmp(&a.active)));
    Ok(hooks)
}

#[cfg(unix)]
fn make_executable(file: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(file, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_file: &Path) -> Result<()> {
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitAttributesInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: list, get, set")]
    pub mode: Option<String>,

    #[schemars(description = "Pattern for set (e.g. \"*.png\"), or file path for get")]
    pub pattern: Option<String>,

    #[schemars(description = "Attributes for set (e.g. \"binary\" or \"text eol=lf\")")]
    pub attributes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitAttribute {
    pub pattern: String,
    pub attributes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitAttributesOutput {
    pub success: bool,
    pub attributes: Vec<GitAttribute>,
    pub message: String,
}

pub async fn git_attributes(ctx: ToolContext, input: GitAttributesInput) -> Result<GitAttributesOutput> {
    let path = ctx.resolve(&input.location).await?;
    let file = path.join(".gitattributes");

    match input.mode.as_deref().unwrap_or("list") {
        "list" => {
            let text = if file.is_file() {
                std::fs::read_to_string(&file)?
            } else {
                String::new()
            };
            Ok(GitAttributesOutput {
                success: true,
                attributes: parse_attributes(&text),
                message: String::new(),
            })
        }
        "get" => {
            let target = required(&input.pattern, "pattern", "get")?;
            let output = ctx
                .executor
                .execute_in_dir(&path, &["check-attr", "-a", "--", target])?;
            Ok(GitAttributesOutput {
                success: true,
                attributes: parse_check_attr(&output.stdout),
                message: String::new(),
            })
        }
        "set" => {
            let pattern = required(&input.pattern, "pattern", "set")?;
            let attributes = required(&input.attributes, "attributes", "set")?;
            let text = if file.is_file() {
                std::fs::read_to_string(&file)?
            } else {
                String::new()
            };
            std::fs::write(&file, set_attribute(&text, pattern, attributes))?;
            Ok(GitAttributesOutput {
                success: true,
                attributes: vec![GitAttribute {
                    pattern: pattern.to_string(),
                    attributes: attributes.to_string(),
                }],
                message: format!("Set attributes for {}", pattern),
            })
        }
        other => Err(GitMcpError::InvalidInput(format!(
            "Unknown attributes operation: {}",
            other
        ))),
    }
}

fn parse_attributes(text: &str) -> Vec<GitAttribute> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(|line| match line.split_once(char::is_whitespace) {
            Some((pattern, attrs)) => GitAttribute {
                pattern: pattern.to_string(),
                attributes: attrs.trim().to_string(),
            },
            None => GitAttribute {
                pattern: line.to_string(),
                attributes: String::new(),
            },
        })
        .collect()
}

/// `git check-attr -a` prints `<path>: <attr>: <value>` per attribute.
fn parse_check_attr(stdout: &str) -> Vec<GitAttribute> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut parts = line.rsplitn(3, ": ");
            let value = parts.next()?;
            let attr = parts.next()?;
            let path = parts.next()?;
            Some(GitAttribute {
                pattern: path.to_string(),
                attributes: format!("{}={}", attr, value),
            })
        })
        .collect()
}

/// Replace the line for `pattern`, or append one. Comments and other lines are kept.
fn set_attribute(text: &str, pattern: &str, attributes: &str) -> String {
    let new_line = format!("{} {}", pattern, attributes);
    let mut replaced = false;
    let mut lines: Vec<String> = text
        .lines()
        .map(|line| {
            let first = line.split_whitespace().next();
            if !replaced && first == Some(pattern) && !line.trim_start().starts_with('#') {
                replaced = true;
                new_line.clone()
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        lines.push(new_line);
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
