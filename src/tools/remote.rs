use crate::error::{GitMcpError, Result};
use crate::tools::{required, RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitRemoteInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: list, add, remove, rename, show, get-url, set-url")]
    pub mode: Option<String>,

    #[schemars(description = "Remote name")]
    pub name: Option<String>,

    #[schemars(description = "Remote URL")]
    pub url: Option<String>,

    #[schemars(description = "New remote name (for rename)")]
    pub new_name: Option<String>,

    #[schemars(description = "Set the push URL instead of the fetch URL (for set-url)")]
    pub push: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitRemoteInfo {
    pub name: String,
    pub fetch_url: String,
    pub push_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitRemoteOutput {
    pub success: bool,
    pub remotes: Vec<GitRemoteInfo>,
    pub message: String,
}

impl GitRemoteOutput {
    fn message(message: String) -> Self {
        Self {
            success: true,
            remotes: vec![],
            message,
        }
    }
}

pub async fn git_remote(ctx: ToolContext, input: GitRemoteInput) -> Result<GitRemoteOutput> {
    let path = ctx.resolve(&input.location).await?;
    let exec = |args: &[&str]| ctx.executor.execute_in_dir(&path, args);

    match input.mode.as_deref().unwrap_or("list") {
        "add" => {
            let name = required(&input.name, "name", "add")?;
            let url = required(&input.url, "url", "add")?;
            exec(&["remote", "add", name, url])?;
            Ok(GitRemoteOutput::message(format!("Added remote: {}", name)))
        }
        "remove" => {
            let name = required(&input.name, "name", "remove")?;
            exec(&["remote", "remove", name])?;
            Ok(GitRemoteOutput::message(format!("Removed remote: {}", name)))
        }
        "rename" => {
            let name = required(&input.name, "name", "rename")?;
            let new_name = required(&input.new_name, "new_name", "rename")?;
            exec(&["remote", "rename", name, new_name])?;
            Ok(GitRemoteOutput::message(format!("Renamed remote {} to {}", name, new_name)))
        }
        "show" => {
            let name = required(&input.name, "name", "show")?;
            let output = exec(&["remote", "show", "-n", name])?;
            Ok(GitRemoteOutput::message(output.trim().to_string()))
        }
        "get-url" => {
            let name = required(&input.name, "name", "get-url")?;
            let fetch_url = exec(&["remote", "get-url", name])?.trim().to_string();
            let push_url = exec(&["remote", "get-url", "--push", name])?.trim().to_string();
            Ok(GitRemoteOutput {
                remotes: vec![GitRemoteInfo {
                    name: name.to_string(),
                    push_url: if push_url == fetch_url { None } else { Some(push_url) },
                    fetch_url,
                }],
                ..GitRemoteOutput::message(String::new())
            })
        }
        "set-url" => {
            let name = required(&input.name, "name", "set-url")?;
            let url = required(&input.url, "url", "set-url")?;
            let mut args = vec!["remote", "set-url"];
            if input.push.unwrap_or(false) {
                args.push("--push");
            }
            args.push(name);
            args.push(url);
            exec(&args)?;
            Ok(GitRemoteOutput::message(format!("Set URL for remote: {}", name)))
        }
        "list" => {
            let output = exec(&["remote", "-v"])?;
            Ok(GitRemoteOutput {
                remotes: parse_remote_verbose(&output.stdout),
                ..GitRemoteOutput::message(String::new())
            })
        }
        other => Err(GitMcpError::InvalidInput(format!(
            "Unknown remote operation: {}",
            other
        ))),
    }
}

/// Fold `git remote -v` pairs into one entry per remote. The push URL is only
/// kept when it differs from the fetch URL.
fn parse_remote_verbose(stdout: &str) -> Vec<GitRemoteInfo> {
    let mut remotes: Vec<GitRemoteInfo> = Vec::new();

    for line in stdout.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 2 {
            continue;
        }
        let (name, url) = (parts[0], parts[1]);
        let is_push = parts.get(2) == Some(&"(push)");

        match remotes.iter_mut().find(|r| r.name == name) {
            Some(remote) if is_push => {
                if remote.fetch_url != url {
                    remote.push_url = Some(url.to_string());
                }
            }
            Some(remote) => remote.fetch_url = url.to_string(),
            None => remotes.push(GitRemoteInfo {
                name: name.to_string(),
                fetch_url: url.to_string(),
                push_url: None,
            }),
        }
    }

    remotes
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitFetchInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Remote name (default: all remotes)")]
    pub remote: Option<String>,

    #[schemars(description = "Prune deleted remote branches")]
    pub prune: Option<bool>,

    #[schemars(description = "Fetch all tags")]
    pub tags: Option<bool>,

    #[schemars(description = "Shallow fetch depth")]
    pub depth: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitFetchOutput {
    pub success: bool,
    pub remote: String,
    pub fetched_refs: Vec<String>,
    pub message: String,
}

pub async fn git_fetch(ctx: ToolContext, input: GitFetchInput) -> Result<GitFetchOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args: Vec<String> = vec!["fetch".into()];
    if input.prune.unwrap_or(false) {
        args.push("--prune".into());
    }
    if input.tags.unwrap_or(false) {
        args.push("--tags".into());
    }
    if let Some(depth) = input.depth {
        args.push(format!("--depth={}", depth));
    }
    let remote = match &input.remote {
        Some(remote) => {
            args.push(remote.clone());
            remote.clone()
        }
        None => {
            args.push("--all".into());
            "all".to_string()
        }
    };

    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = ctx.executor.execute_in_dir(&path, &args_refs)?;

    // Ref updates are reported on stderr.
    let fetched_refs: Vec<String> = output
        .stderr
        .lines()
        .filter(|l| l.contains("->"))
        .map(|l| l.trim().to_string())
        .collect();

    Ok(GitFetchOutput {
        success: true,
        remote,
        fetched_refs,
        message: "Fetch completed".to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitPullInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Remote name")]
    pub remote: Option<String>,

    #[schemars(description = "Branch to pull")]
    pub branch: Option<String>,

    #[schemars(description = "Rebase instead of merge")]
    pub rebase: Option<bool>,

    #[schemars(description = "Only fast-forward")]
    pub fast_forward_only: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitPullOutput {
    pub success: bool,
    pub merged_branches: Vec<String>,
    pub fast_forwarded: bool,
    pub message: String,
}

pub async fn git_pull(ctx: ToolContext, input: GitPullInput) -> Result<GitPullOutput> {
    if input.branch.is_some() && input.remote.is_none() {
        return Err(GitMcpError::InvalidInput(
            "remote is required when branch is given".to_string(),
        ));
    }

    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["pull"];
    if input.rebase.unwrap_or(false) {
        args.push("--rebase");
    }
    if input.fast_forward_only.unwrap_or(false) {
        args.push("--ff-only");
    }
    if let Some(remote) = &input.remote {
        args.push(remote);
    }
    if let Some(branch) = &input.branch {
        args.push(branch);
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;

    Ok(GitPullOutput {
        success: true,
        merged_branches: input.branch.iter().cloned().collect(),
        fast_forwarded: output.stdout.contains("Fast-forward"),
        message: output.trim().to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitPushInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Remote name (default: origin)")]
    pub remote: Option<String>,

    #[schemars(description = "Branch to push")]
    pub branch: Option<String>,

    #[schemars(description = "Force push")]
    pub force: Option<bool>,

    #[schemars(description = "Force with lease")]
    pub force_with_lease: Option<bool>,

    #[schemars(description = "Set upstream")]
    pub set_upstream: Option<bool>,

    #[schemars(description = "Push all tags")]
    pub tags: Option<bool>,

    #[schemars(description = "Dry run")]
    pub dry_run: Option<bool>,

    #[schemars(description = "Delete remote branch")]
    pub delete: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitPushOutput {
    pub success: bool,
    pub remote: String,
    pub branch: Option<String>,
    pub message: String,
}

pub async fn git_push(ctx: ToolContext, input: GitPushInput) -> Result<GitPushOutput> {
    let delete = input.delete.unwrap_or(false);
    if delete && input.branch.is_none() {
        return Err(GitMcpError::InvalidInput(
            "branch is required to delete a remote branch".to_string(),
        ));
    }

    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["push"];
    if input.force.unwrap_or(false) {
        args.push("--force");
    }
    if input.force_with_lease.unwrap_or(false) {
        args.push("--force-with-lease");
    }
    if input.set_upstream.unwrap_or(false) {
        args.push("--set-upstream");
    }
    if input.tags.unwrap_or(false) {
        args.push("--tags");
    }
    if input.dry_run.unwrap_or(false) {
        args.push("--dry-run");
    }
    if delete {
        args.push("--delete");
    }

    let remote = input.remote.clone().unwrap_or_else(|| "origin".to_string());
    args.push(&remote);
    if let Some(branch) = &input.branch {
        args.push(branch);
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;
    // git push writes its progress to stderr.
    let message = match output.stderr.trim() {
        "" => output.trim().to_string(),
        stderr => stderr.to_string(),
    };

    Ok(GitPushOutput {
        success: true,
        remote,
        branch: input.branch.clone(),
        message,
    })
}
