use crate::error::{GitMcpError, Result};
use crate::tools::staging::parse_stat_summary;
use crate::tools::{required, RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBranchInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: list, create, delete, rename, show-current")]
    pub operation: Option<String>,

    #[schemars(description = "Branch name")]
    pub name: Option<String>,

    #[schemars(description = "New branch name (for rename)")]
    pub new_name: Option<String>,

    #[schemars(description = "Start point for new branch")]
    pub start_point: Option<String>,

    #[schemars(description = "Force operation")]
    pub force: Option<bool>,

    #[schemars(description = "List all branches (remote and local)")]
    pub all: Option<bool>,

    #[schemars(description = "List remote branches")]
    pub remote: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBranch {
    pub name: String,
    pub is_current: bool,
    pub is_remote: bool,
    pub upstream: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBranchOutput {
    pub success: bool,
    pub branches: Vec<GitBranch>,
    pub current_branch: Option<String>,
    pub message: String,
}

impl GitBranchOutput {
    fn message(message: String) -> Self {
        Self {
            success: true,
            branches: vec![],
            current_branch: None,
            message,
        }
    }
}

pub async fn git_branch(ctx: ToolContext, input: GitBranchInput) -> Result<GitBranchOutput> {
    let path = ctx.resolve(&input.location).await?;
    let force = input.force.unwrap_or(false);

    match input.operation.as_deref().unwrap_or("list") {
        "create" => {
            let name = required(&input.name, "name", "create")?;
            let mut args = vec!["branch"];
            if force {
                args.push("-f");
            }
            args.push(name);
            if let Some(start) = &input.start_point {
                args.push(start);
            }
            ctx.executor.execute_in_dir(&path, &args)?;
            Ok(GitBranchOutput::message(format!("Created branch: {}", name)))
        }
        "delete" => {
            let name = required(&input.name, "name", "delete")?;
            let flag = if force { "-D" } else { "-d" };
            ctx.executor.execute_in_dir(&path, &["branch", flag, name])?;
            Ok(GitBranchOutput::message(format!("Deleted branch: {}", name)))
        }
        "rename" => {
            let new_name = required(&input.new_name, "new_name", "rename")?;
            let mut args = vec!["branch", "-m"];
            if let Some(name) = &input.name {
                args.push(name);
            }
            args.push(new_name);
            ctx.executor.execute_in_dir(&path, &args)?;
            Ok(GitBranchOutput::message(format!("Renamed branch to: {}", new_name)))
        }
        "show-current" => {
            let output = ctx.executor.execute_in_dir(&path, &["branch", "--show-current"])?;
            let current = output.trim().to_string();
            Ok(GitBranchOutput {
                current_branch: if current.is_empty() { None } else { Some(current) },
                ..GitBranchOutput::message(String::new())
            })
        }
        "list" => {
            let mut args = vec!["branch", "--format=%(refname)|%(HEAD)|%(upstream:short)"];
            if input.all.unwrap_or(false) {
                args.push("-a");
            } else if input.remote.unwrap_or(false) {
                args.push("-r");
            }

            let output = ctx.executor.execute_in_dir(&path, &args)?;
            let branches: Vec<GitBranch> = output.stdout.lines().filter_map(parse_branch_line).collect();
            let current_branch = branches.iter().find(|b| b.is_current).map(|b| b.name.clone());

            Ok(GitBranchOutput {
                branches,
                current_branch,
                ..GitBranchOutput::message(String::new())
            })
        }
        other => Err(GitMcpError::InvalidInput(format!(
            "Unknown branch operation: {}",
            other
        ))),
    }
}

fn parse_branch_line(line: &str) -> Option<GitBranch> {
    let mut parts = line.split('|');
    let refname = parts.next()?.trim();
    if refname.is_empty() {
        return None;
    }
    let (name, is_remote) = match refname.strip_prefix("refs/remotes/") {
        Some(remote) => (remote, true),
        None => (refname.strip_prefix("refs/heads/").unwrap_or(refname), false),
    };
    Some(GitBranch {
        name: name.to_string(),
        is_current: parts.next().map(|s| s.trim() == "*").unwrap_or(false),
        is_remote,
        upstream: parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBranchDiffInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Base branch or commit")]
    pub base: String,

    #[schemars(description = "Branch or commit compared against the base")]
    pub compare: String,

    #[schemars(description = "Only report the diffstat instead of the full patch")]
    pub stat: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBranchDiffOutput {
    pub success: bool,
    pub base: String,
    pub compare: String,
    pub files: Vec<String>,
    pub diff: String,
    pub files_changed: Option<i32>,
    pub insertions: Option<i32>,
    pub deletions: Option<i32>,
}

pub async fn git_branch_diff(ctx: ToolContext, input: GitBranchDiffInput) -> Result<GitBranchDiffOutput> {
    let path = ctx.resolve(&input.location).await?;
    let range = format!("{}...{}", input.base, input.compare);

    let names = ctx.executor.execute_in_dir(&path, &["diff", "--name-only", &range])?;
    let files: Vec<String> = names
        .stdout
        .lines()
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    let stat_output = ctx.executor.execute_in_dir(&path, &["diff", "--shortstat", &range])?;
    let (files_changed, insertions, deletions) = parse_stat_summary(stat_output.trim());

    let diff = if input.stat.unwrap_or(false) {
        ctx.executor.execute_in_dir(&path, &["diff", "--stat", &range])?.stdout
    } else {
        ctx.executor.execute_in_dir(&path, &["diff", &range])?.stdout
    };

    Ok(GitBranchDiffOutput {
        success: true,
        base: input.base,
        compare: input.compare,
        files,
        diff,
        files_changed,
        insertions,
        deletions,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCheckoutInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Target: branch, commit, or file")]
    pub target: String,

    #[schemars(description = "Create new branch")]
    pub create_branch: Option<bool>,

    #[schemars(description = "Force checkout")]
    pub force: Option<bool>,

    #[schemars(description = "File paths to restore")]
    pub paths: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCheckoutOutput {
    pub success: bool,
    pub previous_head: Option<String>,
    pub new_head: String,
    pub message: String,
}

pub async fn git_checkout(ctx: ToolContext, input: GitCheckoutInput) -> Result<GitCheckoutOutput> {
    let path = ctx.resolve(&input.location).await?;

    let previous_head = ctx
        .executor
        .execute_in_dir(&path, &["rev-parse", "--abbrev-ref", "HEAD"])
        .ok()
        .map(|o| o.trim().to_string());

    let mut args = vec!["checkout"];
    if input.create_branch.unwrap_or(false) {
        args.push("-b");
    }
    if input.force.unwrap_or(false) {
        args.push("-f");
    }
    args.push(&input.target);
    if let Some(paths) = &input.paths {
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;
    let message = match output.trim() {
        "" => output.stderr.trim().to_string(),
        stdout => stdout.to_string(),
    };

    Ok(GitCheckoutOutput {
        success: true,
        previous_head,
        new_head: input.target.clone(),
        message,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitMergeInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Branch to merge")]
    #[serde(default)]
    pub branch: String,

    #[schemars(description = "Merge strategy")]
    pub strategy: Option<String>,

    #[schemars(description = "Create a merge commit")]
    pub no_fast_forward: Option<bool>,

    #[schemars(description = "Squash commits")]
    pub squash: Option<bool>,

    #[schemars(description = "Merge commit message")]
    pub message: Option<String>,

    #[schemars(description = "Abort current merge")]
    pub abort: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitMergeOutput {
    pub success: bool,
    pub merged_branches: Vec<String>,
    pub conflicts: Vec<String>,
    pub message: String,
}

pub async fn git_merge(ctx: ToolContext, input: GitMergeInput) -> Result<GitMergeOutput> {
    let path = ctx.resolve(&input.location).await?;

    if input.abort.unwrap_or(false) {
        ctx.executor.execute_in_dir(&path, &["merge", "--abort"])?;
        return Ok(GitMergeOutput {
            success: true,
            merged_branches: vec![],
            conflicts: vec![],
            message: "Merge aborted".to_string(),
        });
    }

    if input.branch.is_empty() {
        return Err(GitMcpError::InvalidInput("branch is required".to_string()));
    }

    let mut args = vec!["merge", "--no-edit"];
    if input.no_fast_forward.unwrap_or(false) {
        args.push("--no-ff");
    }
    if input.squash.unwrap_or(false) {
        args.push("--squash");
    }
    if let Some(msg) = &input.message {
        args.push("-m");
        args.push(msg);
    }
    if let Some(strategy) = &input.strategy {
        args.push("--strategy");
        args.push(strategy);
    }
    args.push(&input.branch);

    // A conflicted merge exits 1; report the conflicts rather than failing.
    let output = ctx.executor.execute_in_dir_allowing(&path, &args, &[1])?;
    if output.status == 1 && !output.stdout.contains("CONFLICT") {
        return Err(GitMcpError::GitCommandFailed(output.stderr.trim().to_string()));
    }

    let conflicts: Vec<String> = if output.status == 1 {
        ctx.executor
            .execute_in_dir(&path, &["diff", "--name-only", "--diff-filter=U"])?
            .stdout
            .lines()
            .map(str::to_string)
            .collect()
    } else {
        vec![]
    };

    Ok(GitMergeOutput {
        success: conflicts.is_empty(),
        merged_branches: vec![input.branch.clone()],
        conflicts,
        message: output.trim().to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitRebaseInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Rebase mode: start, continue, abort, skip")]
    pub mode: Option<String>,

    #[schemars(description = "Upstream branch")]
    pub upstream: Option<String>,

    #[schemars(description = "Branch to rebase")]
    pub branch: Option<String>,

    #[schemars(description = "Rebase onto specific commit")]
    pub onto: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitRebaseOutput {
    pub success: bool,
    pub message: String,
}

pub async fn git_rebase(ctx: ToolContext, input: GitRebaseInput) -> Result<GitRebaseOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["rebase"];
    match input.mode.as_deref().unwrap_or("start") {
        "continue" => args.push("--continue"),
        "abort" => args.push("--abort"),
        "skip" => args.push("--skip"),
        "start" => {
            if let Some(onto) = &input.onto {
                args.push("--onto");
                args.push(onto);
            }
            let upstream = required(&input.upstream, "upstream", "rebase")?;
            args.push(upstream);
            if let Some(branch) = &input.branch {
                args.push(branch);
            }
        }
        other => {
            return Err(GitMcpError::InvalidInput(format!(
                "Unknown rebase mode: {}",
                other
            )))
        }
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;
    let message = match output.trim() {
        "" => output.stderr.trim().to_string(),
        stdout => stdout.to_string(),
    };

    Ok(GitRebaseOutput {
        success: true,
        message,
    })
}
