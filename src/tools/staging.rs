use crate::error::{GitMcpError, Result};
use crate::tools::{RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitAddInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Files to add")]
    #[serde(default)]
    pub files: Vec<String>,

    #[schemars(description = "Update tracked files only")]
    pub update: Option<bool>,

    #[schemars(description = "Add all files")]
    pub all: Option<bool>,

    #[schemars(description = "Force adding ignored files")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitAddOutput {
    pub success: bool,
    pub files_added: Vec<String>,
    pub message: String,
}

pub async fn git_add(ctx: ToolContext, input: GitAddInput) -> Result<GitAddOutput> {
    let all = input.all.unwrap_or(false);
    let update = input.update.unwrap_or(false);
    if input.files.is_empty() && !all && !update {
        return Err(GitMcpError::InvalidInput(
            "Nothing to add: pass files, all=true or update=true".to_string(),
        ));
    }

    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["add"];
    if update {
        args.push("--update");
    }
    if all {
        args.push("--all");
    }
    if input.force.unwrap_or(false) {
        args.push("--force");
    }
    if !input.files.is_empty() {
        args.push("--");
        args.extend(input.files.iter().map(String::as_str));
    }

    ctx.executor.execute_in_dir(&path, &args)?;

    Ok(GitAddOutput {
        success: true,
        files_added: input.files.clone(),
        message: format!("Added {} file(s) to staging", input.files.len()),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCommitInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Commit message")]
    pub message: String,

    #[schemars(description = "Author override (name <email>)")]
    pub author: Option<String>,

    #[schemars(description = "Amend previous commit")]
    pub amend: Option<bool>,

    #[schemars(description = "Allow empty commit")]
    pub allow_empty: Option<bool>,

    #[schemars(description = "Files to stage before commit")]
    pub files_to_stage: Option<Vec<String>>,

    #[schemars(description = "Skip pre-commit hooks")]
    pub no_verify: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCommitOutput {
    pub success: bool,
    pub commit_hash: Option<String>,
    pub branch: Option<String>,
    pub message: String,
}

pub async fn git_commit(ctx: ToolContext, input: GitCommitInput) -> Result<GitCommitOutput> {
    let path = ctx.resolve(&input.location).await?;

    if let Some(files) = input.files_to_stage.as_ref().filter(|f| !f.is_empty()) {
        let mut add_args = vec!["add", "--"];
        add_args.extend(files.iter().map(String::as_str));
        ctx.executor.execute_in_dir(&path, &add_args)?;
    }

    let mut args = vec!["commit", "-m", &input.message];

    if let Some(author) = &input.author {
        args.push("--author");
        args.push(author);
    }
    if input.amend.unwrap_or(false) {
        args.push("--amend");
    }
    if input.allow_empty.unwrap_or(false) {
        args.push("--allow-empty");
    }
    if input.no_verify.unwrap_or(false) {
        args.push("--no-verify");
    }
    if ctx.config.git_sign_commits {
        args.push("-S");
    }

    ctx.executor.execute_in_dir(&path, &args)?;

    let commit_hash = ctx
        .executor
        .execute_in_dir(&path, &["rev-parse", "HEAD"])
        .ok()
        .map(|o| o.trim().to_string());

    let branch = ctx
        .executor
        .execute_in_dir(&path, &["branch", "--show-current"])?
        .trim()
        .to_string();

    Ok(GitCommitOutput {
        success: true,
        commit_hash,
        branch: if branch.is_empty() { None } else { Some(branch) },
        message: format!("Created commit: {}", input.message),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitDiffInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Target commit/branch to compare")]
    pub target: Option<String>,

    #[schemars(description = "Source commit/branch to compare from")]
    pub source: Option<String>,

    #[schemars(description = "Specific file paths")]
    pub paths: Option<Vec<String>>,

    #[schemars(description = "Show staged changes")]
    pub staged: Option<bool>,

    #[schemars(description = "Show only file names")]
    pub name_only: Option<bool>,

    #[schemars(description = "Show diffstat")]
    pub stat: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitDiffOutput {
    pub success: bool,
    pub diff: String,
    pub files_changed: Option<i32>,
    pub insertions: Option<i32>,
    pub deletions: Option<i32>,
}

pub async fn git_diff(ctx: ToolContext, input: GitDiffInput) -> Result<GitDiffOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["diff"];
    if input.staged.unwrap_or(false) {
        args.push("--staged");
    }
    if input.name_only.unwrap_or(false) {
        args.push("--name-only");
    }
    let stat = input.stat.unwrap_or(false);
    if stat {
        args.push("--stat");
    }
    if let Some(source) = &input.source {
        args.push(source);
    }
    if let Some(target) = &input.target {
        args.push(target);
    }
    if let Some(paths) = &input.paths {
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;

    let (files_changed, insertions, deletions) = if stat {
        parse_stat_summary(output.stdout.lines().last().unwrap_or(""))
    } else {
        (None, None, None)
    };

    Ok(GitDiffOutput {
        success: true,
        diff: output.stdout,
        files_changed,
        insertions,
        deletions,
    })
}

/// Parse ` 3 files changed, 10 insertions(+), 2 deletions(-)`. Either count
/// may be missing when it is zero.
pub(crate) fn parse_stat_summary(line: &str) -> (Option<i32>, Option<i32>, Option<i32>) {
    let mut files = None;
    let mut insertions = None;
    let mut deletions = None;

    for part in line.split(',') {
        let mut words = part.split_whitespace();
        let count = words.next().and_then(|n| n.parse().ok());
        match words.next() {
            Some(w) if w.starts_with("file") => files = count,
            Some(w) if w.starts_with("insertion") => insertions = count,
            Some(w) if w.starts_with("deletion") => deletions = count,
            _ => {}
        }
    }

    (files, insertions, deletions)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitResetInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Reset mode: soft, mixed, hard, merge, keep")]
    pub mode: Option<String>,

    #[schemars(description = "Target commit/branch")]
    pub target: Option<String>,

    #[schemars(description = "Specific file paths")]
    pub paths: Option<Vec<String>>,

    #[schemars(description = "Confirmation for hard reset")]
    pub confirmed: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitResetOutput {
    pub success: bool,
    pub previous_head: Option<String>,
    pub new_head: Option<String>,
    pub message: String,
}

pub async fn git_reset(ctx: ToolContext, input: GitResetInput) -> Result<GitResetOutput> {
    let mode = input.mode.as_deref().unwrap_or("mixed");

    if mode == "hard" && !input.confirmed.unwrap_or(false) {
        return Ok(GitResetOutput {
            success: false,
            previous_head: None,
            new_head: None,
            message: "Hard reset requires confirmation (confirmed=true)".to_string(),
        });
    }

    let flag = match mode {
        "soft" => Some("--soft"),
        "mixed" => None,
        "hard" => Some("--hard"),
        "merge" => Some("--merge"),
        "keep" => Some("--keep"),
        other => {
            return Err(GitMcpError::InvalidInput(format!(
                "Unknown reset mode: {}",
                other
            )))
        }
    };

    let path = ctx.resolve(&input.location).await?;
    let head = |ctx: &ToolContext| {
        ctx.executor
            .execute_in_dir(&path, &["rev-parse", "HEAD"])
            .ok()
            .map(|o| o.trim().to_string())
    };
    let previous_head = head(&ctx);

    let mut args = vec!["reset"];
    args.extend(flag);
    if let Some(target) = &input.target {
        args.push(target);
    }
    if let Some(paths) = &input.paths {
        args.push("--");
        args.extend(paths.iter().map(String::as_str));
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;

    Ok(GitResetOutput {
        success: true,
        previous_head,
        new_head: head(&ctx),
        message: output.trim().to_string(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitRevertInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Commit to revert")]
    pub commit: Option<String>,

    #[schemars(description = "Apply the inverse changes without committing")]
    pub no_commit: Option<bool>,

    #[schemars(description = "Abort an in-progress revert")]
    pub abort: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitRevertOutput {
    pub success: bool,
    pub reverted: Option<String>,
    pub message: String,
}

pub async fn git_revert(ctx: ToolContext, input: GitRevertInput) -> Result<GitRevertOutput> {
    let path = ctx.resolve(&input.location).await?;

    if input.abort.unwrap_or(false) {
        ctx.executor.execute_in_dir(&path, &["revert", "--abort"])?;
        return Ok(GitRevertOutput {
            success: true,
            reverted: None,
            message: "Revert aborted".to_string(),
        });
    }

    let commit = input
        .commit
        .as_deref()
        .ok_or_else(|| GitMcpError::InvalidInput("commit is required".to_string()))?;

    let mut args = vec!["revert", "--no-edit"];
    if input.no_commit.unwrap_or(false) {
        args.push("--no-commit");
    }
    args.push(commit);

    let output = ctx.executor.execute_in_dir(&path, &args)?;

    Ok(GitRevertOutput {
        success: true,
        reverted: Some(commit.to_string()),
        message: output.trim().to_string(),
    })
}
