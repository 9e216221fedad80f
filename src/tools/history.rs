use crate::error::Result;
use crate::tools::{RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const COMMIT_FORMAT: &str = "--format=%H|%h|%an|%ae|%ad|%s";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitLogInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Maximum number of commits to show")]
    pub max_count: Option<u32>,

    #[schemars(description = "Skip N commits")]
    pub skip: Option<u32>,

    #[schemars(description = "Show commits after this date")]
    pub since: Option<String>,

    #[schemars(description = "Show commits before this date")]
    pub until: Option<String>,

    #[schemars(description = "Filter by author")]
    pub author: Option<String>,

    #[schemars(description = "Filter by commit message pattern")]
    pub grep: Option<String>,

    #[schemars(description = "Branch or commit to start from")]
    pub branch: Option<String>,

    #[schemars(description = "Only commits touching this path")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCommit {
    pub hash: String,
    pub short_hash: String,
    pub author: String,
    pub email: String,
    pub date: String,
    pub message: String,
}

impl GitCommit {
    fn parse(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.splitn(6, '|').collect();
        if parts.len() < 6 {
            return None;
        }
        Some(Self {
            hash: parts[0].to_string(),
            short_hash: parts[1].to_string(),
            author: parts[2].to_string(),
            email: parts[3].to_string(),
            date: parts[4].to_string(),
            message: parts[5].to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitLogOutput {
    pub success: bool,
    pub commits: Vec<GitCommit>,
    pub total: usize,
}

pub async fn git_log(ctx: ToolContext, input: GitLogInput) -> Result<GitLogOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args: Vec<String> = vec!["log".into(), COMMIT_FORMAT.into(), "--date=iso".into()];

    if let Some(n) = input.max_count {
        args.push(format!("--max-count={}", n));
    }
    if let Some(n) = input.skip {
        args.push(format!("--skip={}", n));
    }
    if let Some(since) = &input.since {
        args.push(format!("--since={}", since));
    }
    if let Some(until) = &input.until {
        args.push(format!("--until={}", until));
    }
    if let Some(author) = &input.author {
        args.push(format!("--author={}", author));
    }
    if let Some(grep) = &input.grep {
        args.push(format!("--grep={}", grep));
    }
    if let Some(branch) = &input.branch {
        args.push(branch.clone());
    }
    if let Some(file_path) = &input.file_path {
        args.push("--".into());
        args.push(file_path.clone());
    }

    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = ctx.executor.execute_in_dir(&path, &args_refs)?;

    let commits: Vec<GitCommit> = output.stdout.lines().filter_map(GitCommit::parse).collect();

    Ok(GitLogOutput {
        success: true,
        total: commits.len(),
        commits,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitShowInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Object to show (commit, tag, tree, blob); default HEAD")]
    pub object: Option<String>,

    #[schemars(description = "Show diffstat instead of the full patch")]
    pub stat: Option<bool>,

    #[schemars(description = "Limit the patch to this path")]
    pub file_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitShowOutput {
    pub success: bool,
    pub content: String,
    pub commit: Option<GitCommit>,
}

pub async fn git_show(ctx: ToolContext, input: GitShowInput) -> Result<GitShowOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["show", COMMIT_FORMAT, "--date=iso"];
    if input.stat.unwrap_or(false) {
        args.push("--stat");
    }
    args.push(input.object.as_deref().unwrap_or("HEAD"));
    if let Some(file_path) = &input.file_path {
        args.push("--");
        args.push(file_path);
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;
    let commit = output.stdout.lines().next().and_then(GitCommit::parse);

    Ok(GitShowOutput {
        success: true,
        content: output.stdout,
        commit,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBlameInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "File to blame")]
    pub file: String,

    #[schemars(description = "Start line number")]
    pub start_line: Option<u32>,

    #[schemars(description = "End line number")]
    pub end_line: Option<u32>,

    #[schemars(description = "Ignore whitespace changes")]
    pub ignore_whitespace: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitBlameLine {
    pub line_number: u32,
    pub commit_hash: String,
    pub author: String,
    pub author_time: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitBlameOutput {
    pub success: bool,
    pub file: String,
    pub lines: Vec<GitBlameLine>,
}

pub async fn git_blame(ctx: ToolContext, input: GitBlameInput) -> Result<GitBlameOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args: Vec<String> = vec!["blame".into(), "--line-porcelain".into()];
    if input.ignore_whitespace.unwrap_or(false) {
        args.push("-w".into());
    }
    match (input.start_line, input.end_line) {
        (Some(start), Some(end)) => args.push(format!("-L{},{}", start, end)),
        (Some(start), None) => args.push(format!("-L{},", start)),
        (None, Some(end)) => args.push(format!("-L1,{}", end)),
        (None, None) => {}
    }
    args.push("--".into());
    args.push(input.file.clone());

    let args_refs: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
    let output = ctx.executor.execute_in_dir(&path, &args_refs)?;

    Ok(GitBlameOutput {
        success: true,
        file: input.file,
        lines: parse_line_porcelain(&output.stdout),
    })
}

fn parse_line_porcelain(stdout: &str) -> Vec<GitBlameLine> {
    let mut lines = Vec::new();
    let mut current: Option<GitBlameLine> = None;

    for line in stdout.lines() {
        if let Some(content) = line.strip_prefix('\t') {
            if let Some(done) = current.take() {
                lines.push(GitBlameLine {
                    content: content.to_string(),
                    ..done
                });
            }
        } else if let Some(author) = line.strip_prefix("author ") {
            if let Some(curr) = current.as_mut() {
                curr.author = author.to_string();
            }
        } else if let Some(time) = line.strip_prefix("author-time ") {
            if let Some(curr) = current.as_mut() {
                curr.author_time = time.to_string();
            }
        } else if current.is_none() {
            // Header: <sha> <orig-line> <final-line> [<group-size>]
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 && parts[0].chars().all(|c| c.is_ascii_hexdigit()) {
                current = Some(GitBlameLine {
                    line_number: parts[2].parse().unwrap_or(0),
                    commit_hash: parts[0].to_string(),
                    author: String::new(),
                    author_time: String::new(),
                    content: String::new(),
                });
            }
        }
    }

    lines
}
