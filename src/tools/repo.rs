use crate::config::Config;
use crate::error::{GitMcpError, Result};
use crate::tools::{RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// One line of `git status --porcelain=v2`.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusEntry {
    Changed { index: char, worktree: char, path: String },
    Unmerged { path: String },
    Untracked { path: String },
}

#[derive(Debug, Default)]
struct PorcelainStatus {
    branch: Option<String>,
    ahead: Option<i32>,
    behind: Option<i32>,
    entries: Vec<StatusEntry>,
}

fn parse_porcelain_v2(stdout: &str) -> PorcelainStatus {
    let mut status = PorcelainStatus::default();

    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("# branch.head ") {
            if rest != "(detached)" {
                status.branch = Some(rest.to_string());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("# branch.ab ") {
            let mut it = rest.split_whitespace();
            status.ahead = it.next().and_then(|a| a.trim_start_matches('+').parse().ok());
            status.behind = it.next().and_then(|b| b.trim_start_matches('-').parse().ok());
            continue;
        }

        if let Some(path) = line.strip_prefix("? ") {
            status.entries.push(StatusEntry::Untracked {
                path: path.to_string(),
            });
            continue;
        }

        // Field counts before the path: ordinary 8, rename/copy 9, unmerged 10.
        let (fields, unmerged) = match line.split(' ').next() {
            Some("1") => (9, false),
            Some("2") => (10, false),
            Some("u") => (11, true),
            _ => continue,
        };
        let parts: Vec<&str> = line.splitn(fields, ' ').collect();
        if parts.len() < fields {
            continue;
        }
        let path = parts[fields - 1]
            .split('\t')
            .next()
            .unwrap_or_default()
            .to_string();

        if unmerged {
            status.entries.push(StatusEntry::Unmerged { path });
        } else {
            let mut xy = parts[1].chars();
            status.entries.push(StatusEntry::Changed {
                index: xy.next().unwrap_or('.'),
                worktree: xy.next().unwrap_or('.'),
                path,
            });
        }
    }

    status
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitLocalChangesInput {
    #[schemars(description = "Path to a local git repository")]
    pub repo_path: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GitLocalChangesOutput {
    pub branch: Option<String>,
    pub staged_files: Vec<String>,
    pub modified_files: Vec<String>,
    pub new_files: Vec<String>,
    pub deleted_files: Vec<String>,
    pub conflicted_files: Vec<String>,
    /// Working tree diff of every modified file.
    pub diffs: BTreeMap<String, String>,
}

pub async fn git_local_changes(
    ctx: ToolContext,
    input: GitLocalChangesInput,
) -> Result<GitLocalChangesOutput> {
    let path = ctx.config.validate_path(&PathBuf::from(&input.repo_path))?;

    let output = ctx
        .executor
        .execute_in_dir(&path, &["status", "--porcelain=v2", "--branch", "-u"])?;
    let mut result = classify_local_changes(parse_porcelain_v2(&output.stdout));

    for file in &result.modified_files {
        let diff = ctx.executor.execute_in_dir(&path, &["diff", "--", file])?;
        result.diffs.insert(file.clone(), diff.stdout);
    }

    Ok(result)
}

fn classify_local_changes(status: PorcelainStatus) -> GitLocalChangesOutput {
    let mut out = GitLocalChangesOutput {
        branch: status.branch,
        ..GitLocalChangesOutput::default()
    };

    for entry in status.entries {
        match entry {
            StatusEntry::Untracked { path } => out.new_files.push(path),
            StatusEntry::Unmerged { path } => out.conflicted_files.push(path),
            StatusEntry::Changed {
                index,
                worktree,
                path,
            } => {
                if index != '.' {
                    out.staged_files.push(path.clone());
                }
                if index == 'A' {
                    out.new_files.push(path.clone());
                }
                if matches!(worktree, 'M' | 'T') {
                    out.modified_files.push(path.clone());
                }
                if index == 'D' || worktree == 'D' {
                    out.deleted_files.push(path);
                }
            }
        }
    }

    out
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitStatusInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Include untracked files in the output")]
    pub include_untracked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitStatusOutput {
    pub success: bool,
    pub branch: Option<String>,
    pub ahead: Option<i32>,
    pub behind: Option<i32>,
    pub staged: Vec<String>,
    pub unstaged: Vec<String>,
    pub untracked: Vec<String>,
    pub conflicts: Vec<String>,
}

pub async fn git_status(ctx: ToolContext, input: GitStatusInput) -> Result<GitStatusOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["status", "--porcelain=v2", "--branch"];
    if input.include_untracked.unwrap_or(true) {
        args.push("-u");
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;
    let status = parse_porcelain_v2(&output.stdout);

    let mut result = GitStatusOutput {
        success: true,
        branch: status.branch,
        ahead: status.ahead,
        behind: status.behind,
        staged: Vec::new(),
        unstaged: Vec::new(),
        untracked: Vec::new(),
        conflicts: Vec::new(),
    };

    for entry in status.entries {
        match entry {
            StatusEntry::Untracked { path } => result.untracked.push(path),
            StatusEntry::Unmerged { path } => result.conflicts.push(path),
            StatusEntry::Changed {
                index,
                worktree,
                path,
            } => {
                if index != '.' {
                    result.staged.push(path.clone());
                }
                if worktree != '.' {
                    result.unstaged.push(path);
                }
            }
        }
    }

    Ok(result)
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCloneInput {
    #[schemars(description = "URL of the repository to clone into the local cache")]
    pub repo_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCloneOutput {
    pub success: bool,
    pub path: String,
    pub message: String,
}

pub async fn git_clone(ctx: ToolContext, input: GitCloneInput) -> Result<GitCloneOutput> {
    let path = ctx.cache.acquire(&input.repo_url).await?;

    Ok(GitCloneOutput {
        success: true,
        path: path.display().to_string(),
        message: format!("Repository {} is available locally", input.repo_url),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCleanInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Force cleaning (required)")]
    pub force: bool,

    #[schemars(description = "Show what would be deleted without actually deleting")]
    pub dry_run: Option<bool>,

    #[schemars(description = "Remove untracked directories in addition to files")]
    pub directories: Option<bool>,

    #[schemars(description = "Remove ignored files as well")]
    pub ignored: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitCleanOutput {
    pub success: bool,
    pub cleaned_files: Vec<String>,
    pub message: String,
}

pub async fn git_clean(ctx: ToolContext, input: GitCleanInput) -> Result<GitCleanOutput> {
    if !input.force {
        return Ok(GitCleanOutput {
            success: false,
            cleaned_files: vec![],
            message: "Clean operation requires force=true confirmation".to_string(),
        });
    }

    let path = ctx.resolve(&input.location).await?;
    let dry_run = input.dry_run.unwrap_or(false);

    let mut args = vec!["clean"];
    args.push(if dry_run { "--dry-run" } else { "-f" });
    if input.directories.unwrap_or(false) {
        args.push("-d");
    }
    if input.ignored.unwrap_or(false) {
        args.push("-X");
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;

    let cleaned_files: Vec<String> = output
        .stdout
        .lines()
        .filter_map(|l| {
            l.strip_prefix("Would remove ")
                .or_else(|| l.strip_prefix("Removing "))
                .map(|rest| rest.trim().to_string())
        })
        .collect();

    Ok(GitCleanOutput {
        success: true,
        cleaned_files,
        message: if dry_run {
            "Dry run completed".to_string()
        } else {
            "Files cleaned successfully".to_string()
        },
    })
}

const ARCHIVE_FORMATS: [&str; 4] = ["tar", "zip", "tar.gz", "tgz"];

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitArchiveInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "File to write the archive to, inside the repository or the base directory")]
    pub output_path: String,

    #[schemars(description = "Archive format: tar, zip, tar.gz, tgz (default: zip)")]
    pub format: Option<String>,

    #[schemars(description = "Tree-ish to archive (default: HEAD)")]
    pub treeish: Option<String>,

    #[schemars(description = "Prefix prepended to every path in the archive")]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitArchiveOutput {
    pub success: bool,
    pub output_path: String,
    pub format: String,
    pub message: String,
}

pub async fn git_archive(ctx: ToolContext, input: GitArchiveInput) -> Result<GitArchiveOutput> {
    let format = input.format.clone().unwrap_or_else(|| "zip".to_string());
    if !ARCHIVE_FORMATS.contains(&format.as_str()) {
        return Err(GitMcpError::InvalidInput(format!(
            "Unsupported archive format: {} (expected one of {})",
            format,
            ARCHIVE_FORMATS.join(", ")
        )));
    }

    let path = ctx.resolve(&input.location).await?;
    let treeish = input.treeish.as_deref().unwrap_or("HEAD");

    let target = archive_target(&ctx.config, &path, &input.output_path)?;

    let format_arg = format!("--format={}", format);
    let output_arg = format!("--output={}", target.display());
    let mut args = vec!["archive", format_arg.as_str(), output_arg.as_str()];
    let prefix_arg = input.prefix.as_ref().map(|p| format!("--prefix={}", p));
    if let Some(prefix) = &prefix_arg {
        args.push(prefix);
    }
    args.push(treeish);

    ctx.executor.execute_in_dir(&path, &args)?;

    Ok(GitArchiveOutput {
        success: true,
        output_path: target.display().to_string(),
        message: format!("Archived {} to {}", treeish, target.display()),
        format,
    })
}

/// Resolve the archive destination against `repo`. Its parent directory must
/// exist and lie inside the repository or the configured base directory.
fn archive_target(config: &Config, repo: &Path, output_path: &str) -> Result<PathBuf> {
    let requested = Path::new(output_path);
    let file_name = requested
        .file_name()
        .ok_or_else(|| GitMcpError::InvalidPath(format!("{} does not name a file", output_path)))?;
    let parent = repo.join(requested.parent().unwrap_or(Path::new("")));
    let parent = parent
        .canonicalize()
        .map_err(|_| GitMcpError::InvalidPath(parent.display().to_string()))?;

    let repo_root = repo.canonicalize()?;
    let in_base = match &config.git_base_dir {
        Some(base) => base
            .canonicalize()
            .map(|base| parent.starts_with(base))
            .unwrap_or(false),
        None => false,
    };
    if !parent.starts_with(&repo_root) && !in_base {
        return Err(GitMcpError::InvalidPath(format!(
            "Archive output {} is outside the repository and base directory",
            output_path
        )));
    }

    Ok(parent.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# branch.oid 1234
# branch.head main
# branch.upstream origin/main
# branch.ab +2 -1
1 M. N... 100644 100644 100644 abc def staged.rs
1 .M N... 100644 100644 100644 abc def edited file.rs
1 A. N... 000000 100644 100644 000 def added.rs
1 .D N... 100644 100644 000000 abc abc gone.rs
2 R. N... 100644 100644 100644 abc def R100 renamed.rs\told.rs
u UU N... 100644 100644 100644 100644 a b c both.rs
? untracked.txt
";

    #[test]
    fn porcelain_header_and_entries() {
        let status = parse_porcelain_v2(SAMPLE);
        assert_eq!(status.branch.as_deref(), Some("main"));
        assert_eq!(status.ahead, Some(2));
        assert_eq!(status.behind, Some(1));
        assert_eq!(status.entries.len(), 7);
        assert!(status.entries.contains(&StatusEntry::Changed {
            index: 'R',
            worktree: '.',
            path: "renamed.rs".to_string(),
        }));
        assert!(status.entries.contains(&StatusEntry::Changed {
            index: '.',
            worktree: 'M',
            path: "edited file.rs".to_string(),
        }));
    }

    #[test]
    fn local_changes_buckets() {
        let changes = classify_local_changes(parse_porcelain_v2(SAMPLE));
        assert_eq!(changes.branch.as_deref(), Some("main"));
        assert_eq!(changes.staged_files, vec!["staged.rs", "added.rs", "renamed.rs"]);
        assert_eq!(changes.modified_files, vec!["edited file.rs"]);
        assert_eq!(changes.new_files, vec!["added.rs", "untracked.txt"]);
        assert_eq!(changes.deleted_files, vec!["gone.rs"]);
        assert_eq!(changes.conflicted_files, vec!["both.rs"]);
    }

    #[test]
    fn archive_target_stays_in_repository_or_base_dir() {
        use tempfile::TempDir;

        let base = TempDir::new().unwrap();
        let repo = base.path().join("repo");
        std::fs::create_dir_all(repo.join("dist")).unwrap();
        let outside = TempDir::new().unwrap();

        let unrestricted = Config {
            git_base_dir: None,
            ..Config::default()
        };
        let canonical_repo = repo.canonicalize().unwrap();
        assert_eq!(
            archive_target(&unrestricted, &repo, "dist/out.zip").unwrap(),
            canonical_repo.join("dist").join("out.zip")
        );
        assert_eq!(
            archive_target(&unrestricted, &repo, "out.tar").unwrap(),
            canonical_repo.join("out.tar")
        );

        let elsewhere = outside.path().join("out.zip");
        assert!(matches!(
            archive_target(&unrestricted, &repo, elsewhere.to_str().unwrap()),
            Err(GitMcpError::InvalidPath(_))
        ));
        assert!(matches!(
            archive_target(&unrestricted, &repo, "../out.zip"),
            Err(GitMcpError::InvalidPath(_))
        ));
        assert!(matches!(
            archive_target(&unrestricted, &repo, "missing/out.zip"),
            Err(GitMcpError::InvalidPath(_))
        ));

        let restricted = Config {
            git_base_dir: Some(base.path().to_path_buf()),
            ..Config::default()
        };
        assert!(archive_target(&restricted, &repo, "../out.zip").is_ok());
        assert!(archive_target(&restricted, &repo, elsewhere.to_str().unwrap()).is_err());
    }

    #[test]
    fn detached_head_has_no_branch() {
        let status = parse_porcelain_v2("# branch.oid abc\n# branch.head (detached)\n");
        assert!(status.branch.is_none());
    }
}
