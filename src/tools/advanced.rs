use crate::error::{GitMcpError, Result};
use crate::tools::{required, RepoLocation, ToolContext};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitTagInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: list, create, delete")]
    pub mode: Option<String>,

    #[schemars(description = "Tag name")]
    pub tag_name: Option<String>,

    #[schemars(description = "Commit to tag")]
    pub commit: Option<String>,

    #[schemars(description = "Tag message")]
    pub message: Option<String>,

    #[schemars(description = "Create annotated tag")]
    pub annotated: Option<bool>,

    #[schemars(description = "Force tag creation")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitTagInfo {
    pub name: String,
    pub commit_hash: String,
    pub message: Option<String>,
    pub tagger: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitTagOutput {
    pub success: bool,
    pub tags: Vec<GitTagInfo>,
    pub message: String,
}

pub async fn git_tag(ctx: ToolContext, input: GitTagInput) -> Result<GitTagOutput> {
    let path = ctx.resolve(&input.location).await?;

    match input.mode.as_deref().unwrap_or("list") {
        "create" => {
            let name = required(&input.tag_name, "tag_name", "create")?;
            let mut args = vec!["tag"];
            if input.annotated.unwrap_or(false) || input.message.is_some() {
                args.push("-a");
                args.push("-m");
                args.push(input.message.as_deref().unwrap_or(name));
            }
            if input.force.unwrap_or(false) {
                args.push("-f");
            }
            args.push(name);
            if let Some(commit) = &input.commit {
                args.push(commit);
            }
            ctx.executor.execute_in_dir(&path, &args)?;

            Ok(GitTagOutput {
                success: true,
                tags: vec![],
                message: format!("Created tag: {}", name),
            })
        }
        "delete" => {
            let name = required(&input.tag_name, "tag_name", "delete")?;
            ctx.executor.execute_in_dir(&path, &["tag", "-d", name])?;

            Ok(GitTagOutput {
                success: true,
                tags: vec![],
                message: format!("Deleted tag: {}", name),
            })
        }
        "list" => {
            let output = ctx.executor.execute_in_dir(
                &path,
                &[
                    "tag",
                    "-l",
                    "--format=%(refname:short)|%(objectname:short)|%(taggername)|%(subject)",
                ],
            )?;

            Ok(GitTagOutput {
                success: true,
                tags: output.stdout.lines().filter_map(parse_tag_line).collect(),
                message: String::new(),
            })
        }
        other => Err(GitMcpError::InvalidInput(format!(
            "Unknown tag operation: {}",
            other
        ))),
    }
}

fn parse_tag_line(line: &str) -> Option<GitTagInfo> {
    let parts: Vec<&str> = line.splitn(4, '|').collect();
    if parts.len() < 2 || parts[0].is_empty() {
        return None;
    }
    let non_empty = |i: usize| parts.get(i).map(|s| s.to_string()).filter(|s| !s.is_empty());
    Some(GitTagInfo {
        name: parts[0].to_string(),
        commit_hash: parts[1].to_string(),
        tagger: non_empty(2),
        message: non_empty(3),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitStashInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: save, push, pop, apply, list, drop, clear")]
    pub mode: Option<String>,

    #[schemars(description = "Stash message")]
    pub message: Option<String>,

    #[schemars(description = "Stash index for pop, apply and drop (default: 0)")]
    pub index: Option<u32>,

    #[schemars(description = "Include untracked files")]
    pub include_untracked: Option<bool>,

    #[schemars(description = "Keep staged changes")]
    pub keep_index: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitStashEntry {
    pub index: u32,
    pub stash_ref: String,
    pub branch: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitStashOutput {
    pub success: bool,
    pub stashes: Vec<GitStashEntry>,
    pub message: String,
}

pub async fn git_stash(ctx: ToolContext, input: GitStashInput) -> Result<GitStashOutput> {
    let path = ctx.resolve(&input.location).await?;

    let message = match input.mode.as_deref().unwrap_or("push") {
        "save" | "push" => {
            let mut args = vec!["stash", "push"];
            if let Some(msg) = &input.message {
                args.push("-m");
                args.push(msg);
            }
            if input.include_untracked.unwrap_or(false) {
                args.push("-u");
            }
            if input.keep_index.unwrap_or(false) {
                args.push("--keep-index");
            }
            ctx.executor.execute_in_dir(&path, &args)?.trim().to_string()
        }
        mode @ ("pop" | "apply" | "drop") => {
            let count = list_stashes(&ctx, &path)?.len();
            let index = input.index.unwrap_or(0);
            let stash_ref = stash_ref_in_range(index, count)?;
            let output = ctx.executor.execute_in_dir(&path, &["stash", mode, stash_ref.as_str()])?;
            match output.trim() {
                "" => output.stderr.trim().to_string(),
                stdout => stdout.to_string(),
            }
        }
        "clear" => {
            ctx.executor.execute_in_dir(&path, &["stash", "clear"])?;
            "Stash cleared".to_string()
        }
        "list" => {
            return Ok(GitStashOutput {
                success: true,
                stashes: list_stashes(&ctx, &path)?,
                message: String::new(),
            });
        }
        other => {
            return Err(GitMcpError::InvalidInput(format!(
                "Unknown stash operation: {}",
                other
            )))
        }
    };

    Ok(GitStashOutput {
        success: true,
        stashes: vec![],
        message,
    })
}

/// Map an index onto `stash@{index}`, refusing anything past the last entry.
fn stash_ref_in_range(index: u32, count: usize) -> Result<String> {
    let stash_ref = format!("stash@{{{}}}", index);
    if index as usize >= count {
        return Err(GitMcpError::NotFound(format!(
            "{} does not exist ({} stash entries)",
            stash_ref, count
        )));
    }
    Ok(stash_ref)
}

fn list_stashes(ctx: &ToolContext, path: &Path) -> Result<Vec<GitStashEntry>> {
    let output = ctx
        .executor
        .execute_in_dir(path, &["stash", "list", "--format=%gd|%gs"])?;
    Ok(parse_stash_list(&output.stdout))
}

fn parse_stash_list(stdout: &str) -> Vec<GitStashEntry> {
    stdout
        .lines()
        .filter_map(|line| {
            let (stash_ref, subject) = line.split_once('|')?;
            let index = stash_ref
                .strip_prefix("stash@{")?
                .strip_suffix('}')?
                .parse()
                .ok()?;
            // "WIP on main: abc123 msg" or "On main: msg"
            let branch = subject
                .strip_prefix("WIP on ")
                .or_else(|| subject.strip_prefix("On "))
                .and_then(|rest| rest.split_once(':'))
                .map(|(branch, _)| branch.to_string());
            Some(GitStashEntry {
                index,
                stash_ref: stash_ref.to_string(),
                branch,
                message: subject.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitConfigInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: get, set, list")]
    pub mode: Option<String>,

    #[schemars(description = "Configuration key (e.g. user.name)")]
    pub key: Option<String>,

    #[schemars(description = "Value to set")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GitConfigEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitConfigOutput {
    pub success: bool,
    pub entries: Vec<GitConfigEntry>,
    pub message: String,
}

pub async fn git_config(ctx: ToolContext, input: GitConfigInput) -> Result<GitConfigOutput> {
    let path = ctx.resolve(&input.location).await?;

    match input.mode.as_deref().unwrap_or("list") {
        "get" => {
            let key = required(&input.key, "key", "get")?;
            // Exit status 1 means the key is unset.
            let output = ctx
                .executor
                .execute_in_dir_allowing(&path, &["config", "--local", "--get-all", key], &[1])?;
            if output.status == 1 {
                return Err(GitMcpError::NotFound(format!("config key {} is not set", key)));
            }
            Ok(GitConfigOutput {
                success: true,
                entries: output
                    .stdout
                    .lines()
                    .map(|value| GitConfigEntry {
                        key: key.to_string(),
                        value: value.to_string(),
                    })
                    .collect(),
                message: String::new(),
            })
        }
        "set" => {
            let key = required(&input.key, "key", "set")?;
            let value = input
                .value
                .as_deref()
                .ok_or_else(|| GitMcpError::InvalidInput("value is required for set".to_string()))?;
            ctx.executor
                .execute_in_dir(&path, &["config", "--local", key, value])?;
            Ok(GitConfigOutput {
                success: true,
                entries: vec![GitConfigEntry {
                    key: key.to_string(),
                    value: value.to_string(),
                }],
                message: format!("Set {}", key),
            })
        }
        "list" => {
            let output = ctx.executor.execute_in_dir(&path, &["config", "--local", "--list"])?;
            Ok(GitConfigOutput {
                success: true,
                entries: parse_config_list(&output.stdout),
                message: String::new(),
            })
        }
        other => Err(GitMcpError::InvalidInput(format!(
            "Unknown config operation: {}",
            other
        ))),
    }
}

fn parse_config_list(stdout: &str) -> Vec<GitConfigEntry> {
    stdout
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| GitConfigEntry {
            key: key.to_string(),
            value: value.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitLfsInput {
    #[serde(flatten)]
    pub location: RepoLocation,

    #[schemars(description = "Operation: install, track, untrack, list, fetch")]
    pub mode: String,

    #[schemars(description = "File patterns for track/untrack (e.g. \"*.psd\")")]
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitLfsOutput {
    pub success: bool,
    pub files: Vec<String>,
    pub message: String,
}

pub async fn git_lfs(ctx: ToolContext, input: GitLfsInput) -> Result<GitLfsOutput> {
    let path = ctx.resolve(&input.location).await?;

    let mut args = vec!["lfs"];
    match input.mode.as_str() {
        "install" => args.extend(["install", "--local"]),
        "track" | "untrack" => {
            if input.patterns.is_empty() {
                return Err(GitMcpError::InvalidInput(format!(
                    "patterns are required for {}",
                    input.mode
                )));
            }
            args.push(&input.mode);
            args.extend(input.patterns.iter().map(String::as_str));
        }
        "list" => args.extend(["ls-files", "--name-only"]),
        "fetch" => args.push("fetch"),
        other => {
            return Err(GitMcpError::InvalidInput(format!(
                "Unknown lfs operation: {}",
                other
            )))
        }
    }

    let output = ctx.executor.execute_in_dir(&path, &args)?;
    let files = if input.mode == "list" {
        output.lines().into_iter().map(str::to_string).collect()
    } else {
        vec![]
    };

    Ok(GitLfsOutput {
        success: true,
        files,
        message: output.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stash_entries_with_branch() {
        let out = "stash@{0}|On main: parked work\nstash@{1}|WIP on feature/x: 1a2b3c4 wip\n";
        let entries = parse_stash_list(out);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].branch.as_deref(), Some("main"));
        assert_eq!(entries[1].stash_ref, "stash@{1}");
        assert_eq!(entries[1].branch.as_deref(), Some("feature/x"));
    }

    #[test]
    fn stash_index_past_the_end_is_not_found() {
        assert_eq!(stash_ref_in_range(1, 2).unwrap(), "stash@{1}");

        let err = stash_ref_in_range(2, 2).unwrap_err();
        assert!(matches!(err, GitMcpError::NotFound(_)));
        assert!(err.to_string().contains("stash@{2}"));

        assert!(matches!(stash_ref_in_range(0, 0), Err(GitMcpError::NotFound(_))));
    }

    #[test]
    fn tag_lines() {
        let tag = parse_tag_line("v1.0|abc1234|Alice|Release 1.0").unwrap();
        assert_eq!(tag.name, "v1.0");
        assert_eq!(tag.tagger.as_deref(), Some("Alice"));
        assert_eq!(tag.message.as_deref(), Some("Release 1.0"));

        let light = parse_tag_line("v0.1|def5678||").unwrap();
        assert!(light.tagger.is_none());
        assert!(light.message.is_none());
    }

    #[test]
    fn config_list_keeps_equals_in_values() {
        let entries = parse_config_list("core.bare=false\nalias.lg=log --format=%h\n");
        assert_eq!(entries[1].key, "alias.lg");
        assert_eq!(entries[1].value, "log --format=%h");
    }
}
