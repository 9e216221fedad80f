use crate::error::{GitMcpError, Result};
use crate::search::{self, SearchQuery, SearchReport};
use crate::tools::ToolContext;
use path_clean::PathClean;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Entries whose name starts with this are version-control metadata.
const VCS_PREFIX: &str = ".git";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitDirectoryStructureInput {
    #[schemars(description = "URL of the repository")]
    pub repo_url: String,
}

pub async fn git_directory_structure(
    ctx: ToolContext,
    input: GitDirectoryStructureInput,
) -> Result<String> {
    let path = ctx.cache.acquire(&input.repo_url).await?;
    render_tree(&path)
}

/// Render the working copy below `root` as an ASCII tree, one entry per line.
pub fn render_tree(root: &Path) -> Result<String> {
    let mut out = String::new();
    write_entries(root, "", &mut out)?;
    Ok(out.trim_end().to_string())
}

fn write_entries(dir: &Path, prefix: &str, out: &mut String) -> Result<()> {
    let mut entries: Vec<(String, bool, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(VCS_PREFIX) {
                return None;
            }
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            Some((name, is_dir, entry.path()))
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let count = entries.len();
    for (i, (name, is_dir, path)) in entries.into_iter().enumerate() {
        let last = i + 1 == count;
        out.push_str(prefix);
        out.push_str(if last { "`-- " } else { "|-- " });
        out.push_str(&name);
        if is_dir {
            out.push('/');
        }
        out.push('\n');

        if is_dir {
            let child_prefix = format!("{}{}", prefix, if last { "    " } else { "|   " });
            write_entries(&path, &child_prefix, out)?;
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitReadFilesInput {
    #[schemars(description = "URL of the repository")]
    pub repo_url: String,

    #[schemars(description = "Paths of the files to read, relative to the repository root")]
    pub file_paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitReadFilesOutput {
    /// File contents keyed by requested path; unreadable files map to an error message.
    pub files: BTreeMap<String, String>,
}

pub async fn git_read_files(ctx: ToolContext, input: GitReadFilesInput) -> Result<GitReadFilesOutput> {
    let root = ctx.cache.acquire(&input.repo_url).await?;

    let files = input
        .file_paths
        .iter()
        .map(|rel| {
            let content = read_file_in(&root, rel).unwrap_or_else(|e| format!("Error: {}", e));
            (rel.clone(), content)
        })
        .collect();

    Ok(GitReadFilesOutput { files })
}

fn read_file_in(root: &Path, rel: &str) -> std::result::Result<String, String> {
    let root = root.clean();
    let candidate = root.join(rel).clean();
    if !candidate.starts_with(&root) {
        return Err(format!("{} is outside the repository", rel));
    }

    let canonical_root = root.canonicalize().map_err(|e| e.to_string())?;
    let canonical = candidate
        .canonicalize()
        .map_err(|e| format!("could not read {}: {}", rel, e))?;
    if !canonical.starts_with(&canonical_root) {
        return Err(format!("{} resolves outside the repository", rel));
    }

    std::fs::read_to_string(&canonical).map_err(|e| format!("could not read {}: {}", rel, e))
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GitSearchCodeInput {
    #[schemars(description = "URL of the repository")]
    pub repo_url: String,

    #[schemars(description = "Extended regular expression to search for")]
    pub pattern: String,

    #[schemars(description = "Glob patterns limiting which files are searched (e.g. \"*.rs\")")]
    pub file_patterns: Option<Vec<String>>,

    #[schemars(description = "Match case exactly (default: false)")]
    pub case_sensitive: Option<bool>,

    #[schemars(description = "Lines of context around each match (default: 2)")]
    pub context_lines: Option<u32>,
}

pub async fn git_search_code(ctx: ToolContext, input: GitSearchCodeInput) -> Result<SearchReport> {
    if input.pattern.is_empty() {
        return Err(GitMcpError::InvalidInput(
            "pattern must not be empty".to_string(),
        ));
    }

    let path = ctx.cache.acquire(&input.repo_url).await?;

    let query = SearchQuery {
        pattern: input.pattern,
        case_sensitive: input.case_sensitive.unwrap_or(false),
        context_lines: input.context_lines.unwrap_or(2),
        file_patterns: input.file_patterns.unwrap_or_default(),
    };

    let context = query.context_lines.to_string();
    let mut args = vec![
        "grep",
        "-n",
        "--null",
        "-I",
        "-E",
        "--no-color",
        "-C",
        context.as_str(),
    ];
    if !query.case_sensitive {
        args.push("-i");
    }
    args.push("-e");
    args.push(&query.pattern);
    if !query.file_patterns.is_empty() {
        args.push("--");
        args.extend(query.file_patterns.iter().map(String::as_str));
    }

    let output = ctx.executor.execute_in_dir_allowing(&path, &args, &[1])?;
    let raw = if output.status == 1 { "" } else { output.stdout.as_str() };

    Ok(search::structure_output(raw, query))
}
