//! Structuring of line-numbered, context-annotated search output.
//!
//! Input lines look like `file:12:text` for matches and `file-13-text` for
//! context, as printed by `git grep -n -C <n>`. When the file name is
//! terminated by NUL instead (`git grep --null`), the name is taken verbatim
//! and only the separator after the line number decides the kind. Lines that
//! fit neither shape (blank lines, `--` hunk separators, binary-file notices)
//! are dropped.

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

static MATCH_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([^:\x00]+):(\d+):(.*)$").expect("valid match-line regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ContextLine {
    pub line_number: u32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchMatch {
    pub file: String,
    pub line_number: u32,
    pub content: String,
    pub context_before: Vec<ContextLine>,
    pub context_after: Vec<ContextLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchFileResult {
    pub file: String,
    pub matches: Vec<SearchMatch>,
}

/// The query a search was run with, echoed back in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchQuery {
    pub pattern: String,
    pub case_sensitive: bool,
    pub context_lines: u32,
    pub file_patterns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchReport {
    pub pattern: String,
    pub case_sensitive: bool,
    pub context_lines: u32,
    pub file_patterns: Vec<String>,
    pub results: Vec<SearchFileResult>,
    pub total_matches: usize,
    pub total_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Match,
    Context,
}

impl LineKind {
    fn from_separator(c: char) -> Option<Self> {
        match c {
            ':' => Some(LineKind::Match),
            '-' => Some(LineKind::Context),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
struct RawLine<'a> {
    file: &'a str,
    kind: LineKind,
    line_number: u32,
    content: &'a str,
}

/// Build the full report for `raw` search output.
pub fn structure_output(raw: &str, query: SearchQuery) -> SearchReport {
    let results = parse_results(raw);
    let total_matches = results.iter().map(|r| r.matches.len()).sum();
    let total_files = results.len();

    SearchReport {
        pattern: query.pattern,
        case_sensitive: query.case_sensitive,
        context_lines: query.context_lines,
        file_patterns: query.file_patterns,
        results,
        total_matches,
        total_files,
    }
}

/// Group raw output lines into per-file match records.
pub fn parse_results(raw: &str) -> Vec<SearchFileResult> {
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();

    // Files that own at least one match line. A context line is split at the
    // `-N-` whose prefix names one of these.
    let match_files: HashSet<&str> = lines
        .iter()
        .copied()
        .filter_map(|line| match null_separated(line) {
            Some(parsed) => parsed.filter(|p| p.kind == LineKind::Match),
            None => match_line(line),
        })
        .map(|p| p.file)
        .collect();

    let mut results = Vec::new();
    let mut section: Option<Section> = None;

    for line in lines {
        let current_file = section.as_ref().map(|s| s.file.as_str());
        let Some(parsed) = classify(line, current_file, &match_files) else {
            continue;
        };

        if current_file != Some(parsed.file) {
            if let Some(done) = section.take() {
                results.extend(done.finish());
            }
            section = Some(Section::new(parsed.file));
        }

        if let Some(s) = section.as_mut() {
            s.push(parsed);
        }
    }

    if let Some(done) = section {
        results.extend(done.finish());
    }

    results
}

struct Section {
    file: String,
    matches: Vec<SearchMatch>,
    pending: Option<SearchMatch>,
    buffer: Vec<ContextLine>,
}

impl Section {
    fn new(file: &str) -> Self {
        Self {
            file: file.to_string(),
            matches: Vec::new(),
            pending: None,
            buffer: Vec::new(),
        }
    }

    fn push(&mut self, line: RawLine<'_>) {
        match line.kind {
            LineKind::Match => {
                if let Some(mut prev) = self.pending.take() {
                    prev.context_after = std::mem::take(&mut self.buffer);
                    self.matches.push(prev);
                }
                self.pending = Some(SearchMatch {
                    file: self.file.clone(),
                    line_number: line.line_number,
                    content: line.content.to_string(),
                    context_before: std::mem::take(&mut self.buffer),
                    context_after: Vec::new(),
                });
            }
            LineKind::Context => self.buffer.push(ContextLine {
                line_number: line.line_number,
                content: line.content.to_string(),
            }),
        }
    }

    /// Sections without a single match produce nothing.
    fn finish(mut self) -> Option<SearchFileResult> {
        if let Some(mut last) = self.pending.take() {
            last.context_after = std::mem::take(&mut self.buffer);
            self.matches.push(last);
        }

        if self.matches.is_empty() {
            return None;
        }

        Some(SearchFileResult {
            file: self.file,
            matches: self.matches,
        })
    }
}

fn classify<'a>(
    line: &'a str,
    current_file: Option<&str>,
    match_files: &HashSet<&str>,
) -> Option<RawLine<'a>> {
    if let Some(parsed) = null_separated(line) {
        return parsed;
    }

    let mut candidates = context_splits(line);
    let preferred = candidates
        .iter()
        .rposition(|c| Some(c.file) == current_file)
        .or_else(|| candidates.iter().rposition(|c| match_files.contains(c.file)));

    match (match_line(line), preferred) {
        // `a.rs-3-at 10:30` is context of `a.rs`, not a match in `a.rs-3-at 10`.
        (Some(m), Some(i)) if candidates[i].file != m.file => Some(candidates.swap_remove(i)),
        (Some(m), _) => Some(m),
        (None, Some(i)) => Some(candidates.swap_remove(i)),
        (None, None) if !candidates.is_empty() => Some(candidates.swap_remove(0)),
        (None, None) => None,
    }
}

/// `Some(..)` when the line carries a NUL-terminated file name.
fn null_separated(line: &str) -> Option<Option<RawLine<'_>>> {
    let (file, rest) = line.split_once('\0')?;
    if file.is_empty() {
        return Some(None);
    }
    Some(numbered(file, rest))
}

/// Parse `<digits><sep><content>` following a known file name.
fn numbered<'a>(file: &'a str, rest: &'a str) -> Option<RawLine<'a>> {
    let digits = rest.find(|c: char| !c.is_ascii_digit())?;
    if digits == 0 {
        return None;
    }
    let kind = LineKind::from_separator(rest[digits..].chars().next()?)?;
    Some(RawLine {
        file,
        kind,
        line_number: rest[..digits].parse().ok()?,
        content: &rest[digits + 1..],
    })
}

fn match_line(line: &str) -> Option<RawLine<'_>> {
    let caps = MATCH_LINE.captures(line)?;
    let file = caps.get(1)?;
    let number = caps.get(2)?;
    let content = caps.get(3)?;
    Some(RawLine {
        file: &line[file.range()],
        kind: LineKind::Match,
        line_number: number.as_str().parse().ok()?,
        content: &line[content.range()],
    })
}

/// Every way to read `line` as `<file>-<digits>-<content>`, shortest file first.
fn context_splits(line: &str) -> Vec<RawLine<'_>> {
    line.match_indices('-')
        .filter(|(i, _)| *i > 0)
        .filter_map(|(i, _)| {
            numbered(&line[..i], &line[i + 1..]).filter(|p| p.kind == LineKind::Context)
        })
        .collect()
}
