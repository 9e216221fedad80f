use crate::config::Config;
use crate::error::{GitMcpError, Result};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

pub struct GitExecutor {
    config: Arc<Config>,
}

impl GitExecutor {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    fn build_command(&self, dir: &Path, args: &[&str]) -> Result<Command> {
        let validated = self.config.validate_path(dir)?;

        let mut cmd = Command::new("git");
        cmd.args(args).current_dir(validated);

        if let Some(name) = &self.config.git_username {
            cmd.env("GIT_AUTHOR_NAME", name);
            cmd.env("GIT_COMMITTER_NAME", name);
        }

        if let Some(email) = &self.config.git_email {
            cmd.env("GIT_AUTHOR_EMAIL", email);
            cmd.env("GIT_COMMITTER_EMAIL", email);
        }

        cmd.env("GIT_TERMINAL_PROMPT", "0");

        Ok(cmd)
    }

    /// Run `git <args>` inside `dir`, failing on any non-zero exit status.
    pub fn execute_in_dir(&self, dir: &Path, args: &[&str]) -> Result<GitOutput> {
        self.execute_in_dir_allowing(dir, args, &[])
    }

    /// Like [`execute_in_dir`](Self::execute_in_dir), but the listed exit
    /// codes are reported as output instead of errors (`git grep` exits 1
    /// when nothing matched).
    pub fn execute_in_dir_allowing(
        &self,
        dir: &Path,
        args: &[&str],
        allowed_status: &[i32],
    ) -> Result<GitOutput> {
        let mut cmd = self.build_command(dir, args)?;
        tracing::debug!("git {} (in {})", args.join(" "), dir.display());

        let output = cmd
            .output()
            .map_err(|e| GitMcpError::GitCommandFailed(format!("Failed to execute git: {}", e)))?;

        into_git_output(output, allowed_status)
    }
}

fn into_git_output(output: Output, allowed_status: &[i32]) -> Result<GitOutput> {
    let status = output.status.code().unwrap_or(-1);
    let stdout = output_to_string(output.stdout);
    let stderr = output_to_string(output.stderr);

    if !output.status.success() && !allowed_status.contains(&status) {
        return Err(GitMcpError::GitCommandFailed(format!(
            "Git command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(GitOutput {
        stdout,
        stderr,
        status,
    })
}

fn output_to_string(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(&e.into_bytes()).into_owned(),
    }
}

#[derive(Debug, Clone)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl GitOutput {
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }

    pub fn trim(&self) -> &str {
        self.stdout.trim()
    }
}
