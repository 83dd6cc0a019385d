//! Git process invocation and repository context.
//!
//! Everything here shells out to the external `git` executable; nothing
//! links libgit2. Interpretation of the status output lives in
//! [`status`], which is pure and never spawns a process.

use std::path::{Path, PathBuf};
use std::process::Command;

pub mod stash;
pub mod status;
pub mod version;

/// Errors surfaced by git invocation and output parsing.
#[derive(Debug)]
pub enum GitError {
    /// git could not be spawned, or exited non-zero; payload is stderr
    /// (or the spawn error).
    CommandFailed(String),
    /// Output did not have the expected shape.
    ParseError(String),
    /// A status entry carried a two-character code matching no known
    /// classification branch. Means the classification table is out of
    /// date with the git version in use, not a normal runtime
    /// condition.
    UnhandledStatusCode([char; 2]),
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed(msg) => write!(f, "git command failed: {}", msg.trim_end()),
            GitError::ParseError(msg) => write!(f, "failed to parse git output: {}", msg),
            GitError::UnhandledStatusCode([index, worktree]) => {
                write!(f, "unhandled status code '{}{}'", index, worktree)
            }
        }
    }
}

impl std::error::Error for GitError {}

/// Repository context for git operations.
///
/// Encapsulates the working directory that all commands run in.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Create a repository context at the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create a repository context for the current directory.
    pub fn current() -> Self {
        Self::at(".")
    }

    /// Get the path this repository context operates on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the working tree has uncommitted changes.
    pub fn is_dirty(&self) -> Result<bool, GitError> {
        Ok(!self.status(None)?.files.is_empty())
    }

    /// Reset the current branch to `target`.
    pub fn reset(&self, mode: ResetMode, target: &str) -> Result<(), GitError> {
        self.run_command(&["reset", mode.as_flag(), target])?;
        Ok(())
    }

    /// Run a git command in this repository's context and return its
    /// stdout.
    pub fn run_command(&self, args: &[&str]) -> Result<String, GitError> {
        log::debug!("git {:?} in {}", args, self.path.display());

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.path)
            .output()
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Reset behavior for [`Repository::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum ResetMode {
    /// Move the branch tip only.
    Soft,
    /// Also reset the index.
    Mixed,
    /// Also reset the working tree.
    Hard,
}

impl ResetMode {
    fn as_flag(self) -> &'static str {
        match self {
            ResetMode::Soft => "--soft",
            ResetMode::Mixed => "--mixed",
            ResetMode::Hard => "--hard",
        }
    }
}
