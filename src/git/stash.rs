//! Stash command wrappers.
//!
//! Thin argument builders over [`Repository::run_command`]; the only
//! parsing here is the list format.

use super::{GitError, Repository};

/// One stash, as reported by `git stash list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    /// Position in the stash stack (`stash@{N}`).
    pub index: usize,
    /// The stash subject, e.g. `WIP on main: 1a2b3c fix the thing`.
    pub summary: String,
}

/// `stash@{N}<TAB><subject>`, one line per stash.
const STASH_LIST_FORMAT: &str = "--format=%gd%x09%gs";

impl Repository {
    /// `git stash push [--include-untracked] [--message <m>]`
    pub fn stash_push(
        &self,
        message: Option<&str>,
        include_untracked: bool,
    ) -> Result<(), GitError> {
        let mut args = vec!["stash", "push"];
        if include_untracked {
            args.push("--include-untracked");
        }
        if let Some(message) = message {
            args.extend(["--message", message]);
        }
        self.run_command(&args)?;
        Ok(())
    }

    /// `git stash pop <n>`
    pub fn stash_pop(&self, index: usize) -> Result<(), GitError> {
        let index = index.to_string();
        self.run_command(&["stash", "pop", &index])?;
        Ok(())
    }

    /// `git stash drop <n>`
    pub fn stash_drop(&self, index: usize) -> Result<(), GitError> {
        let index = index.to_string();
        self.run_command(&["stash", "drop", &index])?;
        Ok(())
    }

    /// List stashes, newest first.
    pub fn stash_list(&self) -> Result<Vec<StashEntry>, GitError> {
        let stdout = self.run_command(&["stash", "list", STASH_LIST_FORMAT])?;
        Ok(parse_stash_list(&stdout))
    }
}

/// Parse [`STASH_LIST_FORMAT`] output. Lines that don't match the
/// format are skipped, in line with the status parser's tolerance.
fn parse_stash_list(output: &str) -> Vec<StashEntry> {
    output
        .lines()
        .filter_map(|line| {
            let (selector, summary) = line.split_once('\t')?;
            let index = selector
                .strip_prefix("stash@{")?
                .strip_suffix('}')?
                .parse()
                .ok()?;
            Some(StashEntry {
                index,
                summary: summary.to_string(),
            })
        })
        .collect()
}
