//! Git version detection and capability gating.
//!
//! The only capability tracked today is `--no-optional-locks`, which
//! git grew in 2.15. The probe is memoized so a process issues
//! `git --version` at most once no matter how many status calls it
//! makes.

use std::process::Command;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use super::GitError;

/// First git release that understands `--no-optional-locks`.
const NO_OPTIONAL_LOCKS_SINCE: GitVersion = GitVersion {
    major: 2,
    minor: 15,
    patch: 0,
};

/// A `<major>.<minor>.<patch>` git version triple.
///
/// The derived ordering compares fields in declaration order, which is
/// version order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct GitVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl GitVersion {
    /// Probe the installed git binary via `git --version`.
    ///
    /// Runs the executable on every call; cached checks go through
    /// [`GitCaps`].
    pub fn detect() -> Result<GitVersion, GitError> {
        let output = Command::new("git")
            .arg("--version")
            .output()
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed(stderr.to_string()));
        }

        String::from_utf8_lossy(&output.stdout).parse()
    }
}

impl FromStr for GitVersion {
    type Err = GitError;

    /// Accepts the binary's `git version 2.39.2` banner (including
    /// vendor suffixes like `(Apple Git-154)`) or a bare `2.39.2`.
    fn from_str(s: &str) -> Result<Self, GitError> {
        static TRIPLE: OnceLock<Regex> = OnceLock::new();
        let triple = TRIPLE.get_or_init(|| Regex::new(r"(\d+)\.(\d+)\.(\d+)").unwrap());

        let caps = triple
            .captures(s)
            .ok_or_else(|| GitError::ParseError(format!("no version triple in {s:?}")))?;

        let part = |i: usize| {
            caps[i]
                .parse()
                .map_err(|_| GitError::ParseError(format!("version component out of range in {s:?}")))
        };

        Ok(GitVersion {
            major: part(1)?,
            minor: part(2)?,
            patch: part(3)?,
        })
    }
}

impl std::fmt::Display for GitVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Memoized capability probe.
///
/// Lazy and at-most-once per instance; racing callers converge on the
/// first stored value, and the probe is idempotent for a fixed
/// environment. Held in a struct rather than a free static so tests
/// construct their own instance and never leak state into each other.
/// [`caps`] is the process-wide default instance.
#[derive(Debug, Default)]
pub struct GitCaps {
    no_optional_locks: OnceLock<bool>,
}

impl GitCaps {
    pub const fn new() -> Self {
        GitCaps {
            no_optional_locks: OnceLock::new(),
        }
    }

    /// Whether status invocations may pass `--no-optional-locks`.
    ///
    /// `probe` runs at most once for the lifetime of this value; a
    /// failed probe pins the capability off.
    pub fn no_optional_locks<F>(&self, probe: F) -> bool
    where
        F: FnOnce() -> Result<GitVersion, GitError>,
    {
        *self.no_optional_locks.get_or_init(|| match probe() {
            Ok(version) => version >= NO_OPTIONAL_LOCKS_SINCE,
            Err(e) => {
                log::warn!("git version probe failed, not using --no-optional-locks: {e}");
                false
            }
        })
    }
}

/// Process-wide capability cache used by [`Repository`](super::Repository).
pub fn caps() -> &'static GitCaps {
    static CAPS: GitCaps = GitCaps::new();
    &CAPS
}
