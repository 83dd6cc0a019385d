//! Working tree status: output model and porcelain v2 interpretation.
//!
//! [`parse_status`] turns a raw `--porcelain=2 -z` stream into a
//! [`RepoStatus`]; [`Repository::status`] obtains the stream from the
//! external executable and feeds it through. Interpretation is a pure
//! function of its input, so concurrent status calls never interfere.

mod parse;

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use self::parse::{EntryKind, StatusEntry, StatusLine, parse_porcelain};
use super::{GitError, Repository, version};

/// Output-facing status of a single change record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FileStatus {
    New,
    Modified,
    Deleted,
    Copied,
    Renamed,
    Conflicted,
}

/// One staged or unstaged view of a changed path.
///
/// An entry changed on both sides yields two records for the same
/// path, one staged and one not; consumers rely on seeing both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    /// Original path, on rename/copy records only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_path: Option<String>,
    pub staged: bool,
}

/// Commits the current branch leads/trails its upstream by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AheadBehind {
    pub ahead: u32,
    pub behind: u32,
}

/// Branch metadata and the ordered change list for one status call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
pub struct RepoStatus {
    /// Current branch name; unset on a detached HEAD.
    pub branch: Option<String>,
    /// Commit id of HEAD; unset before the first commit.
    pub tip: Option<String>,
    /// Configured upstream branch, if any.
    pub upstream: Option<String>,
    pub ahead_behind: Option<AheadBehind>,
    /// First-seen order from the raw stream.
    pub files: Vec<FileChange>,
    /// True when the entry limit cut the stream short.
    pub truncated: bool,
}

impl Repository {
    /// Working tree and index state, via the external executable.
    ///
    /// `limit` bounds the number of status entries interpreted; `None`
    /// is unbounded. The result's `truncated` flag reports whether the
    /// limit cut anything off.
    pub fn status(&self, limit: Option<usize>) -> Result<RepoStatus, GitError> {
        let mut args: Vec<&str> = Vec::new();
        // Keeps status from touching the index lock; gated on git
        // >= 2.15, probed once per process.
        if version::caps().no_optional_locks(version::GitVersion::detect) {
            args.push("--no-optional-locks");
        }
        args.extend([
            "status",
            "--untracked-files=all",
            "--branch",
            "--porcelain=2",
            "-z",
        ]);

        let stdout = self.run_command(&args)?;
        parse_status(&stdout, limit)
    }
}

/// Interpret a raw `--porcelain=2 -z` stream.
///
/// All-or-nothing: either the full [`RepoStatus`] or the
/// [`GitError::UnhandledStatusCode`] contract violation. Other
/// irregularities (unknown record kinds or headers, unparseable
/// ahead/behind counts) degrade silently.
pub fn parse_status(raw: &str, limit: Option<usize>) -> Result<RepoStatus, GitError> {
    let (lines, truncated) = parse_porcelain(raw, limit);
    let mut status = RepoStatus {
        truncated,
        ..Default::default()
    };
    let mut seen_paths: HashSet<String> = HashSet::new();

    for line in &lines {
        match line {
            StatusLine::Header(value) => apply_header(&mut status, value),
            StatusLine::Entry(entry) => {
                let Some(classified) = classify(entry)? else {
                    continue;
                };
                push_changes(&mut status.files, &mut seen_paths, entry, classified.into());
            }
        }
    }

    Ok(status)
}

fn apply_header(status: &mut RepoStatus, value: &str) {
    static OID: OnceLock<Regex> = OnceLock::new();
    static HEAD: OnceLock<Regex> = OnceLock::new();
    static UPSTREAM: OnceLock<Regex> = OnceLock::new();
    static AHEAD_BEHIND: OnceLock<Regex> = OnceLock::new();

    let oid = OID.get_or_init(|| Regex::new(r"^branch\.oid ([a-f0-9]+)$").unwrap());
    let head = HEAD.get_or_init(|| Regex::new(r"^branch\.head (.*)$").unwrap());
    let upstream = UPSTREAM.get_or_init(|| Regex::new(r"^branch\.upstream (.*)$").unwrap());
    let ahead_behind =
        AHEAD_BEHIND.get_or_init(|| Regex::new(r"^branch\.ab \+(\d+) -(\d+)$").unwrap());

    if let Some(caps) = oid.captures(value) {
        status.tip = Some(caps[1].to_string());
    } else if let Some(caps) = head.captures(value) {
        if &caps[1] != "(detached)" {
            status.branch = Some(caps[1].to_string());
        }
    } else if let Some(caps) = upstream.captures(value) {
        status.upstream = Some(caps[1].to_string());
    } else if let Some(caps) = ahead_behind.captures(value) {
        // \d+ can still overflow the counter type.
        if let (Ok(ahead), Ok(behind)) = (caps[1].parse(), caps[2].parse()) {
            status.ahead_behind = Some(AheadBehind { ahead, behind });
        }
    }
    // Unknown headers are ignored.
}

/// Semantic classification of an entry, before the output mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryStatus {
    Ordinary(ChangeType),
    Copied,
    Renamed,
    Conflicted,
    Untracked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl From<EntryStatus> for FileStatus {
    fn from(status: EntryStatus) -> Self {
        match status {
            EntryStatus::Ordinary(ChangeType::Added) => FileStatus::New,
            EntryStatus::Ordinary(ChangeType::Modified) => FileStatus::Modified,
            EntryStatus::Ordinary(ChangeType::Deleted) => FileStatus::Deleted,
            EntryStatus::Copied => FileStatus::Copied,
            EntryStatus::Renamed => FileStatus::Renamed,
            EntryStatus::Conflicted => FileStatus::Conflicted,
            EntryStatus::Untracked => FileStatus::New,
        }
    }
}

/// Classify an entry's two-character code.
///
/// Total over the known code space. `Ok(None)` is the added-then-
/// worktree-deleted case, which produces no record: the file never
/// reached a commit and no longer exists. The error branch means the
/// classification table is out of date with git's format.
fn classify(entry: &StatusEntry) -> Result<Option<EntryStatus>, GitError> {
    let [index, worktree] = entry.code;

    let status = match entry.kind {
        EntryKind::Untracked | EntryKind::Ignored => EntryStatus::Untracked,
        EntryKind::Unmerged => EntryStatus::Conflicted,
        EntryKind::RenameOrCopy => {
            if index == 'C' || worktree == 'C' {
                EntryStatus::Copied
            } else if index == 'R' || worktree == 'R' {
                EntryStatus::Renamed
            } else {
                return Err(GitError::UnhandledStatusCode(entry.code));
            }
        }
        EntryKind::Ordinary => match (index, worktree) {
            ('A', 'D') => return Ok(None),
            (x, y) if x == 'A' || y == 'A' => EntryStatus::Ordinary(ChangeType::Added),
            (x, y) if x == 'D' || y == 'D' => EntryStatus::Ordinary(ChangeType::Deleted),
            (x, y) if x == 'M' || y == 'M' => EntryStatus::Ordinary(ChangeType::Modified),
            _ => return Err(GitError::UnhandledStatusCode(entry.code)),
        },
    };

    Ok(Some(status))
}

/// Emit the staged/unstaged records for one classified entry.
fn push_changes(
    files: &mut Vec<FileChange>,
    seen_paths: &mut HashSet<String>,
    entry: &StatusEntry,
    status: FileStatus,
) {
    // A staged deletion can coexist with an unrelated untracked file
    // now occupying the same path; the untracked view wins. Only the
    // first earlier record for the path is displaced.
    if entry.kind == EntryKind::Untracked
        && seen_paths.contains(&entry.path)
        && let Some(pos) = files.iter().position(|f| f.path == entry.path)
    {
        files.remove(pos);
    }

    let change = |staged: bool| FileChange {
        path: entry.path.clone(),
        status,
        old_path: entry.old_path.clone(),
        staged,
    };

    let staged = matches!(entry.code[0], 'M' | 'A' | 'D' | 'U' | 'R' | 'C');
    let unstaged = matches!(entry.code[1], 'M' | 'A' | 'D' | 'U');

    if staged {
        files.push(change(true));
    }
    if unstaged {
        files.push(change(false));
    }
    if !staged && !unstaged {
        // Untracked/ignored singletons.
        files.push(change(false));
    }

    seen_paths.insert(entry.path.clone());
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const OID: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    fn ordinary(code: &str, path: &str) -> String {
        format!("1 {code} N... 100644 100644 100644 {OID} {OID} {path}")
    }

    fn stream(tokens: &[&str]) -> String {
        let mut s = tokens.join("\0");
        s.push('\0');
        s
    }

    fn files_for<'a>(status: &'a RepoStatus, path: &str) -> Vec<&'a FileChange> {
        status.files.iter().filter(|f| f.path == path).collect()
    }

    #[test]
    fn empty_stream_is_a_default_status() {
        assert_eq!(parse_status("", None).unwrap(), RepoStatus::default());
    }

    #[test]
    fn branch_headers_populate_metadata() {
        let raw = stream(&[
            "# branch.oid abc123",
            "# branch.head main",
            "# branch.upstream origin/main",
            "# branch.ab +2 -1",
        ]);
        let status = parse_status(&raw, None).unwrap();

        assert_eq!(status.tip.as_deref(), Some("abc123"));
        assert_eq!(status.branch.as_deref(), Some("main"));
        assert_eq!(status.upstream.as_deref(), Some("origin/main"));
        assert_eq!(status.ahead_behind, Some(AheadBehind { ahead: 2, behind: 1 }));
        assert!(status.files.is_empty());
    }

    #[test]
    fn detached_head_leaves_branch_unset() {
        let raw = stream(&["# branch.oid abc123", "# branch.head (detached)"]);
        let status = parse_status(&raw, None).unwrap();
        assert_eq!(status.branch, None);
        assert_eq!(status.tip.as_deref(), Some("abc123"));
    }

    #[test]
    fn initial_oid_header_is_ignored() {
        // Before the first commit git prints `branch.oid (initial)`,
        // which the hex pattern rejects.
        let raw = stream(&["# branch.oid (initial)", "# branch.head main"]);
        let status = parse_status(&raw, None).unwrap();
        assert_eq!(status.tip, None);
        assert_eq!(status.branch.as_deref(), Some("main"));
    }

    #[test]
    fn unparseable_ahead_behind_is_left_unset() {
        let raw = stream(&["# branch.ab +99999999999999999999 -1"]);
        assert_eq!(parse_status(&raw, None).unwrap().ahead_behind, None);
    }

    #[test]
    fn unknown_headers_are_ignored() {
        let raw = stream(&["# stash 3", "# branch.head main"]);
        let status = parse_status(&raw, None).unwrap();
        assert_eq!(status.branch.as_deref(), Some("main"));
    }

    #[rstest]
    #[case::staged_modify("M.", FileStatus::Modified, &[true])]
    #[case::unstaged_modify(".M", FileStatus::Modified, &[false])]
    #[case::both_modify("MM", FileStatus::Modified, &[true, false])]
    #[case::staged_add("A.", FileStatus::New, &[true])]
    #[case::intent_to_add(".A", FileStatus::New, &[false])]
    #[case::added_then_modified("AM", FileStatus::New, &[true, false])]
    #[case::staged_delete("D.", FileStatus::Deleted, &[true])]
    #[case::unstaged_delete(".D", FileStatus::Deleted, &[false])]
    #[case::modified_then_deleted("MD", FileStatus::Deleted, &[true, false])]
    fn ordinary_codes_classify_and_split(
        #[case] code: &str,
        #[case] expected: FileStatus,
        #[case] staged_flags: &[bool],
    ) {
        let raw = stream(&[&ordinary(code, "file.txt")]);
        let status = parse_status(&raw, None).unwrap();

        let flags: Vec<bool> = status.files.iter().map(|f| f.staged).collect();
        assert_eq!(flags, staged_flags, "staged flags for {code}");
        assert!(
            status.files.iter().all(|f| f.status == expected),
            "status for {code}"
        );
    }

    #[test]
    fn both_sides_modified_yields_staged_and_unstaged_pair() {
        let raw = stream(&[&ordinary("MM", "a.txt")]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "a.txt");
        assert_eq!(changes.len(), 2);
        assert!(changes[0].staged);
        assert!(!changes[1].staged);
        assert!(changes.iter().all(|f| f.status == FileStatus::Modified));
    }

    #[test]
    fn added_then_worktree_deleted_yields_nothing() {
        let raw = stream(&[&ordinary("AD", "ghost.txt"), &ordinary(".M", "kept.txt")]);
        let status = parse_status(&raw, None).unwrap();

        assert!(files_for(&status, "ghost.txt").is_empty());
        assert_eq!(files_for(&status, "kept.txt").len(), 1);
    }

    #[test]
    fn rename_populates_old_path() {
        let rename = format!("2 R. N... 100644 100644 100644 {OID} {OID} R100 new.rs");
        let raw = stream(&[&rename, "old.rs"]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "new.rs");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, FileStatus::Renamed);
        assert_eq!(changes[0].old_path.as_deref(), Some("old.rs"));
        assert!(changes[0].staged);
    }

    #[test]
    fn worktree_rename_is_a_single_unstaged_record() {
        let rename = format!("2 .R N... 100644 100644 100644 {OID} {OID} R100 new.rs");
        let raw = stream(&[&rename, "old.rs"]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "new.rs");
        assert_eq!(changes.len(), 1);
        assert!(!changes[0].staged);
        assert_eq!(changes[0].status, FileStatus::Renamed);
    }

    #[test]
    fn copy_classifies_as_copied() {
        let copy = format!("2 C. N... 100644 100644 100644 {OID} {OID} C90 copy.rs");
        let raw = stream(&[&copy, "original.rs"]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "copy.rs");
        assert_eq!(changes[0].status, FileStatus::Copied);
        assert_eq!(changes[0].old_path.as_deref(), Some("original.rs"));
    }

    #[test]
    fn ordinary_record_leaves_old_path_unset() {
        let raw = stream(&[&ordinary("MM", "plain.rs")]);
        let status = parse_status(&raw, None).unwrap();
        assert!(status.files.iter().all(|f| f.old_path.is_none()));
    }

    #[test]
    fn unmerged_yields_conflicted_views() {
        let raw = stream(&[&format!(
            "u UU N... 100644 100644 100644 100644 {OID} {OID} {OID} clash.rs"
        )]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "clash.rs");
        assert_eq!(changes.len(), 2);
        assert!(changes.iter().all(|f| f.status == FileStatus::Conflicted));
        assert!(changes[0].staged);
        assert!(!changes[1].staged);
    }

    #[test]
    fn untracked_maps_to_new_and_unstaged() {
        let raw = stream(&["? fresh.txt"]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "fresh.txt");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, FileStatus::New);
        assert!(!changes[0].staged);
    }

    #[test]
    fn untracked_displaces_staged_deletion_at_same_path() {
        // A deletion staged for a path, with an unrelated untracked
        // file now occupying that path.
        let raw = stream(&[&ordinary("D.", "swapped.txt"), "? swapped.txt"]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "swapped.txt");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].status, FileStatus::New);
        assert!(!changes[0].staged);
    }

    #[test]
    fn untracked_collision_removes_only_the_first_prior_record() {
        // With a staged+unstaged pair already emitted for the path,
        // only the first of the pair is displaced. Pins the historical
        // behavior, odd as it is.
        let raw = stream(&[&ordinary("MM", "twice.txt"), "? twice.txt"]);
        let status = parse_status(&raw, None).unwrap();

        let changes = files_for(&status, "twice.txt");
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].status, FileStatus::Modified);
        assert!(!changes[0].staged);
        assert_eq!(changes[1].status, FileStatus::New);
        assert!(!changes[1].staged);
    }

    #[rstest]
    #[case::typechange(".T")]
    #[case::unknown_pair("XZ")]
    fn unhandled_ordinary_code_is_a_contract_violation(#[case] code: &str) {
        let raw = stream(&[&ordinary(code, "odd.txt")]);
        let err = parse_status(&raw, None).unwrap_err();
        assert!(matches!(err, GitError::UnhandledStatusCode(_)), "{err}");
    }

    #[test]
    fn truncation_passes_through() {
        let raw = stream(&[
            &ordinary("MM", "a.txt"),
            &ordinary(".M", "b.txt"),
            &ordinary(".M", "c.txt"),
        ]);

        let status = parse_status(&raw, Some(1)).unwrap();
        // One entry's worth of records: the staged+unstaged pair.
        assert_eq!(status.files.len(), 2);
        assert!(status.files.iter().all(|f| f.path == "a.txt"));
        assert!(status.truncated);

        let status = parse_status(&raw, Some(3)).unwrap();
        assert_eq!(status.files.len(), 4);
        assert!(!status.truncated);
    }

    #[test]
    fn file_order_follows_the_stream() {
        let raw = stream(&["? z.txt", &ordinary(".M", "a.txt"), "? m.txt"]);
        let status = parse_status(&raw, None).unwrap();

        let paths: Vec<&str> = status.files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, ["z.txt", "a.txt", "m.txt"]);
    }

    #[test]
    fn reparsing_is_idempotent() {
        let rename = format!("2 R. N... 100644 100644 100644 {OID} {OID} R100 new.rs");
        let raw = stream(&[
            "# branch.head main",
            &ordinary("MM", "a.txt"),
            &rename,
            "old.rs",
            "? fresh.txt",
        ]);

        assert_eq!(
            parse_status(&raw, None).unwrap(),
            parse_status(&raw, None).unwrap()
        );
    }
}
