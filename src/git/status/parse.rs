//! Porcelain v2 line parser.
//!
//! Splits the NUL-delimited output of `git status --porcelain=2 -z`
//! into typed records. Pure: no process invocation, no shared state.
//!
//! Format reference: git-status(1), "Porcelain Format Version 2".

/// Kind marker of an entry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// `1`: ordinary change.
    Ordinary,
    /// `2`: rename or copy; carries the original path.
    RenameOrCopy,
    /// `u`: unmerged.
    Unmerged,
    /// `?`: untracked.
    Untracked,
    /// `!`: ignored.
    Ignored,
}

/// One entry record: status code plus paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub kind: EntryKind,
    /// Index state and worktree state, in that order. `?` and `!`
    /// entries carry the implicit `??`/`!!`.
    pub code: [char; 2],
    /// Repository-relative path, forward slashes as git emits them.
    pub path: String,
    /// Original path; present only on rename/copy records.
    pub old_path: Option<String>,
}

/// A parsed status record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusLine {
    /// `# <value>`: branch metadata. The value excludes the marker
    /// and the separating space.
    Header(String),
    Entry(StatusEntry),
}

/// Split a porcelain v2 `-z` stream into records.
///
/// Retains at most `limit` entry records; the second return value is
/// true when more entries existed past the limit. Tokens with an
/// unrecognized marker are skipped rather than fatal, since git may
/// grow new record kinds.
pub fn parse_porcelain(raw: &str, limit: Option<usize>) -> (Vec<StatusLine>, bool) {
    let limit = limit.unwrap_or(usize::MAX);
    let mut lines = Vec::new();
    let mut entries = 0usize;
    let mut truncated = false;

    let mut tokens = raw.split('\0');
    while let Some(token) = tokens.next() {
        // A terminal NUL produces one empty trailing token.
        if token.is_empty() {
            continue;
        }

        if entries >= limit {
            truncated = remaining_has_entry(token, &mut tokens);
            break;
        }

        let record = match token.as_bytes()[0] {
            b'#' => Some(StatusLine::Header(header_value(token))),
            b'1' => ordinary_entry(token).map(StatusLine::Entry),
            b'2' => rename_entry(token, &mut tokens).map(StatusLine::Entry),
            b'u' => unmerged_entry(token).map(StatusLine::Entry),
            b'?' => simple_entry(token, EntryKind::Untracked, ['?', '?']).map(StatusLine::Entry),
            b'!' => simple_entry(token, EntryKind::Ignored, ['!', '!']).map(StatusLine::Entry),
            _ => {
                log::debug!("skipping unrecognized status record {token:?}");
                continue;
            }
        };

        match record {
            Some(line) => {
                if matches!(line, StatusLine::Entry(_)) {
                    entries += 1;
                }
                lines.push(line);
            }
            None => log::warn!("skipping malformed status record {token:?}"),
        }
    }

    (lines, truncated)
}

/// Scan records past the entry limit for any further entry, without
/// materializing them. Stops at the first entry marker, so the
/// old-path token trailing a rename record is never reached, let alone
/// mistaken for a record.
fn remaining_has_entry<'a>(first: &str, rest: &mut impl Iterator<Item = &'a str>) -> bool {
    let mut token = Some(first);
    while let Some(t) = token {
        if matches!(t.as_bytes().first(), Some(b'1' | b'2' | b'u' | b'?' | b'!')) {
            return true;
        }
        token = rest.next();
    }
    false
}

fn header_value(token: &str) -> String {
    let rest = &token[1..];
    rest.strip_prefix(' ').unwrap_or(rest).to_string()
}

/// `1 XY sub mH mI mW hH hI path`; the path is everything after the
/// eighth space and may itself contain spaces.
fn ordinary_entry(token: &str) -> Option<StatusEntry> {
    let mut fields = token.splitn(9, ' ');
    if fields.next()? != "1" {
        return None;
    }
    let code = status_code(fields.next()?)?;
    // sub, mH, mI, mW, hH, hI, then the path
    let path = fields.nth(6)?;
    if path.is_empty() {
        return None;
    }

    Some(StatusEntry {
        kind: EntryKind::Ordinary,
        code,
        path: path.to_string(),
        old_path: None,
    })
}

/// `2 XY sub mH mI mW hH hI X<score> path` followed by the original
/// path as its own NUL token (`-z` convention). A stream produced
/// without `-z` separation instead carries the original path on the
/// same token behind a tab; both shapes are accepted, and the trailing
/// token is only consumed for the former.
fn rename_entry<'a>(
    token: &str,
    tokens: &mut impl Iterator<Item = &'a str>,
) -> Option<StatusEntry> {
    let mut fields = token.splitn(10, ' ');
    if fields.next()? != "2" {
        return None;
    }
    let code = status_code(fields.next()?)?;
    // sub, mH, mI, mW, hH, hI, score, then the path
    let path_field = fields.nth(7)?;

    let (path, old_path) = match path_field.split_once('\t') {
        Some((path, old_path)) => (path, old_path.to_string()),
        None => (path_field, tokens.next().filter(|t| !t.is_empty())?.to_string()),
    };
    if path.is_empty() {
        return None;
    }

    Some(StatusEntry {
        kind: EntryKind::RenameOrCopy,
        code,
        path: path.to_string(),
        old_path: Some(old_path),
    })
}

/// `u XY sub m1 m2 m3 mW h1 h2 h3 path`
fn unmerged_entry(token: &str) -> Option<StatusEntry> {
    let mut fields = token.splitn(11, ' ');
    if fields.next()? != "u" {
        return None;
    }
    let code = status_code(fields.next()?)?;
    // sub, m1, m2, m3, mW, h1, h2, h3, then the path
    let path = fields.nth(8)?;
    if path.is_empty() {
        return None;
    }

    Some(StatusEntry {
        kind: EntryKind::Unmerged,
        code,
        path: path.to_string(),
        old_path: None,
    })
}

/// `? path` / `! path`
fn simple_entry(token: &str, kind: EntryKind, code: [char; 2]) -> Option<StatusEntry> {
    let (marker, path) = token.split_once(' ')?;
    if marker.len() != 1 || path.is_empty() {
        return None;
    }

    Some(StatusEntry {
        kind,
        code,
        path: path.to_string(),
        old_path: None,
    })
}

fn status_code(field: &str) -> Option<[char; 2]> {
    let mut chars = field.chars();
    let index = chars.next()?;
    let worktree = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some([index, worktree])
}
