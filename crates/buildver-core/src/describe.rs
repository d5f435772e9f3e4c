//! Parsing of version tag descriptions.
//!
//! Git's long describe form is `{tag}-{commits}-{hash}`, where the tag ends in
//! `v{major}[.{minor}]`. Fields are peeled off from the right: the hash after
//! the last `-`, the commit count after the next `-`, then major and minor
//! after the last `v` and split at the last `.`.
//!
//! Plastic SCM has no describe command; the version tag is a log line matching
//! a configured pattern, with major and minor after the line's last `:`.

use regex::Regex;
use serde::Serialize;

use crate::error::{VersioningError, VersioningResult};

/// Changeset header prefix emitted by the default Plastic log format.
pub const PLASTIC_CHANGESET_PREFIX: &str = "Changeset ";

/// The most recent version tag and where HEAD sits relative to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescribeResult {
    /// The matched tag in VCS-native form (e.g. `v1.4`).
    pub tag: String,
    /// Major version from the tag.
    pub major: u64,
    /// Minor version from the tag, 0 when the tag has none.
    pub minor: u64,
    /// Whether the tag carried a minor component.
    pub has_minor: bool,
    /// HEAD's short commit hash or changeset id.
    pub hash: String,
    /// Commits between the tag and HEAD.
    pub commits_since_tag: u64,
}

/// Parse `git describe --tags --long` output.
///
/// # Errors
///
/// Returns [`VersioningError::MalformedDescribeOutput`] carrying the raw
/// string when any field is missing or not an integer.
pub fn parse_git_describe(raw: &str) -> VersioningResult<DescribeResult> {
    let trimmed = raw.trim();
    let malformed = |reason: &str| VersioningError::MalformedDescribeOutput {
        raw: raw.to_string(),
        reason: reason.to_string(),
    };

    let (rest, hash) = trimmed
        .rsplit_once('-')
        .ok_or_else(|| malformed("missing '-' before the commit hash"))?;
    if hash.is_empty() {
        return Err(malformed("empty commit hash"));
    }

    let (tag, commits) = rest
        .rsplit_once('-')
        .ok_or_else(|| malformed("missing '-' before the commit count"))?;
    let commits_since_tag = commits
        .parse::<u64>()
        .map_err(|_| malformed("commit count is not an integer"))?;

    let (_, major_and_minor) = tag
        .rsplit_once('v')
        .ok_or_else(|| malformed("tag has no 'v' before the version"))?;
    let (major, minor, has_minor) = parse_major_minor(major_and_minor).map_err(malformed)?;

    Ok(DescribeResult {
        tag: tag.to_string(),
        major,
        minor,
        has_minor,
        hash: hash.to_string(),
        commits_since_tag,
    })
}

/// Split `major[.minor]` at the last `.`.
fn parse_major_minor(text: &str) -> Result<(u64, u64, bool), &'static str> {
    let text = text.trim();
    match text.rsplit_once('.') {
        Some((major, minor)) => {
            let major = major.parse().map_err(|_| "major version is not an integer")?;
            let minor = minor.parse().map_err(|_| "minor version is not an integer")?;
            Ok((major, minor, true))
        }
        None => {
            let major = text.parse().map_err(|_| "major version is not an integer")?;
            Ok((major, 0, false))
        }
    }
}

/// Index of the first line, scanning from HEAD, that is a version tag.
pub fn find_plastic_tag(lines: &[String], pattern: &Regex) -> Option<usize> {
    lines.iter().position(|line| pattern.is_match(line))
}

/// Index of the changeset header that owns the line at `tag_index`.
///
/// Falls back to `tag_index` when no header precedes it, as with a log format
/// that has no header line.
pub fn tagged_changeset_start(lines: &[String], tag_index: usize) -> usize {
    lines[..tag_index]
        .iter()
        .rposition(|line| line.trim_start().starts_with(PLASTIC_CHANGESET_PREFIX))
        .unwrap_or(tag_index)
}

/// Build a [`DescribeResult`] from a Plastic log and the HEAD changeset id.
///
/// `lines` is the full log, HEAD first. Returns `Ok(None)` when no line
/// matches `pattern`.
///
/// # Errors
///
/// Returns [`VersioningError::MalformedDescribeOutput`] when the tag line's
/// version is not `major[.minor]`.
pub fn parse_plastic_log(
    lines: &[String],
    pattern: &Regex,
    head: &str,
) -> VersioningResult<Option<DescribeResult>> {
    let Some(index) = find_plastic_tag(lines, pattern) else {
        return Ok(None);
    };
    let line = lines[index].trim();
    let major_and_minor = line.rsplit_once(':').map_or(line, |(_, version)| version);
    let (major, minor, has_minor) =
        parse_major_minor(major_and_minor).map_err(|reason| {
            VersioningError::MalformedDescribeOutput {
                raw: line.to_string(),
                reason: reason.to_string(),
            }
        })?;

    let start = tagged_changeset_start(lines, index);
    let commits_since_tag = lines[..start]
        .iter()
        .filter(|l| l.trim_start().starts_with(PLASTIC_CHANGESET_PREFIX))
        .count() as u64;

    Ok(Some(DescribeResult {
        tag: line.to_string(),
        major,
        minor,
        has_minor,
        hash: head.to_string(),
        commits_since_tag,
    }))
}

/// Extract the changeset id from `cm status --header` output.
///
/// The header looks like `/main@repo@server (cs:42 - head)`; the id is the
/// token after the last `cs:`.
///
/// # Errors
///
/// Returns [`VersioningError::MalformedDescribeOutput`] when no `cs:` marker
/// is present.
pub fn parse_plastic_head(status_header: &str) -> VersioningResult<String> {
    let malformed = || VersioningError::MalformedDescribeOutput {
        raw: status_header.to_string(),
        reason: "status header has no 'cs:' changeset marker".to_string(),
    };
    let (_, after) = status_header.rsplit_once("cs:").ok_or_else(malformed)?;
    let id = after
        .split(|c: char| c.is_whitespace() || c == ')')
        .next()
        .unwrap_or_default();
    if id.is_empty() {
        return Err(malformed());
    }
    Ok(id.to_string())
}
