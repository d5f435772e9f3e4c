//! Plastic SCM backend.
//!
//! Plastic has no describe command. The version tag is the newest log line
//! matching a pattern, and HEAD's changeset id comes from `cm status --header`.
//! Branch ancestry is read from the `Branch:` lines of the log format.

use std::cell::OnceCell;

use regex::Regex;
use tracing::{debug, instrument};

use super::{CommandRunner, ProcessRunner, VcsKind, VcsResult, VersionControl, split_lines};
use crate::config::VersioningConfig;
use crate::count::BranchCounts;
use crate::describe::{DescribeResult, find_plastic_tag, parse_plastic_head, parse_plastic_log};
use crate::error::{VersioningError, VersioningResult};

/// Prefix of the branch line in the log format.
const BRANCH_PREFIX: &str = "Branch:";

/// Plastic SCM workspace accessed through a [`CommandRunner`].
///
/// The log is read once per backend; describe, the tag range and branch
/// counts all slice the same lines.
#[derive(Debug)]
pub struct PlasticVcs<R = ProcessRunner> {
    runner: R,
    main_branch: String,
    version_tag: Regex,
    csformat: String,
    log: OnceCell<Vec<String>>,
}

impl<R: CommandRunner> PlasticVcs<R> {
    /// Create a backend using `runner` and the configured pattern and format.
    ///
    /// # Errors
    ///
    /// Returns [`VersioningError::InvalidPattern`] when the version tag
    /// pattern is not a valid regex.
    pub fn new(runner: R, config: &VersioningConfig) -> VersioningResult<Self> {
        let pattern = &config.plastic.version_tag_pattern;
        let version_tag = Regex::new(pattern).map_err(|source| VersioningError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
        Ok(Self {
            runner,
            main_branch: config.main_branch_name.clone(),
            version_tag,
            csformat: format!("--csformat={}", config.plastic.log_format),
            log: OnceCell::new(),
        })
    }

    fn head(&self) -> VersioningResult<String> {
        let header = self.runner.run(&["status", "--header"])?;
        parse_plastic_head(&header)
    }
}

impl<R: CommandRunner> VersionControl for PlasticVcs<R> {
    fn kind(&self) -> VcsKind {
        VcsKind::PlasticScm
    }

    #[instrument(skip(self), fields(pattern = %self.version_tag))]
    fn describe(&self) -> VersioningResult<DescribeResult> {
        let lifted = |e: super::VcsError| {
            if e.is_unavailable() {
                VersioningError::VcsUnavailable {
                    reason: e.to_string(),
                }
            } else {
                VersioningError::Vcs(e)
            }
        };
        let log = self.commit_log().map_err(lifted)?;
        let head = match self.head() {
            Err(VersioningError::Vcs(e)) => return Err(lifted(e)),
            other => other?,
        };
        let described = parse_plastic_log(&log, &self.version_tag, &head)?.ok_or_else(|| {
            VersioningError::NoVersionTagFound {
                detail: format!("no log line matches {:?}", self.version_tag.as_str()),
            }
        })?;
        debug!(tag = %described.tag, commits = described.commits_since_tag, "described HEAD");
        Ok(described)
    }

    #[instrument(skip(self))]
    fn commit_log(&self) -> VcsResult<Vec<String>> {
        if let Some(log) = self.log.get() {
            return Ok(log.clone());
        }
        let lines = split_lines(&self.runner.run(&["log", &self.csformat])?);
        Ok(self.log.get_or_init(|| lines).clone())
    }

    /// Every log line above the tag line, including the tagged changeset's
    /// own header and any comment lines written before the tag.
    fn log_since(&self, _describe: &DescribeResult) -> VersioningResult<Vec<String>> {
        let mut log = self.commit_log()?;
        if let Some(index) = find_plastic_tag(&log, &self.version_tag) {
            log.truncate(index);
        }
        Ok(log)
    }

    fn branch_counts(&self, log: &[String]) -> BranchCounts {
        let branches: Vec<&String> = log
            .iter()
            .filter(|line| line.starts_with(BRANCH_PREFIX))
            .collect();
        let on_main = branches
            .iter()
            .filter(|line| line.ends_with(self.main_branch.as_str()))
            .count() as u64;
        BranchCounts {
            main_to_fork: on_main,
            since_fork: branches.len() as u64 - on_main,
        }
    }

    fn status(&self) -> VcsResult<Vec<String>> {
        Ok(split_lines(&self.runner.run(&["status", "--short"])?))
    }
}
