//! Version derivation.
//!
//! [`VersionEngine`] ties a [`VersionControl`] backend to a
//! [`VersioningConfig`]:
//!
//! - the version triple is the tag's major and minor, plus the bundle style's
//!   minor increment and patch counted over commits since the tag;
//! - the build number is the commit style's count over the whole history,
//!   plus the offset, so it keeps growing across tags.
//!
//! A missing VCS or repository yields an `unknown` report and a missing tag
//! yields a `0.0.{patch}` baseline; neither is an error.

use std::cell::OnceCell;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::VersioningConfig;
use crate::count::{BranchCounts, Counter};
use crate::describe::DescribeResult;
use crate::error::{VersioningError, VersioningResult};
use crate::vcs::{VcsError, VcsKind, VersionControl};
use crate::version::{
    Decorations, FullVersionOptions, VersionData, VersionResult, assemble_version, bonus,
    full_version,
};

/// Hash reported when no version tag exists.
pub const NO_TAGS_HASH: &str = "no tags";

/// Version string reported when the VCS cannot be used.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Outcome of looking up the latest version tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescribeOutcome {
    /// A tag was found.
    Found(DescribeResult),
    /// The repository has no matching tag.
    NoVersionTag {
        /// Why the lookup came back empty.
        detail: String,
    },
    /// The VCS cannot be used in this directory.
    Unavailable {
        /// Why.
        reason: String,
    },
}

/// How a report's version was arrived at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum DerivationStatus {
    /// From a version tag and the commits since it.
    Derived,
    /// No tag; major and minor are 0.
    NoVersionTag {
        /// Why the lookup came back empty.
        detail: String,
    },
    /// The VCS cannot be used; the version is `unknown`.
    VcsUnavailable {
        /// Why.
        reason: String,
    },
}

/// Everything derived in one computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    /// `"{major}.{minor}.{patch}"`, or `unknown` when the VCS is unavailable.
    pub version: String,
    /// Major version.
    pub major: u64,
    /// Minor version.
    pub minor: u64,
    /// Patch version.
    pub patch: u64,
    /// Build number, offset included.
    pub build_number: i64,
    /// HEAD hash, or a sentinel (`no tags`, `not git`, `not plastic`).
    pub hash: String,
    /// Which VCS was queried.
    pub vcs: VcsKind,
    /// How the version was arrived at.
    pub status: DerivationStatus,
    /// The tag lookup, when a tag was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub describe: Option<DescribeResult>,
}

impl VersionReport {
    /// The numeric result.
    pub const fn result(&self) -> VersionResult {
        VersionResult {
            major: self.major,
            minor: self.minor,
            patch: self.patch,
            build_number: self.build_number,
        }
    }

    /// Whether the VCS could be used at all.
    pub const fn is_available(&self) -> bool {
        !matches!(self.status, DerivationStatus::VcsUnavailable { .. })
    }
}

/// Derives versions for one backend and configuration.
///
/// The full commit log is fetched at most once per engine.
pub struct VersionEngine<'a> {
    config: &'a VersioningConfig,
    vcs: &'a dyn VersionControl,
    counter: Counter,
    log: OnceCell<Vec<String>>,
}

impl std::fmt::Debug for VersionEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionEngine")
            .field("vcs", &self.vcs.kind())
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

impl<'a> VersionEngine<'a> {
    /// Create an engine over `vcs`.
    pub fn new(config: &'a VersioningConfig, vcs: &'a dyn VersionControl) -> Self {
        Self {
            config,
            vcs,
            counter: Counter::from_config(config),
            log: OnceCell::new(),
        }
    }

    /// Look up the latest version tag.
    ///
    /// # Errors
    ///
    /// Only fatal conditions: malformed output, an invalid pattern or a
    /// failing VCS command.
    #[instrument(skip(self), fields(vcs = %self.vcs.kind()))]
    pub fn describe(&self) -> VersioningResult<DescribeOutcome> {
        match self.vcs.describe() {
            Ok(described) => Ok(DescribeOutcome::Found(described)),
            Err(VersioningError::NoVersionTagFound { detail }) => {
                info!(%detail, "no version tag, using 0.0 baseline");
                Ok(DescribeOutcome::NoVersionTag { detail })
            }
            Err(VersioningError::VcsUnavailable { reason }) => {
                warn!(%reason, "version control unavailable");
                Ok(DescribeOutcome::Unavailable { reason })
            }
            Err(e) => Err(e),
        }
    }

    /// The full commit log; empty when the VCS is unavailable.
    ///
    /// # Errors
    ///
    /// Propagates command failures other than unavailability.
    pub fn commit_log(&self) -> VersioningResult<&[String]> {
        if let Some(log) = self.log.get() {
            return Ok(log);
        }
        let lines = match self.vcs.commit_log() {
            Ok(lines) => lines,
            Err(e) if e.is_unavailable() => {
                warn!(error = %e, "commit log unavailable, counting an empty history");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.log.get_or_init(|| lines))
    }

    /// Branch ancestry counts, best-effort.
    pub fn branch_counts(&self, log: &[String]) -> BranchCounts {
        let counts = self.vcs.branch_counts(log);
        debug!(main_to_fork = counts.main_to_fork, since_fork = counts.since_fork, "branch counts");
        counts
    }

    /// Working-tree change count; 0 when status cannot be read.
    pub fn change_count(&self) -> usize {
        self.vcs.status().map_or_else(
            |e: VcsError| {
                warn!(error = %e, "could not read working tree status");
                0
            },
            |lines| lines.len(),
        )
    }

    /// Build number over the full history.
    ///
    /// # Errors
    ///
    /// Propagates command failures other than unavailability.
    #[instrument(skip(self), fields(style = %self.config.commit_counting_style))]
    pub fn build_number(&self) -> VersioningResult<i64> {
        let log = self.commit_log()?;
        Ok(self.build_number_from(log))
    }

    fn build_number_from(&self, log: &[String]) -> i64 {
        let style = self.config.commit_counting_style;
        let branch = if style.uses_ancestry() {
            self.branch_counts(log)
        } else {
            BranchCounts::default()
        };
        self.counter.build_number(style, log, branch)
    }

    /// Derive the version triple and build number.
    ///
    /// # Errors
    ///
    /// Fatal conditions only; see [`VersionEngine::describe`].
    #[instrument(skip(self), fields(vcs = %self.vcs.kind()))]
    pub fn report(&self) -> VersioningResult<VersionReport> {
        let kind = self.vcs.kind();
        let style = self.config.bundle_version_style;

        let report = match self.describe()? {
            DescribeOutcome::Unavailable { reason } => VersionReport {
                version: UNKNOWN_VERSION.to_string(),
                major: 0,
                minor: 0,
                patch: 0,
                build_number: self.config.number_offset,
                hash: kind.unavailable_hash().to_string(),
                vcs: kind,
                status: DerivationStatus::VcsUnavailable { reason },
                describe: None,
            },
            DescribeOutcome::NoVersionTag { detail } => {
                let log = self.commit_log()?;
                let branch = self.bundle_branch_counts(log);
                // The baseline pins major.minor to 0.0; only the patch counts
                let patch = self.counter.bundle(style, log, branch).patch;
                VersionReport {
                    version: assemble_version(0, 0, patch),
                    major: 0,
                    minor: 0,
                    patch,
                    build_number: self.build_number_from(log),
                    hash: NO_TAGS_HASH.to_string(),
                    vcs: kind,
                    status: DerivationStatus::NoVersionTag { detail },
                    describe: None,
                }
            }
            DescribeOutcome::Found(described) => {
                let log = self.commit_log()?;
                let since = self.vcs.log_since(&described)?;
                let branch = self.bundle_branch_counts(log);
                let bundle = self.counter.bundle(style, &since, branch);
                let minor = described.minor + bundle.minor_increment;
                VersionReport {
                    version: assemble_version(described.major, minor, bundle.patch),
                    major: described.major,
                    minor,
                    patch: bundle.patch,
                    build_number: self.build_number_from(log),
                    hash: described.hash.clone(),
                    vcs: kind,
                    status: DerivationStatus::Derived,
                    describe: Some(described),
                }
            }
        };

        info!(
            version = %report.version,
            build_number = report.build_number,
            hash = %report.hash,
            "derived version"
        );
        Ok(report)
    }

    fn bundle_branch_counts(&self, log: &[String]) -> BranchCounts {
        if self.config.bundle_version_style.uses_ancestry() {
            self.branch_counts(log)
        } else {
            BranchCounts::default()
        }
    }

    /// The version decorated per `options`.
    ///
    /// # Errors
    ///
    /// Fatal conditions only; see [`VersionEngine::report`].
    pub fn full_version(&self, options: FullVersionOptions) -> VersioningResult<String> {
        let report = self.report()?;
        Ok(self.decorate(&report, options))
    }

    /// Decorate an existing report, querying only what `options` asks for.
    pub fn decorate(&self, report: &VersionReport, options: FullVersionOptions) -> String {
        let decorations = Decorations {
            hash: options.include_hash.then(|| report.hash.clone()),
            build_number: options.include_build_number.then_some(report.build_number),
            commits_since_main: (options.commit_status && !options.include_build_number)
                .then(|| self.vcs.since_fork(self.commit_log().unwrap_or_default())),
            changes: options.commit_status.then(|| self.change_count()),
        };
        full_version(&report.version, &decorations)
    }

    /// The persistable version record for `report`.
    ///
    /// `Branch:` and `Changes:` bonus fields follow `include_branch_count`
    /// and `include_changes`.
    pub fn version_data(&self, report: &VersionReport) -> VersionData {
        let branch = self
            .config
            .include_branch_count
            .then(|| self.branch_counts(self.commit_log().unwrap_or_default()));
        let changes = self.config.include_changes.then(|| self.change_count());
        VersionData {
            version: report.version.clone(),
            number: report.build_number,
            debug: None,
            hash: report.hash.clone(),
            bonus: bonus(branch, changes),
        }
    }
}
