//! Error types for buildver-core

use thiserror::Error;

use crate::vcs::VcsError;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// Configuration file not found after searching all locations.
    #[error("no configuration file found")]
    NotFound,
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors from deriving a version out of VCS history.
///
/// `VcsUnavailable` and `NoVersionTagFound` are conditions the engine turns
/// into sentinel reports; everything else is fatal to the computation.
#[derive(Error, Debug)]
pub enum VersioningError {
    /// The VCS executable is missing or the directory is not a repository.
    #[error("version control unavailable: {reason}")]
    VcsUnavailable {
        /// What went wrong, as reported by the runner.
        reason: String,
    },

    /// The repository is valid but has no tag matching the version pattern.
    #[error("no version tag found: {detail}")]
    NoVersionTagFound {
        /// Exit code and stderr of the failed lookup.
        detail: String,
    },

    /// The describe output does not have the `tag-count-hash` shape.
    #[error("malformed describe output {raw:?}: {reason}")]
    MalformedDescribeOutput {
        /// The offending output, verbatim.
        raw: String,
        /// Which part failed to parse.
        reason: String,
    },

    /// The configured VCS kind has no implementation.
    #[error("unsupported version control system {0:?} (expected \"git\" or \"plastic\")")]
    UnsupportedVcsKind(String),

    /// The Plastic SCM version tag pattern is not a valid regex.
    #[error("invalid version tag pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern as configured.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// A VCS command failed after the repository was found.
    #[error(transparent)]
    Vcs(#[from] VcsError),
}

impl VersioningError {
    /// Returns `true` for conditions that produce a sentinel report instead
    /// of failing the computation.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::VcsUnavailable { .. } | Self::NoVersionTagFound { .. }
        )
    }
}

/// Result alias for version derivation.
pub type VersioningResult<T> = Result<T, VersioningError>;
