//! Version string assembly.
//!
//! Pure formatting: the triple, per-platform build numbers, the decorated
//! "full" string and the bonus summary stored alongside a version record.

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::count::BranchCounts;

/// The derived version triple and build number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VersionResult {
    /// Major version, from the tag.
    pub major: u64,
    /// Minor version, from the tag plus any counted minor commits.
    pub minor: u64,
    /// Patch version, counted since the tag.
    pub patch: u64,
    /// Integer build number, counted over the whole history plus the offset.
    pub build_number: i64,
}

impl VersionResult {
    /// `"{major}.{minor}.{patch}"`.
    pub fn version(&self) -> String {
        assemble_version(self.major, self.minor, self.patch)
    }

    /// The triple as a [`semver::Version`].
    pub const fn to_semver(&self) -> Version {
        Version::new(self.major, self.minor, self.patch)
    }
}

impl std::fmt::Display for VersionResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Format a version triple.
pub fn assemble_version(major: u64, minor: u64, patch: u64) -> String {
    format!("{major}.{minor}.{patch}")
}

/// Platforms whose build-number field is set from the build number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlatformTarget {
    /// Android `bundleVersionCode` (integer).
    Android,
    /// iOS `buildNumber` (string).
    Ios,
    /// tvOS `buildNumber` (string).
    Tvos,
}

impl PlatformTarget {
    /// The platform's form of `number`.
    pub fn build_number(self, number: i64) -> PlatformBuildNumber {
        match self {
            Self::Android => PlatformBuildNumber::BundleVersionCode(number),
            Self::Ios | Self::Tvos => PlatformBuildNumber::BuildNumber(number.to_string()),
        }
    }
}

/// A build number in the shape a platform's player settings expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PlatformBuildNumber {
    /// Integer version code.
    BundleVersionCode(i64),
    /// Decimal string.
    BuildNumber(String),
}

impl PlatformBuildNumber {
    /// Name of the platform setting this value belongs in.
    pub const fn field_name(&self) -> &'static str {
        match self {
            Self::BundleVersionCode(_) => "bundleVersionCode",
            Self::BuildNumber(_) => "buildNumber",
        }
    }
}

impl std::fmt::Display for PlatformBuildNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BundleVersionCode(code) => write!(f, "{code}"),
            Self::BuildNumber(number) => f.write_str(number),
        }
    }
}

/// Which decorations to append to the full version string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FullVersionOptions {
    /// Append ` {hash}`.
    pub include_hash: bool,
    /// Append ` ({build number})`.
    pub include_build_number: bool,
    /// Append `+{commits since main}` (only without the build number) and
    /// `&{changed files}`.
    pub commit_status: bool,
}

/// Values for the decorations; `None` leaves a decoration out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Decorations {
    /// HEAD hash.
    pub hash: Option<String>,
    /// Build number.
    pub build_number: Option<i64>,
    /// Commits on HEAD's branch since it forked from main.
    pub commits_since_main: Option<u64>,
    /// Working-tree change count.
    pub changes: Option<usize>,
}

/// Append decorations to `version`, in hash, build number, branch, changes
/// order.
pub fn full_version(version: &str, decorations: &Decorations) -> String {
    let mut out = version.to_string();
    if let Some(ref hash) = decorations.hash {
        out.push(' ');
        out.push_str(hash);
    }
    if let Some(number) = decorations.build_number {
        out.push_str(&format!(" ({number})"));
    }
    if let Some(since) = decorations.commits_since_main {
        out.push_str(&format!("+{since}"));
    }
    if let Some(changes) = decorations.changes {
        out.push_str(&format!("&{changes}"));
    }
    out
}

/// Bonus summary: branch position, working-tree changes, or both.
pub fn bonus(branch: Option<BranchCounts>, changes: Option<usize>) -> String {
    match (branch, changes) {
        (Some(branch), Some(changes)) => format!("Branch: {branch}+{changes}"),
        (None, Some(changes)) => format!("Changes: {changes}"),
        (Some(branch), None) => format!("Branch: {branch}"),
        (None, None) => String::new(),
    }
}

/// A version record a build pipeline can persist and ship with the product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionData {
    /// The version string.
    pub version: String,
    /// The build number.
    pub number: i64,
    /// Free-form note kept across updates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<String>,
    /// HEAD hash.
    pub hash: String,
    /// See [`bonus`].
    pub bonus: String,
}
