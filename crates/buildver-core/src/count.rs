//! Commit counting styles.
//!
//! Lines are scanned in log order, HEAD first. The two-phase styles only
//! count patch commits that are more recent than the newest minor commit.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::classify::{Classifier, CommitClass};
use crate::config::VersioningConfig;

/// How commits turn into a number.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum CountingStyle {
    /// Every minor or patch commit counts once.
    #[default]
    #[serde(alias = "BothMinorAndPatch")]
    BothMinorAndPatch,
    /// Minor commits weigh `max_patches_per_minor`; patches since the newest
    /// minor count once.
    #[serde(alias = "MinorThenPatch")]
    MinorThenPatch,
    /// Main-branch commits weigh `branch_commit_limit`; commits since the
    /// fork point count once.
    #[serde(alias = "MainAndBranch")]
    MainAndBranch,
    /// Every patch or build commit counts once.
    #[serde(alias = "PatchAndBuild")]
    PatchAndBuild,
    /// As `minor-then-patch`, with build commits counted alongside patches.
    #[serde(alias = "MinorThenPatchAndBuild")]
    MinorThenPatchAndBuild,
    /// Every minor, patch or build commit counts once.
    #[serde(alias = "MinorAndPatchAndBuild")]
    MinorAndPatchAndBuild,
}

impl CountingStyle {
    /// Whether this style needs main-branch ancestry counts.
    pub const fn uses_ancestry(self) -> bool {
        matches!(self, Self::MainAndBranch)
    }

    /// The kebab-case name used in config files and on the command line.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BothMinorAndPatch => "both-minor-and-patch",
            Self::MinorThenPatch => "minor-then-patch",
            Self::MainAndBranch => "main-and-branch",
            Self::PatchAndBuild => "patch-and-build",
            Self::MinorThenPatchAndBuild => "minor-then-patch-and-build",
            Self::MinorAndPatchAndBuild => "minor-and-patch-and-build",
        }
    }
}

impl std::fmt::Display for CountingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commits on main up to the fork point, and on this branch since it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BranchCounts {
    /// Commits reachable on main up to where HEAD's branch forked.
    pub main_to_fork: u64,
    /// Commits on HEAD's branch since the fork point.
    pub since_fork: u64,
}

impl std::fmt::Display for BranchCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.main_to_fork, self.since_fork)
    }
}

/// What a style contributes to the version triple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BundleCount {
    /// Added to the tag's minor version.
    pub minor_increment: u64,
    /// The patch version.
    pub patch: u64,
}

/// Applies counting styles with the configured weights and tags.
#[derive(Debug, Clone)]
pub struct Counter {
    classifier: Classifier,
    max_patches_per_minor: u64,
    branch_commit_limit: u64,
    number_offset: i64,
}

impl Counter {
    /// Create a counter from configuration.
    pub fn from_config(config: &VersioningConfig) -> Self {
        Self {
            classifier: Classifier::from_config(config),
            max_patches_per_minor: config.max_patches_per_minor,
            branch_commit_limit: config.branch_commit_limit,
            number_offset: config.number_offset,
        }
    }

    /// The classifier in use.
    pub const fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Raw count for `style`, before the offset.
    ///
    /// `branch` is only read by [`CountingStyle::MainAndBranch`].
    pub fn count(&self, style: CountingStyle, lines: &[String], branch: BranchCounts) -> u64 {
        let count = match style {
            CountingStyle::BothMinorAndPatch => {
                self.count_classes(lines, &[CommitClass::Minor, CommitClass::Patch])
            }
            CountingStyle::PatchAndBuild => {
                self.count_classes(lines, &[CommitClass::Patch, CommitClass::Build])
            }
            CountingStyle::MinorAndPatchAndBuild => self.count_classes(
                lines,
                &[CommitClass::Minor, CommitClass::Patch, CommitClass::Build],
            ),
            CountingStyle::MinorThenPatch => {
                let (minor, patch) = self.minor_then_patch(lines, false);
                weighted(self.max_patches_per_minor, minor, patch)
            }
            CountingStyle::MinorThenPatchAndBuild => {
                let (minor, patch) = self.minor_then_patch(lines, true);
                weighted(self.max_patches_per_minor, minor, patch)
            }
            CountingStyle::MainAndBranch => {
                weighted(self.branch_commit_limit, branch.main_to_fork, branch.since_fork)
            }
        };
        trace!(%style, lines = lines.len(), count, "counted commits");
        count
    }

    /// Build number for `style`: the raw count plus the offset.
    pub fn build_number(&self, style: CountingStyle, lines: &[String], branch: BranchCounts) -> i64 {
        let count = i64::try_from(self.count(style, lines, branch)).unwrap_or(i64::MAX);
        count.saturating_add(self.number_offset)
    }

    /// Minor increment and patch for the version triple. No offset applies.
    ///
    /// The two-phase styles split into a minor increment and a patch; every
    /// other style leaves the minor alone and uses its count as the patch.
    pub fn bundle(&self, style: CountingStyle, lines: &[String], branch: BranchCounts) -> BundleCount {
        match style {
            CountingStyle::MinorThenPatch | CountingStyle::MinorThenPatchAndBuild => {
                let with_build = style == CountingStyle::MinorThenPatchAndBuild;
                let (minor_increment, patch) = self.minor_then_patch(lines, with_build);
                BundleCount {
                    minor_increment,
                    patch,
                }
            }
            _ => BundleCount {
                minor_increment: 0,
                patch: self.count(style, lines, branch),
            },
        }
    }

    /// Minor commits, and patch (optionally build) commits before the first
    /// minor commit scanning from HEAD.
    fn minor_then_patch(&self, lines: &[String], with_build: bool) -> (u64, u64) {
        let minor = self.count_classes(lines, &[CommitClass::Minor]);
        let newer = lines
            .iter()
            .take_while(|line| !self.classifier.is_minor(line))
            .filter(|line| match self.classifier.classify(line) {
                CommitClass::Patch => true,
                CommitClass::Build => with_build,
                CommitClass::Minor | CommitClass::None => false,
            })
            .count() as u64;
        (minor, newer)
    }

    fn count_classes(&self, lines: &[String], classes: &[CommitClass]) -> u64 {
        lines
            .iter()
            .filter(|line| classes.contains(&self.classifier.classify(line)))
            .count() as u64
    }
}

/// `weight * heavy + light`, saturating.
const fn weighted(weight: u64, heavy: u64, light: u64) -> u64 {
    weight.saturating_mul(heavy).saturating_add(light)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STYLES: [CountingStyle; 6] = [
        CountingStyle::BothMinorAndPatch,
        CountingStyle::MinorThenPatch,
        CountingStyle::MainAndBranch,
        CountingStyle::PatchAndBuild,
        CountingStyle::MinorThenPatchAndBuild,
        CountingStyle::MinorAndPatchAndBuild,
    ];

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_string()).collect()
    }

    fn counter() -> Counter {
        Counter::from_config(&VersioningConfig {
            minor_tags: vec!["feat".into()],
            patch_tags: vec!["fix".into()],
            build_tags: vec!["build".into()],
            ..VersioningConfig::default()
        })
    }

    fn head_first() -> Vec<String> {
        lines(&["chore: w", "fix: z", "fix: y", "feat: x"])
    }

    #[test]
    fn both_minor_and_patch_counts_union() {
        let c = counter();
        let log = lines(&["feat: x", "fix: y", "fix: z", "chore: w"]);
        assert_eq!(
            c.count(CountingStyle::BothMinorAndPatch, &log, BranchCounts::default()),
            3
        );
    }

    #[test]
    fn minor_then_patch_weights_minor_and_truncates_at_newest_minor() {
        let c = counter();
        assert_eq!(
            c.count(CountingStyle::MinorThenPatch, &head_first(), BranchCounts::default()),
            22
        );
        assert_eq!(
            c.bundle(CountingStyle::MinorThenPatch, &head_first(), BranchCounts::default()),
            BundleCount {
                minor_increment: 1,
                patch: 2
            }
        );
    }

    #[test]
    fn minor_then_patch_ignores_patches_older_than_a_minor() {
        let c = counter();
        let log = lines(&["fix: newest", "feat: b", "fix: middle", "feat: a", "fix: oldest"]);
        let bundle = c.bundle(CountingStyle::MinorThenPatch, &log, BranchCounts::default());
        assert_eq!(bundle.minor_increment, 2);
        assert_eq!(bundle.patch, 1);
        assert_eq!(
            c.count(CountingStyle::MinorThenPatch, &log, BranchCounts::default()),
            41
        );
    }

    #[test]
    fn minor_then_patch_and_build_counts_build_in_prefix() {
        let c = counter();
        let log = lines(&["build: ci", "fix: a", "feat: x", "build: old"]);
        assert_eq!(
            c.bundle(CountingStyle::MinorThenPatchAndBuild, &log, BranchCounts::default()),
            BundleCount {
                minor_increment: 1,
                patch: 2
            }
        );
        assert_eq!(
            c.count(CountingStyle::MinorThenPatchAndBuild, &log, BranchCounts::default()),
            22
        );
        // Build commits are ignored without the build variant
        assert_eq!(
            c.bundle(CountingStyle::MinorThenPatch, &log, BranchCounts::default())
                .patch,
            1
        );
    }

    #[test]
    fn patch_and_build_excludes_minor() {
        let c = counter();
        let log = lines(&["feat: x", "fix: y", "build: z", "chore: w"]);
        assert_eq!(
            c.count(CountingStyle::PatchAndBuild, &log, BranchCounts::default()),
            2
        );
        assert_eq!(
            c.count(CountingStyle::MinorAndPatchAndBuild, &log, BranchCounts::default()),
            3
        );
    }

    #[test]
    fn minor_line_is_never_counted_as_patch() {
        let c = Counter::from_config(&VersioningConfig {
            minor_tags: vec!["feat".into()],
            patch_tags: vec!["feat".into(), "fix".into()],
            ..VersioningConfig::default()
        });
        let log = lines(&["feat: overlaps", "fix: y"]);
        assert_eq!(
            c.count(CountingStyle::PatchAndBuild, &log, BranchCounts::default()),
            1
        );
        assert_eq!(
            c.count(CountingStyle::BothMinorAndPatch, &log, BranchCounts::default()),
            2
        );
    }

    #[test]
    fn main_and_branch_weights_main_commits() {
        let c = counter();
        let branch = BranchCounts {
            main_to_fork: 12,
            since_fork: 3,
        };
        assert_eq!(c.count(CountingStyle::MainAndBranch, &[], branch), 1203);
        assert_eq!(
            c.bundle(CountingStyle::MainAndBranch, &[], branch),
            BundleCount {
                minor_increment: 0,
                patch: 1203
            }
        );
    }

    #[test]
    fn empty_log_gives_offset_for_every_style() {
        let c = Counter::from_config(&VersioningConfig {
            number_offset: 500,
            ..VersioningConfig::default()
        });
        for style in ALL_STYLES {
            assert_eq!(
                c.build_number(style, &[], BranchCounts::default()),
                500,
                "{style}"
            );
            assert_eq!(c.bundle(style, &[], BranchCounts::default()), BundleCount::default());
        }
    }

    #[test]
    fn offset_is_added_after_count() {
        let c = Counter::from_config(&VersioningConfig {
            number_offset: -2,
            ..VersioningConfig::default()
        });
        let log = lines(&["feat: x", "fix: y", "fix: z"]);
        assert_eq!(
            c.build_number(CountingStyle::BothMinorAndPatch, &log, BranchCounts::default()),
            1
        );
    }

    #[test]
    fn style_names_match_serde() {
        for style in ALL_STYLES {
            let json = serde_json::to_string(&style).unwrap();
            assert_eq!(json, format!("\"{}\"", style.as_str()));
        }
        let legacy: CountingStyle = serde_json::from_str("\"MinorThenPatch\"").unwrap();
        assert_eq!(legacy, CountingStyle::MinorThenPatch);
    }

    #[test]
    fn only_main_and_branch_uses_ancestry() {
        let users: Vec<_> = ALL_STYLES.iter().filter(|s| s.uses_ancestry()).collect();
        assert_eq!(users, [&CountingStyle::MainAndBranch]);
    }

    #[test]
    fn branch_counts_display() {
        let b = BranchCounts {
            main_to_fork: 40,
            since_fork: 2,
        };
        assert_eq!(b.to_string(), "40.2");
    }
}
