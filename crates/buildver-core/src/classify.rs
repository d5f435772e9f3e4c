//! Commit classification by message prefix.
//!
//! Each commit line is sorted into exactly one [`CommitClass`]. Tags are
//! compared as literal, case-sensitive prefixes of the trimmed line, so a tag
//! like `fix(ui)` or `[wip]` means exactly those characters.

use serde::Serialize;

use crate::config::VersioningConfig;

/// An ordered set of literal commit-message prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: Vec<String>,
}

impl TagSet {
    /// Build a tag set, dropping empty tags (they would match every line).
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|tag| tag.as_ref().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        Self { tags }
    }

    /// True iff any tag is a prefix of the trimmed line.
    pub fn matches(&self, line: &str) -> bool {
        let line = line.trim();
        self.tags.iter().any(|tag| line.starts_with(tag.as_str()))
    }

    /// Whether the set has no tags.
    pub const fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// The tags, in configured order.
    pub fn tags(&self) -> &[String] {
        &self.tags
    }
}

/// The single category a commit line falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitClass {
    /// Bumps the minor version.
    Minor,
    /// Bumps the patch version.
    Patch,
    /// Counts toward the build number only.
    Build,
    /// Not counted.
    None,
}

/// Classifies commit lines with precedence minor > patch > build.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    minor: TagSet,
    patch: TagSet,
    build: TagSet,
}

impl Classifier {
    /// Create a classifier from explicit tag sets.
    pub const fn new(minor: TagSet, patch: TagSet, build: TagSet) -> Self {
        Self {
            minor,
            patch,
            build,
        }
    }

    /// Create a classifier from the configured tag lists.
    pub fn from_config(config: &VersioningConfig) -> Self {
        Self::new(
            TagSet::new(&config.minor_tags),
            TagSet::new(&config.patch_tags),
            TagSet::new(&config.build_tags),
        )
    }

    /// Classify one line.
    pub fn classify(&self, line: &str) -> CommitClass {
        if self.minor.matches(line) {
            CommitClass::Minor
        } else if self.patch.matches(line) {
            CommitClass::Patch
        } else if self.build.matches(line) {
            CommitClass::Build
        } else {
            CommitClass::None
        }
    }

    /// Shorthand for `classify(line) == CommitClass::Minor`.
    pub fn is_minor(&self, line: &str) -> bool {
        self.minor.matches(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> Classifier {
        Classifier::new(
            TagSet::new(["feat"]),
            TagSet::new(["fix", "asset", "adjust"]),
            TagSet::new(["build"]),
        )
    }

    #[test]
    fn matches_literal_prefix_only() {
        let tags = TagSet::new(["fix"]);
        assert!(tags.matches("fix: crash on start"));
        assert!(tags.matches("fixup! earlier commit"));
        assert!(!tags.matches("hotfix: crash"));
        assert!(!tags.matches("Fix: crash"));
    }

    #[test]
    fn matches_after_trimming_indentation() {
        // `git log` indents message bodies by four spaces
        assert!(TagSet::new(["feat"]).matches("    feat: new menu"));
    }

    #[test]
    fn empty_set_never_matches() {
        let tags = TagSet::new(Vec::<String>::new());
        assert!(tags.is_empty());
        assert!(!tags.matches(""));
        assert!(!tags.matches("feat: anything"));
    }

    #[test]
    fn empty_tags_are_dropped() {
        let tags = TagSet::new(["", "fix"]);
        assert_eq!(tags.tags(), ["fix"]);
        assert!(!tags.matches("chore: tidy"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let tags = TagSet::new(["fix(ui)", "[wip]", "a.b", "c*"]);
        assert!(tags.matches("fix(ui): button"));
        assert!(!tags.matches("fixui: button"));
        assert!(tags.matches("[wip] half done"));
        assert!(!tags.matches("w half done"));
        assert!(tags.matches("a.b thing"));
        assert!(!tags.matches("axb thing"));
        assert!(tags.matches("c* star"));
        assert!(!tags.matches("cc star"));
    }

    #[test]
    fn classify_assigns_exactly_one_class() {
        let c = classifier();
        assert_eq!(c.classify("feat: x"), CommitClass::Minor);
        assert_eq!(c.classify("fix: y"), CommitClass::Patch);
        assert_eq!(c.classify("asset: z"), CommitClass::Patch);
        assert_eq!(c.classify("build: ci"), CommitClass::Build);
        assert_eq!(c.classify("chore: w"), CommitClass::None);
    }

    #[test]
    fn minor_takes_precedence_over_patch_and_build() {
        let c = Classifier::new(
            TagSet::new(["feat"]),
            TagSet::new(["feat", "fix"]),
            TagSet::new(["feat", "fix", "build"]),
        );
        assert_eq!(c.classify("feat: overlap"), CommitClass::Minor);
        assert_eq!(c.classify("fix: overlap"), CommitClass::Patch);
        assert_eq!(c.classify("build: only"), CommitClass::Build);
    }

    #[test]
    fn from_config_uses_default_tags() {
        let c = Classifier::from_config(&VersioningConfig::default());
        assert!(c.is_minor("feat: x"));
        assert_eq!(c.classify("adjust: tweak"), CommitClass::Patch);
        assert_eq!(c.classify("build: nothing configured"), CommitClass::None);
    }
}
