//! Configuration loading and discovery.
//!
//! This module provides configuration file discovery by:
//! 1. Walking up from the current directory to find project config
//! 2. Loading user config from XDG config directory
//! 3. Merging with built-in defaults
//!
//! # Supported formats
//!
//! - TOML (`.toml`)
//! - YAML (`.yaml`, `.yml`)
//! - JSON (`.json`)
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.buildver.<ext>` in current directory or any parent
//! - `buildver.<ext>` in current directory or any parent
//! - `~/.config/buildver/config.<ext>` (user config)
//!
//! # Example
//!
//! ```toml
//! [versioning]
//! version_control_system = "git"
//! main_branch_name = "main"
//! number_offset = 1000
//! minor_tags = ["feat"]
//! patch_tags = ["fix", "asset", "adjust"]
//! commit_counting_style = "minor-then-patch"
//!
//! [versioning.git]
//! tag_pattern = "*v[0-9]*"
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::count::CountingStyle;
use crate::error::{ConfigError, ConfigResult};
use crate::vcs::VcsKind;

/// The configuration for buildver.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// How versions are derived from history.
    pub versioning: VersioningConfig,
}

/// Settings for version derivation.
///
/// Read-only for the duration of a computation; the CLI loads it once and
/// lends it to the engine.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct VersioningConfig {
    /// Which VCS to query.
    pub version_control_system: VcsKind,
    /// Name of the trunk branch used for branch ancestry counts.
    pub main_branch_name: String,
    /// Added to every build number.
    pub number_offset: i64,
    /// Weight of each main-branch commit in the `main-and-branch` style.
    pub branch_commit_limit: u64,
    /// Weight of each minor commit in the `minor-then-patch` styles.
    pub max_patches_per_minor: u64,
    /// Commit prefixes that bump the minor version.
    pub minor_tags: Vec<String>,
    /// Commit prefixes that bump the patch version.
    pub patch_tags: Vec<String>,
    /// Commit prefixes that only bump the build number.
    pub build_tags: Vec<String>,
    /// Counting style for the integer build number.
    pub commit_counting_style: CountingStyle,
    /// Counting style for the patch (and minor increment) of the version.
    pub bundle_version_style: CountingStyle,
    /// Include `Branch: {main}.{since}` in the version data bonus field.
    pub include_branch_count: bool,
    /// Include the working-tree change count in the bonus field.
    pub include_changes: bool,
    /// Git-specific settings.
    pub git: GitSettings,
    /// Plastic SCM-specific settings.
    pub plastic: PlasticSettings,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            version_control_system: VcsKind::Git,
            main_branch_name: "main".to_string(),
            number_offset: 0,
            branch_commit_limit: 100,
            max_patches_per_minor: 20,
            minor_tags: vec!["feat".to_string()],
            patch_tags: vec!["fix".to_string(), "asset".to_string(), "adjust".to_string()],
            build_tags: Vec::new(),
            commit_counting_style: CountingStyle::BothMinorAndPatch,
            bundle_version_style: CountingStyle::MinorThenPatch,
            include_branch_count: false,
            include_changes: false,
            git: GitSettings::default(),
            plastic: PlasticSettings::default(),
        }
    }
}

/// Git-specific settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct GitSettings {
    /// Glob passed to `git describe --match`.
    pub tag_pattern: String,
}

impl Default for GitSettings {
    fn default() -> Self {
        Self {
            tag_pattern: "*v[0-9]*".to_string(),
        }
    }
}

/// Plastic SCM-specific settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PlasticSettings {
    /// Regex that marks a log line as a version tag.
    pub version_tag_pattern: String,
    /// Template passed to `cm log --csformat`.
    ///
    /// Must emit a `Changeset ` header per changeset and a `Branch: ` line for
    /// the `main-and-branch` style to work.
    pub log_format: String,
}

impl Default for PlasticSettings {
    fn default() -> Self {
        Self {
            version_tag_pattern: "^version-tag:".to_string(),
            log_format: "Changeset {changesetid} created on {date}{newline}Branch: {branch}{newline}Comments:{newline}{comment}".to_string(),
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "buildver";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    project_search_root: Option<Utf8PathBuf>,
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/buildver/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Stop the upward search at a directory containing `marker`.
    ///
    /// Default is `.git`, so a repository's config never leaks in from a
    /// parent checkout.
    pub fn with_boundary_marker<S: Into<String>>(mut self, marker: S) -> Self {
        self.boundary_marker = Some(marker.into());
        self
    }

    /// Search all the way to the filesystem root.
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, later files taking precedence, after all
    /// discovered files.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/buildver/config.<ext>`)
    /// 4. Default values
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Deserialize`] when a file is unreadable or a
    /// value is invalid, including an unknown `version_control_system`.
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = self.find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::info!(
            log_level = config.log_level.as_str(),
            vcs = %config.versioning.version_control_system,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load configuration, returning an error if no config file is found.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when no source exists, otherwise as
    /// [`ConfigLoader::load`].
    pub fn load_or_error(self) -> ConfigResult<Config> {
        let has_user = self.include_user_config && self.find_user_config().is_some();
        let has_project = self
            .project_search_root
            .as_ref()
            .and_then(|root| self.find_project_config(root))
            .is_some();

        if !has_user && !has_project && self.explicit_files.is_empty() {
            return Err(ConfigError::NotFound);
        }

        self.load()
    }

    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            // The directory holding the marker is the last one searched
            if let Some(ref marker) = self.boundary_marker
                && dir.join(marker).exists()
            {
                break;
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    fn find_user_config(&self) -> Option<Utf8PathBuf> {
        let config_dir = user_config_dir()?;
        CONFIG_EXTENSIONS
            .iter()
            .map(|ext| config_dir.join(format!("config.{ext}")))
            .find(|path| path.is_file())
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Find the project config file path without loading it.
pub fn find_project_config<P: AsRef<Utf8Path>>(start: P) -> Option<Utf8PathBuf> {
    ConfigLoader::new()
        .with_project_search(start.as_ref())
        .without_boundary_marker()
        .find_project_config(start.as_ref())
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// Get the user config directory path.
///
/// Returns `~/.config/buildver/` on Linux, `~/Library/Application Support/buildver/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.config_dir().to_path_buf()).ok()
}

/// Get the user cache directory path.
pub fn user_cache_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.cache_dir().to_path_buf()).ok()
}

/// Get the user data directory path.
pub fn user_data_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_dir().to_path_buf()).ok()
}

/// Get the local data directory path (machine-specific, not synced).
pub fn user_data_local_dir() -> Option<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(project_dirs()?.data_local_dir().to_path_buf()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(tmp: &TempDir, name: &str, body: &str) -> Utf8PathBuf {
        let path = tmp.path().join(name);
        fs::write(&path, body).unwrap();
        Utf8PathBuf::try_from(path).unwrap()
    }

    fn load_file(path: &Utf8Path) -> ConfigResult<Config> {
        ConfigLoader::new()
            .with_user_config(false)
            .with_file(path)
            .load()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert_eq!(config.versioning, VersioningConfig::default());
    }

    #[test]
    fn test_default_versioning_values() {
        let v = VersioningConfig::default();
        assert_eq!(v.version_control_system, VcsKind::Git);
        assert_eq!(v.main_branch_name, "main");
        assert_eq!(v.number_offset, 0);
        assert_eq!(v.branch_commit_limit, 100);
        assert_eq!(v.max_patches_per_minor, 20);
        assert_eq!(v.minor_tags, ["feat"]);
        assert_eq!(v.patch_tags, ["fix", "asset", "adjust"]);
        assert!(v.build_tags.is_empty());
        assert_eq!(v.commit_counting_style, CountingStyle::BothMinorAndPatch);
        assert_eq!(v.bundle_version_style, CountingStyle::MinorThenPatch);
        assert_eq!(v.git.tag_pattern, "*v[0-9]*");
        assert_eq!(v.plastic.version_tag_pattern, "^version-tag:");
    }

    #[test]
    fn test_loader_builds_with_defaults() {
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load()
            .unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_versioning_section_overrides_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.toml",
            r#"
[versioning]
version_control_system = "plastic"
main_branch_name = "trunk"
number_offset = 1000
minor_tags = ["feature", "feat"]
build_tags = ["ci"]
commit_counting_style = "main-and-branch"
bundle_version_style = "minor-then-patch-and-build"
include_changes = true

[versioning.plastic]
version_tag_pattern = "^release:"
"#,
        );

        let v = load_file(&path).unwrap().versioning;
        assert_eq!(v.version_control_system, VcsKind::PlasticScm);
        assert_eq!(v.main_branch_name, "trunk");
        assert_eq!(v.number_offset, 1000);
        assert_eq!(v.minor_tags, ["feature", "feat"]);
        assert_eq!(v.patch_tags, ["fix", "asset", "adjust"]);
        assert_eq!(v.build_tags, ["ci"]);
        assert_eq!(v.commit_counting_style, CountingStyle::MainAndBranch);
        assert_eq!(
            v.bundle_version_style,
            CountingStyle::MinorThenPatchAndBuild
        );
        assert!(v.include_changes);
        assert!(!v.include_branch_count);
        assert_eq!(v.plastic.version_tag_pattern, "^release:");
        assert_eq!(v.plastic.log_format, PlasticSettings::default().log_format);
    }

    #[test]
    fn test_yaml_and_json_versioning_sections() {
        let tmp = TempDir::new().unwrap();
        let yaml = write_config(
            &tmp,
            "config.yaml",
            "versioning:\n  max_patches_per_minor: 50\n  version_control_system: cm\n",
        );
        let v = load_file(&yaml).unwrap().versioning;
        assert_eq!(v.max_patches_per_minor, 50);
        assert_eq!(v.version_control_system, VcsKind::PlasticScm);

        let json = write_config(
            &tmp,
            "config.json",
            r#"{"versioning": {"patch_tags": ["hotfix"], "commit_counting_style": "patch-and-build"}}"#,
        );
        let v = load_file(&json).unwrap().versioning;
        assert_eq!(v.patch_tags, ["hotfix"]);
        assert_eq!(v.commit_counting_style, CountingStyle::PatchAndBuild);
    }

    #[test]
    fn test_unknown_vcs_kind_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.toml",
            "[versioning]\nversion_control_system = \"svn\"\n",
        );
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("svn"), "{err}");
    }

    #[test]
    fn test_unknown_counting_style_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(
            &tmp,
            "config.toml",
            "[versioning]\ncommit_counting_style = \"all-of-them\"\n",
        );
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();
        let base = write_config(
            &tmp,
            "base.toml",
            "log_level = \"warn\"\n[versioning]\nnumber_offset = 5\n",
        );
        let over = write_config(&tmp, "override.toml", "[versioning]\nnumber_offset = 7\n");

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base)
            .with_file(&over)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.versioning.number_offset, 7);
    }

    #[test]
    fn test_project_config_discovery() {
        let tmp = TempDir::new().unwrap();
        let project_dir = tmp.path().join("project");
        let sub_dir = project_dir.join("Assets").join("Scripts");
        fs::create_dir_all(&sub_dir).unwrap();
        fs::write(
            project_dir.join(".buildver.toml"),
            "[versioning]\nmain_branch_name = \"develop\"\n",
        )
        .unwrap();

        let sub_dir = Utf8PathBuf::try_from(sub_dir).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .with_project_search(&sub_dir)
            .load()
            .unwrap();

        assert_eq!(config.versioning.main_branch_name, "develop");
        assert!(find_project_config(&sub_dir).is_some());
    }

    #[test]
    fn test_boundary_marker_stops_search() {
        let tmp = TempDir::new().unwrap();
        let parent = tmp.path().join("parent");
        let child = parent.join("child");
        let work = child.join("work");
        fs::create_dir_all(&work).unwrap();
        fs::write(parent.join(".buildver.toml"), r#"log_level = "warn""#).unwrap();
        fs::create_dir(child.join(".git")).unwrap();

        let work = Utf8PathBuf::try_from(work).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_boundary_marker(".git")
            .with_project_search(&work)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn test_config_beside_boundary_marker_is_found() {
        let tmp = TempDir::new().unwrap();
        let repo = tmp.path().join("repo");
        let src = repo.join("src");
        fs::create_dir_all(&src).unwrap();
        fs::create_dir(repo.join(".git")).unwrap();
        fs::write(repo.join(".buildver.toml"), r#"log_level = "warn""#).unwrap();

        let src = Utf8PathBuf::try_from(src).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&src)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_load_or_error_fails_when_no_config() {
        let result = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker()
            .load_or_error();

        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_load_or_error_succeeds_with_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = write_config(&tmp, "config.toml", r#"log_level = "debug""#);

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&path)
            .load_or_error()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_user_config_dir() {
        if let Some(path) = user_config_dir() {
            assert!(path.as_str().contains("buildver"));
        }
    }

    #[test]
    fn test_config_round_trips_through_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"version_control_system\":\"git\""));
        assert!(json.contains("\"commit_counting_style\":\"both-minor-and-patch\""));
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
