//! Command implementations

pub mod describe;

pub mod doctor;

pub mod info;

pub mod number;

pub mod version;

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::debug;

use buildver_core::config::{Config, VersioningConfig};
use buildver_core::engine::{DerivationStatus, UNKNOWN_VERSION, VersionReport};
use buildver_core::vcs::{self, VcsKind, VersionControl};
use buildver_core::CountingStyle;

/// What every versioning command receives from `main`.
#[derive(Debug, Clone, Copy)]
pub struct RunContext<'a> {
    /// Global `--json` flag.
    pub json: bool,
    /// Global `--quiet` flag; suppresses warnings on stderr.
    pub quiet: bool,
    /// Loaded configuration.
    pub config: &'a Config,
    /// Working directory the VCS runs in.
    pub cwd: &'a Utf8Path,
}

/// Command-line overrides for the `[versioning]` config section.
#[derive(Args, Debug, Default, Clone)]
pub struct VersioningOverrides {
    /// Version control system to query
    #[arg(long, value_enum, value_name = "VCS")]
    pub vcs: Option<VcsKind>,

    /// Counting style for the build number
    #[arg(long, value_enum, value_name = "STYLE")]
    pub style: Option<CountingStyle>,

    /// Counting style for the version's minor and patch
    #[arg(long, value_enum, value_name = "STYLE")]
    pub bundle_style: Option<CountingStyle>,

    /// Name of the main branch
    #[arg(long, value_name = "BRANCH")]
    pub main_branch: Option<String>,

    /// Added to the build number
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    pub offset: Option<i64>,
}

impl VersioningOverrides {
    /// `base` with every given override applied.
    pub fn apply(&self, base: &VersioningConfig) -> VersioningConfig {
        let mut config = base.clone();
        if let Some(vcs) = self.vcs {
            config.version_control_system = vcs;
        }
        if let Some(style) = self.style {
            config.commit_counting_style = style;
        }
        if let Some(style) = self.bundle_style {
            config.bundle_version_style = style;
        }
        if let Some(ref branch) = self.main_branch {
            config.main_branch_name.clone_from(branch);
        }
        if let Some(offset) = self.offset {
            config.number_offset = offset;
        }
        config
    }
}

/// Open the configured VCS backend in `cwd`.
pub fn open_backend(
    config: &VersioningConfig,
    cwd: &Utf8Path,
) -> anyhow::Result<Box<dyn VersionControl>> {
    debug!(vcs = %config.version_control_system, %cwd, "opening backend");
    vcs::open(config, cwd).context("failed to set up version control")
}

/// Report a fallback outcome on stderr, unless quiet.
pub fn warn_fallback(report: &VersionReport, quiet: bool) {
    if quiet {
        return;
    }
    match report.status {
        DerivationStatus::Derived => {}
        DerivationStatus::NoVersionTag { ref detail } => {
            eprintln!(
                "{} no version tag found, counting from 0.0 ({})",
                "warning:".yellow().bold(),
                detail.dimmed()
            );
        }
        DerivationStatus::VcsUnavailable { ref reason } => {
            warn_unavailable(report.vcs, reason, quiet);
        }
    }
}

/// Report an unusable VCS on stderr, unless quiet.
pub fn warn_unavailable(vcs: VcsKind, reason: &str, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!(
        "{} {} unavailable, version is {} ({})",
        "warning:".yellow().bold(),
        vcs,
        UNKNOWN_VERSION,
        reason.dimmed()
    );
}
