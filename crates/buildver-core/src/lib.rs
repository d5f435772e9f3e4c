//! Core library for buildver.
//!
//! Derives a semantic version and a monotonically increasing build number
//! from a repository's commit log and version tags. Git and Plastic SCM are
//! supported by shelling out to their command-line tools.
//!
//! # Modules
//!
//! - [`classify`] - Commit message classification by prefix tags
//! - [`config`] - Configuration loading and management
//! - [`count`] - Counting styles and build number arithmetic
//! - [`describe`] - Parsing the latest version tag out of VCS output
//! - [`engine`] - Version derivation over a VCS backend
//! - [`error`] - Error types and result aliases
//! - [`vcs`] - Git and Plastic SCM backends
//! - [`version`] - Version strings, platform build numbers, version records
//!
//! # Quick Start
//!
//! ```no_run
//! use buildver_core::{ConfigLoader, VersionEngine, vcs};
//! use camino::Utf8Path;
//!
//! let config = ConfigLoader::new()
//!     .with_user_config(true)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! let backend = vcs::open(&config.versioning, Utf8Path::new(".")).expect("backend");
//! let report = VersionEngine::new(&config.versioning, backend.as_ref())
//!     .report()
//!     .expect("derive version");
//!
//! println!("{} ({})", report.version, report.build_number);
//! ```
#![deny(unsafe_code)]

pub mod classify;

pub mod config;

pub mod count;

pub mod describe;

pub mod engine;

pub mod error;

pub mod vcs;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel, VersioningConfig};

pub use count::{CountingStyle, Counter};

pub use engine::{DerivationStatus, DescribeOutcome, VersionEngine, VersionReport};

pub use error::{ConfigError, ConfigResult, VersioningError, VersioningResult};

pub use vcs::{VcsKind, VersionControl};

pub use version::{FullVersionOptions, PlatformTarget, VersionData, VersionResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
