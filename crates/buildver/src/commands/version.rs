//! Version command: print the derived version, optionally decorated, and
//! optionally persist a version record.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use buildver_core::engine::{VersionEngine, VersionReport};
use buildver_core::version::{FullVersionOptions, VersionData};

use super::{RunContext, VersioningOverrides, open_backend, warn_fallback};

/// Arguments for the `version` subcommand.
#[derive(Args, Debug, Default)]
pub struct VersionArgs {
    /// Versioning settings given on the command line
    #[command(flatten)]
    pub overrides: VersioningOverrides,

    /// Append the HEAD hash
    #[arg(long)]
    pub hash: bool,

    /// Append the build number in parentheses
    #[arg(long)]
    pub build_number: bool,

    /// Append commits since main and the working-tree change count
    #[arg(long)]
    pub status: bool,

    /// Write the version record as JSON to FILE
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl VersionArgs {
    const fn options(&self) -> FullVersionOptions {
        FullVersionOptions {
            include_hash: self.hash,
            include_build_number: self.build_number,
            commit_status: self.status,
        }
    }
}

#[derive(Serialize)]
struct VersionOutput<'a> {
    full: &'a str,
    #[serde(flatten)]
    report: &'a VersionReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

/// Derive and print the version.
#[instrument(name = "cmd_version", skip_all, fields(json_output))]
pub fn cmd_version(args: VersionArgs, ctx: &RunContext<'_>) -> anyhow::Result<()> {
    debug!(json_output = ctx.json, "executing version command");

    let versioning = args.overrides.apply(&ctx.config.versioning);
    let backend = open_backend(&versioning, ctx.cwd)?;
    let engine = VersionEngine::new(&versioning, backend.as_ref());

    let report = engine.report().context("failed to derive version")?;
    warn_fallback(&report, ctx.quiet);
    let full = engine.decorate(&report, args.options());

    let written = match args.output {
        Some(ref path) => {
            let data = engine.version_data(&report);
            write_version_data(path, data)?;
            Some(path.display().to_string())
        }
        None => None,
    };

    if ctx.json {
        let output = VersionOutput {
            full: &full,
            report: &report,
            output: written,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{full}");
        if let Some(path) = written
            && !ctx.quiet
        {
            eprintln!("  {} Wrote {}", "✓".green(), path.cyan());
        }
    }

    Ok(())
}

/// Write `data` to `path`, keeping the `debug` note of any existing record.
fn write_version_data(path: &Path, mut data: VersionData) -> anyhow::Result<()> {
    if let Some(previous) = read_version_data(path)? {
        data.debug = previous.debug;
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&data)?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), version = %data.version, "wrote version record");
    Ok(())
}

fn read_version_data(path: &Path) -> anyhow::Result<Option<VersionData>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if text.trim().is_empty() {
        return Ok(None);
    }
    let data = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a version record", path.display()))?;
    Ok(Some(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(version: &str) -> VersionData {
        VersionData {
            version: version.into(),
            number: 12,
            hash: "gabc".into(),
            ..VersionData::default()
        }
    }

    #[test]
    fn writes_new_record() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("out").join("version.json");
        write_version_data(&path, record("1.2.3")).unwrap();

        let written = read_version_data(&path).unwrap().unwrap();
        assert_eq!(written.version, "1.2.3");
        assert_eq!(written.number, 12);
        assert!(written.debug.is_none());
    }

    #[test]
    fn keeps_existing_debug_note() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("version.json");
        std::fs::write(&path, r#"{"version":"1.0.0","number":1,"debug":"qa"}"#).unwrap();

        write_version_data(&path, record("1.1.0")).unwrap();

        let written = read_version_data(&path).unwrap().unwrap();
        assert_eq!(written.version, "1.1.0");
        assert_eq!(written.debug.as_deref(), Some("qa"));
    }

    #[test]
    fn rejects_non_record_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("version.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(write_version_data(&path, record("1.0.0")).is_err());
    }

    #[test]
    fn options_follow_flags() {
        let args = VersionArgs {
            hash: true,
            status: true,
            ..VersionArgs::default()
        };
        let options = args.options();
        assert!(options.include_hash);
        assert!(!options.include_build_number);
        assert!(options.commit_status);
    }
}
