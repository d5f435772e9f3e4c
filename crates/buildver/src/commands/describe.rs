//! Describe command: show the latest version tag and HEAD's distance from it.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use buildver_core::describe::DescribeResult;
use buildver_core::engine::{DescribeOutcome, VersionEngine};
use buildver_core::vcs::VcsKind;

use super::{RunContext, VersioningOverrides, open_backend};

/// Arguments for the `describe` subcommand.
#[derive(Args, Debug, Default)]
pub struct DescribeArgs {
    /// Versioning settings given on the command line
    #[command(flatten)]
    pub overrides: VersioningOverrides,
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
enum DescribeOutput {
    Found {
        vcs: VcsKind,
        #[serde(flatten)]
        describe: DescribeResult,
    },
    NoVersionTag {
        vcs: VcsKind,
        detail: String,
    },
    VcsUnavailable {
        vcs: VcsKind,
        reason: String,
    },
}

impl DescribeOutput {
    fn new(vcs: VcsKind, outcome: DescribeOutcome) -> Self {
        match outcome {
            DescribeOutcome::Found(describe) => Self::Found { vcs, describe },
            DescribeOutcome::NoVersionTag { detail } => Self::NoVersionTag { vcs, detail },
            DescribeOutcome::Unavailable { reason } => Self::VcsUnavailable { vcs, reason },
        }
    }
}

/// Print the parsed tag lookup.
#[instrument(name = "cmd_describe", skip_all, fields(json_output))]
pub fn cmd_describe(args: DescribeArgs, ctx: &RunContext<'_>) -> anyhow::Result<()> {
    debug!(json_output = ctx.json, "executing describe command");

    let versioning = args.overrides.apply(&ctx.config.versioning);
    let backend = open_backend(&versioning, ctx.cwd)?;
    let outcome = VersionEngine::new(&versioning, backend.as_ref())
        .describe()
        .context("failed to describe HEAD")?;
    let output = DescribeOutput::new(backend.kind(), outcome);

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    match output {
        DescribeOutput::Found { describe, .. } => {
            println!("{}: {}", "Tag".dimmed(), describe.tag.cyan());
            if describe.has_minor {
                println!(
                    "{}: {}.{}",
                    "Version".dimmed(),
                    describe.major,
                    describe.minor
                );
            } else {
                println!(
                    "{}: {} {}",
                    "Version".dimmed(),
                    describe.major,
                    "(no minor in tag)".yellow()
                );
            }
            println!(
                "{}: {}",
                "Commits since tag".dimmed(),
                describe.commits_since_tag
            );
            println!("{}: {}", "HEAD".dimmed(), describe.hash.green());
        }
        DescribeOutput::NoVersionTag { detail, .. } => {
            println!("  {} No version tag found", "○".yellow());
            if !ctx.quiet {
                eprintln!("{}", detail.dimmed());
            }
        }
        DescribeOutput::VcsUnavailable { vcs, reason } => {
            println!("  {} {} is unavailable here", "○".yellow(), vcs);
            if !ctx.quiet {
                eprintln!("{}", reason.dimmed());
            }
        }
    }

    Ok(())
}
