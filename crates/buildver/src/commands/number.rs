//! Number command: print the build number, optionally in a platform's form.

use anyhow::Context;
use clap::Args;
use serde::Serialize;
use tracing::{debug, instrument};

use buildver_core::engine::{DescribeOutcome, VersionEngine};
use buildver_core::version::{PlatformBuildNumber, PlatformTarget};

use super::{RunContext, VersioningOverrides, open_backend, warn_unavailable};

/// Arguments for the `number` subcommand.
#[derive(Args, Debug, Default)]
pub struct NumberArgs {
    /// Versioning settings given on the command line
    #[command(flatten)]
    pub overrides: VersioningOverrides,

    /// Print the number in this platform's build-number form
    #[arg(long, value_enum)]
    pub platform: Option<PlatformTarget>,
}

#[derive(Serialize)]
struct NumberOutput {
    number: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<PlatformOutput>,
}

#[derive(Serialize)]
struct PlatformOutput {
    target: PlatformTarget,
    field: &'static str,
    value: PlatformBuildNumber,
}

impl NumberOutput {
    fn new(number: i64, platform: Option<PlatformTarget>) -> Self {
        Self {
            number,
            platform: platform.map(|target| {
                let value = target.build_number(number);
                PlatformOutput {
                    target,
                    field: value.field_name(),
                    value,
                }
            }),
        }
    }

    fn text(&self) -> String {
        self.platform
            .as_ref()
            .map_or_else(|| self.number.to_string(), |p| p.value.to_string())
    }
}

/// Derive and print the build number.
#[instrument(name = "cmd_number", skip_all, fields(json_output))]
pub fn cmd_number(args: NumberArgs, ctx: &RunContext<'_>) -> anyhow::Result<()> {
    debug!(json_output = ctx.json, platform = ?args.platform, "executing number command");

    let versioning = args.overrides.apply(&ctx.config.versioning);
    let backend = open_backend(&versioning, ctx.cwd)?;
    let engine = VersionEngine::new(&versioning, backend.as_ref());
    let number = engine
        .build_number()
        .context("failed to derive build number")?;

    // The number never depends on the tag; describe only tells us whether to warn
    match engine.describe() {
        Ok(DescribeOutcome::Unavailable { reason }) => {
            warn_unavailable(versioning.version_control_system, &reason, ctx.quiet);
        }
        Ok(_) => {}
        Err(e) => debug!(error = %e, "tag lookup failed, build number unaffected"),
    }

    let output = NumberOutput::new(number, args.platform);
    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", output.text());
    }
    Ok(())
}
