//! # Publish Asset Command Implementation
//!
//! This module implements the `publish-asset` subcommand. It stacks the steps
//! of one asset variant into that variant's merged artifact, then gathers all
//! variants of the asset into its multi-variant artifact.
//!
//! Each of the two publishes is skipped when its published artifact is
//! already up to date, unless `--force` is given.

use anyhow::Result;
use clap::Args;

use scene_merge::merge::PublishOutcome;
use scene_merge::presets::{self, PublishOptions};
use scene_merge::production::AssetId;

use super::Session;
use crate::cli::GlobalArgs;

/// Publish an asset variant and the asset's multi-variant artifact
#[derive(Args, Debug)]
pub struct PublishAssetArgs {
    /// Asset id in the production database.
    #[arg(long, value_name = "ID")]
    pub asset: u64,

    /// Variant whose steps are merged (e.g. AvA).
    #[arg(long, value_name = "NAME")]
    pub variant: String,

    /// Variants of the multi-variant artifact; discovered when omitted.
    #[arg(long, value_name = "NAMES", value_delimiter = ',')]
    pub variants: Option<Vec<String>>,

    /// Steps to merge, in order; defaults to MDL,LAY,FX,LDV.
    #[arg(long, value_name = "STEPS", value_delimiter = ',')]
    pub steps: Option<Vec<String>>,

    /// Template of the published artifacts.
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,

    /// Flatten the composition into the published file.
    #[arg(long)]
    pub flatten: bool,

    /// Publish even when the published artifact is up to date.
    #[arg(long)]
    pub force: bool,
}

/// Execute the `publish-asset` command.
pub fn execute(args: PublishAssetArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::load(global)?;
    let documents = session.documents();
    let collaborators = session.collaborators(&documents);

    let options = PublishOptions {
        template: args.template,
        steps: args.steps,
        flatten: args.flatten,
        force: args.force,
    };
    let report = presets::publish_asset(
        AssetId(args.asset),
        &args.variant,
        args.variants,
        &session.project,
        &options,
        collaborators,
    )?;

    for step in &report.variant_skipped_steps {
        println!("⚠️  Skipped step without a task: {}", step);
    }
    print_outcome(&format!("{} variant", args.variant), &report.variant);

    for variant in &report.main_skipped_variants {
        println!("⚠️  Skipped variant without a task: {}", variant);
    }
    print_outcome("main", &report.main);
    Ok(())
}

pub(crate) fn print_outcome(label: &str, outcome: &PublishOutcome) {
    match outcome {
        PublishOutcome::Skipped => println!("⏭️  {}: up to date, nothing published", label),
        PublishOutcome::Published(artifact) => println!(
            "✅ {}: published version {} to {}",
            label,
            artifact.version,
            artifact.path.display()
        ),
    }
}
