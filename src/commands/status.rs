//! # Status Command Implementation
//!
//! This module implements the `status` subcommand. It runs the same
//! up-to-date checks as the publish commands without writing anything, and
//! lists the steps or variants that would be skipped for lack of a task.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::{bail, Result};
use clap::Args;

use scene_merge::merge::steps::StepMerge;
use scene_merge::merge::variants::{VariantMerge, ASSET_MERGE_STEP, MAIN_VARIANT};
use scene_merge::merge::PublishStrategy;
use scene_merge::presets::{ASSET_STEPS, ASSET_TEMPLATE, SHOT_MERGE_STEP, SHOT_STEPS, SHOT_TEMPLATE};
use scene_merge::production::{AssetId, EntityRef, ProductionContext, ShotId};

use super::Session;
use crate::cli::GlobalArgs;

/// Report whether an asset or shot needs publishing
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Asset id in the production database.
    #[arg(long, value_name = "ID", conflicts_with = "shot", required_unless_present = "shot")]
    pub asset: Option<u64>,

    /// Shot id in the production database.
    #[arg(long, value_name = "ID")]
    pub shot: Option<u64>,

    /// Variant to check; required for assets, `main` for shots.
    #[arg(long, value_name = "NAME")]
    pub variant: Option<String>,

    /// Template of the published artifacts.
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,
}

/// Execute the `status` command.
pub fn execute(args: StatusArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::load(global)?;
    let documents = session.documents();
    let collaborators = session.collaborators(&documents);

    match (args.asset, args.shot) {
        (Some(asset), None) => {
            let Some(variant) = args.variant else {
                bail!("--variant is required when checking an asset");
            };
            let template = args.template.as_deref().unwrap_or(ASSET_TEMPLATE);
            let context = ProductionContext::new(
                EntityRef::Asset(AssetId(asset)),
                variant.as_str(),
                ASSET_MERGE_STEP,
                template,
                session.project.as_str(),
            );
            let steps = StepMerge::new(context, ASSET_STEPS, collaborators)?;
            report(&format!("{} variant", variant), steps.requires_publish()?, steps.skipped());

            let main = VariantMerge::discover(AssetId(asset), template, &session.project, collaborators)?;
            report(MAIN_VARIANT, main.requires_publish()?, main.skipped());
        }
        (None, Some(shot)) => {
            let variant = args.variant.as_deref().unwrap_or(MAIN_VARIANT);
            let context = ProductionContext::new(
                EntityRef::Shot(ShotId(shot)),
                variant,
                SHOT_MERGE_STEP,
                args.template.as_deref().unwrap_or(SHOT_TEMPLATE),
                session.project.as_str(),
            );
            let steps = StepMerge::new(context, SHOT_STEPS, collaborators)?;
            report(&format!("shot {}", shot), steps.requires_publish()?, steps.skipped());
        }
        _ => bail!("Pass exactly one of --asset or --shot"),
    }
    Ok(())
}

fn report(label: &str, required: bool, skipped: &[String]) {
    if required {
        println!("📦 {}: publish required", label);
    } else {
        println!("✅ {}: up to date", label);
    }
    if !skipped.is_empty() {
        println!("   missing tasks: {}", skipped.join(", "));
    }
}
