//! # Publish Shot Command Implementation
//!
//! This module implements the `publish-shot` subcommand, which stacks the
//! latest artifacts of a shot's steps into the shot's merged artifact.

use anyhow::Result;
use clap::Args;

use scene_merge::merge::variants::MAIN_VARIANT;
use scene_merge::presets::{self, PublishOptions};
use scene_merge::production::ShotId;

use super::publish_asset::print_outcome;
use super::Session;
use crate::cli::GlobalArgs;

/// Publish the merged artifact of a shot
#[derive(Args, Debug)]
pub struct PublishShotArgs {
    /// Shot id in the production database.
    #[arg(long, value_name = "ID")]
    pub shot: u64,

    /// Variant to merge.
    #[arg(long, value_name = "NAME", default_value = MAIN_VARIANT)]
    pub variant: String,

    /// Steps to merge, in order; defaults to BLD,LAY,ANM,CFX,FX,LGT.
    #[arg(long, value_name = "STEPS", value_delimiter = ',')]
    pub steps: Option<Vec<String>>,

    /// Template of the published artifact.
    #[arg(long, value_name = "NAME")]
    pub template: Option<String>,

    /// Flatten the composition into the published file.
    #[arg(long)]
    pub flatten: bool,

    /// Publish even when a published artifact exists.
    #[arg(long)]
    pub force: bool,
}

/// Execute the `publish-shot` command.
pub fn execute(args: PublishShotArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::load(global)?;
    let documents = session.documents();

    let options = PublishOptions {
        template: args.template,
        steps: args.steps,
        flatten: args.flatten,
        force: args.force,
    };
    let report = presets::publish_shot(
        ShotId(args.shot),
        &args.variant,
        &session.project,
        &options,
        session.collaborators(&documents),
    )?;

    for step in &report.skipped_steps {
        println!("⚠️  Skipped step without a task: {}", step);
    }
    print_outcome(&format!("shot {}", args.shot), &report.outcome);
    Ok(())
}
