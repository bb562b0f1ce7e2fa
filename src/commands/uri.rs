//! # URI Command Implementation
//!
//! This module implements the `uri` subcommand, which prints the locator of
//! a task's artifact as the composition engine would write it.

use anyhow::Result;
use clap::Args;

use scene_merge::production::TaskId;
use scene_merge::uri::{UriBuilder, LATEST};

use super::Session;
use crate::cli::GlobalArgs;

/// Print the locator of a task's artifact
#[derive(Args, Debug)]
pub struct UriArgs {
    /// Task id in the production database.
    #[arg(long, value_name = "ID")]
    pub task: u64,

    /// Template of the artifact.
    #[arg(long, value_name = "NAME")]
    pub template: String,

    /// Version rule: `latest` or a version number.
    #[arg(long, value_name = "VERSION", default_value = LATEST)]
    pub version: String,
}

/// Execute the `uri` command.
pub fn execute(args: UriArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::load(global)?;
    let uris = UriBuilder::new(&session.catalog, &session.catalog);
    let locator = uris.build_task_uri(
        &session.project.to_uppercase(),
        &args.template,
        TaskId(args.task),
        &args.version,
    )?;
    println!("{}", locator);
    Ok(())
}
