//! # Resolve Command Implementation
//!
//! This module implements the `resolve` subcommand, which maps a locator back
//! to the file it currently points at.

use anyhow::{bail, Result};
use clap::Args;

use scene_merge::uri::resolve_path;

use super::Session;
use crate::cli::GlobalArgs;

/// Resolve a locator to a file path
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// The locator, e.g. `tank:/P3/usd_asset_publish?Step=MDL&...`.
    #[arg(value_name = "LOCATOR")]
    pub locator: String,
}

/// Execute the `resolve` command.
pub fn execute(args: ResolveArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::load(global)?;
    match resolve_path(&session.catalog, &args.locator) {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("Could not resolve {}", args.locator),
    }
}
