//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `scene-merge` command-line tool. Each subcommand is defined in its own file
//! to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the global options
//!   and performs the command's logic.
//!
//! Commands load the pipeline catalog through [`Session`], which also wires
//! the catalog into the collaborators the merge engine expects.

pub mod publish_asset;
pub mod publish_shot;
pub mod resolve;
pub mod status;
pub mod uri;

use anyhow::{Context, Result};
use log::debug;

use scene_merge::catalog::Catalog;
use scene_merge::defaults::default_config_path;
use scene_merge::document::UsdaEngine;
use scene_merge::merge::Collaborators;

use crate::cli::GlobalArgs;

/// A loaded catalog and the project to work in.
pub struct Session {
    pub catalog: Catalog,
    pub project: String,
}

impl Session {
    /// Loads the catalog named by the global options.
    pub fn load(global: &GlobalArgs) -> Result<Self> {
        let config_path = global.config.clone().unwrap_or_else(default_config_path);
        debug!("Loading pipeline catalog from {}", config_path.display());

        let catalog = Catalog::from_file(&config_path).with_context(|| {
            format!("Failed to load config from {}", config_path.display())
        })?;
        let project = global
            .project
            .clone()
            .or_else(|| catalog.project().map(str::to_string))
            .context("No project set: pass --project or set 'project:' in the catalog")?;

        Ok(Self { catalog, project })
    }

    /// A document engine that resolves locators through the catalog.
    pub fn documents(&self) -> UsdaEngine<'_> {
        UsdaEngine::new(&self.catalog)
    }

    pub fn collaborators<'a>(&'a self, documents: &'a UsdaEngine<'a>) -> Collaborators<'a> {
        Collaborators {
            db: &self.catalog,
            templates: &self.catalog,
            documents,
            recorder: self.catalog.publish_log(),
        }
    }
}
