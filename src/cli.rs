//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands;

/// Scene Merge - Compose and publish versioned USD scenes
#[derive(Parser, Debug)]
#[command(name = "scene-merge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the pipeline catalog.
    ///
    /// Defaults to `pipeline.yaml` in the platform configuration directory
    /// (`~/.config/scene-merge` on Linux).
    #[arg(long, global = true, value_name = "FILE", env = "SCENE_MERGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project code, overriding the one in the catalog.
    #[arg(long, global = true, value_name = "PROJECT", env = "SCENE_MERGE_PROJECT")]
    pub project: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Publish one variant of an asset, then its multi-variant artifact
    PublishAsset(commands::publish_asset::PublishAssetArgs),

    /// Publish the merged artifact of a shot
    PublishShot(commands::publish_shot::PublishShotArgs),

    /// Report whether an asset or shot needs publishing
    Status(commands::status::StatusArgs),

    /// Print the locator of a task's artifact
    Uri(commands::uri::UriArgs),

    /// Resolve a locator to a file path
    Resolve(commands::resolve::ResolveArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        match self.command {
            Commands::PublishAsset(args) => commands::publish_asset::execute(args, &self.global),
            Commands::PublishShot(args) => commands::publish_shot::execute(args, &self.global),
            Commands::Status(args) => commands::status::execute(args, &self.global),
            Commands::Uri(args) => commands::uri::execute(args, &self.global),
            Commands::Resolve(args) => commands::resolve::execute(args, &self.global),
        }
    }
}

/// Installs the logger. `RUST_LOG` wins over `--log-level`.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    // A logger may already be installed when running under a test harness
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
