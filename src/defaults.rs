//! Default values for scene-merge configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Environment variable that points at the pipeline catalog.
pub const CONFIG_ENV: &str = "SCENE_MERGE_CONFIG";

/// Environment variable that overrides the catalog's project.
pub const PROJECT_ENV: &str = "SCENE_MERGE_PROJECT";

/// File name of the pipeline catalog.
pub const CONFIG_FILE_NAME: &str = "pipeline.yaml";

/// Returns the default pipeline catalog path.
///
/// Uses the platform-appropriate configuration directory:
/// - Linux: `~/.config/scene-merge/pipeline.yaml` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/scene-merge/pipeline.yaml`
/// - Windows: `{FOLDERID_RoamingAppData}\scene-merge\pipeline.yaml`
///
/// Falls back to `pipeline.yaml` in the current directory if the platform
/// configuration directory cannot be determined.
///
/// This can be overridden by the `--config` CLI flag or the
/// `SCENE_MERGE_CONFIG` environment variable.
pub fn default_config_path() -> PathBuf {
    match dirs::config_dir() {
        Some(dir) => dir.join("scene-merge").join(CONFIG_FILE_NAME),
        None => PathBuf::from(CONFIG_FILE_NAME),
    }
}
