//! Shared test utilities for integration and E2E tests.
//!
//! This module provides a pipeline catalog fixture and helpers to put
//! published step artifacts on disk where the catalog expects them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_pipeline()
//!         .with_asset_artifact("AvA_MDL", 1, layers::MODEL);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::layers;
    pub use super::TestFixture;
}

/// Pipeline catalogs for testing.
#[allow(dead_code)]
pub mod configs {
    /// One asset with two variants and one shot.
    pub const PIPELINE: &str = r#"
project: p3
root: publish
templates:
  usd_asset_publish:
    context: asset
    path: "{root}/assets/{Asset}/{variant_name}_{Step}/v{version:03}/{Asset}.usda"
  usd_shot_publish:
    context: shot
    path: "{root}/shots/{Shot}/{variant_name}_{Step}/v{version:03}/{Shot}.usda"
assets:
  - { id: 5633, name: propTestoid }
shots:
  - { id: 4462, name: 99_TST_80 }
tasks:
  - { id: 1, asset: 5633, step: MDL, variant: AvA }
  - { id: 2, asset: 5633, step: LDV, variant: AvA }
  - { id: 3, asset: 5633, step: ASS, variant: AvA }
  - { id: 4, asset: 5633, step: MDL, variant: AvB }
  - { id: 5, asset: 5633, step: ASS, variant: AvB }
  - { id: 6, asset: 5633, step: ASS, variant: main }
  - { id: 21, shot: 4462, step: LAY, variant: main }
  - { id: 22, shot: 4462, step: ANM, variant: main }
  - { id: 29, shot: 4462, step: SHT, variant: main }
"#;

    /// A catalog whose task points at an asset that does not exist.
    pub const DANGLING_TASK: &str = r#"
root: publish
templates:
  usd_asset_publish:
    context: asset
    path: "{root}/{Asset}/v{version:03}/{Asset}.usda"
tasks:
  - { id: 1, asset: 42, step: MDL, variant: AvA }
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "invalid: yaml: content:";
}

/// Step artifacts as a DCC would export them.
#[allow(dead_code)]
pub mod layers {
    pub const MODEL: &str = r#"#usda 1.0
(
    defaultPrim = "propTestoid"
)

def Xform "propTestoid" (
    kind = "component"
)
{
    def Mesh "geo"
    {
        int[] faceVertexCounts = [4]
    }
}
"#;

    pub const LOOKDEV: &str = r#"#usda 1.0
(
    defaultPrim = "propTestoid"
)

over "propTestoid"
{
    def Material "shader"
    {
    }
}
"#;

    pub const LAYOUT: &str = r#"#usda 1.0

def Xform "set"
{
    double3 xformOp:translate = (1, 0, 0)
}
"#;

    pub const ANIMATION: &str = r#"#usda 1.0

over "set"
{
    double3 xformOp:translate = (2, 0, 0)
}
"#;
}

/// A temporary pipeline: catalog file, publish root and publish log.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `pipeline.yaml` catalog with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.temp_dir
            .child("pipeline.yaml")
            .write_str(content)
            .expect("Failed to write config file");
        self
    }

    /// Add the standard pipeline catalog.
    pub fn with_pipeline(self) -> Self {
        self.with_config(configs::PIPELINE)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Put a published artifact of an asset task on disk, e.g. `AvA_MDL`.
    pub fn with_asset_artifact(self, task: &str, version: u32, content: &str) -> Self {
        let path = Self::asset_artifact_rel(task, version);
        self.with_file(&path, content)
    }

    /// Put a published artifact of a shot task on disk, e.g. `main_ANM`.
    pub fn with_shot_artifact(self, task: &str, version: u32, content: &str) -> Self {
        let path = Self::shot_artifact_rel(task, version);
        self.with_file(&path, content)
    }

    fn asset_artifact_rel(task: &str, version: u32) -> String {
        format!("publish/assets/propTestoid/{}/v{:03}/propTestoid.usda", task, version)
    }

    fn shot_artifact_rel(task: &str, version: u32) -> String {
        format!("publish/shots/99_TST_80/{}/v{:03}/99_TST_80.usda", task, version)
    }

    /// Where an asset task's artifact of `version` lives.
    pub fn asset_artifact(&self, task: &str, version: u32) -> PathBuf {
        self.path().join(Self::asset_artifact_rel(task, version))
    }

    /// Where a shot task's artifact of `version` lives.
    pub fn shot_artifact(&self, task: &str, version: u32) -> PathBuf {
        self.path().join(Self::shot_artifact_rel(task, version))
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.temp_dir.path().join("pipeline.yaml")
    }

    /// Get the path to the publish log.
    pub fn publish_log_path(&self) -> PathBuf {
        self.temp_dir.path().join("publish").join("publishes.jsonl")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
