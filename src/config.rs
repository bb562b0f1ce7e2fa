//! # Pipeline Configuration
//!
//! This module defines the YAML pipeline catalog that backs the bundled
//! collaborators: the production entities and tasks, the path templates of
//! published artifacts, and where the publish log lives.
//!
//! ## Example
//!
//! ```yaml
//! project: P3
//! root: publish
//! publish_log: publish/publishes.jsonl
//! templates:
//!   usd_asset_publish:
//!     context: asset
//!     path: "{root}/{Asset}/{variant_name}_{Step}/v{version:03}/{Asset}.usda"
//!   usd_shot_publish:
//!     context: shot
//!     path: "{root}/shots/{Shot}/{Step}/v{version:03}/{Shot}.usda"
//! assets:
//!   - { id: 5633, name: propTestoid }
//! shots:
//!   - { id: 4462, name: 99_TST_80 }
//! tasks:
//!   - { id: 1, asset: 5633, step: MDL, variant: AvA }
//!   - { id: 2, shot: 4462, step: ANM, variant: main }
//! ```
//!
//! A task names exactly one of `asset` or `shot`. Its `content` (the task
//! name) defaults to `{variant}_{step}`.
//!
//! Relative `root` and `publish_log` paths are anchored at the directory of
//! the configuration file when it is loaded with [`from_file`].

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::production::{AssetId, ContextResolver, EntityRef, ShotId, TaskId};
use crate::templates::{PathTemplate, VERSION_FIELD};

/// Publish log file name used when `publish_log` is not set.
pub const DEFAULT_PUBLISH_LOG: &str = "publishes.jsonl";

/// Which entity a template's artifacts belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    Asset,
    Shot,
}

/// A named path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub context: TemplateKind,
    /// Path pattern with `{field}` tokens, see [`PathTemplate`].
    pub path: String,
}

/// An asset or shot entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityConfig<Id> {
    pub id: Id,
    pub name: String,
}

/// A production task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub id: TaskId,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub asset: Option<AssetId>,
    #[serde(default)]
    pub shot: Option<ShotId>,
    pub step: String,
    pub variant: String,
}

impl TaskConfig {
    /// The entity the task belongs to, if exactly one is named.
    pub fn entity(&self) -> Option<EntityRef> {
        match (self.asset, self.shot) {
            (Some(asset), None) => Some(EntityRef::Asset(asset)),
            (None, Some(shot)) => Some(EntityRef::Shot(shot)),
            _ => None,
        }
    }

    /// The task name.
    pub fn content(&self) -> String {
        self.content
            .clone()
            .unwrap_or_else(|| ContextResolver::task_name(&self.variant, &self.step))
    }
}

/// The whole pipeline catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Project code used in locators and paths.
    #[serde(default)]
    pub project: Option<String>,
    /// Root directory of published artifacts, available to templates as `{root}`.
    pub root: PathBuf,
    #[serde(default)]
    pub publish_log: Option<PathBuf>,
    pub templates: BTreeMap<String, TemplateConfig>,
    #[serde(default)]
    pub assets: Vec<EntityConfig<AssetId>>,
    #[serde(default)]
    pub shots: Vec<EntityConfig<ShotId>>,
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

impl PipelineConfig {
    /// The publish log path, defaulting to `{root}/publishes.jsonl`.
    pub fn publish_log_path(&self) -> PathBuf {
        self.publish_log
            .clone()
            .unwrap_or_else(|| self.root.join(DEFAULT_PUBLISH_LOG))
    }

    /// Anchors relative paths at `base`.
    pub fn anchor_paths(&mut self, base: &Path) {
        if self.root.is_relative() {
            self.root = base.join(&self.root);
        }
        if let Some(log) = &self.publish_log {
            if log.is_relative() {
                self.publish_log = Some(base.join(log));
            }
        }
    }

    /// Checks the catalog for dangling references and malformed templates.
    pub fn validate(&self) -> Result<()> {
        for (name, template) in &self.templates {
            let parsed = PathTemplate::new(&template.path).map_err(|e| Error::ConfigParse {
                message: format!("Template '{}' is invalid: {}", name, e),
                hint: None,
            })?;
            if !parsed.has_field(VERSION_FIELD) {
                return Err(Error::ConfigParse {
                    message: format!("Template '{}' has no {{version}} field", name),
                    hint: Some("Add a token such as v{version:03} to the path".to_string()),
                });
            }
        }

        let asset_ids: HashSet<AssetId> = self.assets.iter().map(|a| a.id).collect();
        let shot_ids: HashSet<ShotId> = self.shots.iter().map(|s| s.id).collect();
        let mut task_ids = HashSet::new();

        for task in &self.tasks {
            if !task_ids.insert(task.id) {
                return Err(Error::ConfigParse {
                    message: format!("Task id {} is used more than once", task.id),
                    hint: None,
                });
            }
            match task.entity() {
                Some(EntityRef::Asset(id)) if !asset_ids.contains(&id) => {
                    return Err(Error::ConfigParse {
                        message: format!("Task {} refers to unknown asset {}", task.id, id),
                        hint: Some("Add the asset to the 'assets:' list".to_string()),
                    });
                }
                Some(EntityRef::Shot(id)) if !shot_ids.contains(&id) => {
                    return Err(Error::ConfigParse {
                        message: format!("Task {} refers to unknown shot {}", task.id, id),
                        hint: Some("Add the shot to the 'shots:' list".to_string()),
                    });
                }
                Some(_) => {}
                None => {
                    return Err(Error::ConfigParse {
                        message: format!("Task {} must name exactly one entity", task.id),
                        hint: Some("Set either 'asset:' or 'shot:' on the task".to_string()),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Parses and validates a YAML pipeline catalog.
pub fn parse(yaml_content: &str) -> Result<PipelineConfig> {
    let config: PipelineConfig = serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
        message: e.to_string(),
        hint: Some("See the pipeline.yaml example in the scene-merge documentation".to_string()),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads a pipeline catalog, anchoring relative paths at its directory.
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    let mut config = parse(&content)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    config.anchor_paths(base);
    Ok(config)
}
