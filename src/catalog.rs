//! # File-backed Catalog
//!
//! [`Catalog`] implements every lookup the engine needs from a
//! [`PipelineConfig`] and the files next to it:
//!
//! - [`ProductionDatabase`] over the configured assets, shots and tasks, with
//!   published versions read back from the [`PublishLog`].
//! - [`TemplateService`] over the configured [`PathTemplate`]s. Current
//!   versions are discovered by scanning the publish root.
//! - [`AssetResolver`] for `tank:` locators, mapping them back to a task and
//!   a version and rendering the file path.
//!
//! Template fields available to every path: `root`, `project`, `Asset` or
//! `Shot`, `Step`, `variant_name` and `version`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::config::{self, PipelineConfig, TaskConfig, TemplateKind};
use crate::error::{Error, Result};
use crate::production::{
    AssetId, EntityRef, ProductionDatabase, PublishedVersion, ShotId, TaskId, TaskSummary,
};
use crate::publish::PublishLog;
use crate::templates::{PathTemplate, TemplateService};
use crate::uri::{AssetResolver, Locator, LATEST};

struct NamedTemplate {
    kind: TemplateKind,
    template: PathTemplate,
}

/// Production data, templates and publishes from a pipeline catalog.
pub struct Catalog {
    config: PipelineConfig,
    templates: BTreeMap<String, NamedTemplate>,
    log: PublishLog,
}

impl Catalog {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let mut templates = BTreeMap::new();
        for (name, template) in &config.templates {
            templates.insert(
                name.clone(),
                NamedTemplate {
                    kind: template.context,
                    template: PathTemplate::new(&template.path)?,
                },
            );
        }
        let log = PublishLog::new(config.publish_log_path());
        Ok(Self {
            config,
            templates,
            log,
        })
    }

    /// Loads the catalog from a pipeline configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(config::from_file(path)?)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn project(&self) -> Option<&str> {
        self.config.project.as_deref()
    }

    pub fn publish_log(&self) -> &PublishLog {
        &self.log
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    fn task(&self, task_id: TaskId) -> Option<&TaskConfig> {
        self.config.tasks.iter().find(|t| t.id == task_id)
    }

    fn named_template(&self, name: &str) -> Result<&NamedTemplate> {
        self.templates.get(name).ok_or_else(|| Error::Template {
            template: name.to_string(),
            message: "unknown template".to_string(),
        })
    }

    /// The fields a template is rendered with for a task.
    fn fields(&self, kind: TemplateKind, template: &str, task_id: TaskId) -> Result<BTreeMap<String, String>> {
        let missing = |what: &str| Error::Template {
            template: template.to_string(),
            message: format!("task {} has no {}", task_id, what),
        };
        let task = self.task(task_id).ok_or_else(|| missing("catalog entry"))?;

        let mut fields = BTreeMap::new();
        fields.insert("root".to_string(), self.config.root.to_string_lossy().into_owned());
        if let Some(project) = &self.config.project {
            fields.insert("project".to_string(), project.clone());
        }
        let (key, name) = match (kind, task.entity()) {
            (TemplateKind::Asset, Some(EntityRef::Asset(id))) => ("Asset", self.asset_name_from_id(id)?),
            (TemplateKind::Shot, Some(EntityRef::Shot(id))) => ("Shot", self.shot_name_from_id(id)?),
            (TemplateKind::Asset, _) => return Err(missing("asset")),
            (TemplateKind::Shot, _) => return Err(missing("shot")),
        };
        fields.insert(key.to_string(), name.ok_or_else(|| missing("entity name"))?);
        fields.insert("Step".to_string(), task.step.clone());
        fields.insert("variant_name".to_string(), task.variant.clone());
        Ok(fields)
    }

    /// Finds the task a decoded locator points at.
    fn task_for_locator(&self, locator: &Locator) -> Option<TaskId> {
        let entity = if let Some(name) = locator.field("Asset") {
            EntityRef::Asset(self.config.assets.iter().find(|a| a.name == name)?.id)
        } else {
            EntityRef::Shot(
                self.config
                    .shots
                    .iter()
                    .find(|s| Some(s.name.as_str()) == locator.field("Shot"))?
                    .id,
            )
        };
        let step = locator.field("Step")?;
        let variant = locator.field("variant_name")?;
        self.config
            .tasks
            .iter()
            .find(|t| t.entity() == Some(entity) && t.step == step && t.variant == variant)
            .map(|t| t.id)
    }
}

impl ProductionDatabase for Catalog {
    fn task_id_from_name(&self, name: &str, entity: EntityRef) -> Result<Option<TaskId>> {
        Ok(self
            .config
            .tasks
            .iter()
            .find(|t| t.entity() == Some(entity) && t.content() == name)
            .map(|t| t.id))
    }

    fn asset_name_from_id(&self, asset_id: AssetId) -> Result<Option<String>> {
        Ok(self
            .config
            .assets
            .iter()
            .find(|a| a.id == asset_id)
            .map(|a| a.name.clone()))
    }

    fn shot_name_from_id(&self, shot_id: ShotId) -> Result<Option<String>> {
        Ok(self
            .config
            .shots
            .iter()
            .find(|s| s.id == shot_id)
            .map(|s| s.name.clone()))
    }

    fn asset_id_from_task_id(&self, task_id: TaskId) -> Result<Option<AssetId>> {
        Ok(self.task(task_id).and_then(|t| t.asset))
    }

    fn shot_id_from_task_id(&self, task_id: TaskId) -> Result<Option<ShotId>> {
        Ok(self.task(task_id).and_then(|t| t.shot))
    }

    fn step_from_task(&self, task_id: TaskId) -> Result<Option<String>> {
        Ok(self.task(task_id).map(|t| t.step.clone()))
    }

    fn variant_name_from_task(&self, task_id: TaskId) -> Result<Option<String>> {
        Ok(self.task(task_id).map(|t| t.variant.clone()))
    }

    fn entity_tasks(&self, entity: EntityRef, step: &str) -> Result<Vec<TaskSummary>> {
        Ok(self
            .config
            .tasks
            .iter()
            .filter(|t| t.entity() == Some(entity) && t.step == step)
            .map(|t| TaskSummary {
                id: t.id,
                content: t.content(),
            })
            .collect())
    }

    fn get_versions(
        &self,
        task_id: TaskId,
        published_file_type: &str,
        _force: bool,
    ) -> Result<Vec<PublishedVersion>> {
        // The log is re-read on every call, so there is no cache to bypass
        self.log.versions(task_id, published_file_type)
    }
}

impl TemplateService for Catalog {
    fn is_asset_template(&self, name: &str) -> bool {
        matches!(self.templates.get(name), Some(t) if t.kind == TemplateKind::Asset)
    }

    fn is_shot_template(&self, name: &str) -> bool {
        matches!(self.templates.get(name), Some(t) if t.kind == TemplateKind::Shot)
    }

    fn current_version(&self, templates: &[&str], task_id: TaskId) -> Result<Option<u32>> {
        let mut current = None;
        for name in templates {
            let named = self.named_template(name)?;
            let fields = self.fields(named.kind, name, task_id)?;
            let latest = named.template.versions_on_disk(&fields)?.into_iter().max();
            current = current.max(latest);
        }
        debug!("Current version of task {} in {:?}: {:?}", task_id, templates, current);
        Ok(current)
    }

    fn output_path(&self, template: &str, task_id: TaskId, version: u32) -> Result<PathBuf> {
        let named = self.named_template(template)?;
        let fields = self.fields(named.kind, template, task_id)?;
        Ok(PathBuf::from(named.template.render(&fields, version)?))
    }
}

impl AssetResolver for Catalog {
    fn resolve(&self, locator: &str) -> Result<Option<PathBuf>> {
        let decoded = Locator::parse(locator)?;
        if let Some(project) = self.project() {
            if !project.eq_ignore_ascii_case(&decoded.project) {
                warn!(
                    "Locator project {} does not match the catalog project {}",
                    decoded.project, project
                );
            }
        }

        let Some(task_id) = self.task_for_locator(&decoded) else {
            debug!("No task matches {}", locator);
            return Ok(None);
        };
        let version = match decoded.field("version") {
            Some(LATEST) | None => self.current_version(&[decoded.template.as_str()], task_id)?,
            Some(number) => Some(number.parse::<u32>().map_err(|e| Error::Locator {
                locator: locator.to_string(),
                message: format!("invalid version '{}': {}", number, e),
            })?),
        };
        let Some(version) = version else {
            debug!("Nothing published yet for {}", locator);
            return Ok(None);
        };

        let path = self.output_path(&decoded.template, task_id, version)?;
        Ok(path.exists().then_some(path))
    }
}
