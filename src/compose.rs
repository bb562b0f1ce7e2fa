//! # Task Composer
//!
//! [`TaskComposer`] registers sublayers and references by production task
//! instead of by locator. It owns the [`SceneBuilder`] for one output document
//! and uses the production database and the URI builder to turn tasks into
//! locators.
//!
//! Two levels are offered:
//!
//! - [`reference_by_task`](TaskComposer::reference_by_task) and
//!   [`sublayer_by_task`](TaskComposer::sublayer_by_task) take a task id that
//!   the caller already resolved.
//! - [`add_reference`](TaskComposer::add_reference) and
//!   [`add_sublayer`](TaskComposer::add_sublayer) look the task up by entity,
//!   step and variant. A task that does not exist is an error here, because
//!   the caller asked for that exact input.
//!
//! Locators always carry the project name upper-cased.

use log::debug;

use crate::builder::{Placement, ReferenceRecord, SceneBuilder};
use crate::error::{Error, Result};
use crate::production::{AssetId, ContextResolver, EntityRef, ShotId, TaskId};
use crate::templates::TemplateService;
use crate::uri::{UriBuilder, LATEST};

/// Options for [`TaskComposer::add_reference`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceOptions {
    /// Padded instance number appended to the prim name, e.g. `"003"`.
    pub instance_id: Option<String>,
    pub version_rule: String,
    /// Nest the referenced prim under a transform named after the asset.
    pub include_parent_transform: bool,
    pub is_override: bool,
}

impl Default for ReferenceOptions {
    fn default() -> Self {
        Self {
            instance_id: None,
            version_rule: LATEST.to_string(),
            include_parent_transform: true,
            is_override: false,
        }
    }
}

/// Builds one document out of production tasks.
pub struct TaskComposer<'a> {
    builder: SceneBuilder,
    context: ContextResolver<'a>,
    uris: UriBuilder<'a>,
    project: String,
}

impl<'a> TaskComposer<'a> {
    pub fn new(
        context: ContextResolver<'a>,
        templates: &'a dyn TemplateService,
        project: impl Into<String>,
    ) -> Self {
        Self {
            builder: SceneBuilder::new(),
            uris: UriBuilder::new(context.database(), templates),
            context,
            project: project.into(),
        }
    }

    pub fn builder(&self) -> &SceneBuilder {
        &self.builder
    }

    pub fn builder_mut(&mut self) -> &mut SceneBuilder {
        &mut self.builder
    }

    pub fn context(&self) -> ContextResolver<'a> {
        self.context
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    fn asset_name(&self, asset_id: AssetId) -> Result<String> {
        self.context
            .entity_name(EntityRef::Asset(asset_id))?
            .ok_or_else(|| Error::UnknownEntity {
                entity: EntityRef::Asset(asset_id).to_string(),
            })
    }

    /// The prim path a referenced asset is placed at.
    ///
    /// `/{asset}` or `/{asset}_{instance}`, with `/{asset}` appended when the
    /// parent transform is included.
    pub fn reference_name(
        &self,
        asset_id: AssetId,
        instance_id: Option<&str>,
        include_parent_transform: bool,
    ) -> Result<String> {
        let asset_name = self.asset_name(asset_id)?;
        let mut name = match instance_id {
            Some(instance) => format!("/{}_{}", asset_name, instance),
            None => format!("/{}", asset_name),
        };
        if include_parent_transform {
            name = format!("{}/{}", name, asset_name);
        }
        Ok(name)
    }

    /// The prim referenced inside an asset's artifact.
    pub fn reference_primitive_path(&self, asset_id: AssetId) -> Result<String> {
        Ok(format!("/{}", self.asset_name(asset_id)?))
    }

    fn task_uri(&self, task_id: TaskId, template: &str, version_rule: &str) -> Result<String> {
        self.uris.build_task_uri(
            &self.project.to_uppercase(),
            template,
            task_id,
            version_rule,
        )
    }

    /// Adds a reference to the artifact of a task.
    #[allow(clippy::too_many_arguments)]
    pub fn reference_by_task(
        &mut self,
        task_id: TaskId,
        template: &str,
        name: &str,
        primitive_path: Option<&str>,
        version_rule: &str,
        placement: Placement,
        is_override: bool,
    ) -> Result<()> {
        let locator = self.task_uri(task_id, template, version_rule)?;
        self.builder.append_reference(ReferenceRecord {
            name: name.to_string(),
            locator,
            source_path: primitive_path.map(str::to_string),
            placement,
            is_override,
        });
        Ok(())
    }

    /// Adds the artifact of a task as a sublayer.
    pub fn sublayer_by_task(
        &mut self,
        task_id: TaskId,
        template: &str,
        version_rule: &str,
    ) -> Result<()> {
        let locator = self.task_uri(task_id, template, version_rule)?;
        self.builder.append_sublayer(locator);
        Ok(())
    }

    /// Adds a reference to an asset's task for `step` and `variant`.
    pub fn add_reference(
        &mut self,
        asset_id: AssetId,
        step: &str,
        variant: &str,
        template: &str,
        options: &ReferenceOptions,
    ) -> Result<()> {
        let asset_name = self.asset_name(asset_id)?;
        debug!(
            "Adding reference {} ({}), {}, {}",
            asset_name, asset_id, variant, step
        );

        let name = self.reference_name(
            asset_id,
            options.instance_id.as_deref(),
            options.include_parent_transform,
        )?;
        let task_id = self
            .context
            .task_id(EntityRef::Asset(asset_id), step, variant)?
            .ok_or_else(|| Error::MissingTask {
                task: ContextResolver::task_name(variant, step),
                entity: asset_name.clone(),
            })?;
        let primitive_path = self.reference_primitive_path(asset_id)?;

        self.reference_by_task(
            task_id,
            template,
            &name,
            Some(&primitive_path),
            &options.version_rule,
            Placement::Unscoped,
            options.is_override,
        )
    }

    /// Adds a shot's task for `step` and `variant` as a sublayer.
    pub fn add_sublayer(
        &mut self,
        shot_id: ShotId,
        step: &str,
        variant: &str,
        template: &str,
        version_rule: &str,
    ) -> Result<()> {
        let entity = EntityRef::Shot(shot_id);
        let shot_label = self.context.entity_label(entity)?;
        debug!(
            "Adding sublayer {} ({}), {}, {}",
            shot_label, shot_id, variant, step
        );

        let task_id = self
            .context
            .task_id(entity, step, variant)?
            .ok_or_else(|| Error::MissingTask {
                task: ContextResolver::task_name(variant, step),
                entity: shot_label,
            })?;
        self.sublayer_by_task(task_id, template, version_rule)
    }
}
