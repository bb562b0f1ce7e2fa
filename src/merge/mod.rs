//! # Merge Engine
//!
//! A merge publishes one composed artifact for one production context. The
//! [`MergeEngine`] holds what every merge shares: the context, the
//! collaborators, the [`TaskComposer`] that accumulates inputs, and the
//! publish state. Strategies decide what goes into the composer and whether a
//! publish is needed at all.
//!
//! ## Strategies
//!
//! - [`steps::StepMerge`] layers the per-discipline artifacts of one variant.
//! - [`variants::VariantMerge`] gathers the variants of an asset into one
//!   switchable prim.
//!
//! ## Publish lifecycle
//!
//! ```text
//! Pending -> Evaluated -> Skipped
//!                      -> Materializing -> Published
//!                                       -> Failed
//! ```
//!
//! A publish resolves the merge task, allocates the next version, writes the
//! document and records it. Nothing is rolled back when recording fails: the
//! written file stays on disk and the error reports its path.

pub mod steps;
pub mod variants;

use std::fs;
use std::path::PathBuf;

use log::{debug, info};

use crate::compose::TaskComposer;
use crate::document::DocumentEngine;
use crate::error::{Error, Result};
use crate::production::{ContextResolver, ProductionContext, ProductionDatabase, TaskId};
use crate::publish::{PublishReceipt, PublishRecorder, PublishRequest, PUBLISH_DESCRIPTION, USD_SCENE};
use crate::templates::TemplateService;

/// The external services a merge talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub db: &'a dyn ProductionDatabase,
    pub templates: &'a dyn TemplateService,
    pub documents: &'a dyn DocumentEngine,
    pub recorder: &'a dyn PublishRecorder,
}

/// Where a merge is in its publish lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Pending,
    Evaluated,
    Skipped,
    Materializing,
    Published,
    Failed,
}

/// A successfully published and recorded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedArtifact {
    pub task_id: TaskId,
    pub version: u32,
    pub path: PathBuf,
    pub receipt: PublishReceipt,
}

/// Result of asking a strategy to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The published artifact was already up to date.
    Skipped,
    Published(PublishedArtifact),
}

impl PublishOutcome {
    pub fn artifact(&self) -> Option<&PublishedArtifact> {
        match self {
            PublishOutcome::Published(artifact) => Some(artifact),
            PublishOutcome::Skipped => None,
        }
    }
}

/// Shared state and publish logic of every merge.
pub struct MergeEngine<'a> {
    context: ProductionContext,
    collaborators: Collaborators<'a>,
    composer: TaskComposer<'a>,
    state: PublishState,
}

impl<'a> MergeEngine<'a> {
    pub fn new(context: ProductionContext, collaborators: Collaborators<'a>) -> Self {
        let composer = TaskComposer::new(
            ContextResolver::new(collaborators.db),
            collaborators.templates,
            context.project.clone(),
        );
        Self {
            context,
            collaborators,
            composer,
            state: PublishState::Pending,
        }
    }

    pub fn context(&self) -> &ProductionContext {
        &self.context
    }

    pub fn collaborators(&self) -> Collaborators<'a> {
        self.collaborators
    }

    pub fn resolver(&self) -> ContextResolver<'a> {
        self.composer.context()
    }

    pub fn composer(&self) -> &TaskComposer<'a> {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut TaskComposer<'a> {
        &mut self.composer
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    /// The task of `step` and `variant` on this merge's entity.
    pub fn task_id(&self, step: &str, variant: &str) -> Result<Option<TaskId>> {
        self.resolver().task_id(self.context.entity, step, variant)
    }

    /// The task the merged artifact is published into.
    pub fn resolve_publish_task(&self) -> Result<TaskId> {
        let ProductionContext {
            entity,
            variant_name,
            merge_step,
            ..
        } = &self.context;
        match self.task_id(merge_step, variant_name)? {
            Some(task_id) => Ok(task_id),
            None => Err(Error::MissingTask {
                task: ContextResolver::task_name(variant_name, merge_step),
                entity: self.resolver().entity_label(*entity)?,
            }),
        }
    }

    /// Path of the current published version of a task, if there is one.
    pub fn current_locator(&self, task_id: TaskId) -> Result<Option<PathBuf>> {
        let template = self.context.template.as_str();
        match self.collaborators.templates.current_version(&[template], task_id)? {
            Some(version) => Ok(Some(
                self.collaborators
                    .templates
                    .output_path(template, task_id, version)?,
            )),
            None => Ok(None),
        }
    }

    fn evaluated(&mut self, required: bool) {
        self.state = if required {
            PublishState::Evaluated
        } else {
            PublishState::Skipped
        };
    }

    /// Writes the accumulated document as the next version of the merge task
    /// and records it.
    pub fn publish(&mut self, flatten: bool) -> Result<PublishedArtifact> {
        self.state = PublishState::Materializing;
        let result = self.write_and_record(flatten);
        self.state = match result {
            Ok(_) => PublishState::Published,
            Err(_) => PublishState::Failed,
        };
        result
    }

    fn write_and_record(&self, flatten: bool) -> Result<PublishedArtifact> {
        let task_id = self.resolve_publish_task()?;
        let template = self.context.template.as_str();
        let templates = self.collaborators.templates;
        let version = templates.next_version(&[template], task_id)?;
        let path = templates.output_path(template, task_id, version)?;
        info!(
            "Publishing task {} version {} to {}",
            task_id,
            version,
            path.display()
        );

        let publish_failed = |source: Error| Error::PublishFailed {
            path: path.display().to_string(),
            source: Box::new(source),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| publish_failed(e.into()))?;
        }
        self.composer
            .builder()
            .write(self.collaborators.documents, &path, flatten)
            .map_err(publish_failed)?;

        let mut request = PublishRequest::new(task_id, version, PUBLISH_DESCRIPTION);
        request.add_main_publish_item(&path, USD_SCENE);
        let receipt = self
            .collaborators
            .recorder
            .run_publish(&request)
            .map_err(publish_failed)?;
        debug!("Publish receipt: {:?}", receipt);

        Ok(PublishedArtifact {
            task_id,
            version,
            path,
            receipt,
        })
    }
}

/// A way of filling a merge and deciding whether it needs publishing.
pub trait PublishStrategy<'a> {
    fn engine(&self) -> &MergeEngine<'a>;

    fn engine_mut(&mut self) -> &mut MergeEngine<'a>;

    /// Whether the published artifact is out of date.
    fn requires_publish(&self) -> Result<bool>;

    /// Publishes if required, or unconditionally with `force`.
    fn publish(&mut self, flatten: bool, force: bool) -> Result<PublishOutcome> {
        let required = force || self.requires_publish()?;
        let engine = self.engine_mut();
        engine.evaluated(required);
        if !required {
            info!(
                "No publish required for {} {}",
                engine.context().variant_name,
                engine.context().merge_step
            );
            return Ok(PublishOutcome::Skipped);
        }
        engine.publish(flatten).map(PublishOutcome::Published)
    }
}
