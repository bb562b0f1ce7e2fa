//! Variant merge: every variant of an asset behind one variant set.
//!
//! The merged artifact has a single prim `/{asset}` with a variant set named
//! `variant`. Each variant is labelled `{asset}{variant}` and references the
//! `/{asset}` prim of that variant's merged asset artifact. The artifact is
//! published into the asset's `main_ASS` task.
//!
//! Whether a re-publish is needed is decided by reading the variant labels
//! back out of the current published artifact and comparing them, as a set,
//! with the variants that are expected now.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use super::{Collaborators, MergeEngine, PublishStrategy};
use crate::builder::Placement;
use crate::error::{Error, Result};
use crate::production::{AssetId, EntityRef, ProductionContext, ProductionDatabase};
use crate::uri::LATEST;

/// Variant whose task receives the merged artifact.
pub const MAIN_VARIANT: &str = "main";

/// Step that holds each variant's merged asset, and the merged result.
pub const ASSET_MERGE_STEP: &str = "ASS";

/// Name of the variant set authored on the asset prim.
pub const VARIANT_SET: &str = "variant";

/// Lists the variants of an asset from its merge-step tasks.
///
/// Tasks whose name starts with `main_` hold the multi-variant artifact
/// itself and are left out.
pub fn discover_variants(db: &dyn ProductionDatabase, asset_id: AssetId) -> Result<Vec<String>> {
    let mut variants = Vec::new();
    for task in db.entity_tasks(EntityRef::Asset(asset_id), ASSET_MERGE_STEP)? {
        if task.content.split('_').next() == Some(MAIN_VARIANT) {
            continue;
        }
        match db.variant_name_from_task(task.id)? {
            Some(variant) => variants.push(variant),
            None => warn!("Task {} ({}) has no variant name, skipping", task.content, task.id),
        }
    }
    debug!("Variants found for asset {}: {:?}", asset_id, variants);
    Ok(variants)
}

/// Builds the asset's multi-variant artifact.
pub struct VariantMerge<'a> {
    engine: MergeEngine<'a>,
    asset_id: AssetId,
    asset_name: String,
    variants: Vec<String>,
    skipped: Vec<String>,
}

impl<'a> VariantMerge<'a> {
    /// Creates the merge for an explicit list of variants.
    pub fn new(
        asset_id: AssetId,
        variants: Vec<String>,
        template: &str,
        project: &str,
        collaborators: Collaborators<'a>,
    ) -> Result<Self> {
        let context = ProductionContext::new(
            EntityRef::Asset(asset_id),
            MAIN_VARIANT,
            ASSET_MERGE_STEP,
            template,
            project,
        );
        let mut engine = MergeEngine::new(context, collaborators);
        let asset_name = engine
            .resolver()
            .entity_name(EntityRef::Asset(asset_id))?
            .ok_or_else(|| Error::UnknownEntity {
                entity: EntityRef::Asset(asset_id).to_string(),
            })?;

        let reference_name = engine.composer().reference_name(asset_id, None, false)?;
        let primitive_path = engine.composer().reference_primitive_path(asset_id)?;
        let db = collaborators.db;

        let mut skipped = Vec::new();
        for variant in &variants {
            let Some(task_id) = engine.task_id(ASSET_MERGE_STEP, variant)? else {
                warn!("Task not created in the production database, skipping: {}", variant);
                skipped.push(variant.clone());
                continue;
            };
            debug!("Task ID {} found for {}.", task_id, variant);
            info!("Processing task: {}", task_id);

            let task_variant = db
                .variant_name_from_task(task_id)?
                .unwrap_or_else(|| variant.clone());
            let label = format!("{}{}", asset_name, task_variant);
            engine.composer_mut().reference_by_task(
                task_id,
                template,
                &reference_name,
                Some(&primitive_path),
                LATEST,
                Placement::variant(VARIANT_SET, label),
                false,
            )?;
        }

        Ok(Self {
            engine,
            asset_id,
            asset_name,
            variants,
            skipped,
        })
    }

    /// Creates the merge for every variant the production database lists.
    pub fn discover(
        asset_id: AssetId,
        template: &str,
        project: &str,
        collaborators: Collaborators<'a>,
    ) -> Result<Self> {
        let variants = discover_variants(collaborators.db, asset_id)?;
        Self::new(asset_id, variants, template, project, collaborators)
    }

    pub fn asset_id(&self) -> AssetId {
        self.asset_id
    }

    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Variants that had no merge-step task and contributed nothing.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// The variant label authored for a production variant.
    pub fn usd_variant_name(&self, variant: &str) -> String {
        format!("{}{}", self.asset_name, variant)
    }

    /// The production variant behind an authored variant label.
    pub fn variant_name_from_usd_variant(&self, usd_variant: &str) -> Result<String> {
        usd_variant
            .strip_prefix(self.asset_name.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidVariantName {
                variant: usd_variant.to_string(),
                prefix: self.asset_name.clone(),
            })
    }

    /// Production variants present in the current published artifact.
    pub fn published_variants(&self) -> Result<Vec<String>> {
        let task_id = self.engine.resolve_publish_task()?;
        let Some(path) = self.engine.current_locator(task_id)? else {
            debug!("No published USD could be found for task_id: {}", task_id);
            return Ok(Vec::new());
        };

        let layer = self
            .engine
            .collaborators()
            .documents
            .open(&path.to_string_lossy())?;
        info!("Opened {}", path.display());

        let prim_path = format!("/{}", self.asset_name);
        let Some(prim) = layer.prim(&prim_path) else {
            warn!("Asset prim {} couldn't be found", prim_path);
            return Ok(Vec::new());
        };

        prim.opinions
            .variant_names(VARIANT_SET)
            .into_iter()
            .map(|label| self.variant_name_from_usd_variant(label))
            .collect()
    }
}

impl<'a> PublishStrategy<'a> for VariantMerge<'a> {
    fn engine(&self) -> &MergeEngine<'a> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut MergeEngine<'a> {
        &mut self.engine
    }

    fn requires_publish(&self) -> Result<bool> {
        let published: BTreeSet<String> = self.published_variants()?.into_iter().collect();
        let expected: BTreeSet<String> = self.variants.iter().cloned().collect();
        debug!("Production variants: {:?}", expected);
        debug!("USD variants: {:?}", published);

        if expected != published {
            info!(
                "Variants in the published USD don't match the production database. Re-publish required for {}",
                self.asset_name
            );
            return Ok(true);
        }
        debug!("Published USD up to date, no publish required.");
        Ok(false)
    }
}
