//! # Publish Presets
//!
//! The asset and shot publishes as the pipeline runs them, with its default
//! steps, merge steps and templates.
//!
//! An asset publish is two merges in a row: the variant's steps are stacked
//! into its `{variant}_ASS` artifact, then the asset's variants are gathered
//! into the `main_ASS` artifact. A shot publish is a single step merge into
//! `main_SHT`.

use log::info;

use crate::error::Result;
use crate::merge::steps::StepMerge;
use crate::merge::variants::{VariantMerge, ASSET_MERGE_STEP, MAIN_VARIANT};
use crate::merge::{Collaborators, PublishOutcome, PublishStrategy};
use crate::production::{AssetId, EntityRef, ProductionContext, ShotId};

pub const ASSET_TEMPLATE: &str = "usd_asset_publish";
pub const ASSET_STEPS: &[&str] = &["MDL", "LAY", "FX", "LDV"];

pub const SHOT_TEMPLATE: &str = "usd_shot_publish";
pub const SHOT_MERGE_STEP: &str = "SHT";
pub const SHOT_STEPS: &[&str] = &["BLD", "LAY", "ANM", "CFX", "FX", "LGT"];

/// Options shared by the publish presets. `None` means the preset default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub template: Option<String>,
    pub steps: Option<Vec<String>>,
    pub flatten: bool,
    pub force: bool,
}

impl PublishOptions {
    fn template_or<'s>(&'s self, default: &'s str) -> &'s str {
        self.template.as_deref().unwrap_or(default)
    }

    fn steps_or(&self, default: &[&str]) -> Vec<String> {
        match &self.steps {
            Some(steps) => steps.clone(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What an asset publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPublishReport {
    pub variant: PublishOutcome,
    pub variant_skipped_steps: Vec<String>,
    pub main: PublishOutcome,
    pub main_skipped_variants: Vec<String>,
}

/// What a shot publish did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShotPublishReport {
    pub outcome: PublishOutcome,
    pub skipped_steps: Vec<String>,
}

/// Publishes one variant of an asset, then the asset's multi-variant artifact.
///
/// `variants` lists the variants of the second merge; `None` discovers them
/// from the production database.
pub fn publish_asset(
    asset_id: AssetId,
    variant: &str,
    variants: Option<Vec<String>>,
    project: &str,
    options: &PublishOptions,
    collaborators: Collaborators<'_>,
) -> Result<AssetPublishReport> {
    let template = options.template_or(ASSET_TEMPLATE);
    info!("Publishing asset {} variant {}", asset_id, variant);

    let context = ProductionContext::new(
        EntityRef::Asset(asset_id),
        variant,
        ASSET_MERGE_STEP,
        template,
        project,
    );
    let mut steps = StepMerge::new(context, &options.steps_or(ASSET_STEPS), collaborators)?;
    let variant_outcome = steps.publish(options.flatten, options.force)?;

    info!("Publishing asset {} {} variants", asset_id, MAIN_VARIANT);
    let mut main = match variants {
        Some(variants) => VariantMerge::new(asset_id, variants, template, project, collaborators)?,
        None => VariantMerge::discover(asset_id, template, project, collaborators)?,
    };
    let main_outcome = main.publish(options.flatten, options.force)?;

    Ok(AssetPublishReport {
        variant: variant_outcome,
        variant_skipped_steps: steps.skipped().to_vec(),
        main: main_outcome,
        main_skipped_variants: main.skipped().to_vec(),
    })
}

/// Publishes the merged artifact of a shot.
pub fn publish_shot(
    shot_id: ShotId,
    variant: &str,
    project: &str,
    options: &PublishOptions,
    collaborators: Collaborators<'_>,
) -> Result<ShotPublishReport> {
    info!("Publishing shot {} variant {}", shot_id, variant);
    let context = ProductionContext::new(
        EntityRef::Shot(shot_id),
        variant,
        SHOT_MERGE_STEP,
        options.template_or(SHOT_TEMPLATE),
        project,
    );
    let mut merge = StepMerge::new(context, &options.steps_or(SHOT_STEPS), collaborators)?;
    let outcome = merge.publish(options.flatten, options.force)?;
    Ok(ShotPublishReport {
        outcome,
        skipped_steps: merge.skipped().to_vec(),
    })
}
