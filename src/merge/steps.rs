//! Step merge: one layer per production step, stacked into one artifact.

use log::{debug, info, warn};

use super::{Collaborators, MergeEngine, PublishStrategy};
use crate::error::Result;
use crate::production::ProductionContext;
use crate::publish::USD_SCENE;
use crate::uri::LATEST;

/// Stacks the latest artifacts of a variant's steps as sublayers.
///
/// Steps without a task are skipped with a warning and listed in
/// [`skipped`](Self::skipped). A publish is required until the merge task has
/// any published scene.
pub struct StepMerge<'a> {
    engine: MergeEngine<'a>,
    steps: Vec<String>,
    skipped: Vec<String>,
}

impl<'a> StepMerge<'a> {
    pub fn new<S: AsRef<str>>(
        context: ProductionContext,
        steps: &[S],
        collaborators: Collaborators<'a>,
    ) -> Result<Self> {
        let mut engine = MergeEngine::new(context, collaborators);
        let mut skipped = Vec::new();
        let template = engine.context().template.clone();
        let variant = engine.context().variant_name.clone();

        for step in steps.iter().map(AsRef::as_ref) {
            match engine.task_id(step, &variant)? {
                Some(task_id) => {
                    debug!("Task ID {} found for {}.", task_id, step);
                    info!("Processing task: {}", task_id);
                    engine
                        .composer_mut()
                        .sublayer_by_task(task_id, &template, LATEST)?;
                }
                None => {
                    warn!("Task not created in the production database, skipping: {}", step);
                    skipped.push(step.to_string());
                }
            }
        }

        Ok(Self {
            engine,
            steps: steps.iter().map(|s| s.as_ref().to_string()).collect(),
            skipped,
        })
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// Steps that had no task and contributed nothing.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }
}

impl<'a> PublishStrategy<'a> for StepMerge<'a> {
    fn engine(&self) -> &MergeEngine<'a> {
        &self.engine
    }

    fn engine_mut(&mut self) -> &mut MergeEngine<'a> {
        &mut self.engine
    }

    fn requires_publish(&self) -> Result<bool> {
        let task_id = self.engine.resolve_publish_task()?;
        let versions = self
            .engine
            .collaborators()
            .db
            .get_versions(task_id, USD_SCENE, true)?;
        if versions.is_empty() {
            return Ok(true);
        }
        info!(
            "Skipping USD publish that already exists for {}",
            self.engine.resolver().entity_label(self.engine.context().entity)?
        );
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::mock::MockEngine;
    use crate::merge::{PublishOutcome, PublishState};
    use crate::production::mock::MockDatabase;
    use crate::production::{AssetId, EntityRef, ShotId, TaskId};
    use crate::publish::mock::MockRecorder;
    use crate::uri::mock::MockTemplates;
    use tempfile::TempDir;

    const ASSET: EntityRef = EntityRef::Asset(AssetId(5633));
    const SHOT: EntityRef = EntityRef::Shot(ShotId(4462));

    fn database() -> MockDatabase {
        MockDatabase::new()
            .with_asset(5633, "propTestoid")
            .with_shot(4462, "99_TST_80")
            .with_task(1, ASSET, "AvA", "MDL")
            .with_task(3, ASSET, "AvA", "LDV")
            .with_task(9, ASSET, "AvA", "ASS")
            .with_task(21, SHOT, "main", "LAY")
            .with_task(22, SHOT, "main", "ANM")
            .with_task(29, SHOT, "main", "SHT")
    }

    struct Fixture {
        db: MockDatabase,
        templates: MockTemplates,
        documents: MockEngine,
        recorder: MockRecorder,
        _temp: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            Self {
                db: database(),
                templates: MockTemplates::new(temp.path()),
                documents: MockEngine::new(),
                recorder: MockRecorder::new(),
                _temp: temp,
            }
        }

        fn collaborators(&self) -> Collaborators<'_> {
            Collaborators {
                db: &self.db,
                templates: &self.templates,
                documents: &self.documents,
                recorder: &self.recorder,
            }
        }
    }

    fn asset_context() -> ProductionContext {
        ProductionContext::new(ASSET, "AvA", "ASS", "usd_asset_publish", "P3")
    }

    #[test]
    fn test_missing_steps_are_skipped() {
        let fixture = Fixture::new();
        let merge = StepMerge::new(
            asset_context(),
            &["MDL", "LAY", "FX", "LDV"],
            fixture.collaborators(),
        )
        .unwrap();

        assert_eq!(merge.skipped(), ["LAY", "FX"]);
        assert_eq!(
            merge.engine().composer().builder().sublayers(),
            [
                "tank:/P3/usd_asset_publish?Step=MDL&Asset=propTestoid&variant_name=AvA&version=latest",
                "tank:/P3/usd_asset_publish?Step=LDV&Asset=propTestoid&variant_name=AvA&version=latest",
            ]
        );
    }

    #[test]
    fn test_shot_steps_use_shot_locators() {
        let fixture = Fixture::new();
        let context = ProductionContext::new(SHOT, "main", "SHT", "usd_shot_publish", "P3");
        let merge = StepMerge::new(
            context,
            &["BLD", "LAY", "ANM", "CFX", "FX", "LGT"],
            fixture.collaborators(),
        )
        .unwrap();

        assert_eq!(merge.skipped(), ["BLD", "CFX", "FX", "LGT"]);
        assert_eq!(
            merge.engine().composer().builder().sublayers()[1],
            "tank:/P3/usd_shot_publish?Step=ANM&Shot=99_TST_80&variant_name=main&version=latest"
        );
    }

    #[test]
    fn test_requires_publish_until_a_version_exists() {
        let fixture = Fixture::new();
        let merge = StepMerge::new(asset_context(), &["MDL"], fixture.collaborators()).unwrap();
        assert!(merge.requires_publish().unwrap());

        fixture.db.add_version(TaskId(9), 1);
        assert!(!merge.requires_publish().unwrap());
    }

    #[test]
    fn test_requires_publish_needs_merge_task() {
        let fixture = Fixture::new();
        let context = ProductionContext::new(ASSET, "AvB", "ASS", "usd_asset_publish", "P3");
        let merge = StepMerge::new(context, &["MDL"], fixture.collaborators()).unwrap();
        assert!(merge.skipped().contains(&"MDL".to_string()));
        assert!(merge.requires_publish().is_err());
    }

    #[test]
    fn test_publish_skips_when_already_published() {
        let fixture = Fixture::new();
        fixture.db.add_version(TaskId(9), 1);
        let mut merge = StepMerge::new(asset_context(), &["MDL"], fixture.collaborators()).unwrap();

        let outcome = merge.publish(false, false).unwrap();
        assert_eq!(outcome, PublishOutcome::Skipped);
        assert_eq!(merge.engine().state(), PublishState::Skipped);
        assert!(fixture.recorder.requests().is_empty());
    }

    #[test]
    fn test_force_publishes_anyway() {
        let fixture = Fixture::new();
        fixture.db.add_version(TaskId(9), 1);
        fixture.templates.set_current(TaskId(9), 1);
        let mut merge = StepMerge::new(asset_context(), &["MDL"], fixture.collaborators()).unwrap();

        let outcome = merge.publish(false, true).unwrap();
        let artifact = outcome.artifact().unwrap();
        assert_eq!(artifact.version, 2);
        assert_eq!(merge.engine().state(), PublishState::Published);

        let (_, layer) = &fixture.documents.exported()[0];
        assert_eq!(layer.sublayers.len(), 1);
    }
}
