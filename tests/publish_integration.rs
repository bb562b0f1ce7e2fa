//! Integration tests for the publish pipeline against a file-backed catalog.
//!
//! These tests drive the library the way the CLI does: a [`Catalog`] loaded
//! from `pipeline.yaml` serves as production database, template service and
//! locator resolver, [`UsdaEngine`] reads and writes the documents and the
//! catalog's publish log records every publish.

mod common;

use common::prelude::*;
use scene_merge::catalog::Catalog;
use scene_merge::document::{usda, DocumentEngine, UsdaEngine};
use scene_merge::merge::{Collaborators, PublishOutcome};
use scene_merge::presets::{self, PublishOptions};
use scene_merge::production::{AssetId, ShotId, TaskId};
use scene_merge::publish::USD_SCENE;
use scene_merge::uri::resolve_path;
use std::fs;

const ASSET: AssetId = AssetId(5633);
const SHOT: ShotId = ShotId(4462);

fn asset_fixture() -> TestFixture {
    TestFixture::new()
        .with_pipeline()
        .with_asset_artifact("AvA_MDL", 1, layers::MODEL)
        .with_asset_artifact("AvA_LDV", 1, layers::LOOKDEV)
}

fn collaborators<'a>(catalog: &'a Catalog, documents: &'a UsdaEngine<'a>) -> Collaborators<'a> {
    Collaborators {
        db: catalog,
        templates: catalog,
        documents,
        recorder: catalog.publish_log(),
    }
}

#[test]
fn test_asset_publish_writes_variant_and_main_artifacts() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    let report = presets::publish_asset(
        ASSET,
        "AvA",
        None,
        "P3",
        &PublishOptions::default(),
        collaborators(&catalog, &documents),
    )
    .unwrap();

    assert_eq!(report.variant_skipped_steps, vec!["LAY", "FX"]);
    assert!(report.main_skipped_variants.is_empty());

    let variant = report.variant.artifact().expect("variant artifact published");
    assert_eq!(variant.task_id, TaskId(3));
    assert_eq!(variant.version, 1);
    assert_eq!(variant.path, fixture.asset_artifact("AvA_ASS", 1));

    let written = usda::parse(&fs::read_to_string(&variant.path).unwrap()).unwrap();
    assert_eq!(written.sublayers.len(), 2);
    assert!(written.sublayers.iter().any(|s| s.contains("Step=MDL")));
    assert!(written.sublayers.iter().any(|s| s.contains("Step=LDV")));
    assert!(written
        .sublayers
        .iter()
        .all(|s| s.starts_with("tank:/P3/usd_asset_publish?") && s.ends_with("version=latest")));

    let main = report.main.artifact().expect("main artifact published");
    assert_eq!(main.task_id, TaskId(6));
    assert_eq!(main.path, fixture.asset_artifact("main_ASS", 1));
    let written = documents.open(&main.path.to_string_lossy()).unwrap();
    let prim = written.prim("/propTestoid").unwrap();
    let mut labels = prim.opinions.variant_names("variant");
    labels.sort();
    assert_eq!(labels, vec!["propTestoidAvA", "propTestoidAvB"]);
    assert_eq!(prim.opinions.variant_selection("variant"), Some("propTestoidAvA"));
}

#[test]
fn test_asset_publish_records_every_artifact() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    presets::publish_asset(
        ASSET,
        "AvA",
        None,
        "P3",
        &PublishOptions::default(),
        collaborators(&catalog, &documents),
    )
    .unwrap();

    let records = catalog.publish_log().records().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].task_id, TaskId(3));
    assert_eq!(records[1].task_id, TaskId(6));
    assert!(records.iter().all(|r| r.version == 1));
    assert!(records.iter().all(|r| r.published_file_type == USD_SCENE));
    assert!(records
        .iter()
        .all(|r| r.description == "Asset / Shot USD Publisher"));
    assert_eq!(
        records[0].path,
        fixture.asset_artifact("AvA_ASS", 1).display().to_string()
    );
    assert_eq!(fixture.publish_log_path(), catalog.publish_log().path());
}

#[test]
fn test_second_asset_publish_is_skipped() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);
    let options = PublishOptions::default();

    presets::publish_asset(ASSET, "AvA", None, "P3", &options, collaborators(&catalog, &documents)).unwrap();
    let again =
        presets::publish_asset(ASSET, "AvA", None, "P3", &options, collaborators(&catalog, &documents)).unwrap();

    assert_eq!(again.variant, PublishOutcome::Skipped);
    assert_eq!(again.main, PublishOutcome::Skipped);
    assert_eq!(catalog.publish_log().records().unwrap().len(), 2);
    assert!(!fixture.asset_artifact("AvA_ASS", 2).exists());
}

#[test]
fn test_forced_publish_allocates_next_version() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    presets::publish_asset(
        ASSET,
        "AvA",
        None,
        "P3",
        &PublishOptions::default(),
        collaborators(&catalog, &documents),
    )
    .unwrap();
    let forced = presets::publish_asset(
        ASSET,
        "AvA",
        None,
        "P3",
        &PublishOptions {
            force: true,
            ..PublishOptions::default()
        },
        collaborators(&catalog, &documents),
    )
    .unwrap();

    assert_eq!(forced.variant.artifact().unwrap().version, 2);
    assert_eq!(forced.main.artifact().unwrap().version, 2);
    assert!(fixture.asset_artifact("AvA_ASS", 2).exists());
}

#[test]
fn test_new_variant_republishes_main() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);
    let options = PublishOptions::default();

    let first = presets::publish_asset(
        ASSET,
        "AvA",
        Some(vec!["AvA".to_string()]),
        "P3",
        &options,
        collaborators(&catalog, &documents),
    )
    .unwrap();
    assert_eq!(first.main.artifact().unwrap().version, 1);

    let second =
        presets::publish_asset(ASSET, "AvA", None, "P3", &options, collaborators(&catalog, &documents)).unwrap();
    assert_eq!(second.variant, PublishOutcome::Skipped);
    assert_eq!(second.main.artifact().unwrap().version, 2);
}

#[test]
fn test_flattened_publish_inlines_step_artifacts() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    let report = presets::publish_asset(
        ASSET,
        "AvA",
        Some(vec!["AvA".to_string()]),
        "P3",
        &PublishOptions {
            flatten: true,
            ..PublishOptions::default()
        },
        collaborators(&catalog, &documents),
    )
    .unwrap();

    let path = &report.variant.artifact().unwrap().path;
    let written = usda::parse(&fs::read_to_string(path).unwrap()).unwrap();
    assert!(written.sublayers.is_empty());
    let prim = written.prim("/propTestoid").unwrap();
    assert!(prim.opinions.child("geo").is_some());
    assert!(prim.opinions.child("shader").is_some());
}

#[cfg(unix)]
#[test]
fn test_published_artifact_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    let report = presets::publish_asset(
        ASSET,
        "AvA",
        None,
        "P3",
        &PublishOptions::default(),
        collaborators(&catalog, &documents),
    )
    .unwrap();

    let path = &report.variant.artifact().unwrap().path;
    let mode = fs::metadata(path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o640);
}

#[test]
fn test_shot_publish_and_locator_resolution() {
    let fixture = TestFixture::new()
        .with_pipeline()
        .with_shot_artifact("main_LAY", 1, layers::LAYOUT)
        .with_shot_artifact("main_ANM", 1, layers::ANIMATION)
        .with_shot_artifact("main_ANM", 2, layers::ANIMATION);
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    let report = presets::publish_shot(
        SHOT,
        "main",
        "P3",
        &PublishOptions::default(),
        collaborators(&catalog, &documents),
    )
    .unwrap();

    assert_eq!(report.skipped_steps, vec!["BLD", "CFX", "FX", "LGT"]);
    let artifact = report.outcome.artifact().unwrap();
    assert_eq!(artifact.task_id, TaskId(29));
    assert_eq!(artifact.path, fixture.shot_artifact("main_SHT", 1));

    let written = usda::parse(&fs::read_to_string(&artifact.path).unwrap()).unwrap();
    let anm = written
        .sublayers
        .iter()
        .find(|s| s.contains("Step=ANM"))
        .unwrap();
    assert_eq!(resolve_path(&catalog, anm), Some(fixture.shot_artifact("main_ANM", 2)));
}

#[test]
fn test_unknown_asset_fails_without_publishing() {
    let fixture = asset_fixture();
    let catalog = Catalog::from_file(fixture.config_path()).unwrap();
    let documents = UsdaEngine::new(&catalog);

    let result = presets::publish_asset(
        AssetId(1),
        "AvA",
        None,
        "P3",
        &PublishOptions::default(),
        collaborators(&catalog, &documents),
    );

    assert!(result.is_err());
    assert!(catalog.publish_log().records().unwrap().is_empty());
}
