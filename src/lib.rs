//! # Scene Merge Library
//!
//! This library composes versioned production artifacts into scene documents
//! and publishes the result as a new version. It is designed to be used by the
//! `scene-merge` command-line tool but can also be driven directly, with any
//! of its external collaborators replaced.
//!
//! ## Quick Example
//!
//! ```
//! use scene_merge::builder::{Placement, ReferenceRecord, SceneBuilder};
//! use scene_merge::document::UsdaEngine;
//!
//! let mut builder = SceneBuilder::new();
//! builder.append_sublayer("tank:/P3/usd_asset_publish?Step=MDL&Asset=prop&variant_name=AvA&version=latest");
//! builder.append_reference(
//!     ReferenceRecord::new("/prop", "tank:/P3/usd_asset_publish?Step=ASS&Asset=prop&variant_name=AvA&version=latest")
//!         .with_source_path("/prop")
//!         .with_placement(Placement::variant("variant", "propAvA")),
//! );
//!
//! let layer = builder.materialize(&UsdaEngine::without_resolver(), false).unwrap();
//! assert_eq!(layer.sublayers.len(), 1);
//! assert_eq!(
//!     layer.prim("/prop").unwrap().opinions.variant_selection("variant"),
//!     Some("propAvA")
//! );
//! ```
//!
//! ## Core Concepts
//!
//! - **Locators (`uri`)**: artifacts are referenced by `tank:` URIs naming
//!   their production fields and a version rule, resolved to files at read
//!   time.
//! - **Scene Builder (`builder`)**: accumulates sublayers and references and
//!   materializes them into a document.
//! - **Production Context (`production`)**: task lookup by entity, step and
//!   variant against the production database.
//! - **Merges (`merge`)**: the publish lifecycle, with the step-merge and
//!   variant-merge strategies.
//! - **Presets (`presets`)**: the asset and shot publishes with the pipeline's
//!   default steps.
//!
//! ## Collaborators
//!
//! The production database, the template service, the document engine, the
//! publish recorder and locator resolution are traits. The bundled
//! implementations are file based: [`catalog::Catalog`] reads a YAML pipeline
//! catalog ([`config`]), [`publish::PublishLog`] appends JSON lines and
//! [`document::UsdaEngine`] reads and writes USDA text.

pub mod builder;
pub mod catalog;
pub mod compose;
pub mod config;
pub mod defaults;
pub mod document;
pub mod error;
pub mod merge;
pub mod presets;
pub mod production;
pub mod publish;
pub mod templates;
pub mod uri;
