//! # Scene Builder
//!
//! [`SceneBuilder`] accumulates sublayers and references for one publish and
//! turns them into a scene document on demand.
//!
//! ## Materializing
//!
//! 1. A fresh in-memory layer is created.
//! 2. Sublayers are appended in the order they were added.
//! 3. References are applied in the order they were added. Each one defines
//!    an `Xform` prim at its name (or only overrides it), resolves the
//!    referenced prim through the artifact's default prim when no source path
//!    was given, and adds the reference either directly on the prim or inside
//!    a variant.
//! 4. Optionally the result is flattened into a self-contained layer.
//!
//! Materializing reads the accumulated lists and never changes them, so a
//! builder can be materialized any number of times with identical results.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::document::{DocumentEngine, Layer, Reference};
use crate::error::{Error, Result};

/// Mode given to every written artifact.
pub const ARTIFACT_MODE: u32 = 0o640;

/// Prim type of every prim the builder defines.
const REFERENCE_PRIM_TYPE: &str = "Xform";

/// Where a reference is authored on its prim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Directly on the prim.
    Unscoped,
    /// Inside variant `name` of variant set `set`.
    VariantScoped { set: String, name: String },
}

impl Placement {
    pub fn variant(set: impl Into<String>, name: impl Into<String>) -> Self {
        Placement::VariantScoped {
            set: set.into(),
            name: name.into(),
        }
    }

    /// Builds a placement from an optional variant name and set.
    ///
    /// Both or neither must be given. A half-specified pair is logged and
    /// yields `None`; the reference it belonged to should be dropped.
    pub fn from_parts(variant_name: Option<&str>, variant_set: Option<&str>) -> Option<Self> {
        match (variant_name, variant_set) {
            (None, None) => Some(Placement::Unscoped),
            (Some(name), Some(set)) => Some(Placement::variant(set, name)),
            (name, set) => {
                warn!(
                    "Both variant name and variant set must be given (name: {:?}, set: {:?}); dropping reference",
                    name, set
                );
                None
            }
        }
    }
}

/// One pending reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    /// Absolute path of the prim that carries the reference.
    pub name: String,
    pub locator: String,
    /// Prim inside the referenced artifact; its default prim when `None`.
    pub source_path: Option<String>,
    pub placement: Placement,
    /// Only override the prim instead of defining it.
    pub is_override: bool,
}

impl ReferenceRecord {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
            source_path: None,
            placement: Placement::Unscoped,
            is_override: false,
        }
    }

    pub fn with_source_path(mut self, source_path: impl Into<String>) -> Self {
        self.source_path = Some(source_path.into());
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = placement;
        self
    }

    pub fn as_override(mut self) -> Self {
        self.is_override = true;
        self
    }
}

/// Accumulates sublayers and references for one output document.
#[derive(Debug, Clone, Default)]
pub struct SceneBuilder {
    sublayers: Vec<String>,
    references: Vec<ReferenceRecord>,
}

impl SceneBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sublayers(&self) -> &[String] {
        &self.sublayers
    }

    pub fn references(&self) -> &[ReferenceRecord] {
        &self.references
    }

    pub fn is_empty(&self) -> bool {
        self.sublayers.is_empty() && self.references.is_empty()
    }

    pub fn append_sublayer(&mut self, locator: impl Into<String>) {
        let locator = locator.into();
        debug!("Adding sublayer {}", locator);
        self.sublayers.push(locator);
    }

    pub fn append_reference(&mut self, record: ReferenceRecord) {
        debug!("Adding reference {} -> {}", record.name, record.locator);
        self.references.push(record);
    }

    /// Adds a reference from loose parts.
    ///
    /// Returns `false` when the variant pair is half-specified and the
    /// reference was dropped.
    pub fn append_reference_parts(
        &mut self,
        name: &str,
        locator: &str,
        source_path: Option<&str>,
        variant_name: Option<&str>,
        variant_set: Option<&str>,
        is_override: bool,
    ) -> bool {
        let Some(placement) = Placement::from_parts(variant_name, variant_set) else {
            return false;
        };
        self.append_reference(ReferenceRecord {
            name: name.to_string(),
            locator: locator.to_string(),
            source_path: source_path.map(str::to_string),
            placement,
            is_override,
        });
        true
    }

    /// Builds the document described by the accumulated lists.
    pub fn materialize(&self, engine: &dyn DocumentEngine, flatten: bool) -> Result<Layer> {
        let mut layer = Layer::new();
        for sublayer in &self.sublayers {
            layer.append_sublayer(sublayer.clone());
        }

        // Variant names added so far, per prim and variant set
        let mut seen: BTreeMap<(String, String), BTreeSet<String>> = BTreeMap::new();

        for record in &self.references {
            let prim = if record.is_override {
                layer.override_prim(&record.name)?
            } else {
                layer.define_prim(&record.name, Some(REFERENCE_PRIM_TYPE))?
            };

            let prim_path = match &record.source_path {
                Some(path) => Some(path.clone()),
                None => engine.default_entry_point(&record.locator)?,
            };
            let reference = Reference::new(record.locator.clone(), prim_path);

            match &record.placement {
                Placement::Unscoped => prim.opinions.add_reference(reference),
                Placement::VariantScoped { set, name } => {
                    prim.opinions
                        .add_variant_set(set)
                        .add_variant(name)
                        .opinions
                        .add_reference(reference);

                    let names = seen.entry((record.name.clone(), set.clone())).or_default();
                    names.insert(name.clone());
                    if let Some(first) = names.iter().next() {
                        prim.opinions.set_variant_selection(set, first);
                    }
                }
            }
        }

        if flatten {
            engine.flatten(&layer)
        } else {
            Ok(layer)
        }
    }

    /// Materializes and exports the document to `path`, then sets its mode
    /// to [`ARTIFACT_MODE`].
    pub fn write(&self, engine: &dyn DocumentEngine, path: &Path, flatten: bool) -> Result<()> {
        let layer = self.materialize(engine, flatten)?;
        engine.export(&layer, path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(ARTIFACT_MODE)).map_err(|e| {
                Error::document(format!(
                    "Failed to set permissions on '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }

        debug!("Wrote {}", path.display());
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockEngine;
    use super::*;
    use crate::document::Specifier;
    use proptest::prelude::*;
    use tempfile::TempDir;

    #[test]
    fn test_sublayers_keep_insertion_order() {
        let mut builder = SceneBuilder::new();
        builder.append_sublayer("tank:/P3/t?Step=MDL");
        builder.append_sublayer("tank:/P3/t?Step=LAY");
        builder.append_sublayer("tank:/P3/t?Step=MDL");

        let layer = builder.materialize(&MockEngine::new(), false).unwrap();
        assert_eq!(
            layer.sublayers,
            vec![
                "tank:/P3/t?Step=MDL",
                "tank:/P3/t?Step=LAY",
                "tank:/P3/t?Step=MDL",
            ]
        );
    }

    #[test]
    fn test_reference_with_explicit_source_path() {
        let mut builder = SceneBuilder::new();
        builder.append_reference(ReferenceRecord::new("/prop", "tank:/P3/a").with_source_path("/geo"));

        let layer = builder.materialize(&MockEngine::new(), false).unwrap();
        let prim = layer.prim("/prop").unwrap();
        assert_eq!(prim.specifier, Specifier::Def);
        assert_eq!(prim.type_name.as_deref(), Some("Xform"));
        assert_eq!(
            prim.opinions.references,
            vec![Reference::new("tank:/P3/a", Some("/geo".to_string()))]
        );
    }

    #[test]
    fn test_reference_uses_default_prim() {
        let engine = MockEngine::new().with_default_prim("tank:/P3/a", "prop");
        let mut builder = SceneBuilder::new();
        builder.append_reference(ReferenceRecord::new("/world/prop", "tank:/P3/a"));

        let layer = builder.materialize(&engine, false).unwrap();
        let prim = layer.prim("/world/prop").unwrap();
        assert_eq!(
            prim.opinions.references,
            vec![Reference::new("tank:/P3/a", Some("/prop".to_string()))]
        );
    }

    #[test]
    fn test_unopenable_reference_has_no_prim_path() {
        let mut builder = SceneBuilder::new();
        builder.append_reference(ReferenceRecord::new("/prop", "tank:/P3/missing"));

        let layer = builder.materialize(&MockEngine::new(), false).unwrap();
        assert_eq!(
            layer.prim("/prop").unwrap().opinions.references,
            vec![Reference::new("tank:/P3/missing", None)]
        );
    }

    #[test]
    fn test_reference_without_usable_prim_is_fatal() {
        let engine = MockEngine::new().with_layer("tank:/P3/empty", Layer::new());
        let mut builder = SceneBuilder::new();
        builder.append_reference(ReferenceRecord::new("/prop", "tank:/P3/empty"));

        let err = builder.materialize(&engine, false).unwrap_err();
        assert!(matches!(err, Error::DefaultPrim { ref path } if path == "tank:/P3/empty"));
    }

    #[test]
    fn test_override_reference_does_not_define() {
        let mut builder = SceneBuilder::new();
        builder.append_reference(
            ReferenceRecord::new("/prop", "tank:/P3/a")
                .with_source_path("/prop")
                .as_override(),
        );

        let layer = builder.materialize(&MockEngine::new(), false).unwrap();
        let prim = layer.prim("/prop").unwrap();
        assert_eq!(prim.specifier, Specifier::Over);
        assert_eq!(prim.type_name, None);
    }

    #[test]
    fn test_variant_selection_is_smallest_name() {
        let mut builder = SceneBuilder::new();
        for variant in ["propC", "propA", "propB"] {
            builder.append_reference(
                ReferenceRecord::new("/prop", format!("tank:/P3/a?v={}", variant))
                    .with_source_path("/prop")
                    .with_placement(Placement::variant("variant", variant)),
            );
        }

        let layer = builder.materialize(&MockEngine::new(), false).unwrap();
        let opinions = &layer.prim("/prop").unwrap().opinions;
        assert_eq!(opinions.variant_names("variant"), vec!["propC", "propA", "propB"]);
        assert_eq!(opinions.variant_selection("variant"), Some("propA"));
        assert!(opinions.references.is_empty());

        let c = opinions.variant_set("variant").unwrap().variant("propC").unwrap();
        assert_eq!(
            c.opinions.references,
            vec![Reference::new("tank:/P3/a?v=propC", Some("/prop".to_string()))]
        );
    }

    #[test]
    fn test_half_specified_variant_pair_is_dropped() {
        testing_logger::setup();
        let mut builder = SceneBuilder::new();
        let added = builder.append_reference_parts(
            "/prop",
            "tank:/P3/a",
            Some("/prop"),
            Some("propA"),
            None,
            false,
        );
        assert!(!added);
        assert!(builder.references().is_empty());

        testing_logger::validate(|captured| {
            let warnings: Vec<_> = captured
                .iter()
                .filter(|l| l.level == log::Level::Warn)
                .collect();
            assert_eq!(warnings.len(), 1);
            assert!(warnings[0].body.contains("dropping reference"));
        });

        let layer = builder.materialize(&MockEngine::new(), false).unwrap();
        assert!(layer.prim("/prop").is_none());
    }

    #[test]
    fn test_reference_parts_full_pair_is_kept() {
        let mut builder = SceneBuilder::new();
        assert!(builder.append_reference_parts(
            "/prop",
            "tank:/P3/a",
            None,
            Some("propA"),
            Some("variant"),
            false,
        ));
        assert_eq!(
            builder.references()[0].placement,
            Placement::variant("variant", "propA")
        );
    }

    #[test]
    fn test_materialize_is_repeatable() {
        let engine = MockEngine::new().with_default_prim("tank:/P3/a", "prop");
        let mut builder = SceneBuilder::new();
        builder.append_sublayer("tank:/P3/s");
        builder.append_reference(
            ReferenceRecord::new("/prop", "tank:/P3/a")
                .with_placement(Placement::variant("variant", "propB")),
        );

        let first = builder.materialize(&engine, false).unwrap();
        let second = builder.materialize(&engine, false).unwrap();
        assert_eq!(first, second);
        assert_eq!(builder.references().len(), 1);
    }

    #[test]
    fn test_materialize_flatten_uses_engine() {
        let mut builder = SceneBuilder::new();
        builder.append_sublayer("tank:/P3/s");
        let flat = builder.materialize(&MockEngine::new(), true).unwrap();
        assert!(flat.sublayers.is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_write_sets_artifact_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.usda");
        let mut builder = SceneBuilder::new();
        builder.append_sublayer("tank:/P3/s");
        builder.write(&MockEngine::new(), &path, false).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[test]
    fn test_write_propagates_export_failure() {
        let temp = TempDir::new().unwrap();
        let engine = MockEngine {
            fail_export: true,
            ..MockEngine::new()
        };
        let result = SceneBuilder::new().write(&engine, &temp.path().join("out.usda"), false);
        assert!(result.is_err());
    }

    proptest! {
        /// Property: the active selection is the smallest added variant name
        #[test]
        fn selection_is_minimum(names in proptest::collection::vec("[a-zA-Z0-9_]{1,8}", 1..6)) {
            let mut builder = SceneBuilder::new();
            for name in &names {
                builder.append_reference(
                    ReferenceRecord::new("/prop", "tank:/P3/a")
                        .with_source_path("/prop")
                        .with_placement(Placement::variant("variant", name.as_str())),
                );
            }
            let layer = builder.materialize(&MockEngine::new(), false).unwrap();
            let expected = names.iter().min().unwrap();
            prop_assert_eq!(
                layer.prim("/prop").unwrap().opinions.variant_selection("variant"),
                Some(expected.as_str())
            );
        }
    }
}
