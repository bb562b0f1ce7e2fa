//! The document engine seam and its USDA implementation.
//!
//! [`DocumentEngine`] is what the composition engine needs from a
//! scene-description library: open a layer, export a layer, and flatten a
//! layer's composition into a single self-contained layer.
//!
//! [`UsdaEngine`] implements it over USDA text files. Asset paths that are
//! locators go through an [`AssetResolver`]; relative file paths are anchored
//! at the directory of the layer that mentions them.
//!
//! Flattening composes, from weakest to strongest: the sublayers in authored
//! order (a later sublayer overrides an earlier one), then the layer's own
//! prims. References are then inlined beneath the referencing prim, whose
//! local opinions stay stronger. Arcs that cannot be resolved are logged and
//! left in place.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{usda, Layer, Opinions, PrimSpec, Reference, Specifier, VariantSet};
use crate::error::{Error, Result};
use crate::uri::{is_reference, AssetResolver};

/// How deep sublayer and reference chains may nest before giving up.
const MAX_COMPOSITION_DEPTH: usize = 32;

/// Reading, writing and flattening scene documents.
pub trait DocumentEngine {
    /// Opens the layer at a locator or file path.
    fn open(&self, asset_path: &str) -> Result<Layer>;

    /// Writes a layer to `path`.
    fn export(&self, layer: &Layer, path: &Path) -> Result<()>;

    /// Returns a single layer holding the fully composed result of `layer`.
    fn flatten(&self, layer: &Layer) -> Result<Layer>;

    /// The prim a reference to `asset_path` should target by default.
    ///
    /// Uses the declared default prim, falling back to the first top-level
    /// prim that is not `HoudiniLayerInfo`. Returns `Ok(None)` when the
    /// artifact cannot be opened at all, and an error when it opens but has no
    /// usable prim.
    fn default_entry_point(&self, asset_path: &str) -> Result<Option<String>> {
        let composed = match self.open(asset_path).and_then(|layer| self.flatten(&layer)) {
            Ok(layer) => layer,
            Err(e) => {
                warn!("Could not open USD: {} ({})", asset_path, e);
                return Ok(None);
            }
        };

        if let Some(path) = composed.default_prim_path() {
            return Ok(Some(path));
        }

        warn!("No default prim was set so having to guess.");
        composed
            .first_content_prim()
            .map(Some)
            .ok_or_else(|| Error::DefaultPrim {
                path: asset_path.to_string(),
            })
    }
}

/// A [`DocumentEngine`] over USDA text files.
pub struct UsdaEngine<'a> {
    resolver: Option<&'a dyn AssetResolver>,
}

impl<'a> UsdaEngine<'a> {
    /// Creates an engine that resolves locators through `resolver`.
    pub fn new(resolver: &'a dyn AssetResolver) -> Self {
        Self {
            resolver: Some(resolver),
        }
    }

    /// Creates an engine that only understands file paths.
    pub fn without_resolver() -> Self {
        Self { resolver: None }
    }

    fn locate(&self, asset_path: &str, anchor: Option<&Path>) -> Result<PathBuf> {
        if is_reference(asset_path) {
            let resolver = self.resolver.ok_or_else(|| {
                Error::document(format!("no resolver available for {}", asset_path))
            })?;
            return resolver
                .resolve(asset_path)?
                .ok_or_else(|| Error::document(format!("could not resolve {}", asset_path)));
        }

        let path = Path::new(asset_path);
        match anchor.and_then(Path::parent) {
            Some(dir) if path.is_relative() => Ok(dir.join(path)),
            _ => Ok(path.to_path_buf()),
        }
    }

    fn open_anchored(&self, asset_path: &str, anchor: Option<&Path>) -> Result<Layer> {
        let path = self.locate(asset_path, anchor)?;
        debug!("Opening {} ({})", asset_path, path.display());
        let text = fs::read_to_string(&path).map_err(|e| {
            Error::document(format!("could not read {}: {}", path.display(), e))
        })?;
        let mut layer = usda::parse(&text).map_err(|e| match e {
            Error::Document { message, location } => Error::Document {
                message,
                location: Some(match location {
                    Some(l) => format!("{}, {}", path.display(), l),
                    None => path.display().to_string(),
                }),
            },
            other => other,
        })?;
        layer.source_path = Some(path);
        Ok(layer)
    }

    fn flatten_at(&self, layer: &Layer, depth: usize) -> Result<Layer> {
        if depth > MAX_COMPOSITION_DEPTH {
            return Err(Error::document(
                "composition nests too deeply (cycle between layers?)",
            ));
        }
        let anchor = layer.source_path.as_deref();

        let mut composed: Vec<PrimSpec> = Vec::new();
        for sublayer in &layer.sublayers {
            let opened = match self.open_anchored(sublayer, anchor) {
                Ok(opened) => opened,
                Err(e) => {
                    warn!("Skipping sublayer {}: {}", sublayer, e);
                    continue;
                }
            };
            let flat = self.flatten_at(&opened, depth + 1)?;
            composed = merge_prim_lists(flat.root_prims, composed);
        }
        composed = merge_prim_lists(layer.root_prims.clone(), composed);

        for prim in &mut composed {
            self.inline_prim(prim, anchor, depth)?;
        }

        let mut metadata = layer.metadata.clone();
        metadata.retain(|(key, _)| key != "subLayers");
        Ok(Layer {
            default_prim: layer.default_prim.clone(),
            metadata,
            sublayers: Vec::new(),
            root_prims: composed,
            source_path: layer.source_path.clone(),
        })
    }

    fn inline_prim(&self, prim: &mut PrimSpec, anchor: Option<&Path>, depth: usize) -> Result<()> {
        if let Some(type_name) = self.inline_opinions(&mut prim.opinions, anchor, depth)? {
            if prim.type_name.is_none() {
                prim.type_name = Some(type_name);
            }
        }
        Ok(())
    }

    /// Inlines the references of `opinions` and of everything below them.
    ///
    /// Returns the type of the last referenced prim, for typeless prims.
    fn inline_opinions(
        &self,
        opinions: &mut Opinions,
        anchor: Option<&Path>,
        depth: usize,
    ) -> Result<Option<String>> {
        let mut referenced_type = None;
        let mut unresolved = Vec::new();

        for reference in std::mem::take(&mut opinions.references) {
            match self.referenced_prim(&reference, anchor, depth)? {
                Some(target) => {
                    referenced_type = target.type_name.clone().or(referenced_type);
                    merge_opinions(opinions, target.opinions);
                }
                None => unresolved.push(reference),
            }
        }
        unresolved.append(&mut opinions.references);
        opinions.references = unresolved;

        for set in &mut opinions.variant_sets {
            for variant in &mut set.variants {
                self.inline_opinions(&mut variant.opinions, anchor, depth)?;
            }
        }
        for child in &mut opinions.children {
            self.inline_prim(child, anchor, depth)?;
        }
        Ok(referenced_type)
    }

    fn referenced_prim(
        &self,
        reference: &Reference,
        anchor: Option<&Path>,
        depth: usize,
    ) -> Result<Option<PrimSpec>> {
        if reference.asset_path.is_empty() {
            // Internal references stay as authored
            return Ok(None);
        }
        let opened = match self.open_anchored(&reference.asset_path, anchor) {
            Ok(opened) => opened,
            Err(e) => {
                warn!("Leaving reference to {} in place: {}", reference.asset_path, e);
                return Ok(None);
            }
        };
        let flat = self.flatten_at(&opened, depth + 1)?;

        let target = match &reference.prim_path {
            Some(path) => Some(path.clone()),
            None => flat.default_prim_path().or_else(|| flat.first_content_prim()),
        };
        let found = target.as_deref().and_then(|path| flat.prim(path)).cloned();
        if found.is_none() {
            warn!(
                "Reference to {} names no prim ({:?}); leaving it in place",
                reference.asset_path, target
            );
        }
        Ok(found)
    }
}

impl DocumentEngine for UsdaEngine<'_> {
    fn open(&self, asset_path: &str) -> Result<Layer> {
        self.open_anchored(asset_path, None)
    }

    fn export(&self, layer: &Layer, path: &Path) -> Result<()> {
        fs::write(path, usda::to_usda(layer))?;
        Ok(())
    }

    fn flatten(&self, layer: &Layer) -> Result<Layer> {
        self.flatten_at(layer, 0)
    }
}

/// Merges two prim lists by name; `strong` wins where both have opinions.
fn merge_prim_lists(strong: Vec<PrimSpec>, weak: Vec<PrimSpec>) -> Vec<PrimSpec> {
    let mut merged = weak;
    let mut order: Vec<String> = Vec::new();
    for prim in strong {
        order.push(prim.name.clone());
        match merged.iter().position(|p| p.name == prim.name) {
            Some(index) => {
                let weak_prim = merged.remove(index);
                let mut strong_prim = prim;
                merge_prim(&mut strong_prim, weak_prim);
                merged.insert(index, strong_prim);
            }
            None => merged.push(prim),
        }
    }
    merged
}

fn merge_prim(strong: &mut PrimSpec, weak: PrimSpec) {
    if weak.specifier == Specifier::Def || strong.specifier == Specifier::Def {
        strong.specifier = Specifier::Def;
    } else if weak.specifier == Specifier::Class {
        strong.specifier = Specifier::Class;
    }
    if strong.type_name.is_none() {
        strong.type_name = weak.type_name;
    }
    merge_opinions(&mut strong.opinions, weak.opinions);
}

fn merge_opinions(strong: &mut Opinions, weak: Opinions) {
    for (key, value) in weak.metadata {
        if !strong.metadata.iter().any(|(k, _)| *k == key) {
            strong.metadata.push((key, value));
        }
    }
    strong.references.extend(weak.references);
    for (set, variant) in weak.selections {
        strong.selections.entry(set).or_insert(variant);
    }
    for property in weak.properties {
        if !strong.properties.iter().any(|p| p.name() == property.name()) {
            strong.properties.push(property);
        }
    }
    for weak_set in weak.variant_sets {
        match strong.variant_set_mut(&weak_set.name) {
            Some(strong_set) => merge_variant_sets(strong_set, weak_set),
            None => strong.variant_sets.push(weak_set),
        }
    }
    strong.children = merge_prim_lists(std::mem::take(&mut strong.children), weak.children);
}

fn merge_variant_sets(strong: &mut VariantSet, weak: VariantSet) {
    for weak_variant in weak.variants {
        match strong.variants.iter_mut().find(|v| v.name == weak_variant.name) {
            Some(variant) => merge_opinions(&mut variant.opinions, weak_variant.opinions),
            None => strong.variants.push(weak_variant),
        }
    }
}
