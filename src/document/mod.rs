//! # Scene Documents
//!
//! An in-memory model of one scene-description layer and the engine that
//! reads, writes and flattens layers.
//!
//! A [`Layer`] holds layer metadata, an ordered list of sublayers and a tree
//! of [`PrimSpec`]s. Each prim carries its [`Opinions`]: metadata, references,
//! variant sets and selections, properties and child prims. Variants carry
//! opinions of their own, which is where variant-scoped references live.
//!
//! The model covers what the composition engine authors and inspects. Property
//! statements are kept as raw text and round-trip unchanged, which is enough
//! to carry content through a flatten without interpreting it.

pub mod engine;
pub mod usda;

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub use engine::{DocumentEngine, UsdaEngine};

/// Top-level prim written by Houdini that never holds scene content.
pub const HOUDINI_LAYER_INFO: &str = "HoudiniLayerInfo";

/// How a prim spec contributes to the composed prim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn keyword(self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "def" => Some(Specifier::Def),
            "over" => Some(Specifier::Over),
            "class" => Some(Specifier::Class),
            _ => None,
        }
    }
}

/// A reference arc to a prim in another artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Locator or file path of the referenced artifact.
    pub asset_path: String,
    /// Prim to reference; the artifact's default prim when absent.
    pub prim_path: Option<String>,
}

impl Reference {
    pub fn new(asset_path: impl Into<String>, prim_path: Option<String>) -> Self {
        Self {
            asset_path: asset_path.into(),
            prim_path,
        }
    }
}

/// A property statement kept verbatim, e.g. `float3 xformOp:translate = (0, 1, 0)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub raw: String,
}

impl Property {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The property name: the last word of the declaration.
    pub fn name(&self) -> &str {
        let declaration = self.raw.split('=').next().unwrap_or(&self.raw);
        let declaration = declaration.split('(').next().unwrap_or(declaration);
        declaration.split_whitespace().last().unwrap_or("")
    }
}

/// One variant of a variant set and the opinions it contributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Variant {
    pub name: String,
    pub opinions: Opinions,
}

/// A named switch between variants.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariantSet {
    pub name: String,
    pub variants: Vec<Variant>,
}

impl VariantSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variants: Vec::new(),
        }
    }

    /// Adds a variant if it is not there yet and returns it.
    pub fn add_variant(&mut self, name: &str) -> &mut Variant {
        let index = match self.variants.iter().position(|v| v.name == name) {
            Some(index) => index,
            None => {
                self.variants.push(Variant {
                    name: name.to_string(),
                    opinions: Opinions::default(),
                });
                self.variants.len() - 1
            }
        };
        &mut self.variants[index]
    }

    pub fn variant(&self, name: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.name == name)
    }

    pub fn variant_names(&self) -> Vec<&str> {
        self.variants.iter().map(|v| v.name.as_str()).collect()
    }
}

/// Everything a prim spec (or a variant) says about a prim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Opinions {
    /// Metadata entries other than references and variants, as raw values.
    pub metadata: Vec<(String, String)>,
    pub references: Vec<Reference>,
    pub variant_sets: Vec<VariantSet>,
    /// Variant selection per variant set.
    pub selections: BTreeMap<String, String>,
    pub properties: Vec<Property>,
    pub children: Vec<PrimSpec>,
}

impl Opinions {
    pub fn is_empty(&self) -> bool {
        self.metadata.is_empty()
            && self.references.is_empty()
            && self.variant_sets.is_empty()
            && self.selections.is_empty()
            && self.properties.is_empty()
            && self.children.is_empty()
    }

    pub fn add_reference(&mut self, reference: Reference) {
        self.references.push(reference);
    }

    pub fn has_variant_set(&self, name: &str) -> bool {
        self.variant_sets.iter().any(|s| s.name == name)
    }

    pub fn variant_set(&self, name: &str) -> Option<&VariantSet> {
        self.variant_sets.iter().find(|s| s.name == name)
    }

    pub fn variant_set_mut(&mut self, name: &str) -> Option<&mut VariantSet> {
        self.variant_sets.iter_mut().find(|s| s.name == name)
    }

    /// Adds a variant set if it is not there yet and returns it.
    pub fn add_variant_set(&mut self, name: &str) -> &mut VariantSet {
        let index = match self.variant_sets.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.variant_sets.push(VariantSet::new(name));
                self.variant_sets.len() - 1
            }
        };
        &mut self.variant_sets[index]
    }

    /// Variant names of a set, empty when the set does not exist.
    pub fn variant_names(&self, set: &str) -> Vec<&str> {
        self.variant_set(set)
            .map(VariantSet::variant_names)
            .unwrap_or_default()
    }

    pub fn set_variant_selection(&mut self, set: &str, variant: &str) {
        self.selections.insert(set.to_string(), variant.to_string());
    }

    pub fn variant_selection(&self, set: &str) -> Option<&str> {
        self.selections.get(set).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&PrimSpec> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut PrimSpec> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    fn child_or_insert(&mut self, name: &str, specifier: Specifier) -> &mut PrimSpec {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(PrimSpec::new(name, specifier, None));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }
}

/// A prim spec: specifier, type and opinions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimSpec {
    pub name: String,
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub opinions: Opinions,
}

impl PrimSpec {
    pub fn new(name: impl Into<String>, specifier: Specifier, type_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            specifier,
            type_name,
            opinions: Opinions::default(),
        }
    }
}

/// One scene-description layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Layer {
    pub default_prim: Option<String>,
    /// Layer metadata other than `defaultPrim` and `subLayers`, as raw values.
    pub metadata: Vec<(String, String)>,
    /// Sublayer asset paths in authored order.
    pub sublayers: Vec<String>,
    pub root_prims: Vec<PrimSpec>,
    /// Where the layer was read from, used to anchor relative asset paths.
    pub source_path: Option<PathBuf>,
}

/// Splits `/a/b` into `["a", "b"]`, rejecting malformed prim paths.
pub fn split_prim_path(path: &str) -> Result<Vec<&str>> {
    let invalid = |why: &str| Error::document(format!("invalid prim path '{}': {}", path, why));
    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| invalid("must be absolute"))?;
    if rest.is_empty() {
        return Err(invalid("the pseudo-root cannot be edited"));
    }
    let segments: Vec<&str> = rest.split('/').collect();
    for segment in &segments {
        if segment.is_empty() {
            return Err(invalid("empty path segment"));
        }
        if !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(invalid("names may only contain letters, digits and '_'"));
        }
    }
    Ok(segments)
}

impl Layer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_sublayer(&mut self, asset_path: impl Into<String>) {
        self.sublayers.push(asset_path.into());
    }

    pub fn root_prim(&self, name: &str) -> Option<&PrimSpec> {
        self.root_prims.iter().find(|p| p.name == name)
    }

    /// Looks up a prim spec by absolute path.
    pub fn prim(&self, path: &str) -> Option<&PrimSpec> {
        let segments = split_prim_path(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut prim = self.root_prim(first)?;
        for segment in rest {
            prim = prim.opinions.child(segment)?;
        }
        Some(prim)
    }

    pub fn prim_mut(&mut self, path: &str) -> Option<&mut PrimSpec> {
        let segments = split_prim_path(path).ok()?;
        let (first, rest) = segments.split_first()?;
        let mut prim = self.root_prims.iter_mut().find(|p| p.name == *first)?;
        for segment in rest {
            prim = prim.opinions.child_mut(segment)?;
        }
        Some(prim)
    }

    /// Defines a typed prim, creating typeless `def` ancestors as needed.
    pub fn define_prim(&mut self, path: &str, type_name: Option<&str>) -> Result<&mut PrimSpec> {
        let prim = self.ensure_prim(path, Specifier::Def)?;
        prim.specifier = Specifier::Def;
        if let Some(type_name) = type_name {
            prim.type_name = Some(type_name.to_string());
        }
        Ok(prim)
    }

    /// Returns the prim at `path`, creating it (and ancestors) as `over` if
    /// absent. Existing specs are left unchanged.
    pub fn override_prim(&mut self, path: &str) -> Result<&mut PrimSpec> {
        self.ensure_prim(path, Specifier::Over)
    }

    fn ensure_prim(&mut self, path: &str, specifier: Specifier) -> Result<&mut PrimSpec> {
        let segments = split_prim_path(path)?;
        let (first, rest) = segments
            .split_first()
            .ok_or_else(|| Error::document(format!("invalid prim path '{}'", path)))?;

        let index = match self.root_prims.iter().position(|p| p.name == *first) {
            Some(index) => index,
            None => {
                self.root_prims.push(PrimSpec::new(*first, specifier, None));
                self.root_prims.len() - 1
            }
        };
        let mut prim = &mut self.root_prims[index];
        for segment in rest {
            prim = prim.opinions.child_or_insert(segment, specifier);
        }
        Ok(prim)
    }

    /// The declared default prim, if it names a prim that exists.
    pub fn default_prim_path(&self) -> Option<String> {
        let name = self.default_prim.as_deref()?;
        self.root_prim(name).map(|_| format!("/{}", name))
    }

    /// The first top-level prim that carries content.
    pub fn first_content_prim(&self) -> Option<String> {
        self.root_prims
            .iter()
            .find(|p| p.name != HOUDINI_LAYER_INFO)
            .map(|p| format!("/{}", p.name))
    }
}
