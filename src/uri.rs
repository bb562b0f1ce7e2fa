//! # Locator URIs
//!
//! Artifacts are never referenced by filesystem path inside a composed
//! document. They are referenced by a *locator*, an opaque URI that names the
//! production fields of the artifact and the version rule to apply:
//!
//! ```text
//! tank:/P3/usd_asset_publish?Step=MDL&Asset=propTestoid&variant_name=AvA&version=latest
//! ```
//!
//! The locator is resolved back to a path at read time by an
//! [`AssetResolver`], so a document that references `version=latest` keeps
//! following new publishes of its inputs.
//!
//! Only this module knows the locator layout. [`Locator::parse`] exists for
//! resolver implementations; nothing else should take a locator apart.

use std::fmt;
use std::path::PathBuf;

use log::{debug, warn};
use url::form_urlencoded;

use crate::error::{Error, Result};
use crate::production::{ProductionDatabase, TaskId};
use crate::templates::TemplateService;

/// URI scheme of every locator.
pub const SCHEME: &str = "tank";

/// The version rule that follows the newest publish.
pub const LATEST: &str = "latest";

/// Resolves a locator to a concrete file.
pub trait AssetResolver {
    /// Returns `Ok(None)` when the locator names nothing that exists.
    fn resolve(&self, locator: &str) -> Result<Option<PathBuf>>;
}

/// True if `path` is a locator rather than a filesystem path.
pub fn is_reference(path: &str) -> bool {
    path.starts_with(SCHEME) && path[SCHEME.len()..].starts_with(':')
}

/// True for `"latest"` or a non-empty run of ASCII digits.
pub fn valid_version(version: &str) -> bool {
    version == LATEST || (!version.is_empty() && version.bytes().all(|b| b.is_ascii_digit()))
}

/// Encodes project, template and fields into a locator.
///
/// Fields are encoded in the order given, so callers control determinism.
pub fn build_uri(project: &str, template: &str, fields: &[(&str, &str)]) -> String {
    debug!("URI input arguments: {:?}", fields);

    if fields.is_empty() {
        warn!("At least one field should be supplied to generate a valid URI.");
    }

    let mut query = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        query.append_pair(key, value);
    }

    let uri = format!("{}:/{}/{}?{}", SCHEME, project, template, query.finish());
    debug!("URI generated: {}", uri);
    uri
}

/// Resolves a locator through `resolver`, logging instead of failing.
pub fn resolve_path(resolver: &dyn AssetResolver, locator: &str) -> Option<PathBuf> {
    match resolver.resolve(locator) {
        Ok(Some(path)) => Some(path),
        Ok(None) => {
            warn!("Could not resolve {}", locator);
            None
        }
        Err(e) => {
            warn!("Could not resolve {}: {}", locator, e);
            None
        }
    }
}

/// A decoded locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub project: String,
    pub template: String,
    pub fields: Vec<(String, String)>,
}

impl Locator {
    /// Decodes a locator produced by [`build_uri`].
    pub fn parse(locator: &str) -> Result<Self> {
        let invalid = |message: &str| Error::Locator {
            locator: locator.to_string(),
            message: message.to_string(),
        };

        if !is_reference(locator) {
            return Err(invalid("missing tank: scheme"));
        }
        let rest = &locator[SCHEME.len() + 1..];
        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| invalid("expected '/' after the scheme"))?;
        let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
        let (project, template) = path
            .split_once('/')
            .ok_or_else(|| invalid("expected /{project}/{template}"))?;
        if project.is_empty() || template.is_empty() || template.contains('/') {
            return Err(invalid("expected /{project}/{template}"));
        }

        let fields = form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        Ok(Self {
            project: project.to_string(),
            template: template.to_string(),
            fields,
        })
    }

    /// The value of a query field.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Which entity a template's fields describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TemplateContext {
    Asset,
    Shot,
}

impl TemplateContext {
    fn entity_field(self) -> &'static str {
        match self {
            TemplateContext::Asset => "Asset",
            TemplateContext::Shot => "Shot",
        }
    }
}

struct Shown<'a>(&'a Option<String>);

impl fmt::Display for Shown<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(value) => f.write_str(value),
            None => f.write_str("<missing>"),
        }
    }
}

/// Builds task locators from production data.
#[derive(Clone, Copy)]
pub struct UriBuilder<'a> {
    db: &'a dyn ProductionDatabase,
    templates: &'a dyn TemplateService,
}

impl<'a> UriBuilder<'a> {
    pub fn new(db: &'a dyn ProductionDatabase, templates: &'a dyn TemplateService) -> Self {
        Self { db, templates }
    }

    /// Builds the locator of a task's artifact.
    ///
    /// `version` is `"latest"` or a non-negative integer string. Any missing
    /// production field, a malformed version or a template that is neither
    /// asset nor shot context is an error.
    pub fn build_task_uri(
        &self,
        project: &str,
        template_name: &str,
        task_id: TaskId,
        version: &str,
    ) -> Result<String> {
        let context = if self.templates.is_asset_template(template_name) {
            TemplateContext::Asset
        } else if self.templates.is_shot_template(template_name) {
            TemplateContext::Shot
        } else {
            return Err(Error::TemplateContext {
                template: template_name.to_string(),
            });
        };

        let entity_name = match context {
            TemplateContext::Asset => match self.db.asset_id_from_task_id(task_id)? {
                Some(id) => self.db.asset_name_from_id(id)?,
                None => None,
            },
            TemplateContext::Shot => match self.db.shot_id_from_task_id(task_id)? {
                Some(id) => self.db.shot_name_from_id(id)?,
                None => None,
            },
        };
        let step_name = self.db.step_from_task(task_id)?;
        let variant_name = self.db.variant_name_from_task(task_id)?;

        let (entity_name, step_name, variant_name) = match (entity_name, step_name, variant_name) {
            (Some(e), Some(s), Some(v)) if valid_version(version) => (e, s, v),
            (e, s, v) => {
                return Err(Error::InvalidUriInputs {
                    details: format!(
                        "Project: {}, Template: {}, Task ID: {} ({}: {}, Step: {}, Variant: {}), Version: {}.",
                        project,
                        template_name,
                        task_id,
                        context.entity_field(),
                        Shown(&e),
                        Shown(&s),
                        Shown(&v),
                        version,
                    ),
                });
            }
        };

        Ok(build_uri(
            project,
            template_name,
            &[
                ("Step", &step_name),
                (context.entity_field(), &entity_name),
                ("variant_name", &variant_name),
                ("version", version),
            ],
        ))
    }
}
