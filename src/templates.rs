//! # Templates and Versioning
//!
//! The versioning/template service decides where a task's artifacts live and
//! which version numbers exist. It is consumed through [`TemplateService`].
//!
//! [`PathTemplate`] is the building block of the bundled implementation: a
//! path pattern with `{field}` tokens, where `{field:03}` pads the value with
//! zeros. The `version` token is special: it is what varies between the
//! published versions of a task, so the template can also be scanned against
//! the filesystem to discover which versions already exist.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use glob::Pattern;
use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::production::TaskId;

/// The token that carries the version number in a path template.
pub const VERSION_FIELD: &str = "version";

/// Path templates and version numbering, keyed by template name.
pub trait TemplateService {
    /// True if the template describes asset-context artifacts.
    fn is_asset_template(&self, name: &str) -> bool;

    /// True if the template describes shot-context artifacts.
    fn is_shot_template(&self, name: &str) -> bool;

    /// The highest existing version of a task across the given templates.
    fn current_version(&self, templates: &[&str], task_id: TaskId) -> Result<Option<u32>>;

    /// The version number the next publish of a task should use.
    fn next_version(&self, templates: &[&str], task_id: TaskId) -> Result<u32> {
        Ok(self
            .current_version(templates, task_id)?
            .map_or(1, |current| current + 1))
    }

    /// The output path of a task at a specific version.
    fn output_path(&self, template: &str, task_id: TaskId, version: u32) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field { name: String, width: Option<usize> },
}

/// A path pattern such as `{root}/{Asset}/v{version:03}/{Asset}.usda`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTemplate {
    pattern: String,
    segments: Vec<Segment>,
}

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\{(\w+)(?::0(\d+))?\}").expect("token regex is valid"))
}

impl PathTemplate {
    /// Parses a template pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern.contains("{}") {
            return Err(Error::Template {
                template: pattern.to_string(),
                message: "empty field token".to_string(),
            });
        }

        let mut segments = Vec::new();
        let mut last = 0;
        for captures in token_regex().captures_iter(pattern) {
            let token = captures.get(0).expect("group 0 always matches");
            if token.start() > last {
                segments.push(Segment::Literal(pattern[last..token.start()].to_string()));
            }
            let width = match captures.get(2) {
                Some(w) => Some(w.as_str().parse::<usize>().map_err(|e| Error::Template {
                    template: pattern.to_string(),
                    message: format!("invalid padding '{}': {}", w.as_str(), e),
                })?),
                None => None,
            };
            segments.push(Segment::Field {
                name: captures[1].to_string(),
                width,
            });
            last = token.end();
        }
        if last < pattern.len() {
            segments.push(Segment::Literal(pattern[last..].to_string()));
        }

        Ok(Self {
            pattern: pattern.to_string(),
            segments,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether the template contains a given field token.
    pub fn has_field(&self, field: &str) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Field { name, .. } if name == field))
    }

    /// Renders the template with the given fields and version.
    pub fn render(&self, fields: &BTreeMap<String, String>, version: u32) -> Result<String> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field { name, width } if name == VERSION_FIELD => {
                    out.push_str(&pad(&version.to_string(), *width));
                }
                Segment::Field { name, width } => {
                    out.push_str(&pad(self.field(fields, name)?, *width));
                }
            }
        }
        Ok(out)
    }

    /// Lists the versions that exist on disk for the given fields.
    ///
    /// Returns them sorted ascending and de-duplicated.
    pub fn versions_on_disk(&self, fields: &BTreeMap<String, String>) -> Result<Vec<u32>> {
        if !self.has_field(VERSION_FIELD) {
            return Err(Error::Template {
                template: self.pattern.clone(),
                message: "template has no {version} field".to_string(),
            });
        }

        let mut glob_pattern = String::new();
        let mut regex_pattern = String::from("^");
        let mut seen_version = false;
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    glob_pattern.push_str(&Pattern::escape(text));
                    regex_pattern.push_str(&regex::escape(text));
                }
                Segment::Field { name, .. } if name == VERSION_FIELD => {
                    glob_pattern.push('*');
                    if seen_version {
                        regex_pattern.push_str(r"\d+");
                    } else {
                        regex_pattern.push_str(r"(\d+)");
                        seen_version = true;
                    }
                }
                Segment::Field { name, width } => {
                    let value = pad(self.field(fields, name)?, *width);
                    glob_pattern.push_str(&Pattern::escape(&value));
                    regex_pattern.push_str(&regex::escape(&value));
                }
            }
        }
        regex_pattern.push('$');
        let matcher = Regex::new(&regex_pattern)?;

        let mut versions = Vec::new();
        for entry in glob::glob(&glob_pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    debug!("Skipping unreadable path while scanning versions: {}", e);
                    continue;
                }
            };
            let path = path.to_string_lossy();
            if let Some(version) = matcher
                .captures(&path)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<u32>().ok())
            {
                versions.push(version);
            }
        }
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    fn field<'f>(&self, fields: &'f BTreeMap<String, String>, name: &str) -> Result<&'f str> {
        fields
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Template {
                template: self.pattern.clone(),
                message: format!("no value for field '{}'", name),
            })
    }
}

fn pad(value: &str, width: Option<usize>) -> String {
    match width {
        Some(width) => format!("{:0>width$}", value, width = width),
        None => value.to_string(),
    }
}
