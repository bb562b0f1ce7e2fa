//! # Error Handling
//!
//! This module defines the centralized error type for `scene-merge`. It uses
//! the `thiserror` library to describe every failure mode of the composition
//! and publish engine with enough context for an operator to act on it.
//!
//! Errors fall into three groups:
//!
//! - **Missing mandatory upstream data**: the production database lacks the
//!   task a merge publishes into (`MissingTask`). Missing *optional* data
//!   (a step that was never created, a version that was never published) is
//!   not an error; it is logged and skipped by the caller.
//! - **Invalid input**: malformed versions, unclassifiable templates,
//!   unresolvable default prims, malformed locators or documents.
//! - **Publish failure**: anything that goes wrong while writing or recording
//!   a publish is wrapped into `PublishFailed`.
//!
//! Library failures from `std::io`, `serde_yaml`, `serde_json`, `regex` and
//! `glob` are wrapped transparently.

use thiserror::Error;

/// Main error type for scene-merge operations
#[derive(Error, Debug)]
pub enum Error {
    /// The pipeline configuration could not be parsed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A template is classified as neither asset nor shot context.
    #[error("Could not determine asset or shot context from template: {template}")]
    TemplateContext { template: String },

    /// A template is unknown or could not be rendered.
    #[error("Template error: {template} - {message}")]
    Template { template: String, message: String },

    /// The inputs to a locator were incomplete or the version was malformed.
    ///
    /// The message lists every resolved field so the missing one is obvious.
    #[error("Invalid inputs found when building URI. {details}")]
    InvalidUriInputs { details: String },

    /// A locator string could not be decoded.
    #[error("Invalid locator {locator}: {message}")]
    Locator { locator: String, message: String },

    /// The task a merge publishes into does not exist.
    #[error("Missing task. {task} not found for {entity}. Please notify production to get it amended.")]
    MissingTask { task: String, entity: String },

    /// An asset or shot id has no name in the production database.
    #[error("No name found in the production database for {entity}")]
    UnknownEntity { entity: String },

    /// Neither a default prim nor a usable top-level prim was found.
    #[error("Could not work out the default prim for {path}")]
    DefaultPrim { path: String },

    /// A published variant does not carry the expected entity prefix.
    #[error("Invalid USD variant name: {variant} (expected prefix {prefix})")]
    InvalidVariantName { variant: String, prefix: String },

    /// A scene document is malformed or an edit is not applicable.
    #[error("Document error: {message}{}", location.as_ref().map(|l| format!(" ({})", l)).unwrap_or_default())]
    Document {
        message: String,
        /// Line/file information when the error comes from parsing
        location: Option<String>,
    },

    /// Writing or recording a publish failed.
    #[error("Publish failed for {path}: {source}")]
    PublishFailed {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Shorthand for a document error without location information.
    pub fn document(message: impl Into<String>) -> Self {
        Error::Document {
            message: message.into(),
            location: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config_parse_with_hint() {
        let error = Error::ConfigParse {
            message: "Missing templates".to_string(),
            hint: Some("Add a 'templates:' mapping".to_string()),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration parsing error"));
        assert!(display.contains("Missing templates"));
        assert!(display.contains("hint:"));
    }

    #[test]
    fn test_error_display_missing_task() {
        let error = Error::MissingTask {
            task: "AvA_ASS".to_string(),
            entity: "propTestoid".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("AvA_ASS not found for propTestoid"));
        assert!(display.contains("notify production"));
    }

    #[test]
    fn test_error_display_default_prim_names_path() {
        let error = Error::DefaultPrim {
            path: "/publish/prop_v003.usda".to_string(),
        };
        assert!(format!("{}", error).contains("/publish/prop_v003.usda"));
    }

    #[test]
    fn test_error_display_document_with_location() {
        let error = Error::Document {
            message: "unexpected token".to_string(),
            location: Some("line 4".to_string()),
        };
        assert_eq!(
            format!("{}", error),
            "Document error: unexpected token (line 4)"
        );
    }

    #[test]
    fn test_error_publish_failed_keeps_source() {
        let error = Error::PublishFailed {
            path: "/out/a.usda".to_string(),
            source: Box::new(Error::document("export refused")),
        };
        let display = format!("{}", error);
        assert!(display.contains("Publish failed for /out/a.usda"));
        assert!(display.contains("export refused"));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        let display = format!("{}", error);
        assert!(display.contains("I/O error"));
        assert!(display.contains("File not found"));
    }

    #[test]
    fn test_error_from_yaml_error() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: [unclosed").unwrap_err();
        let error: Error = yaml_error.into();
        assert!(format!("{}", error).contains("YAML parsing error"));
    }
}
