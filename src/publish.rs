//! # Publish Records
//!
//! A publish is only complete once it is recorded: the production database
//! needs to know that a task gained a version and where its files are.
//! [`PublishRecorder`] is that seam. [`PublishLog`] is the bundled
//! implementation, an append-only JSON-lines file that
//! [`crate::catalog::Catalog`] reads back to answer version queries.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::production::{PublishedVersion, TaskId};

/// File type recorded for every composed scene.
pub const USD_SCENE: &str = "USD Scene";

/// Description recorded for every publish made by this crate.
pub const PUBLISH_DESCRIPTION: &str = "Asset / Shot USD Publisher";

/// One file of a publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishItem {
    pub path: String,
    pub published_file_type: String,
    /// The main item is the artifact the version stands for.
    pub main: bool,
}

/// Everything needed to record one published version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub task_id: TaskId,
    pub version: u32,
    pub description: String,
    pub items: Vec<PublishItem>,
}

impl PublishRequest {
    pub fn new(task_id: TaskId, version: u32, description: impl Into<String>) -> Self {
        Self {
            task_id,
            version,
            description: description.into(),
            items: Vec::new(),
        }
    }

    pub fn add_main_publish_item(&mut self, path: &Path, published_file_type: &str) {
        self.items.push(PublishItem {
            path: path.to_string_lossy().into_owned(),
            published_file_type: published_file_type.to_string(),
            main: true,
        });
    }
}

/// What the recorder reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub versions: Vec<PublishedVersion>,
}

/// Records published versions with the production database.
pub trait PublishRecorder {
    fn run_publish(&self, request: &PublishRequest) -> Result<PublishReceipt>;
}

/// One line of the publish log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub task_id: TaskId,
    pub version: u32,
    pub path: String,
    pub published_file_type: String,
    pub description: String,
}

impl PublishRecord {
    pub fn to_version(&self) -> PublishedVersion {
        PublishedVersion {
            task_id: self.task_id,
            version: self.version,
            path: self.path.clone(),
            published_file_type: self.published_file_type.clone(),
        }
    }
}

/// An append-only JSON-lines publish log.
#[derive(Debug, Clone)]
pub struct PublishLog {
    path: PathBuf,
}

impl PublishLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in the order they were written. A missing log is empty.
    pub fn records(&self) -> Result<Vec<PublishRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }

    /// Published versions of a task with the given file type.
    pub fn versions(&self, task_id: TaskId, published_file_type: &str) -> Result<Vec<PublishedVersion>> {
        Ok(self
            .records()?
            .iter()
            .filter(|r| r.task_id == task_id && r.published_file_type == published_file_type)
            .map(PublishRecord::to_version)
            .collect())
    }
}

impl PublishRecorder for PublishLog {
    fn run_publish(&self, request: &PublishRequest) -> Result<PublishReceipt> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut versions = Vec::new();
        for item in &request.items {
            let record = PublishRecord {
                task_id: request.task_id,
                version: request.version,
                path: item.path.clone(),
                published_file_type: item.published_file_type.clone(),
                description: request.description.clone(),
            };
            writeln!(file, "{}", serde_json::to_string(&record)?)?;
            debug!("Recorded {:?}", record);
            versions.push(record.to_version());
        }

        info!(
            "Published task {} version {} ({} item(s))",
            request.task_id,
            request.version,
            versions.len()
        );
        Ok(PublishReceipt { versions })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_log_is_empty() {
        let temp = TempDir::new().unwrap();
        let log = PublishLog::new(temp.path().join("publishes.jsonl"));
        assert!(log.records().unwrap().is_empty());
        assert!(log.versions(TaskId(1), USD_SCENE).unwrap().is_empty());
    }

    #[test]
    fn test_run_publish_appends_records() {
        let temp = TempDir::new().unwrap();
        let log = PublishLog::new(temp.path().join("db").join("publishes.jsonl"));

        let mut request = PublishRequest::new(TaskId(7), 1, PUBLISH_DESCRIPTION);
        request.add_main_publish_item(Path::new("/out/v001/a.usda"), USD_SCENE);
        let receipt = log.run_publish(&request).unwrap();
        assert_eq!(receipt.versions.len(), 1);

        let mut second = PublishRequest::new(TaskId(7), 2, PUBLISH_DESCRIPTION);
        second.add_main_publish_item(Path::new("/out/v002/a.usda"), USD_SCENE);
        log.run_publish(&second).unwrap();

        let records = log.records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].description, "Asset / Shot USD Publisher");
        assert_eq!(records[1].version, 2);

        let versions = log.versions(TaskId(7), USD_SCENE).unwrap();
        assert_eq!(versions.iter().map(|v| v.version).collect::<Vec<_>>(), vec![1, 2]);
        assert!(log.versions(TaskId(7), "Alembic Cache").unwrap().is_empty());
        assert!(log.versions(TaskId(8), USD_SCENE).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_log_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("publishes.jsonl");
        fs::write(&path, "{not json}\n").unwrap();
        assert!(PublishLog::new(path).records().is_err());
    }
}
