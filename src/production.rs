//! # Production Context
//!
//! Identifiers and lookups against the production-tracking database.
//!
//! The database itself is an external collaborator and is reached through the
//! [`ProductionDatabase`] trait. Every lookup returns `Ok(None)` (or an empty
//! list) when the data simply does not exist; `Err` is reserved for the
//! database being unreachable or corrupt. The bundled implementation is
//! [`crate::catalog::Catalog`]; tests use in-memory mocks.
//!
//! [`ContextResolver`] layers the task naming convention (`{variant}_{step}`)
//! on top of the raw lookups.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Opaque key of a production task.
    TaskId
);
id_type!(
    /// Key of an asset entity.
    AssetId
);
id_type!(
    /// Key of a shot entity.
    ShotId
);

/// The production entity a context is attached to: exactly one asset or shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Asset(AssetId),
    Shot(ShotId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Asset(id) => write!(f, "asset {}", id),
            EntityRef::Shot(id) => write!(f, "shot {}", id),
        }
    }
}

/// A task as listed for an entity and step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: TaskId,
    /// The task name, conventionally `{variant}_{step}`.
    pub content: String,
}

/// A published file version known to the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedVersion {
    pub task_id: TaskId,
    pub version: u32,
    pub path: String,
    pub published_file_type: String,
}

/// Lookups against the production-tracking database.
pub trait ProductionDatabase {
    /// Finds a task by name on the given entity.
    fn task_id_from_name(&self, name: &str, entity: EntityRef) -> Result<Option<TaskId>>;

    fn asset_name_from_id(&self, asset_id: AssetId) -> Result<Option<String>>;

    fn shot_name_from_id(&self, shot_id: ShotId) -> Result<Option<String>>;

    fn asset_id_from_task_id(&self, task_id: TaskId) -> Result<Option<AssetId>>;

    fn shot_id_from_task_id(&self, task_id: TaskId) -> Result<Option<ShotId>>;

    /// The short step name (e.g. `MDL`) of a task.
    fn step_from_task(&self, task_id: TaskId) -> Result<Option<String>>;

    fn variant_name_from_task(&self, task_id: TaskId) -> Result<Option<String>>;

    /// Lists the tasks of an entity that belong to the given step.
    fn entity_tasks(&self, entity: EntityRef, step: &str) -> Result<Vec<TaskSummary>>;

    /// Lists published versions of a task with the given file type.
    ///
    /// `force` asks the implementation to bypass any cache it keeps.
    fn get_versions(
        &self,
        task_id: TaskId,
        published_file_type: &str,
        force: bool,
    ) -> Result<Vec<PublishedVersion>>;
}

/// Everything that identifies one publish invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionContext {
    pub entity: EntityRef,
    pub variant_name: String,
    /// The step the merged result is published into (e.g. `ASS`, `SHT`).
    pub merge_step: String,
    pub template: String,
    pub project: String,
}

impl ProductionContext {
    pub fn new(
        entity: EntityRef,
        variant_name: impl Into<String>,
        merge_step: impl Into<String>,
        template: impl Into<String>,
        project: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            variant_name: variant_name.into(),
            merge_step: merge_step.into(),
            template: template.into(),
            project: project.into(),
        }
    }
}

/// Maps (entity, step, variant) to task ids and entities to names.
#[derive(Clone, Copy)]
pub struct ContextResolver<'a> {
    db: &'a dyn ProductionDatabase,
}

impl<'a> ContextResolver<'a> {
    pub fn new(db: &'a dyn ProductionDatabase) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &'a dyn ProductionDatabase {
        self.db
    }

    /// The task naming convention shared by every step and variant.
    pub fn task_name(variant: &str, step: &str) -> String {
        format!("{}_{}", variant, step)
    }

    /// Looks up the task for a step and variant of an entity.
    pub fn task_id(&self, entity: EntityRef, step: &str, variant: &str) -> Result<Option<TaskId>> {
        self.db
            .task_id_from_name(&Self::task_name(variant, step), entity)
    }

    /// The asset or shot name of an entity.
    pub fn entity_name(&self, entity: EntityRef) -> Result<Option<String>> {
        match entity {
            EntityRef::Asset(id) => self.db.asset_name_from_id(id),
            EntityRef::Shot(id) => self.db.shot_name_from_id(id),
        }
    }

    /// Like [`entity_name`](Self::entity_name) but falls back to the id for
    /// messages.
    pub fn entity_label(&self, entity: EntityRef) -> Result<String> {
        Ok(self
            .entity_name(entity)?
            .unwrap_or_else(|| entity.to_string()))
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockDatabase;
    use super::*;

    fn database() -> MockDatabase {
        MockDatabase::new()
            .with_asset(5633, "propTestoid")
            .with_shot(4462, "99_TST_80")
            .with_task(1, EntityRef::Asset(AssetId(5633)), "AvA", "MDL")
            .with_task(2, EntityRef::Shot(ShotId(4462)), "main", "LAY")
    }

    #[test]
    fn test_task_name_convention() {
        assert_eq!(ContextResolver::task_name("AvA", "MDL"), "AvA_MDL");
    }

    #[test]
    fn test_task_id_found_for_matching_entity() {
        let db = database();
        let resolver = ContextResolver::new(&db);
        let task = resolver
            .task_id(EntityRef::Asset(AssetId(5633)), "MDL", "AvA")
            .unwrap();
        assert_eq!(task, Some(TaskId(1)));
    }

    #[test]
    fn test_task_id_absent_is_not_an_error() {
        let db = database();
        let resolver = ContextResolver::new(&db);
        assert_eq!(
            resolver
                .task_id(EntityRef::Asset(AssetId(5633)), "LDV", "AvA")
                .unwrap(),
            None
        );
        // Same task name on a different entity does not match
        assert_eq!(
            resolver
                .task_id(EntityRef::Shot(ShotId(4462)), "MDL", "AvA")
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_entity_name_for_asset_and_shot() {
        let db = database();
        let resolver = ContextResolver::new(&db);
        assert_eq!(
            resolver.entity_name(EntityRef::Asset(AssetId(5633))).unwrap(),
            Some("propTestoid".to_string())
        );
        assert_eq!(
            resolver.entity_name(EntityRef::Shot(ShotId(4462))).unwrap(),
            Some("99_TST_80".to_string())
        );
    }

    #[test]
    fn test_entity_label_falls_back_to_id() {
        let db = database();
        let resolver = ContextResolver::new(&db);
        assert_eq!(
            resolver.entity_label(EntityRef::Asset(AssetId(1))).unwrap(),
            "asset 1"
        );
    }
}
