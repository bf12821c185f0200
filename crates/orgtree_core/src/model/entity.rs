//! Department entity model and field-level merge.
//!
//! # Responsibility
//! - Define the canonical department entity record.
//! - Provide validation and the partial-update merge used by updates.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - `tenant_id`, `department_id`, `code` and `name` are never blank.
//! - Merging never mutates the stored snapshot; it returns a new value.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every department entity.
pub type EntityId = Uuid;

/// Validation failures for entity records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    /// Entity id is the nil UUID.
    NilId,
    /// Required text field is empty after trim.
    BlankField(&'static str),
    /// Hierarchy level must be zero or positive.
    NegativeHierarchyLevel(i32),
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "entity id must not be nil"),
            Self::BlankField(field) => write!(f, "entity field `{field}` must not be blank"),
            Self::NegativeHierarchyLevel(level) => {
                write!(f, "hierarchy level must not be negative, got {level}")
            }
        }
    }
}

impl Error for EntityValidationError {}

/// Department entity as stored and served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentEntity {
    /// Stable entity id.
    pub id: EntityId,
    /// Owning tenant.
    pub tenant_id: String,
    /// Department this entity belongs to.
    pub department_id: String,
    /// Short business code.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Position in the tree. Informational only, never used for traversal.
    pub hierarchy_level: i32,
    /// User uuid that created the entity, when known.
    pub created_by: Option<String>,
    /// Epoch ms creation timestamp.
    pub created_time: i64,
    /// User uuid of the last modification, when known.
    pub last_modified_by: Option<String>,
    /// Epoch ms timestamp of the last modification.
    pub last_modified_time: i64,
}

impl DepartmentEntity {
    /// Creates an entity with a generated id and empty audit fields.
    pub fn new(
        tenant_id: impl Into<String>,
        department_id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.into(),
            department_id: department_id.into(),
            code: code.into(),
            name: name.into(),
            hierarchy_level: 0,
            created_by: None,
            created_time: 0,
            last_modified_by: None,
            last_modified_time: 0,
        }
    }

    /// Same as [`DepartmentEntity::new`] but keeps a caller-provided id.
    ///
    /// # Errors
    /// - Returns `NilId` when `id` is the nil UUID.
    pub fn with_id(
        id: EntityId,
        tenant_id: impl Into<String>,
        department_id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, EntityValidationError> {
        if id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        let mut entity = Self::new(tenant_id, department_id, code, name);
        entity.id = id;
        Ok(entity)
    }

    /// Checks record-level invariants.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.id.is_nil() {
            return Err(EntityValidationError::NilId);
        }
        for (field, value) in [
            ("tenant_id", &self.tenant_id),
            ("department_id", &self.department_id),
            ("code", &self.code),
            ("name", &self.name),
        ] {
            if value.trim().is_empty() {
                return Err(EntityValidationError::BlankField(field));
            }
        }
        if self.hierarchy_level < 0 {
            return Err(EntityValidationError::NegativeHierarchyLevel(
                self.hierarchy_level,
            ));
        }
        Ok(())
    }
}

/// Field-level update request. `None` and blank strings mean "keep".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPatch {
    #[serde(default)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub department_id: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub hierarchy_level: Option<i32>,
}

/// Result of merging a patch into a stored entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMerge {
    /// Entity with every supplied field applied.
    pub entity: DepartmentEntity,
    /// True when at least one field was supplied.
    pub modified: bool,
}

/// Applies `patch` on top of `existing` and returns the merged snapshot.
///
/// A supplied field counts as a modification even when it equals the stored
/// value. Audit fields are left alone; stamping them is the caller's job.
pub fn merge_entity(existing: &DepartmentEntity, patch: &EntityPatch) -> EntityMerge {
    let mut entity = existing.clone();
    let mut modified = false;

    for (target, incoming) in [
        (&mut entity.tenant_id, &patch.tenant_id),
        (&mut entity.department_id, &patch.department_id),
        (&mut entity.code, &patch.code),
        (&mut entity.name, &patch.name),
    ] {
        if let Some(value) = present_text(incoming) {
            *target = value.to_string();
            modified = true;
        }
    }

    if let Some(level) = patch.hierarchy_level {
        entity.hierarchy_level = level;
        modified = true;
    }

    EntityMerge { entity, modified }
}

fn present_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|text| !text.trim().is_empty())
}
