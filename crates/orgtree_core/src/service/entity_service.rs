//! Department entity use-case service.
//!
//! # Responsibility
//! - Orchestrate validation, merge, ancestry and reconciliation for callers.
//! - Hand computed changes to the outbound queue instead of writing directly.
//!
//! # Invariants
//! - Reads go through the repository; writes only happen downstream of
//!   `ChangeQueue::enqueue`.
//! - An update that changes no field and declares no children publishes
//!   nothing.
//! - Ancestry failures are fatal for the request; no partial results.

use crate::hierarchy::ancestry::{AncestryBuilder, AncestryError};
use crate::hierarchy::reconcile::{build_active_changes, RelationshipReconciler};
use crate::model::ancestry::AncestryNode;
use crate::model::entity::{
    merge_entity, DepartmentEntity, EntityId, EntityPatch, EntityValidationError,
};
use crate::publish::queue::{BatchKind, ChangeQueue, PersistBatch};
use crate::repo::entity_repo::{EntityRepository, EntitySearchCriteria, RepoError};
use log::{info, warn};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from entity service operations.
#[derive(Debug)]
pub enum EntityServiceError {
    /// Entity fields violate record invariants.
    Validation(EntityValidationError),
    /// Request shape is unusable (blank tenant, bad child list).
    InvalidRequest(String),
    /// No entity exists for the given id.
    EntityNotFound(EntityId),
    /// Ancestry construction failed.
    Ancestry(AncestryError),
    /// Repository-level failure.
    Repo(RepoError),
}

impl EntityServiceError {
    /// Stable machine-readable code for API and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_DEPARTMENT_ENTITY",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::EntityNotFound(_) => "INVALID_DEPARTMENT_ENTITY_ID",
            Self::Ancestry(err) => err.code(),
            Self::Repo(_) => "ENTITY_STORE_ERROR",
        }
    }
}

impl Display for EntityServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::InvalidRequest(message) => write!(f, "invalid request: {message}"),
            Self::EntityNotFound(id) => {
                write!(f, "unable to find department entity by given id: {id}")
            }
            Self::Ancestry(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EntityServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Ancestry(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::InvalidRequest(_) | Self::EntityNotFound(_) => None,
        }
    }
}

impl From<RepoError> for EntityServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::EntityNotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

impl From<EntityValidationError> for EntityServiceError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<AncestryError> for EntityServiceError {
    fn from(value: AncestryError) -> Self {
        Self::Ancestry(value)
    }
}

/// Input for creating an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateEntityRequest {
    pub tenant_id: String,
    pub department_id: String,
    pub code: String,
    pub name: String,
    pub hierarchy_level: i32,
    /// Children declared at creation; published as active relationships.
    pub children: Vec<EntityId>,
    /// User uuid of the caller, if known.
    pub requested_by: Option<String>,
}

/// Input for a partial update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateEntityRequest {
    pub id: EntityId,
    pub patch: EntityPatch,
    /// Full declared child list. `None` or empty leaves relationships as-is.
    pub children: Option<Vec<EntityId>>,
    pub requested_by: Option<String>,
}

/// Search result shape, depending on `EntitySearchCriteria::get_ancestry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SearchOutcome {
    Entities(Vec<DepartmentEntity>),
    Ancestries(Vec<AncestryNode>),
}

/// Department entity service facade.
pub struct EntityService<R: EntityRepository, Q: ChangeQueue> {
    repo: R,
    queue: Q,
    max_hierarchy_depth: u32,
}

impl<R: EntityRepository, Q: ChangeQueue> EntityService<R, Q> {
    /// Creates service from repository, outbound queue and ancestry bound.
    pub fn new(repo: R, queue: Q, max_hierarchy_depth: u32) -> Self {
        Self {
            repo,
            queue,
            max_hierarchy_depth,
        }
    }

    /// Repository used for reads.
    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Validates and publishes a new entity with its declared children.
    pub fn create_entity(
        &self,
        request: CreateEntityRequest,
    ) -> Result<DepartmentEntity, EntityServiceError> {
        ensure_children_usable(None, &request.children)?;

        let mut entity = DepartmentEntity::new(
            request.tenant_id,
            request.department_id,
            request.code,
            request.name,
        );
        entity.hierarchy_level = request.hierarchy_level;
        entity.validate()?;

        let now = now_epoch_ms();
        entity.created_by = request.requested_by.clone();
        entity.created_time = now;
        entity.last_modified_by = request.requested_by.clone();
        entity.last_modified_time = now;

        let relationships = build_active_changes(entity.id, Some(request.children.as_slice()));
        info!(
            "event=entity_create module=service status=ok entity_id={} children={}",
            entity.id,
            relationships.len()
        );
        self.queue.enqueue(PersistBatch {
            kind: BatchKind::Create,
            requested_by: request.requested_by,
            entities: vec![entity.clone()],
            relationships,
        });
        Ok(entity)
    }

    /// Merges supplied fields, reconciles declared children and publishes
    /// the result. Returns the merged entity.
    pub fn update_entity(
        &self,
        request: UpdateEntityRequest,
    ) -> Result<DepartmentEntity, EntityServiceError> {
        if request.id.is_nil() {
            return Err(EntityValidationError::NilId.into());
        }
        let children = request.children.as_deref();
        ensure_children_usable(Some(request.id), children.unwrap_or_default())?;

        let existing = self
            .repo
            .get_entity(request.id)?
            .ok_or(EntityServiceError::EntityNotFound(request.id))?;

        let merge = merge_entity(&existing, &request.patch);
        merge.entity.validate()?;

        let plan = RelationshipReconciler::new(&self.repo).plan_changes(request.id, children)?;

        if !merge.modified && !plan.alters_store() {
            info!(
                "event=entity_update module=service status=unchanged entity_id={}",
                request.id
            );
            return Ok(existing);
        }

        let mut entity = merge.entity;
        entity.last_modified_by = request.requested_by.clone();
        entity.last_modified_time = now_epoch_ms();

        let relationships = plan.into_changes();
        info!(
            "event=entity_update module=service status=ok entity_id={} fields_modified={} relationship_changes={}",
            entity.id,
            merge.modified,
            relationships.len()
        );
        self.queue.enqueue(PersistBatch {
            kind: BatchKind::Update,
            requested_by: request.requested_by,
            entities: vec![entity.clone()],
            relationships,
        });
        Ok(entity)
    }

    /// Loads one entity and rebuilds its ancestor chain.
    pub fn ancestry_for(&self, id: EntityId) -> Result<AncestryNode, EntityServiceError> {
        let entity = self
            .repo
            .get_entity(id)?
            .ok_or(EntityServiceError::EntityNotFound(id))?;
        self.build_ancestry(entity)
    }

    /// Runs a tenant-scoped search, expanding hits into ancestries on request.
    pub fn search(
        &self,
        criteria: &EntitySearchCriteria,
    ) -> Result<SearchOutcome, EntityServiceError> {
        if criteria.tenant_id.trim().is_empty() {
            return Err(EntityServiceError::InvalidRequest(
                "tenant_id is required for search".to_string(),
            ));
        }

        let entities = self.repo.search_entities(criteria)?;
        if !criteria.get_ancestry {
            return Ok(SearchOutcome::Entities(entities));
        }

        let ancestries = entities
            .into_iter()
            .map(|entity| self.build_ancestry(entity))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SearchOutcome::Ancestries(ancestries))
    }

    fn build_ancestry(&self, entity: DepartmentEntity) -> Result<AncestryNode, EntityServiceError> {
        let entity_id = entity.id;
        AncestryBuilder::new(&self.repo, self.max_hierarchy_depth)
            .build_ancestry(entity)
            .map_err(|err| {
                warn!(
                    "event=entity_ancestry module=service status=error entity_id={entity_id} error_code={}",
                    err.code()
                );
                err.into()
            })
    }
}

fn ensure_children_usable(
    parent_id: Option<EntityId>,
    children: &[EntityId],
) -> Result<(), EntityServiceError> {
    if children.iter().any(|child| child.is_nil()) {
        return Err(EntityServiceError::InvalidRequest(
            "child ids must not be nil".to_string(),
        ));
    }
    if let Some(parent_id) = parent_id {
        if children.contains(&parent_id) {
            return Err(EntityServiceError::InvalidRequest(format!(
                "entity {parent_id} cannot be declared as its own child"
            )));
        }
    }
    Ok(())
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or_default()
}
