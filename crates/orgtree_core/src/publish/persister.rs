//! Consuming side of the change queue.
//!
//! # Invariants
//! - Entities of a batch are written before its relationship changes.
//! - A failing batch stops at the first failing write; earlier writes of the
//!   same batch stay applied.
//! - Failed batches are not retried.

use crate::model::entity::EntityId;
use crate::model::relationship::RelationshipChange;
use crate::publish::queue::{BatchReceiver, PersistBatch};
use crate::repo::entity_repo::{EntityRepository, RepoError};
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Write failure while applying one batch.
#[derive(Debug)]
pub enum PersistError {
    Entity {
        entity_id: EntityId,
        source: RepoError,
    },
    Relationship {
        change: RelationshipChange,
        source: RepoError,
    },
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entity { entity_id, source } => {
                write!(f, "failed to persist entity {entity_id}: {source}")
            }
            Self::Relationship { change, source } => write!(
                f,
                "failed to persist relationship {} -> {} (active={}): {source}",
                change.parent_id, change.child_id, change.active
            ),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Entity { source, .. } | Self::Relationship { source, .. } => Some(source),
        }
    }
}

/// Outcome counters for one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistReport {
    pub applied: usize,
    pub failed: usize,
}

/// Applies published batches to an entity repository.
pub struct BatchPersister<'a, R: EntityRepository> {
    repo: &'a R,
}

impl<'a, R: EntityRepository> BatchPersister<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// Writes one batch.
    pub fn apply(&self, batch: &PersistBatch) -> Result<(), PersistError> {
        for entity in &batch.entities {
            self.repo
                .upsert_entity(entity)
                .map_err(|source| PersistError::Entity {
                    entity_id: entity.id,
                    source,
                })?;
        }
        for change in &batch.relationships {
            self.repo
                .apply_relationship_change(change)
                .map_err(|source| PersistError::Relationship {
                    change: *change,
                    source,
                })?;
        }
        Ok(())
    }

    /// Applies every queued batch, logging and counting failures.
    pub fn drain(&self, receiver: &BatchReceiver) -> PersistReport {
        let mut report = PersistReport::default();
        for batch in receiver.drain() {
            match self.apply(&batch) {
                Ok(()) => {
                    report.applied += 1;
                    info!(
                        "event=batch_persist module=publish status=ok kind={} entities={} relationships={}",
                        batch.kind.as_str(),
                        batch.entities.len(),
                        batch.relationships.len()
                    );
                }
                Err(err) => {
                    report.failed += 1;
                    error!(
                        "event=batch_persist module=publish status=error kind={} error_code=persist_failed error={err}",
                        batch.kind.as_str()
                    );
                }
            }
        }
        report
    }
}
