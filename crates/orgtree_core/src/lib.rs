//! Core domain logic for the orgtree department registry.
//! This crate owns hierarchy traversal, relationship reconciliation and the
//! update workflow around them.

pub mod config;
pub mod db;
pub mod hierarchy;
pub mod logging;
pub mod model;
pub mod publish;
pub mod repo;
pub mod service;

pub use config::{ConfigError, LoggingConfig, RegistryConfig, DEFAULT_MAX_HIERARCHY_DEPTH};
pub use hierarchy::ancestry::{AncestryBuilder, AncestryError};
pub use hierarchy::reconcile::{build_active_changes, RelationshipPlan, RelationshipReconciler};
pub use logging::{default_log_level, init_from_config, init_logging, logging_status, LoggingError};
pub use model::ancestry::AncestryNode;
pub use model::entity::{
    merge_entity, DepartmentEntity, EntityId, EntityMerge, EntityPatch, EntityValidationError,
};
pub use model::relationship::{Relationship, RelationshipChange};
pub use publish::persister::{BatchPersister, PersistError, PersistReport};
pub use publish::queue::{
    channel_queue, BatchKind, BatchReceiver, ChangeQueue, ChannelQueue, PersistBatch,
    RecordingQueue,
};
pub use repo::entity_repo::{
    EntityRepository, EntitySearchCriteria, HierarchyLookup, RepoError, RepoResult,
    SqliteEntityRepository,
};
pub use service::entity_service::{
    CreateEntityRequest, EntityService, EntityServiceError, SearchOutcome, UpdateEntityRequest,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
