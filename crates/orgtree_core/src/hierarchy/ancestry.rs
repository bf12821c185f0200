//! Bounded upward walk from a leaf entity to its top-most ancestor.
//!
//! # Invariants
//! - At most `max_depth + 1` parent lookups are issued per call.
//! - A parent still present after the bound is exhausted is a data
//!   integrity failure; no partial tree is returned.
//! - Cycles are caught by the bound only, not by tracking visited ids.

use crate::model::ancestry::AncestryNode;
use crate::model::entity::{DepartmentEntity, EntityId};
use crate::repo::entity_repo::{HierarchyLookup, RepoError};
use log::{debug, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from ancestry construction.
#[derive(Debug)]
pub enum AncestryError {
    /// Parent links continued past the configured depth.
    HierarchyDepthExceeded { entity_id: EntityId, max_depth: u32 },
    /// Lookup failure, passed through unchanged.
    Store(RepoError),
}

impl AncestryError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HierarchyDepthExceeded { .. } => "MAXIMUM_SUPPORTED_HIERARCHY_EXCEEDED",
            Self::Store(_) => "ENTITY_STORE_ERROR",
        }
    }
}

impl Display for AncestryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HierarchyDepthExceeded {
                entity_id,
                max_depth,
            } => write!(
                f,
                "ancestor walk from {entity_id} exceeded the maximum supported hierarchy of {max_depth}; the data might be corrupted"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AncestryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::HierarchyDepthExceeded { .. } => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<RepoError> for AncestryError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Rebuilds ancestor chains through an explicit lookup capability.
pub struct AncestryBuilder<'a, L: HierarchyLookup + ?Sized> {
    lookup: &'a L,
    max_depth: u32,
}

impl<'a, L: HierarchyLookup + ?Sized> AncestryBuilder<'a, L> {
    /// `max_depth` is the number of parent hops allowed past the leaf.
    pub fn new(lookup: &'a L, max_depth: u32) -> Self {
        Self { lookup, max_depth }
    }

    /// Returns the outermost ancestor with a single child chain down to `leaf`.
    ///
    /// # Errors
    /// - `HierarchyDepthExceeded` when a parent still exists after
    ///   `max_depth` hops.
    /// - `Store` when a parent lookup fails.
    pub fn build_ancestry(&self, leaf: DepartmentEntity) -> Result<AncestryNode, AncestryError> {
        let leaf_id = leaf.id;
        let mut current = AncestryNode::leaf(leaf);
        let mut remaining = i64::from(self.max_depth);

        while remaining >= 0 {
            let Some(parent) = self.lookup.get_parent(current.entity.id)? else {
                debug!(
                    "event=ancestry_build module=hierarchy status=ok entity_id={leaf_id} root_id={} hops={}",
                    current.entity.id,
                    i64::from(self.max_depth) - remaining
                );
                return Ok(current);
            };

            let mut parent_node = AncestryNode::leaf(parent);
            parent_node.children.push(current);
            current = parent_node;
            remaining -= 1;
        }

        warn!(
            "event=ancestry_build module=hierarchy status=error entity_id={leaf_id} max_depth={} error_code=hierarchy_depth_exceeded",
            self.max_depth
        );
        Err(AncestryError::HierarchyDepthExceeded {
            entity_id: leaf_id,
            max_depth: self.max_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{AncestryBuilder, AncestryError};
    use crate::model::entity::{DepartmentEntity, EntityId};
    use crate::model::relationship::Relationship;
    use crate::repo::entity_repo::{HierarchyLookup, RepoError, RepoResult};
    use std::cell::Cell;
    use std::collections::HashMap;

    struct CountingLookup {
        parents: HashMap<EntityId, DepartmentEntity>,
        calls: Cell<usize>,
    }

    impl HierarchyLookup for CountingLookup {
        fn get_parent(&self, child_id: EntityId) -> RepoResult<Option<DepartmentEntity>> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.parents.get(&child_id).cloned())
        }

        fn find_relationships_by_parent(&self, _: EntityId) -> RepoResult<Vec<Relationship>> {
            Err(RepoError::Unavailable("not used".to_string()))
        }
    }

    #[test]
    fn self_loop_stops_after_bound_plus_one_lookups() {
        let entity = DepartmentEntity::new("t1", "d1", "S", "Self");
        let lookup = CountingLookup {
            parents: HashMap::from([(entity.id, entity.clone())]),
            calls: Cell::new(0),
        };

        let err = AncestryBuilder::new(&lookup, 3)
            .build_ancestry(entity)
            .unwrap_err();
        assert!(matches!(
            err,
            AncestryError::HierarchyDepthExceeded { max_depth: 3, .. }
        ));
        assert_eq!(err.code(), "MAXIMUM_SUPPORTED_HIERARCHY_EXCEEDED");
        assert_eq!(lookup.calls.get(), 4);
    }

    #[test]
    fn zero_depth_allows_only_parentless_leaf() {
        let root = DepartmentEntity::new("t1", "d1", "R", "Root");
        let leaf = DepartmentEntity::new("t1", "d1", "L", "Leaf");
        let lookup = CountingLookup {
            parents: HashMap::from([(leaf.id, root.clone())]),
            calls: Cell::new(0),
        };
        let builder = AncestryBuilder::new(&lookup, 0);

        let node = builder.build_ancestry(root.clone()).unwrap();
        assert_eq!(node.path_ids(), vec![root.id]);

        let err = builder.build_ancestry(leaf).unwrap_err();
        assert!(matches!(err, AncestryError::HierarchyDepthExceeded { .. }));
    }
}
