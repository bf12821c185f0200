//! Ancestry read model.
//!
//! An `AncestryNode` is an ephemeral tree returned by ancestry construction.
//! It is never persisted.

use crate::model::entity::{DepartmentEntity, EntityId};
use serde::{Deserialize, Serialize};

/// One entity plus the children discovered while walking up from a leaf.
///
/// Serialized with the entity fields inlined next to `children`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryNode {
    #[serde(flatten)]
    pub entity: DepartmentEntity,
    #[serde(default)]
    pub children: Vec<AncestryNode>,
}

impl AncestryNode {
    /// Wraps an entity with no children attached.
    pub fn leaf(entity: DepartmentEntity) -> Self {
        Self {
            entity,
            children: Vec::new(),
        }
    }

    /// Ids from this node down the first-child path, root first.
    pub fn path_ids(&self) -> Vec<EntityId> {
        let mut ids = Vec::new();
        let mut cursor = Some(self);
        while let Some(node) = cursor {
            ids.push(node.entity.id);
            cursor = node.children.first();
        }
        ids
    }

    /// Number of nodes on the first-child path, this node included.
    pub fn path_len(&self) -> usize {
        self.path_ids().len()
    }
}
