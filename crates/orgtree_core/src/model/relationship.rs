//! Parent/child relationship records.
//!
//! # Invariants
//! - A relationship is only ever moved from active to inactive.
//! - At most one active row per pair is expected, but readers must tolerate
//!   duplicates.

use crate::model::entity::EntityId;
use serde::{Deserialize, Serialize};

/// Stored parent/child link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub parent_id: EntityId,
    pub child_id: EntityId,
    /// Soft-delete flag. Inactive rows are kept for audit.
    pub active: bool,
}

/// Desired state for one parent/child pair, as published downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationshipChange {
    pub parent_id: EntityId,
    pub child_id: EntityId,
    pub active: bool,
}

impl RelationshipChange {
    /// Declares `child_id` as an active child of `parent_id`.
    pub fn activate(parent_id: EntityId, child_id: EntityId) -> Self {
        Self {
            parent_id,
            child_id,
            active: true,
        }
    }

    /// Retires the `parent_id` -> `child_id` link.
    pub fn deactivate(parent_id: EntityId, child_id: EntityId) -> Self {
        Self {
            parent_id,
            child_id,
            active: false,
        }
    }
}
