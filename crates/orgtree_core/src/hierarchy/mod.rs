//! Hierarchy traversal and relationship reconciliation.
//!
//! # Responsibility
//! - Rebuild one root-to-leaf ancestor path for an entity.
//! - Compute the relationship changes implied by a declared child list.
//!
//! # Invariants
//! - Components only read through `HierarchyLookup`; they never write.
//! - No shared mutable state; concurrent calls for unrelated entities are safe.

pub mod ancestry;
pub mod reconcile;
