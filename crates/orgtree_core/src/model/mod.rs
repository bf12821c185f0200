//! Department entity domain model.
//!
//! # Responsibility
//! - Define the entity, relationship and ancestry shapes shared by the
//!   repository, hierarchy and service layers.
//! - Keep update semantics as a pure merge over immutable snapshots.
//!
//! # Invariants
//! - Every entity is identified by a stable non-nil `EntityId`.
//! - Relationships are never removed, only flipped to inactive.
//! - Parent links should form a forest; readers must not trust this.

pub mod ancestry;
pub mod entity;
pub mod relationship;
