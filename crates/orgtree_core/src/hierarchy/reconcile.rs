//! Relationship-set reconciliation for entity updates.
//!
//! # Responsibility
//! - Find stored relationships that a new child declaration no longer lists.
//! - Build the forward active list for a declaration.
//!
//! # Invariants
//! - An empty or absent declaration produces no changes and no store read.
//! - Emitted deactivations cover exactly `existing \ requested` child ids,
//!   in store order, one per stored row.
//! - Requested ids are never deduplicated.
//! - A declaration that matches the stored active children alters nothing.

use crate::model::entity::EntityId;
use crate::model::relationship::RelationshipChange;
use crate::repo::entity_repo::{HierarchyLookup, RepoResult};
use log::debug;
use std::collections::HashSet;

/// Computes relationship deltas through an explicit lookup capability.
pub struct RelationshipReconciler<'a, L: HierarchyLookup + ?Sized> {
    lookup: &'a L,
}

impl<'a, L: HierarchyLookup + ?Sized> RelationshipReconciler<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self { lookup }
    }

    /// Returns deactivations for stored children missing from `requested`.
    ///
    /// Store errors are returned unchanged.
    pub fn compute_deactivations(
        &self,
        parent_id: EntityId,
        requested: Option<&[EntityId]>,
    ) -> RepoResult<Vec<RelationshipChange>> {
        Ok(self.plan_changes(parent_id, requested)?.deactivations)
    }

    /// Active list followed by deactivations, the full change set for one
    /// update. Empty when nothing is declared.
    pub fn resolve_changes(
        &self,
        parent_id: EntityId,
        requested: Option<&[EntityId]>,
    ) -> RepoResult<Vec<RelationshipChange>> {
        Ok(self.plan_changes(parent_id, requested)?.into_changes())
    }

    /// Reads the stored children once and splits a declaration into its
    /// active list, its deactivations and the requested ids not yet linked.
    pub fn plan_changes(
        &self,
        parent_id: EntityId,
        requested: Option<&[EntityId]>,
    ) -> RepoResult<RelationshipPlan> {
        let requested_ids = requested.unwrap_or_default();
        if requested_ids.is_empty() {
            // Zero declared children means "leave relationships alone", not
            // "deactivate everything".
            debug!(
                "event=reconcile module=hierarchy status=skipped parent_id={parent_id} reason=empty_request"
            );
            return Ok(RelationshipPlan::default());
        }

        let declared: HashSet<EntityId> = requested_ids.iter().copied().collect();
        let existing = self.lookup.find_relationships_by_parent(parent_id)?;
        let linked: HashSet<EntityId> = existing
            .iter()
            .filter(|relationship| relationship.active)
            .map(|relationship| relationship.child_id)
            .collect();
        let existing_count = existing.len();

        let deactivations: Vec<RelationshipChange> = existing
            .into_iter()
            .filter(|relationship| !declared.contains(&relationship.child_id))
            .map(|relationship| RelationshipChange::deactivate(parent_id, relationship.child_id))
            .collect();
        let new_links = declared.difference(&linked).count();

        debug!(
            "event=reconcile module=hierarchy status=ok parent_id={parent_id} requested={} existing={existing_count} deactivated={} new_links={new_links}",
            requested_ids.len(),
            deactivations.len()
        );
        Ok(RelationshipPlan {
            active: build_active_changes(parent_id, requested),
            deactivations,
            new_links,
        })
    }
}

/// Relationship changes derived from one child declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipPlan {
    /// One activation per requested id, in request order.
    pub active: Vec<RelationshipChange>,
    pub deactivations: Vec<RelationshipChange>,
    /// Distinct requested ids with no active stored row.
    pub new_links: usize,
}

impl RelationshipPlan {
    /// True when applying the plan would change stored relationships.
    pub fn alters_store(&self) -> bool {
        self.new_links > 0 || !self.deactivations.is_empty()
    }

    pub fn into_changes(self) -> Vec<RelationshipChange> {
        let mut changes = self.active;
        changes.extend(self.deactivations);
        changes
    }
}

/// Forward `{parent, child, active: true}` records, one per requested id in
/// request order. Duplicates pass through.
pub fn build_active_changes(
    parent_id: EntityId,
    requested: Option<&[EntityId]>,
) -> Vec<RelationshipChange> {
    requested
        .unwrap_or_default()
        .iter()
        .map(|child_id| RelationshipChange::activate(parent_id, *child_id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::build_active_changes;
    use uuid::Uuid;

    #[test]
    fn active_list_keeps_order_and_duplicates() {
        let parent = Uuid::new_v4();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let changes = build_active_changes(parent, Some(&[b, a, b][..]));
        let children: Vec<_> = changes.iter().map(|change| change.child_id).collect();
        assert_eq!(children, vec![b, a, b]);
        assert!(changes.iter().all(|change| change.active && change.parent_id == parent));
    }

    #[test]
    fn active_list_is_empty_without_declaration() {
        assert!(build_active_changes(Uuid::new_v4(), None).is_empty());
    }
}
