use orgtree_core::{
    DepartmentEntity, EntityId, HierarchyLookup, Relationship, RelationshipChange,
    RelationshipPlan, RelationshipReconciler, RepoError, RepoResult,
};
use std::cell::Cell;
use std::collections::HashSet;
use uuid::Uuid;

struct StoredChildren {
    relationships: Vec<Relationship>,
    reads: Cell<usize>,
}

impl StoredChildren {
    fn new(parent_id: EntityId, children: &[EntityId]) -> Self {
        Self {
            relationships: children
                .iter()
                .map(|child_id| Relationship {
                    parent_id,
                    child_id: *child_id,
                    active: true,
                })
                .collect(),
            reads: Cell::new(0),
        }
    }
}

impl HierarchyLookup for StoredChildren {
    fn get_parent(&self, _: EntityId) -> RepoResult<Option<DepartmentEntity>> {
        Ok(None)
    }

    fn find_relationships_by_parent(&self, parent_id: EntityId) -> RepoResult<Vec<Relationship>> {
        self.reads.set(self.reads.get() + 1);
        Ok(self
            .relationships
            .iter()
            .filter(|relationship| relationship.parent_id == parent_id)
            .copied()
            .collect())
    }
}

struct FailingStore;

impl HierarchyLookup for FailingStore {
    fn get_parent(&self, _: EntityId) -> RepoResult<Option<DepartmentEntity>> {
        Ok(None)
    }

    fn find_relationships_by_parent(&self, _: EntityId) -> RepoResult<Vec<Relationship>> {
        Err(RepoError::Unavailable("relationships offline".to_string()))
    }
}

fn ids(count: usize) -> Vec<EntityId> {
    (0..count).map(|_| Uuid::new_v4()).collect()
}

#[test]
fn omitted_children_are_deactivated() {
    let parent = Uuid::new_v4();
    let [x, y, z, w]: [EntityId; 4] = ids(4).try_into().unwrap();
    let store = StoredChildren::new(parent, &[x, y, z]);

    let changes = RelationshipReconciler::new(&store)
        .compute_deactivations(parent, Some(&[x, w][..]))
        .unwrap();

    let expected: HashSet<RelationshipChange> = [
        RelationshipChange::deactivate(parent, y),
        RelationshipChange::deactivate(parent, z),
    ]
    .into_iter()
    .collect();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes.into_iter().collect::<HashSet<_>>(), expected);
}

#[test]
fn deactivations_follow_store_order() {
    let parent = Uuid::new_v4();
    let children = ids(4);
    let store = StoredChildren::new(parent, &children);

    let changes = RelationshipReconciler::new(&store)
        .compute_deactivations(parent, Some(&[children[2]][..]))
        .unwrap();

    let order: Vec<_> = changes.iter().map(|change| change.child_id).collect();
    assert_eq!(order, vec![children[0], children[1], children[3]]);
}

#[test]
fn matching_declaration_is_a_no_op() {
    let parent = Uuid::new_v4();
    let [x, y]: [EntityId; 2] = ids(2).try_into().unwrap();
    let store = StoredChildren::new(parent, &[x, y]);

    let changes = RelationshipReconciler::new(&store)
        .compute_deactivations(parent, Some(&[y, x][..]))
        .unwrap();
    assert!(changes.is_empty());
}

#[test]
fn superset_declaration_is_a_no_op() {
    let parent = Uuid::new_v4();
    let [x, y, extra]: [EntityId; 3] = ids(3).try_into().unwrap();
    let store = StoredChildren::new(parent, &[x, y]);

    let changes = RelationshipReconciler::new(&store)
        .compute_deactivations(parent, Some(&[x, y, extra][..]))
        .unwrap();
    assert!(changes.is_empty());
}

#[test]
fn empty_or_absent_declaration_changes_nothing() {
    let parent = Uuid::new_v4();
    let store = StoredChildren::new(parent, &ids(2));
    let reconciler = RelationshipReconciler::new(&store);

    assert!(reconciler.compute_deactivations(parent, None).unwrap().is_empty());
    assert!(reconciler
        .compute_deactivations(parent, Some(&[][..]))
        .unwrap()
        .is_empty());
    assert!(reconciler.resolve_changes(parent, None).unwrap().is_empty());
    assert_eq!(store.reads.get(), 0);
}

#[test]
fn duplicate_stored_rows_yield_one_change_each() {
    let parent = Uuid::new_v4();
    let [keep, stale]: [EntityId; 2] = ids(2).try_into().unwrap();
    let store = StoredChildren::new(parent, &[stale, keep, stale]);

    let changes = RelationshipReconciler::new(&store)
        .compute_deactivations(parent, Some(&[keep][..]))
        .unwrap();
    assert_eq!(
        changes,
        vec![
            RelationshipChange::deactivate(parent, stale),
            RelationshipChange::deactivate(parent, stale),
        ]
    );
}

#[test]
fn resolve_changes_lists_active_declarations_before_deactivations() {
    let parent = Uuid::new_v4();
    let [x, y, w]: [EntityId; 3] = ids(3).try_into().unwrap();
    let store = StoredChildren::new(parent, &[x, y]);

    let changes = RelationshipReconciler::new(&store)
        .resolve_changes(parent, Some(&[w, x, w][..]))
        .unwrap();
    assert_eq!(
        changes,
        vec![
            RelationshipChange::activate(parent, w),
            RelationshipChange::activate(parent, x),
            RelationshipChange::activate(parent, w),
            RelationshipChange::deactivate(parent, y),
        ]
    );
}

#[test]
fn plan_counts_only_unlinked_requested_children() {
    let parent = Uuid::new_v4();
    let [x, y, w]: [EntityId; 3] = ids(3).try_into().unwrap();
    let store = StoredChildren::new(parent, &[x, y]);
    let reconciler = RelationshipReconciler::new(&store);

    let same = reconciler
        .plan_changes(parent, Some(&[y, x, y][..]))
        .unwrap();
    assert_eq!(same.active.len(), 3);
    assert!(same.deactivations.is_empty());
    assert_eq!(same.new_links, 0);
    assert!(!same.alters_store());

    let grown = reconciler
        .plan_changes(parent, Some(&[x, y, w, w][..]))
        .unwrap();
    assert_eq!(grown.new_links, 1);
    assert!(grown.alters_store());

    let shrunk = reconciler.plan_changes(parent, Some(&[x][..])).unwrap();
    assert_eq!(shrunk.new_links, 0);
    assert_eq!(shrunk.deactivations, vec![RelationshipChange::deactivate(parent, y)]);
    assert!(shrunk.alters_store());
    assert_eq!(store.reads.get(), 3);
}

#[test]
fn empty_plan_alters_nothing() {
    let store = StoredChildren::new(Uuid::new_v4(), &ids(1));
    let plan = RelationshipReconciler::new(&store)
        .plan_changes(Uuid::new_v4(), None)
        .unwrap();
    assert_eq!(plan, RelationshipPlan::default());
    assert!(!plan.alters_store());
    assert!(plan.into_changes().is_empty());
}

#[test]
fn store_failure_propagates() {
    let err = RelationshipReconciler::new(&FailingStore)
        .compute_deactivations(Uuid::new_v4(), Some(&[Uuid::new_v4()][..]))
        .unwrap_err();
    assert!(matches!(err, RepoError::Unavailable(_)));
}
