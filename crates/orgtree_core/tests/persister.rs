use orgtree_core::{
    channel_queue, BatchKind, BatchPersister, ChangeQueue, DepartmentEntity, EntityId,
    EntityRepository, EntitySearchCriteria, HierarchyLookup, PersistBatch, PersistError,
    PersistReport, Relationship, RelationshipChange, RepoError, RepoResult,
};
use std::cell::RefCell;
use uuid::Uuid;

/// Records every write and rejects relationship changes for one child.
struct FlakyRepository {
    rejected_child: EntityId,
    entity_writes: RefCell<Vec<EntityId>>,
    relationship_writes: RefCell<Vec<RelationshipChange>>,
}

impl FlakyRepository {
    fn rejecting(rejected_child: EntityId) -> Self {
        Self {
            rejected_child,
            entity_writes: RefCell::new(Vec::new()),
            relationship_writes: RefCell::new(Vec::new()),
        }
    }
}

impl HierarchyLookup for FlakyRepository {
    fn get_parent(&self, _: EntityId) -> RepoResult<Option<DepartmentEntity>> {
        Ok(None)
    }

    fn find_relationships_by_parent(&self, _: EntityId) -> RepoResult<Vec<Relationship>> {
        Ok(Vec::new())
    }
}

impl EntityRepository for FlakyRepository {
    fn get_entity(&self, _: EntityId) -> RepoResult<Option<DepartmentEntity>> {
        Ok(None)
    }

    fn search_entities(&self, _: &EntitySearchCriteria) -> RepoResult<Vec<DepartmentEntity>> {
        Ok(Vec::new())
    }

    fn upsert_entity(&self, entity: &DepartmentEntity) -> RepoResult<()> {
        self.entity_writes.borrow_mut().push(entity.id);
        Ok(())
    }

    fn apply_relationship_change(&self, change: &RelationshipChange) -> RepoResult<()> {
        self.relationship_writes.borrow_mut().push(*change);
        if change.child_id == self.rejected_child {
            return Err(RepoError::Unavailable("relationship store busy".to_string()));
        }
        Ok(())
    }
}

fn batch(kind: BatchKind, entity: &DepartmentEntity, children: &[EntityId]) -> PersistBatch {
    PersistBatch {
        kind,
        requested_by: None,
        entities: vec![entity.clone()],
        relationships: children
            .iter()
            .map(|child| RelationshipChange::activate(entity.id, *child))
            .collect(),
    }
}

#[test]
fn failed_batch_is_counted_and_later_batches_still_apply() {
    let good_child = Uuid::new_v4();
    let bad_child = Uuid::new_v4();
    let after_bad = Uuid::new_v4();
    let first = DepartmentEntity::new("t1", "d1", "A", "Alpha");
    let second = DepartmentEntity::new("t1", "d1", "B", "Beta");
    let third = DepartmentEntity::new("t1", "d1", "C", "Gamma");

    let (queue, receiver) = channel_queue();
    queue.enqueue(batch(BatchKind::Create, &first, &[good_child]));
    queue.enqueue(batch(BatchKind::Update, &second, &[good_child, bad_child, after_bad]));
    queue.enqueue(batch(BatchKind::Create, &third, &[]));

    let repo = FlakyRepository::rejecting(bad_child);
    let report = BatchPersister::new(&repo).drain(&receiver);
    assert_eq!(
        report,
        PersistReport {
            applied: 2,
            failed: 1
        }
    );

    // The failing batch keeps its earlier writes and stops at the failure.
    assert_eq!(
        *repo.entity_writes.borrow(),
        vec![first.id, second.id, third.id]
    );
    assert_eq!(
        *repo.relationship_writes.borrow(),
        vec![
            RelationshipChange::activate(first.id, good_child),
            RelationshipChange::activate(second.id, good_child),
            RelationshipChange::activate(second.id, bad_child),
        ]
    );

    // Nothing is retried on the next pass.
    assert_eq!(
        BatchPersister::new(&repo).drain(&receiver),
        PersistReport::default()
    );
    assert_eq!(repo.relationship_writes.borrow().len(), 3);
}

#[test]
fn apply_reports_the_failing_change() {
    let bad_child = Uuid::new_v4();
    let entity = DepartmentEntity::new("t1", "d1", "A", "Alpha");
    let repo = FlakyRepository::rejecting(bad_child);

    let err = BatchPersister::new(&repo)
        .apply(&batch(BatchKind::Update, &entity, &[bad_child]))
        .unwrap_err();
    match err {
        PersistError::Relationship { change, source } => {
            assert_eq!(change, RelationshipChange::activate(entity.id, bad_child));
            assert!(matches!(source, RepoError::Unavailable(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}
