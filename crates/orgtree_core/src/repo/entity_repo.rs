//! Department entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide the parent and relationship lookups used by ancestry and
//!   reconciliation.
//! - Provide entity search and the write operations applied by the batch
//!   persister.
//!
//! # Invariants
//! - `get_parent` follows active relationships only.
//! - `find_relationships_by_parent` returns active rows in insertion order,
//!   duplicates included.
//! - Relationship rows are never deleted and inactive rows are never
//!   reactivated.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::entity::{DepartmentEntity, EntityId, EntityValidationError};
use crate::model::relationship::{Relationship, RelationshipChange};
use rusqlite::types::Value;
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, Row, Transaction, TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const ENTITY_SELECT_SQL: &str = "SELECT
    e.id AS id,
    e.tenant_id AS tenant_id,
    e.department_id AS department_id,
    e.code AS code,
    e.name AS name,
    e.hierarchy_level AS hierarchy_level,
    e.created_by AS created_by,
    e.created_time AS created_time,
    e.last_modified_by AS last_modified_by,
    e.last_modified_time AS last_modified_time
FROM department_entities e";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for entity and relationship storage.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Db(DbError),
    NotFound(EntityId),
    /// Backing store is busy, locked or otherwise not reachable.
    Unavailable(String),
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "department entity not found: {id}"),
            Self::Unavailable(message) => write!(f, "entity store unavailable: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted entity data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::NotFound(_) | Self::Unavailable(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                Self::Unavailable(value.to_string())
            }
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Read capability consumed by ancestry construction and reconciliation.
pub trait HierarchyLookup {
    /// Loads the entity holding an active relationship to `child_id`.
    fn get_parent(&self, child_id: EntityId) -> RepoResult<Option<DepartmentEntity>>;
    /// Lists relationships currently stored for `parent_id`.
    fn find_relationships_by_parent(&self, parent_id: EntityId)
        -> RepoResult<Vec<Relationship>>;
}

/// Filters for entity search. Empty filters match everything in the tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitySearchCriteria {
    /// Required tenant scope.
    pub tenant_id: String,
    pub ids: Vec<EntityId>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub department_id: Option<String>,
    pub hierarchy_level: Option<i32>,
    /// Ask the service to expand each hit into its ancestry.
    pub get_ancestry: bool,
}

/// Full repository interface used by the service and the batch persister.
pub trait EntityRepository: HierarchyLookup {
    fn get_entity(&self, id: EntityId) -> RepoResult<Option<DepartmentEntity>>;
    fn search_entities(
        &self,
        criteria: &EntitySearchCriteria,
    ) -> RepoResult<Vec<DepartmentEntity>>;
    /// Inserts the entity or overwrites the stored row with the same id.
    fn upsert_entity(&self, entity: &DepartmentEntity) -> RepoResult<()>;
    /// Activation inserts a row unless an active one exists; deactivation
    /// flips every active row of the pair. Inactive rows are left untouched.
    fn apply_relationship_change(&self, change: &RelationshipChange) -> RepoResult<()>;
}

/// SQLite-backed entity repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl HierarchyLookup for SqliteEntityRepository<'_> {
    fn get_parent(&self, child_id: EntityId) -> RepoResult<Option<DepartmentEntity>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTITY_SELECT_SQL}
             INNER JOIN department_entity_relationships r ON r.parent_id = e.id
             WHERE r.child_id = ?1
               AND r.is_active = 1
             ORDER BY r.rowid ASC
             LIMIT 1;"
        ))?;
        let mut rows = stmt.query([child_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn find_relationships_by_parent(
        &self,
        parent_id: EntityId,
    ) -> RepoResult<Vec<Relationship>> {
        let mut stmt = self.conn.prepare(
            "SELECT parent_id, child_id, is_active
             FROM department_entity_relationships
             WHERE parent_id = ?1
               AND is_active = 1
             ORDER BY rowid ASC;",
        )?;
        let mut rows = stmt.query([parent_id.to_string()])?;
        let mut relationships = Vec::new();
        while let Some(row) = rows.next()? {
            relationships.push(parse_relationship_row(row)?);
        }
        Ok(relationships)
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn get_entity(&self, id: EntityId) -> RepoResult<Option<DepartmentEntity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} WHERE e.id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn search_entities(
        &self,
        criteria: &EntitySearchCriteria,
    ) -> RepoResult<Vec<DepartmentEntity>> {
        let mut sql = format!("{ENTITY_SELECT_SQL} WHERE e.tenant_id = ?");
        let mut bind_values = vec![Value::Text(criteria.tenant_id.clone())];

        if !criteria.ids.is_empty() {
            let placeholders = vec!["?"; criteria.ids.len()].join(", ");
            sql.push_str(&format!(" AND e.id IN ({placeholders})"));
            bind_values.extend(criteria.ids.iter().map(|id| Value::Text(id.to_string())));
        }
        for (column, filter) in [
            ("e.code", &criteria.code),
            ("e.name", &criteria.name),
            ("e.department_id", &criteria.department_id),
        ] {
            if let Some(value) = filter.as_deref().filter(|value| !value.trim().is_empty()) {
                sql.push_str(&format!(" AND {column} = ?"));
                bind_values.push(Value::Text(value.to_string()));
            }
        }
        if let Some(level) = criteria.hierarchy_level {
            sql.push_str(" AND e.hierarchy_level = ?");
            bind_values.push(Value::Integer(i64::from(level)));
        }
        sql.push_str(" ORDER BY e.hierarchy_level ASC, e.code ASC, e.id ASC;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }

    fn upsert_entity(&self, entity: &DepartmentEntity) -> RepoResult<()> {
        entity.validate()?;

        self.conn.execute(
            "INSERT INTO department_entities (
                id,
                tenant_id,
                department_id,
                code,
                name,
                hierarchy_level,
                created_by,
                created_time,
                last_modified_by,
                last_modified_time
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                department_id = excluded.department_id,
                code = excluded.code,
                name = excluded.name,
                hierarchy_level = excluded.hierarchy_level,
                last_modified_by = excluded.last_modified_by,
                last_modified_time = excluded.last_modified_time;",
            params![
                entity.id.to_string(),
                entity.tenant_id.as_str(),
                entity.department_id.as_str(),
                entity.code.as_str(),
                entity.name.as_str(),
                entity.hierarchy_level,
                entity.created_by.as_deref(),
                entity.created_time,
                entity.last_modified_by.as_deref(),
                entity.last_modified_time,
            ],
        )?;
        Ok(())
    }

    fn apply_relationship_change(&self, change: &RelationshipChange) -> RepoResult<()> {
        let parent_id = change.parent_id.to_string();
        let child_id = change.child_id.to_string();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if change.active {
            // Inactive rows are history; a repeated declaration gets a new row.
            let active_rows: i64 = tx.query_row(
                "SELECT COUNT(*)
                 FROM department_entity_relationships
                 WHERE parent_id = ?1
                   AND child_id = ?2
                   AND is_active = 1;",
                params![parent_id, child_id],
                |row| row.get(0),
            )?;
            if active_rows == 0 {
                tx.execute(
                    "INSERT INTO department_entity_relationships (parent_id, child_id, is_active)
                     VALUES (?1, ?2, 1);",
                    params![parent_id, child_id],
                )?;
            }
        } else {
            tx.execute(
                "UPDATE department_entity_relationships
                 SET is_active = 0,
                     last_modified_time = (strftime('%s', 'now') * 1000)
                 WHERE parent_id = ?1
                   AND child_id = ?2
                   AND is_active = 1;",
                params![parent_id, child_id],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<DepartmentEntity> {
    let id_text: String = row.get("id")?;
    let entity = DepartmentEntity {
        id: parse_uuid(&id_text, "department_entities.id")?,
        tenant_id: row.get("tenant_id")?,
        department_id: row.get("department_id")?,
        code: row.get("code")?,
        name: row.get("name")?,
        hierarchy_level: row.get("hierarchy_level")?,
        created_by: row.get("created_by")?,
        created_time: row.get("created_time")?,
        last_modified_by: row.get("last_modified_by")?,
        last_modified_time: row.get("last_modified_time")?,
    };
    entity
        .validate()
        .map_err(|err| RepoError::InvalidData(format!("entity {}: {err}", entity.id)))?;
    Ok(entity)
}

fn parse_relationship_row(row: &Row<'_>) -> RepoResult<Relationship> {
    let parent_text: String = row.get("parent_id")?;
    let child_text: String = row.get("child_id")?;
    let active = match row.get::<_, i64>("is_active")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid is_active value `{other}` in department_entity_relationships.is_active"
            )));
        }
    };
    Ok(Relationship {
        parent_id: parse_uuid(&parent_text, "department_entity_relationships.parent_id")?,
        child_id: parse_uuid(&child_text, "department_entity_relationships.child_id")?,
        active,
    })
}

fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::InvalidData(format!(
            "entity repository requires schema version {expected_version}, got {actual_version}"
        )));
    }

    for table in ["department_entities", "department_entity_relationships"] {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(RepoError::InvalidData(format!(
                "entity repository requires table `{table}`"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{EntityRepository, EntitySearchCriteria, HierarchyLookup, SqliteEntityRepository};
    use crate::db::open_db_in_memory;
    use crate::model::entity::DepartmentEntity;
    use crate::model::relationship::RelationshipChange;

    #[test]
    fn duplicate_pair_rows_are_updated_together() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteEntityRepository::try_new(&conn).unwrap();
        let parent = DepartmentEntity::new("t1", "d1", "P", "Parent");
        let child = DepartmentEntity::new("t1", "d1", "C", "Child");
        repo.upsert_entity(&parent).unwrap();
        repo.upsert_entity(&child).unwrap();

        for _ in 0..2 {
            conn.execute(
                "INSERT INTO department_entity_relationships (parent_id, child_id, is_active)
                 VALUES (?1, ?2, 1);",
                [parent.id.to_string(), child.id.to_string()],
            )
            .unwrap();
        }
        assert_eq!(repo.find_relationships_by_parent(parent.id).unwrap().len(), 2);

        repo.apply_relationship_change(&RelationshipChange::deactivate(parent.id, child.id))
            .unwrap();
        assert!(repo.find_relationships_by_parent(parent.id).unwrap().is_empty());
        assert!(repo.get_parent(child.id).unwrap().is_none());
    }

    #[test]
    fn redeclared_child_gets_new_row_and_keeps_history() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteEntityRepository::try_new(&conn).unwrap();
        let parent = DepartmentEntity::new("t1", "d1", "P", "Parent");
        let child = DepartmentEntity::new("t1", "d1", "C", "Child");
        repo.upsert_entity(&parent).unwrap();
        repo.upsert_entity(&child).unwrap();

        repo.apply_relationship_change(&RelationshipChange::activate(parent.id, child.id))
            .unwrap();
        repo.apply_relationship_change(&RelationshipChange::deactivate(parent.id, child.id))
            .unwrap();
        repo.apply_relationship_change(&RelationshipChange::activate(parent.id, child.id))
            .unwrap();
        repo.apply_relationship_change(&RelationshipChange::activate(parent.id, child.id))
            .unwrap();

        let (total, inactive): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(is_active = 0), 0)
                 FROM department_entity_relationships
                 WHERE parent_id = ?1 AND child_id = ?2;",
                [parent.id.to_string(), child.id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .unwrap();
        assert_eq!(total, 2);
        assert_eq!(inactive, 1);
        assert_eq!(repo.get_parent(child.id).unwrap(), Some(parent));
    }

    #[test]
    fn deactivating_unknown_pair_writes_nothing() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteEntityRepository::try_new(&conn).unwrap();
        let parent = DepartmentEntity::new("t1", "d1", "P", "Parent");
        repo.upsert_entity(&parent).unwrap();

        repo.apply_relationship_change(&RelationshipChange::deactivate(
            parent.id,
            uuid::Uuid::new_v4(),
        ))
        .unwrap();
        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM department_entity_relationships;",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[test]
    fn search_ignores_blank_text_filters() {
        let conn = open_db_in_memory().unwrap();
        let repo = SqliteEntityRepository::try_new(&conn).unwrap();
        repo.upsert_entity(&DepartmentEntity::new("t1", "d1", "A", "Alpha"))
            .unwrap();
        repo.upsert_entity(&DepartmentEntity::new("t2", "d1", "B", "Beta"))
            .unwrap();

        let hits = repo
            .search_entities(&EntitySearchCriteria {
                tenant_id: "t1".to_string(),
                code: Some("  ".to_string()),
                ..EntitySearchCriteria::default()
            })
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].code, "A");
    }
}
