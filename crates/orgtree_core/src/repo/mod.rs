//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the read capabilities the hierarchy components depend on.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Write paths enforce `DepartmentEntity::validate()` before persistence.
//! - Store failures surface as `RepoError` and are never retried here.

pub mod entity_repo;
