//! In-memory implementation for record-roles.
//!
//! This crate provides [`MemoryStore`], a `RecordStore` that keeps tables in
//! memory. It enforces primary key uniqueness and declared foreign keys, so
//! the order in which composite records write and delete their rows is
//! observable, and it supports snapshot transactions.
//!
//! # Usage
//!
//! ```text
//! use record_roles_memory::{ForeignKey, MemoryStore};
//!
//! let mut store = MemoryStore::new()
//!     .with_foreign_key(ForeignKey::new("Student", "humanId").references("Human", "id"));
//!
//! let mut student = Record::new(student_model);
//! student.set(&store, "name", "Ann")?;
//! student.set(&store, "studyGroupId", 12)?;
//! student.save(&mut store, true)?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod executor;

pub use executor::{ForeignKey, MemoryStore, Statement};

// Re-export core types for convenience
pub use record_roles::{
    AttributeAccess, Behavior, Delete, FieldErrors, Filter, Insert, ModelDef, ModelEvent, Order,
    Query, Record, RecordError, RecordStore, RoleBehavior, RoleConfig, Row, Rule, Update, Value,
    transaction,
};
