//! Record Roles - role composition for active records.
//!
//! This crate lets a "role" model (Student, Instructor) be composed with a
//! shared "base" model (Human) through a one-to-one relation, so that both
//! rows behave as one flat record.
//!
//! # Core Concepts
//!
//! - **Record**: a dynamic active record of a [`ModelDef`], persisted through
//!   a [`RecordStore`].
//! - **Behavior**: an observer attached to a model, invoked at fixed
//!   lifecycle points and offered attribute names the record does not know.
//! - **Role**: a [`RoleBehavior`] that resolves the related record lazily,
//!   delegates attribute access to it, and cascades validation, saves and
//!   deletes in the order given by the ownership direction.
//!
//! # Traits
//!
//! - [`RecordStore`]: Synchronous statement executor for a relational backend
//! - [`Behavior`]: Lifecycle observer and attribute delegate
//! - [`AttributeAccess`]: Name-based attribute reads and writes

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod behavior;
mod error;
mod model;
mod query;
mod record;
mod relation;
mod role;
mod store;
mod validation;
mod value;

pub use behavior::{AttributeAccess, Behavior, ModelEvent};
pub use error::RecordError;
pub use model::{Method, ModelBuilder, ModelDef, Property, PropertyGetter, PropertySetter};
pub use query::{Delete, Filter, Insert, Order, Query, Update};
pub use record::Record;
pub use relation::{RelationCache, RelationDef, RelationSlot};
pub use role::{RoleBehavior, RoleConfig};
pub use store::{RecordStore, transaction};
pub use validation::{FieldErrors, Rule};
pub use value::{Row, Value};
