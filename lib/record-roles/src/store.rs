//! Store trait that records persist through.

use tracing::debug;

use crate::{Delete, Insert, Query, RecordError, Row, Update, Value};

/// Trait for executing statements against a relational backend.
///
/// The trait is object safe: records and behaviors receive the store as
/// `&dyn RecordStore` for reads and `&mut dyn RecordStore` for writes.
pub trait RecordStore {
    /// Execute a SELECT query and return matching rows.
    fn fetch(&self, query: &Query) -> Result<Vec<Row>, RecordError>;

    /// Execute a SELECT query and return at most one row.
    fn fetch_optional(&self, query: &Query) -> Result<Option<Row>, RecordError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.fetch(&query)?.into_iter().next())
    }

    /// Check if any rows match the query.
    fn exists(&self, query: &Query) -> Result<bool, RecordError> {
        Ok(self.fetch_optional(query)?.is_some())
    }

    /// Insert a row and return the value of its primary key.
    fn insert(&mut self, insert: &Insert) -> Result<Value, RecordError>;

    /// Execute an UPDATE and return the number of rows affected.
    fn update(&mut self, update: &Update) -> Result<u64, RecordError>;

    /// Execute a DELETE and return the number of rows affected.
    fn delete(&mut self, delete: &Delete) -> Result<u64, RecordError>;

    /// Begin a transaction.
    fn begin_transaction(&mut self) -> Result<(), RecordError>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<(), RecordError>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<(), RecordError>;
}

/// Run `f` inside a transaction, committing on success and rolling back on
/// error. The original error is returned even if the rollback itself fails.
pub fn transaction<S, T, F>(store: &mut S, f: F) -> Result<T, RecordError>
where
    S: RecordStore + ?Sized,
    F: FnOnce(&mut S) -> Result<T, RecordError>,
{
    store.begin_transaction()?;
    match f(store) {
        Ok(value) => {
            store.commit()?;
            Ok(value)
        }
        Err(e) => {
            debug!(error = %e, "rolling back transaction");
            if let Err(rollback_error) = store.rollback() {
                debug!(error = %rollback_error, "rollback failed");
            }
            Err(e)
        }
    }
}
