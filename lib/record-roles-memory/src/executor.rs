//! In-memory implementation of RecordStore.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use record_roles::{
    Delete, Filter, Insert, Order, Query, RecordError, RecordStore, Row, Update, Value,
};
use tracing::trace;

/// A foreign key constraint: `table.column` must reference an existing
/// `references_table.references_column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

impl ForeignKey {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            references_table: String::new(),
            references_column: String::new(),
        }
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references_table = table.into();
        self.references_column = column.into();
        self
    }
}

/// A statement executed against the store, as recorded in its journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    Select { table: String },
    Insert { table: String },
    Update { table: String, rows: u64 },
    Delete { table: String, rows: u64 },
}

impl Statement {
    pub fn table(&self) -> &str {
        match self {
            Statement::Select { table }
            | Statement::Insert { table }
            | Statement::Update { table, .. }
            | Statement::Delete { table, .. } => table,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Row>,
    last_id: i64,
}

/// Tables held in memory.
///
/// Tables are created on first insert. Selecting from a table that does not
/// exist returns no rows.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: BTreeMap<String, Table>,
    foreign_keys: Vec<ForeignKey>,
    snapshot: Option<BTreeMap<String, Table>>,
    // Selects take `&self` but are journaled too. Only the journal is
    // interior-mutable; table state changes only through `&mut self`.
    journal: RefCell<Vec<Statement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enforce `foreign_key` on subsequent inserts, updates and deletes.
    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) {
        self.foreign_keys.push(foreign_key);
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.add_foreign_key(foreign_key);
        self
    }

    /// All rows of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or(&[])
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    pub fn in_transaction(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Statements executed since creation or the last `clear_journal`.
    pub fn journal(&self) -> Vec<Statement> {
        self.journal.borrow().clone()
    }

    pub fn clear_journal(&self) {
        self.journal.borrow_mut().clear();
    }

    fn record(&self, statement: Statement) {
        trace!(statement = ?statement, "executed");
        self.journal.borrow_mut().push(statement);
    }

    fn contains(&self, table: &str, column: &str, value: &Value) -> bool {
        self.rows(table)
            .iter()
            .any(|row| row.get(column).is_some_and(|v| v.matches(value)))
    }

    /// Every foreign key declared on `table` must find its parent row.
    fn check_parents(&self, table: &str, row: &Row) -> Result<(), RecordError> {
        for fk in self.foreign_keys.iter().filter(|fk| fk.table == table) {
            let value = row.get(&fk.column).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }
            if !self.contains(&fk.references_table, &fk.references_column, value) {
                return Err(RecordError::StorageError(format!(
                    "foreign key violation: {}.{} = {} has no matching {}.{}",
                    fk.table, fk.column, value, fk.references_table, fk.references_column
                )));
            }
        }
        Ok(())
    }

    /// No foreign key may still reference `row` of `table`.
    fn check_children(&self, table: &str, row: &Row) -> Result<(), RecordError> {
        for fk in self
            .foreign_keys
            .iter()
            .filter(|fk| fk.references_table == table)
        {
            let value = row.get(&fk.references_column).unwrap_or(&Value::Null);
            if value.is_null() {
                continue;
            }
            if self.contains(&fk.table, &fk.column, value) {
                return Err(RecordError::StorageError(format!(
                    "foreign key violation: {}.{} still references {}.{} = {}",
                    fk.table, fk.column, table, fk.references_column, value
                )));
            }
        }
        Ok(())
    }
}

fn matches_filter(row: &Row, filter: &Filter) -> bool {
    let value = row.get(filter.field()).unwrap_or(&Value::Null);
    match filter {
        Filter::Eq(_, v) => value.matches(v),
        Filter::Ne(_, v) => value.compare(v).is_some_and(|o| o != Ordering::Equal),
        Filter::Gt(_, v) => value.compare(v) == Some(Ordering::Greater),
        Filter::Gte(_, v) => matches!(
            value.compare(v),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Filter::Lt(_, v) => value.compare(v) == Some(Ordering::Less),
        Filter::Lte(_, v) => matches!(value.compare(v), Some(Ordering::Less | Ordering::Equal)),
        Filter::In(_, values) => values.iter().any(|v| value.matches(v)),
        Filter::IsNull(_) => value.is_null(),
        Filter::IsNotNull(_) => !value.is_null(),
    }
}

fn matches_all(row: &Row, filters: &[Filter]) -> bool {
    filters.iter().all(|filter| matches_filter(row, filter))
}

/// Nulls sort first; incomparable values keep their relative order.
fn compare_rows(a: &Row, b: &Row, order_by: &[(String, Order)]) -> Ordering {
    for (field, order) in order_by {
        let left = a.get(field).unwrap_or(&Value::Null);
        let right = b.get(field).unwrap_or(&Value::Null);
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => left.compare(right).unwrap_or(Ordering::Equal),
        };
        let ordering = match order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

impl RecordStore for MemoryStore {
    fn fetch(&self, query: &Query) -> Result<Vec<Row>, RecordError> {
        let mut rows: Vec<Row> = self
            .rows(&query.table)
            .iter()
            .filter(|row| matches_all(row, &query.filters))
            .cloned()
            .collect();

        if !query.order_by.is_empty() {
            rows.sort_by(|a, b| compare_rows(a, b, &query.order_by));
        }

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        let rows = rows.into_iter().skip(offset).take(limit).collect();

        self.record(Statement::Select {
            table: query.table.clone(),
        });
        Ok(rows)
    }

    fn insert(&mut self, insert: &Insert) -> Result<Value, RecordError> {
        let mut row = insert.values.clone();
        let key = match row.get(&insert.primary_key).cloned().unwrap_or_default() {
            Value::Null if insert.auto_increment => {
                let last_id = self.tables.get(&insert.table).map_or(0, |t| t.last_id);
                let next = last_id.checked_add(1).ok_or_else(|| {
                    RecordError::StorageError(format!(
                        "{}.{} key space exhausted",
                        insert.table, insert.primary_key
                    ))
                })?;
                Value::Int(next)
            }
            Value::Null => {
                return Err(RecordError::StorageError(format!(
                    "{}.{} cannot be null",
                    insert.table, insert.primary_key
                )));
            }
            key => key,
        };
        row.insert(insert.primary_key.clone(), key.clone());

        if self.contains(&insert.table, &insert.primary_key, &key) {
            return Err(RecordError::StorageError(format!(
                "duplicate primary key {}.{} = {}",
                insert.table, insert.primary_key, key
            )));
        }
        self.check_parents(&insert.table, &row)?;

        let table = self.tables.entry(insert.table.clone()).or_default();
        if let Value::Int(n) = key {
            table.last_id = table.last_id.max(n);
        }
        table.rows.push(row);

        self.record(Statement::Insert {
            table: insert.table.clone(),
        });
        Ok(key)
    }

    fn update(&mut self, update: &Update) -> Result<u64, RecordError> {
        let updated: Vec<(usize, Row)> = self
            .rows(&update.table)
            .iter()
            .enumerate()
            .filter(|(_, row)| matches_all(row, &update.filters))
            .map(|(index, row)| {
                let mut row = row.clone();
                row.extend(update.values.clone());
                (index, row)
            })
            .collect();

        for (_, row) in &updated {
            self.check_parents(&update.table, row)?;
        }

        let rows = updated.len() as u64;
        if let Some(table) = self.tables.get_mut(&update.table) {
            for (index, row) in updated {
                if let Some(slot) = table.rows.get_mut(index) {
                    *slot = row;
                }
            }
        }

        self.record(Statement::Update {
            table: update.table.clone(),
            rows,
        });
        Ok(rows)
    }

    fn delete(&mut self, delete: &Delete) -> Result<u64, RecordError> {
        let doomed: Vec<&Row> = self
            .rows(&delete.table)
            .iter()
            .filter(|row| matches_all(row, &delete.filters))
            .collect();

        for row in &doomed {
            self.check_children(&delete.table, row)?;
        }

        let rows = doomed.len() as u64;
        if let Some(table) = self.tables.get_mut(&delete.table) {
            table.rows.retain(|row| !matches_all(row, &delete.filters));
        }

        self.record(Statement::Delete {
            table: delete.table.clone(),
            rows,
        });
        Ok(rows)
    }

    fn begin_transaction(&mut self) -> Result<(), RecordError> {
        if self.snapshot.is_some() {
            return Err(RecordError::StorageError(
                "transaction already open".to_string(),
            ));
        }
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), RecordError> {
        match self.snapshot.take() {
            Some(_) => Ok(()),
            None => Err(RecordError::StorageError(
                "no open transaction to commit".to_string(),
            )),
        }
    }

    fn rollback(&mut self) -> Result<(), RecordError> {
        match self.snapshot.take() {
            Some(tables) => {
                trace!("rolled back");
                self.tables = tables;
                Ok(())
            }
            None => Err(RecordError::StorageError(
                "no open transaction to roll back".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use record_roles::transaction;

    fn human(name: &str) -> Insert {
        Insert::into_table("Human", "id")
            .auto_increment(true)
            .set("name", name)
    }

    fn names(rows: &[Row]) -> Vec<String> {
        rows.iter()
            .filter_map(|row| row.get("name").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    #[test]
    fn auto_increment_assigns_sequential_keys() {
        let mut store = MemoryStore::new();

        assert_eq!(store.insert(&human("Ann")).unwrap(), Value::Int(1));
        assert_eq!(store.insert(&human("Bea")).unwrap(), Value::Int(2));
        assert_eq!(
            store.insert(&human("Cid").set("id", 10)).unwrap(),
            Value::Int(10)
        );
        assert_eq!(store.insert(&human("Dag")).unwrap(), Value::Int(11));
    }

    #[test]
    fn auto_increment_fails_when_keys_run_out() {
        let mut store = MemoryStore::new();
        store.insert(&human("Ann").set("id", i64::MAX)).unwrap();

        let result = store.insert(&human("Bea"));

        assert!(matches!(result, Err(RecordError::StorageError(_))));
        assert_eq!(store.count("Human"), 1);
    }

    #[test]
    fn explicit_keys_are_required_without_auto_increment() {
        let mut store = MemoryStore::new();
        let result = store.insert(&Insert::into_table("Student", "humanId").set("studyGroupId", 1));
        assert!(matches!(result, Err(RecordError::StorageError(_))));
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let mut store = MemoryStore::new();
        store.insert(&human("Ann").set("id", 1)).unwrap();

        let result = store.insert(&human("Bea").set("id", 1));

        assert!(matches!(result, Err(RecordError::StorageError(_))));
        assert_eq!(store.count("Human"), 1);
    }

    #[test]
    fn fetch_filters_orders_and_pages() {
        let mut store = MemoryStore::new();
        for name in ["Cid", "Ann", "Bea", "Dag"] {
            store.insert(&human(name)).unwrap();
        }

        let query = Query::for_table("Human")
            .ne("name", "Dag")
            .order_by("name", Order::Asc)
            .offset(1)
            .limit(5);
        assert_eq!(names(&store.fetch(&query).unwrap()), ["Bea", "Cid"]);

        let query = Query::for_table("Human").r#in("id", [1, 3]);
        assert_eq!(names(&store.fetch(&query).unwrap()), ["Cid", "Bea"]);

        let query = Query::for_table("Human").gt("id", 2).order_by("id", Order::Desc);
        assert_eq!(names(&store.fetch(&query).unwrap()), ["Dag", "Bea"]);
    }

    #[test]
    fn null_only_matches_null_filters() {
        let mut store = MemoryStore::new();
        store.insert(&human("Ann")).unwrap();

        let by_null = Query::for_table("Human").eq("address", Value::Null);
        assert!(store.fetch(&by_null).unwrap().is_empty());

        let is_null = Query::for_table("Human").is_null("address");
        assert_eq!(store.fetch(&is_null).unwrap().len(), 1);
    }

    #[test]
    fn missing_tables_are_empty() {
        let mut store = MemoryStore::new();
        assert!(store.fetch(&Query::for_table("Nope")).unwrap().is_empty());
        assert_eq!(store.delete(&Delete::for_table("Nope")).unwrap(), 0);
        assert_eq!(store.update(&Update::for_table("Nope").set("a", 1)).unwrap(), 0);
    }

    #[test]
    fn update_and_delete_report_affected_rows() {
        let mut store = MemoryStore::new();
        store.insert(&human("Ann")).unwrap();
        store.insert(&human("Bea")).unwrap();

        let update = Update::for_table("Human").set("address", "Main St").eq("id", 2);
        assert_eq!(store.update(&update).unwrap(), 1);
        assert_eq!(
            store.rows("Human")[1].get("address"),
            Some(&Value::from("Main St"))
        );

        assert_eq!(store.delete(&Delete::for_table("Human").eq("id", 1)).unwrap(), 1);
        assert_eq!(names(store.rows("Human")), ["Bea"]);
    }

    #[test]
    fn foreign_keys_order_inserts_and_deletes() {
        let mut store = MemoryStore::new()
            .with_foreign_key(ForeignKey::new("Student", "humanId").references("Human", "id"));

        let orphan = Insert::into_table("Student", "humanId").set("humanId", 1);
        assert!(matches!(
            store.insert(&orphan),
            Err(RecordError::StorageError(_))
        ));

        store.insert(&human("Ann")).unwrap();
        store.insert(&orphan).unwrap();

        let parent = Delete::for_table("Human").eq("id", 1);
        assert!(matches!(
            store.delete(&parent),
            Err(RecordError::StorageError(_))
        ));
        assert_eq!(store.count("Human"), 1);

        let repoint = Update::for_table("Student").set("humanId", 7).eq("humanId", 1);
        assert!(matches!(
            store.update(&repoint),
            Err(RecordError::StorageError(_))
        ));

        store
            .delete(&Delete::for_table("Student").eq("humanId", 1))
            .unwrap();
        assert_eq!(store.delete(&parent).unwrap(), 1);
    }

    #[test]
    fn rollback_restores_tables() {
        let mut store = MemoryStore::new();
        store.insert(&human("Ann")).unwrap();

        let result: Result<(), RecordError> = transaction(&mut store, |store| {
            store.insert(&human("Bea"))?;
            Err(RecordError::StorageError("boom".to_string()))
        });

        assert!(result.is_err());
        assert!(!store.in_transaction());
        assert_eq!(names(store.rows("Human")), ["Ann"]);
        assert_eq!(store.insert(&human("Cid")).unwrap(), Value::Int(2));
    }

    #[test]
    fn commit_keeps_changes() {
        let mut store = MemoryStore::new();

        let key = transaction(&mut store, |store| store.insert(&human("Ann"))).unwrap();

        assert_eq!(key, Value::Int(1));
        assert_eq!(store.count("Human"), 1);
    }

    #[test]
    fn nested_transactions_are_rejected() {
        let mut store = MemoryStore::new();
        store.begin_transaction().unwrap();

        assert!(store.begin_transaction().is_err());
        store.rollback().unwrap();
        assert!(store.commit().is_err());
    }

    #[test]
    fn journal_records_statements() {
        let mut store = MemoryStore::new();
        store.insert(&human("Ann")).unwrap();
        store.fetch(&Query::for_table("Human")).unwrap();
        store.delete(&Delete::for_table("Human").eq("id", 1)).unwrap();

        assert_eq!(
            store.journal(),
            vec![
                Statement::Insert {
                    table: "Human".to_string()
                },
                Statement::Select {
                    table: "Human".to_string()
                },
                Statement::Delete {
                    table: "Human".to_string(),
                    rows: 1
                },
            ]
        );

        store.clear_journal();
        assert!(store.journal().is_empty());
    }
}
