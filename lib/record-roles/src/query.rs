//! Store-agnostic statement builders.
//!
//! Records describe what they need from the store with these builders; a
//! [`RecordStore`](crate::RecordStore) implementation decides how to run them.

use crate::{Row, Value};

/// Filter conditions for queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// field = value
    Eq(String, Value),
    /// field != value
    Ne(String, Value),
    /// field > value
    Gt(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
    /// field <= value
    Lte(String, Value),
    /// field IN (values)
    In(String, Vec<Value>),
    /// field IS NULL
    IsNull(String),
    /// field IS NOT NULL
    IsNotNull(String),
}

impl Filter {
    /// The column this filter applies to.
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _)
            | Filter::Ne(field, _)
            | Filter::Gt(field, _)
            | Filter::Gte(field, _)
            | Filter::Lt(field, _)
            | Filter::Lte(field, _)
            | Filter::In(field, _)
            | Filter::IsNull(field)
            | Filter::IsNotNull(field) => field,
        }
    }
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A SELECT query builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The table to query.
    pub table: String,
    /// Filter conditions, joined with AND.
    pub filters: Vec<Filter>,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Offset for pagination.
    pub offset: Option<u64>,
}

impl Query {
    /// Create a new query for a table.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand for Filter::Eq).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    /// Add an inequality filter.
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Ne(field.into(), value.into()))
    }

    /// Add an IN filter (shorthand for Filter::In).
    pub fn r#in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(Filter::In(field.into(), values))
    }

    /// Add a greater-than filter.
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(field.into(), value.into()))
    }

    /// Add a less-than filter.
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(field.into(), value.into()))
    }

    /// Add an IS NULL filter.
    pub fn is_null(self, field: impl Into<String>) -> Self {
        self.filter(Filter::IsNull(field.into()))
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset for pagination.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// An INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    /// Primary key column of the table.
    pub primary_key: String,
    /// When set, the store generates the key if `values` carries none.
    pub auto_increment: bool,
    pub values: Row,
}

impl Insert {
    pub fn into_table(table: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            primary_key: primary_key.into(),
            auto_increment: false,
            values: Row::new(),
        }
    }

    pub fn auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn values(mut self, values: Row) -> Self {
        self.values = values;
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub values: Row,
    pub filters: Vec<Filter>,
}

impl Update {
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Row::new(),
            filters: Vec::new(),
        }
    }

    pub fn values(mut self, values: Row) -> Self {
        self.values = values;
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(field.into(), value.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// The table to delete from.
    pub table: String,
    /// Filter conditions.
    pub filters: Vec<Filter>,
}

impl Delete {
    /// Create a new delete statement for a table.
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn query_builder_collects_clauses() {
        let query = Query::for_table("Student")
            .eq("humanId", 4)
            .r#in("studyGroupId", [12, 14])
            .order_by("humanId", Order::Desc)
            .limit(1);

        assert_eq!(
            query.filters,
            vec![
                Filter::Eq("humanId".to_string(), Value::Int(4)),
                Filter::In(
                    "studyGroupId".to_string(),
                    vec![Value::Int(12), Value::Int(14)]
                ),
            ]
        );
        assert_eq!(query.order_by, vec![("humanId".to_string(), Order::Desc)]);
        assert_eq!(query.limit, Some(1));
        assert_eq!(query.offset, None);
    }

    #[test]
    fn filter_reports_its_field() {
        assert_eq!(Filter::IsNull("address".to_string()).field(), "address");
        assert_eq!(
            Filter::Gt("salary".to_string(), Value::Int(0)).field(),
            "salary"
        );
    }

    #[test]
    fn insert_defaults_to_explicit_keys() {
        let insert = Insert::into_table("Human", "id").set("name", "Ann");
        assert!(!insert.auto_increment);
        assert_eq!(insert.values.get("name"), Some(&Value::from("Ann")));
    }
}
