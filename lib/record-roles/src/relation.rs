//! One-to-one relations and the per-record relation cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use crate::{ModelDef, Query, Record, RecordError, RecordStore};

/// A declared `has_one` relation.
///
/// `link` pairs an attribute of the target model (the foreign side) with an
/// attribute of the declaring model (the local side). Student declares
/// `studentRole` with `[("humanId", "id")]`: the role row's `humanId` points
/// at the student's `id`.
#[derive(Debug, Clone)]
pub struct RelationDef {
    name: String,
    target: Arc<ModelDef>,
    link: Vec<(String, String)>,
}

impl RelationDef {
    pub fn new<I, F, L>(name: impl Into<String>, target: Arc<ModelDef>, link: I) -> Self
    where
        I: IntoIterator<Item = (F, L)>,
        F: Into<String>,
        L: Into<String>,
    {
        Self {
            name: name.into(),
            target,
            link: link
                .into_iter()
                .map(|(foreign, local)| (foreign.into(), local.into()))
                .collect(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &Arc<ModelDef> {
        &self.target
    }

    pub fn link(&self) -> &[(String, String)] {
        &self.link
    }

    /// The link as a single `(foreign, local)` pair.
    ///
    /// Multi-column links are rejected instead of silently using the first
    /// pair.
    pub fn single_link(&self) -> Result<(&str, &str), RecordError> {
        match self.link.as_slice() {
            [(foreign, local)] => Ok((foreign.as_str(), local.as_str())),
            pairs => Err(RecordError::UnsupportedLink {
                relation: self.name.clone(),
                pairs: pairs.len(),
            }),
        }
    }

    /// Build the query selecting the related row of `owner`.
    ///
    /// Returns `None` when any local link attribute is null: such an owner
    /// cannot have a related row yet.
    pub fn query_for(&self, owner: &Record) -> Option<Query> {
        let mut query = Query::for_table(self.target.table());
        for (foreign, local) in &self.link {
            let value = owner.attribute(local)?;
            if value.is_null() {
                return None;
            }
            query = query.eq(foreign.as_str(), value.clone());
        }
        Some(query.limit(1))
    }

    /// Fetch the related row of `owner`.
    pub fn find_for(
        &self,
        owner: &Record,
        store: &dyn RecordStore,
    ) -> Result<Option<Record>, RecordError> {
        let Some(query) = self.query_for(owner) else {
            trace!(relation = %self.name, "link attribute is null, skipping fetch");
            return Ok(None);
        };

        let row = store.fetch_optional(&query)?;
        Ok(row.map(|row| Record::from_row(Arc::clone(&self.target), row)))
    }
}

/// State of one relation on one record.
#[derive(Debug, Clone, Default)]
pub enum RelationSlot {
    #[default]
    NotLoaded,
    /// Fetched or assigned; `None` when no related row exists.
    Loaded(Option<Record>),
}

/// Relation slots of a record, keyed by relation name.
#[derive(Debug, Clone, Default)]
pub struct RelationCache {
    slots: BTreeMap<String, RelationSlot>,
}

impl RelationCache {
    pub fn is_populated(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(RelationSlot::Loaded(_)))
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        match self.slots.get(name) {
            Some(RelationSlot::Loaded(related)) => related.as_ref(),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Record> {
        match self.slots.get_mut(name) {
            Some(RelationSlot::Loaded(related)) => related.as_mut(),
            _ => None,
        }
    }

    pub fn populate(&mut self, name: impl Into<String>, related: Option<Record>) {
        self.slots.insert(name.into(), RelationSlot::Loaded(related));
    }

    pub fn unpopulate(&mut self, name: &str) {
        self.slots.remove(name);
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}
