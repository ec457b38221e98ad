//! Dynamic active record.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::{
    AttributeAccess, Delete, FieldErrors, Insert, ModelDef, ModelEvent, Query, RecordError,
    RecordStore, RelationCache, Row, Update, Value,
};

/// One row of a model, in memory.
///
/// A record is new until it has been inserted or loaded from the store.
/// Attribute names the model does not declare are offered to the model's
/// behaviors, which is how a role relation contributes its columns.
#[derive(Debug, Clone)]
pub struct Record {
    model: Arc<ModelDef>,
    attributes: Row,
    old_attributes: Option<Row>,
    errors: FieldErrors,
    relations: RelationCache,
}

impl Record {
    /// A new, unsaved record with every column null.
    pub fn new(model: Arc<ModelDef>) -> Self {
        let attributes = model
            .columns()
            .iter()
            .map(|column| (column.clone(), Value::Null))
            .collect();
        Self {
            model,
            attributes,
            old_attributes: None,
            errors: FieldErrors::new(),
            relations: RelationCache::default(),
        }
    }

    /// A persisted record built from a fetched row. Unknown columns are
    /// dropped; missing ones are null.
    pub fn from_row(model: Arc<ModelDef>, row: Row) -> Self {
        let mut record = Self::new(model);
        for (name, value) in row {
            if let Some(slot) = record.attributes.get_mut(&name) {
                *slot = value;
            }
        }
        record.old_attributes = Some(record.attributes.clone());
        record
    }

    /// Find a record by primary key.
    pub fn find_one(
        store: &dyn RecordStore,
        model: &Arc<ModelDef>,
        key: impl Into<Value>,
    ) -> Result<Option<Record>, RecordError> {
        let query = Query::for_table(model.table()).eq(model.primary_key(), key.into());
        let row = store.fetch_optional(&query)?;
        Ok(row.map(|row| Record::from_row(Arc::clone(model), row)))
    }

    /// Find all records matching `query`. The query's table is replaced by
    /// the model's.
    pub fn find_all(
        store: &dyn RecordStore,
        model: &Arc<ModelDef>,
        query: Query,
    ) -> Result<Vec<Record>, RecordError> {
        let mut query = query;
        query.table = model.table().to_string();
        let rows = store.fetch(&query)?;
        Ok(rows
            .into_iter()
            .map(|row| Record::from_row(Arc::clone(model), row))
            .collect())
    }

    pub fn model(&self) -> &Arc<ModelDef> {
        &self.model
    }

    pub fn is_new_record(&self) -> bool {
        self.old_attributes.is_none()
    }

    pub fn primary_key(&self) -> Value {
        self.attribute(self.model.primary_key())
            .cloned()
            .unwrap_or_default()
    }

    /// The primary key as last loaded from or written to the store.
    pub fn old_primary_key(&self) -> Value {
        self.old_attributes
            .as_ref()
            .and_then(|old| old.get(self.model.primary_key()))
            .cloned()
            .unwrap_or_default()
    }

    pub fn attributes(&self) -> &Row {
        &self.attributes
    }

    /// A column value. Virtual properties and behaviors are not consulted.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Set a column value.
    pub fn set_attribute(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), RecordError> {
        match self.attributes.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(self.unknown_attribute(name)),
        }
    }

    /// Columns whose value differs from the stored one. All columns for a
    /// new record.
    pub fn dirty_attributes(&self) -> Row {
        match &self.old_attributes {
            None => self.attributes.clone(),
            Some(old) => self
                .attributes
                .iter()
                .filter(|(name, value)| old.get(*name) != Some(*value))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        }
    }

    // Composed access

    /// Read an attribute from the record, its virtual properties or its
    /// behaviors, in that order.
    pub fn get(&mut self, store: &dyn RecordStore, name: &str) -> Result<Value, RecordError> {
        if let Some(value) = self.try_get(name) {
            return Ok(value);
        }

        let model = Arc::clone(&self.model);
        for behavior in model.behaviors() {
            if let Some(value) = behavior.get_property(self, store, name)? {
                return Ok(value);
            }
        }

        Err(self.unknown_attribute(name))
    }

    /// Write an attribute on the record, its virtual properties or its
    /// behaviors, in that order.
    ///
    /// The record's own columns and properties always shadow names a
    /// behavior could handle: a read-only property fails with
    /// [`RecordError::ReadOnlyAttribute`] without consulting behaviors.
    pub fn set(
        &mut self,
        store: &dyn RecordStore,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), RecordError> {
        let value = value.into();
        if self.try_set(name, value.clone())? {
            return Ok(());
        }

        let model = Arc::clone(&self.model);
        for behavior in model.behaviors() {
            if behavior.set_property(self, store, name, value.clone())? {
                return Ok(());
            }
        }

        Err(self.unknown_attribute(name))
    }

    /// Whether [`Record::get`] would succeed for `name`.
    pub fn can_get(&mut self, store: &dyn RecordStore, name: &str) -> Result<bool, RecordError> {
        if self.declares(name) {
            return Ok(true);
        }

        let model = Arc::clone(&self.model);
        for behavior in model.behaviors() {
            if behavior.can_get_property(self, store, name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether [`Record::set`] would succeed for `name`.
    pub fn can_set(&mut self, store: &dyn RecordStore, name: &str) -> Result<bool, RecordError> {
        if self.has_attribute(name)
            || self
                .model
                .property(name)
                .is_some_and(|property| property.setter.is_some())
        {
            return Ok(true);
        }

        let model = Arc::clone(&self.model);
        for behavior in model.behaviors() {
            if behavior.can_set_property(self, store, name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.model.method(name).is_some()
    }

    /// Invoke a model method, falling back to behaviors.
    pub fn call(
        &mut self,
        store: &dyn RecordStore,
        name: &str,
        args: &[Value],
    ) -> Result<Value, RecordError> {
        if let Some(method) = self.model.method(name) {
            return method(self, args);
        }

        let model = Arc::clone(&self.model);
        for behavior in model.behaviors() {
            if let Some(value) = behavior.call_method(self, store, name, args)? {
                return Ok(value);
            }
        }

        Err(RecordError::UnknownMethod {
            model: self.model.name().to_string(),
            name: name.to_string(),
        })
    }

    // Relations

    /// The related record for `name`, fetched on first access and cached.
    pub fn relation(
        &mut self,
        store: &dyn RecordStore,
        name: &str,
    ) -> Result<Option<&mut Record>, RecordError> {
        if !self.relations.is_populated(name) {
            let model = Arc::clone(&self.model);
            let relation = model
                .relation(name)
                .ok_or_else(|| self.unknown_relation(name))?;
            let related = relation.find_for(self, store)?;
            self.relations.populate(name, related);
        }
        Ok(self.relations.get_mut(name))
    }

    /// The cached related record, without fetching.
    pub fn related(&self, name: &str) -> Option<&Record> {
        self.relations.get(name)
    }

    pub fn related_mut(&mut self, name: &str) -> Option<&mut Record> {
        self.relations.get_mut(name)
    }

    pub fn is_relation_populated(&self, name: &str) -> bool {
        self.relations.is_populated(name)
    }

    pub fn populate_relation(&mut self, name: &str, related: Option<Record>) {
        self.relations.populate(name, related);
    }

    pub fn unpopulate_relation(&mut self, name: &str) {
        self.relations.unpopulate(name);
    }

    // Validation

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_error(&self, attribute: &str) -> bool {
        self.errors.has(attribute)
    }

    pub fn add_error(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.errors.add(attribute, message);
    }

    pub fn add_errors(&mut self, errors: &FieldErrors) {
        self.errors.merge(errors);
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Run the model's rules, then each behavior's `after_validate`.
    /// Returns whether the record is free of errors.
    pub fn validate(&mut self) -> bool {
        let model = Arc::clone(&self.model);

        let mut errors = FieldErrors::new();
        for rule in model.rules() {
            rule.validate(&*self, &mut errors);
        }
        self.errors = errors;

        for behavior in model.behaviors() {
            behavior.after_validate(self);
        }

        !self.has_errors()
    }

    // Persistence

    /// Insert or update the record.
    pub fn save(
        &mut self,
        store: &mut dyn RecordStore,
        run_validation: bool,
    ) -> Result<(), RecordError> {
        if run_validation && !self.validate() {
            debug!(model = %self.model.name(), errors = ?self.errors, "validation failed");
            return Err(RecordError::ValidationFailed {
                model: self.model.name().to_string(),
            });
        }

        if self.is_new_record() {
            self.insert(store)
        } else {
            self.update(store).map(|_| ())
        }
    }

    /// Insert the record without validating it.
    pub fn insert(&mut self, store: &mut dyn RecordStore) -> Result<(), RecordError> {
        self.trigger(ModelEvent::BeforeInsert, store)?;

        let insert = Insert::into_table(self.model.table(), self.model.primary_key())
            .auto_increment(self.model.auto_increment())
            .values(self.attributes.clone());
        let key = store.insert(&insert)?;

        let primary_key = self.model.primary_key().to_string();
        self.attributes.insert(primary_key, key);
        self.old_attributes = Some(self.attributes.clone());
        debug!(model = %self.model.name(), key = %self.primary_key(), "inserted");

        self.trigger(ModelEvent::AfterInsert, store)
    }

    /// Write changed columns without validating. Returns the number of rows
    /// updated; lifecycle events fire even when nothing changed.
    pub fn update(&mut self, store: &mut dyn RecordStore) -> Result<u64, RecordError> {
        if self.is_new_record() {
            return Err(RecordError::NotFound(format!(
                "{}: cannot update a record that has not been inserted",
                self.model.name()
            )));
        }

        self.trigger(ModelEvent::BeforeUpdate, store)?;

        let dirty = self.dirty_attributes();
        let mut rows = 0;
        if !dirty.is_empty() {
            let update = Update::for_table(self.model.table())
                .values(dirty)
                .eq(self.model.primary_key(), self.old_primary_key());
            rows = store.update(&update)?;
            self.old_attributes = Some(self.attributes.clone());
            debug!(model = %self.model.name(), key = %self.primary_key(), rows, "updated");
        }

        self.trigger(ModelEvent::AfterUpdate, store)?;
        Ok(rows)
    }

    /// Delete the record's row. The record becomes new again.
    ///
    /// A record that was never stored deletes nothing and fires no events.
    pub fn delete(&mut self, store: &mut dyn RecordStore) -> Result<u64, RecordError> {
        if self.is_new_record() {
            return Ok(0);
        }

        self.trigger(ModelEvent::BeforeDelete, store)?;

        let delete =
            Delete::for_table(self.model.table()).eq(self.model.primary_key(), self.old_primary_key());
        let rows = store.delete(&delete)?;
        self.old_attributes = None;
        debug!(model = %self.model.name(), key = %self.primary_key(), rows, "deleted");

        self.trigger(ModelEvent::AfterDelete, store)?;
        Ok(rows)
    }

    /// Reload columns from the store and drop cached relations. Returns
    /// `false` if the row no longer exists.
    pub fn refresh(&mut self, store: &dyn RecordStore) -> Result<bool, RecordError> {
        let Some(fresh) = Record::find_one(store, &self.model, self.old_primary_key())? else {
            return Ok(false);
        };
        self.attributes = fresh.attributes;
        self.old_attributes = fresh.old_attributes;
        self.relations.clear();
        Ok(true)
    }

    fn trigger(
        &mut self,
        event: ModelEvent,
        store: &mut dyn RecordStore,
    ) -> Result<(), RecordError> {
        let model = Arc::clone(&self.model);
        trace!(model = %model.name(), event = %event, "lifecycle event");
        for behavior in model.behaviors() {
            behavior.on_event(event, self, &mut *store)?;
        }
        Ok(())
    }

    fn unknown_attribute(&self, name: &str) -> RecordError {
        RecordError::UnknownAttribute {
            model: self.model.name().to_string(),
            name: name.to_string(),
        }
    }

    fn unknown_relation(&self, name: &str) -> RecordError {
        RecordError::UnknownRelation {
            model: self.model.name().to_string(),
            relation: name.to_string(),
        }
    }
}

impl AttributeAccess for Record {
    fn try_get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.attributes.get(name) {
            return Some(value.clone());
        }
        self.model
            .property(name)
            .map(|property| (property.getter)(self))
    }

    fn try_set(&mut self, name: &str, value: Value) -> Result<bool, RecordError> {
        if let Some(slot) = self.attributes.get_mut(name) {
            *slot = value;
            return Ok(true);
        }

        let Some(property) = self.model.property(name).copied() else {
            return Ok(false);
        };
        match property.setter {
            Some(setter) => {
                setter(self, value)?;
                Ok(true)
            }
            None => Err(RecordError::ReadOnlyAttribute {
                model: self.model.name().to_string(),
                name: name.to_string(),
            }),
        }
    }
}
