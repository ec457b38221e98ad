//! Lifecycle observers attached to a model.
//!
//! A [`Behavior`] is registered on a [`ModelDef`](crate::ModelDef) and invoked
//! by every [`Record`] of that model at fixed lifecycle points, in
//! registration order. Behaviors may also contribute attributes and methods
//! that the record itself does not declare.

use std::any::Any;
use std::fmt;

use crate::{ModelDef, Record, RecordError, RecordStore, Value};

/// Name-based attribute access without side effects.
pub trait AttributeAccess {
    /// Read an attribute, or `None` if the name is not declared.
    fn try_get(&self, name: &str) -> Option<Value>;

    /// Write an attribute. Returns `Ok(false)` if the name is not declared.
    fn try_set(&mut self, name: &str, value: Value) -> Result<bool, RecordError>;

    /// Whether `name` is a column or virtual property of the target.
    fn declares(&self, name: &str) -> bool {
        self.try_get(name).is_some()
    }
}

/// Persistence lifecycle points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelEvent {
    BeforeInsert,
    AfterInsert,
    BeforeUpdate,
    AfterUpdate,
    BeforeDelete,
    AfterDelete,
}

impl fmt::Display for ModelEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelEvent::BeforeInsert => "beforeInsert",
            ModelEvent::AfterInsert => "afterInsert",
            ModelEvent::BeforeUpdate => "beforeUpdate",
            ModelEvent::AfterUpdate => "afterUpdate",
            ModelEvent::BeforeDelete => "beforeDelete",
            ModelEvent::AfterDelete => "afterDelete",
        };
        f.write_str(name)
    }
}

/// An observer attached to every record of a model.
///
/// All methods have no-op defaults; implementors override the points they
/// care about.
pub trait Behavior: fmt::Debug + Send + Sync {
    /// Called once when the owning model is built. Reject configurations the
    /// behavior cannot serve.
    fn attach(&self, _model: &ModelDef) -> Result<(), RecordError> {
        Ok(())
    }

    /// Called after the record's own rules ran.
    fn after_validate(&self, _record: &mut Record) {}

    /// Called at each persistence lifecycle point. An error aborts the
    /// operation in progress.
    fn on_event(
        &self,
        _event: ModelEvent,
        _record: &mut Record,
        _store: &mut dyn RecordStore,
    ) -> Result<(), RecordError> {
        Ok(())
    }

    /// Read an attribute the record does not declare.
    fn get_property(
        &self,
        _record: &mut Record,
        _store: &dyn RecordStore,
        _name: &str,
    ) -> Result<Option<Value>, RecordError> {
        Ok(None)
    }

    /// Write an attribute the record does not declare. Returns `Ok(true)`
    /// if the write was handled.
    fn set_property(
        &self,
        _record: &mut Record,
        _store: &dyn RecordStore,
        _name: &str,
        _value: Value,
    ) -> Result<bool, RecordError> {
        Ok(false)
    }

    fn can_get_property(
        &self,
        _record: &mut Record,
        _store: &dyn RecordStore,
        _name: &str,
    ) -> Result<bool, RecordError> {
        Ok(false)
    }

    fn can_set_property(
        &self,
        _record: &mut Record,
        _store: &dyn RecordStore,
        _name: &str,
    ) -> Result<bool, RecordError> {
        Ok(false)
    }

    /// Invoke a method the record's model does not declare.
    fn call_method(
        &self,
        _record: &mut Record,
        _store: &dyn RecordStore,
        _name: &str,
        _args: &[Value],
    ) -> Result<Option<Value>, RecordError> {
        Ok(None)
    }

    fn as_any(&self) -> &dyn Any;
}
