//! Role composition: one record backed by two rows.
//!
//! [`RoleBehavior`] is attached to the primary model (Student, Instructor)
//! and names a `has_one` relation to the extension model (StudentRole,
//! Human). Extension attributes then read and write through the primary
//! record, and saves and deletes cascade to the extension row.
//!
//! # Ownership direction
//!
//! - Owner mode (default): the primary row is stored first, then its key is
//!   copied into the extension's link attribute and the extension is
//!   stored. The extension is deleted before the primary.
//! - Slave mode (`primary_is_slave`): the extension row is stored first and
//!   its key is copied into the primary's link attribute. The extension is
//!   deleted after the primary.
//!
//! # Example
//!
//! ```text
//! let student = ModelDef::builder("Student")
//!     .inherit(&human)
//!     .has_one("studentRole", &student_role, [("humanId", "id")])
//!     .behavior(RoleBehavior::new("studentRole").role_attribute("role", "student"))
//!     .build()?;
//!
//! let mut record = Record::new(student);
//! record.set(&store, "name", "Ann")?;
//! record.set(&store, "studyGroupId", 12)?; // lands on the StudentRole row
//! record.save(&mut store, true)?;
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    AttributeAccess, Behavior, ModelDef, ModelEvent, Record, RecordError, RecordStore,
    RelationDef, Row, Value,
};

/// Serializable configuration of a [`RoleBehavior`].
///
/// ```text
/// {"relation": "human", "primaryIsSlave": true, "roleAttributes": {"role": "instructor"}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    /// Name of the `has_one` relation to the extension model.
    pub relation: String,
    /// Whether the primary row references the extension row.
    #[serde(default)]
    pub primary_is_slave: bool,
    /// Values written to the master row on every save.
    #[serde(default)]
    pub role_attributes: BTreeMap<String, Value>,
}

impl RoleConfig {
    pub fn from_json(json: &str) -> Result<Self, RecordError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<&str> for RoleConfig {
    fn from(relation: &str) -> Self {
        RoleConfig::from(relation.to_string())
    }
}

impl From<String> for RoleConfig {
    fn from(relation: String) -> Self {
        RoleConfig {
            relation,
            primary_is_slave: false,
            role_attributes: BTreeMap::new(),
        }
    }
}

/// Composes a primary record with the record of one `has_one` relation.
#[derive(Debug, Clone)]
pub struct RoleBehavior {
    relation: String,
    primary_is_slave: bool,
    role_attributes: Row,
}

impl RoleBehavior {
    pub fn new(relation: impl Into<String>) -> Self {
        let relation: String = relation.into();
        RoleBehavior::from(RoleConfig::from(relation))
    }

    pub fn primary_is_slave(mut self, primary_is_slave: bool) -> Self {
        self.primary_is_slave = primary_is_slave;
        self
    }

    /// Stamp `name = value` on the master row before every save: the
    /// primary in owner mode, the extension in slave mode.
    pub fn role_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.role_attributes.insert(name.into(), value.into());
        self
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn is_primary_slave(&self) -> bool {
        self.primary_is_slave
    }

    /// The extension record of `record`.
    ///
    /// Returns the cached record if there is one, otherwise fetches it
    /// through the relation; if no row exists a new empty record of the
    /// target model is cached and returned.
    pub fn resolve<'r>(
        &self,
        record: &'r mut Record,
        store: &dyn RecordStore,
    ) -> Result<&'r mut Record, RecordError> {
        let model = Arc::clone(record.model());
        if record.relation(store, &self.relation)?.is_none() {
            let target = Arc::clone(self.relation_def(record)?.target());
            debug!(
                model = %model.name(),
                relation = %self.relation,
                "no related row, instantiating {}",
                target.name()
            );
            record.populate_relation(&self.relation, Some(Record::new(target)));
        }

        record
            .related_mut(&self.relation)
            .ok_or_else(|| RecordError::UnknownRelation {
                model: model.name().to_string(),
                relation: self.relation.clone(),
            })
    }

    fn relation_def<'m>(&self, record: &'m Record) -> Result<&'m RelationDef, RecordError> {
        record
            .model()
            .relation(&self.relation)
            .ok_or_else(|| RecordError::UnknownRelation {
                model: record.model().name().to_string(),
                relation: self.relation.clone(),
            })
    }

    /// `(extension attribute, primary attribute)` of the relation link.
    fn link(&self, record: &Record) -> Result<(String, String), RecordError> {
        let (foreign, local) = self.relation_def(record)?.single_link()?;
        Ok((foreign.to_string(), local.to_string()))
    }

    fn apply_role_attributes(&self, target: &mut Record) -> Result<(), RecordError> {
        for (name, value) in &self.role_attributes {
            if !target.try_set(name, value.clone())? {
                return Err(RecordError::UnknownAttribute {
                    model: target.model().name().to_string(),
                    name: name.clone(),
                });
            }
        }
        Ok(())
    }

    fn before_save(
        &self,
        record: &mut Record,
        store: &mut dyn RecordStore,
    ) -> Result<(), RecordError> {
        if !self.primary_is_slave {
            return self.apply_role_attributes(record);
        }

        let (foreign, local) = self.link(record)?;
        let role = self.resolve(record, &*store)?;
        self.apply_role_attributes(role)?;
        role.save(store, false)?;

        let key = role.attribute(&foreign).cloned().unwrap_or_default();
        debug!(
            model = %record.model().name(),
            relation = %self.relation,
            key = %key,
            "stored master row before primary"
        );
        record.set_attribute(&local, key)
    }

    fn after_save(
        &self,
        record: &mut Record,
        store: &mut dyn RecordStore,
    ) -> Result<(), RecordError> {
        if self.primary_is_slave || record.related(&self.relation).is_none() {
            return Ok(());
        }

        let (foreign, local) = self.link(record)?;
        let key = record.attribute(&local).cloned().unwrap_or_default();
        let role = self.resolve(record, &*store)?;
        role.set_attribute(&foreign, key)?;
        role.save(store, false)?;

        debug!(
            model = %record.model().name(),
            relation = %self.relation,
            "stored role row after primary"
        );
        Ok(())
    }

    fn delete_role(
        &self,
        record: &mut Record,
        store: &mut dyn RecordStore,
    ) -> Result<(), RecordError> {
        let exists = record.relation(&*store, &self.relation)?.is_some();
        if exists {
            if let Some(role) = record.related_mut(&self.relation) {
                let rows = role.delete(store)?;
                debug!(relation = %self.relation, rows, "deleted role row");
            }
        }
        record.unpopulate_relation(&self.relation);
        Ok(())
    }
}

impl From<RoleConfig> for RoleBehavior {
    fn from(config: RoleConfig) -> Self {
        RoleBehavior {
            relation: config.relation,
            primary_is_slave: config.primary_is_slave,
            role_attributes: config.role_attributes,
        }
    }
}

impl Behavior for RoleBehavior {
    fn attach(&self, model: &ModelDef) -> Result<(), RecordError> {
        let relation =
            model
                .relation(&self.relation)
                .ok_or_else(|| RecordError::UnknownRelation {
                    model: model.name().to_string(),
                    relation: self.relation.clone(),
                })?;
        relation.single_link()?;

        let master: &ModelDef = if self.primary_is_slave {
            relation.target().as_ref()
        } else {
            model
        };
        for name in self.role_attributes.keys() {
            if !master.has_column(name) && master.property(name).is_none() {
                return Err(RecordError::InvalidConfig(format!(
                    "{}: role attribute {} is not an attribute of {}",
                    model.name(),
                    name,
                    master.name()
                )));
            }
        }
        Ok(())
    }

    fn after_validate(&self, record: &mut Record) {
        let Some(role) = record.related_mut(&self.relation) else {
            return;
        };
        if role.validate() {
            return;
        }
        let errors = role.errors().clone();
        record.add_errors(&errors);
    }

    fn on_event(
        &self,
        event: ModelEvent,
        record: &mut Record,
        store: &mut dyn RecordStore,
    ) -> Result<(), RecordError> {
        match event {
            ModelEvent::BeforeInsert | ModelEvent::BeforeUpdate => self.before_save(record, store),
            ModelEvent::AfterInsert | ModelEvent::AfterUpdate => self.after_save(record, store),
            ModelEvent::BeforeDelete if !self.primary_is_slave => self.delete_role(record, store),
            ModelEvent::AfterDelete if self.primary_is_slave => self.delete_role(record, store),
            ModelEvent::BeforeDelete | ModelEvent::AfterDelete => Ok(()),
        }
    }

    fn get_property(
        &self,
        record: &mut Record,
        store: &dyn RecordStore,
        name: &str,
    ) -> Result<Option<Value>, RecordError> {
        let role = self.resolve(record, store)?;
        if role.can_get(store, name)? {
            role.get(store, name).map(Some)
        } else {
            Ok(None)
        }
    }

    fn set_property(
        &self,
        record: &mut Record,
        store: &dyn RecordStore,
        name: &str,
        value: Value,
    ) -> Result<bool, RecordError> {
        let role = self.resolve(record, store)?;
        if !role.can_set(store, name)? {
            return Ok(false);
        }
        role.set(store, name, value)?;
        Ok(true)
    }

    fn can_get_property(
        &self,
        record: &mut Record,
        store: &dyn RecordStore,
        name: &str,
    ) -> Result<bool, RecordError> {
        self.resolve(record, store)?.can_get(store, name)
    }

    fn can_set_property(
        &self,
        record: &mut Record,
        store: &dyn RecordStore,
        name: &str,
    ) -> Result<bool, RecordError> {
        self.resolve(record, store)?.can_set(store, name)
    }

    fn call_method(
        &self,
        record: &mut Record,
        store: &dyn RecordStore,
        name: &str,
        args: &[Value],
    ) -> Result<Option<Value>, RecordError> {
        let role = self.resolve(record, store)?;
        if !role.has_method(name) {
            return Ok(None);
        }
        role.call(store, name, args).map(Some)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
