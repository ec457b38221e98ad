//! Model definitions: the static description shared by all records of a type.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{Behavior, Query, Record, RecordError, RelationDef, Rule, Value};

/// Reads a virtual property.
pub type PropertyGetter = fn(&Record) -> Value;

/// Writes a virtual property.
pub type PropertySetter = fn(&mut Record, Value) -> Result<(), RecordError>;

/// A named model method.
pub type Method = fn(&Record, &[Value]) -> Result<Value, RecordError>;

/// A computed attribute that is not stored in a column.
#[derive(Clone, Copy)]
pub struct Property {
    pub getter: PropertyGetter,
    pub setter: Option<PropertySetter>,
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("writable", &self.setter.is_some())
            .finish()
    }
}

/// Table, columns, rules, relations and behaviors of a record type.
///
/// Built once with [`ModelDef::builder`] and shared by reference count.
pub struct ModelDef {
    name: String,
    table: String,
    primary_key: String,
    auto_increment: bool,
    columns: Vec<String>,
    rules: Vec<Rule>,
    properties: BTreeMap<String, Property>,
    methods: BTreeMap<String, Method>,
    relations: BTreeMap<String, RelationDef>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

impl ModelDef {
    pub fn builder(name: impl Into<String>) -> ModelBuilder {
        let name = name.into();
        ModelBuilder {
            def: ModelDef {
                table: name.clone(),
                name,
                primary_key: "id".to_string(),
                auto_increment: true,
                columns: Vec::new(),
                rules: Vec::new(),
                properties: BTreeMap::new(),
                methods: BTreeMap::new(),
                relations: BTreeMap::new(),
                behaviors: Vec::new(),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn method(&self, name: &str) -> Option<Method> {
        self.methods.get(name).copied()
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    pub fn behaviors(&self) -> &[Arc<dyn Behavior>] {
        &self.behaviors
    }

    /// A query over this model's table.
    pub fn find(&self) -> Query {
        Query::for_table(self.table())
    }

    /// The first attached behavior of type `B`.
    pub fn behavior<B: Behavior + 'static>(&self) -> Option<&B> {
        self.behaviors
            .iter()
            .find_map(|b| b.as_any().downcast_ref::<B>())
    }
}

impl fmt::Debug for ModelDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelDef")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("columns", &self.columns)
            .field("relations", &self.relations.keys().collect::<Vec<_>>())
            .field("behaviors", &self.behaviors)
            .finish()
    }
}

/// Builder for [`ModelDef`].
pub struct ModelBuilder {
    def: ModelDef,
}

impl ModelBuilder {
    /// Copy table, key, columns, rules, properties and methods from `parent`.
    ///
    /// Relations and behaviors are not inherited.
    pub fn inherit(mut self, parent: &ModelDef) -> Self {
        self.def.table = parent.table.clone();
        self.def.primary_key = parent.primary_key.clone();
        self.def.auto_increment = parent.auto_increment;
        for column in &parent.columns {
            self = self.column(column.as_str());
        }
        self.def.rules.extend(parent.rules.iter().cloned());
        self.def.properties.extend(
            parent
                .properties
                .iter()
                .map(|(name, property)| (name.clone(), *property)),
        );
        self.def
            .methods
            .extend(parent.methods.iter().map(|(name, method)| (name.clone(), *method)));
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.def.table = table.into();
        self
    }

    /// Set the primary key column and whether the store generates it.
    pub fn primary_key(mut self, column: impl Into<String>, auto_increment: bool) -> Self {
        self.def.primary_key = column.into();
        self.def.auto_increment = auto_increment;
        self
    }

    pub fn column(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.def.columns.contains(&name) {
            self.def.columns.push(name);
        }
        self
    }

    pub fn columns<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self = self.column(name);
        }
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.def.rules.push(rule);
        self
    }

    /// Declare a read-only virtual property.
    pub fn property(mut self, name: impl Into<String>, getter: PropertyGetter) -> Self {
        self.def.properties.insert(
            name.into(),
            Property {
                getter,
                setter: None,
            },
        );
        self
    }

    /// Declare a readable and writable virtual property.
    pub fn writable_property(
        mut self,
        name: impl Into<String>,
        getter: PropertyGetter,
        setter: PropertySetter,
    ) -> Self {
        self.def.properties.insert(
            name.into(),
            Property {
                getter,
                setter: Some(setter),
            },
        );
        self
    }

    pub fn method(mut self, name: impl Into<String>, method: Method) -> Self {
        self.def.methods.insert(name.into(), method);
        self
    }

    /// Declare a one-to-one relation to `target`, linked by
    /// `(target attribute, own attribute)` pairs.
    pub fn has_one<I, F, L>(mut self, name: impl Into<String>, target: &Arc<ModelDef>, link: I) -> Self
    where
        I: IntoIterator<Item = (F, L)>,
        F: Into<String>,
        L: Into<String>,
    {
        let relation = RelationDef::new(name, Arc::clone(target), link);
        self.def
            .relations
            .insert(relation.name().to_string(), relation);
        self
    }

    pub fn behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.def.behaviors.push(Arc::new(behavior));
        self
    }

    /// Check the definition and attach its behaviors.
    pub fn build(self) -> Result<Arc<ModelDef>, RecordError> {
        let def = self.def;

        if !def.has_column(&def.primary_key) {
            return Err(RecordError::InvalidConfig(format!(
                "{}: primary key {} is not a column",
                def.name, def.primary_key
            )));
        }

        for relation in def.relations.values() {
            if relation.link().is_empty() {
                return Err(RecordError::InvalidConfig(format!(
                    "{}: relation {} has no link",
                    def.name,
                    relation.name()
                )));
            }
            for (foreign, local) in relation.link() {
                if !def.has_column(local) {
                    return Err(RecordError::InvalidConfig(format!(
                        "{}: relation {} links unknown column {}",
                        def.name,
                        relation.name(),
                        local
                    )));
                }
                if !relation.target().has_column(foreign) {
                    return Err(RecordError::InvalidConfig(format!(
                        "{}: relation {} links unknown column {}::{}",
                        def.name,
                        relation.name(),
                        relation.target().name(),
                        foreign
                    )));
                }
            }
        }

        for behavior in &def.behaviors {
            behavior.attach(&def)?;
        }

        Ok(Arc::new(def))
    }
}
