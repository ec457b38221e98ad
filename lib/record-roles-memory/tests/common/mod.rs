#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use record_roles_memory::{
    ForeignKey, MemoryStore, ModelDef, Record, RecordError, RoleBehavior, RoleConfig, Rule,
    Statement, Value,
};

/// Human is the shared base table. Student is stored in the Human table and
/// owns a StudentRole row; Instructor owns nothing and points at a Human row.
pub struct Models {
    pub human: Arc<ModelDef>,
    pub student_role: Arc<ModelDef>,
    pub student: Arc<ModelDef>,
    pub instructor: Arc<ModelDef>,
}

fn say_hello(_: &Record, args: &[Value]) -> Result<Value, RecordError> {
    let name = args.first().cloned().unwrap_or_default();
    Ok(Value::from(format!("Hello, {}", name)))
}

fn display_name(record: &Record) -> Value {
    let name = record.attribute("name").cloned().unwrap_or_default();
    Value::from(format!("{} ({})", name, record.model().name()))
}

pub fn models() -> Models {
    let human = ModelDef::builder("Human")
        .columns(["id", "role", "name", "address"])
        .rule(Rule::required(["name", "address"]))
        .rule(Rule::max_length(["name"], 64))
        .property("displayName", display_name)
        .method("sayHello", say_hello)
        .build()
        .unwrap();

    let student_role = ModelDef::builder("StudentRole")
        .table("Student")
        .primary_key("humanId", false)
        .columns(["humanId", "studyGroupId", "hasScholarship"])
        .rule(Rule::required(["studyGroupId"]))
        .rule(Rule::integer(["studyGroupId"]))
        .rule(Rule::boolean(["hasScholarship"]))
        .build()
        .unwrap();

    let student = ModelDef::builder("Student")
        .inherit(&human)
        .has_one("studentRole", &student_role, [("humanId", "id")])
        .behavior(RoleBehavior::new("studentRole").role_attribute("role", "student"))
        .build()
        .unwrap();

    let instructor_role = RoleConfig::from_json(
        r#"{"relation": "human", "primaryIsSlave": true, "roleAttributes": {"role": "instructor"}}"#,
    )
    .unwrap();
    let instructor = ModelDef::builder("Instructor")
        .primary_key("humanId", false)
        .columns(["humanId", "rankId", "salary"])
        .rule(Rule::required(["rankId", "salary"]))
        .has_one("human", &human, [("id", "humanId")])
        .behavior(RoleBehavior::from(instructor_role))
        .build()
        .unwrap();

    Models {
        human,
        student_role,
        student,
        instructor,
    }
}

/// A store enforcing the references of both role tables to Human.
pub fn store() -> MemoryStore {
    MemoryStore::new()
        .with_foreign_key(ForeignKey::new("Student", "humanId").references("Human", "id"))
        .with_foreign_key(ForeignKey::new("Instructor", "humanId").references("Human", "id"))
}

/// Tables touched by statements of `kind`, in execution order.
pub fn tables_of(store: &MemoryStore, kind: fn(&Statement) -> bool) -> Vec<String> {
    store
        .journal()
        .iter()
        .filter(|statement| kind(statement))
        .map(|statement| statement.table().to_string())
        .collect()
}

pub fn is_insert(statement: &Statement) -> bool {
    matches!(statement, Statement::Insert { .. })
}

pub fn is_delete(statement: &Statement) -> bool {
    matches!(statement, Statement::Delete { .. })
}

pub fn is_select(statement: &Statement) -> bool {
    matches!(statement, Statement::Select { .. })
}

pub fn is_update(statement: &Statement) -> bool {
    matches!(statement, Statement::Update { .. })
}
