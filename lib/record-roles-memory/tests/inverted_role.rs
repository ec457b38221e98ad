#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{is_delete, is_insert, is_update, models, store, tables_of};
use pretty_assertions::assert_eq;
use record_roles_memory::{MemoryStore, Record, RecordError, RoleBehavior, Value};

fn saved_instructor(store: &mut MemoryStore, models: &common::Models, name: &str) -> Value {
    let mut instructor = Record::new(models.instructor.clone());
    instructor.set(store, "name", name).unwrap();
    instructor.set(store, "rankId", 1).unwrap();
    instructor.set(store, "salary", 1000).unwrap();
    instructor.save(store, false).unwrap();
    instructor.primary_key()
}

#[test]
fn behavior_runs_in_slave_mode() {
    let models = models();
    let behavior = models.instructor.behavior::<RoleBehavior>().unwrap();
    assert_eq!(behavior.relation(), "human");
    assert!(behavior.is_primary_slave());
}

#[test]
fn human_attributes_read_and_write_through_the_instructor() {
    let models = models();
    let store = store();
    let mut instructor = Record::new(models.instructor.clone());

    instructor.set(&store, "name", "John").unwrap();
    instructor.set(&store, "address", "Elm St").unwrap();

    assert_eq!(instructor.get(&store, "name").unwrap(), Value::from("John"));
    assert_eq!(
        instructor.get(&store, "displayName").unwrap(),
        Value::from("John (Human)")
    );
    assert_eq!(instructor.attribute("name"), None);
    assert!(instructor.can_set(&store, "address").unwrap());
    assert!(!instructor.can_set(&store, "displayName").unwrap());
}

#[test]
fn human_methods_are_callable_on_the_instructor() {
    let models = models();
    let store = store();
    let mut instructor = Record::new(models.instructor.clone());

    assert_eq!(
        instructor
            .call(&store, "sayHello", &[Value::from("John")])
            .unwrap(),
        Value::from("Hello, John")
    );
    assert!(matches!(
        instructor.call(&store, "study", &[]),
        Err(RecordError::UnknownMethod { ref model, .. }) if model == "Instructor"
    ));
}

#[test]
fn insert_stores_the_human_first() {
    let models = models();
    let mut store = store();
    let id = saved_instructor(&mut store, &models, "John");

    assert_eq!(tables_of(&store, is_insert), ["Human", "Instructor"]);

    let human = &store.rows("Human")[0];
    assert_eq!(human.get("id"), Some(&id));
    assert_eq!(human.get("name"), Some(&Value::from("John")));
    assert_eq!(human.get("role"), Some(&Value::from("instructor")));

    let instructor = &store.rows("Instructor")[0];
    assert_eq!(instructor.get("humanId"), Some(&id));
    assert_eq!(instructor.get("salary"), Some(&Value::Int(1000)));
}

#[test]
fn role_attribute_is_visible_through_the_instructor() {
    let models = models();
    let mut store = store();
    let id = saved_instructor(&mut store, &models, "John");

    let mut instructor = Record::find_one(&store, &models.instructor, id)
        .unwrap()
        .unwrap();
    assert_eq!(
        instructor.get(&store, "role").unwrap(),
        Value::from("instructor")
    );
}

#[test]
fn update_writes_the_human_row() {
    let models = models();
    let mut store = store();
    let id = saved_instructor(&mut store, &models, "John");

    let mut instructor = Record::find_one(&store, &models.instructor, id.clone())
        .unwrap()
        .unwrap();
    store.clear_journal();
    instructor.set(&store, "name", "new name").unwrap();
    instructor.save(&mut store, false).unwrap();

    assert_eq!(tables_of(&store, is_update), ["Human"]);
    assert_eq!(store.count("Human"), 1);
    assert_eq!(store.count("Instructor"), 1);

    let human = Record::find_one(&store, &models.human, id).unwrap().unwrap();
    assert_eq!(human.attribute("name"), Some(&Value::from("new name")));
}

#[test]
fn an_existing_human_can_take_the_instructor_role() {
    let models = models();
    let mut store = store();
    let mut human = Record::new(models.human.clone());
    human.set(&store, "name", "Ann").unwrap();
    human.set(&store, "address", "Main St").unwrap();
    human.save(&mut store, true).unwrap();

    let mut instructor = Record::new(models.instructor.clone());
    instructor
        .set_attribute("humanId", human.primary_key())
        .unwrap();
    assert_eq!(instructor.get(&store, "name").unwrap(), Value::from("Ann"));
    instructor.set(&store, "rankId", 2).unwrap();
    instructor.set(&store, "salary", 500).unwrap();
    instructor.save(&mut store, true).unwrap();

    assert_eq!(store.count("Human"), 1);
    assert_eq!(
        store.rows("Human")[0].get("role"),
        Some(&Value::from("instructor"))
    );
    assert_eq!(
        store.rows("Instructor")[0].get("humanId"),
        Some(&human.primary_key())
    );
}

#[test]
fn delete_removes_the_human_after_the_instructor() {
    let models = models();
    let mut store = store();
    let id = saved_instructor(&mut store, &models, "John");

    let mut instructor = Record::find_one(&store, &models.instructor, id)
        .unwrap()
        .unwrap();
    store.clear_journal();
    assert_eq!(instructor.delete(&mut store).unwrap(), 1);

    assert_eq!(tables_of(&store, is_delete), ["Instructor", "Human"]);
    assert_eq!(store.count("Human"), 0);
    assert_eq!(store.count("Instructor"), 0);
    assert!(!instructor.is_relation_populated("human"));
}

#[test]
fn validate_merges_human_errors() {
    let models = models();
    let store = store();
    let mut instructor = Record::new(models.instructor.clone());

    instructor.set(&store, "rankId", 1).unwrap();
    instructor.set(&store, "salary", 1000).unwrap();
    instructor.set(&store, "name", "John").unwrap();

    assert!(!instructor.validate());
    assert!(instructor.has_error("address"));
    assert!(!instructor.has_error("name"));
    assert!(!instructor.has_error("salary"));

    instructor.set(&store, "address", "Elm St").unwrap();
    assert!(instructor.validate());
}

#[test]
fn invalid_human_blocks_a_validated_save() {
    let models = models();
    let mut store = store();
    let mut instructor = Record::new(models.instructor.clone());

    instructor.set(&store, "rankId", 1).unwrap();
    instructor.set(&store, "salary", 1000).unwrap();
    instructor.set(&store, "name", "x".repeat(65)).unwrap();
    instructor.set(&store, "address", "Elm St").unwrap();

    let result = instructor.save(&mut store, true);

    assert!(matches!(result, Err(RecordError::ValidationFailed { .. })));
    assert_eq!(
        instructor.errors().first("name"),
        Some("name should contain at most 64 characters.")
    );
    assert_eq!(store.count("Human"), 0);
}
