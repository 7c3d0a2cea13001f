//! 实体与值对象的集成测试
//!
//! 只覆盖内存中的构造、校验和存储形式转换，不访问任何存储提供者

use std::collections::HashSet;

use rat_domain::model::MSG_REQUIRED;
use rat_domain::*;

struct Person;
impl Element for Person {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .field("first_name", string_field(Some(50)).required())
            .field("last_name", string_field(Some(50)))
            .field("age", integer_field(None, None).default_value(21))
    }
}

struct Adult;
impl Element for Adult {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>().extends::<Person>()
    }

    fn clean(values: &FieldValues) -> ErrorMessages {
        let mut errors = ErrorMessages::new();
        let age = values.get("age").and_then(DataValue::as_i64).unwrap_or(0);
        if age < 18 {
            errors.add("age", "Age of Adult should be at least 18.");
        }
        errors
    }
}

struct DbPerson;
impl Element for DbPerson {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .abstract_element()
            .field("first_name", string_field(Some(50)).required())
    }
}

struct SqlPerson;
impl Element for SqlPerson {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .extends::<DbPerson>()
            .schema_name("people")
            .field("email", string_field(Some(255)))
    }
}

struct PersonWithDerivedName;
impl Element for PersonWithDerivedName {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .field("first_name", string_field(Some(50)).required())
            .field("last_name", string_field(Some(50)).required())
            .field("full_name", string_field(Some(101)))
    }

    fn defaults(values: &mut FieldValues) -> DomainResult<()> {
        if values.is_absent("full_name") {
            let first = values.get("first_name").and_then(DataValue::as_str).unwrap_or("").to_string();
            let last = values.get("last_name").and_then(DataValue::as_str).unwrap_or("").to_string();
            values.set("full_name", format!("{} {}", first, last))?;
        }
        Ok(())
    }
}

struct Address;
impl Element for Address {
    fn declare() -> ElementDecl {
        ElementDecl::value_object::<Self>()
            .field("street", string_field(Some(100)).required())
            .field("zip", string_field(Some(10)).referenced_as("postal_code"))
    }
}

struct Building;
impl Element for Building {
    fn declare() -> ElementDecl {
        ElementDecl::aggregate::<Self>()
            .field("name", string_field(Some(50)).required())
            .field("floors", integer_field(Some(1), None))
            .field("address", value_object_field::<Address>())
    }
}

define_element! {
    struct Badge: aggregate {
        code: identifier_field(),
        level: integer_field(Some(1), Some(5)).default_value(1),
    }
}

#[test]
fn test_construction_applies_defaults() {
    let person = Entity::<Person>::new(data! {"first_name" => "John", "last_name" => "Doe"}).unwrap();
    assert_eq!(person.get("age"), Some(&DataValue::Int(21)));
    assert!(person.id().as_str().is_some());
    assert!(person.state().is_new());
    assert!(!person.state().is_persisted());
}

#[test]
fn test_required_field_and_unknown_key() {
    let err = Entity::<Person>::new(data! {"last_name" => "Doe"}).unwrap_err();
    let messages = err.messages().unwrap();
    assert_eq!(messages.get("first_name"), Some(&[MSG_REQUIRED.to_string()][..]));

    let err = Entity::<Person>::new(data! {"first_name" => "John", "nickname" => "JD"}).unwrap_err();
    assert!(matches!(err, DomainError::InvalidAttribute { ref name, .. } if name == "nickname"));
}

#[test]
fn test_errors_are_accumulated() {
    let err = Entity::<Building>::new(data! {"floors" => 0, "address" => data! {}}).unwrap_err();
    let fields: Vec<&str> = err.messages().unwrap().fields().collect();
    assert_eq!(fields, vec!["address_street", "floors", "name"]);
}

#[test]
fn test_inherited_fields_and_clean_hook() {
    let adult = Entity::<Adult>::new(data! {"first_name" => "Jane", "age" => 30}).unwrap();
    assert_eq!(adult.get("age"), Some(&DataValue::Int(30)));

    let err = Entity::<Adult>::new(data! {"first_name" => "Kid", "age" => 12}).unwrap_err();
    assert!(err.messages().unwrap().contains("age"));
}

#[test]
fn test_abstract_element_cannot_be_instantiated() {
    let err = Entity::<DbPerson>::new(data! {"first_name" => "John"}).unwrap_err();
    assert!(matches!(err, DomainError::IncorrectUsage { .. }));

    let person = Entity::<SqlPerson>::new(data! {"first_name" => "John", "email" => "john@example.com"}).unwrap();
    assert_eq!(person.meta().schema_name(), "people");
    assert!(!person.meta().is_abstract());
    let names: Vec<&str> = person.meta().fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id", "first_name", "email"]);
}

#[test]
fn test_defaults_hook_fills_derived_field() {
    let person =
        Entity::<PersonWithDerivedName>::new(data! {"first_name" => "John", "last_name" => "Doe"}).unwrap();
    assert_eq!(person.get("full_name"), Some(&DataValue::from("John Doe")));

    let explicit = Entity::<PersonWithDerivedName>::new(
        data! {"first_name" => "John", "last_name" => "Doe", "full_name" => "J. Doe"},
    )
    .unwrap();
    assert_eq!(explicit.get("full_name"), Some(&DataValue::from("J. Doe")));
}

#[test]
fn test_identities_are_distinct() {
    let ids: HashSet<String> = (0..1000)
        .map(|_| {
            Entity::<Person>::new(data! {"first_name" => "John"})
                .unwrap()
                .id()
                .to_string()
        })
        .collect();
    assert_eq!(ids.len(), 1000);
}

#[test]
fn test_equality_by_identity() {
    let first = Entity::<Person>::new(data! {"id" => "p-1", "first_name" => "John"}).unwrap();
    let second = Entity::<Person>::new(data! {"id" => "p-1", "first_name" => "Johnny"}).unwrap();
    let third = Entity::<Person>::new(data! {"first_name" => "John"}).unwrap();
    assert_eq!(first, second);
    assert_ne!(first, third);
    assert_eq!(first.to_string(), "Person object (p-1)");
}

#[test]
fn test_lifecycle_transitions() {
    let mut person = Entity::<Person>::new(data! {"first_name" => "John"}).unwrap();
    person.set("last_name", "Doe").unwrap();
    // 新建实体的修改不计为已修改
    assert!(!person.state().is_changed());

    person.state_mut().mark_saved();
    assert!(person.state().is_persisted());
    person.set("age", 40).unwrap();
    assert!(person.state().is_changed());

    person.state_mut().mark_destroyed();
    assert!(person.state().is_destroyed());
    assert!(!person.state().is_persisted());
}

#[test]
fn test_update_is_atomic() {
    let mut person = Entity::<Adult>::new(data! {"first_name" => "Jane", "age" => 30}).unwrap();
    let err = person
        .update(data! {"first_name" => "Janet", "age" => "thirty"})
        .unwrap_err();
    assert!(err.messages().unwrap().contains("age"));
    assert_eq!(person.get("first_name"), Some(&DataValue::from("Jane")));

    // 字段本身合法，但跨字段校验失败
    let err = person.update(data! {"age" => 10}).unwrap_err();
    assert!(matches!(err, DomainError::Validation { .. }));
    assert_eq!(person.get("age"), Some(&DataValue::Int(30)));

    person.update(data! {"first_name" => "Janet", "age" => 31}).unwrap();
    assert_eq!(person.get("first_name"), Some(&DataValue::from("Janet")));
}

#[test]
fn test_update_reports_field_and_clean_errors_together() {
    let mut person = Entity::<Adult>::new(data! {"first_name" => "Jane", "age" => 30}).unwrap();
    let err = person
        .update(data! {"first_name" => "J".repeat(60), "age" => 10})
        .unwrap_err();
    let fields: Vec<&str> = err.messages().unwrap().fields().collect();
    assert_eq!(fields, vec!["age", "first_name"]);
    assert_eq!(person.get("age"), Some(&DataValue::Int(30)));
}

#[test]
fn test_value_object_shadow_attributes() {
    let building = Entity::<Building>::new(data! {
        "name" => "Foo",
        "floors" => 4,
        "address" => data! {"street" => "1 Main St", "zip" => "12345"},
    })
    .unwrap();

    assert_eq!(
        building.attributes(),
        vec!["id", "name", "floors", "address_street", "postal_code"]
    );
    let record = building.to_storage();
    assert_eq!(record.get("address_street"), Some(&DataValue::from("1 Main St")));
    assert_eq!(record.get("postal_code"), Some(&DataValue::from("12345")));
    assert!(!record.contains_key("address"));

    let restored = Entity::<Building>::from_storage(record).unwrap();
    assert!(restored.state().is_persisted());
    assert_eq!(restored, building);
    assert_eq!(restored.to_dict(), building.to_dict());
}

#[test]
fn test_from_storage_ignores_unknown_attributes() {
    let mut record = Entity::<Person>::new(data! {"first_name" => "John"}).unwrap().to_storage();
    record.insert("legacy_column".to_string(), DataValue::from("x"));
    let person = Entity::<Person>::from_storage(record).unwrap();
    assert_eq!(person.get("first_name"), Some(&DataValue::from("John")));
    assert!(person.get("legacy_column").is_none());
}

#[test]
fn test_value_objects_compare_by_value() {
    let first = Container::<Address>::new(data! {"street" => "1 Main St"}).unwrap();
    let second = Container::<Address>::new(data! {"street" => "1 Main St"}).unwrap();
    assert_eq!(first.to_dict(), second.to_dict());

    let err = Entity::<Address>::new(data! {"street" => "1 Main St"}).unwrap_err();
    assert!(matches!(err, DomainError::IncorrectUsage { .. }));
}

#[test]
fn test_declared_element_macro() {
    let badge = Entity::<Badge>::new(data! {"code" => "B-1"}).unwrap();
    assert_eq!(badge.id(), DataValue::from("B-1"));
    assert_eq!(badge.get("level"), Some(&DataValue::Int(1)));

    let err = Entity::<Badge>::new(data! {"code" => "B-2", "level" => 9}).unwrap_err();
    assert!(err.messages().unwrap().contains("level"));
}
