//! `#[derive(StreamClass)]` end to end.

mod common;

use common::reader;
use objstream_core::model::{FieldType, StreamType};
use objstream_core::{ClassRegistry, ObjectInputStream, ObjectOutputStream, StreamClass, StreamError};

#[derive(StreamClass, Debug, Clone, PartialEq)]
#[stream(name = "com.example.Person", version = 1)]
struct Person {
    name: String,
    age: i32,
    #[stream(rename = "emailAddress")]
    email: Option<String>,
    tags: Vec<String>,
    #[stream(skip)]
    cached_hash: u64,
}

#[derive(StreamClass, Debug, PartialEq)]
#[stream(name = "com.example.Team")]
struct Team {
    lead: Person,
    members: Vec<Person>,
    #[stream(unshared)]
    motto: String,
    scores: Vec<i64>,
}

#[derive(StreamClass, Debug, PartialEq)]
struct Sample {
    flag: bool,
    level: i8,
    initial: u16,
    small: i16,
    ratio: f32,
    total: f64,
}

fn alice() -> Person {
    Person {
        name: "Alice".to_string(),
        age: 34,
        email: Some("alice@example.com".to_string()),
        tags: vec!["admin".to_string(), "ops".to_string()],
        cached_hash: 0xDEAD,
    }
}

fn bob() -> Person {
    Person {
        name: "Bob".to_string(),
        age: 27,
        email: None,
        tags: Vec::new(),
        cached_hash: 0,
    }
}

fn round_trip<T: StreamClass>(value: &T) -> T {
    let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
    out.write_object(value.to_object().unwrap()).unwrap();
    let bytes = out.into_inner().unwrap();

    let mut classes = ClassRegistry::new();
    classes
        .register_type::<Person>()
        .register_type::<Team>()
        .register_type::<Sample>();
    let mut input = ObjectInputStream::with_resolver(bytes.as_slice(), classes).unwrap();
    let read = input.read_object().unwrap();
    T::from_object(read.as_object().unwrap()).unwrap()
}

#[test]
fn test_class_definition_from_attributes() {
    let class = Person::class_definition();
    assert_eq!(class.name(), "com.example.Person");
    assert_eq!(class.serial_version(), Some(1));
    assert!(class.is_serializable());
    assert!(class.field("emailAddress").is_some());
    assert!(class.field("email").is_none());
    assert!(class.field("cached_hash").is_none());
    assert_eq!(
        class.field("tags").unwrap().field_type(),
        &FieldType::array_of(FieldType::string())
    );
    assert!(std::sync::Arc::ptr_eq(&class, &Person::class_definition()));
}

#[test]
fn test_default_class_name_is_struct_name() {
    assert_eq!(Sample::class_definition().name(), "Sample");
    assert_eq!(Sample::class_definition().serial_version(), None);
}

#[test]
fn test_unshared_attribute() {
    let class = Team::class_definition();
    assert!(class.field("motto").unwrap().is_unshared());
    assert!(!class.field("lead").unwrap().is_unshared());
}

#[test]
fn test_person_round_trip() {
    let copy = round_trip(&alice());
    assert_eq!(copy.name, "Alice");
    assert_eq!(copy.age, 34);
    assert_eq!(copy.email.as_deref(), Some("alice@example.com"));
    assert_eq!(copy.tags, ["admin", "ops"]);
    assert_eq!(copy.cached_hash, 0);

    assert_eq!(round_trip(&bob()), bob());
}

#[test]
fn test_nested_struct_round_trip() {
    let team = Team {
        lead: alice(),
        members: vec![bob(), Person { cached_hash: 0, ..alice() }],
        motto: "ship it".to_string(),
        scores: vec![3, -1, i64::MAX],
    };
    let copy = round_trip(&team);
    assert_eq!(copy.lead.name, "Alice");
    assert_eq!(copy.members.len(), 2);
    assert_eq!(copy.members[0], bob());
    assert_eq!(copy.motto, "ship it");
    assert_eq!(copy.scores, [3, -1, i64::MAX]);
}

#[test]
fn test_primitive_fields_round_trip() {
    let sample = Sample {
        flag: true,
        level: -8,
        initial: 'Z' as u16,
        small: 300,
        ratio: 0.5,
        total: -1.25,
    };
    assert_eq!(round_trip(&sample), sample);
}

#[test]
fn test_struct_as_stream_type() {
    assert_eq!(
        <Person as StreamType>::field_type(),
        FieldType::object("com.example.Person")
    );
    let value = alice().to_value().unwrap();
    assert_eq!(Person::from_value(value).unwrap().age, 34);
    assert!(matches!(
        Person::from_value(objstream_core::Value::Int(1)),
        Err(StreamError::InvalidObject(_))
    ));
}

#[test]
fn test_from_object_of_other_class_fails() {
    let sample = Sample {
        flag: false,
        level: 0,
        initial: 0,
        small: 0,
        ratio: 0.0,
        total: 0.0,
    };
    let object = sample.to_object().unwrap();
    assert!(matches!(
        Person::from_object(&object),
        Err(StreamError::Field { .. })
    ));
}

#[test]
fn test_reader_without_registration() {
    let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
    out.write_object(alice().to_object().unwrap()).unwrap();
    let bytes = out.into_inner().unwrap();

    let mut input = reader(&bytes, &[]);
    assert!(matches!(
        input.read_object(),
        Err(StreamError::ClassNotFound(_))
    ));
}
