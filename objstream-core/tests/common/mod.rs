//! Common fixtures for the stream integration tests.

#![allow(dead_code)]

use objstream_core::model::{ClassDefinition, ClassRef, FieldType, ObjectRef, Value};
use objstream_core::{ClassRegistry, ObjectInputStream, ObjectOutputStream, StreamConfig};

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// `com.example.Point { int x; int y; String label; }`
pub fn point_class() -> ClassRef {
    ClassDefinition::builder("com.example.Point")
        .serializable()
        .field("x", FieldType::Int)
        .field("y", FieldType::Int)
        .field("label", FieldType::string())
        .build()
}

/// `com.example.Node { int value; Node next; }`
pub fn node_class() -> ClassRef {
    ClassDefinition::builder("com.example.Node")
        .serializable()
        .field("value", FieldType::Int)
        .field("next", FieldType::object("com.example.Node"))
        .build()
}

/// `com.example.Pair { Object first; Object second; }`
pub fn pair_class() -> ClassRef {
    ClassDefinition::builder("com.example.Pair")
        .serializable()
        .field("first", FieldType::object("java.lang.Object"))
        .field("second", FieldType::object("java.lang.Object"))
        .build()
}

pub fn point(class: &ClassRef, x: i32, y: i32, label: &str) -> ObjectRef {
    let p = ObjectRef::instance(class);
    p.set_field("x", x).unwrap();
    p.set_field("y", y).unwrap();
    p.set_field("label", label).unwrap();
    p
}

pub fn pair(class: &ClassRef, first: impl Into<Value>, second: impl Into<Value>) -> ObjectRef {
    let p = ObjectRef::instance(class);
    p.set_field("first", first).unwrap();
    p.set_field("second", second).unwrap();
    p
}

pub fn registry(classes: &[&ClassRef]) -> ClassRegistry {
    let mut registry = ClassRegistry::new();
    for class in classes {
        registry.register(class);
    }
    registry
}

/// Writes each value with `write_object` and returns the stream bytes.
pub fn write_all(values: &[Value]) -> Vec<u8> {
    write_all_with(values, StreamConfig::default())
}

pub fn write_all_with(values: &[Value], config: StreamConfig) -> Vec<u8> {
    let mut out = ObjectOutputStream::with_config(Vec::new(), config).unwrap();
    for value in values {
        out.write_object(value.clone()).unwrap();
    }
    out.into_inner().unwrap()
}

pub fn reader(bytes: &[u8], classes: &[&ClassRef]) -> ObjectInputStream<std::io::Cursor<Vec<u8>>> {
    ObjectInputStream::with_resolver(std::io::Cursor::new(bytes.to_vec()), registry(classes))
        .unwrap()
}

/// Writes `values`, then reads back as many values with `classes` resolvable.
pub fn round_trip(values: &[Value], classes: &[&ClassRef]) -> Vec<Value> {
    let bytes = write_all(values);
    let mut input = reader(&bytes, classes);
    let read = values.iter().map(|_| input.read_object().unwrap()).collect();
    assert!(input.try_read_object().unwrap().is_none());
    read
}

pub fn round_trip_one(value: impl Into<Value>, classes: &[&ClassRef]) -> Value {
    round_trip(&[value.into()], classes).remove(0)
}

pub fn object(value: &Value) -> &ObjectRef {
    value.as_object().expect("expected an object")
}

pub fn int_field(object: &ObjectRef, name: &str) -> i32 {
    object
        .get_field(name)
        .and_then(|v| v.as_int())
        .unwrap_or_else(|| panic!("no int field {}", name))
}

pub fn string_field(object: &ObjectRef, name: &str) -> Option<String> {
    object.get_field(name).and_then(|v| v.as_str())
}
