//! Reading streams written by a different version of a class.

mod common;

use common::*;
use objstream_core::model::{ClassDefinition, ClassRef, Externalizable, FieldType, ObjectRef, Value};
use objstream_core::{ObjectInput, ObjectOutput, Result, StreamError};

fn versioned(fields: &[(&str, FieldType)], version: Option<i64>) -> ClassRef {
    let mut builder = ClassDefinition::builder("com.example.Record").serializable();
    for (name, field_type) in fields {
        builder = builder.field(*name, field_type.clone());
    }
    if let Some(version) = version {
        builder = builder.serial_version(version);
    }
    builder.build()
}

fn read_single(bytes: &[u8], local: &ClassRef) -> Result<Value> {
    reader(bytes, &[local]).read_object()
}

#[test]
fn test_field_added_locally_is_defaulted() {
    let old = versioned(&[("a", FieldType::Int)], Some(1));
    let new = versioned(
        &[("a", FieldType::Int), ("b", FieldType::string()), ("c", FieldType::Long)],
        Some(1),
    );
    let record = ObjectRef::instance(&old);
    record.set_field("a", 11).unwrap();
    let bytes = write_all(&[record.into()]);

    let copy = read_single(&bytes, &new).unwrap();
    let copy = object(&copy);
    assert_eq!(int_field(copy, "a"), 11);
    assert_eq!(copy.get_field("b"), Some(Value::Null));
    assert_eq!(copy.get_field("c"), Some(Value::Long(0)));
}

#[test]
fn test_field_removed_locally_is_discarded() {
    let old = versioned(
        &[
            ("a", FieldType::Int),
            ("gone", FieldType::string()),
            ("weight", FieldType::Double),
        ],
        Some(1),
    );
    let new = versioned(&[("a", FieldType::Int)], Some(1));
    let record = ObjectRef::instance(&old);
    record.set_field("a", 3).unwrap();
    record.set_field("gone", "bye").unwrap();
    record.set_field("weight", 2.0f64).unwrap();
    let bytes = write_all(&[record.into(), Value::string("next")]);

    let mut input = reader(&bytes, &[&new]);
    let copy = input.read_object().unwrap();
    assert_eq!(int_field(object(&copy), "a"), 3);
    assert!(object(&copy).get_field("gone").is_none());
    assert_eq!(input.read_object().unwrap().as_str().as_deref(), Some("next"));
}

#[test]
fn test_explicit_version_mismatch() {
    let old = versioned(&[("a", FieldType::Int)], Some(1));
    let new = versioned(&[("a", FieldType::Int)], Some(2));
    let bytes = write_all(&[ObjectRef::instance(&old).into()]);

    match read_single(&bytes, &new) {
        Err(StreamError::InvalidClass { class, reason }) => {
            assert_eq!(class, "com.example.Record");
            assert!(reason.contains("stream version tag = 1"), "{}", reason);
            assert!(reason.contains("local version tag = 2"), "{}", reason);
        }
        other => panic!("expected InvalidClass, got {:?}", other),
    }
}

#[test]
fn test_computed_version_changes_with_shape() {
    let old = versioned(&[("a", FieldType::Int)], None);
    let new = versioned(&[("a", FieldType::Int), ("b", FieldType::Int)], None);
    let bytes = write_all(&[ObjectRef::instance(&old).into()]);

    assert!(matches!(
        read_single(&bytes, &new),
        Err(StreamError::InvalidClass { .. })
    ));

    let same = versioned(&[("a", FieldType::Int)], None);
    assert!(read_single(&bytes, &same).is_ok());
}

#[test]
fn test_primitive_field_type_change() {
    let old = versioned(&[("a", FieldType::Int)], Some(1));
    let new = versioned(&[("a", FieldType::Long)], Some(1));
    let bytes = write_all(&[ObjectRef::instance(&old).into()]);

    match read_single(&bytes, &new) {
        Err(StreamError::InvalidClass { reason, .. }) => {
            assert_eq!(reason, "incompatible types for field a");
        }
        other => panic!("expected InvalidClass, got {:?}", other),
    }
}

#[test]
fn test_reference_value_of_wrong_class() {
    let old = versioned(&[("o", FieldType::object("java.lang.Object"))], Some(1));
    let new = versioned(&[("o", FieldType::object("com.example.Point"))], Some(1));
    let record = ObjectRef::instance(&old);
    record.set_field("o", "not a point").unwrap();
    let bytes = write_all(&[record.into()]);

    assert!(matches!(
        read_single(&bytes, &new),
        Err(StreamError::Field { ref field, .. }) if field == "o"
    ));
}

#[test]
fn test_unknown_class() {
    let old = versioned(&[("a", FieldType::Int)], Some(1));
    let bytes = write_all(&[ObjectRef::instance(&old).into()]);

    let mut input = reader(&bytes, &[]);
    assert!(matches!(
        input.read_object(),
        Err(StreamError::ClassNotFound(ref name)) if name == "com.example.Record"
    ));
}

struct Opaque;

impl Externalizable for Opaque {
    fn write_external(&self, _this: &ObjectRef, _out: &mut dyn ObjectOutput) -> Result<()> {
        Ok(())
    }

    fn read_external(&self, _this: &ObjectRef, _input: &mut dyn ObjectInput) -> Result<()> {
        Ok(())
    }
}

#[test]
fn test_serializable_read_as_externalizable() {
    let old = versioned(&[("a", FieldType::Int)], Some(1));
    let new = ClassDefinition::builder("com.example.Record")
        .externalizable(Opaque)
        .serial_version(1)
        .build();
    let bytes = write_all(&[ObjectRef::instance(&old).into()]);

    match read_single(&bytes, &new) {
        Err(StreamError::InvalidClass { reason, .. }) => {
            assert_eq!(reason, "Serializable incompatible with Externalizable");
        }
        other => panic!("expected InvalidClass, got {:?}", other),
    }
}

#[test]
fn test_class_no_longer_serializable() {
    let old = versioned(&[("a", FieldType::Int)], Some(1));
    let new = ClassDefinition::builder("com.example.Record")
        .field("a", FieldType::Int)
        .build();
    let bytes = write_all(&[ObjectRef::instance(&old).into()]);

    match read_single(&bytes, &new) {
        Err(StreamError::InvalidClass { reason, .. }) => {
            assert_eq!(reason, "class invalid for deserialization");
        }
        other => panic!("expected InvalidClass, got {:?}", other),
    }
}

#[test]
fn test_superclass_removed_locally() {
    let base = ClassDefinition::builder("com.example.Base")
        .serializable()
        .field("b", FieldType::string())
        .build();
    let old = ClassDefinition::builder("com.example.Leaf")
        .superclass(base)
        .field("l", FieldType::Int)
        .serial_version(1)
        .build();
    let new = ClassDefinition::builder("com.example.Leaf")
        .serializable()
        .field("l", FieldType::Int)
        .serial_version(1)
        .build();
    let leaf = ObjectRef::instance(&old);
    leaf.set_field("b", "base data").unwrap();
    leaf.set_field("l", 6).unwrap();
    let bytes = write_all(&[leaf.into()]);

    let copy = read_single(&bytes, &new).unwrap();
    assert_eq!(int_field(object(&copy), "l"), 6);
}

#[test]
fn test_enum_constant_missing_locally() {
    let old = ClassDefinition::builder("com.example.Level")
        .enum_constants(["LOW", "HIGH"])
        .build();
    let new = ClassDefinition::builder("com.example.Level")
        .enum_constants(["LOW"])
        .build();
    let bytes = write_all(&[old.enum_constant("HIGH").unwrap().clone().into()]);

    assert!(matches!(
        read_single(&bytes, &new),
        Err(StreamError::InvalidObject(_))
    ));
}

#[test]
fn test_enum_read_as_plain_class() {
    let old = ClassDefinition::builder("com.example.Level")
        .enum_constants(["LOW"])
        .build();
    let new = ClassDefinition::builder("com.example.Level")
        .serializable()
        .build();
    let bytes = write_all(&[old.enum_constant("LOW").unwrap().clone().into()]);

    assert!(matches!(
        read_single(&bytes, &new),
        Err(StreamError::InvalidClass { .. })
    ));
}
