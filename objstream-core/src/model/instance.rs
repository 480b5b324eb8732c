//! Instance storage: one zeroed field block per class in the hierarchy.

use super::{ClassRef, FieldOffset, FieldType, Value};
use crate::error::{Result, StreamError};

/// The fields one class declares, for one instance.
#[derive(Debug, Clone)]
pub struct FieldBlock {
    class: ClassRef,
    primitives: Vec<u8>,
    references: Vec<Value>,
}

impl FieldBlock {
    fn zeroed(class: ClassRef) -> Self {
        let layout = class.layout();
        Self {
            primitives: vec![0; layout.primitive_bytes()],
            references: vec![Value::Null; layout.reference_slots()],
            class,
        }
    }

    /// Returns the declaring class.
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    fn read(&self, offset: FieldOffset, field_type: &FieldType) -> Option<Value> {
        match offset {
            FieldOffset::Reference(index) => self.references.get(index).cloned(),
            FieldOffset::Primitive(at) => {
                let bytes = self.primitives.get(at..at + field_type.primitive_size())?;
                Some(decode_primitive(bytes, field_type))
            }
        }
    }

    fn write(&mut self, offset: FieldOffset, value: Value) -> Option<()> {
        match offset {
            FieldOffset::Reference(index) => {
                *self.references.get_mut(index)? = value;
            }
            FieldOffset::Primitive(at) => {
                let encoded = encode_primitive(&value)?;
                self.primitives
                    .get_mut(at..at + encoded.len())?
                    .copy_from_slice(&encoded);
            }
        }
        Some(())
    }
}

fn decode_primitive(bytes: &[u8], field_type: &FieldType) -> Value {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    match field_type {
        FieldType::Boolean => Value::Boolean(buf[0] != 0),
        FieldType::Byte => Value::Byte(buf[0] as i8),
        FieldType::Char => Value::Char(u16::from_be_bytes([buf[0], buf[1]])),
        FieldType::Short => Value::Short(i16::from_be_bytes([buf[0], buf[1]])),
        FieldType::Int => Value::Int(i32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
        FieldType::Float => Value::Float(f32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])),
        FieldType::Long => Value::Long(i64::from_be_bytes(buf)),
        FieldType::Double => Value::Double(f64::from_be_bytes(buf)),
        FieldType::Object(_) | FieldType::Array(_) => Value::Null,
    }
}

fn encode_primitive(value: &Value) -> Option<Vec<u8>> {
    Some(match value {
        Value::Boolean(v) => vec![*v as u8],
        Value::Byte(v) => vec![*v as u8],
        Value::Char(v) => v.to_be_bytes().to_vec(),
        Value::Short(v) => v.to_be_bytes().to_vec(),
        Value::Int(v) => v.to_be_bytes().to_vec(),
        Value::Float(v) => v.to_be_bytes().to_vec(),
        Value::Long(v) => v.to_be_bytes().to_vec(),
        Value::Double(v) => v.to_be_bytes().to_vec(),
        Value::Null | Value::Object(_) => return None,
    })
}

/// Fails unless `value` may be stored in a field of `field_type`.
///
/// Reference values are checked against their class, which locks them for
/// reading.
pub(crate) fn check_conforms(name: &str, value: &Value, field_type: &FieldType) -> Result<()> {
    if value.conforms_to(field_type) {
        Ok(())
    } else {
        Err(type_mismatch(name, value, field_type))
    }
}

fn check_kind(name: &str, value: &Value, field_type: &FieldType) -> Result<()> {
    let ok = if field_type.is_primitive() {
        value.conforms_to(field_type)
    } else {
        matches!(value, Value::Null | Value::Object(_))
    };
    if ok {
        Ok(())
    } else {
        Err(type_mismatch(name, value, field_type))
    }
}

fn type_mismatch(name: &str, value: &Value, field_type: &FieldType) -> StreamError {
    let found = match value {
        Value::Object(obj) => obj.class_name(),
        other => other.type_name().to_string(),
    };
    StreamError::field(
        name,
        format!("cannot assign {} to field of type {}", found, field_type),
    )
}

/// An instance of a user class.
///
/// Storage is allocated for every class in the hierarchy, root first, with
/// all fields at their zero value until assigned.
#[derive(Debug, Clone)]
pub struct Instance {
    class: ClassRef,
    levels: Vec<FieldBlock>,
}

impl Instance {
    /// Allocates zeroed storage for `class` without running any constructor.
    pub fn new(class: &ClassRef) -> Self {
        Self {
            class: class.clone(),
            levels: class.lineage().into_iter().map(FieldBlock::zeroed).collect(),
        }
    }

    /// Returns the concrete class.
    pub fn class(&self) -> &ClassRef {
        &self.class
    }

    /// Returns the per-class storage blocks, root first.
    pub fn levels(&self) -> &[FieldBlock] {
        &self.levels
    }

    fn locate(&self, name: &str) -> Option<(usize, FieldOffset, FieldType)> {
        self.levels.iter().enumerate().rev().find_map(|(level, block)| {
            let field = block.class.field(name)?;
            let offset = block.class.layout().offset(name)?;
            Some((level, offset, field.field_type().clone()))
        })
    }

    fn locate_declared(&self, class_name: &str, name: &str) -> Option<(usize, FieldOffset, FieldType)> {
        let level = self.levels.iter().position(|b| b.class.name() == class_name)?;
        let class = &self.levels[level].class;
        let field = class.field(name)?;
        let offset = class.layout().offset(name)?;
        Some((level, offset, field.field_type().clone()))
    }

    /// Returns the declared type of an instance field; the most derived
    /// declaration wins when names are shadowed.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.locate(name).map(|(_, _, field_type)| field_type)
    }

    /// Reads an instance field by name.
    pub fn get(&self, name: &str) -> Option<Value> {
        let (level, offset, field_type) = self.locate(name)?;
        self.read_slot(level, offset, &field_type)
    }

    /// Assigns an instance field by name.
    ///
    /// Reference values are type-checked, which reads the referenced object;
    /// use [`ObjectRef::set_field`](super::ObjectRef::set_field) when the
    /// value may be the object that owns this instance.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (level, offset, field_type) = self
            .locate(name)
            .ok_or_else(|| StreamError::field(name, "no such field"))?;
        check_conforms(name, &value, &field_type)?;
        self.write_slot(level, offset, &field_type, value)
    }

    pub(crate) fn set_unchecked(&mut self, name: &str, value: Value) -> Result<()> {
        let (level, offset, field_type) = self
            .locate(name)
            .ok_or_else(|| StreamError::field(name, "no such field"))?;
        self.write_slot(level, offset, &field_type, value)
    }

    /// Reads the field `name` declared by the ancestor `class_name`.
    pub fn get_declared(&self, class_name: &str, name: &str) -> Option<Value> {
        let (level, offset, field_type) = self.locate_declared(class_name, name)?;
        self.read_slot(level, offset, &field_type)
    }

    /// Assigns the field `name` declared by the ancestor `class_name`.
    pub fn set_declared(
        &mut self,
        class_name: &str,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<()> {
        let value = value.into();
        let (level, offset, field_type) = self
            .locate_declared(class_name, name)
            .ok_or_else(|| StreamError::field(name, format!("not declared by {}", class_name)))?;
        check_conforms(name, &value, &field_type)?;
        self.write_slot(level, offset, &field_type, value)
    }

    pub(crate) fn read_slot(
        &self,
        level: usize,
        offset: FieldOffset,
        field_type: &FieldType,
    ) -> Option<Value> {
        self.levels.get(level)?.read(offset, field_type)
    }

    /// Stores a value whose reference type has already been checked.
    pub(crate) fn write_slot(
        &mut self,
        level: usize,
        offset: FieldOffset,
        field_type: &FieldType,
        value: Value,
    ) -> Result<()> {
        check_kind("<slot>", &value, field_type)?;
        self.levels
            .get_mut(level)
            .and_then(|block| block.write(offset, value))
            .ok_or_else(|| {
                StreamError::field("<slot>", format!("no storage at level {} {:?}", level, offset))
            })
    }
}
