//! Conversions between Rust values and stream values.
//!
//! [`StreamType`] maps a Rust type onto a [`FieldType`] and converts in both
//! directions; [`StreamClass`] does the same for whole structs and is usually
//! derived with `#[derive(StreamClass)]`.

use super::{Array, ClassRef, FieldType, Object, ObjectRef, Value};
use crate::error::{Result, StreamError};

/// A Rust type that can be stored in a field or array element.
pub trait StreamType: Sized {
    /// Returns the declared type of a field holding `Self`.
    fn field_type() -> FieldType;

    /// Converts to a stream value.
    fn to_value(&self) -> Result<Value>;

    /// Converts from a stream value.
    fn from_value(value: Value) -> Result<Self>;
}

/// A Rust struct that maps onto a serializable class.
pub trait StreamClass: Sized {
    /// Returns the class definition, built once per process.
    fn class_definition() -> ClassRef;

    /// Builds a fresh instance holding this struct's fields.
    fn to_object(&self) -> Result<ObjectRef>;

    /// Reads this struct back from an instance of its class.
    fn from_object(object: &ObjectRef) -> Result<Self>;
}

fn mismatch(expected: &FieldType, found: &Value) -> StreamError {
    let found = match found {
        Value::Object(obj) => obj.class_name(),
        other => other.type_name().to_string(),
    };
    StreamError::InvalidObject(format!("expected {}, found {}", expected, found))
}

macro_rules! primitive_stream_type {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl StreamType for $ty {
                fn field_type() -> FieldType {
                    FieldType::$variant
                }

                fn to_value(&self) -> Result<Value> {
                    Ok(Value::$variant(*self))
                }

                fn from_value(value: Value) -> Result<Self> {
                    match value {
                        Value::$variant(v) => Ok(v),
                        other => Err(mismatch(&FieldType::$variant, &other)),
                    }
                }
            }
        )*
    };
}

primitive_stream_type! {
    bool => Boolean,
    i8 => Byte,
    u16 => Char,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
}

impl StreamType for String {
    fn field_type() -> FieldType {
        FieldType::string()
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::string(self.as_str()))
    }

    fn from_value(value: Value) -> Result<Self> {
        value
            .as_str()
            .ok_or_else(|| mismatch(&FieldType::string(), &value))
    }
}

/// `None` is the null reference. Only reference types may be optional.
impl<T: StreamType> StreamType for Option<T> {
    fn field_type() -> FieldType {
        T::field_type()
    }

    fn to_value(&self) -> Result<Value> {
        match self {
            Some(inner) => inner.to_value(),
            None if T::field_type().is_primitive() => Err(StreamError::InvalidObject(format!(
                "null cannot be stored as {}",
                T::field_type()
            ))),
            None => Ok(Value::Null),
        }
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: StreamType> StreamType for Vec<T> {
    fn field_type() -> FieldType {
        FieldType::array_of(T::field_type())
    }

    fn to_value(&self) -> Result<Value> {
        let elements = self.iter().map(T::to_value).collect::<Result<Vec<_>>>()?;
        let array = Array::from_values(T::field_type(), elements)?;
        Ok(Value::Object(ObjectRef::array(array)))
    }

    fn from_value(value: Value) -> Result<Self> {
        let elements: Vec<Value> = match &value {
            Value::Object(obj) => match &*obj.read() {
                Object::Array(array) => (0..array.len()).filter_map(|i| array.get(i)).collect(),
                _ => return Err(mismatch(&Self::field_type(), &value)),
            },
            _ => return Err(mismatch(&Self::field_type(), &value)),
        };
        elements.into_iter().map(T::from_value).collect()
    }
}

/// Reads a field for a derived [`StreamClass`], failing if it is absent.
pub fn required_field<T: StreamType>(object: &ObjectRef, name: &str) -> Result<T> {
    let value = object
        .get_field(name)
        .ok_or_else(|| StreamError::field(name, format!("missing on {}", object.class_name())))?;
    T::from_value(value).map_err(|e| StreamError::field(name, e.to_string()))
}
