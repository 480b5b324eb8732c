//! Arrays of primitives and references.

use super::{FieldType, Value};
use crate::error::{Result, StreamError};

/// Typed element storage of an array.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayData {
    /// `boolean[]`
    Boolean(Vec<bool>),
    /// `byte[]`
    Byte(Vec<i8>),
    /// `char[]`
    Char(Vec<u16>),
    /// `short[]`
    Short(Vec<i16>),
    /// `int[]`
    Int(Vec<i32>),
    /// `long[]`
    Long(Vec<i64>),
    /// `float[]`
    Float(Vec<f32>),
    /// `double[]`
    Double(Vec<f64>),
    /// Arrays of any reference type.
    Reference(Vec<Value>),
}

impl ArrayData {
    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        match self {
            ArrayData::Boolean(v) => v.len(),
            ArrayData::Byte(v) => v.len(),
            ArrayData::Char(v) => v.len(),
            ArrayData::Short(v) => v.len(),
            ArrayData::Int(v) => v.len(),
            ArrayData::Long(v) => v.len(),
            ArrayData::Float(v) => v.len(),
            ArrayData::Double(v) => v.len(),
            ArrayData::Reference(v) => v.len(),
        }
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn empty_for(component: &FieldType, capacity: usize) -> Self {
        match component {
            FieldType::Boolean => ArrayData::Boolean(Vec::with_capacity(capacity)),
            FieldType::Byte => ArrayData::Byte(Vec::with_capacity(capacity)),
            FieldType::Char => ArrayData::Char(Vec::with_capacity(capacity)),
            FieldType::Short => ArrayData::Short(Vec::with_capacity(capacity)),
            FieldType::Int => ArrayData::Int(Vec::with_capacity(capacity)),
            FieldType::Long => ArrayData::Long(Vec::with_capacity(capacity)),
            FieldType::Float => ArrayData::Float(Vec::with_capacity(capacity)),
            FieldType::Double => ArrayData::Double(Vec::with_capacity(capacity)),
            FieldType::Object(_) | FieldType::Array(_) => {
                ArrayData::Reference(Vec::with_capacity(capacity))
            }
        }
    }

    fn matches(&self, component: &FieldType) -> bool {
        matches!(
            (self, component),
            (ArrayData::Boolean(_), FieldType::Boolean)
                | (ArrayData::Byte(_), FieldType::Byte)
                | (ArrayData::Char(_), FieldType::Char)
                | (ArrayData::Short(_), FieldType::Short)
                | (ArrayData::Int(_), FieldType::Int)
                | (ArrayData::Long(_), FieldType::Long)
                | (ArrayData::Float(_), FieldType::Float)
                | (ArrayData::Double(_), FieldType::Double)
                | (ArrayData::Reference(_), FieldType::Object(_) | FieldType::Array(_))
        )
    }
}

/// An array object: a component type and its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    component: FieldType,
    data: ArrayData,
}

impl Array {
    /// Creates an array of `len` zero or null elements.
    pub fn new(component: FieldType, len: usize) -> Self {
        let data = match &component {
            FieldType::Boolean => ArrayData::Boolean(vec![false; len]),
            FieldType::Byte => ArrayData::Byte(vec![0; len]),
            FieldType::Char => ArrayData::Char(vec![0; len]),
            FieldType::Short => ArrayData::Short(vec![0; len]),
            FieldType::Int => ArrayData::Int(vec![0; len]),
            FieldType::Long => ArrayData::Long(vec![0; len]),
            FieldType::Float => ArrayData::Float(vec![0.0; len]),
            FieldType::Double => ArrayData::Double(vec![0.0; len]),
            FieldType::Object(_) | FieldType::Array(_) => {
                ArrayData::Reference(vec![Value::Null; len])
            }
        };
        Self { component, data }
    }

    /// Creates an empty array with room for `capacity` elements.
    pub(crate) fn with_capacity(component: FieldType, capacity: usize) -> Self {
        let data = ArrayData::empty_for(&component, capacity);
        Self { component, data }
    }

    /// Appends an element to an array being filled by the decoder.
    pub(crate) fn push(&mut self, value: Value) -> Result<()> {
        let component = &self.component;
        match (&mut self.data, value) {
            (ArrayData::Boolean(v), Value::Boolean(x)) => v.push(x),
            (ArrayData::Byte(v), Value::Byte(x)) => v.push(x),
            (ArrayData::Char(v), Value::Char(x)) => v.push(x),
            (ArrayData::Short(v), Value::Short(x)) => v.push(x),
            (ArrayData::Int(v), Value::Int(x)) => v.push(x),
            (ArrayData::Long(v), Value::Long(x)) => v.push(x),
            (ArrayData::Float(v), Value::Float(x)) => v.push(x),
            (ArrayData::Double(v), Value::Double(x)) => v.push(x),
            (ArrayData::Reference(v), x @ (Value::Null | Value::Object(_))) => v.push(x),
            (_, other) => {
                return Err(StreamError::InvalidObject(format!(
                    "cannot store {} in array of {}",
                    other.type_name(),
                    component
                )))
            }
        }
        Ok(())
    }

    /// Creates an array from existing element storage.
    pub fn from_data(component: FieldType, data: ArrayData) -> Result<Self> {
        if !data.matches(&component) {
            return Err(StreamError::InvalidObject(format!(
                "array data does not hold elements of type {}",
                component
            )));
        }
        Ok(Self { component, data })
    }

    /// Creates a reference array.
    pub fn of_references(component: FieldType, elements: Vec<Value>) -> Result<Self> {
        Self::from_data(component, ArrayData::Reference(elements))
    }

    /// Creates an array by converting each value to the component's element kind.
    pub fn from_values(component: FieldType, values: Vec<Value>) -> Result<Self> {
        let mut array = Array::new(component, values.len());
        for (index, value) in values.into_iter().enumerate() {
            array.set(index, value)?;
        }
        Ok(array)
    }

    /// Creates a `String[]`.
    pub fn of_strings<I, S>(strings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            component: FieldType::string(),
            data: ArrayData::Reference(strings.into_iter().map(Value::string).collect()),
        }
    }

    /// Returns the component type.
    pub fn component(&self) -> &FieldType {
        &self.component
    }

    /// Returns the array's class name, e.g. `[I`.
    pub fn class_name(&self) -> String {
        FieldType::array_of(self.component.clone()).class_name()
    }

    /// Returns the element storage.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Returns the element storage mutably.
    pub fn data_mut(&mut self) -> &mut ArrayData {
        &mut self.data
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if there are no elements.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns element `index` as a value.
    pub fn get(&self, index: usize) -> Option<Value> {
        Some(match &self.data {
            ArrayData::Boolean(v) => Value::Boolean(*v.get(index)?),
            ArrayData::Byte(v) => Value::Byte(*v.get(index)?),
            ArrayData::Char(v) => Value::Char(*v.get(index)?),
            ArrayData::Short(v) => Value::Short(*v.get(index)?),
            ArrayData::Int(v) => Value::Int(*v.get(index)?),
            ArrayData::Long(v) => Value::Long(*v.get(index)?),
            ArrayData::Float(v) => Value::Float(*v.get(index)?),
            ArrayData::Double(v) => Value::Double(*v.get(index)?),
            ArrayData::Reference(v) => v.get(index)?.clone(),
        })
    }

    /// Replaces element `index`.
    pub fn set(&mut self, index: usize, value: Value) -> Result<()> {
        let len = self.len();
        let mismatch = |value: &Value| {
            StreamError::InvalidObject(format!(
                "cannot store {} in array of {}",
                value.type_name(),
                self.component
            ))
        };
        let slot_missing = || StreamError::InvalidObject(format!("index {} out of bounds for length {}", index, len));
        match (&mut self.data, value) {
            (ArrayData::Boolean(v), Value::Boolean(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Byte(v), Value::Byte(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Char(v), Value::Char(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Short(v), Value::Short(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Int(v), Value::Int(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Long(v), Value::Long(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Float(v), Value::Float(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Double(v), Value::Double(x)) => *v.get_mut(index).ok_or_else(slot_missing)? = x,
            (ArrayData::Reference(v), x @ (Value::Null | Value::Object(_))) => {
                *v.get_mut(index).ok_or_else(slot_missing)? = x
            }
            (_, other) => return Err(mismatch(&other)),
        }
        Ok(())
    }
}

macro_rules! array_from_vec {
    ($($ty:ty => $variant:ident, $field_type:expr);* $(;)?) => {
        $(
            impl From<Vec<$ty>> for Array {
                fn from(v: Vec<$ty>) -> Self {
                    Array {
                        component: $field_type,
                        data: ArrayData::$variant(v),
                    }
                }
            }
        )*
    };
}

array_from_vec! {
    bool => Boolean, FieldType::Boolean;
    i8 => Byte, FieldType::Byte;
    u16 => Char, FieldType::Char;
    i16 => Short, FieldType::Short;
    i32 => Int, FieldType::Int;
    i64 => Long, FieldType::Long;
    f32 => Float, FieldType::Float;
    f64 => Double, FieldType::Double;
}
