//! Declared types of fields and array components.

use std::fmt;

use crate::error::{Result, StreamError};

/// Name of the builtin string class.
pub const STRING_CLASS: &str = "java.lang.String";

/// Name of the root class every class implicitly extends.
pub const OBJECT_CLASS: &str = "java.lang.Object";

/// Most array dimensions a type signature may declare.
pub const MAX_ARRAY_DIMENSIONS: usize = 255;

/// The declared type of a field or array component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldType {
    /// `Z`: boolean.
    Boolean,
    /// `B`: signed 8-bit integer.
    Byte,
    /// `C`: UTF-16 code unit.
    Char,
    /// `S`: signed 16-bit integer.
    Short,
    /// `I`: signed 32-bit integer.
    Int,
    /// `J`: signed 64-bit integer.
    Long,
    /// `F`: 32-bit floating point.
    Float,
    /// `D`: 64-bit floating point.
    Double,
    /// `L`: reference to an instance of the named class.
    Object(String),
    /// `[`: reference to an array of the component type.
    Array(Box<FieldType>),
}

impl FieldType {
    /// Reference type for the named class.
    pub fn object(class_name: impl Into<String>) -> Self {
        FieldType::Object(class_name.into())
    }

    /// Reference type for strings.
    pub fn string() -> Self {
        FieldType::Object(STRING_CLASS.to_string())
    }

    /// Array type with the given component.
    pub fn array_of(component: FieldType) -> Self {
        FieldType::Array(Box::new(component))
    }

    /// Parses a primitive type code.
    pub fn from_primitive_code(code: u8) -> Option<Self> {
        match code {
            b'Z' => Some(FieldType::Boolean),
            b'B' => Some(FieldType::Byte),
            b'C' => Some(FieldType::Char),
            b'S' => Some(FieldType::Short),
            b'I' => Some(FieldType::Int),
            b'J' => Some(FieldType::Long),
            b'F' => Some(FieldType::Float),
            b'D' => Some(FieldType::Double),
            _ => None,
        }
    }

    /// Returns the one-byte type code written in field descriptors.
    pub fn type_code(&self) -> u8 {
        match self {
            FieldType::Boolean => b'Z',
            FieldType::Byte => b'B',
            FieldType::Char => b'C',
            FieldType::Short => b'S',
            FieldType::Int => b'I',
            FieldType::Long => b'J',
            FieldType::Float => b'F',
            FieldType::Double => b'D',
            FieldType::Object(_) => b'L',
            FieldType::Array(_) => b'[',
        }
    }

    /// Returns true for the eight fixed-width primitive kinds.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, FieldType::Object(_) | FieldType::Array(_))
    }

    /// Width in bytes of a primitive value; zero for references.
    pub fn primitive_size(&self) -> usize {
        match self {
            FieldType::Boolean | FieldType::Byte => 1,
            FieldType::Char | FieldType::Short => 2,
            FieldType::Int | FieldType::Float => 4,
            FieldType::Long | FieldType::Double => 8,
            FieldType::Object(_) | FieldType::Array(_) => 0,
        }
    }

    /// Returns the type signature, e.g. `I`, `Ljava/lang/String;`, `[[J`.
    pub fn signature(&self) -> String {
        let mut out = String::new();
        self.push_signature(&mut out, '/');
        out
    }

    fn push_signature(&self, out: &mut String, separator: char) {
        match self {
            FieldType::Object(name) => {
                out.push('L');
                out.extend(name.chars().map(|c| if c == '.' { separator } else { c }));
                out.push(';');
            }
            FieldType::Array(component) => {
                out.push('[');
                component.push_signature(out, separator);
            }
            primitive => out.push(primitive.type_code() as char),
        }
    }

    /// Returns the class name of this type.
    ///
    /// Primitive types use their keyword (`int`), reference types their
    /// dotted name, and array types the dotted signature (`[Ljava.lang.String;`).
    pub fn class_name(&self) -> String {
        match self {
            FieldType::Boolean => "boolean".to_string(),
            FieldType::Byte => "byte".to_string(),
            FieldType::Char => "char".to_string(),
            FieldType::Short => "short".to_string(),
            FieldType::Int => "int".to_string(),
            FieldType::Long => "long".to_string(),
            FieldType::Float => "float".to_string(),
            FieldType::Double => "double".to_string(),
            FieldType::Object(name) => name.clone(),
            FieldType::Array(_) => {
                let mut out = String::new();
                self.push_signature(&mut out, '.');
                out
            }
        }
    }

    /// Parses a type signature. Class names may use `/` or `.` separators.
    pub fn from_signature(signature: &str) -> Result<Self> {
        let bytes = signature.as_bytes();
        let (field_type, consumed) = Self::parse_at(bytes, 0)
            .ok_or_else(|| malformed_signature(signature))?;
        if consumed != bytes.len() {
            return Err(malformed_signature(signature));
        }
        Ok(field_type)
    }

    /// Parses an array class name such as `[I` or `[Ljava.lang.String;`.
    pub fn from_array_class_name(name: &str) -> Result<Self> {
        match Self::from_signature(name)? {
            array @ FieldType::Array(_) => Ok(array),
            _ => Err(malformed_signature(name)),
        }
    }

    fn parse_at(bytes: &[u8], pos: usize) -> Option<(Self, usize)> {
        let dimensions = bytes[pos..].iter().take_while(|&&b| b == b'[').count();
        if dimensions > MAX_ARRAY_DIMENSIONS {
            return None;
        }
        let pos = pos + dimensions;
        let code = *bytes.get(pos)?;
        let (mut field_type, next) = match Self::from_primitive_code(code) {
            Some(primitive) => (primitive, pos + 1),
            None if code == b'L' => {
                let end = pos + 1 + bytes[pos + 1..].iter().position(|&b| b == b';')?;
                if end == pos + 1 {
                    return None;
                }
                let name = std::str::from_utf8(&bytes[pos + 1..end]).ok()?.replace('/', ".");
                (FieldType::Object(name), end + 1)
            }
            None => return None,
        };
        for _ in 0..dimensions {
            field_type = FieldType::array_of(field_type);
        }
        Some((field_type, next))
    }

    /// Returns the component type if this is an array type.
    pub fn component(&self) -> Option<&FieldType> {
        match self {
            FieldType::Array(component) => Some(component),
            _ => None,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name())
    }
}

fn malformed_signature(signature: &str) -> StreamError {
    let shown: String = signature.chars().take(64).collect();
    StreamError::StreamCorrupted(format!("malformed type signature: {:?}", shown))
}
