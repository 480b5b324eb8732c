//! Values, shared object cells and object identity.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::field_type::{OBJECT_CLASS, STRING_CLASS};
use super::{builtins, Array, ClassDefinition, ClassRef, FieldType, Instance};
use crate::descriptor::TypeDescriptor;
use crate::error::{Result, StreamError};

/// A field value, array element or top-level stream value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// The null reference.
    #[default]
    Null,
    /// `boolean`.
    Boolean(bool),
    /// `byte`.
    Byte(i8),
    /// `char`, as a UTF-16 code unit.
    Char(u16),
    /// `short`.
    Short(i16),
    /// `int`.
    Int(i32),
    /// `long`.
    Long(i64),
    /// `float`.
    Float(f32),
    /// `double`.
    Double(f64),
    /// A non-null reference. Equality is identity.
    Object(ObjectRef),
}

impl Value {
    /// Creates a new string object.
    pub fn string(s: impl Into<String>) -> Self {
        Value::Object(ObjectRef::string(s))
    }

    /// Returns the zero value for a field type.
    pub fn default_for(field_type: &FieldType) -> Self {
        match field_type {
            FieldType::Boolean => Value::Boolean(false),
            FieldType::Byte => Value::Byte(0),
            FieldType::Char => Value::Char(0),
            FieldType::Short => Value::Short(0),
            FieldType::Int => Value::Int(0),
            FieldType::Long => Value::Long(0),
            FieldType::Float => Value::Float(0.0),
            FieldType::Double => Value::Double(0.0),
            FieldType::Object(_) | FieldType::Array(_) => Value::Null,
        }
    }

    /// Returns true for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true for the eight primitive variants.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, Value::Null | Value::Object(_))
    }

    /// Returns the referenced object, if any.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Returns the contents of a string object.
    pub fn as_str(&self) -> Option<String> {
        self.as_object().and_then(ObjectRef::as_string)
    }

    /// Returns the value of an `int`.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value of a `long`.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value of a `boolean`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the value of a `double`.
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns true if this value may be stored in a field of `field_type`.
    pub fn conforms_to(&self, field_type: &FieldType) -> bool {
        match (self, field_type) {
            (Value::Boolean(_), FieldType::Boolean)
            | (Value::Byte(_), FieldType::Byte)
            | (Value::Char(_), FieldType::Char)
            | (Value::Short(_), FieldType::Short)
            | (Value::Int(_), FieldType::Int)
            | (Value::Long(_), FieldType::Long)
            | (Value::Float(_), FieldType::Float)
            | (Value::Double(_), FieldType::Double) => true,
            (Value::Null, FieldType::Object(_) | FieldType::Array(_)) => true,
            (Value::Object(obj), FieldType::Object(_) | FieldType::Array(_)) => {
                obj.read().is_instance_of(field_type)
            }
            _ => false,
        }
    }

    /// Short name of the variant, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Byte(_) => "byte",
            Value::Char(_) => "char",
            Value::Short(_) => "short",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Object(_) => "object",
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )*
    };
}

value_from! {
    bool => Boolean,
    i8 => Byte,
    i16 => Short,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    ObjectRef => Object,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<Option<ObjectRef>> for Value {
    fn from(v: Option<ObjectRef>) -> Self {
        v.map_or(Value::Null, Value::Object)
    }
}

/// Identity of an object for back-reference detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity(usize);

impl Identity {
    /// Identity of the allocation behind an `Arc`.
    pub fn of<T: ?Sized>(arc: &Arc<T>) -> Self {
        Identity(Arc::as_ptr(arc) as *const () as usize)
    }
}

/// A shared, identity-bearing object cell.
///
/// Cloning an `ObjectRef` yields another handle to the same object; two
/// handles are the same object exactly when [`ptr_eq`](ObjectRef::ptr_eq).
#[derive(Clone)]
pub struct ObjectRef(Arc<RwLock<Object>>);

impl ObjectRef {
    /// Wraps an object in a new cell.
    pub fn new(object: Object) -> Self {
        ObjectRef(Arc::new(RwLock::new(object)))
    }

    /// Creates a new string object.
    pub fn string(s: impl Into<String>) -> Self {
        Self::new(Object::String(s.into()))
    }

    /// Creates an instance with every field at its zero value.
    ///
    /// No constructor runs.
    pub fn instance(class: &ClassRef) -> Self {
        Self::new(Object::Instance(Instance::new(class)))
    }

    /// Creates an array object.
    pub fn array(array: Array) -> Self {
        Self::new(Object::Array(array))
    }

    /// Creates the class object for `class`.
    pub fn class_object(class: &ClassRef) -> Self {
        Self::new(Object::Class(class.clone()))
    }

    /// Locks the object for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, Object> {
        self.0.read()
    }

    /// Locks the object for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, Object> {
        self.0.write()
    }

    /// Returns true if both handles refer to the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the identity used for back-references.
    ///
    /// Class and descriptor objects share the identity of the definition they
    /// wrap, so every class object for one class is the same stream object.
    pub fn identity(&self) -> Identity {
        match &*self.read() {
            Object::Class(class) => Identity::of(class),
            Object::Descriptor(desc) => Identity::of(desc),
            _ => Identity::of(&self.0),
        }
    }

    /// Returns the class name of the object.
    pub fn class_name(&self) -> String {
        self.read().class_name()
    }

    /// Returns the contents if this is a string object.
    pub fn as_string(&self) -> Option<String> {
        match &*self.read() {
            Object::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    /// Reads an instance field by name.
    pub fn get_field(&self, name: &str) -> Option<Value> {
        match &*self.read() {
            Object::Instance(instance) => instance.get(name),
            _ => None,
        }
    }

    /// Assigns an instance field by name.
    ///
    /// The value is checked against the declared type before the object is
    /// locked, so an instance may be stored into one of its own fields.
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let field_type = match &*self.read() {
            Object::Instance(instance) => instance
                .field_type(name)
                .ok_or_else(|| StreamError::field(name, "no such field"))?,
            other => {
                return Err(StreamError::field(
                    name,
                    format!("{} is not an instance", other.class_name()),
                ))
            }
        };
        super::instance::check_conforms(name, &value, &field_type)?;
        match &mut *self.write() {
            Object::Instance(instance) => instance.set_unchecked(name, value),
            other => Err(StreamError::field(
                name,
                format!("{} is not an instance", other.class_name()),
            )),
        }
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow: graphs may be cyclic.
        match self.0.try_read() {
            Some(object) => write!(f, "ObjectRef({} @ {:#x})", object.class_name(), self.address()),
            None => write!(f, "ObjectRef(<locked> @ {:#x})", self.address()),
        }
    }
}

impl ObjectRef {
    fn address(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

/// An enum constant.
#[derive(Debug, Clone)]
pub struct EnumConstant {
    class: Weak<ClassDefinition>,
    name: String,
    ordinal: usize,
}

impl EnumConstant {
    pub(crate) fn new(class: Weak<ClassDefinition>, name: String, ordinal: usize) -> Self {
        Self {
            class,
            name,
            ordinal,
        }
    }

    /// Returns the enum class, if it is still alive.
    pub fn class(&self) -> Option<ClassRef> {
        self.class.upgrade()
    }

    /// Returns the constant name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declaration index.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }
}

/// The closed set of object shapes the streams know how to encode.
#[derive(Debug)]
pub enum Object {
    /// A string.
    String(String),
    /// A primitive or reference array.
    Array(Array),
    /// An enum constant.
    Enum(EnumConstant),
    /// A class object.
    Class(ClassRef),
    /// A type descriptor used as a value.
    Descriptor(Arc<TypeDescriptor>),
    /// An instance of a user class.
    Instance(Instance),
}

impl Object {
    /// Returns the name of the object's class.
    pub fn class_name(&self) -> String {
        match self {
            Object::String(_) => STRING_CLASS.to_string(),
            Object::Array(array) => array.class_name(),
            Object::Enum(constant) => constant
                .class()
                .map_or_else(|| builtins::ENUM_CLASS.to_string(), |c| c.name().to_string()),
            Object::Class(_) => "java.lang.Class".to_string(),
            Object::Descriptor(_) => "java.io.ObjectStreamClass".to_string(),
            Object::Instance(instance) => instance.class().name().to_string(),
        }
    }

    /// Returns true if the object may be stored in a field declared as `field_type`.
    pub fn is_instance_of(&self, field_type: &FieldType) -> bool {
        let name = match field_type {
            FieldType::Object(name) => name.as_str(),
            FieldType::Array(component) => {
                return match self {
                    Object::Array(array) => array_assignable(array.component(), component),
                    _ => false,
                }
            }
            _ => return false,
        };
        if name == OBJECT_CLASS {
            return true;
        }
        match self {
            Object::String(_) => matches!(
                name,
                STRING_CLASS | SERIALIZABLE | "java.lang.CharSequence" | "java.lang.Comparable"
            ),
            Object::Array(_) => matches!(name, SERIALIZABLE | "java.lang.Cloneable"),
            Object::Enum(constant) => {
                matches!(name, SERIALIZABLE | "java.lang.Comparable")
                    || constant.class().map_or(false, |c| c.is_subtype_of(name))
            }
            Object::Class(_) => matches!(name, "java.lang.Class" | SERIALIZABLE),
            Object::Descriptor(_) => matches!(name, "java.io.ObjectStreamClass" | SERIALIZABLE),
            Object::Instance(instance) => {
                instance.class().is_subtype_of(name)
                    || (name == SERIALIZABLE && instance.class().is_serializable())
            }
        }
    }
}

const SERIALIZABLE: &str = "java.io.Serializable";

fn array_assignable(actual: &FieldType, declared: &FieldType) -> bool {
    match (actual, declared) {
        (a, d) if a.is_primitive() || d.is_primitive() => a == d,
        (_, FieldType::Object(name)) if name == OBJECT_CLASS => true,
        (FieldType::Array(a), FieldType::Array(d)) => array_assignable(a, d),
        (FieldType::Object(a), FieldType::Object(d)) => a == d,
        _ => false,
    }
}
