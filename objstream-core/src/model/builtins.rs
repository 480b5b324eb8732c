//! Classes every stream knows without registration.

use std::sync::OnceLock;

use super::field_type::STRING_CLASS;
use super::modifiers::{ABSTRACT, FINAL, PROTECTED, PUBLIC};
use super::{ClassDefinition, ClassRef, FieldDefinition, FieldType};

/// Name of the base class of all enum types.
pub const ENUM_CLASS: &str = "java.lang.Enum";

/// Name of the base class of all proxy classes.
pub const PROXY_CLASS: &str = "java.lang.reflect.Proxy";

/// Name of the class that records a write failure inside a stream.
pub const FAILURE_CLASS: &str = "objstream.StreamFailure";

/// The string class.
pub fn string_class() -> ClassRef {
    static CLASS: OnceLock<ClassRef> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            ClassDefinition::builder(STRING_CLASS)
                .modifiers(PUBLIC | FINAL)
                .serializable()
                .interface("java.io.Serializable")
                .interface("java.lang.Comparable")
                .interface("java.lang.CharSequence")
                .serial_version(-6849794470754667710)
                .build()
        })
        .clone()
}

/// The base class of every enum type.
pub fn enum_base() -> ClassRef {
    static CLASS: OnceLock<ClassRef> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            ClassDefinition::builder(ENUM_CLASS)
                .modifiers(PUBLIC | ABSTRACT)
                .enum_constants(Vec::<String>::new())
                .build()
        })
        .clone()
}

/// The base class of every proxy class, holding the invocation handler `h`.
pub fn proxy_base() -> ClassRef {
    static CLASS: OnceLock<ClassRef> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            ClassDefinition::builder(PROXY_CLASS)
                .serializable()
                .interface("java.io.Serializable")
                .field_definition(FieldDefinition::with_modifiers(
                    "h",
                    FieldType::object("java.lang.reflect.InvocationHandler"),
                    PROTECTED,
                ))
                .serial_version(-2222568056686623797)
                .build()
        })
        .clone()
}

/// The class recorded in place of an object whose write failed.
///
/// Fields: `kind` (short error name) and `message`.
pub fn failure_class() -> ClassRef {
    static CLASS: OnceLock<ClassRef> = OnceLock::new();
    CLASS
        .get_or_init(|| {
            ClassDefinition::builder(FAILURE_CLASS)
                .modifiers(PUBLIC | FINAL)
                .serializable()
                .field("kind", FieldType::string())
                .field("message", FieldType::string())
                .serial_version(1)
                .build()
        })
        .clone()
}

/// Resolves a builtin class by name.
pub fn resolve(name: &str) -> Option<ClassRef> {
    match name {
        STRING_CLASS => Some(string_class()),
        ENUM_CLASS => Some(enum_base()),
        PROXY_CLASS => Some(proxy_base()),
        FAILURE_CLASS => Some(failure_class()),
        _ => None,
    }
}
