//! Access and property modifier bits for classes, fields and members.
//!
//! The bit values follow the class-file format so that version tags computed
//! from them are comparable across implementations.

/// Visible everywhere.
pub const PUBLIC: i32 = 0x0001;
/// Visible only inside the declaring class.
pub const PRIVATE: i32 = 0x0002;
/// Visible to subclasses.
pub const PROTECTED: i32 = 0x0004;
/// Belongs to the class rather than an instance.
pub const STATIC: i32 = 0x0008;
/// Cannot be reassigned or overridden.
pub const FINAL: i32 = 0x0010;
/// Synchronized method.
pub const SYNCHRONIZED: i32 = 0x0020;
/// Volatile field.
pub const VOLATILE: i32 = 0x0040;
/// Field excluded from default serialization.
pub const TRANSIENT: i32 = 0x0080;
/// Native method.
pub const NATIVE: i32 = 0x0100;
/// The type is an interface.
pub const INTERFACE: i32 = 0x0200;
/// Abstract type or method.
pub const ABSTRACT: i32 = 0x0400;
/// Strict floating point.
pub const STRICT: i32 = 0x0800;

/// Class modifiers that take part in version tags.
pub const CLASS_MASK: i32 = PUBLIC | FINAL | INTERFACE | ABSTRACT;

/// Field modifiers that take part in version tags.
pub const FIELD_MASK: i32 =
    PUBLIC | PRIVATE | PROTECTED | STATIC | FINAL | VOLATILE | TRANSIENT;

/// Constructor and method modifiers that take part in version tags.
pub const METHOD_MASK: i32 =
    PUBLIC | PRIVATE | PROTECTED | STATIC | FINAL | SYNCHRONIZED | NATIVE | ABSTRACT | STRICT;

/// Returns true if `modifiers` has every bit of `flag`.
pub fn has(modifiers: i32, flag: i32) -> bool {
    modifiers & flag == flag
}
