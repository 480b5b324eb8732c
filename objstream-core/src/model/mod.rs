//! The in-memory object model the streams encode and decode.
//!
//! Objects live in shared [`ObjectRef`] cells so graphs may share nodes and
//! contain cycles. Each instance carries storage for every class in its
//! hierarchy; [`ClassDefinition`] describes the shape the streams walk.

mod array;
pub mod builtins;
mod class;
mod compare;
mod convert;
mod field_type;
mod hooks;
mod instance;
pub mod modifiers;
mod value;

pub use array::{Array, ArrayData};
pub use class::{
    ClassBuilder, ClassDefinition, ClassId, ClassKind, ClassRef, FieldDefinition, FieldLayout,
    FieldOffset, MemberSignature,
};
pub use convert::{required_field, StreamClass, StreamType};
pub use field_type::{FieldType, MAX_ARRAY_DIMENSIONS, OBJECT_CLASS, STRING_CLASS};
pub use hooks::{
    ClassHooks, Constructor, CustomSerialization, Externalizable, ObjectInputValidation,
    ObjectReplacer, ObjectResolver, ReadResolve, WriteReplace,
};
pub use instance::{FieldBlock, Instance};
pub use value::{EnumConstant, Identity, Object, ObjectRef, Value};
