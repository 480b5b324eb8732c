//! Per-class and per-stream hooks that customize encoding and decoding.
//!
//! A class opts into a behavior by attaching an implementation when it is
//! built (see [`ClassBuilder`](super::ClassBuilder)). Single-method hooks are
//! implemented for matching closures.

use std::fmt;
use std::sync::Arc;

use super::{Instance, ObjectRef, Value};
use crate::error::Result;
use crate::stream::{ObjectInput, ObjectOutput};

/// Custom encoding for one level of a serializable class.
///
/// Data written by [`write_object`](CustomSerialization::write_object) is
/// framed as block data and terminated by an end-of-block marker, so the
/// reader can skip whatever its own hook leaves unread.
pub trait CustomSerialization: Send + Sync {
    /// Writes this level of `this`. Call `out.default_write_object()` to emit
    /// the declared fields.
    fn write_object(&self, this: &ObjectRef, out: &mut dyn ObjectOutput) -> Result<()>;

    /// Reads this level of `this`. Call `input.default_read_object()` to
    /// populate the declared fields.
    fn read_object(&self, this: &ObjectRef, input: &mut dyn ObjectInput) -> Result<()>;

    /// Called when the stream has no data for this level because the writer's
    /// class hierarchy did not include it.
    fn read_object_no_data(&self, _this: &ObjectRef) -> Result<()> {
        Ok(())
    }
}

/// Complete control over the encoding of an externalizable class.
pub trait Externalizable: Send + Sync {
    /// Writes the whole state of `this`.
    fn write_external(&self, this: &ObjectRef, out: &mut dyn ObjectOutput) -> Result<()>;

    /// Restores the whole state of `this`, freshly built by the class's
    /// no-arg constructor.
    fn read_external(&self, this: &ObjectRef, input: &mut dyn ObjectInput) -> Result<()>;
}

/// Substitutes another object before an instance is written.
pub trait WriteReplace: Send + Sync {
    /// Returns the object to write in place of `this`.
    fn write_replace(&self, this: &ObjectRef) -> Result<Value>;
}

/// Substitutes another object after an instance has been read.
pub trait ReadResolve: Send + Sync {
    /// Returns the object the reader should see in place of `this`.
    fn read_resolve(&self, this: &ObjectRef) -> Result<Value>;
}

/// The no-arg constructor body of a class.
///
/// Initializes the fields the class itself declares.
pub trait Constructor: Send + Sync {
    /// Initializes the declaring class's fields of `instance`.
    fn construct(&self, instance: &mut Instance) -> Result<()>;
}

impl<F> WriteReplace for F
where
    F: Fn(&ObjectRef) -> Result<Value> + Send + Sync,
{
    fn write_replace(&self, this: &ObjectRef) -> Result<Value> {
        self(this)
    }
}

impl<F> ReadResolve for F
where
    F: Fn(&ObjectRef) -> Result<Value> + Send + Sync,
{
    fn read_resolve(&self, this: &ObjectRef) -> Result<Value> {
        self(this)
    }
}

impl<F> Constructor for F
where
    F: Fn(&mut Instance) -> Result<()> + Send + Sync,
{
    fn construct(&self, instance: &mut Instance) -> Result<()> {
        self(instance)
    }
}

/// Stream-level substitution applied by the writer once enabled.
pub trait ObjectReplacer {
    /// Returns the object to write in place of `object`.
    fn replace_object(&mut self, object: &ObjectRef) -> Result<Value>;
}

/// Stream-level substitution applied by the reader once enabled.
pub trait ObjectResolver {
    /// Returns the object the caller should see in place of `object`.
    fn resolve_object(&mut self, object: &ObjectRef) -> Result<Value>;
}

/// Callback run after a complete top-level graph has been read.
pub trait ObjectInputValidation {
    /// Validates the graph; an error fails the enclosing `read_object`.
    fn validate_object(&mut self) -> Result<()>;
}

impl<F> ObjectReplacer for F
where
    F: FnMut(&ObjectRef) -> Result<Value>,
{
    fn replace_object(&mut self, object: &ObjectRef) -> Result<Value> {
        self(object)
    }
}

impl<F> ObjectResolver for F
where
    F: FnMut(&ObjectRef) -> Result<Value>,
{
    fn resolve_object(&mut self, object: &ObjectRef) -> Result<Value> {
        self(object)
    }
}

impl<F> ObjectInputValidation for F
where
    F: FnMut() -> Result<()>,
{
    fn validate_object(&mut self) -> Result<()> {
        self()
    }
}

/// The hooks attached to one class.
#[derive(Clone, Default)]
pub struct ClassHooks {
    pub(crate) custom: Option<Arc<dyn CustomSerialization>>,
    pub(crate) externalizable: Option<Arc<dyn Externalizable>>,
    pub(crate) write_replace: Option<Arc<dyn WriteReplace>>,
    pub(crate) read_resolve: Option<Arc<dyn ReadResolve>>,
    pub(crate) constructor: Option<Arc<dyn Constructor>>,
}

impl ClassHooks {
    /// Returns the custom serialization hook, if any.
    pub fn custom(&self) -> Option<&Arc<dyn CustomSerialization>> {
        self.custom.as_ref()
    }

    /// Returns the externalizable hook, if any.
    pub fn externalizable(&self) -> Option<&Arc<dyn Externalizable>> {
        self.externalizable.as_ref()
    }

    /// Returns the write-replace hook, if any.
    pub fn write_replace(&self) -> Option<&Arc<dyn WriteReplace>> {
        self.write_replace.as_ref()
    }

    /// Returns the read-resolve hook, if any.
    pub fn read_resolve(&self) -> Option<&Arc<dyn ReadResolve>> {
        self.read_resolve.as_ref()
    }

    /// Returns the no-arg constructor body, if any.
    pub fn constructor(&self) -> Option<&Arc<dyn Constructor>> {
        self.constructor.as_ref()
    }
}

impl fmt::Debug for ClassHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassHooks")
            .field("custom", &self.custom.is_some())
            .field("externalizable", &self.externalizable.is_some())
            .field("write_replace", &self.write_replace.is_some())
            .field("read_resolve", &self.read_resolve.is_some())
            .field("constructor", &self.constructor.is_some())
            .finish()
    }
}
