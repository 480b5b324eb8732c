//! Handle tables for back-references.
//!
//! Every object record, and every class descriptor, takes the next handle
//! when it is written or read. Handles start at [`BASE_WIRE_HANDLE`] and
//! restart there after a reset.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{Result, StreamError};
use crate::model::{Identity, Object, ObjectRef, Value};
use crate::protocol::BASE_WIRE_HANDLE;

/// A wire handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u32);

impl Handle {
    /// The first handle assigned after a reset.
    pub const BASE: Handle = Handle(BASE_WIRE_HANDLE);

    /// Wraps a raw wire value.
    pub fn from_raw(raw: u32) -> Self {
        Handle(raw)
    }

    /// Returns the wire value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Returns the table index, or `None` for values below the base.
    pub fn index(&self) -> Option<usize> {
        self.0.checked_sub(BASE_WIRE_HANDLE).map(|i| i as usize)
    }

    fn at(index: usize) -> Self {
        Handle(BASE_WIRE_HANDLE.wrapping_add(index as u32))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// What the write-side table keeps alive for an entry.
///
/// Identities are addresses, so the table holds a strong reference to
/// keep an address from being reused while its handle is live.
#[derive(Debug, Clone)]
pub enum Retained {
    /// A stream object.
    Object(ObjectRef),
    /// A class descriptor written as part of another record.
    Descriptor(Arc<TypeDescriptor>),
}

/// Write-side handle table: object identity to handle.
///
/// Also records substitutions made by replacement hooks, so an object
/// replaced once is replaced by the same object every time it recurs.
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: HashMap<Identity, (Handle, Retained)>,
    substitutions: HashMap<Identity, (ObjectRef, Value)>,
    next: usize,
}

impl HandleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle the next assignment will receive.
    pub fn next_handle(&self) -> Handle {
        Handle::at(self.next)
    }

    /// Assigns the next handle to `identity`.
    pub fn put(&mut self, identity: Identity, retained: Retained) -> Handle {
        let handle = self.skip();
        self.entries.insert(identity, (handle, retained));
        handle
    }

    /// Consumes the next handle without recording an entry, as unshared
    /// records do.
    pub fn skip(&mut self) -> Handle {
        let handle = Handle::at(self.next);
        self.next += 1;
        handle
    }

    /// Returns the handle assigned to `identity`.
    pub fn get(&self, identity: Identity) -> Option<Handle> {
        self.entries.get(&identity).map(|(handle, _)| *handle)
    }

    /// Removes the entry for `identity`.
    pub fn remove(&mut self, identity: Identity) -> Option<Handle> {
        self.entries.remove(&identity).map(|(handle, _)| handle)
    }

    /// Records that `original` was replaced by `replacement`.
    pub fn substitute(&mut self, original: &ObjectRef, replacement: Value) {
        self.substitutions
            .insert(original.identity(), (original.clone(), replacement));
    }

    /// Returns the replacement recorded for `identity`.
    pub fn substitution(&self, identity: Identity) -> Option<&Value> {
        self.substitutions.get(&identity).map(|(_, value)| value)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no handle has been assigned since the last reset.
    pub fn is_empty(&self) -> bool {
        self.next == 0
    }

    /// Forgets every entry and substitution and restarts numbering.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.substitutions.clear();
        self.next = 0;
    }
}

/// One read-side table entry.
#[derive(Debug, Clone)]
pub enum ReadSlot {
    /// Assigned to a record still being read.
    Reserved,
    /// A decoded value; `Null` when a resolve hook replaced the object with null.
    Value(Value),
    /// A class descriptor.
    Descriptor(Arc<TypeDescriptor>),
    /// An unshared record; back-references to it are rejected.
    Unshared,
}

/// Read-side handle table: handle to decoded value.
#[derive(Debug, Default)]
pub struct ReadHandleTable {
    slots: Vec<ReadSlot>,
}

impl ReadHandleTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assigns the next handle to a record whose value is not known yet.
    pub fn reserve(&mut self) -> Handle {
        self.assign(ReadSlot::Reserved)
    }

    /// Assigns the next handle.
    pub fn assign(&mut self, slot: ReadSlot) -> Handle {
        self.slots.push(slot);
        Handle::at(self.slots.len() - 1)
    }

    /// Replaces the entry at `handle`. Unknown handles are ignored.
    pub fn set(&mut self, handle: Handle, slot: ReadSlot) {
        if let Some(entry) = handle.index().and_then(|i| self.slots.get_mut(i)) {
            *entry = slot;
        }
    }

    /// Looks up a back-reference.
    pub fn get(&self, handle: Handle) -> Result<&ReadSlot> {
        handle
            .index()
            .and_then(|i| self.slots.get(i))
            .ok_or(StreamError::UnresolvedReference(handle.raw()))
    }

    /// Resolves a back-reference found where an object is expected.
    pub fn lookup_value(&self, handle: Handle) -> Result<Value> {
        match self.get(handle)? {
            ReadSlot::Value(value) => Ok(value.clone()),
            ReadSlot::Descriptor(desc) => {
                Ok(Value::Object(ObjectRef::new(Object::Descriptor(desc.clone()))))
            }
            ReadSlot::Unshared => Err(StreamError::InvalidObject(
                "cannot read back reference to unshared object".to_string(),
            )),
            ReadSlot::Reserved => Err(StreamError::UnresolvedReference(handle.raw())),
        }
    }

    /// Resolves a back-reference found where a class descriptor is expected.
    pub fn lookup_descriptor(&self, handle: Handle) -> Result<Arc<TypeDescriptor>> {
        match self.get(handle)? {
            ReadSlot::Descriptor(desc) => Ok(desc.clone()),
            ReadSlot::Reserved => Err(StreamError::invalid_class(
                format!("handle {}", handle),
                "circular super descriptor",
            )),
            ReadSlot::Unshared => Err(StreamError::InvalidObject(
                "cannot read back reference to unshared object".to_string(),
            )),
            ReadSlot::Value(_) => Err(StreamError::StreamCorrupted(format!(
                "handle {} does not refer to a class descriptor",
                handle
            ))),
        }
    }

    /// Number of assigned handles.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no handle has been assigned.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Forgets every entry and restarts numbering.
    pub fn reset(&mut self) {
        self.slots.clear();
    }
}
