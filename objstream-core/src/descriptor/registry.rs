//! Process-wide cache of type descriptors.

use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::debug;

use super::type_descriptor::{DescriptorFlags, FieldAccessor, StreamField, TypeDescriptor};
use super::version::{compute_array_version_tag, compute_version_tag};
use crate::error::{Result, StreamError};
use crate::model::{ClassId, ClassKind, ClassRef, FieldType, ObjectRef};
use crate::protocol::{SC_ENUM, SC_EXTERNALIZABLE, SC_SERIALIZABLE, SC_WRITE_METHOD};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeKey {
    Class(ClassId),
    Array(FieldType),
}

/// Concurrent cache of descriptors keyed by class identity.
///
/// Descriptors are pure functions of a class's declared shape, so an entry
/// may be evicted at any time and is recomputed identically on the next
/// lookup. Concurrent lookups of an uncached class may each compute the
/// descriptor; the first one stored is the one every caller gets.
///
/// Cached descriptors hold their class weakly. Entries whose class has been
/// dropped are purged whenever a new class descriptor is cached.
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: DashMap<TypeKey, Arc<TypeDescriptor>>,
    signatures: DashMap<String, ObjectRef>,
}

impl DescriptorRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the registry shared by every stream that is not given its own.
    pub fn global() -> Arc<DescriptorRegistry> {
        static GLOBAL: OnceLock<Arc<DescriptorRegistry>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(DescriptorRegistry::new())).clone()
    }

    /// Returns the descriptor of `class`, computing and caching it on first use.
    pub fn lookup(&self, class: &ClassRef) -> Result<Arc<TypeDescriptor>> {
        let key = TypeKey::Class(class.id());
        if let Some(desc) = self.descriptors.get(&key) {
            return Ok(desc.value().clone());
        }

        let super_descriptor = match class.superclass() {
            Some(superclass) if superclass.is_serializable() => Some(self.lookup(superclass)?),
            _ => None,
        };
        let desc = Arc::new(self.build_class_descriptor(class, super_descriptor)?);
        let stored = self.descriptors.entry(key).or_insert(desc).value().clone();
        self.purge_stale();
        debug!(
            class = %class.name(),
            version_tag = stored.version_tag(),
            fields = stored.fields().len(),
            "cached type descriptor"
        );
        Ok(stored)
    }

    /// Returns the descriptor of the array class with the given component type.
    pub fn lookup_array(&self, component: &FieldType) -> Result<Arc<TypeDescriptor>> {
        let key = TypeKey::Array(component.clone());
        if let Some(desc) = self.descriptors.get(&key) {
            return Ok(desc.value().clone());
        }
        let name = FieldType::array_of(component.clone()).class_name();
        let desc = Arc::new(
            TypeDescriptor::new(
                name,
                compute_array_version_tag(component)?,
                DescriptorFlags::EMPTY.with(SC_SERIALIZABLE),
            )
            .with_array_component(component.clone()),
        );
        let stored = self.descriptors.entry(key).or_insert(desc).value().clone();
        debug!(class = %stored.name(), "cached array descriptor");
        Ok(stored)
    }

    fn build_class_descriptor(
        &self,
        class: &ClassRef,
        super_descriptor: Option<Arc<TypeDescriptor>>,
    ) -> Result<TypeDescriptor> {
        let mut flags = DescriptorFlags::EMPTY;
        match class.kind() {
            ClassKind::Plain => {}
            ClassKind::Serializable | ClassKind::Proxy => flags = flags.with(SC_SERIALIZABLE),
            ClassKind::Externalizable => flags = flags.with(SC_EXTERNALIZABLE),
            ClassKind::Enum => flags = flags.with(SC_SERIALIZABLE | SC_ENUM),
        }
        if class.kind() == ClassKind::Serializable && class.hooks().custom().is_some() {
            flags = flags.with(SC_WRITE_METHOD);
        }

        let fields = if class.kind() == ClassKind::Serializable {
            let level = class.depth();
            class
                .serializable_fields()
                .into_iter()
                .map(|field| {
                    let offset = class.layout().offset(field.name()).ok_or_else(|| {
                        StreamError::invalid_class(
                            class.name(),
                            format!("field {} has no storage", field.name()),
                        )
                    })?;
                    let accessor = FieldAccessor::new(level, offset, field.field_type().clone());
                    Ok(StreamField::bound(
                        field.name(),
                        field.field_type().clone(),
                        field.is_unshared(),
                        accessor,
                    ))
                })
                .collect::<Result<Vec<_>>>()?
        } else {
            Vec::new()
        };

        let mut desc = TypeDescriptor::new(class.name(), compute_version_tag(class)?, flags)
            .with_fields(fields)
            .with_super(super_descriptor)
            .with_cached_class(class);
        if class.is_proxy() {
            desc = desc.with_proxy_interfaces(class.interfaces().to_vec());
        }
        Ok(desc)
    }

    /// Returns the shared string object for a field type signature.
    ///
    /// Descriptors write reference field signatures as string objects; using
    /// one object per signature lets repeated signatures become back-references.
    pub fn intern_signature(&self, signature: &str) -> ObjectRef {
        if let Some(existing) = self.signatures.get(signature) {
            return existing.value().clone();
        }
        self.signatures
            .entry(signature.to_string())
            .or_insert_with(|| ObjectRef::string(signature))
            .value()
            .clone()
    }

    /// Drops the cached descriptor of `class`. Returns true if one was cached.
    pub fn evict(&self, class: &ClassRef) -> bool {
        self.descriptors.remove(&TypeKey::Class(class.id())).is_some()
    }

    /// Drops the entries of classes that no longer exist. Returns how many
    /// were dropped.
    pub fn purge_stale(&self) -> usize {
        let before = self.descriptors.len();
        self.descriptors.retain(|_, desc| !desc.is_stale());
        let purged = before.saturating_sub(self.descriptors.len());
        if purged > 0 {
            debug!(purged, "purged descriptors of dropped classes");
        }
        purged
    }

    /// Drops every cached descriptor.
    pub fn clear(&self) {
        self.descriptors.clear();
        self.signatures.clear();
    }

    /// Number of cached descriptors.
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
