//! Type descriptors: the per-class shape written ahead of instance data.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::error::{Result, StreamError};
use crate::model::{ClassDefinition, ClassRef, FieldOffset, FieldType, Instance, Value};
use crate::protocol::{SC_BLOCK_DATA, SC_ENUM, SC_EXTERNALIZABLE, SC_SERIALIZABLE, SC_WRITE_METHOD};

/// Descriptor flag bits as written on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DescriptorFlags(u8);

impl DescriptorFlags {
    /// No flags.
    pub const EMPTY: DescriptorFlags = DescriptorFlags(0);

    /// Wraps raw flag bits.
    pub fn from_bits(bits: u8) -> Self {
        DescriptorFlags(bits)
    }

    /// Returns the raw flag bits.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Returns true if every bit of `flag` is set.
    pub fn contains(&self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    /// Returns these flags with `flag` set.
    pub fn with(self, flag: u8) -> Self {
        DescriptorFlags(self.0 | flag)
    }

    /// Returns these flags with `flag` cleared.
    pub fn without(self, flag: u8) -> Self {
        DescriptorFlags(self.0 & !flag)
    }

    /// Serializable class.
    pub fn is_serializable(&self) -> bool {
        self.contains(SC_SERIALIZABLE)
    }

    /// Externalizable class.
    pub fn is_externalizable(&self) -> bool {
        self.contains(SC_EXTERNALIZABLE)
    }

    /// Enum type.
    pub fn is_enum(&self) -> bool {
        self.contains(SC_ENUM)
    }

    /// The class level writes custom data after its fields.
    pub fn has_write_method(&self) -> bool {
        self.contains(SC_WRITE_METHOD)
    }

    /// Externalizable data is framed as block data.
    pub fn has_block_data(&self) -> bool {
        self.contains(SC_BLOCK_DATA)
    }
}

/// Where a stream field's value lives in a local instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAccessor {
    level: usize,
    offset: FieldOffset,
    field_type: FieldType,
}

impl FieldAccessor {
    pub(crate) fn new(level: usize, offset: FieldOffset, field_type: FieldType) -> Self {
        Self {
            level,
            offset,
            field_type,
        }
    }

    /// Index of the storage block, which is the declaring class's depth.
    pub fn level(&self) -> usize {
        self.level
    }

    /// Location within the storage block.
    pub fn offset(&self) -> FieldOffset {
        self.offset
    }

    /// Declared type of the local field.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Reads the field from `instance`.
    pub fn get(&self, instance: &Instance) -> Value {
        instance
            .read_slot(self.level, self.offset, &self.field_type)
            .unwrap_or_else(|| Value::default_for(&self.field_type))
    }

    /// Stores `value` into `instance`. Reference values must already have
    /// been checked against the declared type.
    pub fn set(&self, instance: &mut Instance, value: Value) -> Result<()> {
        instance.write_slot(self.level, self.offset, &self.field_type, value)
    }
}

/// One field as it appears in a type descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamField {
    name: String,
    field_type: FieldType,
    unshared: bool,
    accessor: Option<FieldAccessor>,
}

impl StreamField {
    /// Creates a field with no local storage bound.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            unshared: false,
            accessor: None,
        }
    }

    pub(crate) fn bound(
        name: impl Into<String>,
        field_type: FieldType,
        unshared: bool,
        accessor: FieldAccessor,
    ) -> Self {
        Self {
            name: name.into(),
            field_type,
            unshared,
            accessor: Some(accessor),
        }
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the type written in the stream.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns the one-byte type code.
    pub fn type_code(&self) -> u8 {
        self.field_type.type_code()
    }

    /// Returns true for the eight primitive kinds.
    pub fn is_primitive(&self) -> bool {
        self.field_type.is_primitive()
    }

    /// Returns true if values are written and read unshared.
    pub fn is_unshared(&self) -> bool {
        self.unshared
    }

    /// Returns the local storage, or `None` when the local class has no such
    /// field and the value is read and discarded.
    pub fn accessor(&self) -> Option<&FieldAccessor> {
        self.accessor.as_ref()
    }
}

/// How a descriptor refers to its local class.
///
/// Cached descriptors hold the class weakly so the cache never keeps a class
/// alive; descriptors built by a decoder hold it for the life of the stream.
#[derive(Clone)]
enum LocalClass {
    Held(ClassRef),
    Cached(Weak<ClassDefinition>),
}

impl LocalClass {
    fn get(&self) -> Option<ClassRef> {
        match self {
            LocalClass::Held(class) => Some(class.clone()),
            LocalClass::Cached(class) => class.upgrade(),
        }
    }
}

/// The canonical shape of one class, as written to or read from a stream.
///
/// Descriptors from [`DescriptorRegistry`](super::DescriptorRegistry) describe
/// local classes. The decoder builds its own descriptors from stream records
/// and binds them to local classes, so stream fields missing locally or
/// stored at different offsets are handled through each field's accessor.
pub struct TypeDescriptor {
    name: String,
    version_tag: i64,
    flags: DescriptorFlags,
    fields: Vec<StreamField>,
    super_descriptor: Option<Arc<TypeDescriptor>>,
    proxy_interfaces: Option<Vec<String>>,
    local_class: Option<LocalClass>,
    array_component: Option<FieldType>,
    invalid_reason: Option<String>,
}

impl TypeDescriptor {
    pub(crate) fn new(name: impl Into<String>, version_tag: i64, flags: DescriptorFlags) -> Self {
        Self {
            name: name.into(),
            version_tag,
            flags,
            fields: Vec::new(),
            super_descriptor: None,
            proxy_interfaces: None,
            local_class: None,
            array_component: None,
            invalid_reason: None,
        }
    }

    pub(crate) fn with_fields(mut self, fields: Vec<StreamField>) -> Self {
        self.fields = fields;
        self
    }

    pub(crate) fn with_super(mut self, super_descriptor: Option<Arc<TypeDescriptor>>) -> Self {
        self.super_descriptor = super_descriptor;
        self
    }

    pub(crate) fn with_proxy_interfaces(mut self, interfaces: Vec<String>) -> Self {
        self.proxy_interfaces = Some(interfaces);
        self
    }

    pub(crate) fn with_local_class(mut self, class: ClassRef) -> Self {
        self.local_class = Some(LocalClass::Held(class));
        self
    }

    /// Refers to `class` without keeping it alive.
    pub(crate) fn with_cached_class(mut self, class: &ClassRef) -> Self {
        self.local_class = Some(LocalClass::Cached(Arc::downgrade(class)));
        self
    }

    /// Returns true once the weakly held local class has been dropped.
    pub(crate) fn is_stale(&self) -> bool {
        matches!(&self.local_class, Some(LocalClass::Cached(class)) if class.strong_count() == 0)
    }

    pub(crate) fn with_array_component(mut self, component: FieldType) -> Self {
        self.array_component = Some(component);
        self
    }

    /// Binds a descriptor read from a stream to the local descriptor of the
    /// class it resolved to, checking that the two are compatible.
    ///
    /// Stream fields take their accessor and unshared attribute from the
    /// local field of the same name; a primitive field whose type code
    /// differs locally is an error.
    pub(crate) fn bind(mut self, local: &TypeDescriptor) -> Result<Self> {
        let local_class = local
            .local_class()
            .ok_or_else(|| StreamError::invalid_class(&self.name, "no local class to bind"))?;

        if self.flags.is_enum() != local_class.is_enum() {
            let reason = if self.flags.is_enum() {
                "cannot bind enum descriptor to a non-enum class"
            } else {
                "cannot bind non-enum descriptor to an enum class"
            };
            return Err(StreamError::invalid_class(&self.name, reason));
        }

        // Externalizable classes count as serializable for these checks.
        let stream_externalizable = self.flags.is_externalizable();
        let local_externalizable = local.flags.is_externalizable();
        let stream_serializable = self.flags.is_serializable() || stream_externalizable;
        let local_serializable = local.flags.is_serializable() || local_externalizable;

        if stream_serializable == local_serializable
            && local.array_component.is_none()
            && self.version_tag != local.version_tag
        {
            return Err(StreamError::invalid_class(
                &self.name,
                format!(
                    "local class incompatible: stream version tag = {}, local version tag = {}",
                    self.version_tag, local.version_tag
                ),
            ));
        }
        if self.name != local.name {
            return Err(StreamError::invalid_class(
                &self.name,
                format!("local class name {} incompatible with stream class name", local.name),
            ));
        }
        if !self.flags.is_enum() {
            if stream_serializable == local_serializable
                && stream_externalizable != local_externalizable
            {
                return Err(StreamError::invalid_class(
                    &self.name,
                    "Serializable incompatible with Externalizable",
                ));
            }
            if stream_serializable != local_serializable
                || stream_externalizable != local_externalizable
                || !(local_serializable || local_externalizable)
            {
                self.invalid_reason = Some("class invalid for deserialization".to_string());
            }
        }

        for field in &mut self.fields {
            let Some(local_field) = local.field(&field.name) else {
                continue;
            };
            let compatible = if field.is_primitive() || local_field.is_primitive() {
                field.type_code() == local_field.type_code()
            } else {
                true
            };
            if !compatible {
                return Err(StreamError::invalid_class(
                    &self.name,
                    format!("incompatible types for field {}", field.name),
                ));
            }
            field.unshared = local_field.unshared;
            field.accessor = local_field.accessor.clone();
        }

        self.local_class = Some(LocalClass::Held(local_class));
        self.array_component = local.array_component.clone();
        Ok(self)
    }

    /// Returns the fully qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the 64-bit version tag.
    pub fn version_tag(&self) -> i64 {
        self.version_tag
    }

    /// Returns the flag bits.
    pub fn flags(&self) -> DescriptorFlags {
        self.flags
    }

    /// Returns the fields in canonical order.
    pub fn fields(&self) -> &[StreamField] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&StreamField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the descriptor of the nearest serializable superclass.
    pub fn super_descriptor(&self) -> Option<&Arc<TypeDescriptor>> {
        self.super_descriptor.as_ref()
    }

    /// Returns true for proxy class descriptors.
    pub fn is_proxy(&self) -> bool {
        self.proxy_interfaces.is_some()
    }

    /// Returns the interfaces of a proxy class descriptor.
    pub fn proxy_interfaces(&self) -> Option<&[String]> {
        self.proxy_interfaces.as_deref()
    }

    /// Returns the local class this descriptor describes or was bound to.
    pub fn local_class(&self) -> Option<ClassRef> {
        self.local_class.as_ref().and_then(LocalClass::get)
    }

    /// Returns true for array class descriptors.
    pub fn is_array(&self) -> bool {
        self.array_component.is_some()
    }

    /// Returns the component type of an array class.
    pub fn array_component(&self) -> Option<&FieldType> {
        self.array_component.as_ref()
    }

    /// Fails if instances of the bound local class cannot be decoded from
    /// this descriptor.
    pub(crate) fn check_deserialize(&self) -> Result<()> {
        match &self.invalid_reason {
            Some(reason) => Err(StreamError::invalid_class(&self.name, reason.clone())),
            None => Ok(()),
        }
    }

    /// Returns this descriptor and its super descriptors, root first.
    pub fn hierarchy(self: &Arc<Self>) -> Vec<Arc<TypeDescriptor>> {
        let mut chain = Vec::new();
        let mut current = Some(self.clone());
        while let Some(desc) = current {
            current = desc.super_descriptor.clone();
            chain.push(desc);
        }
        chain.reverse();
        chain
    }

    /// Pairs each serializable level of `local` with the stream data that
    /// belongs to it, root first.
    ///
    /// Stream levels with no local counterpart are returned with
    /// `local: None` so their data can be read and discarded; local levels
    /// absent from the stream are returned with `has_data: false`.
    pub(crate) fn data_layout(self: &Arc<Self>, local: &ClassRef) -> Vec<DataSlot> {
        let mut slots = Vec::new();
        let mut start = Some(self.clone());
        let lineage = local.lineage();
        for class in lineage.iter().rev().take_while(|c| c.is_serializable()) {
            let mut matched = None;
            let mut cursor = start.clone();
            while let Some(desc) = cursor {
                if desc.name == class.name() {
                    matched = Some(desc.clone());
                    break;
                }
                cursor = desc.super_descriptor.clone();
            }
            match matched {
                Some(found) => {
                    let mut cursor = start.clone();
                    while let Some(desc) = cursor {
                        if Arc::ptr_eq(&desc, &found) {
                            break;
                        }
                        cursor = desc.super_descriptor.clone();
                        slots.push(DataSlot::unmatched(desc));
                    }
                    start = found.super_descriptor.clone();
                    slots.push(DataSlot {
                        desc: Some(found),
                        local: Some(class.clone()),
                        has_data: true,
                    });
                }
                None => slots.push(DataSlot {
                    desc: None,
                    local: Some(class.clone()),
                    has_data: false,
                }),
            }
        }
        while let Some(desc) = start {
            start = desc.super_descriptor.clone();
            slots.push(DataSlot::unmatched(desc));
        }
        slots.reverse();
        slots
    }
}

/// One level of an object's serialized data.
#[derive(Debug, Clone)]
pub(crate) struct DataSlot {
    pub(crate) desc: Option<Arc<TypeDescriptor>>,
    pub(crate) local: Option<ClassRef>,
    pub(crate) has_data: bool,
}

impl DataSlot {
    fn unmatched(desc: Arc<TypeDescriptor>) -> Self {
        DataSlot {
            desc: Some(desc),
            local: None,
            has_data: true,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("version_tag", &self.version_tag)
            .field("flags", &self.flags)
            .field("fields", &self.fields)
            .field("super", &self.super_descriptor.as_ref().map(|d| d.name()))
            .field("proxy_interfaces", &self.proxy_interfaces)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassDefinition;

    #[test]
    fn test_flags() {
        let flags = DescriptorFlags::EMPTY.with(SC_SERIALIZABLE).with(SC_WRITE_METHOD);
        assert!(flags.is_serializable());
        assert!(flags.has_write_method());
        assert!(!flags.is_externalizable());
        assert_eq!(flags.bits(), 0x03);
        assert_eq!(flags.without(SC_WRITE_METHOD).bits(), SC_SERIALIZABLE);
    }

    #[test]
    fn test_hierarchy_is_root_first() {
        let root = Arc::new(TypeDescriptor::new("A", 1, DescriptorFlags::EMPTY));
        let leaf = Arc::new(TypeDescriptor::new("B", 2, DescriptorFlags::EMPTY).with_super(Some(root)));
        let names: Vec<String> = leaf.hierarchy().iter().map(|d| d.name().to_string()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_data_layout_marks_missing_and_extra_levels() {
        let base = ClassDefinition::builder("com.example.Base").serializable().build();
        let leaf = ClassDefinition::builder("com.example.Leaf").superclass(base).build();

        let flags = DescriptorFlags::EMPTY.with(SC_SERIALIZABLE);
        let extra = Arc::new(TypeDescriptor::new("com.example.Gone", 0, flags));
        let stream_leaf =
            Arc::new(TypeDescriptor::new("com.example.Leaf", 0, flags).with_super(Some(extra)));

        let slots = stream_leaf.data_layout(&leaf);
        assert_eq!(slots.len(), 3);
        assert!(slots[0].local.is_none() && slots[0].has_data);
        assert_eq!(slots[1].local.as_ref().unwrap().name(), "com.example.Base");
        assert!(!slots[1].has_data);
        assert_eq!(slots[2].desc.as_ref().unwrap().name(), "com.example.Leaf");
        assert!(slots[2].has_data);
    }
}
