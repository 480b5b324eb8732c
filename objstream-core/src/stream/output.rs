//! The encoder: writes object graphs to a byte sink.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use super::fields::PutField;
use super::depth_exceeded;
use super::handles::{Handle, HandleTable, Retained};
use crate::config::{ProtocolVersion, StreamConfig};
use crate::descriptor::{DescriptorFlags, DescriptorRegistry, TypeDescriptor};
use crate::error::{Result, StreamError};
use crate::io::{mutf8, DataOutput, DataSink, ObjectDataOutput};
use crate::model::{
    builtins, ArrayData, ClassRef, CustomSerialization, Externalizable, Identity, Instance, Object,
    ObjectRef, ObjectReplacer, Value,
};
use crate::protocol::{
    tag_name, MAX_BLOCK_SIZE, MAX_SHORT_STRING, SC_BLOCK_DATA, SHORT_BLOCK_LIMIT, STREAM_MAGIC,
    STREAM_VERSION, TC_ARRAY, TC_BLOCKDATA, TC_BLOCKDATALONG, TC_CLASS, TC_CLASSDESC,
    TC_ENDBLOCKDATA, TC_ENUM, TC_EXCEPTION, TC_LONGSTRING, TC_NULL, TC_OBJECT,
    TC_PROXYCLASSDESC, TC_REFERENCE, TC_RESET, TC_STRING,
};

/// The encoder operations available to custom write hooks.
///
/// Primitive writes made through [`DataOutput`] inside a hook are framed as
/// block data.
pub trait ObjectOutput: DataOutput {
    /// Writes a value, emitting a back-reference if it was written before.
    fn write_object(&mut self, value: Value) -> Result<()>;

    /// Writes a value as a fresh record that later writes cannot refer back to.
    fn write_unshared(&mut self, value: Value) -> Result<()>;

    /// Writes the declared fields of the class level being written.
    fn default_write_object(&mut self) -> Result<()>;

    /// Returns a [`PutField`] for the class level being written.
    fn put_fields(&mut self) -> Result<PutField>;

    /// Writes field values assembled with [`put_fields`](ObjectOutput::put_fields).
    fn write_fields(&mut self, fields: PutField) -> Result<()>;

    /// Writes a reset record. Fails while an object is being written.
    fn reset(&mut self) -> Result<()>;

    /// Drains buffered block data and flushes the sink.
    fn flush(&mut self) -> Result<()>;
}

struct WriteContext {
    object: ObjectRef,
    desc: Arc<TypeDescriptor>,
}

/// What kind of record an object needs.
enum Shape {
    String,
    Array,
    Enum,
    Class(ClassRef),
    Descriptor(Arc<TypeDescriptor>),
    Instance(ClassRef),
}

fn shape_of(object: &ObjectRef) -> Shape {
    match &*object.read() {
        Object::String(_) => Shape::String,
        Object::Array(_) => Shape::Array,
        Object::Enum(_) => Shape::Enum,
        Object::Class(class) => Shape::Class(class.clone()),
        Object::Descriptor(desc) => Shape::Descriptor(desc.clone()),
        Object::Instance(instance) => Shape::Instance(instance.class().clone()),
    }
}

/// Writes object graphs, primitives and block data to a byte sink.
///
/// # Examples
///
/// ```
/// use objstream_core::model::{ClassDefinition, FieldType, ObjectRef};
/// use objstream_core::stream::ObjectOutputStream;
///
/// let point = ClassDefinition::builder("com.example.Point")
///     .serializable()
///     .field("x", FieldType::Int)
///     .build();
/// let object = ObjectRef::instance(&point);
/// object.set_field("x", 3).unwrap();
///
/// let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
/// out.write_object(object).unwrap();
/// let bytes = out.into_inner().unwrap();
/// assert_eq!(&bytes[..4], &[0xAC, 0xED, 0x00, 0x05]);
/// ```
pub struct ObjectOutputStream<W: Write> {
    sink: DataSink<W>,
    block: ObjectDataOutput,
    block_mode: bool,
    handles: HandleTable,
    registry: Arc<DescriptorRegistry>,
    protocol: ProtocolVersion,
    depth: usize,
    max_depth: usize,
    context: Option<WriteContext>,
    replace_enabled: bool,
    replacer: Option<Box<dyn ObjectReplacer>>,
}

impl<W: Write> ObjectOutputStream<W> {
    /// Creates a stream with the default configuration and writes the header.
    pub fn new(writer: W) -> Result<Self> {
        Self::with_config(writer, StreamConfig::default())
    }

    /// Creates a stream with `config` and writes the header.
    pub fn with_config(writer: W, config: StreamConfig) -> Result<Self> {
        Self::with_registry(writer, config, DescriptorRegistry::global())
    }

    /// Creates a stream that takes descriptors from `registry`.
    pub fn with_registry(
        writer: W,
        config: StreamConfig,
        registry: Arc<DescriptorRegistry>,
    ) -> Result<Self> {
        let mut sink = DataSink::new(writer);
        sink.write_short(STREAM_MAGIC as i16)?;
        sink.write_short(STREAM_VERSION as i16)?;
        tracing::debug!(
            protocol = config.protocol_version().as_u8(),
            max_depth = config.max_depth(),
            "opened object output stream"
        );
        Ok(Self {
            sink,
            block: ObjectDataOutput::with_capacity(config.block_buffer_capacity()),
            block_mode: true,
            handles: HandleTable::new(),
            registry,
            protocol: config.protocol_version(),
            depth: 0,
            max_depth: config.max_depth(),
            context: None,
            replace_enabled: config.enable_replace(),
            replacer: None,
        })
    }

    /// Writes a value, emitting a back-reference if it was written before.
    ///
    /// A failure at the top level is also recorded in the stream as an
    /// exception record before it is returned.
    pub fn write_object(&mut self, value: impl Into<Value>) -> Result<()> {
        self.write_top(value.into(), false)
    }

    /// Writes a value as a fresh record. The record gets a handle, but
    /// nothing written later refers back to it.
    pub fn write_unshared(&mut self, value: impl Into<Value>) -> Result<()> {
        self.write_top(value.into(), true)
    }

    /// Writes the declared fields of the class level whose custom hook is running.
    pub fn default_write_object(&mut self) -> Result<()> {
        let (object, desc) = self.current_context("not in a custom write hook")?;
        self.set_block_mode(false)?;
        let values = self.field_values(&object, &desc)?;
        self.write_field_values(&desc, values)?;
        self.set_block_mode(true)?;
        Ok(())
    }

    /// Returns a [`PutField`] for the class level whose custom hook is running.
    pub fn put_fields(&mut self) -> Result<PutField> {
        let (_, desc) = self.current_context("not in a custom write hook")?;
        Ok(PutField::new(desc))
    }

    /// Writes field values assembled with [`put_fields`](Self::put_fields).
    pub fn write_fields(&mut self, fields: PutField) -> Result<()> {
        let (_, desc) = self.current_context("no current PutField object")?;
        if !Arc::ptr_eq(fields.descriptor(), &desc) {
            return Err(StreamError::NotActive(format!(
                "PutField for {} used while writing {}",
                fields.descriptor().name(),
                desc.name()
            )));
        }
        self.set_block_mode(false)?;
        self.write_field_values(&desc, fields.into_values())?;
        self.set_block_mode(true)?;
        Ok(())
    }

    /// Drains block data and writes a reset record; every object written
    /// afterwards is written anew.
    pub fn reset(&mut self) -> Result<()> {
        if self.depth != 0 {
            return Err(StreamError::NotActive("stream active".to_string()));
        }
        self.set_block_mode(false)?;
        self.sink.write_bytes(&[TC_RESET])?;
        self.handles.reset();
        self.set_block_mode(true)?;
        tracing::debug!("wrote stream reset");
        Ok(())
    }

    /// Drains buffered block data and flushes the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.drain()?;
        self.sink.flush()
    }

    /// Flushes and returns the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink.into_inner())
    }

    /// Returns the sink.
    pub fn get_ref(&self) -> &W {
        self.sink.get_ref()
    }

    /// Returns the protocol version in use.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Switches the protocol version. Only allowed before the first record.
    pub fn use_protocol_version(&mut self, version: ProtocolVersion) -> Result<()> {
        if !self.handles.is_empty() {
            return Err(StreamError::NotActive("stream non-empty".to_string()));
        }
        self.protocol = version;
        Ok(())
    }

    /// Installs `replacer` and enables stream-level replacement.
    ///
    /// Every object about to be written, after any class-level replacement,
    /// is passed to the replacer and its result written instead.
    pub fn enable_replace_object(&mut self, replacer: impl ObjectReplacer + 'static) {
        self.replacer = Some(Box::new(replacer));
        self.replace_enabled = true;
    }

    /// Disables stream-level replacement. Returns whether it was enabled.
    pub fn disable_replace_object(&mut self) -> bool {
        std::mem::replace(&mut self.replace_enabled, false)
    }

    /// Number of handles assigned since the last reset.
    pub fn handle_count(&self) -> usize {
        self.handles.next_handle().index().unwrap_or(0)
    }

    fn current_context(&self, missing: &str) -> Result<(ObjectRef, Arc<TypeDescriptor>)> {
        self.context
            .as_ref()
            .map(|c| (c.object.clone(), c.desc.clone()))
            .ok_or_else(|| StreamError::NotActive(missing.to_string()))
    }

    fn write_top(&mut self, value: Value, unshared: bool) -> Result<()> {
        let result = self.write_value(&value, unshared);
        if let Err(err) = &result {
            if self.depth == 0 {
                self.record_failure(err);
            }
        }
        result
    }

    /// Writes `err` as an exception record between two table resets.
    fn record_failure(&mut self, err: &StreamError) {
        if matches!(err, StreamError::Io(_)) {
            return;
        }
        tracing::debug!(kind = err.kind(), error = %err, "recording write failure in stream");
        if let Err(secondary) = self.write_failure_record(err) {
            tracing::warn!(
                error = %secondary,
                original = %err,
                "failed to record write failure"
            );
        }
    }

    fn write_failure_record(&mut self, err: &StreamError) -> Result<()> {
        let failure = ObjectRef::instance(&builtins::failure_class());
        failure.set_field("kind", Value::string(err.kind()))?;
        failure.set_field("message", Value::string(err.to_string()))?;

        self.handles.reset();
        let old_mode = self.set_block_mode(false)?;
        self.sink.write_bytes(&[TC_EXCEPTION])?;
        let result = self.write_value(&Value::Object(failure), false);
        self.handles.reset();
        let restored = self.set_block_mode(old_mode);
        result.and(restored.map(drop))
    }

    fn set_block_mode(&mut self, mode: bool) -> Result<bool> {
        let old = self.block_mode;
        if old != mode {
            if old {
                self.drain()?;
            }
            self.block_mode = mode;
        }
        Ok(old)
    }

    fn drain(&mut self) -> Result<()> {
        while !self.block.is_empty() {
            let len = self.block.len().min(MAX_BLOCK_SIZE);
            let chunk = self.block.take_front(len);
            self.write_block_header(len)?;
            self.sink.write_bytes(&chunk)?;
        }
        Ok(())
    }

    fn write_block_header(&mut self, len: usize) -> Result<()> {
        if len < SHORT_BLOCK_LIMIT {
            self.sink.write_bytes(&[TC_BLOCKDATA, len as u8])
        } else {
            self.sink.write_bytes(&[TC_BLOCKDATALONG])?;
            self.sink.write_int(len as i32)
        }
    }

    fn write_tag(&mut self, tag: u8) -> Result<()> {
        self.sink.write_bytes(&[tag])
    }

    fn write_value(&mut self, value: &Value, unshared: bool) -> Result<()> {
        let old_mode = self.set_block_mode(false)?;
        self.depth += 1;
        let result = self.write_value_inner(value, unshared);
        self.depth -= 1;
        let restored = self.set_block_mode(old_mode);
        result.and(restored.map(drop))
    }

    fn write_value_inner(&mut self, value: &Value, unshared: bool) -> Result<()> {
        let mut object = match value {
            Value::Null => return self.write_null(),
            Value::Object(object) => object.clone(),
            primitive => return Err(primitive_as_object(primitive)),
        };
        if self.depth > self.max_depth {
            return Err(depth_exceeded(self.max_depth));
        }

        match self.handles.substitution(object.identity()) {
            Some(Value::Object(substitute)) => object = substitute.clone(),
            Some(_) => return self.write_null(),
            None => {}
        }
        if !unshared {
            if let Some(handle) = self.handles.get(object.identity()) {
                return self.write_handle(handle);
            }
        }
        match shape_of(&object) {
            Shape::Class(class) => return self.write_class(&object, &class, unshared),
            Shape::Descriptor(desc) => return self.write_class_desc(&desc, unshared),
            _ => {}
        }

        let Some(object) = self.replace_for_write(object, unshared)? else {
            return Ok(());
        };

        match shape_of(&object) {
            Shape::String => self.write_string(&object, unshared),
            Shape::Array => self.write_array(&object, unshared),
            Shape::Enum => self.write_enum(&object, unshared),
            Shape::Class(class) => self.write_class(&object, &class, unshared),
            Shape::Descriptor(desc) => self.write_class_desc(&desc, unshared),
            Shape::Instance(class) if class.is_serializable() => {
                self.write_ordinary_object(&object, &class, unshared)
            }
            Shape::Instance(class) => Err(StreamError::NotSerializable(class.name().to_string())),
        }
    }

    /// Returns the object to write after replacement, or `None` once a null
    /// or a back-reference has been written in its place.
    #[inline(never)]
    fn replace_for_write(
        &mut self,
        object: ObjectRef,
        unshared: bool,
    ) -> Result<Option<ObjectRef>> {
        let replacement = match self.apply_replacements(&object)? {
            Value::Object(replacement) if replacement.ptr_eq(&object) => return Ok(Some(object)),
            replacement => replacement,
        };
        self.handles.substitute(&object, replacement.clone());
        let Value::Object(replacement) = replacement else {
            self.write_null()?;
            return Ok(None);
        };
        if !unshared {
            if let Some(handle) = self.handles.get(replacement.identity()) {
                self.write_handle(handle)?;
                return Ok(None);
            }
        }
        Ok(Some(replacement))
    }

    /// Runs class-level write-replace hooks until the class stops changing,
    /// then the stream-level replacer.
    fn apply_replacements(&mut self, object: &ObjectRef) -> Result<Value> {
        let mut current = Value::Object(object.clone());
        for _ in 0..self.max_depth {
            let Value::Object(candidate) = &current else {
                break;
            };
            let class = match &*candidate.read() {
                Object::Instance(instance) => instance.class().clone(),
                _ => break,
            };
            let Some(hook) = class.find_write_replace().cloned() else {
                break;
            };
            let replacement = hook.write_replace(candidate)?;
            let class_changed = match &replacement {
                Value::Object(next) => match &*next.read() {
                    Object::Instance(instance) => !Arc::ptr_eq(instance.class(), &class),
                    _ => true,
                },
                _ => false,
            };
            current = replacement;
            if !class_changed {
                break;
            }
        }

        if self.replace_enabled {
            if let (Some(replacer), Value::Object(candidate)) = (self.replacer.as_mut(), &current) {
                current = replacer.replace_object(candidate)?;
            }
        }
        if current.is_primitive() {
            return Err(StreamError::InvalidObject(format!(
                "replacement for {} is a {} value",
                object.class_name(),
                current.type_name()
            )));
        }
        Ok(current)
    }

    fn assign_handle(&mut self, object: &ObjectRef, unshared: bool) -> Handle {
        if unshared {
            self.handles.skip()
        } else {
            self.handles
                .put(object.identity(), Retained::Object(object.clone()))
        }
    }

    fn write_null(&mut self) -> Result<()> {
        self.write_tag(TC_NULL)
    }

    #[inline(never)]
    fn write_handle(&mut self, handle: Handle) -> Result<()> {
        tracing::trace!(tag = tag_name(TC_REFERENCE), handle = %handle, "writing record");
        self.write_tag(TC_REFERENCE)?;
        self.sink.write_int(handle.raw() as i32)
    }

    fn write_string(&mut self, object: &ObjectRef, unshared: bool) -> Result<()> {
        let handle = self.assign_handle(object, unshared);
        let guard = object.read();
        let Object::String(text) = &*guard else {
            return Err(StreamError::InvalidObject("expected a string".to_string()));
        };
        let len = mutf8::encoded_len(text);
        if len <= MAX_SHORT_STRING {
            tracing::trace!(tag = tag_name(TC_STRING), handle = %handle, len, "writing record");
            self.write_tag(TC_STRING)?;
            self.sink.write_short(len as u16 as i16)?;
        } else {
            tracing::trace!(tag = tag_name(TC_LONGSTRING), handle = %handle, len, "writing record");
            self.write_tag(TC_LONGSTRING)?;
            self.sink.write_long(len as i64)?;
        }
        self.sink.write_bytes(&mutf8::encode(text))
    }

    /// Writes a reference field's type signature, shared across descriptors.
    fn write_type_string(&mut self, signature: &ObjectRef) -> Result<()> {
        match self.handles.get(signature.identity()) {
            Some(handle) => self.write_handle(handle),
            None => self.write_string(signature, false),
        }
    }

    fn write_array(&mut self, object: &ObjectRef, unshared: bool) -> Result<()> {
        let component = match &*object.read() {
            Object::Array(array) => array.component().clone(),
            _ => return Err(StreamError::InvalidObject("expected an array".to_string())),
        };
        let desc = self.registry.lookup_array(&component)?;
        self.write_tag(TC_ARRAY)?;
        self.write_class_desc(&desc, false)?;
        let handle = self.assign_handle(object, unshared);

        let elements = {
            let guard = object.read();
            let Object::Array(array) = &*guard else {
                return Err(StreamError::InvalidObject("expected an array".to_string()));
            };
            let len = i32::try_from(array.len()).map_err(|_| {
                StreamError::InvalidObject(format!("array of {} elements is too long", array.len()))
            })?;
            trace_record(TC_ARRAY, handle, desc.name());
            self.sink.write_int(len)?;
            match array.data() {
                ArrayData::Reference(values) => values.clone(),
                primitive => {
                    self.write_primitive_elements(primitive)?;
                    Vec::new()
                }
            }
        };
        for element in &elements {
            self.write_value(element, false)?;
        }
        Ok(())
    }

    fn write_primitive_elements(&mut self, data: &ArrayData) -> Result<()> {
        let mut buf = ObjectDataOutput::new();
        match data {
            ArrayData::Boolean(v) => v.iter().try_for_each(|x| buf.write_bool(*x))?,
            ArrayData::Byte(v) => v.iter().try_for_each(|x| buf.write_byte(*x))?,
            ArrayData::Char(v) => v.iter().try_for_each(|x| buf.write_char(*x))?,
            ArrayData::Short(v) => v.iter().try_for_each(|x| buf.write_short(*x))?,
            ArrayData::Int(v) => v.iter().try_for_each(|x| buf.write_int(*x))?,
            ArrayData::Long(v) => v.iter().try_for_each(|x| buf.write_long(*x))?,
            ArrayData::Float(v) => v.iter().try_for_each(|x| buf.write_float(*x))?,
            ArrayData::Double(v) => v.iter().try_for_each(|x| buf.write_double(*x))?,
            ArrayData::Reference(_) => {}
        }
        self.sink.write_bytes(buf.as_bytes())
    }

    fn write_enum(&mut self, object: &ObjectRef, unshared: bool) -> Result<()> {
        let (class, name) = match &*object.read() {
            Object::Enum(constant) => (constant.class(), constant.name().to_string()),
            _ => return Err(StreamError::InvalidObject("expected an enum constant".to_string())),
        };
        let class = class.ok_or_else(|| {
            StreamError::InvalidObject(format!("enum constant {} outlived its class", name))
        })?;
        let desc = self.registry.lookup(&class)?;
        let desc = match desc.super_descriptor() {
            Some(parent) if parent.name() != builtins::ENUM_CLASS => parent.clone(),
            _ => desc,
        };
        self.write_tag(TC_ENUM)?;
        self.write_class_desc(&desc, false)?;
        let handle = self.assign_handle(object, unshared);
        tracing::trace!(tag = tag_name(TC_ENUM), handle = %handle, constant = %name, "writing record");
        self.write_string(&ObjectRef::string(name), false)
    }

    fn write_class(&mut self, object: &ObjectRef, class: &ClassRef, unshared: bool) -> Result<()> {
        let desc = self.registry.lookup(class)?;
        self.write_tag(TC_CLASS)?;
        self.write_class_desc(&desc, false)?;
        let handle = self.assign_handle(object, unshared);
        tracing::trace!(tag = tag_name(TC_CLASS), handle = %handle, class = %class.name(), "writing record");
        Ok(())
    }

    fn write_class_desc(&mut self, desc: &Arc<TypeDescriptor>, unshared: bool) -> Result<()> {
        if !unshared {
            if let Some(handle) = self.handles.get(Identity::of(desc)) {
                return self.write_handle(handle);
            }
        }
        let handle = if unshared {
            self.handles.skip()
        } else {
            self.handles
                .put(Identity::of(desc), Retained::Descriptor(desc.clone()))
        };
        if desc.is_proxy() {
            self.write_proxy_desc(desc, handle)
        } else {
            self.write_non_proxy_desc(desc, handle)
        }
    }

    fn write_non_proxy_desc(&mut self, desc: &Arc<TypeDescriptor>, handle: Handle) -> Result<()> {
        tracing::trace!(
            tag = tag_name(TC_CLASSDESC),
            handle = %handle,
            class = %desc.name(),
            "writing record"
        );
        self.write_tag(TC_CLASSDESC)?;
        self.sink.write_utf(desc.name())?;
        self.sink.write_long(desc.version_tag())?;
        let flags = self.wire_flags(desc.flags());
        self.sink.write_bytes(&[flags.bits()])?;
        let count = i16::try_from(desc.fields().len())
            .map_err(|_| StreamError::invalid_class(desc.name(), "too many serializable fields"))?;
        self.sink.write_short(count)?;
        for field in desc.fields() {
            self.sink.write_bytes(&[field.type_code()])?;
            self.sink.write_utf(field.name())?;
            if !field.is_primitive() {
                let signature = self
                    .registry
                    .intern_signature(&field.field_type().signature());
                self.write_type_string(&signature)?;
            }
        }
        // No class annotations.
        self.write_tag(TC_ENDBLOCKDATA)?;
        self.write_super_desc(desc)
    }

    fn write_proxy_desc(&mut self, desc: &Arc<TypeDescriptor>, handle: Handle) -> Result<()> {
        tracing::trace!(
            tag = tag_name(TC_PROXYCLASSDESC),
            handle = %handle,
            class = %desc.name(),
            "writing record"
        );
        self.write_tag(TC_PROXYCLASSDESC)?;
        let interfaces = desc.proxy_interfaces().unwrap_or_default();
        self.sink.write_int(interfaces.len() as i32)?;
        for name in interfaces {
            self.sink.write_utf(name)?;
        }
        self.write_tag(TC_ENDBLOCKDATA)?;
        self.write_super_desc(desc)
    }

    fn write_super_desc(&mut self, desc: &TypeDescriptor) -> Result<()> {
        match desc.super_descriptor() {
            Some(parent) => self.write_class_desc(parent, false),
            None => self.write_null(),
        }
    }

    fn wire_flags(&self, flags: DescriptorFlags) -> DescriptorFlags {
        if flags.is_externalizable() && self.protocol == ProtocolVersion::V2 {
            flags.with(SC_BLOCK_DATA)
        } else {
            flags.without(SC_BLOCK_DATA)
        }
    }

    fn write_ordinary_object(
        &mut self,
        object: &ObjectRef,
        class: &ClassRef,
        unshared: bool,
    ) -> Result<()> {
        let desc = self.registry.lookup(class)?;
        self.write_tag(TC_OBJECT)?;
        self.write_class_desc(&desc, false)?;
        let handle = self.assign_handle(object, unshared);
        trace_record(TC_OBJECT, handle, class.name());

        if desc.flags().is_externalizable() && !desc.is_proxy() {
            self.write_external_object(object, class)
        } else {
            self.write_serial_data(object, &desc)
        }
    }

    #[inline(never)]
    fn write_external_object(&mut self, object: &ObjectRef, class: &ClassRef) -> Result<()> {
        let hook = class.find_externalizable().cloned().ok_or_else(|| {
            StreamError::invalid_class(class.name(), "externalizable class has no write hook")
        })?;
        let saved = self.context.take();
        let result = self.write_external_data(object, &hook);
        self.context = saved;
        result
    }

    fn write_external_data(&mut self, object: &ObjectRef, hook: &Arc<dyn Externalizable>) -> Result<()> {
        if self.protocol == ProtocolVersion::V1 {
            return hook.write_external(object, self);
        }
        self.set_block_mode(true)?;
        hook.write_external(object, self)?;
        self.set_block_mode(false)?;
        self.write_tag(TC_ENDBLOCKDATA)
    }

    fn write_serial_data(&mut self, object: &ObjectRef, desc: &Arc<TypeDescriptor>) -> Result<()> {
        for level in desc.hierarchy() {
            let hook = if level.flags().has_write_method() {
                level.local_class().and_then(|c| c.hooks().custom().cloned())
            } else {
                None
            };
            match hook {
                Some(hook) => self.write_level_with_hook(object, &level, &hook)?,
                None => {
                    let values = self.field_values(object, &level)?;
                    self.write_field_values(&level, values)?;
                }
            }
        }
        Ok(())
    }

    #[inline(never)]
    fn write_level_with_hook(
        &mut self,
        object: &ObjectRef,
        level: &Arc<TypeDescriptor>,
        hook: &Arc<dyn CustomSerialization>,
    ) -> Result<()> {
        let saved = self.context.replace(WriteContext {
            object: object.clone(),
            desc: level.clone(),
        });
        let result = self.invoke_write_hook(object, hook);
        self.context = saved;
        result
    }

    fn invoke_write_hook(
        &mut self,
        object: &ObjectRef,
        hook: &Arc<dyn CustomSerialization>,
    ) -> Result<()> {
        self.set_block_mode(true)?;
        hook.write_object(object, self)?;
        self.set_block_mode(false)?;
        self.write_tag(TC_ENDBLOCKDATA)
    }

    /// Snapshots one level's field values so no lock is held while they are written.
    fn field_values(&self, object: &ObjectRef, desc: &TypeDescriptor) -> Result<Vec<Value>> {
        let guard = object.read();
        let Object::Instance(instance) = &*guard else {
            return Err(StreamError::InvalidObject(format!(
                "{} is not an instance of {}",
                guard.class_name(),
                desc.name()
            )));
        };
        Ok(level_values(instance, desc))
    }

    fn write_field_values(&mut self, desc: &TypeDescriptor, values: Vec<Value>) -> Result<()> {
        for (field, value) in desc.fields().iter().zip(values) {
            if field.is_primitive() {
                self.write_primitive(&value)?;
            } else {
                self.write_value(&value, field.is_unshared())?;
            }
        }
        Ok(())
    }

    fn write_primitive(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Boolean(v) => self.write_bool(*v),
            Value::Byte(v) => self.write_byte(*v),
            Value::Char(v) => self.write_char(*v),
            Value::Short(v) => self.write_short(*v),
            Value::Int(v) => self.write_int(*v),
            Value::Long(v) => self.write_long(*v),
            Value::Float(v) => self.write_float(*v),
            Value::Double(v) => self.write_double(*v),
            other => Err(StreamError::InvalidObject(format!(
                "expected a primitive value, found {}",
                other.type_name()
            ))),
        }
    }
}

#[inline(never)]
fn trace_record(tag: u8, handle: Handle, class: &str) {
    tracing::trace!(tag = tag_name(tag), handle = %handle, class, "writing record");
}

#[cold]
fn primitive_as_object(value: &Value) -> StreamError {
    StreamError::InvalidObject(format!(
        "cannot write a {} value as an object",
        value.type_name()
    ))
}

fn level_values(instance: &Instance, desc: &TypeDescriptor) -> Vec<Value> {
    desc.fields()
        .iter()
        .map(|field| match field.accessor() {
            Some(accessor) => accessor.get(instance),
            None => Value::default_for(field.field_type()),
        })
        .collect()
}

impl<W: Write> DataOutput for ObjectOutputStream<W> {
    fn write_bytes(&mut self, v: &[u8]) -> Result<()> {
        if !self.block_mode {
            return self.sink.write_bytes(v);
        }
        self.block.write_bytes(v)?;
        while self.block.len() >= MAX_BLOCK_SIZE {
            let chunk = self.block.take_front(MAX_BLOCK_SIZE);
            self.write_block_header(MAX_BLOCK_SIZE)?;
            self.sink.write_bytes(&chunk)?;
        }
        Ok(())
    }
}

impl<W: Write> ObjectOutput for ObjectOutputStream<W> {
    fn write_object(&mut self, value: Value) -> Result<()> {
        ObjectOutputStream::write_object(self, value)
    }

    fn write_unshared(&mut self, value: Value) -> Result<()> {
        ObjectOutputStream::write_unshared(self, value)
    }

    fn default_write_object(&mut self) -> Result<()> {
        ObjectOutputStream::default_write_object(self)
    }

    fn put_fields(&mut self) -> Result<PutField> {
        ObjectOutputStream::put_fields(self)
    }

    fn write_fields(&mut self, fields: PutField) -> Result<()> {
        ObjectOutputStream::write_fields(self, fields)
    }

    fn reset(&mut self) -> Result<()> {
        ObjectOutputStream::reset(self)
    }

    fn flush(&mut self) -> Result<()> {
        ObjectOutputStream::flush(self)
    }
}

impl<W: Write> fmt::Debug for ObjectOutputStream<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectOutputStream")
            .field("protocol", &self.protocol)
            .field("depth", &self.depth)
            .field("handles", &self.handles.len())
            .field("buffered", &self.block.len())
            .field("block_mode", &self.block_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDefinition, FieldType};

    fn written(f: impl FnOnce(&mut ObjectOutputStream<Vec<u8>>)) -> Vec<u8> {
        let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
        f(&mut out);
        out.into_inner().unwrap()
    }

    #[test]
    fn test_header() {
        assert_eq!(written(|_| {}), vec![0xAC, 0xED, 0x00, 0x05]);
    }

    #[test]
    fn test_null_record() {
        let bytes = written(|out| out.write_object(Value::Null).unwrap());
        assert_eq!(&bytes[4..], &[TC_NULL]);
    }

    #[test]
    fn test_string_and_back_reference() {
        let s = ObjectRef::string("hi");
        let bytes = written(|out| {
            out.write_object(s.clone()).unwrap();
            out.write_object(s.clone()).unwrap();
        });
        assert_eq!(
            &bytes[4..],
            &[TC_STRING, 0, 2, b'h', b'i', TC_REFERENCE, 0x00, 0x7E, 0x00, 0x00]
        );
    }

    #[test]
    fn test_unshared_string_is_not_referenced() {
        let s = ObjectRef::string("a");
        let bytes = written(|out| {
            out.write_unshared(s.clone()).unwrap();
            out.write_object(s.clone()).unwrap();
        });
        assert_eq!(&bytes[4..], &[TC_STRING, 0, 1, b'a', TC_STRING, 0, 1, b'a']);
    }

    #[test]
    fn test_top_level_primitives_are_block_data() {
        let bytes = written(|out| {
            out.write_int(7).unwrap();
            out.write_bool(true).unwrap();
        });
        assert_eq!(&bytes[4..], &[TC_BLOCKDATA, 5, 0, 0, 0, 7, 1]);
    }

    #[test]
    fn test_large_block_data_is_chunked() {
        let data = vec![0x11u8; 1500];
        let bytes = written(|out| out.write_bytes(&data).unwrap());
        let body = &bytes[4..];
        assert_eq!(&body[..5], &[TC_BLOCKDATALONG, 0, 0, 0x04, 0x00]);
        let rest = &body[5 + 1024..];
        assert_eq!(&rest[..5], &[TC_BLOCKDATALONG, 0, 0, 0x01, 0xDC]);
        assert_eq!(rest.len(), 5 + 476);
    }

    #[test]
    fn test_reset_record() {
        let s = ObjectRef::string("x");
        let bytes = written(|out| {
            out.write_object(s.clone()).unwrap();
            out.reset().unwrap();
            out.write_object(s.clone()).unwrap();
        });
        assert_eq!(
            &bytes[4..],
            &[TC_STRING, 0, 1, b'x', TC_RESET, TC_STRING, 0, 1, b'x']
        );
    }

    #[test]
    fn test_not_serializable_is_recorded() {
        let socket = ClassDefinition::builder("com.example.Socket").build();
        let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
        let err = out.write_object(ObjectRef::instance(&socket)).unwrap_err();
        assert!(matches!(err, StreamError::NotSerializable(ref name) if name == "com.example.Socket"));
        let bytes = out.into_inner().unwrap();
        assert_eq!(bytes[4], TC_EXCEPTION);
        assert_eq!(bytes[5], TC_OBJECT);
    }

    #[test]
    fn test_primitive_at_object_position_is_rejected() {
        let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
        assert!(matches!(
            out.write_object(5),
            Err(StreamError::InvalidObject(_))
        ));
    }

    #[test]
    fn test_context_operations_outside_hook() {
        let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
        assert!(matches!(out.default_write_object(), Err(StreamError::NotActive(_))));
        assert!(matches!(out.put_fields(), Err(StreamError::NotActive(_))));
    }

    #[test]
    fn test_protocol_version_only_before_first_record() {
        let mut out = ObjectOutputStream::new(Vec::new()).unwrap();
        out.use_protocol_version(ProtocolVersion::V1).unwrap();
        out.write_object(Value::string("s")).unwrap();
        assert!(out.use_protocol_version(ProtocolVersion::V2).is_err());
        assert_eq!(out.protocol_version(), ProtocolVersion::V1);
    }

    #[test]
    fn test_depth_limit() {
        let node = ClassDefinition::builder("com.example.Node")
            .serializable()
            .field("next", FieldType::object("com.example.Node"))
            .build();
        let head = ObjectRef::instance(&node);
        let mut tail = head.clone();
        for _ in 0..10 {
            let next = ObjectRef::instance(&node);
            tail.set_field("next", next.clone()).unwrap();
            tail = next;
        }
        let config = StreamConfig::builder().max_depth(4).build().unwrap();
        let mut out = ObjectOutputStream::with_config(Vec::new(), config).unwrap();
        assert!(matches!(
            out.write_object(head),
            Err(StreamError::InvalidObject(_))
        ));
    }
}
