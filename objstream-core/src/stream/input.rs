//! The decoder: rebuilds object graphs from a byte source.

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use super::fields::GetField;
use super::depth_exceeded;
use super::handles::{Handle, ReadHandleTable, ReadSlot};
use crate::config::StreamConfig;
use crate::descriptor::{DescriptorFlags, DescriptorRegistry, StreamField, TypeDescriptor};
use crate::error::{Result, StreamError};
use crate::io::{mutf8, DataInput, DataSource, ObjectDataInput};
use crate::model::{
    builtins, Array, ClassRef, CustomSerialization, Externalizable, FieldType, Instance, Object,
    ObjectInputValidation, ObjectRef, ObjectResolver, Value, MAX_ARRAY_DIMENSIONS, STRING_CLASS,
};
use crate::protocol::{
    tag_name, SC_SERIALIZABLE, STREAM_MAGIC, STREAM_VERSION, TC_ARRAY, TC_BASE, TC_BLOCKDATA,
    TC_BLOCKDATALONG, TC_CLASS, TC_CLASSDESC, TC_ENDBLOCKDATA, TC_ENUM, TC_EXCEPTION,
    TC_LONGSTRING, TC_MAX, TC_NULL, TC_OBJECT, TC_PROXYCLASSDESC, TC_REFERENCE, TC_RESET,
    TC_STRING,
};
use crate::resolve::{ClassRegistry, ClassResolver};

/// Largest piece read or preallocated at once for a length taken from the stream.
const READ_CHUNK: usize = 64 * 1024;

/// Most interfaces a proxy class descriptor may list.
const MAX_PROXY_INTERFACES: i32 = 65535;

/// The decoder operations available to custom read hooks.
///
/// Primitive reads made through [`DataInput`] inside a hook consume block
/// data and fail at the end of the level's custom data.
pub trait ObjectInput: DataInput {
    /// Reads the next value.
    fn read_object(&mut self) -> Result<Value>;

    /// Reads the next value, which must not be a back-reference, and makes
    /// it unavailable to later back-references.
    fn read_unshared(&mut self) -> Result<Value>;

    /// Reads the declared fields of the class level being read.
    fn default_read_object(&mut self) -> Result<()>;

    /// Reads the declared fields of the class level being read into a [`GetField`].
    fn read_fields(&mut self) -> Result<GetField>;

    /// Registers a callback run once the whole top-level graph has been read.
    ///
    /// Higher priorities run first.
    fn register_validation(
        &mut self,
        callback: Box<dyn ObjectInputValidation>,
        priority: i32,
    ) -> Result<()>;

    /// Bytes left in the current data block.
    fn available(&mut self) -> Result<usize>;
}

#[derive(Clone)]
struct ReadContext {
    object: ObjectRef,
    desc: Arc<TypeDescriptor>,
    local: ClassRef,
}

struct Validation {
    priority: i32,
    sequence: u64,
    callback: Box<dyn ObjectInputValidation>,
}

/// Reads object graphs, primitives and block data from a byte source.
///
/// Class names found in the stream are mapped to local classes through a
/// [`ClassResolver`]; builtin classes need no registration.
///
/// # Examples
///
/// ```
/// use objstream_core::model::{ClassDefinition, FieldType, ObjectRef};
/// use objstream_core::resolve::ClassRegistry;
/// use objstream_core::stream::{ObjectInputStream, ObjectOutputStream};
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
///
/// let mut classes = ClassRegistry::new();
/// classes.register(&point);
/// let mut input = ObjectInputStream::with_resolver(bytes.as_slice(), classes).unwrap();
/// let copy = input.read_object().unwrap();
/// assert_eq!(copy.as_object().unwrap().get_field("x").unwrap().as_int(), Some(3));
/// ```
pub struct ObjectInputStream<R: Read> {
    source: DataSource<R>,
    registry: Arc<DescriptorRegistry>,
    resolver: Box<dyn ClassResolver>,
    handles: ReadHandleTable,
    block_mode: bool,
    block_remaining: usize,
    default_data_end: bool,
    depth: usize,
    descriptor_depth: usize,
    max_depth: usize,
    context: Option<ReadContext>,
    resolve_enabled: bool,
    object_resolver: Option<Box<dyn ObjectResolver>>,
    validations: Vec<Validation>,
    validation_sequence: u64,
}

impl<R: Read> ObjectInputStream<R> {
    /// Creates a stream that knows only builtin classes and reads the header.
    pub fn new(reader: R) -> Result<Self> {
        Self::with_resolver(reader, ClassRegistry::new())
    }

    /// Creates a stream that resolves classes through `resolver`.
    pub fn with_resolver(reader: R, resolver: impl ClassResolver + 'static) -> Result<Self> {
        Self::with_config(reader, resolver, StreamConfig::default())
    }

    /// Creates a stream with `config`.
    pub fn with_config(
        reader: R,
        resolver: impl ClassResolver + 'static,
        config: StreamConfig,
    ) -> Result<Self> {
        Self::with_registry(reader, resolver, config, DescriptorRegistry::global())
    }

    /// Creates a stream that takes local descriptors from `registry`.
    pub fn with_registry(
        reader: R,
        resolver: impl ClassResolver + 'static,
        config: StreamConfig,
        registry: Arc<DescriptorRegistry>,
    ) -> Result<Self> {
        let mut source = DataSource::new(reader);
        let magic = source.read_unsigned_short()?;
        let version = source.read_unsigned_short()?;
        if magic != STREAM_MAGIC || version != STREAM_VERSION {
            return Err(StreamError::StreamCorrupted(format!(
                "invalid stream header: {:04X}{:04X}",
                magic, version
            )));
        }
        tracing::debug!(max_depth = config.max_depth(), "opened object input stream");
        Ok(Self {
            source,
            registry,
            resolver: Box::new(resolver),
            handles: ReadHandleTable::new(),
            block_mode: true,
            block_remaining: 0,
            default_data_end: false,
            depth: 0,
            descriptor_depth: 0,
            max_depth: config.max_depth(),
            context: None,
            resolve_enabled: config.enable_resolve(),
            object_resolver: None,
            validations: Vec::new(),
            validation_sequence: 0,
        })
    }

    /// Reads the next value.
    ///
    /// At the top level, validation callbacks registered while reading the
    /// graph run before it is returned. A clean end of input at a record
    /// boundary is [`StreamError::EndOfStream`]; primitive data where an
    /// object was expected is [`StreamError::OptionalData`].
    pub fn read_object(&mut self) -> Result<Value> {
        self.read_top(false)
    }

    /// Reads the next value as unshared.
    ///
    /// Fails if the value is a back-reference; later back-references to it
    /// fail too.
    pub fn read_unshared(&mut self) -> Result<Value> {
        self.read_top(true)
    }

    /// Reads the next value, or returns `None` at a clean end of stream.
    pub fn try_read_object(&mut self) -> Result<Option<Value>> {
        match self.read_object() {
            Ok(value) => Ok(Some(value)),
            Err(StreamError::EndOfStream) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Reads the declared fields of the class level whose custom hook is running.
    pub fn default_read_object(&mut self) -> Result<()> {
        let context = self.current_context("not in a custom read hook")?;
        self.set_block_mode(false)?;
        let values = self.read_field_values(&context.desc)?;
        self.assign_fields(&context.object, &context.desc, values)?;
        self.set_block_mode(true)?;
        if !context.desc.flags().has_write_method() {
            self.default_data_end = true;
        }
        Ok(())
    }

    /// Reads the declared fields of the class level whose custom hook is
    /// running, without assigning them.
    pub fn read_fields(&mut self) -> Result<GetField> {
        let context = self.current_context("not in a custom read hook")?;
        self.set_block_mode(false)?;
        let values = self.read_field_values(&context.desc)?;
        self.set_block_mode(true)?;
        if !context.desc.flags().has_write_method() {
            self.default_data_end = true;
        }
        Ok(GetField::new(context.desc, Some(context.local), values))
    }

    /// Registers a callback run once the top-level graph being read is
    /// complete. Higher priorities run first; among equal priorities the
    /// latest registration runs first.
    pub fn register_validation(
        &mut self,
        callback: impl ObjectInputValidation + 'static,
        priority: i32,
    ) -> Result<()> {
        self.push_validation(Box::new(callback), priority)
    }

    /// Bytes left in the current data block, or 0 outside block data.
    pub fn available(&mut self) -> Result<usize> {
        if self.block_mode && self.refill()? {
            Ok(self.block_remaining)
        } else {
            Ok(0)
        }
    }

    /// Installs `resolver` and enables stream-level resolution.
    ///
    /// Every string, array, enum constant and object read afterwards is
    /// passed to the resolver and its result returned instead.
    pub fn enable_resolve_object(&mut self, resolver: impl ObjectResolver + 'static) {
        self.object_resolver = Some(Box::new(resolver));
        self.resolve_enabled = true;
    }

    /// Disables stream-level resolution. Returns whether it was enabled.
    pub fn disable_resolve_object(&mut self) -> bool {
        std::mem::replace(&mut self.resolve_enabled, false)
    }

    /// Number of handles assigned since the last reset.
    pub fn handle_count(&self) -> usize {
        self.handles.len()
    }

    /// Returns the number of bytes consumed from the source.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Returns the source.
    pub fn into_inner(self) -> R {
        self.source.into_inner()
    }

    fn current_context(&self, missing: &str) -> Result<ReadContext> {
        self.context
            .clone()
            .ok_or_else(|| StreamError::NotActive(missing.to_string()))
    }

    fn push_validation(
        &mut self,
        callback: Box<dyn ObjectInputValidation>,
        priority: i32,
    ) -> Result<()> {
        if self.depth == 0 {
            return Err(StreamError::NotActive("stream inactive".to_string()));
        }
        self.validation_sequence += 1;
        self.validations.push(Validation {
            priority,
            sequence: self.validation_sequence,
            callback,
        });
        Ok(())
    }

    fn read_top(&mut self, unshared: bool) -> Result<Value> {
        let outermost = self.depth == 0;
        let result = self.read_value(unshared);
        if !outermost {
            return result;
        }
        let mut validations = std::mem::take(&mut self.validations);
        let value = result?;
        validations.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.sequence.cmp(&a.sequence))
        });
        for validation in &mut validations {
            validation.callback.validate_object()?;
        }
        Ok(value)
    }

    fn set_block_mode(&mut self, mode: bool) -> Result<bool> {
        let old = self.block_mode;
        if old == mode {
            return Ok(old);
        }
        if mode {
            self.block_remaining = 0;
        } else if self.block_remaining > 0 {
            return Err(StreamError::StreamCorrupted("unread block data".to_string()));
        }
        self.block_mode = mode;
        Ok(old)
    }

    /// Moves to the next non-empty data block. Returns false at the end of
    /// block data.
    fn refill(&mut self) -> Result<bool> {
        while self.block_remaining == 0 {
            let Some(tag) = self.source.peek_byte()? else {
                return Ok(false);
            };
            match tag {
                TC_BLOCKDATA => {
                    self.source.next_byte()?;
                    self.block_remaining = self.source.read_unsigned_byte()? as usize;
                }
                TC_BLOCKDATALONG => {
                    self.source.next_byte()?;
                    let len = self.source.read_int()?;
                    if len < 0 {
                        return Err(StreamError::StreamCorrupted(format!(
                            "illegal block data header length: {}",
                            len
                        )));
                    }
                    self.block_remaining = len as usize;
                }
                TC_RESET => {
                    self.source.next_byte()?;
                    self.handle_reset()?;
                }
                TC_BASE..=TC_MAX => return Ok(false),
                other => {
                    return Err(StreamError::StreamCorrupted(format!(
                        "invalid type code: {:02X}",
                        other
                    )))
                }
            }
        }
        Ok(true)
    }

    fn skip_block_data(&mut self) -> Result<()> {
        let mut scratch = [0u8; 1024];
        while self.refill()? {
            let n = self.block_remaining.min(scratch.len());
            self.source.read_fully(&mut scratch[..n])?;
            self.block_remaining -= n;
        }
        Ok(())
    }

    /// Discards the rest of a level's custom data, including any objects in
    /// it, through its end-of-block marker.
    fn skip_custom_data(&mut self) -> Result<()> {
        loop {
            if self.block_mode {
                self.skip_block_data()?;
                self.set_block_mode(false)?;
            }
            match self.source.peek_byte()? {
                Some(TC_BLOCKDATA | TC_BLOCKDATALONG) => {
                    self.set_block_mode(true)?;
                }
                Some(TC_ENDBLOCKDATA) => {
                    self.source.next_byte()?;
                    return Ok(());
                }
                Some(_) => {
                    self.read_value(false)?;
                }
                None => {
                    return Err(StreamError::UnexpectedEof(
                        "missing end of block data marker".to_string(),
                    ))
                }
            }
        }
    }

    fn handle_reset(&mut self) -> Result<()> {
        if self.depth > 0 {
            return Err(StreamError::StreamCorrupted(format!(
                "unexpected reset; recursion depth: {}",
                self.depth
            )));
        }
        self.handles.reset();
        tracing::debug!("read stream reset");
        Ok(())
    }

    fn peek_tag(&mut self) -> Result<u8> {
        self.source
            .peek_byte()?
            .ok_or_else(|| StreamError::UnexpectedEof("expected a record".to_string()))
    }

    fn read_value(&mut self, unshared: bool) -> Result<Value> {
        let old_mode = self.block_mode;
        if old_mode {
            if self.block_remaining > 0 {
                return Err(StreamError::OptionalData {
                    length: self.block_remaining,
                    eof: false,
                });
            }
            if self.default_data_end {
                return Err(StreamError::OptionalData { length: 0, eof: true });
            }
            self.set_block_mode(false)?;
        }

        let result = self.read_value_inner(unshared, old_mode);
        let restored = self.set_block_mode(old_mode);
        result.and_then(|value| restored.map(|_| value))
    }

    fn read_value_inner(&mut self, unshared: bool, old_mode: bool) -> Result<Value> {
        let tag = loop {
            match self.source.peek_byte()? {
                None if self.depth == 0 => return Err(StreamError::EndOfStream),
                None => {
                    return Err(StreamError::UnexpectedEof(
                        "end of input inside an object".to_string(),
                    ))
                }
                Some(TC_RESET) => {
                    self.source.next_byte()?;
                    self.handle_reset()?;
                }
                Some(tag) => break tag,
            }
        };
        if tag == TC_NULL {
            self.source.next_byte()?;
            return Ok(Value::Null);
        }

        self.depth += 1;
        let result = if self.depth > self.max_depth {
            Err(depth_exceeded(self.max_depth))
        } else {
            self.read_record(tag, unshared, old_mode)
        };
        self.depth -= 1;
        result
    }

    fn read_record(&mut self, tag: u8, unshared: bool, old_mode: bool) -> Result<Value> {
        match tag {
            TC_REFERENCE => self.read_back_reference(unshared),
            TC_CLASS => self.read_class(unshared),
            TC_CLASSDESC | TC_PROXYCLASSDESC => {
                let desc = self.read_descriptor_record(unshared)?;
                Ok(Value::Object(ObjectRef::new(Object::Descriptor(desc))))
            }
            TC_STRING | TC_LONGSTRING => {
                let (value, handle) = self.read_string(unshared)?;
                self.check_resolve(value, handle, unshared)
            }
            TC_ARRAY => {
                let (value, handle) = self.read_array(unshared)?;
                self.check_resolve(value, handle, unshared)
            }
            TC_ENUM => {
                let (value, handle) = self.read_enum(unshared)?;
                self.check_resolve(value, handle, unshared)
            }
            TC_OBJECT => {
                let (value, handle) = self.read_ordinary_object(unshared)?;
                self.check_resolve(value, handle, unshared)
            }
            _ => self.read_unexpected(tag, old_mode),
        }
    }

    #[inline(never)]
    fn read_back_reference(&mut self, unshared: bool) -> Result<Value> {
        self.source.next_byte()?;
        let handle = Handle::from_raw(self.source.read_int()? as u32);
        if unshared {
            return Err(StreamError::InvalidObject(
                "cannot read back reference as unshared".to_string(),
            ));
        }
        trace_record(TC_REFERENCE, handle, "");
        self.handles.lookup_value(handle)
    }

    /// Handles the tags that do not start a readable object.
    #[cold]
    #[inline(never)]
    fn read_unexpected(&mut self, tag: u8, old_mode: bool) -> Result<Value> {
        match tag {
            TC_EXCEPTION => {
                self.source.next_byte()?;
                Err(self.read_failure_record())
            }
            TC_BLOCKDATA | TC_BLOCKDATALONG if old_mode => {
                self.set_block_mode(true)?;
                self.refill()?;
                Err(StreamError::OptionalData {
                    length: self.block_remaining,
                    eof: false,
                })
            }
            TC_BLOCKDATA | TC_BLOCKDATALONG => Err(StreamError::StreamCorrupted(
                "unexpected block data".to_string(),
            )),
            TC_ENDBLOCKDATA if old_mode => Err(StreamError::OptionalData { length: 0, eof: true }),
            TC_ENDBLOCKDATA => Err(StreamError::StreamCorrupted(
                "unexpected end of block data".to_string(),
            )),
            other => Err(StreamError::StreamCorrupted(format!(
                "invalid type code: {:02X}",
                other
            ))),
        }
    }

    /// Reads the object recorded after a writer-side failure and turns it
    /// into the error returned to the caller.
    fn read_failure_record(&mut self) -> StreamError {
        self.handles.reset();
        let recorded = self.read_value(false);
        self.handles.reset();
        let failure = match recorded {
            Ok(value) => value,
            Err(err) => return err,
        };
        let (kind, message) = match failure.as_object() {
            Some(object) if object.class_name() == builtins::FAILURE_CLASS => (
                object
                    .get_field("kind")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default(),
                object
                    .get_field("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default(),
            ),
            Some(object) => (object.class_name(), String::new()),
            None => (String::new(), String::new()),
        };
        tracing::debug!(kind = %kind, message = %message, "read write-aborted record");
        StreamError::WriteAborted { kind, message }
    }

    fn check_resolve(&mut self, value: Value, handle: Handle, unshared: bool) -> Result<Value> {
        if !self.resolve_enabled {
            return Ok(value);
        }
        let object = match &value {
            Value::Object(object) => object.clone(),
            _ => return Ok(value),
        };
        let Some(resolver) = self.object_resolver.as_mut() else {
            return Ok(value);
        };
        let resolved = resolver.resolve_object(&object)?;
        if matches!(&resolved, Value::Object(same) if same.ptr_eq(&object)) {
            return Ok(value);
        }
        if !unshared {
            self.handles.set(handle, ReadSlot::Value(resolved.clone()));
        }
        Ok(resolved)
    }

    fn assign_slot(&mut self, value: &Value, unshared: bool) -> Handle {
        if unshared {
            self.handles.assign(ReadSlot::Unshared)
        } else {
            self.handles.assign(ReadSlot::Value(value.clone()))
        }
    }

    fn read_class(&mut self, unshared: bool) -> Result<Value> {
        self.source.next_byte()?;
        let desc = self
            .read_class_desc()?
            .ok_or_else(|| StreamError::StreamCorrupted("null class descriptor".to_string()))?;
        if desc.is_array() {
            return Err(StreamError::invalid_class(
                desc.name(),
                "array class objects are not supported",
            ));
        }
        let local = desc
            .local_class()
            .ok_or_else(|| StreamError::ClassNotFound(desc.name().to_string()))?;
        let value = Value::Object(ObjectRef::class_object(&local));
        let handle = self.assign_slot(&value, unshared);
        tracing::trace!(tag = tag_name(TC_CLASS), handle = %handle, class = %desc.name(), "read record");
        Ok(value)
    }

    /// Reads a class descriptor in a position where null is allowed.
    fn read_class_desc(&mut self) -> Result<Option<Arc<TypeDescriptor>>> {
        match self.peek_tag()? {
            TC_NULL => {
                self.source.next_byte()?;
                Ok(None)
            }
            TC_REFERENCE => {
                self.source.next_byte()?;
                let handle = Handle::from_raw(self.source.read_int()? as u32);
                self.handles.lookup_descriptor(handle).map(Some)
            }
            TC_CLASSDESC | TC_PROXYCLASSDESC => self.read_descriptor_record(false).map(Some),
            other => Err(StreamError::StreamCorrupted(format!(
                "invalid type code: {:02X}",
                other
            ))),
        }
    }

    fn read_descriptor_record(&mut self, unshared: bool) -> Result<Arc<TypeDescriptor>> {
        let tag = self.source.next_byte()?.unwrap_or(TC_NULL);
        let handle = if unshared {
            self.handles.assign(ReadSlot::Unshared)
        } else {
            self.handles.reserve()
        };
        // Superclass descriptors nest; they are limited apart from objects.
        self.descriptor_depth += 1;
        let desc = if self.descriptor_depth > self.max_depth {
            Err(depth_exceeded(self.max_depth))
        } else if tag == TC_PROXYCLASSDESC {
            self.read_proxy_desc()
        } else {
            self.read_non_proxy_desc()
        };
        self.descriptor_depth -= 1;
        let desc = Arc::new(desc?);
        if !unshared {
            self.handles.set(handle, ReadSlot::Descriptor(desc.clone()));
        }
        tracing::trace!(
            tag = tag_name(tag),
            handle = %handle,
            class = %desc.name(),
            resolved = desc.local_class().is_some(),
            "read record"
        );
        Ok(desc)
    }

    fn read_non_proxy_desc(&mut self) -> Result<TypeDescriptor> {
        let name = self.source.read_utf()?;
        if name.is_empty() {
            return Err(StreamError::StreamCorrupted("empty class name".to_string()));
        }
        let version_tag = self.source.read_long()?;
        let flags = DescriptorFlags::from_bits(self.source.read_unsigned_byte()?);
        if flags.is_serializable() && flags.is_externalizable() {
            return Err(StreamError::invalid_class(
                &name,
                "serializable and externalizable flags conflict",
            ));
        }
        if flags.is_enum() && version_tag != 0 {
            return Err(StreamError::invalid_class(
                &name,
                format!("enum descriptor has non-zero version tag: {}", version_tag),
            ));
        }
        let count = self.source.read_short()?;
        if count < 0 {
            return Err(StreamError::StreamCorrupted(format!(
                "negative field count: {}",
                count
            )));
        }
        if flags.is_enum() && count > 0 {
            return Err(StreamError::invalid_class(
                &name,
                format!("enum descriptor has non-zero field count: {}", count),
            ));
        }

        let mut fields = Vec::with_capacity(count as usize);
        let mut seen_reference = false;
        for _ in 0..count {
            let code = self.source.read_unsigned_byte()?;
            let field_name = self.source.read_utf()?;
            let field_type = match FieldType::from_primitive_code(code) {
                Some(primitive) => {
                    if seen_reference {
                        return Err(StreamError::invalid_class(&name, "illegal field order"));
                    }
                    primitive
                }
                None if code == b'L' || code == b'[' => {
                    seen_reference = true;
                    let signature = self.read_type_string()?;
                    if signature.as_bytes().first() != Some(&code) {
                        return Err(StreamError::StreamCorrupted(format!(
                            "field {} signature {} does not match type code {}",
                            field_name, signature, code as char
                        )));
                    }
                    FieldType::from_signature(&signature)?
                }
                None => {
                    return Err(StreamError::StreamCorrupted(format!(
                        "invalid field type code {:02X} for field {}",
                        code, field_name
                    )))
                }
            };
            fields.push(StreamField::new(field_name, field_type));
        }

        // Class annotations are skipped.
        self.skip_custom_data()?;
        let super_descriptor = self.read_class_desc()?;

        let desc = TypeDescriptor::new(name, version_tag, flags)
            .with_fields(fields)
            .with_super(super_descriptor);
        self.resolve_descriptor(desc)
    }

    /// Binds a freshly read descriptor to its local class, if one is known.
    fn resolve_descriptor(&mut self, desc: TypeDescriptor) -> Result<TypeDescriptor> {
        if desc.name().starts_with('[') {
            let array_type = match FieldType::from_array_class_name(desc.name()) {
                Ok(array_type) => array_type,
                Err(_) if array_dimensions(desc.name()) > MAX_ARRAY_DIMENSIONS => {
                    return Err(StreamError::invalid_class(
                        desc.name(),
                        format!("array class has more than {} dimensions", MAX_ARRAY_DIMENSIONS),
                    ))
                }
                Err(_) => return Ok(desc),
            };
            let component = array_type.component().cloned().ok_or_else(|| {
                StreamError::invalid_class(desc.name(), "not an array class")
            })?;
            return Ok(desc.with_array_component(component));
        }
        let local = builtins::resolve(desc.name()).or_else(|| self.resolver.resolve_class(desc.name()));
        match local {
            Some(class) => {
                let local_desc = self.registry.lookup(&class)?;
                desc.bind(&local_desc)
            }
            None => {
                tracing::debug!(class = %desc.name(), "no local class for stream descriptor");
                Ok(desc)
            }
        }
    }

    /// Reads the signature string of a reference field.
    fn read_type_string(&mut self) -> Result<String> {
        let value = match self.peek_tag()? {
            TC_NULL => {
                self.source.next_byte()?;
                Value::Null
            }
            TC_REFERENCE => {
                self.source.next_byte()?;
                let handle = Handle::from_raw(self.source.read_int()? as u32);
                self.handles.lookup_value(handle)?
            }
            TC_STRING | TC_LONGSTRING => self.read_string(false)?.0,
            other => {
                return Err(StreamError::StreamCorrupted(format!(
                    "invalid type code: {:02X}",
                    other
                )))
            }
        };
        value.as_str().ok_or_else(|| {
            StreamError::StreamCorrupted(format!(
                "field type signature is a {}, not a string",
                value.type_name()
            ))
        })
    }

    fn read_proxy_desc(&mut self) -> Result<TypeDescriptor> {
        let count = self.source.read_int()?;
        if count < 0 {
            return Err(StreamError::StreamCorrupted(format!(
                "negative interface count: {}",
                count
            )));
        }
        if count > MAX_PROXY_INTERFACES {
            return Err(StreamError::InvalidObject(format!(
                "interface limit exceeded: {}",
                count
            )));
        }
        let mut interfaces = Vec::with_capacity(count as usize);
        for _ in 0..count {
            interfaces.push(self.source.read_utf()?);
        }

        self.skip_custom_data()?;
        let super_descriptor = self.read_class_desc()?;

        let flags = DescriptorFlags::EMPTY.with(SC_SERIALIZABLE);
        match self.resolver.resolve_proxy_class(&interfaces) {
            Some(class) => {
                if !class.is_proxy() {
                    return Err(StreamError::invalid_class(class.name(), "not a proxy"));
                }
                Ok(TypeDescriptor::new(class.name(), 0, flags)
                    .with_proxy_interfaces(interfaces)
                    .with_super(super_descriptor)
                    .with_local_class(class))
            }
            None => {
                tracing::debug!(interfaces = ?interfaces, "no local proxy class");
                Ok(TypeDescriptor::new(interfaces.join(","), 0, flags)
                    .with_proxy_interfaces(interfaces)
                    .with_super(super_descriptor))
            }
        }
    }

    /// Reads `len` raw bytes, growing the buffer only as data arrives.
    fn read_limited(&mut self, len: u64) -> Result<Vec<u8>> {
        let len = usize::try_from(len)
            .map_err(|_| StreamError::StreamCorrupted(format!("length {} too large", len)))?;
        let mut out = Vec::with_capacity(len.min(READ_CHUNK));
        while out.len() < len {
            let start = out.len();
            let n = (len - start).min(READ_CHUNK);
            out.resize(start + n, 0);
            self.source.read_fully(&mut out[start..])?;
        }
        Ok(out)
    }

    fn read_string(&mut self, unshared: bool) -> Result<(Value, Handle)> {
        let tag = self.source.next_byte()?.unwrap_or(TC_NULL);
        let len = match tag {
            TC_STRING => self.source.read_unsigned_short()? as u64,
            TC_LONGSTRING => {
                let len = self.source.read_long()?;
                if len < 0 {
                    return Err(StreamError::StreamCorrupted(format!(
                        "negative string length: {}",
                        len
                    )));
                }
                len as u64
            }
            other => {
                return Err(StreamError::StreamCorrupted(format!(
                    "invalid type code: {:02X}",
                    other
                )))
            }
        };
        let bytes = self.read_limited(len)?;
        let value = Value::Object(ObjectRef::string(mutf8::decode(&bytes)?));
        let handle = self.assign_slot(&value, unshared);
        tracing::trace!(tag = tag_name(tag), handle = %handle, len, "read record");
        Ok((value, handle))
    }

    fn read_array(&mut self, unshared: bool) -> Result<(Value, Handle)> {
        self.source.next_byte()?;
        let desc = self.read_class_desc()?.ok_or_else(|| {
            StreamError::StreamCorrupted("null array class descriptor".to_string())
        })?;
        let component = desc
            .array_component()
            .cloned()
            .ok_or_else(|| StreamError::invalid_class(desc.name(), "not an array class"))?;
        let len = self.source.read_int()?;
        if len < 0 {
            return Err(StreamError::StreamCorrupted(format!(
                "array length is negative: {}",
                len
            )));
        }
        let len = len as usize;

        let object = ObjectRef::array(Array::with_capacity(
            component.clone(),
            len.min(READ_CHUNK),
        ));
        let value = Value::Object(object.clone());
        let handle = self.assign_slot(&value, unshared);
        trace_record(TC_ARRAY, handle, desc.name());

        if component.is_primitive() {
            self.read_primitive_elements(&object, &component, len)?;
        } else {
            for _ in 0..len {
                let element = self.read_value(false)?;
                if !element.conforms_to(&component) {
                    return Err(array_store_error(&element, &component));
                }
                match &mut *object.write() {
                    Object::Array(array) => array.push(element)?,
                    _ => return Err(StreamError::InvalidObject("expected an array".to_string())),
                }
            }
        }
        Ok((value, handle))
    }

    #[inline(never)]
    fn read_primitive_elements(
        &mut self,
        object: &ObjectRef,
        component: &FieldType,
        len: usize,
    ) -> Result<()> {
        let total = len.checked_mul(component.primitive_size()).ok_or_else(|| {
            StreamError::StreamCorrupted(format!("array of {} elements is too long", len))
        })?;
        let bytes = self.read_limited(total as u64)?;
        let mut elements = ObjectDataInput::new(&bytes);
        let mut guard = object.write();
        let Object::Array(array) = &mut *guard else {
            return Err(StreamError::InvalidObject("expected an array".to_string()));
        };
        for _ in 0..len {
            array.push(read_primitive(&mut elements, component)?)?;
        }
        Ok(())
    }

    fn read_enum(&mut self, unshared: bool) -> Result<(Value, Handle)> {
        self.source.next_byte()?;
        let desc = self.read_class_desc()?.ok_or_else(|| {
            StreamError::StreamCorrupted("null enum class descriptor".to_string())
        })?;
        if !desc.flags().is_enum() {
            return Err(StreamError::invalid_class(desc.name(), "non-enum class"));
        }
        let handle = if unshared {
            self.handles.assign(ReadSlot::Unshared)
        } else {
            self.handles.reserve()
        };
        let name = match self.peek_tag()? {
            TC_STRING | TC_LONGSTRING => self.read_string(false)?.0.as_str().unwrap_or_default(),
            other => {
                return Err(StreamError::StreamCorrupted(format!(
                    "invalid type code: {:02X}",
                    other
                )))
            }
        };
        let local = desc
            .local_class()
            .ok_or_else(|| StreamError::ClassNotFound(desc.name().to_string()))?;
        let constant = local.enum_constant(&name).cloned().ok_or_else(|| {
            StreamError::InvalidObject(format!(
                "enum constant {} does not exist in {}",
                name,
                local.name()
            ))
        })?;
        let value = Value::Object(constant);
        if !unshared {
            self.handles.set(handle, ReadSlot::Value(value.clone()));
        }
        tracing::trace!(tag = tag_name(TC_ENUM), handle = %handle, constant = %name, "read record");
        Ok((value, handle))
    }

    fn read_ordinary_object(&mut self, unshared: bool) -> Result<(Value, Handle)> {
        self.source.next_byte()?;
        let desc = self
            .read_class_desc()?
            .ok_or_else(|| StreamError::StreamCorrupted("null class descriptor".to_string()))?;
        let local = desc
            .local_class()
            .ok_or_else(|| StreamError::ClassNotFound(desc.name().to_string()))?;
        desc.check_deserialize()?;
        if desc.is_array() || local.is_enum() || local.name() == STRING_CLASS {
            return Err(StreamError::invalid_class(desc.name(), "invalid class descriptor"));
        }

        let instance = self.instantiate(&desc, &local)?;
        let object = ObjectRef::new(Object::Instance(instance));
        let handle = self.assign_slot(&Value::Object(object.clone()), unshared);
        trace_record(TC_OBJECT, handle, desc.name());

        if desc.flags().is_externalizable() {
            self.read_external_data(&object, &desc, &local)?;
        } else {
            self.read_serial_data(&object, &desc, &local)?;
        }

        let value = self.apply_read_resolve(object, &local, handle, unshared)?;
        Ok((value, handle))
    }

    #[inline(never)]
    fn apply_read_resolve(
        &mut self,
        object: ObjectRef,
        local: &ClassRef,
        handle: Handle,
        unshared: bool,
    ) -> Result<Value> {
        let Some(hook) = local.find_read_resolve().cloned() else {
            return Ok(Value::Object(object));
        };
        let replacement = hook.read_resolve(&object)?;
        if matches!(&replacement, Value::Object(r) if r.ptr_eq(&object)) {
            return Ok(Value::Object(object));
        }
        if replacement.is_primitive() {
            return Err(StreamError::InvalidObject(format!(
                "read-resolve of {} returned a {} value",
                local.name(),
                replacement.type_name()
            )));
        }
        if !unshared {
            self.handles.set(handle, ReadSlot::Value(replacement.clone()));
        }
        Ok(replacement)
    }

    /// Allocates an instance and runs the constructors a decoded object of
    /// this class gets.
    ///
    /// Externalizable classes are built by their own no-arg constructor.
    /// Serializable classes run only the constructors of the non-serializable
    /// ancestors; the stream supplies everything else.
    fn instantiate(&self, desc: &TypeDescriptor, local: &ClassRef) -> Result<Instance> {
        let lineage = local.lineage();
        let constructed = if desc.flags().is_externalizable() {
            if !local.has_no_arg_constructor() {
                return Err(StreamError::invalid_class(local.name(), "no valid constructor"));
            }
            &lineage[..]
        } else {
            match lineage.iter().rposition(|c| !c.is_serializable()) {
                Some(boundary) => {
                    if !lineage[boundary].has_no_arg_constructor() {
                        return Err(StreamError::invalid_class(local.name(), "no valid constructor"));
                    }
                    &lineage[..=boundary]
                }
                None => &lineage[..0],
            }
        };
        let mut instance = Instance::new(local);
        for class in constructed {
            if let Some(constructor) = class.hooks().constructor() {
                constructor.construct(&mut instance)?;
            }
        }
        Ok(instance)
    }

    fn read_external_data(
        &mut self,
        object: &ObjectRef,
        desc: &TypeDescriptor,
        local: &ClassRef,
    ) -> Result<()> {
        let hook = local.find_externalizable().cloned().ok_or_else(|| {
            StreamError::invalid_class(local.name(), "externalizable class has no read hook")
        })?;
        let saved = self.context.take();
        let result = self.invoke_external_hook(object, &hook, desc.flags().has_block_data());
        self.context = saved;
        result
    }

    fn invoke_external_hook(
        &mut self,
        object: &ObjectRef,
        hook: &Arc<dyn Externalizable>,
        blocked: bool,
    ) -> Result<()> {
        if !blocked {
            return hook.read_external(object, self);
        }
        self.set_block_mode(true)?;
        hook.read_external(object, self)?;
        self.skip_custom_data()
    }

    fn read_serial_data(
        &mut self,
        object: &ObjectRef,
        desc: &Arc<TypeDescriptor>,
        local: &ClassRef,
    ) -> Result<()> {
        for slot in desc.data_layout(local) {
            let hook = slot
                .local
                .as_ref()
                .and_then(|class| class.hooks().custom().cloned());
            let Some(level) = slot.desc.filter(|_| slot.has_data) else {
                if let Some(hook) = hook {
                    hook.read_object_no_data(object)?;
                }
                continue;
            };

            match (slot.local, hook) {
                (Some(class), Some(hook)) => {
                    self.read_level_with_hook(object, &level, class, &hook)?
                }
                (Some(class), None) => {
                    if !level.local_class().map_or(false, |c| Arc::ptr_eq(&c, &class)) {
                        return Err(StreamError::invalid_class(
                            level.name(),
                            "stream descriptor bound to a different local class",
                        ));
                    }
                    let values = self.read_field_values(&level)?;
                    self.assign_fields(object, &level, values)?;
                }
                (None, _) => {
                    self.read_field_values(&level)?;
                }
            }

            if level.flags().has_write_method() {
                self.skip_custom_data()?;
            } else {
                self.set_block_mode(false)?;
            }
        }
        Ok(())
    }

    #[inline(never)]
    fn read_level_with_hook(
        &mut self,
        object: &ObjectRef,
        level: &Arc<TypeDescriptor>,
        class: ClassRef,
        hook: &Arc<dyn CustomSerialization>,
    ) -> Result<()> {
        let saved = self.context.replace(ReadContext {
            object: object.clone(),
            desc: level.clone(),
            local: class,
        });
        let result = self.invoke_read_hook(object, hook);
        self.context = saved;
        result?;
        self.default_data_end = false;
        Ok(())
    }

    fn invoke_read_hook(
        &mut self,
        object: &ObjectRef,
        hook: &Arc<dyn CustomSerialization>,
    ) -> Result<()> {
        self.set_block_mode(true)?;
        hook.read_object(object, self)
    }

    fn read_field_values(&mut self, desc: &TypeDescriptor) -> Result<Vec<Value>> {
        let mut values = Vec::with_capacity(desc.fields().len());
        for field in desc.fields() {
            let value = if field.is_primitive() {
                read_primitive(&mut self.source, field.field_type())?
            } else {
                self.read_value(field.is_unshared())?
            };
            values.push(value);
        }
        Ok(values)
    }

    /// Stores one level's values through the bound accessors. Stream fields
    /// the local class lacks are dropped.
    fn assign_fields(
        &self,
        object: &ObjectRef,
        desc: &TypeDescriptor,
        values: Vec<Value>,
    ) -> Result<()> {
        for (field, value) in desc.fields().iter().zip(&values) {
            let Some(accessor) = field.accessor() else {
                continue;
            };
            if !field.is_primitive() && !value.conforms_to(accessor.field_type()) {
                return Err(StreamError::field(
                    field.name(),
                    format!(
                        "cannot assign {} to field of type {}",
                        describe(value),
                        accessor.field_type()
                    ),
                ));
            }
        }

        let mut guard = object.write();
        let Object::Instance(instance) = &mut *guard else {
            return Err(StreamError::InvalidObject(format!(
                "cannot assign fields of {} to a non-instance",
                desc.name()
            )));
        };
        for (field, value) in desc.fields().iter().zip(values) {
            if let Some(accessor) = field.accessor() {
                accessor.set(instance, value)?;
            }
        }
        Ok(())
    }
}

fn read_primitive<I: DataInput + ?Sized>(input: &mut I, field_type: &FieldType) -> Result<Value> {
    Ok(match field_type {
        FieldType::Boolean => Value::Boolean(input.read_bool()?),
        FieldType::Byte => Value::Byte(input.read_byte()?),
        FieldType::Char => Value::Char(input.read_char()?),
        FieldType::Short => Value::Short(input.read_short()?),
        FieldType::Int => Value::Int(input.read_int()?),
        FieldType::Long => Value::Long(input.read_long()?),
        FieldType::Float => Value::Float(input.read_float()?),
        FieldType::Double => Value::Double(input.read_double()?),
        FieldType::Object(_) | FieldType::Array(_) => {
            return Err(StreamError::InvalidObject(format!(
                "{} is not a primitive type",
                field_type
            )))
        }
    })
}

fn describe(value: &Value) -> String {
    match value {
        Value::Object(object) => object.class_name(),
        other => other.type_name().to_string(),
    }
}

impl<R: Read> DataInput for ObjectInputStream<R> {
    fn read_fully(&mut self, buf: &mut [u8]) -> Result<()> {
        if !self.block_mode {
            return self.source.read_fully(buf);
        }
        let mut filled = 0;
        while filled < buf.len() {
            if !self.refill()? {
                return Err(StreamError::UnexpectedEof("end of block data".to_string()));
            }
            let n = (buf.len() - filled).min(self.block_remaining);
            self.source.read_fully(&mut buf[filled..filled + n])?;
            self.block_remaining -= n;
            filled += n;
        }
        Ok(())
    }
}

impl<R: Read> ObjectInput for ObjectInputStream<R> {
    fn read_object(&mut self) -> Result<Value> {
        ObjectInputStream::read_object(self)
    }

    fn read_unshared(&mut self) -> Result<Value> {
        ObjectInputStream::read_unshared(self)
    }

    fn default_read_object(&mut self) -> Result<()> {
        ObjectInputStream::default_read_object(self)
    }

    fn read_fields(&mut self) -> Result<GetField> {
        ObjectInputStream::read_fields(self)
    }

    fn register_validation(
        &mut self,
        callback: Box<dyn ObjectInputValidation>,
        priority: i32,
    ) -> Result<()> {
        self.push_validation(callback, priority)
    }

    fn available(&mut self) -> Result<usize> {
        ObjectInputStream::available(self)
    }
}

impl<R: Read> fmt::Debug for ObjectInputStream<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectInputStream")
            .field("position", &self.source.position())
            .field("depth", &self.depth)
            .field("handles", &self.handles.len())
            .field("block_mode", &self.block_mode)
            .field("block_remaining", &self.block_remaining)
            .finish_non_exhaustive()
    }
}

#[inline(never)]
fn trace_record(tag: u8, handle: Handle, class: &str) {
    tracing::trace!(tag = tag_name(tag), handle = %handle, class, "read record");
}

#[cold]
fn array_store_error(element: &Value, component: &FieldType) -> StreamError {
    StreamError::InvalidObject(format!(
        "cannot store {} in array of {}",
        describe(element),
        component
    ))
}

fn array_dimensions(name: &str) -> usize {
    name.bytes().take_while(|&b| b == b'[').count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(body: &[u8]) -> ObjectInputStream<std::io::Cursor<Vec<u8>>> {
        let mut bytes = vec![0xAC, 0xED, 0x00, 0x05];
        bytes.extend_from_slice(body);
        ObjectInputStream::new(std::io::Cursor::new(bytes)).unwrap()
    }

    #[test]
    fn test_rejects_bad_header() {
        let err = ObjectInputStream::new(&[0xCA, 0xFE, 0x00, 0x05][..]).unwrap_err();
        assert_eq!(err.to_string(), "stream corrupted: invalid stream header: CAFE0005");
    }

    #[test]
    fn test_truncated_header() {
        let err = ObjectInputStream::new(&[0xAC][..]).unwrap_err();
        assert!(matches!(err, StreamError::UnexpectedEof(_)));
    }

    #[test]
    fn test_end_of_stream_at_boundary() {
        let mut stream = input(&[]);
        assert!(matches!(stream.read_object(), Err(StreamError::EndOfStream)));
        assert!(stream.try_read_object().unwrap().is_none());
    }

    #[test]
    fn test_null_and_string() {
        let mut stream = input(&[TC_NULL, TC_STRING, 0, 2, b'o', b'k', TC_REFERENCE, 0, 0x7E, 0, 0]);
        assert!(stream.read_object().unwrap().is_null());
        let first = stream.read_object().unwrap();
        assert_eq!(first.as_str().as_deref(), Some("ok"));
        let again = stream.read_object().unwrap();
        assert!(again.as_object().unwrap().ptr_eq(first.as_object().unwrap()));
    }

    #[test]
    fn test_invalid_tag() {
        let mut stream = input(&[0x42]);
        let err = stream.read_object().unwrap_err();
        assert_eq!(err.to_string(), "stream corrupted: invalid type code: 42");
    }

    #[test]
    fn test_unresolved_reference() {
        let mut stream = input(&[TC_REFERENCE, 0, 0x7E, 0, 5]);
        assert!(matches!(
            stream.read_object(),
            Err(StreamError::UnresolvedReference(0x7E0005))
        ));
    }

    #[test]
    fn test_optional_data_before_object() {
        let mut stream = input(&[TC_BLOCKDATA, 4, 0, 0, 0, 9, TC_NULL]);
        assert!(matches!(
            stream.read_object(),
            Err(StreamError::OptionalData { length: 4, eof: false })
        ));
        assert_eq!(stream.available().unwrap(), 4);
        assert_eq!(stream.read_int().unwrap(), 9);
        assert!(stream.read_object().unwrap().is_null());
    }

    #[test]
    fn test_primitive_read_past_block_end() {
        let mut stream = input(&[TC_BLOCKDATA, 2, 0, 1, TC_NULL]);
        assert_eq!(stream.read_short().unwrap(), 1);
        assert!(matches!(stream.read_int(), Err(StreamError::UnexpectedEof(_))));
    }

    #[test]
    fn test_blocks_are_joined() {
        let mut stream = input(&[TC_BLOCKDATA, 2, 0, 0, TC_BLOCKDATA, 2, 0, 7]);
        assert_eq!(stream.read_int().unwrap(), 7);
    }

    #[test]
    fn test_reset_between_records() {
        let mut stream = input(&[
            TC_STRING, 0, 1, b'a', TC_RESET, TC_REFERENCE, 0, 0x7E, 0, 0,
        ]);
        stream.read_object().unwrap();
        assert!(matches!(
            stream.read_object(),
            Err(StreamError::UnresolvedReference(0x7E0000))
        ));
    }

    #[test]
    fn test_unshared_back_reference_rejected() {
        let mut stream = input(&[TC_STRING, 0, 1, b'a', TC_REFERENCE, 0, 0x7E, 0, 0]);
        stream.read_unshared().unwrap();
        assert!(matches!(stream.read_object(), Err(StreamError::InvalidObject(_))));
    }

    #[test]
    fn test_hook_operations_outside_hook() {
        let mut stream = input(&[]);
        assert!(matches!(stream.default_read_object(), Err(StreamError::NotActive(_))));
        assert!(matches!(stream.read_fields(), Err(StreamError::NotActive(_))));
        assert!(matches!(
            stream.register_validation(|| -> Result<()> { Ok(()) }, 0),
            Err(StreamError::NotActive(_))
        ));
    }

    #[test]
    fn test_unknown_class_is_not_found() {
        let mut body = vec![TC_OBJECT, TC_CLASSDESC];
        body.extend_from_slice(&[0, 5]);
        body.extend_from_slice(b"a.Foo");
        body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1, 0x02, 0, 0, TC_ENDBLOCKDATA, TC_NULL]);
        let mut stream = input(&body);
        assert!(matches!(
            stream.read_object(),
            Err(StreamError::ClassNotFound(ref name)) if name == "a.Foo"
        ));
    }

    #[test]
    fn test_conflicting_flags() {
        let mut body = vec![TC_CLASSDESC, 0, 1, b'X'];
        body.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 1, 0x06, 0, 0, TC_ENDBLOCKDATA, TC_NULL]);
        let mut stream = input(&body);
        assert!(matches!(
            stream.read_object(),
            Err(StreamError::InvalidClass { .. })
        ));
    }
}
