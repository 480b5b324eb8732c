//! Class definitions: the declared shape of a type.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::hooks::{
    ClassHooks, Constructor, CustomSerialization, Externalizable, ReadResolve, WriteReplace,
};
use super::modifiers::{self, PRIVATE, PUBLIC, STATIC, TRANSIENT};
use super::{builtins, EnumConstant, FieldType, Object, ObjectRef};

/// Shared handle to a class definition.
pub type ClassRef = Arc<ClassDefinition>;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a class definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(u64);

impl ClassId {
    fn next() -> Self {
        ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw identifier.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// How instances of a class are dumped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// Not serializable.
    Plain,
    /// Serializable: field values are written level by level.
    Serializable,
    /// Externalizable: the class writes its own state.
    Externalizable,
    /// Enum type: only the constant name is written.
    Enum,
    /// Dynamic proxy class.
    Proxy,
}

/// Location of a field inside an instance's storage block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldOffset {
    /// Byte offset into the primitive storage.
    Primitive(usize),
    /// Index into the reference slots.
    Reference(usize),
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDefinition {
    name: String,
    field_type: FieldType,
    modifiers: i32,
    unshared: bool,
}

impl FieldDefinition {
    /// Creates a private field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self::with_modifiers(name, field_type, PRIVATE)
    }

    /// Creates a field with explicit modifiers.
    pub fn with_modifiers(name: impl Into<String>, field_type: FieldType, modifiers: i32) -> Self {
        Self {
            name: name.into(),
            field_type,
            modifiers,
            unshared: false,
        }
    }

    /// Marks the field as written and read unshared.
    pub fn unshared(mut self) -> Self {
        self.unshared = true;
        self
    }

    /// Returns the field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the field type.
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }

    /// Returns the modifier bits.
    pub fn modifiers(&self) -> i32 {
        self.modifiers
    }

    /// Returns true if the field is written unshared.
    pub fn is_unshared(&self) -> bool {
        self.unshared
    }

    /// Static fields have no per-instance storage.
    pub fn is_static(&self) -> bool {
        modifiers::has(self.modifiers, STATIC)
    }

    /// Returns true for fields excluded from default serialization.
    pub fn is_transient(&self) -> bool {
        modifiers::has(self.modifiers, TRANSIENT)
    }

    /// Returns true if default serialization writes this field.
    pub fn is_serializable(&self) -> bool {
        !self.is_static() && !self.is_transient()
    }
}

/// Name, modifiers and signature of a constructor or method.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MemberSignature {
    name: String,
    modifiers: i32,
    signature: String,
}

impl MemberSignature {
    /// Creates a member signature, e.g. `("size", PUBLIC, "()I")`.
    pub fn new(name: impl Into<String>, modifiers: i32, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers,
            signature: signature.into(),
        }
    }

    /// Returns the member name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the modifier bits.
    pub fn modifiers(&self) -> i32 {
        self.modifiers
    }

    /// Returns the type signature, e.g. `(ILjava/lang/String;)V`.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Returns true if the member is private.
    pub fn is_private(&self) -> bool {
        modifiers::has(self.modifiers, PRIVATE)
    }
}

/// Storage layout of the instance fields one class declares.
///
/// Primitive fields come first, then references; each group is ordered by
/// name. Primitives get byte offsets summed from their widths, references
/// get consecutive slot indices.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldLayout {
    offsets: HashMap<String, FieldOffset>,
    primitive_bytes: usize,
    reference_slots: usize,
}

impl FieldLayout {
    fn compute(fields: &[FieldDefinition]) -> Self {
        let mut instance_fields: Vec<&FieldDefinition> =
            fields.iter().filter(|f| !f.is_static()).collect();
        instance_fields.sort_by(|a, b| field_order(a.field_type(), a.name(), b.field_type(), b.name()));

        let mut layout = FieldLayout::default();
        for field in instance_fields {
            let offset = if field.field_type.is_primitive() {
                let offset = FieldOffset::Primitive(layout.primitive_bytes);
                layout.primitive_bytes += field.field_type.primitive_size();
                offset
            } else {
                let offset = FieldOffset::Reference(layout.reference_slots);
                layout.reference_slots += 1;
                offset
            };
            layout.offsets.insert(field.name.clone(), offset);
        }
        layout
    }

    /// Returns the storage location of an instance field.
    pub fn offset(&self, name: &str) -> Option<FieldOffset> {
        self.offsets.get(name).copied()
    }

    /// Total bytes of primitive storage.
    pub fn primitive_bytes(&self) -> usize {
        self.primitive_bytes
    }

    /// Number of reference slots.
    pub fn reference_slots(&self) -> usize {
        self.reference_slots
    }
}

/// Canonical field order: primitives before references, then by name.
pub(crate) fn field_order(
    a_type: &FieldType,
    a_name: &str,
    b_type: &FieldType,
    b_name: &str,
) -> std::cmp::Ordering {
    b_type
        .is_primitive()
        .cmp(&a_type.is_primitive())
        .then_with(|| a_name.cmp(b_name))
}

/// The declared shape of a type and the hooks that customize its encoding.
///
/// Built once with [`ClassDefinition::builder`] and shared as a [`ClassRef`].
pub struct ClassDefinition {
    id: ClassId,
    name: String,
    modifiers: i32,
    kind: ClassKind,
    superclass: Option<ClassRef>,
    interfaces: Vec<String>,
    fields: Vec<FieldDefinition>,
    field_indices: HashMap<String, usize>,
    layout: FieldLayout,
    constructors: Vec<MemberSignature>,
    methods: Vec<MemberSignature>,
    static_initializer: bool,
    serial_version: Option<i64>,
    hooks: ClassHooks,
    enum_constants: Vec<ObjectRef>,
    depth: usize,
}

impl ClassDefinition {
    /// Starts a builder for a class with the given fully qualified name.
    pub fn builder(name: impl Into<String>) -> ClassBuilder {
        ClassBuilder::new(name)
    }

    /// Returns the process-unique class identity.
    pub fn id(&self) -> ClassId {
        self.id
    }

    /// Returns the fully qualified class name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the class modifier bits.
    pub fn modifiers(&self) -> i32 {
        self.modifiers
    }

    /// Returns how instances are dumped.
    pub fn kind(&self) -> ClassKind {
        self.kind
    }

    /// Returns true for every kind that can be written to a stream.
    pub fn is_serializable(&self) -> bool {
        self.kind != ClassKind::Plain
    }

    /// Returns true if the class writes its own state.
    pub fn is_externalizable(&self) -> bool {
        self.kind == ClassKind::Externalizable
    }

    /// Returns true for enum types.
    pub fn is_enum(&self) -> bool {
        self.kind == ClassKind::Enum
    }

    /// Returns true for proxy classes.
    pub fn is_proxy(&self) -> bool {
        self.kind == ClassKind::Proxy
    }

    /// Returns true if the class is an interface.
    pub fn is_interface(&self) -> bool {
        modifiers::has(self.modifiers, modifiers::INTERFACE)
    }

    /// Returns the direct superclass, if any.
    pub fn superclass(&self) -> Option<&ClassRef> {
        self.superclass.as_ref()
    }

    /// Returns the names of the directly implemented interfaces.
    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    /// Returns the declared fields, static ones included.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Looks up a declared field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.field_indices.get(name).map(|&i| &self.fields[i])
    }

    /// Returns the fields written by default serialization in canonical order.
    pub fn serializable_fields(&self) -> Vec<&FieldDefinition> {
        let mut fields: Vec<&FieldDefinition> =
            self.fields.iter().filter(|f| f.is_serializable()).collect();
        fields.sort_by(|a, b| field_order(a.field_type(), a.name(), b.field_type(), b.name()));
        fields
    }

    /// Returns the storage layout of this class's instance fields.
    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    /// Returns the declared constructors.
    pub fn constructors(&self) -> &[MemberSignature] {
        &self.constructors
    }

    /// Returns the declared methods.
    pub fn methods(&self) -> &[MemberSignature] {
        &self.methods
    }

    /// Returns true if the class has a static initializer.
    pub fn has_static_initializer(&self) -> bool {
        self.static_initializer
    }

    /// Returns the explicitly declared version tag, if any.
    pub fn serial_version(&self) -> Option<i64> {
        self.serial_version
    }

    /// Returns the hooks attached to this class.
    pub fn hooks(&self) -> &ClassHooks {
        &self.hooks
    }

    /// Returns the canonical enum constants in declaration order.
    pub fn enum_constants(&self) -> &[ObjectRef] {
        &self.enum_constants
    }

    /// Looks up an enum constant by name.
    pub fn enum_constant(&self, name: &str) -> Option<&ObjectRef> {
        self.enum_constants.iter().find(|c| {
            matches!(&*c.read(), Object::Enum(constant) if constant.name() == name)
        })
    }

    /// Number of superclasses above this one.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns true if a no-arg constructor is available to the decoder.
    ///
    /// A class that declares no constructors has an implicit one.
    pub fn has_no_arg_constructor(&self) -> bool {
        self.hooks.constructor.is_some()
            || self.constructors.is_empty()
            || self
                .constructors
                .iter()
                .any(|c| c.signature() == "()V" && !c.is_private())
    }

    /// Returns this class and its superclasses, root first.
    pub fn lineage(self: &Arc<Self>) -> Vec<ClassRef> {
        let mut chain = Vec::with_capacity(self.depth + 1);
        let mut current = Some(self.clone());
        while let Some(class) = current {
            current = class.superclass.clone();
            chain.push(class);
        }
        chain.reverse();
        chain
    }

    /// Returns true if this class is `name` or has it as superclass or interface.
    pub fn is_subtype_of(&self, name: &str) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class.name == name || class.interfaces.iter().any(|i| i == name) {
                return true;
            }
            current = class.superclass.as_deref();
        }
        false
    }

    /// Finds the nearest class, starting here, that carries an externalizable hook.
    pub fn find_externalizable(&self) -> Option<&Arc<dyn Externalizable>> {
        self.find_hook(|h| h.externalizable.as_ref())
    }

    /// Finds the nearest inherited write-replace hook.
    pub fn find_write_replace(&self) -> Option<&Arc<dyn WriteReplace>> {
        self.find_hook(|h| h.write_replace.as_ref())
    }

    /// Finds the nearest inherited read-resolve hook.
    pub fn find_read_resolve(&self) -> Option<&Arc<dyn ReadResolve>> {
        self.find_hook(|h| h.read_resolve.as_ref())
    }

    fn find_hook<'a, T: ?Sized>(
        &'a self,
        select: impl Fn(&'a ClassHooks) -> Option<&'a Arc<T>>,
    ) -> Option<&'a Arc<T>> {
        let mut current = Some(self);
        while let Some(class) = current {
            if let Some(hook) = select(&class.hooks) {
                return Some(hook);
            }
            current = class.superclass.as_deref();
        }
        None
    }
}

impl fmt::Debug for ClassDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("superclass", &self.superclass.as_ref().map(|s| s.name()))
            .field("fields", &self.fields)
            .field("serial_version", &self.serial_version)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Builder for [`ClassDefinition`].
///
/// ```
/// use objstream_core::model::{ClassDefinition, FieldType};
///
/// let point = ClassDefinition::builder("com.example.Point")
///     .serializable()
///     .field("x", FieldType::Int)
///     .field("y", FieldType::Int)
///     .build();
/// assert_eq!(point.serializable_fields().len(), 2);
/// ```
#[derive(Debug)]
pub struct ClassBuilder {
    name: String,
    modifiers: i32,
    kind: Option<ClassKind>,
    superclass: Option<ClassRef>,
    interfaces: Vec<String>,
    fields: Vec<FieldDefinition>,
    constructors: Vec<MemberSignature>,
    methods: Vec<MemberSignature>,
    static_initializer: bool,
    serial_version: Option<i64>,
    hooks: ClassHooks,
    enum_names: Vec<String>,
}

impl ClassBuilder {
    /// Creates a builder for a public class.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modifiers: PUBLIC,
            kind: None,
            superclass: None,
            interfaces: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            static_initializer: false,
            serial_version: None,
            hooks: ClassHooks::default(),
            enum_names: Vec::new(),
        }
    }

    /// Replaces the class modifier bits.
    pub fn modifiers(mut self, modifiers: i32) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Marks the class serializable.
    pub fn serializable(mut self) -> Self {
        self.kind = Some(ClassKind::Serializable);
        self
    }

    /// Marks the class externalizable with the hook that writes and reads it.
    pub fn externalizable(mut self, hook: impl Externalizable + 'static) -> Self {
        self.kind = Some(ClassKind::Externalizable);
        self.hooks.externalizable = Some(Arc::new(hook));
        self
    }

    /// Declares an enum type with the given constants.
    ///
    /// Enum types extend `java.lang.Enum` and are always final.
    pub fn enum_constants<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = Some(ClassKind::Enum);
        self.enum_names = names.into_iter().map(Into::into).collect();
        self
    }

    /// Declares a proxy class implementing the given interfaces.
    pub fn proxy<I, S>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind = Some(ClassKind::Proxy);
        self.interfaces = interfaces.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the direct superclass.
    pub fn superclass(mut self, superclass: ClassRef) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// Adds an implemented interface.
    pub fn interface(mut self, name: impl Into<String>) -> Self {
        self.interfaces.push(name.into());
        self
    }

    /// Adds a private instance field.
    pub fn field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_definition(FieldDefinition::new(name, field_type))
    }

    /// Adds a private instance field that is written and read unshared.
    pub fn unshared_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_definition(FieldDefinition::new(name, field_type).unshared())
    }

    /// Adds a private transient field.
    pub fn transient_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_definition(FieldDefinition::with_modifiers(
            name,
            field_type,
            PRIVATE | TRANSIENT,
        ))
    }

    /// Adds a private static field.
    pub fn static_field(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field_definition(FieldDefinition::with_modifiers(
            name,
            field_type,
            PRIVATE | STATIC,
        ))
    }

    /// Adds a field definition. A later field with the same name replaces an earlier one.
    pub fn field_definition(mut self, field: FieldDefinition) -> Self {
        self.fields.retain(|f| f.name != field.name);
        self.fields.push(field);
        self
    }

    /// Declares a constructor by modifiers and signature, e.g. `"(I)V"`.
    pub fn constructor(mut self, modifiers: i32, signature: impl Into<String>) -> Self {
        self.constructors
            .push(MemberSignature::new("<init>", modifiers, signature));
        self
    }

    /// Declares a method.
    pub fn method(
        mut self,
        name: impl Into<String>,
        modifiers: i32,
        signature: impl Into<String>,
    ) -> Self {
        self.methods.push(MemberSignature::new(name, modifiers, signature));
        self
    }

    /// Declares that the class has a static initializer.
    pub fn static_initializer(mut self) -> Self {
        self.static_initializer = true;
        self
    }

    /// Declares an explicit version tag, overriding the computed one.
    pub fn serial_version(mut self, version: i64) -> Self {
        self.serial_version = Some(version);
        self
    }

    /// Attaches a custom write/read hook for this class's level.
    pub fn custom_serialization(mut self, hook: impl CustomSerialization + 'static) -> Self {
        self.hooks.custom = Some(Arc::new(hook));
        self
    }

    /// Attaches a write-replace hook.
    pub fn write_replace(mut self, hook: impl WriteReplace + 'static) -> Self {
        self.hooks.write_replace = Some(Arc::new(hook));
        self
    }

    /// Attaches a read-resolve hook.
    pub fn read_resolve(mut self, hook: impl ReadResolve + 'static) -> Self {
        self.hooks.read_resolve = Some(Arc::new(hook));
        self
    }

    /// Attaches the no-arg constructor body.
    pub fn no_arg_constructor(mut self, hook: impl Constructor + 'static) -> Self {
        self.hooks.constructor = Some(Arc::new(hook));
        self
    }

    /// Builds the class definition.
    pub fn build(self) -> ClassRef {
        let ClassBuilder {
            name,
            mut modifiers,
            kind,
            mut superclass,
            interfaces,
            fields,
            constructors,
            methods,
            static_initializer,
            serial_version,
            hooks,
            enum_names,
        } = self;

        let inherited = superclass.as_ref().map(|s| s.kind);
        let kind = match (kind, inherited) {
            (Some(kind), _) => kind,
            (None, Some(ClassKind::Externalizable)) => ClassKind::Externalizable,
            (None, Some(ClassKind::Serializable | ClassKind::Proxy)) => ClassKind::Serializable,
            _ => ClassKind::Plain,
        };
        if kind == ClassKind::Enum && name != builtins::ENUM_CLASS {
            modifiers |= modifiers::FINAL;
            if superclass.is_none() {
                superclass = Some(builtins::enum_base());
            }
        }
        if kind == ClassKind::Proxy && superclass.is_none() {
            superclass = Some(builtins::proxy_base());
        }

        let field_indices = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        let layout = FieldLayout::compute(&fields);
        let depth = superclass.as_ref().map_or(0, |s| s.depth + 1);

        Arc::new_cyclic(|weak: &Weak<ClassDefinition>| {
            let enum_constants = enum_names
                .into_iter()
                .enumerate()
                .map(|(ordinal, name)| {
                    ObjectRef::new(Object::Enum(EnumConstant::new(weak.clone(), name, ordinal)))
                })
                .collect();
            ClassDefinition {
                id: ClassId::next(),
                name,
                modifiers,
                kind,
                superclass,
                interfaces,
                fields,
                field_indices,
                layout,
                constructors,
                methods,
                static_initializer,
                serial_version,
                hooks,
                enum_constants,
                depth,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape() -> ClassRef {
        ClassDefinition::builder("com.example.Shape")
            .serializable()
            .field("name", FieldType::string())
            .field("sides", FieldType::Int)
            .field("area", FieldType::Double)
            .field("filled", FieldType::Boolean)
            .transient_field("cache", FieldType::object("java.lang.Object"))
            .static_field("COUNT", FieldType::Int)
            .build()
    }

    #[test]
    fn test_serializable_fields_exclude_static_and_transient() {
        let class = shape();
        let names: Vec<&str> = class.serializable_fields().iter().map(|f| f.name()).collect();
        assert_eq!(names, vec!["area", "filled", "sides", "name"]);
    }

    #[test]
    fn test_layout_assigns_offsets_by_canonical_order() {
        let class = shape();
        let layout = class.layout();
        assert_eq!(layout.offset("area"), Some(FieldOffset::Primitive(0)));
        assert_eq!(layout.offset("filled"), Some(FieldOffset::Primitive(8)));
        assert_eq!(layout.offset("sides"), Some(FieldOffset::Primitive(9)));
        assert_eq!(layout.offset("cache"), Some(FieldOffset::Reference(0)));
        assert_eq!(layout.offset("name"), Some(FieldOffset::Reference(1)));
        assert_eq!(layout.offset("COUNT"), None);
        assert_eq!(layout.primitive_bytes(), 13);
        assert_eq!(layout.reference_slots(), 2);
    }

    #[test]
    fn test_serializable_kind_is_inherited() {
        let base = shape();
        let square = ClassDefinition::builder("com.example.Square")
            .superclass(base.clone())
            .build();
        assert_eq!(square.kind(), ClassKind::Serializable);
        assert_eq!(square.depth(), 1);
        let lineage: Vec<String> = square.lineage().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(lineage, vec!["com.example.Shape", "com.example.Square"]);
    }

    #[test]
    fn test_plain_class_is_not_serializable() {
        let plain = ClassDefinition::builder("com.example.Socket").build();
        assert!(!plain.is_serializable());
        assert!(plain.has_no_arg_constructor());
    }

    #[test]
    fn test_declared_constructors_hide_implicit_one() {
        let class = ClassDefinition::builder("com.example.Pair")
            .constructor(PUBLIC, "(II)V")
            .build();
        assert!(!class.has_no_arg_constructor());

        let private_only = ClassDefinition::builder("com.example.Single")
            .constructor(PRIVATE, "()V")
            .build();
        assert!(!private_only.has_no_arg_constructor());
    }

    #[test]
    fn test_enum_constants_are_canonical() {
        let color = ClassDefinition::builder("com.example.Color")
            .enum_constants(["RED", "GREEN"])
            .build();
        assert!(color.is_enum());
        assert_eq!(color.superclass().unwrap().name(), builtins::ENUM_CLASS);
        let green = color.enum_constant("GREEN").unwrap();
        assert!(green.ptr_eq(&color.enum_constants()[1]));
        match &*green.read() {
            Object::Enum(constant) => {
                assert_eq!(constant.ordinal(), 1);
                assert!(Arc::ptr_eq(&constant.class().unwrap(), &color));
            }
            other => panic!("unexpected object {:?}", other),
        }
        assert!(color.enum_constant("BLUE").is_none());
    }

    #[test]
    fn test_is_subtype_of() {
        let base = ClassDefinition::builder("com.example.Base")
            .serializable()
            .interface("com.example.Marker")
            .build();
        let derived = ClassDefinition::builder("com.example.Derived")
            .superclass(base)
            .build();
        assert!(derived.is_subtype_of("com.example.Derived"));
        assert!(derived.is_subtype_of("com.example.Base"));
        assert!(derived.is_subtype_of("com.example.Marker"));
        assert!(!derived.is_subtype_of("com.example.Other"));
    }

    #[test]
    fn test_field_redefinition_replaces() {
        let class = ClassDefinition::builder("com.example.Dup")
            .field("v", FieldType::Int)
            .field("v", FieldType::Long)
            .build();
        assert_eq!(class.fields().len(), 1);
        assert_eq!(class.field("v").unwrap().field_type(), &FieldType::Long);
    }

    #[test]
    fn test_class_ids_are_unique() {
        let a = ClassDefinition::builder("com.example.A").build();
        let b = ClassDefinition::builder("com.example.A").build();
        assert_ne!(a.id(), b.id());
    }
}
