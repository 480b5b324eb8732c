//! Structural version tags.
//!
//! A class without an explicit version gets a tag hashed from its declared
//! shape: name, modifiers, interfaces, fields, static initializer,
//! constructors and methods, each in a canonical order. The canonical bytes
//! are written with [`DataOutput`] and digested with SHA-256; the first eight
//! bytes of the digest, read little-endian, form the tag.

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::io::{DataOutput, ObjectDataOutput};
use crate::model::modifiers::{
    self, ABSTRACT, CLASS_MASK, FIELD_MASK, FINAL, INTERFACE, METHOD_MASK, PRIVATE, PUBLIC,
    STATIC, TRANSIENT,
};
use crate::model::{ClassDefinition, FieldDefinition, FieldType, MemberSignature};

/// Returns the version tag of a class: its explicit version if declared,
/// otherwise the structural hash.
///
/// Enum and proxy classes always have tag 0, as do classes that are not
/// serializable.
pub fn compute_version_tag(class: &ClassDefinition) -> Result<i64> {
    if class.is_enum() || class.is_proxy() || !class.is_serializable() {
        return Ok(0);
    }
    if let Some(version) = class.serial_version() {
        return Ok(version);
    }
    structural_hash(class)
}

/// Returns the version tag of the array class with the given component type.
pub fn compute_array_version_tag(component: &FieldType) -> Result<i64> {
    let name = FieldType::array_of(component.clone()).class_name();
    let mut out = ObjectDataOutput::with_capacity(64);
    out.write_utf(&name)?;
    out.write_int(PUBLIC | FINAL | ABSTRACT)?;
    Ok(digest(out.as_bytes()))
}

/// Hashes the declared shape of `class`, ignoring any explicit version.
pub fn structural_hash(class: &ClassDefinition) -> Result<i64> {
    let mut out = ObjectDataOutput::with_capacity(256);

    out.write_utf(class.name())?;

    let mut class_mods = class.modifiers() & CLASS_MASK;
    if modifiers::has(class_mods, INTERFACE | PUBLIC) {
        class_mods &= !ABSTRACT;
    }
    out.write_int(class_mods)?;

    let mut interfaces: Vec<&str> = class.interfaces().iter().map(String::as_str).collect();
    interfaces.sort_unstable();
    for name in interfaces {
        out.write_utf(name)?;
    }

    let mut fields: Vec<&FieldDefinition> = class
        .fields()
        .iter()
        .filter(|f| {
            let mods = f.modifiers();
            !(modifiers::has(mods, PRIVATE)
                && (modifiers::has(mods, STATIC) || modifiers::has(mods, TRANSIENT)))
        })
        .collect();
    fields.sort_by(|a, b| a.name().cmp(b.name()));
    for field in fields {
        out.write_utf(field.name())?;
        out.write_int(field.modifiers() & FIELD_MASK)?;
        out.write_utf(&field.field_type().signature())?;
    }

    if class.has_static_initializer() {
        out.write_utf("<clinit>")?;
        out.write_int(STATIC)?;
        out.write_utf("()V")?;
    }

    let mut constructors: Vec<&MemberSignature> =
        class.constructors().iter().filter(|c| !c.is_private()).collect();
    constructors.sort_by(|a, b| a.signature().cmp(b.signature()));
    for ctor in constructors {
        write_member(&mut out, ctor)?;
    }

    let mut methods: Vec<&MemberSignature> =
        class.methods().iter().filter(|m| !m.is_private()).collect();
    methods.sort_by(|a, b| {
        a.name()
            .cmp(b.name())
            .then_with(|| a.signature().cmp(b.signature()))
    });
    for method in methods {
        write_member(&mut out, method)?;
    }

    Ok(digest(out.as_bytes()))
}

fn write_member(out: &mut ObjectDataOutput, member: &MemberSignature) -> Result<()> {
    out.write_utf(member.name())?;
    out.write_int(member.modifiers() & METHOD_MASK)?;
    out.write_utf(&member.signature().replace('/', "."))
}

fn digest(canonical: &[u8]) -> i64 {
    let hash = Sha256::digest(canonical);
    let mut tag = [0u8; 8];
    tag.copy_from_slice(&hash[..8]);
    i64::from_le_bytes(tag)
}
