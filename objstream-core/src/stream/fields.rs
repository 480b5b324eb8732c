//! Named field access for custom hooks.

use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::error::{Result, StreamError};
use crate::model::{ClassRef, Value};

/// Field values a custom write hook assembles by name before writing them
/// with [`ObjectOutput::write_fields`](super::ObjectOutput::write_fields).
///
/// Every field starts at its zero or null value.
#[derive(Debug, Clone)]
pub struct PutField {
    desc: Arc<TypeDescriptor>,
    values: Vec<Value>,
}

impl PutField {
    pub(crate) fn new(desc: Arc<TypeDescriptor>) -> Self {
        let values = desc
            .fields()
            .iter()
            .map(|f| Value::default_for(f.field_type()))
            .collect();
        Self { desc, values }
    }

    /// Sets the value of the serializable field `name`.
    ///
    /// Primitive fields take a value of exactly their type; reference fields
    /// take null or any object.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let index = self
            .desc
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .ok_or_else(|| StreamError::field(name, "no such field"))?;
        let field_type = self.desc.fields()[index].field_type();
        let accepted = if field_type.is_primitive() {
            value.conforms_to(field_type)
        } else {
            !value.is_primitive()
        };
        if !accepted {
            return Err(StreamError::field(
                name,
                format!("cannot assign {} to field of type {}", value.type_name(), field_type),
            ));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Returns the value currently set for `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.desc
            .fields()
            .iter()
            .position(|f| f.name() == name)
            .map(|i| &self.values[i])
    }

    pub(crate) fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.desc
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.values
    }
}

/// Field values read by [`ObjectInput::read_fields`](super::ObjectInput::read_fields).
///
/// Holds what the stream carried for one class level. Fields the local
/// class declares but the stream lacks are reported as defaulted.
#[derive(Debug, Clone)]
pub struct GetField {
    desc: Arc<TypeDescriptor>,
    local: Option<ClassRef>,
    values: Vec<Value>,
}

impl GetField {
    pub(crate) fn new(desc: Arc<TypeDescriptor>, local: Option<ClassRef>, values: Vec<Value>) -> Self {
        Self {
            desc,
            local,
            values,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.desc.fields().iter().position(|f| f.name() == name)
    }

    fn local_default(&self, name: &str) -> Option<Value> {
        let local = self.local.as_ref()?;
        let field = local.field(name).filter(|f| f.is_serializable())?;
        Some(Value::default_for(field.field_type()))
    }

    /// Returns true if the stream has no value for `name` but the local
    /// class declares it.
    pub fn defaulted(&self, name: &str) -> Result<bool> {
        if self.position(name).is_some() {
            return Ok(false);
        }
        match self.local_default(name) {
            Some(_) => Ok(true),
            None => Err(StreamError::field(name, "no such field")),
        }
    }

    /// Returns the value of `name`, or its zero value if defaulted.
    pub fn get(&self, name: &str) -> Result<Value> {
        if let Some(index) = self.position(name) {
            return Ok(self.values[index].clone());
        }
        self.local_default(name)
            .ok_or_else(|| StreamError::field(name, "no such field"))
    }

    /// Returns the value of `name`, or `default` if defaulted.
    pub fn get_or(&self, name: &str, default: impl Into<Value>) -> Result<Value> {
        if self.defaulted(name)? {
            Ok(default.into())
        } else {
            self.get(name)
        }
    }

    /// Returns the descriptor of the class level the values were read for.
    pub fn descriptor(&self) -> &Arc<TypeDescriptor> {
        &self.desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::DescriptorRegistry;
    use crate::model::{ClassDefinition, FieldType};

    fn point() -> ClassRef {
        ClassDefinition::builder("com.example.Point")
            .serializable()
            .field("x", FieldType::Int)
            .field("label", FieldType::string())
            .build()
    }

    #[test]
    fn test_put_field_defaults_and_put() {
        let desc = DescriptorRegistry::new().lookup(&point()).unwrap();
        let mut fields = PutField::new(desc);
        assert_eq!(fields.get("x"), Some(&Value::Int(0)));
        assert_eq!(fields.get("label"), Some(&Value::Null));

        fields.put("x", 7).unwrap();
        fields.put("label", Value::string("p")).unwrap();
        assert_eq!(fields.get("x"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_put_field_rejects_wrong_kind() {
        let desc = DescriptorRegistry::new().lookup(&point()).unwrap();
        let mut fields = PutField::new(desc);
        assert!(fields.put("x", 7i64).is_err());
        assert!(fields.put("label", 3).is_err());
        assert!(matches!(
            fields.put("missing", 1),
            Err(StreamError::Field { .. })
        ));
    }

    #[test]
    fn test_get_field_defaulted() {
        let local = ClassDefinition::builder("com.example.Point")
            .serializable()
            .field("x", FieldType::Int)
            .field("y", FieldType::Int)
            .build();
        let desc = DescriptorRegistry::new().lookup(&point()).unwrap();
        let fields = GetField::new(desc, Some(local), vec![Value::Int(4), Value::Null]);

        assert!(!fields.defaulted("x").unwrap());
        assert!(fields.defaulted("y").unwrap());
        assert_eq!(fields.get("x").unwrap(), Value::Int(4));
        assert_eq!(fields.get("y").unwrap(), Value::Int(0));
        assert_eq!(fields.get_or("y", 9).unwrap(), Value::Int(9));
        assert!(fields.get("z").is_err());
        assert!(fields.defaulted("z").is_err());
    }
}
