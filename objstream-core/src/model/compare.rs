//! Structural comparison of object graphs.

use std::collections::HashSet;

use super::{FieldType, Identity, Object, ObjectRef, Value};

/// Flattened view of one object, taken so no lock is held while recursing.
#[derive(Debug)]
enum Shape {
    String(String),
    Array(FieldType, Vec<Value>),
    Enum(String, String),
    Class(String),
    Descriptor(String, i64),
    Instance(String, Vec<(String, String, Value)>),
}

fn snapshot(obj: &ObjectRef) -> Shape {
    match &*obj.read() {
        Object::String(s) => Shape::String(s.clone()),
        Object::Array(array) => Shape::Array(
            array.component().clone(),
            (0..array.len()).filter_map(|i| array.get(i)).collect(),
        ),
        Object::Enum(constant) => Shape::Enum(
            constant.class().map(|c| c.name().to_string()).unwrap_or_default(),
            constant.name().to_string(),
        ),
        Object::Class(class) => Shape::Class(class.name().to_string()),
        Object::Descriptor(desc) => Shape::Descriptor(desc.name().to_string(), desc.version_tag()),
        Object::Instance(instance) => {
            let mut fields = Vec::new();
            for block in instance.levels() {
                let class = block.class();
                for field in class.fields().iter().filter(|f| !f.is_static()) {
                    let value = instance
                        .get_declared(class.name(), field.name())
                        .unwrap_or_default();
                    fields.push((class.name().to_string(), field.name().to_string(), value));
                }
            }
            Shape::Instance(instance.class().name().to_string(), fields)
        }
    }
}

impl Value {
    /// Compares two values structurally.
    ///
    /// Primitives compare by value (floats bitwise), objects by class and
    /// contents recursively. Cycles are tolerated: a pair of objects already
    /// under comparison is assumed equal.
    pub fn deep_eq(&self, other: &Value) -> bool {
        let mut seen = HashSet::new();
        values_eq(self, other, &mut seen)
    }
}

fn values_eq(a: &Value, b: &Value, seen: &mut HashSet<(Identity, Identity)>) -> bool {
    match (a, b) {
        (Value::Object(x), Value::Object(y)) => objects_eq(x, y, seen),
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

fn objects_eq(a: &ObjectRef, b: &ObjectRef, seen: &mut HashSet<(Identity, Identity)>) -> bool {
    if a.ptr_eq(b) || !seen.insert((a.identity(), b.identity())) {
        return true;
    }
    match (snapshot(a), snapshot(b)) {
        (Shape::String(x), Shape::String(y)) => x == y,
        (Shape::Array(xt, xs), Shape::Array(yt, ys)) => {
            xt == yt && xs.len() == ys.len() && xs.iter().zip(&ys).all(|(x, y)| values_eq(x, y, seen))
        }
        (Shape::Enum(xc, xn), Shape::Enum(yc, yn)) => xc == yc && xn == yn,
        (Shape::Class(x), Shape::Class(y)) => x == y,
        (Shape::Descriptor(xn, xv), Shape::Descriptor(yn, yv)) => xn == yn && xv == yv,
        (Shape::Instance(xc, xs), Shape::Instance(yc, ys)) => {
            xc == yc
                && xs.len() == ys.len()
                && xs.iter().zip(&ys).all(|((xd, xf, xv), (yd, yf, yv))| {
                    xd == yd && xf == yf && values_eq(xv, yv, seen)
                })
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Array, ClassDefinition};

    fn node() -> crate::model::ClassRef {
        ClassDefinition::builder("com.example.Node")
            .serializable()
            .field("id", FieldType::Int)
            .field("next", FieldType::object("com.example.Node"))
            .build()
    }

    #[test]
    fn test_distinct_strings_with_same_contents() {
        assert!(Value::string("a").deep_eq(&Value::string("a")));
        assert!(!Value::string("a").deep_eq(&Value::string("b")));
    }

    #[test]
    fn test_arrays_compare_elementwise() {
        let a = Value::Object(ObjectRef::array(Array::from(vec![1, 2])));
        let b = Value::Object(ObjectRef::array(Array::from(vec![1, 2])));
        let c = Value::Object(ObjectRef::array(Array::from(vec![1i64, 2])));
        assert!(a.deep_eq(&b));
        assert!(!a.deep_eq(&c));
    }

    #[test]
    fn test_cyclic_graphs_terminate() {
        let class = node();
        let a = ObjectRef::instance(&class);
        a.set_field("id", 1).unwrap();
        a.set_field("next", a.clone()).unwrap();
        let b = ObjectRef::instance(&class);
        b.set_field("id", 1).unwrap();
        b.set_field("next", b.clone()).unwrap();
        assert!(Value::Object(a.clone()).deep_eq(&Value::Object(b.clone())));

        b.set_field("id", 2).unwrap();
        assert!(!Value::Object(a).deep_eq(&Value::Object(b)));
    }

    #[test]
    fn test_nan_equals_itself() {
        assert!(Value::Double(f64::NAN).deep_eq(&Value::Double(f64::NAN)));
        assert!(!Value::Int(1).deep_eq(&Value::Long(1)));
    }
}
