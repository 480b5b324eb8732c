//! Class resolution for the decoder.
//!
//! The decoder maps class names found in a stream to local
//! [`ClassDefinition`](crate::model::ClassDefinition)s through a
//! [`ClassResolver`]. Builtin classes are always known and need no
//! registration.

use std::collections::HashMap;

use crate::model::{ClassRef, StreamClass};

/// Maps stream class names to local classes.
pub trait ClassResolver: Send + Sync {
    /// Returns the local class named `name`, if known.
    fn resolve_class(&self, name: &str) -> Option<ClassRef>;

    /// Returns the local proxy class implementing exactly `interfaces`.
    fn resolve_proxy_class(&self, interfaces: &[String]) -> Option<ClassRef> {
        let _ = interfaces;
        None
    }
}

impl<T: ClassResolver + ?Sized> ClassResolver for std::sync::Arc<T> {
    fn resolve_class(&self, name: &str) -> Option<ClassRef> {
        (**self).resolve_class(name)
    }

    fn resolve_proxy_class(&self, interfaces: &[String]) -> Option<ClassRef> {
        (**self).resolve_proxy_class(interfaces)
    }
}

/// A resolver backed by explicit registrations.
#[derive(Debug, Default, Clone)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassRef>,
    proxies: HashMap<Vec<String>, ClassRef>,
}

impl ClassRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a class and its superclasses.
    ///
    /// A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, class: &ClassRef) -> &mut Self {
        for level in class.lineage() {
            self.classes.insert(level.name().to_string(), level);
        }
        self
    }

    /// Registers the class of a type implementing [`StreamClass`].
    pub fn register_type<T: StreamClass>(&mut self) -> &mut Self {
        self.register(&T::class_definition())
    }

    /// Registers a proxy class under the interfaces it implements.
    pub fn register_proxy(&mut self, class: &ClassRef) -> &mut Self {
        self.proxies
            .insert(class.interfaces().to_vec(), class.clone());
        self.register(class)
    }

    /// Removes a class by name.
    ///
    /// Returns the removed class if it was present.
    pub fn unregister(&mut self, name: &str) -> Option<ClassRef> {
        self.classes.remove(name)
    }

    /// Returns the class registered under `name`.
    pub fn get(&self, name: &str) -> Option<&ClassRef> {
        self.classes.get(name)
    }

    /// Returns `true` if a class is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Returns the number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Returns `true` if no classes are registered.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl ClassResolver for ClassRegistry {
    fn resolve_class(&self, name: &str) -> Option<ClassRef> {
        self.classes.get(name).cloned()
    }

    fn resolve_proxy_class(&self, interfaces: &[String]) -> Option<ClassRef> {
        self.proxies.get(interfaces).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassDefinition, FieldType};

    #[test]
    fn test_class_registry_new() {
        let registry = ClassRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_register_includes_superclasses() {
        let base = ClassDefinition::builder("com.example.Base").build();
        let leaf = ClassDefinition::builder("com.example.Leaf")
            .superclass(base)
            .serializable()
            .field("x", FieldType::Int)
            .build();
        let mut registry = ClassRegistry::new();
        registry.register(&leaf);

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("com.example.Base"));
        assert!(registry.resolve_class("com.example.Leaf").is_some());
        assert!(registry.resolve_class("com.example.Other").is_none());
    }

    #[test]
    fn test_unregister() {
        let class = ClassDefinition::builder("com.example.Gone").build();
        let mut registry = ClassRegistry::new();
        registry.register(&class);
        assert!(registry.unregister("com.example.Gone").is_some());
        assert!(registry.get("com.example.Gone").is_none());
    }

    #[test]
    fn test_proxy_resolution() {
        let proxy = ClassDefinition::builder("$Proxy0")
            .proxy(["com.example.Greeter"])
            .build();
        let mut registry = ClassRegistry::new();
        registry.register_proxy(&proxy);

        let found = registry
            .resolve_proxy_class(&["com.example.Greeter".to_string()])
            .unwrap();
        assert_eq!(found.name(), "$Proxy0");
        assert!(registry
            .resolve_proxy_class(&["com.example.Other".to_string()])
            .is_none());
    }
}
