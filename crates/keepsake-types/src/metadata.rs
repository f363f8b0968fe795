use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::class::ClassDescriptor;
use crate::descriptor::FieldDescriptor;

/// Source of persistence metadata, keyed by fully-qualified class name.
///
/// Implementations are consulted by the runtime only; metadata loading and
/// parsing happen elsewhere.
pub trait MetadataProvider: Send + Sync {
    /// Descriptor of a registered class.
    fn class(&self, class_name: &str) -> Option<Arc<ClassDescriptor>>;

    /// Field at an absolute index of a registered class.
    fn field(&self, class_name: &str, absolute_index: usize) -> Option<FieldDescriptor> {
        self.class(class_name)
            .and_then(|c| c.field(absolute_index).cloned())
    }

    /// Number of managed fields a registered class inherits.
    fn inherited_field_count(&self, class_name: &str) -> Option<usize> {
        self.class(class_name).map(|c| c.inherited_field_count())
    }
}

/// In-memory class registry.
///
/// Registering a class under an existing name replaces the previous
/// descriptor.
pub struct MetadataRegistry {
    classes: RwLock<HashMap<String, Arc<ClassDescriptor>>>,
}

impl MetadataRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            classes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a class, returning the descriptor it replaced.
    pub fn register(&self, class: Arc<ClassDescriptor>) -> Option<Arc<ClassDescriptor>> {
        self.classes
            .write()
            .expect("lock poisoned")
            .insert(class.name().to_owned(), class)
    }

    /// Remove a class registration.
    pub fn unregister(&self, class_name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes
            .write()
            .expect("lock poisoned")
            .remove(class_name)
    }

    /// Number of registered classes.
    pub fn len(&self) -> usize {
        self.classes.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no class is registered.
    pub fn is_empty(&self) -> bool {
        self.classes.read().expect("lock poisoned").is_empty()
    }

    /// Sorted names of every registered class.
    pub fn class_names(&self) -> Vec<String> {
        let map = self.classes.read().expect("lock poisoned");
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider for MetadataRegistry {
    fn class(&self, class_name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes
            .read()
            .expect("lock poisoned")
            .get(class_name)
            .cloned()
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("class_count", &self.len())
            .finish()
    }
}
