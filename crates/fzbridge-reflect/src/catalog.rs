use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::member::ClassDescriptor;

/// Resolves fully-qualified type names to class descriptors.
pub trait TypeResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<ClassDescriptor>>;
}

/// The process's registration table of reachable classes.
#[derive(Default)]
pub struct ClassCatalog {
    classes: RwLock<FxHashMap<String, Arc<ClassDescriptor>>>,
}

impl ClassCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `class`, returning the descriptor it replaced.
    pub fn register(&self, class: ClassDescriptor) -> Option<Arc<ClassDescriptor>> {
        let name = class.name().to_string();
        let previous = self.classes.write().insert(name.clone(), Arc::new(class));
        if previous.is_some() {
            tracing::debug!(class = %name, "replaced registered class");
        }
        previous
    }

    pub fn unregister(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.write().remove(name)
    }

    pub fn class_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl TypeResolver for ClassCatalog {
    fn resolve(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(name.trim()).cloned()
    }
}
