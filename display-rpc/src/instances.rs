use std::collections::HashMap;

use crate::host::ElementKey;

/// At most one controller per element. After injection an instance is
/// reachable from both its container and its embed node.
#[derive(Debug)]
pub struct InstanceRegistry<T> {
    instances: HashMap<ElementKey, T>,
}

impl<T> Default for InstanceRegistry<T> {
    fn default() -> Self {
        Self {
            instances: HashMap::new(),
        }
    }
}

impl<T: Clone> InstanceRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, element: ElementKey) -> Option<T> {
        self.instances.get(&element).cloned()
    }

    pub fn insert(&mut self, element: ElementKey, instance: T) {
        self.instances.insert(element, instance);
    }

    /// Make the instance stored under `existing` reachable from `alias` too.
    pub fn alias(&mut self, existing: ElementKey, alias: ElementKey) -> bool {
        match self.get(existing) {
            Some(instance) => {
                self.insert(alias, instance);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, element: ElementKey) -> Option<T> {
        self.instances.remove(&element)
    }

    /// Number of element entries; an injected instance counts twice.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
