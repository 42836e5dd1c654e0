use std::collections::HashMap;
use std::rc::Rc;

use futures::channel::oneshot;
use serde_json::Value;

use crate::error::DisplayError;
use crate::host::ElementKey;

/// Settles a single in-flight call.
pub type ReplySender = oneshot::Sender<Result<Value, DisplayError>>;

/// Event listener invoked with the event payload. Equality is identity.
#[derive(Clone)]
pub struct EventListener(Rc<dyn Fn(&Value)>);

impl EventListener {
    pub fn new(listener: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(listener))
    }

    pub fn call(&self, data: &Value) {
        (self.0)(data)
    }
}

impl PartialEq for EventListener {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for EventListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("EventListener")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// Entry stored under a method or `event:` name.
pub enum Callback {
    /// Invoked on every matching event, removed only by `off`.
    Listener(EventListener),
    /// One-shot reply slot for a single call.
    Reply(ReplySender),
}

impl Callback {
    pub fn listener(&self) -> Option<&EventListener> {
        match self {
            Self::Listener(listener) => Some(listener),
            Self::Reply(_) => None,
        }
    }

    /// Deliver a reply or event payload.
    pub fn settle(self, value: Value) {
        match self {
            Self::Listener(listener) => listener.call(&value),
            // The caller may have stopped waiting.
            Self::Reply(sender) => {
                let _ = sender.send(Ok(value));
            }
        }
    }

    /// Fail a reply slot; listeners are left untouched.
    pub fn reject(self, error: DisplayError) {
        if let Self::Reply(sender) = self {
            let _ = sender.send(Err(error));
        }
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Listener(a), Self::Listener(b)) => a == b,
            _ => false,
        }
    }
}

/// Ordered callback lists keyed by `(element, name)`.
pub struct CallbackRegistry<T> {
    targets: HashMap<ElementKey, HashMap<String, Vec<T>>>,
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self {
            targets: HashMap::new(),
        }
    }
}

impl<T: PartialEq> CallbackRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry`; the same entry may be stored more than once.
    pub fn store(&mut self, target: ElementKey, name: &str, entry: T) {
        self.targets
            .entry(target)
            .or_default()
            .entry(name.to_string())
            .or_default()
            .push(entry);
    }

    /// Entries for `(target, name)` in insertion order; empty when absent.
    pub fn list(&self, target: ElementKey, name: &str) -> &[T] {
        self.targets
            .get(&target)
            .and_then(|names| names.get(name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Remove the first occurrence of `entry`, or every entry when `None`.
    /// Returns whether the list is now empty.
    pub fn remove(&mut self, target: ElementKey, name: &str, entry: Option<&T>) -> bool {
        let Some(entries) = self
            .targets
            .get_mut(&target)
            .and_then(|names| names.get_mut(name))
        else {
            return true;
        };

        let Some(entry) = entry else {
            entries.clear();
            return true;
        };

        if let Some(index) = entries.iter().position(|stored| stored == entry) {
            entries.remove(index);
        }

        entries.is_empty()
    }

    /// Remove and return the oldest entry.
    pub fn take_first(&mut self, target: ElementKey, name: &str) -> Option<T> {
        let entries = self.targets.get_mut(&target)?.get_mut(name)?;
        if entries.is_empty() {
            return None;
        }
        Some(entries.remove(0))
    }

    /// Remove and return every entry for `(target, name)` in order.
    pub fn take_all(&mut self, target: ElementKey, name: &str) -> Vec<T> {
        self.targets
            .get_mut(&target)
            .and_then(|names| names.get_mut(name))
            .map(std::mem::take)
            .unwrap_or_default()
    }

    /// Move everything stored for `old` to `new`.
    pub fn rekey(&mut self, old: ElementKey, new: ElementKey) {
        match self.targets.remove(&old) {
            Some(names) => {
                self.targets.insert(new, names);
            }
            None => {
                self.targets.remove(&new);
            }
        }
    }

    /// Drop every list stored for `target`.
    pub fn remove_target(&mut self, target: ElementKey) {
        self.targets.remove(&target);
    }
}
