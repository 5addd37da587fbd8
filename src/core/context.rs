//! Execution context threaded through lifecycle hooks
//!
//! A [`Context`] is an immutable chain of key-value entries. Deriving a new
//! context never touches the entries of its parent, so every snapshot handed
//! to a service stays valid after later services extend it.

use std::{any::Any, collections::HashSet, fmt, sync::Arc};

struct Entry {
    key: String,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

/// Immutable, chainable key-value carrier
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Entry>>,
}

impl Context {
    /// Create an empty root context
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context holding one more entry; `self` is left untouched
    pub fn with_value<T: Any + Send + Sync>(&self, key: impl Into<String>, value: T) -> Self {
        Self {
            head: Some(Arc::new(Entry {
                key: key.into(),
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Get a typed reference to the newest value stored under `key`
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.entries()
            .find(|entry| entry.key == key)
            .and_then(|entry| entry.value.downcast_ref::<T>())
    }

    /// Get a string slice if the stored value is a `String` or `&'static str`
    pub fn get_str(&self, key: &str) -> Option<&str> {
        let entry = self.entries().find(|entry| entry.key == key)?;
        if let Some(s) = entry.value.downcast_ref::<String>() {
            Some(s.as_str())
        } else {
            entry.value.downcast_ref::<&'static str>().copied()
        }
    }

    /// Check if a key exists in the context
    pub fn contains(&self, key: &str) -> bool {
        self.entries().any(|entry| entry.key == key)
    }

    /// Distinct keys, newest first
    pub fn keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.entries()
            .map(|entry| entry.key.as_str())
            .filter(|key| seen.insert(*key))
            .collect()
    }

    /// Number of entries in the chain, shadowed ones included
    pub fn depth(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Whether `self` is `base` or was derived from it.
    pub fn extends(&self, base: &Context) -> bool {
        let Some(base_head) = &base.head else {
            return true;
        };
        let mut cursor = self.head.as_ref();
        while let Some(entry) = cursor {
            if Arc::ptr_eq(entry, base_head) {
                return true;
            }
            cursor = entry.parent.as_ref();
        }
        false
    }

    /// Whether both handles point at the same snapshot
    pub fn ptr_eq(&self, other: &Context) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    fn entries(&self) -> impl Iterator<Item = &Entry> {
        std::iter::successors(self.head.as_deref(), |entry| entry.parent.as_deref())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context").field("keys", &self.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_values() {
        let root = Context::new().with_value("root", "rootValue".to_string());
        let ctx = root.with_value("Service1", true).with_value("count", 3_usize);

        assert_eq!(ctx.get_str("root"), Some("rootValue"));
        assert_eq!(ctx.get::<bool>("Service1"), Some(&true));
        assert_eq!(ctx.get::<usize>("count"), Some(&3));
        assert_eq!(ctx.get::<u32>("count"), None);
        assert!(!ctx.contains("Service3"));

        // the parent snapshot never sees derived keys
        assert!(!root.contains("Service1"));
        assert_eq!(root.depth(), 1);
    }

    #[test]
    fn test_context_shadowing_keeps_parent() {
        let parent = Context::new().with_value("key", 1_i32);
        let child = parent.with_value("key", 2_i32);

        assert_eq!(child.get::<i32>("key"), Some(&2));
        assert_eq!(parent.get::<i32>("key"), Some(&1));
        assert_eq!(child.keys(), vec!["key"]);
        assert_eq!(child.depth(), 2);
    }

    #[test]
    fn test_context_lineage() {
        let root = Context::new();
        let a = root.with_value("a", 1_u8);
        let b = a.with_value("b", 2_u8);
        let unrelated = Context::new().with_value("a", 1_u8);

        assert!(b.extends(&a));
        assert!(b.extends(&root));
        assert!(a.extends(&a));
        assert!(!a.extends(&b));
        assert!(!unrelated.extends(&a));

        assert!(a.clone().ptr_eq(&a));
        assert!(!a.ptr_eq(&unrelated));
        assert!(Context::new().ptr_eq(&root));
    }
}
