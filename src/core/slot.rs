//! Requirement slots
//!
//! A slot is a shared, initially empty cell that resolution fills in place.
//! Handles are cheap to clone; every clone observes the same binding.

use std::{fmt, sync::Arc};

use once_cell::sync::OnceCell;

/// Singular requirement: bound to exactly one provided value
pub struct Slot<T> {
    cell: Arc<OnceCell<T>>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Borrow the bound value
    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }

    /// Returns false when the slot was already bound
    pub(crate) fn bind(&self, value: T) -> bool {
        self.cell.set(value).is_ok()
    }
}

impl<T: Clone> Slot<T> {
    /// Clone the bound value out of the slot
    pub fn cloned(&self) -> Option<T> {
        self.cell.get().cloned()
    }
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("type", &std::any::type_name::<T>())
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Collection requirement: bound to every element provision, in declaration order
pub struct CollectionSlot<T> {
    cell: Arc<OnceCell<Vec<T>>>,
}

impl<T> CollectionSlot<T> {
    pub fn new() -> Self {
        Self {
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Bound elements; empty until resolution binds the slot
    pub fn get(&self) -> &[T] {
        self.cell.get().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_bound(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn len(&self) -> usize {
        self.get().len()
    }

    pub fn is_empty(&self) -> bool {
        self.get().is_empty()
    }

    pub(crate) fn bind(&self, values: Vec<T>) -> bool {
        self.cell.set(values).is_ok()
    }
}

impl<T: Clone> CollectionSlot<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.get().to_vec()
    }
}

impl<T> Clone for CollectionSlot<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T> Default for CollectionSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for CollectionSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionSlot")
            .field("type", &std::any::type_name::<T>())
            .field("bound", &self.is_bound())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_binds_once() {
        let slot = Slot::<u32>::new();
        let alias = slot.clone();
        assert!(!slot.is_bound());
        assert!(slot.get().is_none());

        assert!(slot.bind(7));
        assert!(!alias.bind(8));
        assert_eq!(alias.cloned(), Some(7));
    }

    #[test]
    fn test_collection_slot_defaults_to_empty() {
        let slot = CollectionSlot::<&'static str>::new();
        assert!(slot.is_empty());
        assert!(!slot.is_bound());

        assert!(slot.bind(vec!["a", "b"]));
        assert_eq!(slot.to_vec(), vec!["a", "b"]);
        assert_eq!(slot.len(), 2);
    }
}
