//! Dependency injection container
//!
//! The [`Injector`] holds every instance built during resolution. Provision
//! constructors receive it to fetch the capabilities they declared as
//! dependencies; requirement slots are filled from it once resolution ends.

use std::collections::{HashMap, HashSet};

use super::{
    error::{Error, Result},
    registry::{Capability, Injectable, Instance},
};

/// Instances built so far during a resolution pass
#[derive(Default)]
pub struct Injector {
    instances: HashMap<Capability, Instance>,
    built: HashSet<Capability>,
}

impl Injector {
    /// Get the singular instance of `T`, if built
    pub fn get<T: Injectable>(&self) -> Option<T> {
        self.instances
            .get(&Capability::of::<T>())
            .and_then(|instance| instance.downcast_ref::<T>())
            .cloned()
    }

    /// Get the singular instance of `T` or report it as not provided
    pub fn resolve<T: Injectable>(&self) -> Result<T> {
        self.get::<T>().ok_or(Error::ImplementationNotProvided {
            capability: Capability::of::<T>(),
        })
    }

    /// Get every element of the collection capability of `T`
    pub fn get_all<T: Injectable>(&self) -> Vec<T> {
        self.instances
            .get(&Capability::collection_of::<T>())
            .and_then(|instance| instance.downcast_ref::<Vec<T>>())
            .cloned()
            .unwrap_or_default()
    }

    /// Whether `capability` has been built
    pub fn contains(&self, capability: &Capability) -> bool {
        self.built.contains(capability)
    }

    /// Number of built capabilities
    pub fn len(&self) -> usize {
        self.built.len()
    }

    pub fn is_empty(&self) -> bool {
        self.built.is_empty()
    }

    /// Record a built capability. Collections demanded only as a dependency
    /// have no collector and are built without an instance.
    pub(crate) fn insert(&mut self, capability: Capability, instance: Option<Instance>) {
        self.built.insert(capability);
        if let Some(instance) = instance {
            self.instances.insert(capability, instance);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_injector_lookups() {
        let mut injector = Injector::default();
        assert!(injector.is_empty());
        assert!(injector.get::<u32>().is_none());
        assert!(injector.get_all::<u32>().is_empty());
        assert!(matches!(
            injector.resolve::<u32>(),
            Err(Error::ImplementationNotProvided { .. })
        ));

        injector.insert(Capability::of::<u32>(), Some(Box::new(5_u32) as Instance));
        injector.insert(
            Capability::collection_of::<u32>(),
            Some(Box::new(vec![1_u32, 2]) as Instance),
        );
        injector.insert(Capability::collection_of::<u8>(), None);

        assert_eq!(injector.resolve::<u32>().ok(), Some(5));
        assert_eq!(injector.get_all::<u32>(), vec![1, 2]);
        assert!(injector.contains(&Capability::collection_of::<u8>()));
        assert!(injector.get_all::<u8>().is_empty());
        assert_eq!(injector.len(), 3);
    }
}
