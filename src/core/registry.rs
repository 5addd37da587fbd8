//! Declaration registry
//!
//! Records requirements (slots to fill) and provisions (values or
//! constructors) keyed by [`Capability`]. Nothing is cross-checked while
//! declaring; all matching happens once, in [`Declarations::resolve_all`].

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    fmt,
};

use log::debug;

use super::{
    container::Injector,
    error::{Error, Result},
    resolver,
    slot::{CollectionSlot, Slot},
};

/// Anything that can be provided: shared across tasks and cloned into slots
pub trait Injectable: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Injectable for T {}

pub(crate) type Instance = Box<dyn Any + Send + Sync>;
pub(crate) type Factory = Box<dyn FnOnce(&Injector) -> Result<Instance> + Send>;
pub(crate) type Binder = Box<dyn FnOnce(&Injector) -> bool + Send>;
pub(crate) type Collector = fn(Vec<Instance>) -> Instance;

/// How many provisions a capability takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cardinality {
    Single,
    Collection,
}

/// Identifier requirements and provisions are matched by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    type_id: TypeId,
    type_name: &'static str,
    cardinality: Cardinality,
}

impl Capability {
    /// Singular capability for `T`
    pub fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            cardinality: Cardinality::Single,
        }
    }

    /// Collection capability whose elements are `T`
    pub fn collection_of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            cardinality: Cardinality::Collection,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_collection(&self) -> bool {
        self.cardinality == Cardinality::Collection
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cardinality {
            Cardinality::Single => f.write_str(self.type_name),
            Cardinality::Collection => write!(f, "[{}]", self.type_name),
        }
    }
}

pub(crate) struct Requirement {
    pub(crate) capability: Capability,
    pub(crate) binder: Binder,
}

pub(crate) struct Provision {
    pub(crate) capability: Capability,
    pub(crate) dependencies: Vec<Capability>,
    pub(crate) factory: Factory,
}

/// Pending requirements and provisions, consumed by one resolution pass
#[derive(Default)]
pub struct Declarations {
    pub(crate) requirements: Vec<Requirement>,
    pub(crate) provisions: Vec<Provision>,
    pub(crate) collectors: HashMap<Capability, Collector>,
}

impl Declarations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a singular requirement
    pub fn require<T: Injectable>(&mut self, slot: &Slot<T>) {
        let capability = Capability::of::<T>();
        debug!("Declaring requirement: {capability}");
        let slot = slot.clone();
        self.requirements.push(Requirement {
            capability,
            binder: Box::new(move |injector: &Injector| match injector.get::<T>() {
                Some(value) => slot.bind(value),
                None => false,
            }),
        });
    }

    /// Declare a collection requirement
    pub fn require_collection<T: Injectable>(&mut self, slot: &CollectionSlot<T>) {
        let capability = Capability::collection_of::<T>();
        debug!("Declaring requirement: {capability}");
        self.collectors.insert(capability, collect::<T>);
        let slot = slot.clone();
        self.requirements.push(Requirement {
            capability,
            binder: Box::new(move |injector: &Injector| slot.bind(injector.get_all::<T>())),
        });
    }

    /// Provide a value for the singular capability of `T`
    pub fn provide<T: Injectable>(&mut self, value: T) {
        self.push_provision(Capability::of::<T>(), Vec::new(), move |_| Ok(value));
    }

    /// Provide a constructor for `T` that needs `dependencies` built first
    pub fn provide_with<T, F>(&mut self, dependencies: impl IntoIterator<Item = Capability>, ctor: F)
    where
        T: Injectable,
        F: FnOnce(&Injector) -> Result<T> + Send + 'static,
    {
        self.push_provision(Capability::of::<T>(), dependencies.into_iter().collect(), ctor);
    }

    /// Append a value to the collection capability of `T`
    pub fn provide_element<T: Injectable>(&mut self, value: T) {
        let capability = Capability::collection_of::<T>();
        self.collectors.insert(capability, collect::<T>);
        self.push_provision(capability, Vec::new(), move |_| Ok(value));
    }

    /// Append a constructed element to the collection capability of `T`
    pub fn provide_element_with<T, F>(
        &mut self,
        dependencies: impl IntoIterator<Item = Capability>,
        ctor: F,
    ) where
        T: Injectable,
        F: FnOnce(&Injector) -> Result<T> + Send + 'static,
    {
        let capability = Capability::collection_of::<T>();
        self.collectors.insert(capability, collect::<T>);
        self.push_provision(capability, dependencies.into_iter().collect(), ctor);
    }

    /// Drop every pending declaration. Bound slots keep their values.
    pub fn reset(&mut self) {
        debug!(
            "Resetting {} requirements and {} provisions",
            self.requirements.len(),
            self.provisions.len()
        );
        self.requirements.clear();
        self.provisions.clear();
        self.collectors.clear();
    }

    pub fn requirement_count(&self) -> usize {
        self.requirements.len()
    }

    pub fn provision_count(&self) -> usize {
        self.provisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty() && self.provisions.is_empty()
    }

    /// Match provisions to requirements and fill the slots.
    ///
    /// Returns every problem found; an empty list means full success.
    pub fn resolve_all(self) -> Vec<Error> {
        resolver::resolve(self)
    }

    fn push_provision<T, F>(&mut self, capability: Capability, dependencies: Vec<Capability>, ctor: F)
    where
        T: Injectable,
        F: FnOnce(&Injector) -> Result<T> + Send + 'static,
    {
        debug!("Declaring provision: {capability} ({} dependencies)", dependencies.len());
        self.provisions.push(Provision {
            capability,
            dependencies,
            factory: Box::new(move |injector: &Injector| {
                ctor(injector).map(|value| Box::new(value) as Instance)
            }),
        });
    }
}

impl fmt::Debug for Declarations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let requirements: Vec<_> = self.requirements.iter().map(|r| r.capability).collect();
        let provisions: Vec<_> = self.provisions.iter().map(|p| p.capability).collect();
        f.debug_struct("Declarations")
            .field("requirements", &requirements)
            .field("provisions", &provisions)
            .finish()
    }
}

fn collect<T: Injectable>(items: Vec<Instance>) -> Instance {
    let values: Vec<T> = items
        .into_iter()
        .filter_map(|item| item.downcast::<T>().ok())
        .map(|value| *value)
        .collect();
    Box::new(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_identity() {
        assert_eq!(Capability::of::<u32>(), Capability::of::<u32>());
        assert_ne!(Capability::of::<u32>(), Capability::collection_of::<u32>());
        assert_ne!(Capability::of::<u32>(), Capability::of::<u64>());
        assert_eq!(Capability::collection_of::<u32>().to_string(), "[u32]");
        assert!(Capability::collection_of::<u32>().is_collection());
    }

    #[test]
    fn test_reset_clears_pending_declarations() {
        let slot = Slot::<u32>::new();
        let mut declarations = Declarations::new();
        declarations.require(&slot);
        declarations.provide(1_u32);
        declarations.provide_element("a");
        assert_eq!(declarations.requirement_count(), 1);
        assert_eq!(declarations.provision_count(), 2);

        declarations.reset();
        assert!(declarations.is_empty());
        assert!(declarations.resolve_all().is_empty());
        assert!(!slot.is_bound());
    }
}
