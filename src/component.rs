//! Process-wide component type registration.
//!
//! Each distinct component type is assigned a small dense index the
//! first time it is used. The table is process-wide so the same type
//! resolves to the same index in every universe, which is what allows
//! component values to be copied between universes.

use core::fmt::{self, Formatter};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Mutex;

use once_cell::sync::Lazy;

use crate::error::{Error, Result};

/// The total number of distinct component types a process may register
pub const MAX_COMPONENTS: usize = 256;

/// Marker trait for types which can be attached to entities.
///
/// No `Send` or `Sync` bound: a universe and everything in it is driven
/// from a single thread.
pub trait Component: 'static {}

impl<T> Component for T where T: 'static {}

/// The dense index assigned to a component type at first use
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(u16);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        debug_assert!(index < MAX_COMPONENTS);
        Self(index as u16)
    }
}

impl fmt::Debug for ComponentId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match component_name(*self) {
            Some(name) => write!(f, "{name}#{}", self.0),
            None => write!(f, "#{}", self.0),
        }
    }
}

#[derive(Default)]
struct Registry {
    indices: HashMap<TypeId, ComponentId>,
    /// Display names, indexed by component id
    names: Vec<&'static str>,
}

impl Registry {
    fn get_or_register(&mut self, key: TypeId, name: impl FnOnce() -> String) -> Result<ComponentId> {
        if let Some(&id) = self.indices.get(&key) {
            return Ok(id);
        }

        if self.names.len() >= MAX_COMPONENTS {
            return Err(Error::ComponentCountExceeded);
        }

        let id = ComponentId(self.names.len() as u16);
        // Leaked once per type, bounded by MAX_COMPONENTS
        let name: &'static str = Box::leak(name().into_boxed_str());
        self.names.push(name);
        self.indices.insert(key, id);

        tracing::debug!(name, index = id.0, "registered component type");

        Ok(id)
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(Default::default);

/// Returns the index for `C`, registering the type on first use.
///
/// Fails with [`Error::ComponentCountExceeded`] once [`MAX_COMPONENTS`]
/// distinct types have been registered.
pub fn component_id<C: Component>() -> Result<ComponentId> {
    REGISTRY
        .lock()
        .expect("component registry poisoned")
        .get_or_register(TypeId::of::<C>(), || tynm::type_name::<C>())
}

/// Returns the index for `C` only if the type was registered before
pub fn registered_component_id<C: Component>() -> Option<ComponentId> {
    REGISTRY
        .lock()
        .expect("component registry poisoned")
        .indices
        .get(&TypeId::of::<C>())
        .copied()
}

/// The display name recorded when `id` was registered
pub fn component_name(id: ComponentId) -> Option<&'static str> {
    REGISTRY
        .lock()
        .expect("component registry poisoned")
        .names
        .get(id.index())
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_stable() {
        struct Health(#[allow(dead_code)] f32);
        struct Stamina(#[allow(dead_code)] f32);

        let a = component_id::<Health>().unwrap();
        let b = component_id::<Stamina>().unwrap();

        assert_ne!(a, b);
        assert_eq!(component_id::<Health>().unwrap(), a);
        assert_eq!(registered_component_id::<Health>(), Some(a));
        assert_eq!(component_name(a), Some("Health"));
    }

    #[test]
    fn unregistered_type_is_absent() {
        struct NeverUsed;
        assert_eq!(registered_component_id::<NeverUsed>(), None);
    }

    #[test]
    fn type_limit_is_enforced() {
        let mut registry = Registry::default();
        registry.names.resize(MAX_COMPONENTS, "filler");

        struct Overflow;
        assert_eq!(
            registry.get_or_register(TypeId::of::<Overflow>(), || "Overflow".into()),
            Err(Error::ComponentCountExceeded)
        );
    }
}
