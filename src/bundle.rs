//! Tuple adapters for operating on several component types at once.
//!
//! The contract of every adapter is the same: apply the operation once
//! per listed type, in declared order. [`Bundle`] carries values into
//! an entity, [`CloneBundle`] copies values off one, and [`QueryFn`] is
//! implemented by closures receiving mutable references to each
//! component during iteration.

use crate::arena::ChunkedArena;
use crate::component::{component_id, registered_component_id, Component, ComponentId};
use crate::entity::Entity;
use crate::error::Result;
use crate::mask::ComponentMask;
use crate::universe::{
    AnyArena, ComponentIdList, Universe, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE,
};

/// A pack of component values which can be moved onto an entity.
///
/// Implemented for tuples of up to eight component types.
pub trait Bundle: 'static {
    /// Registers every component type of the pack and returns their
    /// ids, in declared order
    fn component_ids() -> Result<ComponentIdList>;

    /// Moves each value into its arena and records its handle on the
    /// entity. Values whose component the entity already has are
    /// discarded. Returns the ids actually installed.
    #[doc(hidden)]
    fn install(
        self,
        universe: &mut Universe,
        entity: Entity,
        old_mask: &ComponentMask,
        ids: &[ComponentId],
    ) -> ComponentIdList;
}

/// A pack whose component values can be cloned off an entity.
pub trait CloneBundle: Bundle + Sized {
    /// Clones every listed component of `entity`. Fails with
    /// [`crate::Error::ComponentMissing`] if any is absent.
    fn clone_components(universe: &Universe, entity: Entity) -> Result<Self>;

    /// Clones each listed component present on `src` onto `dst`,
    /// skipping absent ones
    fn checked_copy_components(universe: &mut Universe, src: Entity, dst: Entity) -> Result<()>;

    /// Like [`CloneBundle::checked_copy_components`], but `src` and
    /// `dst` live in different universes
    fn checked_copy_foreign(
        src_universe: &Universe,
        src: Entity,
        dst_universe: &mut Universe,
        dst: Entity,
    ) -> Result<()>;
}

/// Implemented by closures usable with [`Universe::iterate`]: one
/// `Entity` parameter followed by a mutable reference per queried
/// component, in declared order.
pub trait QueryFn<Q> {
    /// The ids of the queried component types, or `None` when a type
    /// was never registered
    fn component_ids() -> Option<ComponentIdList>;

    /// Invokes the closure if the entity is valid and has every
    /// queried component
    #[doc(hidden)]
    fn invoke(&mut self, universe: &mut Universe, entity: Entity, ids: &[ComponentId]);
}

macro_rules! bundle_impl {
    ($($ty:ident),*) => {
        impl<$($ty: Component,)*> Bundle for ($($ty,)*) {
            fn component_ids() -> Result<ComponentIdList> {
                let mut ids = ComponentIdList::new();
                $(ids.push(component_id::<$ty>()?);)*
                Ok(ids)
            }

            #[allow(unused_variables, unused_mut, unused_assignments, non_snake_case)]
            fn install(
                self,
                universe: &mut Universe,
                entity: Entity,
                old_mask: &ComponentMask,
                ids: &[ComponentId],
            ) -> ComponentIdList {
                let ($($ty,)*) = self;
                let mut seen = *old_mask;
                let mut installed = ComponentIdList::new();
                let mut cursor = 0;

                $(
                    let id = ids[cursor];
                    cursor += 1;
                    if seen.contains(id) {
                        tracing::trace!(%entity, component = ?id, "discarding duplicate component");
                        drop($ty);
                    } else {
                        let handle = universe.alloc_component_value($ty, id);
                        universe.write_component_handle(entity, id, handle);
                        seen.set(id);
                        installed.push(id);
                    }
                )*

                installed
            }
        }

        impl<$($ty: Component + Clone,)*> CloneBundle for ($($ty,)*) {
            #[allow(unused_variables)]
            fn clone_components(universe: &Universe, entity: Entity) -> Result<Self> {
                Ok(($(universe.get::<$ty>(entity)?.clone(),)*))
            }

            #[allow(unused_variables)]
            fn checked_copy_components(
                universe: &mut Universe,
                src: Entity,
                dst: Entity,
            ) -> Result<()> {
                $(
                    if universe.has::<$ty>(src) {
                        let value = universe.get::<$ty>(src)?.clone();
                        universe.add(dst, (value,))?;
                    }
                )*
                Ok(())
            }

            #[allow(unused_variables)]
            fn checked_copy_foreign(
                src_universe: &Universe,
                src: Entity,
                dst_universe: &mut Universe,
                dst: Entity,
            ) -> Result<()> {
                $(
                    if src_universe.has::<$ty>(src) {
                        let value = src_universe.get::<$ty>(src)?.clone();
                        dst_universe.add(dst, (value,))?;
                    }
                )*
                Ok(())
            }
        }
    };
}

macro_rules! query_impl {
    ($($ty:ident),+) => {
        impl<Fun, $($ty: Component,)+> QueryFn<($($ty,)+)> for Fun
        where
            Fun: FnMut(Entity, $(&mut $ty,)+),
        {
            fn component_ids() -> Option<ComponentIdList> {
                let mut ids = ComponentIdList::new();
                $(ids.push(registered_component_id::<$ty>()?);)+
                Some(ids)
            }

            #[allow(non_snake_case, unused_assignments)]
            fn invoke(&mut self, universe: &mut Universe, entity: Entity, ids: &[ComponentId]) {
                let Some(handles) = universe.query_handles(entity, ids) else {
                    return;
                };

                let ids: [ComponentId; count!($($ty)+)] =
                    ids.try_into().expect("id count matches query arity");
                let [$($ty,)+] = universe.arenas_mut(ids);

                let mut cursor = 0;
                $(
                    let $ty = $ty
                        .as_any_mut()
                        .downcast_mut::<ChunkedArena<$ty, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE>>()
                        .expect("component type matches arena")
                        .get_mut(handles[cursor])
                        .expect("live component handle");
                    cursor += 1;
                )+

                self(entity, $($ty,)+)
            }
        }
    };
}

macro_rules! count {
    () => { 0 };
    ($head:ident $($tail:ident)*) => { 1 + count!($($tail)*) };
}

macro_rules! smaller_tuples_too {
    ($m:ident) => {
        $m!{}
    };
    ($m:ident, $ty:ident $(, $tt:ident)*) => {
        $m!{$ty $(, $tt)*}
        smaller_tuples_too!{$m $(, $tt)*}
    };
}

macro_rules! nonempty_tuples_too {
    ($m:ident, $ty:ident) => {
        $m!{$ty}
    };
    ($m:ident, $ty:ident $(, $tt:ident)+) => {
        $m!{$ty $(, $tt)+}
        nonempty_tuples_too!{$m $(, $tt)+}
    };
}

smaller_tuples_too!(bundle_impl, H, G, F, E, D, C, B, A);
nonempty_tuples_too!(query_impl, H, G, F, E, D, C, B, A);
