//! The universe: factory and owner of entities and their components.
//!
//! Component values of each type live in their own chunked arena,
//! created lazily at first use. An entity is a slot in the entity arena
//! holding a pointer to shared archetype metadata plus a dense vector
//! of component handles, ordered by component index. Destroying an
//! entity bumps its slot's generation, invalidating every outstanding
//! handle in one step.

use core::any::Any;
use core::fmt::{self, Formatter};

use smallvec::SmallVec;

use crate::arena::{ArenaHandle, ChunkedArena};
use crate::archetype::{ArchetypeId, ArchetypeMeta, ArchetypeStore, EMPTY_ARCHETYPE};
use crate::bundle::{Bundle, CloneBundle, QueryFn};
use crate::component::{
    component_id, component_name, registered_component_id, Component, ComponentId,
};
use crate::entity::{Entity, UniverseId};
use crate::error::{Error, Result};
use crate::instantiation::InstantiationId;
use crate::mask::ComponentMask;
use crate::signal::{Link, Signal};

/// Entities per entity-arena block
pub const ENTITY_BLOCK_SIZE: usize = 8192;
/// Components per component-arena block
pub const COMPONENT_BLOCK_SIZE: usize = 8192;
/// Minimum free-queue size before an entity slot is reused. Non-zero so
/// that a recycled slot stays out of circulation for a while; together
/// with the generation counter this makes accidental reuse observable.
pub const ENTITY_REUSE: usize = 1024;
/// Component slots are recycled eagerly; they are only reachable
/// through their entity, which is re-validated on every access.
pub const COMPONENT_REUSE: usize = 0;

pub(crate) type HandleVec = SmallVec<[ArenaHandle; 8]>;

/// Component ids of a pack, in declared order
pub type ComponentIdList = SmallVec<[ComponentId; 8]>;

/// The per-entity payload stored in the entity arena
struct EntityData {
    meta: ArchetypeId,
    /// One live handle per bit set in the archetype mask, ordered by
    /// component index
    handles: HandleVec,
    instantiation: Option<InstantiationId>,
}

/// Type-erased face of a component arena; enough to destroy a
/// component without knowing its type.
pub(crate) trait AnyArena {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn destroy(&mut self, handle: ArenaHandle) -> bool;
    fn len(&self) -> usize;
}

impl<C: Component> AnyArena for ChunkedArena<C, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn destroy(&mut self, handle: ArenaHandle) -> bool {
        ChunkedArena::destroy(self, handle)
    }

    fn len(&self) -> usize {
        ChunkedArena::len(self)
    }
}

#[derive(Default)]
struct ComponentSignals {
    added: Signal<Entity>,
    removed: Signal<Entity>,
}

/// Factory and master object for entities and their components.
///
/// All operations are driven from a single thread; entity handles carry
/// the universe's id and are rejected by any other universe.
pub struct Universe {
    id: UniverseId,
    entities: ChunkedArena<EntityData, ENTITY_BLOCK_SIZE, ENTITY_REUSE>,
    /// Generation counter per entity slot, keyed by flat slot index
    generations: Vec<u32>,
    archetypes: ArchetypeStore,
    /// One lazily created arena per registered component type
    components: Vec<Option<Box<dyn AnyArena>>>,
    /// Added/removed signal pair per component type, created on demand
    signals: Vec<Option<Box<ComponentSignals>>>,
}

impl Universe {
    pub fn new() -> Self {
        Self {
            id: UniverseId::next(),
            entities: ChunkedArena::new(),
            generations: Vec::new(),
            archetypes: ArchetypeStore::new(),
            components: Vec::new(),
            signals: Vec::new(),
        }
    }

    /// The process-unique id of this universe
    pub fn id(&self) -> UniverseId {
        self.id
    }

    // --- entity lifecycle -------------------------------------------------

    /// Creates an empty entity and returns a handle to it
    pub fn create(&mut self) -> Entity {
        let slot = self.entities.add(EntityData {
            meta: EMPTY_ARCHETYPE,
            handles: SmallVec::new(),
            instantiation: None,
        });
        self.archetypes.connect(ComponentMask::EMPTY);

        let flat = slot.block as usize * ENTITY_BLOCK_SIZE + slot.index as usize;
        if self.generations.len() <= flat {
            self.generations.resize(flat + 1, 0);
        }

        let entity = Entity {
            slot,
            generation: self.generations[flat],
            universe: self.id,
        };
        tracing::trace!(%entity, "created entity");
        entity
    }

    /// Creates an entity with every component of `B` default-constructed
    pub fn create_with<B: Bundle + Default>(&mut self) -> Result<Entity> {
        self.create_from(B::default())
    }

    /// Creates an entity carrying the given component values
    pub fn create_from<B: Bundle>(&mut self, bundle: B) -> Result<Entity> {
        let entity = self.create();
        self.add(entity, bundle)?;
        Ok(entity)
    }

    /// Creates `n` entities sharing one archetype.
    ///
    /// The first entity is constructed with default components and the
    /// callback is invoked on it before anything else happens; each
    /// remaining entity is then cloned from the sample's current
    /// component values, with the callback invoked per clone. Mutating
    /// the sample from the callback therefore seeds every clone.
    pub fn create_many<B>(
        &mut self,
        n: usize,
        mut f: impl FnMut(&mut Universe, Entity),
    ) -> Result<()>
    where
        B: CloneBundle + Default,
    {
        if n == 0 {
            return Ok(());
        }

        let sample = self.create_with::<B>()?;
        f(&mut *self, sample);

        for _ in 1..n {
            let clone = self.copy::<B>(sample)?;
            f(&mut *self, clone);
        }

        Ok(())
    }

    /// Destroys the entity and every component assigned to it.
    ///
    /// All outstanding handles to the entity become invalid at once.
    /// Destroying an already-invalid handle is a no-op, which makes the
    /// operation idempotent.
    pub fn destroy(&mut self, entity: Entity) {
        if !self.is_valid(entity) {
            return;
        }

        let data = self.entities.get(entity.slot).expect("validated entity");
        let meta_id = data.meta;
        let handles = data.handles.clone();
        let mask = *self.archetypes.get(meta_id).mask();

        for (position, id) in mask.ones().enumerate() {
            self.components[id.index()]
                .as_mut()
                .expect("arena for attached component")
                .destroy(handles[position]);
        }

        self.archetypes.disconnect(meta_id);
        self.entities.destroy(entity.slot);
        self.generations[entity.flat_slot()] += 1;

        tracing::trace!(%entity, "destroyed entity");
    }

    /// Returns true while the handle refers to a live entity of this
    /// universe. A single generation comparison.
    pub fn is_valid(&self, entity: Entity) -> bool {
        entity.universe == self.id
            && self.generations.get(entity.flat_slot()).copied() == Some(entity.generation)
    }

    // --- component access -------------------------------------------------

    /// Returns true if the entity is valid and has a component of type
    /// `C`. A single bit check.
    pub fn has<C: Component>(&self, entity: Entity) -> bool {
        let Ok(data) = self.check(entity) else {
            return false;
        };
        let Some(id) = registered_component_id::<C>() else {
            return false;
        };

        self.archetypes.get(data.meta).mask().contains(id)
    }

    /// Adds the components of `B` to the entity.
    ///
    /// A component the entity already has is silently discarded rather
    /// than replaced; this is not an error. Added/removed signals fire
    /// after the structural change completes.
    pub fn add<B: Bundle>(&mut self, entity: Entity, bundle: B) -> Result<()> {
        let ids = B::component_ids()?;
        self.check(entity)?;

        let old_mask = self.extend_archetype(entity, &ids);
        let installed = bundle.install(self, entity, &old_mask, &ids);

        for &id in &installed {
            self.emit_added(id, entity);
        }

        Ok(())
    }

    /// Returns a reference to the entity's `C` component
    pub fn get<C: Component>(&self, entity: Entity) -> Result<&C> {
        let data = self.check(entity)?;
        let id = registered_component_id::<C>().ok_or_else(|| missing::<C>(entity))?;
        let position = self
            .archetypes
            .get(data.meta)
            .position_of(id)
            .ok_or_else(|| missing::<C>(entity))?;

        let handle = data.handles[position];
        let arena = self.arena::<C>(id).expect("arena for attached component");
        Ok(arena.get(handle).expect("live component handle"))
    }

    /// Returns a mutable reference to the entity's `C` component
    pub fn get_mut<C: Component>(&mut self, entity: Entity) -> Result<&mut C> {
        let data = self.check(entity)?;
        let id = registered_component_id::<C>().ok_or_else(|| missing::<C>(entity))?;
        let position = self
            .archetypes
            .get(data.meta)
            .position_of(id)
            .ok_or_else(|| missing::<C>(entity))?;

        let handle = data.handles[position];
        let arena = self
            .components[id.index()]
            .as_mut()
            .expect("arena for attached component")
            .as_any_mut()
            .downcast_mut::<ChunkedArena<C, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE>>()
            .expect("component type matches arena");
        Ok(arena.get_mut(handle).expect("live component handle"))
    }

    /// Removes the entity's `C` component. Doing so for a component the
    /// entity does not have is a no-op.
    pub fn remove<C: Component>(&mut self, entity: Entity) -> Result<()> {
        self.check(entity)?;
        let Some(id) = registered_component_id::<C>() else {
            return Ok(());
        };

        let data = self.entities.get(entity.slot).expect("validated entity");
        let meta_id = data.meta;
        let meta = self.archetypes.get(meta_id);
        let Some(position) = meta.position_of(id) else {
            return Ok(());
        };

        let mut new_mask = *meta.mask();
        new_mask.clear(id);

        let data = self.entities.get_mut(entity.slot).expect("validated entity");
        let handle = data.handles.remove(position);
        self.components[id.index()]
            .as_mut()
            .expect("arena for attached component")
            .destroy(handle);

        self.archetypes.disconnect(meta_id);
        let new_meta = self.archetypes.connect(new_mask);
        self.entities
            .get_mut(entity.slot)
            .expect("validated entity")
            .meta = new_meta;

        tracing::trace!(%entity, component = ?id, "removed component");
        self.emit_removed(id, entity);
        Ok(())
    }

    // --- copies -----------------------------------------------------------

    /// Creates a new entity carrying clones of the listed components of
    /// `entity`. Every listed component must be present.
    pub fn copy<B: CloneBundle>(&mut self, entity: Entity) -> Result<Entity> {
        let values = B::clone_components(self, entity)?;
        self.create_from(values)
    }

    /// Like [`Self::copy`], but listed components the entity does not
    /// have are silently skipped.
    pub fn checked_copy<B: CloneBundle>(&mut self, entity: Entity) -> Result<Entity> {
        self.check(entity)?;
        let copy = self.create();
        B::checked_copy_components(self, entity, copy)?;
        Ok(copy)
    }

    // --- signals ----------------------------------------------------------

    /// Registers a callback invoked after a `C` component is added to
    /// any entity of this universe
    pub fn on_added<C: Component>(&mut self, callback: impl Fn(Entity) + 'static) -> Result<Link> {
        let id = component_id::<C>()?;
        Ok(self
            .signals_entry(id)
            .added
            .connect(move |entity| callback(*entity)))
    }

    /// Registers a callback invoked after a `C` component is removed
    /// from any entity of this universe
    pub fn on_removed<C: Component>(
        &mut self,
        callback: impl Fn(Entity) + 'static,
    ) -> Result<Link> {
        let id = component_id::<C>()?;
        Ok(self
            .signals_entry(id)
            .removed
            .connect(move |entity| callback(*entity)))
    }

    // --- iteration and introspection --------------------------------------

    /// Visits every entity of `entities` that has all components of the
    /// query, passing mutable references to each.
    ///
    /// Invalid handles and entities lacking a queried component are
    /// skipped. Listing the same component type twice panics, since the
    /// two references would alias.
    pub fn iterate<Q, F: QueryFn<Q>>(&mut self, entities: &[Entity], mut f: F) {
        let Some(ids) = F::component_ids() else {
            // A type never registered is attached to nothing
            return;
        };

        for i in 0..ids.len() {
            for j in i + 1..ids.len() {
                assert!(
                    ids[i] != ids[j],
                    "duplicate component type in iterate query"
                );
            }
        }

        for &entity in entities {
            f.invoke(self, entity, &ids);
        }
    }

    /// Iterates every live entity of this universe
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.entities.iter().map(|(slot, _)| {
            let flat = slot.block as usize * ENTITY_BLOCK_SIZE + slot.index as usize;
            Entity {
                slot,
                generation: self.generations[flat],
                universe: self.id,
            }
        })
    }

    /// The number of live entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// The number of live components of type `C`
    pub fn component_count<C: Component>(&self) -> usize {
        registered_component_id::<C>()
            .and_then(|id| self.components.get(id.index())?.as_ref())
            .map(|arena| arena.len())
            .unwrap_or(0)
    }

    /// The archetype the entity currently belongs to
    pub fn archetype_of(&self, entity: Entity) -> Result<ArchetypeId> {
        Ok(self.check(entity)?.meta)
    }

    /// The shared metadata record of an archetype
    pub fn archetype_meta(&self, id: ArchetypeId) -> &ArchetypeMeta {
        self.archetypes.get(id)
    }

    /// The number of archetype metadata records alive, the permanent
    /// empty archetype included
    pub fn archetype_count(&self) -> usize {
        self.archetypes.len()
    }

    // --- instantiation ----------------------------------------------------

    /// Attaches an instantiation kind to the entity
    pub fn set_instantiation(&mut self, entity: Entity, id: InstantiationId) -> Result<()> {
        self.check_mut(entity)?.instantiation = Some(id);
        Ok(())
    }

    /// The instantiation kind attached to the entity, if any
    pub fn instantiation(&self, entity: Entity) -> Option<InstantiationId> {
        self.check(entity).ok()?.instantiation
    }

    // --- internals --------------------------------------------------------

    fn check(&self, entity: Entity) -> Result<&EntityData> {
        if !self.is_valid(entity) {
            return Err(Error::NoSuchEntity(entity));
        }

        self.entities
            .get(entity.slot)
            .ok_or(Error::NoSuchEntity(entity))
    }

    fn check_mut(&mut self, entity: Entity) -> Result<&mut EntityData> {
        if !self.is_valid(entity) {
            return Err(Error::NoSuchEntity(entity));
        }

        self.entities
            .get_mut(entity.slot)
            .ok_or(Error::NoSuchEntity(entity))
    }

    /// Moves a validated entity to the archetype extended by `ids`,
    /// inserting placeholder handles at the new dense positions.
    /// Returns the previous mask.
    fn extend_archetype(&mut self, entity: Entity, ids: &[ComponentId]) -> ComponentMask {
        let data = self.entities.get(entity.slot).expect("validated entity");
        let old_meta = data.meta;
        let old_mask = *self.archetypes.get(old_meta).mask();

        let mut new_mask = old_mask;
        for &id in ids {
            new_mask.set(id);
        }

        if new_mask == old_mask {
            return old_mask;
        }

        self.archetypes.disconnect(old_meta);
        let new_meta = self.archetypes.connect(new_mask);

        let data = self.entities.get_mut(entity.slot).expect("validated entity");
        data.meta = new_meta;
        for (position, id) in new_mask.ones().enumerate() {
            if !old_mask.contains(id) {
                data.handles.insert(position, ArenaHandle::NULL);
            }
        }

        old_mask
    }

    /// Constructs a component value in its type's arena, creating the
    /// arena on first use
    pub(crate) fn alloc_component_value<C: Component>(
        &mut self,
        value: C,
        id: ComponentId,
    ) -> ArenaHandle {
        let index = id.index();
        if self.components.len() <= index {
            self.components.resize_with(index + 1, || None);
        }

        let slot = &mut self.components[index];
        if slot.is_none() {
            tracing::trace!(component = ?id, "created component arena");
            *slot = Some(Box::new(ChunkedArena::<
                C,
                COMPONENT_BLOCK_SIZE,
                COMPONENT_REUSE,
            >::new()));
        }

        slot.as_mut()
            .expect("just ensured")
            .as_any_mut()
            .downcast_mut::<ChunkedArena<C, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE>>()
            .expect("component type matches arena")
            .add(value)
    }

    /// Writes a component handle at its dense position in the entity's
    /// handle vector
    pub(crate) fn write_component_handle(
        &mut self,
        entity: Entity,
        id: ComponentId,
        handle: ArenaHandle,
    ) {
        let meta_id = self.entities.get(entity.slot).expect("validated entity").meta;
        let position = self
            .archetypes
            .get(meta_id)
            .position_of(id)
            .expect("component in archetype");

        self.entities
            .get_mut(entity.slot)
            .expect("validated entity")
            .handles[position] = handle;
    }

    /// The handles of `ids` on the entity, in the order of `ids`.
    /// `None` if the entity is invalid or lacks any of them.
    pub(crate) fn query_handles(&self, entity: Entity, ids: &[ComponentId]) -> Option<HandleVec> {
        let data = self.check(entity).ok()?;
        let meta = self.archetypes.get(data.meta);

        ids.iter()
            .map(|&id| Some(data.handles[meta.position_of(id)?]))
            .collect()
    }

    /// Mutable access to several distinct component arenas at once
    pub(crate) fn arenas_mut<const N: usize>(
        &mut self,
        ids: [ComponentId; N],
    ) -> [&mut dyn AnyArena; N] {
        self.components
            .get_disjoint_mut(ids.map(|id| id.index()))
            .expect("distinct, attached component indices")
            .map(|slot| {
                slot.as_mut()
                    .expect("arena for attached component")
                    .as_mut()
            })
    }

    fn signals_entry(&mut self, id: ComponentId) -> &ComponentSignals {
        let index = id.index();
        if self.signals.len() <= index {
            self.signals.resize_with(index + 1, || None);
        }

        self.signals[index].get_or_insert_with(Default::default)
    }

    pub(crate) fn emit_added(&self, id: ComponentId, entity: Entity) {
        if let Some(Some(signals)) = self.signals.get(id.index()) {
            signals.added.emit(&entity);
        }
    }

    pub(crate) fn emit_removed(&self, id: ComponentId, entity: Entity) {
        if let Some(Some(signals)) = self.signals.get(id.index()) {
            signals.removed.emit(&entity);
        }
    }

    pub(crate) fn arena<C: Component>(
        &self,
        id: ComponentId,
    ) -> Option<&ChunkedArena<C, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE>> {
        self.components
            .get(id.index())?
            .as_ref()?
            .as_any()
            .downcast_ref()
    }
}

impl Default for Universe {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Universe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Universe")
            .field("id", &self.id)
            .field("entities", &self.entity_count())
            .field("archetypes", &self.archetype_count())
            .finish()
    }
}

fn missing<C: Component>(entity: Entity) -> Error {
    let name = registered_component_id::<C>()
        .and_then(component_name)
        .unwrap_or_else(|| core::any::type_name::<C>());

    Error::ComponentMissing(entity, name)
}
