//! Shared per-archetype metadata.
//!
//! All entities with the same component mask share one metadata record
//! which knows, for each component index, the dense position of that
//! component's handle in the entity's handle vector. Records are
//! created on demand for a previously unseen mask and released when the
//! last entity leaves the archetype.

use core::fmt::{self, Formatter};
use std::collections::HashMap;

use crate::component::{ComponentId, MAX_COMPONENTS};
use crate::mask::ComponentMask;

/// Identifies an archetype metadata record within one universe
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ArchetypeId(u32);

/// The id of the permanent empty-mask archetype
pub(crate) const EMPTY_ARCHETYPE: ArchetypeId = ArchetypeId(0);

/// Metadata shared by every entity with the same component mask
pub struct ArchetypeMeta {
    mask: ComponentMask,
    /// Maps a component index to the position of its handle in the
    /// entity's handle vector. Entries for unset bits are meaningless.
    positions: Box<[u16; MAX_COMPONENTS]>,
    /// The number of entities currently sharing this record
    entities: usize,
}

impl ArchetypeMeta {
    fn new(mask: ComponentMask) -> Self {
        let mut positions = Box::new([0u16; MAX_COMPONENTS]);
        for (ordinal, id) in mask.ones().enumerate() {
            positions[id.index()] = ordinal as u16;
        }

        Self {
            mask,
            positions,
            entities: 0,
        }
    }

    /// The component mask characterizing this archetype
    pub fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// The dense position of `id` in the handle vector, if present
    #[inline]
    pub fn position_of(&self, id: ComponentId) -> Option<usize> {
        if self.mask.contains(id) {
            Some(self.positions[id.index()] as usize)
        } else {
            None
        }
    }

    /// The number of entities currently in this archetype
    pub fn entity_count(&self) -> usize {
        self.entities
    }
}

impl fmt::Debug for ArchetypeMeta {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeMeta")
            .field("mask", &self.mask)
            .field("entities", &self.entities)
            .finish()
    }
}

pub(crate) struct ArchetypeStore {
    metas: Vec<Option<ArchetypeMeta>>,
    free: Vec<u32>,
    by_mask: HashMap<ComponentMask, ArchetypeId>,
}

impl ArchetypeStore {
    pub fn new() -> Self {
        // The empty archetype is permanent; entities without components
        // connect to it and it is never released.
        Self {
            metas: vec![Some(ArchetypeMeta::new(ComponentMask::EMPTY))],
            free: Vec::new(),
            by_mask: HashMap::from([(ComponentMask::EMPTY, EMPTY_ARCHETYPE)]),
        }
    }

    pub fn get(&self, id: ArchetypeId) -> &ArchetypeMeta {
        self.metas[id.0 as usize].as_ref().expect("stale archetype id")
    }

    /// Connects one entity to the metadata for `mask`, creating the
    /// record if this is the first entity with that mask.
    pub fn connect(&mut self, mask: ComponentMask) -> ArchetypeId {
        let id = match self.by_mask.get(&mask) {
            Some(&id) => id,
            None => {
                let meta = ArchetypeMeta::new(mask);
                let id = match self.free.pop() {
                    Some(slot) => {
                        self.metas[slot as usize] = Some(meta);
                        ArchetypeId(slot)
                    }
                    None => {
                        self.metas.push(Some(meta));
                        ArchetypeId(self.metas.len() as u32 - 1)
                    }
                };

                tracing::trace!(?mask, ?id, "new archetype");
                self.by_mask.insert(mask, id);
                id
            }
        };

        self.metas[id.0 as usize]
            .as_mut()
            .expect("stale archetype id")
            .entities += 1;

        id
    }

    /// Disconnects one entity from its metadata, releasing the record
    /// when the last entity leaves. The empty archetype is kept.
    pub fn disconnect(&mut self, id: ArchetypeId) {
        let meta = self.metas[id.0 as usize]
            .as_mut()
            .expect("stale archetype id");

        meta.entities -= 1;

        if meta.entities == 0 && id != EMPTY_ARCHETYPE {
            let mask = meta.mask;
            tracing::trace!(?mask, ?id, "released archetype");
            self.by_mask.remove(&mask);
            self.metas[id.0 as usize] = None;
            self.free.push(id.0);
        }
    }

    /// The number of metadata records alive, the empty one included
    pub fn len(&self) -> usize {
        self.by_mask.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentId;

    fn mask_of(indices: &[usize]) -> ComponentMask {
        indices
            .iter()
            .map(|&i| ComponentId::from_index(i))
            .collect()
    }

    #[test]
    fn positions_follow_bit_order() {
        let store_mask = mask_of(&[7, 3, 200, 64]);
        let meta = ArchetypeMeta::new(store_mask);

        assert_eq!(meta.position_of(ComponentId::from_index(3)), Some(0));
        assert_eq!(meta.position_of(ComponentId::from_index(7)), Some(1));
        assert_eq!(meta.position_of(ComponentId::from_index(64)), Some(2));
        assert_eq!(meta.position_of(ComponentId::from_index(200)), Some(3));
        assert_eq!(meta.position_of(ComponentId::from_index(8)), None);
    }

    #[test]
    fn metadata_is_shared_and_released() {
        let mut store = ArchetypeStore::new();
        let mask = mask_of(&[1, 2]);

        let a = store.connect(mask);
        let b = store.connect(mask);
        assert_eq!(a, b);
        assert_eq!(store.get(a).entity_count(), 2);
        assert_eq!(store.len(), 2);

        store.disconnect(a);
        assert_eq!(store.len(), 2);

        store.disconnect(b);
        assert_eq!(store.len(), 1);

        // A fresh connect recreates the record
        let c = store.connect(mask);
        assert_eq!(store.get(c).entity_count(), 1);
        assert_eq!(*store.get(c).mask(), mask);
    }

    #[test]
    fn empty_archetype_is_permanent() {
        let mut store = ArchetypeStore::new();

        let id = store.connect(ComponentMask::EMPTY);
        assert_eq!(id, EMPTY_ARCHETYPE);

        store.disconnect(id);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(EMPTY_ARCHETYPE).entity_count(), 0);
    }
}
