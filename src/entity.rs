use core::fmt::{self, Formatter};
use core::num::NonZeroU32;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::arena::ArenaHandle;
use crate::universe::ENTITY_BLOCK_SIZE;

/// Externally visible entity identifier, derived from the slot and its
/// generation. Injective as long as generations stay within reasonable
/// lifetimes. Suitable for serialization and for keying external maps.
pub type EntityId = u64;

const SLOT_SPACE: u64 = u32::MAX as u64;

/// Process-unique identifier of a [`crate::Universe`].
///
/// Carried inside every [`Entity`] so that a handle presented to the
/// wrong universe is rejected by the validity check instead of aliasing
/// a foreign slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct UniverseId(NonZeroU32);

impl UniverseId {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU32 = AtomicU32::new(1);

        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU32::new(id).expect("universe id counter wrapped"))
    }
}

/// A lightweight handle to an entity.
///
/// Copyable and freely storable; holding one does not keep the entity
/// alive. A handle is valid while the generation recorded in it matches
/// the generation of its slot, which makes every outstanding handle to
/// a destroyed entity invalid at once.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entity {
    pub(crate) slot: ArenaHandle,
    pub(crate) generation: u32,
    pub(crate) universe: UniverseId,
}

impl Entity {
    /// The derived unique id of this entity
    pub fn id(&self) -> EntityId {
        self.generation as u64 * SLOT_SPACE + self.flat_slot() as u64
    }

    /// The generation of the slot this handle was created from
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// The universe this handle belongs to
    pub fn universe(&self) -> UniverseId {
        self.universe
    }

    #[inline]
    pub(crate) fn flat_slot(&self) -> usize {
        self.slot.block as usize * ENTITY_BLOCK_SIZE + self.slot.index as usize
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.flat_slot(), self.generation)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
