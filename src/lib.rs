//! An arena-backed entity component system with component signals and
//! undoable actions.
//!
//! Entities are bags of components. Component values of each type live
//! in their own chunked arena with stable addresses; an entity's shape
//! is a bitmask over registered component types, and all entities with
//! the same mask share one archetype metadata record. Handles carry a
//! generation and are invalidated in O(1) when their entity is
//! destroyed.
//!
//! On top of the storage sit a re-entrancy safe [`signal`] bus with
//! per-component added/removed notifications, and an [`action`] stack
//! providing bounded undo/redo over arbitrary mutations.
//!
//! ```
//! use sorrel::Universe;
//!
//! #[derive(Default, Clone, Debug, PartialEq)]
//! struct Position {
//!     x: f32,
//!     y: f32,
//! }
//!
//! #[derive(Default, Clone, Debug, PartialEq)]
//! struct Label(String);
//!
//! # fn main() -> sorrel::Result<()> {
//! let mut universe = Universe::new();
//! let player = universe.create_from((Position { x: 1.0, y: 2.0 }, Label("player".into())))?;
//!
//! universe.get_mut::<Position>(player)?.x += 4.0;
//! assert_eq!(universe.get::<Position>(player)?.x, 5.0);
//!
//! universe.remove::<Label>(player)?;
//! assert!(!universe.has::<Label>(player));
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod arena;
mod archetype;
mod bundle;
mod component;
mod entity;
mod error;
mod instantiation;
mod mask;
#[cfg(feature = "serde")]
pub mod serialize;
pub mod signal;
mod universe;

pub use action::ActionStack;
pub use archetype::{ArchetypeId, ArchetypeMeta};
pub use bundle::{Bundle, CloneBundle, QueryFn};
pub use component::{
    component_id, component_name, registered_component_id, Component, ComponentId, MAX_COMPONENTS,
};
pub use entity::{Entity, EntityId, UniverseId};
pub use error::{Error, Result};
pub use instantiation::{Instantiation, InstantiationId, InstantiationRegistry};
pub use mask::ComponentMask;
pub use signal::{Link, Request, Signal};
pub use universe::{
    ComponentIdList, Universe, COMPONENT_BLOCK_SIZE, COMPONENT_REUSE, ENTITY_BLOCK_SIZE,
    ENTITY_REUSE,
};
