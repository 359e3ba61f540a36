//! Instantiation kinds: declared component schemas for entity classes.
//!
//! An instantiation pairs a set of required components (always present,
//! assigned at construction) with a set of optional ones (may or may
//! not be attached). Serialization and whole-entity copies route
//! through the schema instead of probing all component types.

use core::fmt::{self, Formatter};
use std::collections::HashMap;

use crate::bundle::CloneBundle;
use crate::component::ComponentId;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::mask::ComponentMask;
use crate::universe::Universe;

/// Identifies a registered [`Instantiation`] within its registry
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct InstantiationId(u32);

/// A declared entity schema: required plus optional components, keyed
/// by a stable string identifier.
pub struct Instantiation {
    identifier: String,
    required: ComponentMask,
    optional: ComponentMask,
    deep_copy: fn(&mut Universe, Entity) -> Result<Entity>,
    foreign_copy: fn(&Universe, Entity, &mut Universe) -> Result<Entity>,
    cleanup: Option<Box<dyn Fn(&mut Universe, Entity)>>,
}

impl Instantiation {
    /// Declares a schema with required components `Req` and optional
    /// components `Opt`, registering all involved component types.
    pub fn new<Req: CloneBundle, Opt: CloneBundle>(identifier: impl Into<String>) -> Result<Self> {
        Ok(Self {
            identifier: identifier.into(),
            required: Req::component_ids()?.into_iter().collect(),
            optional: Opt::component_ids()?.into_iter().collect(),
            deep_copy: deep_copy_impl::<Req, Opt>,
            foreign_copy: foreign_copy_impl::<Req, Opt>,
            cleanup: None,
        })
    }

    /// Attaches a hook invoked through
    /// [`InstantiationRegistry::cleanup`] before an entity of this kind
    /// is destroyed
    pub fn with_cleanup(mut self, f: impl Fn(&mut Universe, Entity) + 'static) -> Self {
        self.cleanup = Some(Box::new(f));
        self
    }

    /// The stable identifier this schema was declared under
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns true if `id` is one of the schema's required components
    pub fn is_required(&self, id: ComponentId) -> bool {
        self.required.contains(id)
    }

    /// Returns true if `id` is one of the schema's optional components
    pub fn has_optional(&self, id: ComponentId) -> bool {
        self.optional.contains(id)
    }

    /// The mask of required components
    pub fn required_mask(&self) -> &ComponentMask {
        &self.required
    }

    /// The mask of optional components
    pub fn optional_mask(&self) -> &ComponentMask {
        &self.optional
    }
}

impl fmt::Debug for Instantiation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instantiation")
            .field("identifier", &self.identifier)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .finish()
    }
}

fn deep_copy_impl<Req: CloneBundle, Opt: CloneBundle>(
    universe: &mut Universe,
    entity: Entity,
) -> Result<Entity> {
    let values = Req::clone_components(universe, entity)?;
    let copy = universe.create_from(values)?;
    Opt::checked_copy_components(universe, entity, copy)?;
    Ok(copy)
}

fn foreign_copy_impl<Req: CloneBundle, Opt: CloneBundle>(
    src_universe: &Universe,
    entity: Entity,
    dst_universe: &mut Universe,
) -> Result<Entity> {
    let values = Req::clone_components(src_universe, entity)?;
    let copy = dst_universe.create_from(values)?;
    Opt::checked_copy_foreign(src_universe, entity, dst_universe, copy)?;
    Ok(copy)
}

/// Client-owned table of instantiation kinds.
///
/// Identifiers are unique within a registry; entity copies and
/// serialization resolve schemas through it. Use one registry for all
/// universes that exchange entities.
#[derive(Default)]
pub struct InstantiationRegistry {
    items: Vec<Instantiation>,
    by_identifier: HashMap<String, InstantiationId>,
}

impl InstantiationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema. Fails with
    /// [`Error::DuplicateInstantiation`] if the identifier is taken.
    pub fn register(&mut self, instantiation: Instantiation) -> Result<InstantiationId> {
        if self.by_identifier.contains_key(&instantiation.identifier) {
            return Err(Error::DuplicateInstantiation(instantiation.identifier));
        }

        let id = InstantiationId(self.items.len() as u32);
        tracing::debug!(identifier = %instantiation.identifier, "registered instantiation");
        self.by_identifier
            .insert(instantiation.identifier.clone(), id);
        self.items.push(instantiation);

        Ok(id)
    }

    /// The schema registered under `id`
    pub fn get(&self, id: InstantiationId) -> &Instantiation {
        &self.items[id.0 as usize]
    }

    /// Looks a schema up by its identifier
    pub fn by_identifier(&self, identifier: &str) -> Option<InstantiationId> {
        self.by_identifier.get(identifier).copied()
    }

    /// The number of registered schemas
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Copies an entity according to its instantiation kind: required
    /// components strictly, optional ones when present. The copy
    /// carries the same kind.
    pub fn deep_copy(&self, universe: &mut Universe, entity: Entity) -> Result<Entity> {
        let id = universe
            .instantiation(entity)
            .ok_or(Error::NoInstantiation(entity))?;

        let copy = (self.get(id).deep_copy)(universe, entity)?;
        universe.set_instantiation(copy, id)?;
        Ok(copy)
    }

    /// Like [`Self::deep_copy`], but the copy is created in another
    /// universe
    pub fn foreign_copy(
        &self,
        src_universe: &Universe,
        entity: Entity,
        dst_universe: &mut Universe,
    ) -> Result<Entity> {
        let id = src_universe
            .instantiation(entity)
            .ok_or(Error::NoInstantiation(entity))?;

        let copy = (self.get(id).foreign_copy)(src_universe, entity, dst_universe)?;
        dst_universe.set_instantiation(copy, id)?;
        Ok(copy)
    }

    /// Runs the entity's schema cleanup hook, if it declared one
    pub fn cleanup(&self, universe: &mut Universe, entity: Entity) {
        if let Some(id) = universe.instantiation(entity) {
            if let Some(hook) = &self.get(id).cleanup {
                hook(universe, entity);
            }
        }
    }
}

impl fmt::Debug for InstantiationRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstantiationRegistry")
            .field("items", &self.items)
            .finish()
    }
}
