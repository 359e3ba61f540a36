//! Row-major world serialization.
//!
//! The universe does not impose an on-disk format; it exposes a context
//! in which component types are registered under stable string keys.
//! Serializing writes a map of derived entity ids to rows carrying the
//! entity's instantiation identifier (when one is attached) and its
//! component payloads. Deserializing replays the rows into a universe
//! and returns the mapping from the stored ids to the new handles so
//! callers can fix up entity references.

use std::collections::HashMap;
use std::fmt;

use serde::de::{DeserializeOwned, DeserializeSeed, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserializer, Serialize, Serializer};

use crate::component::Component;
use crate::entity::{Entity, EntityId};
use crate::error::Error;
use crate::instantiation::InstantiationRegistry;
use crate::universe::Universe;

type SerializeFn = for<'x> fn(&'x Universe, Entity) -> Option<&'x dyn erased_serde::Serialize>;
type DeserializeFn = fn(
    &mut dyn erased_serde::Deserializer<'_>,
    &mut Universe,
    Entity,
) -> Result<(), erased_serde::Error>;

#[derive(Clone)]
struct Slot {
    key: String,
    ser: SerializeFn,
    de: DeserializeFn,
}

fn serialize_component<C: Component + Serialize>(
    universe: &Universe,
    entity: Entity,
) -> Option<&dyn erased_serde::Serialize> {
    universe
        .get::<C>(entity)
        .ok()
        .map(|value| value as &dyn erased_serde::Serialize)
}

fn deserialize_component<C: Component + DeserializeOwned>(
    deserializer: &mut dyn erased_serde::Deserializer<'_>,
    universe: &mut Universe,
    entity: Entity,
) -> Result<(), erased_serde::Error> {
    let value: C = erased_serde::deserialize(deserializer)?;
    universe
        .add(entity, (value,))
        .map_err(serde::de::Error::custom)
}

/// Builds a [`SerializationContext`] by registering component types
/// under stable string keys.
#[derive(Default)]
pub struct SerializationContextBuilder {
    slots: Vec<Slot>,
}

impl SerializationContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `C` under `key` for both directions
    pub fn with<C>(&mut self, key: impl Into<String>) -> &mut Self
    where
        C: Component + Serialize + DeserializeOwned,
    {
        self.slots.push(Slot {
            key: key.into(),
            ser: serialize_component::<C>,
            de: deserialize_component::<C>,
        });
        self
    }

    pub fn build(&mut self) -> SerializationContext {
        let slots = std::mem::take(&mut self.slots);
        let by_key = slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (slot.key.clone(), i))
            .collect();

        SerializationContext { slots, by_key }
    }
}

/// Knows how to write and read the registered component types
pub struct SerializationContext {
    slots: Vec<Slot>,
    by_key: HashMap<String, usize>,
}

impl SerializationContext {
    pub fn builder() -> SerializationContextBuilder {
        SerializationContextBuilder::new()
    }

    /// Returns a serializable view of the universe.
    ///
    /// Pass the instantiation registry to record each entity's kind
    /// identifier alongside its components.
    pub fn serialize_world<'a>(
        &'a self,
        universe: &'a Universe,
        registry: Option<&'a InstantiationRegistry>,
    ) -> WorldSerializer<'a> {
        WorldSerializer {
            context: self,
            universe,
            registry,
        }
    }

    /// Replays serialized rows into the universe.
    ///
    /// Entities are recreated by attaching their instantiation kind
    /// (resolved through `registry` by identifier) and adding each
    /// component payload. Returns the mapping from stored ids to the
    /// newly created entities.
    pub fn deserialize_world<'de, D>(
        &self,
        universe: &mut Universe,
        registry: Option<&InstantiationRegistry>,
        deserializer: D,
    ) -> Result<HashMap<EntityId, Entity>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(WorldVisitor {
            context: self,
            universe,
            registry,
        })
    }
}

impl fmt::Debug for SerializationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializationContext")
            .field("keys", &self.slots.iter().map(|v| &v.key).collect::<Vec<_>>())
            .finish()
    }
}

// --- serialization --------------------------------------------------------

/// Serializable view of a universe, produced by
/// [`SerializationContext::serialize_world`]
pub struct WorldSerializer<'a> {
    context: &'a SerializationContext,
    universe: &'a Universe,
    registry: Option<&'a InstantiationRegistry>,
}

impl Serialize for WorldSerializer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.universe.entity_count()))?;

        for entity in self.universe.entities() {
            map.serialize_entry(
                &entity.id(),
                &RowSerializer {
                    context: self.context,
                    universe: self.universe,
                    registry: self.registry,
                    entity,
                },
            )?;
        }

        map.end()
    }
}

struct RowSerializer<'a> {
    context: &'a SerializationContext,
    universe: &'a Universe,
    registry: Option<&'a InstantiationRegistry>,
    entity: Entity,
}

impl Serialize for RowSerializer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kind = self
            .registry
            .zip(self.universe.instantiation(self.entity))
            .map(|(registry, id)| registry.get(id).identifier());

        let mut map = serializer.serialize_map(Some(1 + kind.is_some() as usize))?;
        if let Some(kind) = kind {
            map.serialize_entry("kind", kind)?;
        }

        map.serialize_entry(
            "components",
            &ComponentsSerializer {
                context: self.context,
                universe: self.universe,
                entity: self.entity,
            },
        )?;
        map.end()
    }
}

struct ComponentsSerializer<'a> {
    context: &'a SerializationContext,
    universe: &'a Universe,
    entity: Entity,
}

impl Serialize for ComponentsSerializer<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;

        for slot in &self.context.slots {
            if let Some(value) = (slot.ser)(self.universe, self.entity) {
                map.serialize_entry(&slot.key, value)?;
            }
        }

        map.end()
    }
}

// --- deserialization ------------------------------------------------------

#[derive(serde::Deserialize)]
#[serde(field_identifier, rename_all = "lowercase")]
enum RowField {
    Kind,
    Components,
}

struct WorldVisitor<'a> {
    context: &'a SerializationContext,
    universe: &'a mut Universe,
    registry: Option<&'a InstantiationRegistry>,
}

impl<'de> Visitor<'de> for WorldVisitor<'_> {
    type Value = HashMap<EntityId, Entity>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map of entity ids to entity rows")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut entities = HashMap::new();

        while let Some(id) = access.next_key::<EntityId>()? {
            let entity = access.next_value_seed(RowSeed {
                context: self.context,
                universe: &mut *self.universe,
                registry: self.registry,
            })?;
            entities.insert(id, entity);
        }

        tracing::debug!(count = entities.len(), "deserialized entities");
        Ok(entities)
    }
}

struct RowSeed<'a> {
    context: &'a SerializationContext,
    universe: &'a mut Universe,
    registry: Option<&'a InstantiationRegistry>,
}

impl<'de> DeserializeSeed<'de> for RowSeed<'_> {
    type Value = Entity;

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<Entity, D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for RowSeed<'_> {
    type Value = Entity;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an entity row")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Entity, A::Error> {
        use serde::de::Error as _;

        let entity = self.universe.create();

        while let Some(field) = access.next_key::<RowField>()? {
            match field {
                RowField::Kind => {
                    let identifier: String = access.next_value()?;
                    let registry = self.registry.ok_or_else(|| {
                        A::Error::custom(Error::UnknownInstantiation(identifier.clone()))
                    })?;
                    let id = registry.by_identifier(&identifier).ok_or_else(|| {
                        A::Error::custom(Error::UnknownInstantiation(identifier.clone()))
                    })?;

                    self.universe
                        .set_instantiation(entity, id)
                        .map_err(A::Error::custom)?;
                }
                RowField::Components => {
                    access.next_value_seed(ComponentsSeed {
                        context: self.context,
                        universe: &mut *self.universe,
                        entity,
                    })?;
                }
            }
        }

        Ok(entity)
    }
}

struct ComponentsSeed<'a> {
    context: &'a SerializationContext,
    universe: &'a mut Universe,
    entity: Entity,
}

impl<'de> DeserializeSeed<'de> for ComponentsSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        deserializer.deserialize_map(self)
    }
}

impl<'de> Visitor<'de> for ComponentsSeed<'_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a map of component keys to payloads")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<(), A::Error> {
        use serde::de::Error as _;

        while let Some(key) = access.next_key::<String>()? {
            let &slot = self
                .context
                .by_key
                .get(&key)
                .ok_or_else(|| A::Error::custom(format!("unknown component key {key:?}")))?;

            access.next_value_seed(ComponentSeed {
                slot: &self.context.slots[slot],
                universe: &mut *self.universe,
                entity: self.entity,
            })?;
        }

        Ok(())
    }
}

struct ComponentSeed<'a> {
    slot: &'a Slot,
    universe: &'a mut Universe,
    entity: Entity,
}

impl<'de> DeserializeSeed<'de> for ComponentSeed<'_> {
    type Value = ();

    fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<(), D::Error> {
        let mut erased = <dyn erased_serde::Deserializer>::erase(deserializer);
        (self.slot.de)(&mut erased, self.universe, self.entity)
            .map_err(serde::de::Error::custom)
    }
}
