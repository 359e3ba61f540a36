#![cfg(feature = "serde")]

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};
use sorrel::serialize::SerializationContext;
use sorrel::{Instantiation, InstantiationRegistry, Universe};

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Transform {
    x: f32,
    y: f32,
}

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Sprite(String);

#[derive(Default, Clone, Debug, PartialEq, Serialize, Deserialize)]
struct Water {
    depth: u32,
}

fn context() -> SerializationContext {
    SerializationContext::builder()
        .with::<Transform>("transform")
        .with::<Sprite>("sprite")
        .with::<Water>("water")
        .build()
}

fn registry() -> InstantiationRegistry {
    let mut registry = InstantiationRegistry::new();
    registry
        .register(Instantiation::new::<(Transform, Sprite), (Water,)>("prop").unwrap())
        .unwrap();
    registry
}

#[test]
fn world_roundtrip() {
    let context = context();
    let registry = registry();
    let kind = registry.by_identifier("prop").unwrap();

    let mut source = Universe::new();
    let pond = source
        .create_from((
            Transform { x: 1.0, y: 2.0 },
            Sprite("pond".into()),
            Water { depth: 4 },
        ))
        .unwrap();
    source.set_instantiation(pond, kind).unwrap();

    let rock = source
        .create_from((Transform { x: -3.0, y: 0.0 }, Sprite("rock".into())))
        .unwrap();

    let json =
        serde_json::to_value(context.serialize_world(&source, Some(&registry))).unwrap();

    let mut target = Universe::new();
    let ids = context
        .deserialize_world(&mut target, Some(&registry), &json)
        .unwrap();

    assert_eq!(target.entity_count(), 2);

    let new_pond = ids[&pond.id()];
    let new_rock = ids[&rock.id()];

    assert_eq!(
        target.get::<Transform>(new_pond).unwrap(),
        &Transform { x: 1.0, y: 2.0 }
    );
    assert_eq!(
        target.get::<Sprite>(new_pond).unwrap(),
        &Sprite("pond".into())
    );
    assert_eq!(target.get::<Water>(new_pond).unwrap(), &Water { depth: 4 });
    assert_eq!(target.instantiation(new_pond), Some(kind));

    assert_eq!(
        target.get::<Sprite>(new_rock).unwrap(),
        &Sprite("rock".into())
    );
    assert!(!target.has::<Water>(new_rock));
    assert_eq!(target.instantiation(new_rock), None);
}

#[test]
fn payload_shape_is_keyed_by_registered_names() {
    let context = context();

    let mut universe = Universe::new();
    let e = universe
        .create_from((Transform { x: 7.0, y: 8.0 }, Water { depth: 1 }))
        .unwrap();

    let json = serde_json::to_value(context.serialize_world(&universe, None)).unwrap();
    let row = &json[e.id().to_string()];

    assert_eq!(row["components"]["transform"], serde_json::json!({"x": 7.0, "y": 8.0}));
    assert_eq!(row["components"]["water"], serde_json::json!({"depth": 1}));
    assert_eq!(row["components"].get("sprite"), None);
    assert_eq!(row.get("kind"), None);
}

#[test]
fn unknown_component_key_is_a_parse_error() {
    let context = context();
    let mut universe = Universe::new();

    let json = serde_json::json!({
        "42": { "components": { "mystery": { "depth": 1 } } }
    });

    let result = context.deserialize_world(&mut universe, None, &json);
    let message = result.unwrap_err().to_string();
    assert!(message.contains("mystery"), "unexpected error: {message}");
}

#[test]
fn unknown_instantiation_kind_is_a_parse_error() {
    let context = context();
    let mut universe = Universe::new();

    let json = serde_json::json!({
        "42": { "kind": "dragon", "components": {} }
    });

    let result = context.deserialize_world(&mut universe, Some(&registry()), &json);
    let message = result.unwrap_err().to_string();
    assert!(message.contains("dragon"), "unexpected error: {message}");
}

#[test]
fn serialization_skips_unregistered_components() {
    #[derive(Default, Clone, Debug, PartialEq)]
    struct Ephemeral(u8);

    let context = context();
    let mut universe = Universe::new();
    let e = universe
        .create_from((Transform::default(), Ephemeral(9)))
        .unwrap();

    let json = serde_json::to_value(context.serialize_world(&universe, None)).unwrap();
    let row = &json[e.id().to_string()];

    assert_eq!(
        row["components"]
            .as_object()
            .unwrap()
            .keys()
            .collect::<Vec<_>>(),
        vec!["transform"]
    );
}
