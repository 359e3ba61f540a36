use std::cell::RefCell;
use std::rc::Rc;

use sorrel::{component_id, Error, Instantiation, InstantiationRegistry, Universe};

#[derive(Default, Clone, Debug, PartialEq)]
struct Transform {
    x: f32,
    y: f32,
}

#[derive(Default, Clone, Debug, PartialEq)]
struct Sprite(String);

#[derive(Default, Clone, Debug, PartialEq)]
struct Emitter(u32);

fn tree_schema() -> Instantiation {
    Instantiation::new::<(Transform, Sprite), (Emitter,)>("tree").unwrap()
}

#[test]
fn identifiers_are_unique() {
    let mut registry = InstantiationRegistry::new();

    registry.register(tree_schema()).unwrap();
    assert_eq!(
        registry.register(tree_schema()).err(),
        Some(Error::DuplicateInstantiation("tree".into()))
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn schema_masks() {
    let schema = tree_schema();

    let transform = component_id::<Transform>().unwrap();
    let sprite = component_id::<Sprite>().unwrap();
    let emitter = component_id::<Emitter>().unwrap();

    assert!(schema.is_required(transform));
    assert!(schema.is_required(sprite));
    assert!(!schema.is_required(emitter));

    assert!(schema.has_optional(emitter));
    assert!(!schema.has_optional(transform));
    assert_eq!(schema.identifier(), "tree");
}

#[test]
fn deep_copy_follows_the_schema() {
    let mut registry = InstantiationRegistry::new();
    let kind = registry.register(tree_schema()).unwrap();

    let mut universe = Universe::new();
    let original = universe
        .create_from((Transform { x: 3.0, y: 4.0 }, Sprite("oak".into())))
        .unwrap();
    universe.set_instantiation(original, kind).unwrap();

    let copy = registry.deep_copy(&mut universe, original).unwrap();

    assert_eq!(
        universe.get::<Transform>(copy).unwrap(),
        &Transform { x: 3.0, y: 4.0 }
    );
    assert_eq!(universe.get::<Sprite>(copy).unwrap(), &Sprite("oak".into()));
    // The optional component was absent and stays absent
    assert!(!universe.has::<Emitter>(copy));
    assert_eq!(universe.instantiation(copy), Some(kind));
}

#[test]
fn deep_copy_carries_present_optionals() {
    let mut registry = InstantiationRegistry::new();
    let kind = registry.register(tree_schema()).unwrap();

    let mut universe = Universe::new();
    let original = universe
        .create_from((Transform::default(), Sprite("fir".into()), Emitter(12)))
        .unwrap();
    universe.set_instantiation(original, kind).unwrap();

    let copy = registry.deep_copy(&mut universe, original).unwrap();
    assert_eq!(universe.get::<Emitter>(copy).unwrap(), &Emitter(12));
}

#[test]
fn deep_copy_without_a_kind_fails() {
    let registry = InstantiationRegistry::new();
    let mut universe = Universe::new();

    let plain = universe.create();
    assert_eq!(
        registry.deep_copy(&mut universe, plain).err(),
        Some(Error::NoInstantiation(plain))
    );
}

#[test]
fn foreign_copy_moves_values_across_universes() {
    let mut registry = InstantiationRegistry::new();
    let kind = registry.register(tree_schema()).unwrap();

    let mut source = Universe::new();
    let mut target = Universe::new();

    let original = source
        .create_from((Transform { x: 8.0, y: 0.5 }, Sprite("elm".into()), Emitter(3)))
        .unwrap();
    source.set_instantiation(original, kind).unwrap();

    let copy = registry
        .foreign_copy(&source, original, &mut target)
        .unwrap();

    assert!(target.is_valid(copy));
    assert_eq!(
        target.get::<Transform>(copy).unwrap(),
        &Transform { x: 8.0, y: 0.5 }
    );
    assert_eq!(target.get::<Emitter>(copy).unwrap(), &Emitter(3));
    assert_eq!(target.instantiation(copy), Some(kind));

    // The source entity is untouched
    assert!(source.is_valid(original));
    assert_eq!(source.entity_count(), 1);
    assert_eq!(target.entity_count(), 1);
}

#[test]
fn cleanup_hook_runs_through_the_registry() {
    let cleaned = Rc::new(RefCell::new(Vec::new()));

    let mut registry = InstantiationRegistry::new();
    let log = cleaned.clone();
    let kind = registry
        .register(
            Instantiation::new::<(Transform,), ()>("ghost")
                .unwrap()
                .with_cleanup(move |_, e| log.borrow_mut().push(e)),
        )
        .unwrap();

    let mut universe = Universe::new();
    let e = universe.create_with::<(Transform,)>().unwrap();
    universe.set_instantiation(e, kind).unwrap();

    registry.cleanup(&mut universe, e);
    universe.destroy(e);

    assert_eq!(*cleaned.borrow(), vec![e]);

    // Entities without a kind pass through silently
    let plain = universe.create();
    registry.cleanup(&mut universe, plain);
    assert_eq!(cleaned.borrow().len(), 1);
}
