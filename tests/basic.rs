use sorrel::{Error, Universe};

#[derive(Default, Clone, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Default, Clone, Debug, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

#[test]
fn creation() {
    let mut universe = Universe::new();

    let a = universe.create();
    assert!(universe.is_valid(a));
    assert_eq!(universe.entity_count(), 1);

    universe.destroy(a);
    assert!(!universe.is_valid(a));
    assert_eq!(universe.entity_count(), 0);
}

#[test]
fn lifecycle() {
    let mut universe = Universe::new();

    let e = universe.create_with::<(Position,)>().unwrap();
    assert!(universe.is_valid(e));
    assert!(universe.has::<Position>(e));

    universe.get_mut::<Position>(e).unwrap().x = 5.0;
    assert_eq!(universe.get::<Position>(e).unwrap().x, 5.0);

    universe.destroy(e);
    assert!(!universe.is_valid(e));
    assert_eq!(universe.entity_count(), 0);
    assert_eq!(universe.component_count::<Position>(), 0);
}

#[test]
fn component_counts() {
    let mut universe = Universe::new();

    let a = universe
        .create_from((Position::default(), Velocity::default()))
        .unwrap();
    universe.create_from((Position::default(),)).unwrap();

    assert_eq!(universe.entity_count(), 2);
    assert_eq!(universe.component_count::<Position>(), 2);
    assert_eq!(universe.component_count::<Velocity>(), 1);

    universe.destroy(a);
    assert_eq!(universe.component_count::<Position>(), 1);
    assert_eq!(universe.component_count::<Velocity>(), 0);
}

#[test]
fn missing_component_is_an_error() {
    let mut universe = Universe::new();
    let e = universe.create();

    assert!(matches!(
        universe.get::<Position>(e),
        Err(Error::ComponentMissing(..))
    ));
    assert!(matches!(
        universe.get_mut::<Position>(e),
        Err(Error::ComponentMissing(..))
    ));
    assert!(!universe.has::<Position>(e));
}

#[test]
fn stale_handle_is_an_error() {
    let mut universe = Universe::new();
    let e = universe.create_with::<(Position,)>().unwrap();
    universe.destroy(e);

    assert_eq!(universe.get::<Position>(e).err(), Some(Error::NoSuchEntity(e)));
    assert!(!universe.has::<Position>(e));
}

#[test]
fn foreign_handle_is_rejected() {
    let mut a = Universe::new();
    let mut b = Universe::new();

    let e = a.create_with::<(Position,)>().unwrap();
    let _ = b.create_with::<(Position,)>().unwrap();

    assert!(!b.is_valid(e));
    assert_eq!(b.get::<Position>(e).err(), Some(Error::NoSuchEntity(e)));
    b.destroy(e);
    assert!(a.is_valid(e));
}

#[test]
fn entity_ids_are_unique() {
    let mut universe = Universe::new();

    let mut ids: Vec<_> = (0..64).map(|_| universe.create().id()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 64);
}

#[test]
fn entities_iterates_live_entities() {
    let mut universe = Universe::new();

    let a = universe.create();
    let b = universe.create();
    let c = universe.create();
    universe.destroy(b);

    let live: Vec<_> = universe.entities().collect();
    assert_eq!(live, vec![a, c]);
    assert!(live.iter().all(|&e| universe.is_valid(e)));
}
