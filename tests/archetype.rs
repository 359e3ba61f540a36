use pretty_assertions::assert_eq;
use sorrel::{component_id, ComponentMask, Universe};

#[derive(Default, Clone, Debug, PartialEq)]
struct A(u32);

#[derive(Default, Clone, Debug, PartialEq)]
struct B(u32);

#[derive(Default, Clone, Debug, PartialEq)]
struct C(u32);

#[test]
fn entities_with_equal_masks_share_metadata() {
    let mut universe = Universe::new();

    let e1 = universe.create_with::<(A, B)>().unwrap();
    let e2 = universe.create_with::<(A, B)>().unwrap();
    let e3 = universe.create_with::<(A,)>().unwrap();

    let m1 = universe.archetype_of(e1).unwrap();
    let m2 = universe.archetype_of(e2).unwrap();
    let m3 = universe.archetype_of(e3).unwrap();

    assert_eq!(m1, m2);
    assert_ne!(m1, m3);
    assert_eq!(universe.archetype_meta(m1).entity_count(), 2);
}

#[test]
fn metadata_is_released_and_recreated() {
    let mut universe = Universe::new();

    let e1 = universe.create_with::<(A, B)>().unwrap();
    let e2 = universe.create_with::<(A, B)>().unwrap();

    // empty + {A, B}
    assert_eq!(universe.archetype_count(), 2);

    universe.destroy(e1);
    universe.destroy(e2);
    assert_eq!(universe.archetype_count(), 1);

    let e4 = universe.create_with::<(A, B)>().unwrap();
    let meta = universe.archetype_meta(universe.archetype_of(e4).unwrap());

    let expected: ComponentMask = [component_id::<A>().unwrap(), component_id::<B>().unwrap()]
        .into_iter()
        .collect();
    assert_eq!(*meta.mask(), expected);
    assert_eq!(meta.entity_count(), 1);
}

#[test]
fn declaration_order_does_not_split_archetypes() {
    let mut universe = Universe::new();

    let e1 = universe.create_from((A(1), B(2), C(3))).unwrap();
    let e2 = universe.create_from((C(30), A(10), B(20))).unwrap();

    assert_eq!(
        universe.archetype_of(e1).unwrap(),
        universe.archetype_of(e2).unwrap()
    );

    // Values land on the right components regardless of declared order
    assert_eq!(universe.get::<A>(e2).unwrap(), &A(10));
    assert_eq!(universe.get::<B>(e2).unwrap(), &B(20));
    assert_eq!(universe.get::<C>(e2).unwrap(), &C(30));
}

#[test]
fn archetype_changes_move_entities_between_records() {
    let mut universe = Universe::new();

    let e = universe.create_with::<(A,)>().unwrap();
    let sibling = universe.create_with::<(A,)>().unwrap();
    let only_a = universe.archetype_of(e).unwrap();

    universe.add(e, (B(7),)).unwrap();
    let with_b = universe.archetype_of(e).unwrap();
    assert_ne!(only_a, with_b);
    assert_eq!(universe.archetype_meta(only_a).entity_count(), 1);

    universe.remove::<B>(e).unwrap();
    assert_eq!(universe.archetype_of(e).unwrap(), only_a);
    assert_eq!(universe.archetype_of(sibling).unwrap(), only_a);
    assert_eq!(universe.get::<A>(e).unwrap(), &A(0));
}

#[test]
fn refcounts_track_every_transition() {
    let mut universe = Universe::new();

    let a1 = universe.create_with::<(A,)>().unwrap();
    let a2 = universe.create_with::<(A,)>().unwrap();

    let record = universe.archetype_of(a1).unwrap();
    assert_eq!(universe.archetype_meta(record).entity_count(), 2);

    universe.add(a2, (B(0),)).unwrap();
    assert_eq!(universe.archetype_meta(record).entity_count(), 1);

    universe.destroy(a1);
    // {A} is gone, {A, B} and the empty archetype remain
    assert_eq!(universe.archetype_count(), 2);
}
