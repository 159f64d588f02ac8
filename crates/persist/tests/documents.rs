use std::fs;

use nestgrid_common::{Direction, GridItem};
use nestgrid_kernel::{Condition, Grid, Simulatable, World};
use nestgrid_persist::{LoadError, load, load_file, save_file, serialize};

fn assert_round_trip(world: &World) {
    let text = serialize(world).unwrap();
    let loaded = load(&text).unwrap();
    assert_eq!(loaded.census(), world.census());
    assert_eq!(loaded.seed(), world.seed());
    assert_eq!(serialize(&loaded).unwrap(), text);
}

#[test]
fn empty_unit_grid() {
    assert_round_trip(&World::new(1, 1).unwrap());
}

#[test]
fn large_empty_grid() {
    let world = World::new(69, 42).unwrap();
    let loaded = load(&serialize(&world).unwrap()).unwrap();
    assert_eq!(loaded.root_grid().width(), 69);
    assert_eq!(loaded.root_grid().height(), 42);
    assert_round_trip(&world);
}

#[test]
fn unit_grid_with_barrier() {
    let mut world = World::new(1, 1).unwrap();
    let root = world.root();
    world.add(root, Simulatable::barrier(GridItem::new(0, 0))).unwrap();
    assert_round_trip(&world);
}

#[test]
fn unit_grid_with_split_explorer() {
    let mut world = World::new(1, 1).unwrap();
    let root = world.root();
    world
        .add(root, Simulatable::split_explorer(GridItem::new(0, 0), Direction::Right))
        .unwrap();
    let text = serialize(&world).unwrap();
    assert!(text.contains("\"RIGHT\""));
    assert_round_trip(&world);
}

#[test]
fn every_kind_and_nested_markings() {
    let mut world = World::with_seed(8, 6, 1234).unwrap();
    let root = world.root();
    world.set_export(root, 2, Direction::Up, true).unwrap();
    world.set_pad(root, 3, Direction::Left, true).unwrap();
    world
        .add(
            root,
            Simulatable::conditional_barrier(
                GridItem::new(1, 1),
                Condition::NotBlockExists {
                    location: GridItem::new(7, 5),
                },
            ),
        )
        .unwrap();
    world
        .add(root, Simulatable::random_explorer(GridItem::new(2, 2), Direction::Down))
        .unwrap();
    world
        .add(root, Simulatable::weak_explorer(GridItem::new(3, 2), Direction::Left))
        .unwrap();

    let mut child = Grid::new(3, 3).unwrap();
    child.set_export(1, Direction::Left, true);
    child.set_export(1, Direction::Right, true);
    child.set_pad(0, Direction::Up, true);
    child.set_pad(0, Direction::Down, true);
    let sub = world.embed(root, GridItem::new(5, 1), child).unwrap();
    assert!(sub.is_some());
    let child = world.descendants(root)[0];
    world
        .add(child, Simulatable::split_explorer(GridItem::new(1, 1), Direction::Up))
        .unwrap();

    assert_round_trip(&world);
    let loaded = load(&serialize(&world).unwrap()).unwrap();
    assert_eq!(loaded.grid_count(), 2);
    assert_eq!(loaded.runnable_count(), 3);
    assert!(loaded.root_grid().is_export(2, Direction::Up));
    assert!(loaded.root_grid().is_pad(3, Direction::Left));
}

#[test]
fn malformed_text_is_a_format_error() {
    assert!(matches!(load("{ not json"), Err(LoadError::Format(_))));
    assert!(matches!(
        load(r#"{"format_version":1,"grid":{"width":2,"height":2,"entities":[{"kind":"portal"}]}}"#),
        Err(LoadError::Format(_))
    ));
}

#[test]
fn out_of_bounds_entity_is_a_structure_error() {
    let text = r#"{"format_version":1,"grid":{"width":2,"height":2,
        "entities":[{"kind":"barrier","location":{"x":2,"y":0}}]}}"#;
    assert!(matches!(load(text), Err(LoadError::Structure(_))));
}

#[test]
fn non_positive_size_is_a_structure_error() {
    let text = r#"{"format_version":1,"grid":{"width":0,"height":2}}"#;
    assert!(matches!(load(text), Err(LoadError::Structure(_))));
}

#[test]
fn future_format_is_rejected() {
    let text = r#"{"format_version":7,"grid":{"width":1,"height":1}}"#;
    assert!(matches!(
        load(text),
        Err(LoadError::SchemaMismatch {
            found: 7,
            expected: 1
        })
    ));
}

#[test]
fn source_reference_needs_a_file() {
    let text = r#"{"format_version":1,"grid":{"width":4,"height":4,
        "entities":[{"kind":"sub_grid","location":{"x":1,"y":1},"source":"child.json"}]}}"#;
    assert!(matches!(load(text), Err(LoadError::MissingGrid { .. })));
}

#[test]
fn duplicates_in_a_document_collapse() {
    let text = r#"{"format_version":1,"grid":{"width":2,"height":2,"entities":[
        {"kind":"weak_explorer","location":{"x":0,"y":0},"direction":"UP"},
        {"kind":"weak_explorer","location":{"x":0,"y":0},"direction":"UP"}]}}"#;
    let world = load(text).unwrap();
    assert_eq!(world.entity_count(), 1);
}

#[test]
fn duplicate_sub_grid_takes_its_child_along() {
    let text = r#"{"format_version":1,"grid":{"width":4,"height":4,"entities":[
        {"kind":"sub_grid","location":{"x":1,"y":1},
         "grid":{"width":2,"height":2}},
        {"kind":"sub_grid","location":{"x":1,"y":1},
         "grid":{"width":2,"height":2,"entities":[
            {"kind":"weak_explorer","location":{"x":0,"y":0},"direction":"UP"}]}}]}}"#;
    let world = load(text).unwrap();
    assert_eq!(world.grid_count(), 2);
    assert_eq!(world.entity_count(), 1);
    assert_eq!(world.runnable_count(), 0);
}

#[test]
fn marks_outside_the_edge_are_rejected() {
    let child = |marks: &str| {
        format!(
            r#"{{"format_version":1,"grid":{{"width":4,"height":4,"entities":[
                {{"kind":"sub_grid","location":{{"x":0,"y":0}},
                  "grid":{{"width":3,"height":3,{marks}}}}}]}}}}"#
        )
    };
    assert!(matches!(
        load(&child(r#""exports":{"left":[7]}"#)),
        Err(LoadError::MarkOutOfRange {
            index: 7,
            direction: Direction::Left,
            length: 3
        })
    ));
    assert!(matches!(
        load(&child(r#""pads":{"up":[-1]}"#)),
        Err(LoadError::MarkOutOfRange { index: -1, .. })
    ));
    assert!(load(&child(r#""exports":{"left":[2]}"#)).is_ok());
}

#[test]
fn sources_resolve_relative_to_the_referencing_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("parts")).unwrap();
    fs::write(
        dir.path().join("parts/room.json"),
        r#"{"format_version":1,"grid":{"width":3,"height":3,
            "exports":{"left":[1],"right":[1],"up":[1],"down":[1]},
            "entities":[{"kind":"sub_grid","location":{"x":0,"y":0},"source":"closet.json"}]}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("parts/closet.json"),
        r#"{"format_version":1,"grid":{"width":1,"height":1,
            "entities":[{"kind":"barrier","location":{"x":0,"y":0}}]}}"#,
    )
    .unwrap();
    let top = dir.path().join("world.json");
    fs::write(
        &top,
        r#"{"format_version":1,"seed":5,"grid":{"width":6,"height":6,
            "entities":[{"kind":"sub_grid","location":{"x":2,"y":2},"source":"parts/room.json"}]}}"#,
    )
    .unwrap();

    let world = load_file(&top).unwrap();
    assert_eq!(world.grid_count(), 3);
    assert_eq!(world.seed(), 5);
    assert_eq!(world.entity_count(), 3);

    // Saving inlines the children but keeps the references.
    let saved = dir.path().join("saved.json");
    save_file(&world, &saved).unwrap();
    let text = fs::read_to_string(&saved).unwrap();
    assert!(text.contains("parts/room.json"));
    let reloaded = load(&text).unwrap();
    assert_eq!(reloaded.census(), world.census());
}

#[test]
fn source_cycles_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.json");
    fs::write(
        &a,
        r#"{"format_version":1,"grid":{"width":4,"height":4,
            "entities":[{"kind":"sub_grid","location":{"x":0,"y":0},"source":"b.json"}]}}"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("b.json"),
        r#"{"format_version":1,"grid":{"width":4,"height":4,
            "entities":[{"kind":"sub_grid","location":{"x":0,"y":0},"source":"a.json"}]}}"#,
    )
    .unwrap();
    assert!(matches!(load_file(&a), Err(LoadError::SourceCycle(_))));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
    assert!(err.to_string().contains("absent.json"));
}
