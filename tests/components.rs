#![allow(missing_docs)]

use proptest::prelude::*;
use swedf::{
    block::{BlockLayout, DataBlock},
    component::{ComponentDesc, ComponentKind, DataComponent, NodeId, SlotCountChange},
    error::DataError,
    value::{ScalarKind, ScalarValue},
};

fn scalar(kind: ScalarKind, name: &str) -> ComponentDesc {
    ComponentDesc::scalar(kind).named(name)
}

fn packet() -> DataComponent {
    let mut tree = ComponentDesc::record([
        scalar(ScalarKind::Int, "count"),
        ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Double), "count")
            .named("samples"),
    ])
    .named("packet")
    .build()
    .unwrap();
    tree.assign_new_block().unwrap();
    tree
}

fn child(tree: &DataComponent, parent: NodeId, name: &str) -> NodeId {
    tree.child_by_name(parent, name).unwrap()
}

#[test]
fn variable_array_resize_scenario() {
    let mut tree = packet();
    let root = tree.root();
    let count = child(&tree, root, "count");
    let samples = child(&tree, root, "samples");
    assert!(tree.is_variable_length(samples));
    assert_eq!(tree.int_value(count).unwrap(), 0);
    assert_eq!(tree.element_count(samples), 0);

    let _ = tree.resize(samples, 5).unwrap();
    assert_eq!(tree.element_count(samples), 5);
    assert_eq!(tree.data(samples).unwrap().atom_count(), 5);

    let mut starts = vec![];
    for index in 0..5 {
        let element = tree.get_component(samples, index).unwrap();
        tree.set_value(element, index as f64 * 0.5).unwrap();
        starts.push(tree.data(element).unwrap().start_index());
    }
    assert_eq!(starts, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        tree.get_component(samples, 5),
        Err(DataError::IndexOutOfBounds {
            path: "packet/samples".into(),
            index: 5,
            count: 5,
        })
    );
    let values = tree.data(samples).unwrap().values().unwrap();
    assert_eq!(values[4], ScalarValue::Double(2.0));
}

#[test]
fn element_count_before_binding_is_zero() {
    let tree = ComponentDesc::record([
        scalar(ScalarKind::Long, "n"),
        ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Float), "n").named("v"),
    ])
    .build()
    .unwrap();
    let v = child(&tree, tree.root(), "v");
    assert_eq!(tree.element_count(v), 0);
    assert_eq!(tree.component_count(v), 0);
}

#[test]
fn negative_driver_counts_as_empty() {
    let mut tree = packet();
    let root = tree.root();
    tree.set_value(child(&tree, root, "count"), -3).unwrap();
    assert_eq!(tree.element_count(child(&tree, root, "samples")), 0);
}

#[test]
fn missing_size_driver_fails_build() {
    let err = ComponentDesc::record([
        scalar(ScalarKind::Int, "size"),
        ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Int), "count")
            .named("values"),
    ])
    .named("frame")
    .build()
    .unwrap_err();
    assert_eq!(
        err,
        DataError::MissingSizeDriver {
            path: "frame/values".into(),
            name: "count".into(),
        }
    );
}

#[test]
fn size_driver_must_be_an_integer() {
    let err = ComponentDesc::record([
        scalar(ScalarKind::Double, "count"),
        ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Int), "count")
            .named("values"),
    ])
    .named("frame")
    .build()
    .unwrap_err();
    assert!(matches!(err, DataError::MissingSizeDriver { ref name, .. } if name == "count"));
}

#[test]
fn duplicate_sibling_names_fail_build() {
    let err = ComponentDesc::record([scalar(ScalarKind::Int, "a"), scalar(ScalarKind::Long, "a")])
        .build()
        .unwrap_err();
    assert!(matches!(err, DataError::DuplicateName { ref name, .. } if name == "a"));
}

#[test]
fn homogeneous_records_collapse_into_one_buffer() {
    let mut tree = ComponentDesc::fixed_array(
        ComponentDesc::record([scalar(ScalarKind::Double, "lat"), scalar(ScalarKind::Double, "lon")]),
        3,
    )
    .named("track")
    .build()
    .unwrap();
    tree.assign_new_block().unwrap();
    let root = tree.root();
    assert_eq!(tree.data(root).unwrap().layout(), BlockLayout::Primitive);
    assert_eq!(tree.scalar_count(root), 6);

    let point = tree.get_component(root, 2).unwrap();
    let lon = child(&tree, point, "lon");
    tree.set_value(lon, 7.25).unwrap();
    assert_eq!(tree.data(root).unwrap().double_value(5).unwrap(), 7.25);
}

#[test]
fn heterogeneous_record_arrays_are_unsupported() {
    let tree = ComponentDesc::fixed_array(
        ComponentDesc::record([
            scalar(ScalarKind::Int, "count"),
            ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Double), "count")
                .named("samples"),
        ]),
        2,
    )
    .named("packets")
    .build()
    .unwrap();
    assert_eq!(
        tree.create_block(tree.root()).unwrap_err(),
        DataError::UnsupportedLayout {
            path: "packets".into()
        }
    );
}

#[test]
fn arrays_of_choices_are_unsupported() {
    let tree = ComponentDesc::fixed_array(
        ComponentDesc::choice([scalar(ScalarKind::Double, "a"), scalar(ScalarKind::Int, "b")]),
        3,
    )
    .named("readings")
    .build()
    .unwrap();
    let unsupported = DataError::UnsupportedLayout {
        path: "readings".into(),
    };
    assert_eq!(tree.create_block(tree.root()).unwrap_err(), unsupported);
    assert_eq!(tree.copy().assign_new_block().unwrap_err(), unsupported);
}

#[test]
fn arrays_of_nested_mixed_records_are_unsupported() {
    let tree = ComponentDesc::fixed_array(
        ComponentDesc::record([
            scalar(ScalarKind::Double, "a"),
            ComponentDesc::record([scalar(ScalarKind::Int, "b")]).named("inner"),
        ]),
        3,
    )
    .named("frames")
    .build()
    .unwrap();
    assert_eq!(
        tree.create_block(tree.root()).unwrap_err(),
        DataError::UnsupportedLayout {
            path: "frames".into()
        }
    );
}

fn rows() -> DataComponent {
    let mut tree = ComponentDesc::record([
        scalar(ScalarKind::Int, "width"),
        ComponentDesc::fixed_array(
            ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Double), "width"),
            2,
        )
        .named("rows"),
    ])
    .named("image")
    .build()
    .unwrap();
    tree.assign_new_block().unwrap();
    tree
}

fn cell(tree: &mut DataComponent, array: NodeId, row: usize, column: usize) -> NodeId {
    let row = tree.get_component(array, row).unwrap();
    tree.get_component(row, column).unwrap()
}

#[test]
fn sync_size_resizes_arrays_inside_fixed_arrays() {
    let mut tree = rows();
    let root = tree.root();
    let rows = child(&tree, root, "rows");
    let row = tree.element(rows).unwrap();
    tree.set_value(child(&tree, root, "width"), 3).unwrap();

    let report = tree.sync_size(root).unwrap();
    assert!(report.touched(row));
    assert!(report.touched(rows));
    assert_eq!(tree.data(rows).unwrap().atom_count(), 6);
    assert_eq!(tree.scalar_count(root), 7);

    let last = cell(&mut tree, rows, 1, 2);
    tree.set_value(last, 8.0).unwrap();
    assert_eq!(tree.data(rows).unwrap().double_value(5).unwrap(), 8.0);
    assert!(tree.sync_size(root).unwrap().is_empty());
}

#[test]
fn nested_resize_keeps_each_row() {
    let mut tree = rows();
    let rows = child(&tree, tree.root(), "rows");
    let row = tree.element(rows).unwrap();
    let _ = tree.resize(row, 2).unwrap();
    for (index, value) in [1.0, 2.0, 3.0, 4.0].into_iter().enumerate() {
        let slot = cell(&mut tree, rows, index / 2, index % 2);
        tree.set_value(slot, value).unwrap();
    }

    let _ = tree.resize(row, 3).unwrap();
    assert_eq!(
        tree.data(rows).unwrap().values().unwrap(),
        [1.0, 2.0, 0.0, 3.0, 4.0, 0.0].map(ScalarValue::Double).to_vec()
    );
    let first = cell(&mut tree, rows, 1, 0);
    assert_eq!(tree.double_value(first).unwrap(), 3.0);

    let _ = tree.resize(row, 1).unwrap();
    assert_eq!(
        tree.data(rows).unwrap().values().unwrap(),
        vec![ScalarValue::Double(1.0), ScalarValue::Double(3.0)]
    );
}

#[test]
fn sync_size_resizes_variable_arrays_of_variable_arrays() {
    let mut tree = ComponentDesc::record([
        scalar(ScalarKind::Int, "n"),
        scalar(ScalarKind::Long, "m"),
        ComponentDesc::variable_array(
            ComponentDesc::variable_array(ComponentDesc::scalar(ScalarKind::Double), "m"),
            "n",
        )
        .named("grid"),
    ])
    .build()
    .unwrap();
    tree.assign_new_block().unwrap();
    let root = tree.root();
    let grid = child(&tree, root, "grid");
    let line = tree.element(grid).unwrap();
    tree.set_value(child(&tree, root, "n"), 2).unwrap();
    tree.set_value(child(&tree, root, "m"), 3).unwrap();

    let report = tree.sync_size(root).unwrap();
    assert!(report.touched(line));
    assert!(report.touched(grid));
    assert_eq!(tree.element_count(grid), 2);
    assert_eq!(tree.scalar_count(grid), 6);
    assert_eq!(tree.data(grid).unwrap().atom_count(), 6);
    assert_eq!(tree.scalar_count(root), 8);

    let slot = cell(&mut tree, grid, 1, 2);
    tree.set_value(slot, 5.0).unwrap();
    let _ = tree.resize(line, 4).unwrap();
    assert_eq!(tree.long_value(child(&tree, root, "m")).unwrap(), 4);
    let slot = cell(&mut tree, grid, 1, 2);
    assert_eq!(tree.double_value(slot).unwrap(), 5.0);
    let slot = cell(&mut tree, grid, 1, 3);
    assert_eq!(tree.double_value(slot).unwrap(), 0.0);
}

#[test]
fn choice_switches_item_storage() {
    let mut tree = ComponentDesc::choice([
        scalar(ScalarKind::Int, "code"),
        ComponentDesc::record([scalar(ScalarKind::Double, "x"), scalar(ScalarKind::Double, "y")])
            .named("point"),
    ])
    .named("reading")
    .build()
    .unwrap();
    tree.assign_new_block().unwrap();
    let root = tree.root();
    assert_eq!(tree.kind(root), ComponentKind::Choice);
    assert_eq!(tree.selected(root), Some(0));
    assert_eq!(tree.scalar_count(root), 2);

    let report = tree.select(root, 1).unwrap();
    assert_eq!(
        report.changes(),
        [SlotCountChange {
            node: root,
            old: 2,
            new: 3,
        }]
    );
    assert_eq!(tree.selected(root), Some(1));
    assert_eq!(tree.scalar_count(root), 3);
    assert_eq!(tree.data(root).unwrap().atom_count(), 3);
    let point = tree.get_component(root, 1).unwrap();
    tree.set_value(child(&tree, point, "y"), 4.5).unwrap();
    assert_eq!(
        tree.data(root).unwrap().values().unwrap(),
        vec![ScalarValue::Int(1), ScalarValue::Double(0.0), ScalarValue::Double(4.5)]
    );
    assert!(tree.select(root, 2).is_err());
}

#[test]
fn copied_subtree_finds_driver_after_graft() {
    let source = packet();
    let samples = child(&source, source.root(), "samples");
    let copy = source.copy_subtree(samples);
    assert_eq!(copy.data(copy.root()).map(DataBlock::atom_count), None);

    let mut target = ComponentDesc::record([scalar(ScalarKind::Long, "count")])
        .named("other")
        .build()
        .unwrap();
    let root = target.root();
    let grafted = target.add_component(root, copy).unwrap();
    assert_eq!(target.path(grafted), "other/samples");
    assert_eq!(target.size_driver(grafted), Some(child(&target, root, "count")));
    assert_eq!(target.component_count(root), 2);

    target.assign_new_block().unwrap();
    let _ = target.resize(grafted, 2).unwrap();
    assert_eq!(target.long_value(child(&target, root, "count")).unwrap(), 2);
    assert_eq!(target.scalar_count(root), 3);

    let again = source.copy_subtree(samples);
    assert!(matches!(
        target.add_component(root, again),
        Err(DataError::DuplicateName { .. })
    ));
}

#[test]
fn copy_keeps_structure_without_data() {
    let tree = packet();
    let copy = tree.copy();
    assert_eq!(copy.to_string(), tree.to_string());
    assert_eq!(copy.node_count(), tree.node_count());
    assert!(copy.data(copy.root()).is_none());
}

#[test]
fn display_dumps_the_tree() {
    let tree = packet();
    assert_eq!(
        tree.to_string(),
        "Record: packet\n  Scalar<int>: count\n  Array[?=0]: samples\n    Scalar<double>\n"
    );
}

fn kinds_record() -> DataComponent {
    let mut tree = ComponentDesc::record([
        scalar(ScalarKind::Boolean, "flag"),
        scalar(ScalarKind::Int, "int"),
        scalar(ScalarKind::Long, "long"),
        scalar(ScalarKind::Float, "float"),
        scalar(ScalarKind::Double, "double"),
        scalar(ScalarKind::String, "text"),
    ])
    .build()
    .unwrap();
    tree.assign_new_block().unwrap();
    tree
}

proptest! {
    #[test]
    fn fixed_element_count_ignores_traversal(size in 1..20usize, indexes in prop::collection::vec(0..40usize, 0..10)) {
        let mut tree = ComponentDesc::record([
            scalar(ScalarKind::Int, "count"),
            ComponentDesc::fixed_array(ComponentDesc::scalar(ScalarKind::Float), size).named("fixed"),
        ])
        .build()
        .unwrap();
        tree.assign_new_block().unwrap();
        let root = tree.root();
        let fixed = child(&tree, root, "fixed");
        tree.set_value(child(&tree, root, "count"), 99).unwrap();
        for index in indexes {
            let result = tree.get_component(fixed, index);
            prop_assert_eq!(result.is_ok(), index < size);
            prop_assert_eq!(tree.element_count(fixed), size);
        }
    }

    #[test]
    fn parallel_element_fields_alias_field_buffers(rows in 1..16usize, pick in 0..16usize, value in any::<i32>()) {
        let index = pick % rows;
        let mut tree = ComponentDesc::fixed_array(
            ComponentDesc::record([scalar(ScalarKind::Double, "t"), scalar(ScalarKind::Int, "q")]),
            rows,
        )
        .build()
        .unwrap();
        tree.assign_new_block().unwrap();
        let root = tree.root();
        let Some(DataBlock::Parallel(block)) = tree.data(root).cloned() else {
            panic!("array of mixed scalars is parallel");
        };
        let element = tree.get_component(root, index).unwrap();
        let q = child(&tree, element, "q");
        tree.set_value(q, value).unwrap();
        let field = DataBlock::Primitive(block.field(1).unwrap());
        prop_assert_eq!(field.int_value(index).unwrap(), value);
        prop_assert_eq!(tree.data(q).unwrap().start_index(), index);
    }

    #[test]
    fn scalar_values_round_trip(
        flag in any::<bool>(),
        int in any::<i32>(),
        long in any::<i64>(),
        float in any::<f32>(),
        double in any::<f64>(),
        text in ".*",
    ) {
        let tree = kinds_record();
        let root = tree.root();
        tree.set_value(child(&tree, root, "flag"), flag).unwrap();
        tree.set_value(child(&tree, root, "int"), int).unwrap();
        tree.set_value(child(&tree, root, "long"), long).unwrap();
        tree.set_value(child(&tree, root, "float"), float).unwrap();
        tree.set_value(child(&tree, root, "double"), double).unwrap();
        tree.set_value(child(&tree, root, "text"), text.as_str()).unwrap();

        prop_assert_eq!(tree.bool_value(child(&tree, root, "flag")).unwrap(), flag);
        prop_assert_eq!(tree.int_value(child(&tree, root, "int")).unwrap(), int);
        prop_assert_eq!(tree.long_value(child(&tree, root, "long")).unwrap(), long);
        prop_assert_eq!(tree.float_value(child(&tree, root, "float")).unwrap().to_bits(), float.to_bits());
        prop_assert_eq!(tree.double_value(child(&tree, root, "double")).unwrap().to_bits(), double.to_bits());
        prop_assert_eq!(tree.string_value(child(&tree, root, "text")).unwrap(), text);
    }

    #[test]
    fn resize_capacity_matches_element_slots(first in 0..12usize, second in 0..12usize) {
        let mut tree = ComponentDesc::record([
            scalar(ScalarKind::Long, "n"),
            ComponentDesc::variable_array(
                ComponentDesc::record([scalar(ScalarKind::Float, "a"), scalar(ScalarKind::Float, "b")]),
                "n",
            )
            .named("pairs"),
        ])
        .build()
        .unwrap();
        tree.assign_new_block().unwrap();
        let pairs = child(&tree, tree.root(), "pairs");
        for count in [first, second] {
            let report = tree.resize(pairs, count).unwrap();
            prop_assert!(report.touched(pairs));
            prop_assert_eq!(tree.element_count(pairs), count);
            prop_assert_eq!(tree.data(pairs).unwrap().atom_count(), count * 2);
            prop_assert_eq!(tree.scalar_count(tree.root()), 1 + count * 2);
        }
    }
}
