//! Integration tests for the mutation engine.
//!
//! These exercise whole `mutate`/`cross_over` calls against small schemas
//! and check the structural guarantees: schema validity, oneof exclusivity,
//! repeated-field bounds, required-field repair, and determinism. Outcome
//! classification never depends on which candidate a particular seed picks;
//! tests sweep seeds and assert over the population.

#![allow(clippy::cast_possible_truncation)]

use std::collections::HashMap;
use std::sync::Arc;

use proptest::prelude::*;

use crate::field::{FieldRef, NodePath};
use crate::sampler::DataSourceSampler;
use crate::{
    Cardinality, FieldKind, MessageTypeId, Mutator, MutatorConfig, Schema, SchemaBuilder,
    TreeNode, Value,
};

// ============================================================================
// Helper Schemas
// ============================================================================

/// Root { 1: x i32 }
fn single_i32_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let root = builder.add_message("Root");
    builder.message(root).singular(1, "x", FieldKind::I32);
    (builder.finish().unwrap(), root)
}

/// Root { 1: a i32, 2: b u32 }
fn scalar_pair_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let root = builder.add_message("Root");
    builder
        .message(root)
        .singular(1, "a", FieldKind::I32)
        .singular(2, "b", FieldKind::U32);
    (builder.finish().unwrap(), root)
}

/// Root { oneof choice { 1: a i32, 2: b str } }
fn oneof_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let root = builder.add_message("Root");
    builder.message(root).oneof(
        "choice",
        &[(1, "a", FieldKind::I32), (2, "b", FieldKind::Str)],
    );
    (builder.finish().unwrap(), root)
}

/// Root { 1: xs repeated i32 }
fn repeated_i32_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let root = builder.add_message("Root");
    builder.message(root).repeated(1, "xs", FieldKind::I32);
    (builder.finish().unwrap(), root)
}

/// Leaf { 1: id u32 required }, Root { 1: version i32 required,
/// 2: leaf Leaf, 3: leaves repeated Leaf }
fn required_schema() -> (Arc<Schema>, MessageTypeId, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let leaf = builder.add_message("Leaf");
    let root = builder.add_message("Root");
    builder.message(leaf).required(1, "id", FieldKind::U32);
    builder
        .message(root)
        .required(1, "version", FieldKind::I32)
        .singular(2, "leaf", FieldKind::Message(leaf))
        .repeated(3, "leaves", FieldKind::Message(leaf));
    (builder.finish().unwrap(), root, leaf)
}

/// A schema covering every field shape: scalars, strings, enums, repeated
/// fields, nested and repeated messages, and a oneof.
fn rich_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let leaf = builder.add_message("Leaf");
    let root = builder.add_message("Root");
    let mode = builder.add_enum("Mode", &["OFF", "SLOW", "FAST"]);
    builder
        .message(leaf)
        .singular(1, "id", FieldKind::U32)
        .singular(2, "tag", FieldKind::Str);
    builder
        .message(root)
        .singular(1, "flag", FieldKind::Bool)
        .singular(2, "weight", FieldKind::F64)
        .repeated(3, "xs", FieldKind::I32)
        .repeated(4, "names", FieldKind::Str)
        .singular(5, "mode", FieldKind::Enum(mode))
        .singular(6, "leaf", FieldKind::Message(leaf))
        .repeated(7, "leaves", FieldKind::Message(leaf))
        .oneof(
            "transport",
            &[(8, "port", FieldKind::U32), (9, "path", FieldKind::Str)],
        );
    (builder.finish().unwrap(), root)
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Builds a randomized tree by repeated mutation of an empty node.
fn grow_tree(schema: &Arc<Schema>, root: MessageTypeId, seed: u32, rounds: usize) -> TreeNode {
    let mut tree = TreeNode::new(Arc::clone(schema), root);
    let mut mutator = Mutator::new(seed);
    for _ in 0..rounds {
        mutator.mutate(&mut tree, 256);
    }
    tree
}

/// Walks a tree and asserts every structural guarantee the schema makes:
/// slots hold values of their declared kind, enum values stay in domain,
/// repeated indices are dense, at most one member per oneof group is active,
/// and message children are of the declared type.
fn assert_schema_valid(node: &TreeNode) {
    let schema = node.schema();
    let descriptor = node.descriptor();
    let mut active_per_group: HashMap<usize, usize> = HashMap::new();

    for field in descriptor.fields() {
        let id = field.id();
        match field.cardinality() {
            Cardinality::Singular => {
                if node.has(id) {
                    let value = node.get(id).expect("present slot");
                    assert_value_conforms(schema, field.kind(), value);
                    if let Some(group) = field.oneof() {
                        *active_per_group.entry(group.index()).or_insert(0) += 1;
                    }
                }
            }
            Cardinality::Repeated => {
                let len = node.len_of(id);
                for index in 0..len {
                    let value = node.get_at(id, index).expect("dense repeated slot");
                    assert_value_conforms(schema, field.kind(), value);
                }
                assert!(node.get_at(id, len).is_none(), "indices past len must be empty");
            }
        }
    }

    for (group, active) in active_per_group {
        assert!(active <= 1, "oneof group {group} has {active} active members");
    }
}

fn assert_value_conforms(schema: &Arc<Schema>, kind: FieldKind, value: &Value) {
    match (kind, value) {
        (FieldKind::I32, Value::I32(_))
        | (FieldKind::I64, Value::I64(_))
        | (FieldKind::U32, Value::U32(_))
        | (FieldKind::U64, Value::U64(_))
        | (FieldKind::F32, Value::F32(_))
        | (FieldKind::F64, Value::F64(_))
        | (FieldKind::Bool, Value::Bool(_))
        | (FieldKind::Str, Value::Str(_)) => {}
        (FieldKind::Enum(domain), Value::Enum(index)) => {
            assert!(*index < schema.enum_type(domain).value_count());
        }
        (FieldKind::Message(type_id), Value::Message(child)) => {
            assert_eq!(child.type_id(), type_id, "child of foreign type");
            assert_schema_valid(child);
        }
        (kind, value) => panic!("kind {kind:?} holds {value:?}"),
    }
}

// ============================================================================
// Mutation Scenarios
// ============================================================================

#[test]
fn value_mutation_flips_exactly_one_bit() {
    let (schema, root) = single_i32_schema();
    let mut flips = 0;

    for seed in 0..300 {
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        tree.set(1.into(), Value::I32(1));
        Mutator::new(seed).mutate(&mut tree, 64);

        // Possible outcomes: in-place mutation (bit flip), deletion, or a
        // self-copy that changes nothing. Whenever the value changed, it
        // must differ in exactly one bit.
        if let Some(Value::I32(new)) = tree.get(1.into()) {
            if *new != 1 {
                assert_eq!((new ^ 1).count_ones(), 1, "seed {seed}: {new:#x}");
                flips += 1;
            }
        }
    }
    assert!(flips > 0, "no seed exercised the numeric kernel");
}

#[test]
fn oneof_reaches_other_member_and_empty_state() {
    let (schema, root) = oneof_schema();
    let mut switched_to_b = 0;
    let mut emptied = 0;

    for seed in 0..1000 {
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        tree.set(1.into(), Value::I32(5));
        Mutator::new(seed).mutate(&mut tree, 1000);

        assert_schema_valid(&tree);
        if tree.has(2.into()) {
            assert!(!tree.has(1.into()), "seed {seed}: both oneof members set");
            switched_to_b += 1;
        } else if !tree.has(1.into()) {
            emptied += 1;
        }
    }
    assert!(switched_to_b > 0, "no seed added the other oneof member");
    assert!(emptied > 0, "no seed deleted the active oneof member");
}

#[test]
fn keep_initialized_repairs_required_fields() {
    let (schema, root, _) = required_schema();

    for seed in 0..50 {
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        let mut mutator = Mutator::new(seed);
        mutator.set_keep_initialized(true);
        mutator.mutate(&mut tree, 100);

        assert!(tree.is_initialized(), "seed {seed}");
        assert!(tree.has(1.into()));
    }
}

#[test]
fn repair_runs_even_when_no_mutation_was_possible() {
    // A zero hint scales the Add weight to nothing, so an empty tree offers
    // no candidate at all; the repair pass must still fire.
    let (schema, root, _) = required_schema();
    let mut tree = TreeNode::new(schema, root);
    let mut mutator = Mutator::with_config(&MutatorConfig::default().with_keep_initialized(true));
    mutator.mutate(&mut tree, 0);
    assert!(tree.is_initialized());
}

#[test]
fn mutation_on_empty_tree_with_zero_hint_is_a_noop() {
    let (schema, root) = single_i32_schema();
    let mut tree = TreeNode::new(schema, root);
    Mutator::new(3).mutate(&mut tree, 0);
    assert!(!tree.has(1.into()));
}

#[test]
fn add_is_always_eligible_on_an_empty_tree() {
    let (schema, root) = single_i32_schema();
    for seed in 0..50 {
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        Mutator::new(seed).mutate(&mut tree, 512);
        assert!(tree.has(1.into()), "seed {seed}: the only candidate is Add");
    }
}

#[test]
fn copy_with_no_source_degrades_to_delete() {
    // Target a field kind of which nothing in the tree is set: the source
    // sampler comes back empty and the engine clears the slot instead.
    let mut builder = SchemaBuilder::new();
    let root = builder.add_message("Root");
    builder
        .message(root)
        .singular(1, "x", FieldKind::I32)
        .singular(2, "y", FieldKind::F64);
    let schema = builder.finish().unwrap();

    let mut tree = TreeNode::new(schema, root);
    tree.set(1.into(), Value::I32(0));

    let target = FieldRef::new(NodePath::root(), 2.into(), None);
    Mutator::new(0).apply_copy(&mut tree, &target);
    assert!(!tree.has(2.into()));
    // The unrelated field is untouched.
    assert_eq!(tree.get(1.into()), Some(&Value::I32(0)));
}

#[test]
fn copy_source_may_equal_destination() {
    // A lone set field is its own only source; the copy is then a no-op
    // that still counts as a mutation.
    let (schema, root) = single_i32_schema();
    let mut tree = TreeNode::new(schema, root);
    tree.set(1.into(), Value::I32(77));

    let target = FieldRef::new(NodePath::root(), 1.into(), None);
    Mutator::new(0).apply_copy(&mut tree, &target);
    assert_eq!(tree.get(1.into()), Some(&Value::I32(77)));
}

#[test]
fn source_sampler_finds_only_matching_kinds() {
    let (schema, root) = scalar_pair_schema();
    let mut tree = TreeNode::new(schema, root);
    tree.set(1.into(), Value::I32(4));

    let mut rng = crate::EngineRng::new(9);
    assert!(DataSourceSampler::select(&tree, FieldKind::I32, &mut rng).is_some());
    assert!(DataSourceSampler::select(&tree, FieldKind::U32, &mut rng).is_none());
    assert!(DataSourceSampler::select(&tree, FieldKind::F64, &mut rng).is_none());
}

#[test]
fn repair_depth_is_bounded_on_pathological_schemas() {
    // A required message child of the node's own type can never be
    // satisfied; the repair pass must stop at its depth budget and leave
    // the tree uninitialized rather than recurse forever.
    let mut builder = SchemaBuilder::new();
    let root = builder.add_message("Turtle");
    builder
        .message(root)
        .required(1, "below", FieldKind::Message(root));
    let schema = builder.finish().unwrap();

    let mut tree = TreeNode::new(schema, root);
    let mut mutator = Mutator::new(1);
    mutator.set_keep_initialized(true);
    mutator.mutate(&mut tree, 100);

    assert!(!tree.is_initialized());
    // The repair still produced a deep chain of placeholder children.
    let mut depth = 0;
    let mut node = &tree;
    while let Some(child) = node.child(1.into()) {
        depth += 1;
        node = child;
    }
    assert!(depth >= 30, "repair stopped after only {depth} levels");
}

// ============================================================================
// Crossover Scenarios
// ============================================================================

#[test]
fn crossover_merges_repeated_fields_within_bounds() {
    let (schema, root) = repeated_i32_schema();

    let mut parent_a = TreeNode::new(Arc::clone(&schema), root);
    for (index, value) in [1, 2, 3].into_iter().enumerate() {
        parent_a.insert_at(1.into(), index, Value::I32(value));
    }

    for seed in 0..100 {
        let mut child = TreeNode::new(Arc::clone(&schema), root);
        for (index, value) in [7, 8].into_iter().enumerate() {
            child.insert_at(1.into(), index, Value::I32(value));
        }

        Mutator::new(seed).cross_over(&parent_a, &mut child);

        let len = child.len_of(1.into());
        assert!(len <= 5, "seed {seed}: len {len}");

        // The result is a sub-multiset of the two parents' elements.
        let mut available: HashMap<i32, usize> =
            [(1, 1), (2, 1), (3, 1), (7, 1), (8, 1)].into_iter().collect();
        for index in 0..len {
            let Some(Value::I32(v)) = child.get_at(1.into(), index) else {
                panic!("non-i32 element after crossover");
            };
            let budget = available.get_mut(v).unwrap_or_else(|| {
                panic!("seed {seed}: foreign element {v}");
            });
            assert!(*budget > 0, "seed {seed}: element {v} duplicated");
            *budget -= 1;
        }
    }
}

#[test]
fn crossover_singular_scalar_takes_either_parent() {
    let (schema, root) = single_i32_schema();
    let mut parent_a = TreeNode::new(Arc::clone(&schema), root);
    parent_a.set(1.into(), Value::I32(42));

    let mut took_a = 0;
    let mut kept_own = 0;
    for seed in 0..200 {
        let mut child = TreeNode::new(Arc::clone(&schema), root);
        child.set(1.into(), Value::I32(7));
        Mutator::new(seed).cross_over(&parent_a, &mut child);
        match child.get(1.into()) {
            Some(Value::I32(42)) => took_a += 1,
            Some(Value::I32(7)) => kept_own += 1,
            other => panic!("seed {seed}: unexpected value {other:?}"),
        }
    }
    assert!(took_a > 0);
    assert!(kept_own > 0);
}

#[test]
fn crossover_absent_source_scalar_can_clear_target() {
    let (schema, root) = single_i32_schema();
    let parent_a = TreeNode::new(Arc::clone(&schema), root);

    let mut cleared = 0;
    for seed in 0..200 {
        let mut child = TreeNode::new(Arc::clone(&schema), root);
        child.set(1.into(), Value::I32(7));
        Mutator::new(seed).cross_over(&parent_a, &mut child);
        match child.get(1.into()) {
            None => cleared += 1,
            Some(Value::I32(7)) => {}
            other => panic!("seed {seed}: unexpected value {other:?}"),
        }
    }
    assert!((1..200).contains(&cleared), "cleared = {cleared}");
}

#[test]
fn crossover_recurses_into_shared_children() {
    let (schema, root, leaf) = required_schema();

    let mut parent_a = TreeNode::new(Arc::clone(&schema), root);
    parent_a.set(1.into(), Value::I32(0));
    let mut a_leaf = TreeNode::new(Arc::clone(&schema), leaf);
    a_leaf.set(1.into(), Value::U32(100));
    parent_a.set(2.into(), Value::Message(a_leaf));

    let mut from_a = 0;
    let mut from_b = 0;
    for seed in 0..200 {
        let mut child = TreeNode::new(Arc::clone(&schema), root);
        child.set(1.into(), Value::I32(0));
        let mut b_leaf = TreeNode::new(Arc::clone(&schema), leaf);
        b_leaf.set(1.into(), Value::U32(200));
        child.set(2.into(), Value::Message(b_leaf));

        Mutator::new(seed).cross_over(&parent_a, &mut child);

        // Both parents have the child set, so crossover recursed; the inner
        // value came from one of the two parents.
        let inner = child.child(2.into()).expect("child survives recursion");
        match inner.get(1.into()) {
            Some(Value::U32(100)) => from_a += 1,
            Some(Value::U32(200)) => from_b += 1,
            other => panic!("seed {seed}: unexpected inner value {other:?}"),
        }
    }
    assert!(from_a > 0);
    assert!(from_b > 0);
}

#[test]
fn crossover_repairs_required_fields_when_asked() {
    let (schema, root, leaf) = required_schema();

    // The source carries an uninitialized leaf; with keep_initialized set,
    // the offspring must still come out initialized.
    let mut parent_a = TreeNode::new(Arc::clone(&schema), root);
    parent_a.set(1.into(), Value::I32(1));
    parent_a.insert_at(
        3.into(),
        0,
        Value::Message(TreeNode::new(Arc::clone(&schema), leaf)),
    );

    for seed in 0..100 {
        let mut child = TreeNode::new(Arc::clone(&schema), root);
        let mut mutator = Mutator::new(seed);
        mutator.set_keep_initialized(true);
        mutator.cross_over(&parent_a, &mut child);
        assert!(child.is_initialized(), "seed {seed}");
    }
}

#[test]
#[should_panic(expected = "same message type")]
fn crossover_rejects_mismatched_types() {
    let mut builder = SchemaBuilder::new();
    let first = builder.add_message("First");
    let second = builder.add_message("Second");
    builder.message(first).singular(1, "x", FieldKind::I32);
    builder.message(second).singular(1, "x", FieldKind::I32);
    let schema = builder.finish().unwrap();

    let a = TreeNode::new(Arc::clone(&schema), first);
    let mut b = TreeNode::new(schema, second);
    Mutator::new(0).cross_over(&a, &mut b);
}

// ============================================================================
// Determinism
// ============================================================================

#[test]
fn identical_seeds_produce_identical_mutations() {
    let (schema, root) = rich_schema();
    let tree = grow_tree(&schema, root, 9, 40);

    let mut first = tree.clone();
    let mut second = tree.clone();
    Mutator::new(7).mutate(&mut first, 100);
    Mutator::new(7).mutate(&mut second, 100);

    assert_eq!(format!("{first:?}"), format!("{second:?}"));
}

#[test]
fn identical_seeds_produce_identical_crossovers() {
    let (schema, root) = rich_schema();
    let parent_a = grow_tree(&schema, root, 11, 40);
    let parent_b = grow_tree(&schema, root, 12, 40);

    let mut first = parent_b.clone();
    let mut second = parent_b.clone();
    Mutator::new(5).cross_over(&parent_a, &mut first);
    Mutator::new(5).cross_over(&parent_a, &mut second);

    assert_eq!(format!("{first:?}"), format!("{second:?}"));
}

#[test]
fn mutation_streams_with_one_engine_are_reproducible() {
    let (schema, root) = rich_schema();
    let a = grow_tree(&schema, root, 21, 60);
    let b = grow_tree(&schema, root, 21, 60);
    assert_eq!(format!("{a:?}"), format!("{b:?}"));
}

// ============================================================================
// Distribution
// ============================================================================

#[test]
fn mutation_share_tracks_weights() {
    // One set i32 and one unset u32. Candidates and weights:
    //   Mutate(a) 1_000_000, Copy(a) 1_000_000, Delete(a) 100_000,
    //   Add(b) 100_000.
    // In-place mutation should land at 1_000_000 / 2_200_000 of runs.
    let (schema, root) = scalar_pair_schema();
    let runs = 100_000u32;
    let mut mutated = 0u32;

    for seed in 0..runs {
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        tree.set(1.into(), Value::I32(5));
        Mutator::new(seed).mutate(&mut tree, 1000);

        match tree.get(1.into()) {
            Some(Value::I32(v)) if *v != 5 => mutated += 1,
            _ => {}
        }
    }

    let observed = f64::from(mutated) / f64::from(runs);
    let expected = 1_000_000.0 / 2_200_000.0;
    assert!(
        (observed - expected).abs() < 0.015,
        "observed {observed:.4}, expected {expected:.4}"
    );
}

#[test]
fn size_governor_shifts_add_toward_delete() {
    // Below the deletion threshold the Add weight scales down and the
    // Delete weight scales up; empirical rates must follow monotonically.
    let (schema, root) = scalar_pair_schema();
    let hints = [120usize, 90, 60, 30, 0];
    let runs = 30_000u32;

    let mut add_rates = Vec::new();
    let mut delete_rates = Vec::new();
    for (bucket, hint) in hints.into_iter().enumerate() {
        let mut adds = 0u32;
        let mut deletes = 0u32;
        for run in 0..runs {
            let seed = bucket as u32 * runs + run;
            let mut tree = TreeNode::new(Arc::clone(&schema), root);
            tree.set(1.into(), Value::I32(5));
            Mutator::new(seed).mutate(&mut tree, hint);

            if tree.has(2.into()) {
                adds += 1;
            }
            if !tree.has(1.into()) {
                deletes += 1;
            }
        }
        add_rates.push(f64::from(adds) / f64::from(runs));
        delete_rates.push(f64::from(deletes) / f64::from(runs));
    }

    for window in add_rates.windows(2) {
        assert!(window[1] < window[0], "add rates not declining: {add_rates:?}");
    }
    for window in delete_rates.windows(2) {
        assert!(
            window[1] > window[0],
            "delete rates not rising: {delete_rates:?}"
        );
    }
    assert_eq!(add_rates[4], 0.0, "zero hint must disable Add entirely");
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Every mutation leaves the tree a valid value of its schema.
    #[test]
    fn mutation_preserves_schema_validity(
        seed in any::<u32>(),
        rounds in 1usize..12,
        hint in 0usize..300,
    ) {
        let (schema, root) = rich_schema();
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        let mut mutator = Mutator::new(seed);
        for _ in 0..rounds {
            mutator.mutate(&mut tree, hint);
            assert_schema_valid(&tree);
        }
    }

    /// Crossover preserves validity and never grows a repeated field past
    /// the combined size of its parents.
    #[test]
    fn crossover_respects_bounds_and_validity(
        seed_a in any::<u32>(),
        seed_b in any::<u32>(),
        seed_cross in any::<u32>(),
    ) {
        let (schema, root) = rich_schema();
        let parent_a = grow_tree(&schema, root, seed_a, 30);
        let mut child = grow_tree(&schema, root, seed_b, 30);

        let repeated: Vec<_> = child
            .descriptor()
            .fields()
            .iter()
            .filter(|f| f.is_repeated())
            .map(|f| f.id())
            .collect();
        let bounds: Vec<usize> = repeated
            .iter()
            .map(|id| parent_a.len_of(*id) + child.len_of(*id))
            .collect();

        Mutator::new(seed_cross).cross_over(&parent_a, &mut child);

        assert_schema_valid(&child);
        for (id, bound) in repeated.iter().zip(bounds) {
            prop_assert!(child.len_of(*id) <= bound);
        }
    }

    /// With keep_initialized set, any mutation of a repairable schema ends
    /// initialized.
    #[test]
    fn keep_initialized_holds_under_arbitrary_mutation(
        seed in any::<u32>(),
        rounds in 1usize..10,
        hint in 0usize..300,
    ) {
        let (schema, root, _) = required_schema();
        let mut tree = TreeNode::new(Arc::clone(&schema), root);
        let mut mutator = Mutator::new(seed);
        mutator.set_keep_initialized(true);
        for _ in 0..rounds {
            mutator.mutate(&mut tree, hint);
            prop_assert!(tree.is_initialized());
        }
    }
}
