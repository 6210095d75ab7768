#![no_main]

use std::collections::HashMap;
use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use burl::{
    Cardinality, FieldKind, MessageTypeId, Mutator, Schema, SchemaBuilder, TreeNode, Value,
};

/// Schema exercising every field shape: scalars, strings, enums, nested and
/// repeated messages, a oneof, and a required field.
fn build_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let leaf = builder.add_message("Leaf");
    let root = builder.add_message("Root");
    let mode = builder.add_enum("Mode", &["OFF", "SLOW", "FAST", "TURBO"]);
    builder
        .message(leaf)
        .required(1, "id", FieldKind::U32)
        .singular(2, "tag", FieldKind::Str)
        .repeated(3, "weights", FieldKind::F64);
    builder
        .message(root)
        .singular(1, "flag", FieldKind::Bool)
        .singular(2, "count", FieldKind::I64)
        .repeated(3, "xs", FieldKind::I32)
        .singular(4, "mode", FieldKind::Enum(mode))
        .singular(5, "leaf", FieldKind::Message(leaf))
        .repeated(6, "leaves", FieldKind::Message(leaf))
        .oneof(
            "transport",
            &[(7, "port", FieldKind::U32), (8, "path", FieldKind::Str)],
        );
    (builder.finish().unwrap(), root)
}

/// Walks the tree and asserts schema validity: declared kinds, in-domain
/// enum values, dense repeated indices, oneof exclusivity, child types.
fn check_valid(node: &TreeNode) {
    let schema = node.schema();
    let mut active_per_group: HashMap<usize, usize> = HashMap::new();

    for field in node.descriptor().fields() {
        let id = field.id();
        match field.cardinality() {
            Cardinality::Singular => {
                if node.has(id) {
                    check_value(schema, field.kind(), node.get(id).unwrap());
                    if let Some(group) = field.oneof() {
                        *active_per_group.entry(group.index()).or_insert(0) += 1;
                    }
                }
            }
            Cardinality::Repeated => {
                let len = node.len_of(id);
                for index in 0..len {
                    check_value(schema, field.kind(), node.get_at(id, index).unwrap());
                }
                assert!(node.get_at(id, len).is_none());
            }
        }
    }
    for (group, active) in active_per_group {
        assert!(active <= 1, "oneof group {group}: {active} members active");
    }
}

fn check_value(schema: &Arc<Schema>, kind: FieldKind, value: &Value) {
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
            assert_eq!(child.type_id(), type_id);
            check_valid(child);
        }
        (kind, value) => panic!("kind {kind:?} holds {value:?}"),
    }
}

fuzz_target!(|data: &[u8]| {
    // Drive a mutation stream from raw bytes: the first four bytes seed the
    // engine, the fifth toggles keep_initialized, and every following byte
    // becomes one mutate call with a byte-derived size hint.
    //
    // This tests:
    // - No panics for any seed / hint / call sequence
    // - Schema validity after every single mutation
    // - keep_initialized holding whenever it is enabled
    if data.len() < 6 {
        return;
    }

    let seed = u32::from_le_bytes(data[0..4].try_into().unwrap());
    let keep_initialized = data[4] & 1 == 1;

    let (schema, root) = build_schema();
    let mut tree = TreeNode::new(schema, root);
    let mut mutator = Mutator::new(seed);
    mutator.set_keep_initialized(keep_initialized);

    for byte in &data[5..] {
        // Spread hints across the governor boundary: 0, below and above
        // the deletion threshold.
        let hint = usize::from(*byte) * 4;
        mutator.mutate(&mut tree, hint);

        check_valid(&tree);
        if keep_initialized {
            assert!(tree.is_initialized(), "repairable schema left uninitialized");
        }
    }
});
