#![no_main]

use std::sync::Arc;

use libfuzzer_sys::fuzz_target;

use burl::{FieldId, FieldKind, MessageTypeId, Mutator, Schema, SchemaBuilder, TreeNode};

fn build_schema() -> (Arc<Schema>, MessageTypeId) {
    let mut builder = SchemaBuilder::new();
    let leaf = builder.add_message("Leaf");
    let root = builder.add_message("Root");
    builder
        .message(leaf)
        .singular(1, "id", FieldKind::U32)
        .repeated(2, "tags", FieldKind::Str);
    builder
        .message(root)
        .singular(1, "flag", FieldKind::Bool)
        .repeated(2, "xs", FieldKind::I32)
        .singular(3, "leaf", FieldKind::Message(leaf))
        .repeated(4, "leaves", FieldKind::Message(leaf));
    (builder.finish().unwrap(), root)
}

fuzz_target!(|data: &[u8]| {
    // Grow two parents from byte-derived seeds, then recombine repeatedly.
    //
    // This tests:
    // - No panics recombining arbitrarily grown same-schema trees
    // - Repeated fields never exceed the combined size of the two parents
    // - The offspring stays mutable afterwards (mutation still succeeds)
    if data.len() < 13 {
        return;
    }

    let seed_a = u32::from_le_bytes(data[0..4].try_into().unwrap());
    let seed_b = u32::from_le_bytes(data[4..8].try_into().unwrap());
    let seed_cross = u32::from_le_bytes(data[8..12].try_into().unwrap());

    let (schema, root) = build_schema();
    let repeated_ids: Vec<FieldId> = schema
        .message(root)
        .fields()
        .iter()
        .filter(|f| f.is_repeated())
        .map(|f| f.id())
        .collect();

    let mut parent_a = TreeNode::new(Arc::clone(&schema), root);
    let mut child = TreeNode::new(Arc::clone(&schema), root);
    let mut grower_a = Mutator::new(seed_a);
    let mut grower_b = Mutator::new(seed_b);
    for _ in 0..32 {
        grower_a.mutate(&mut parent_a, 256);
        grower_b.mutate(&mut child, 256);
    }

    let mut mutator = Mutator::new(seed_cross);
    for byte in &data[12..] {
        let bounds: Vec<usize> = repeated_ids
            .iter()
            .map(|id| parent_a.len_of(*id) + child.len_of(*id))
            .collect();

        mutator.cross_over(&parent_a, &mut child);

        for (id, bound) in repeated_ids.iter().zip(bounds) {
            assert!(
                child.len_of(*id) <= bound,
                "field {id}: repeated slot grew past both parents"
            );
        }

        mutator.mutate(&mut child, usize::from(*byte));
    }
});
