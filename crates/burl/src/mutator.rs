//! The engine: mutation dispatch, crossover recombination, and the
//! initialization repair pass.

use std::sync::Arc;

use burl_types::{Cardinality, FieldKind, Schema, TreeNode, Value};
use tracing::trace;

use crate::field::FieldRef;
use crate::kernels;
use crate::rng::EngineRng;
use crate::sampler::{DataSourceSampler, MutationKind, MutationSampler};
use crate::MutatorConfig;

/// Recursion budget for the repair pass. Schemas whose required message
/// fields form a cycle can never be initialized; the bound turns that into
/// a bounded amount of wasted work instead of a hang.
const MAX_INITIALIZE_DEPTH: usize = 32;

// ============================================================================
// Engine
// ============================================================================

/// Structure-aware mutator for schema-typed tree values.
///
/// One call to [`mutate`](Mutator::mutate) applies a single randomly chosen
/// transformation somewhere in the tree; [`cross_over`](Mutator::cross_over)
/// recombines two same-schema trees. Both leave the tree schema-valid. The
/// engine owns its random source, so outputs are a deterministic function of
/// the seed, the inputs, and the options.
///
/// Not for concurrent use: parallel fuzzing runs one engine per thread with
/// distinct seeds.
#[derive(Debug)]
pub struct Mutator {
    rng: EngineRng,
    keep_initialized: bool,
}

impl Mutator {
    /// Creates an engine with a deterministic random source.
    pub fn new(seed: u32) -> Self {
        Self {
            rng: EngineRng::new(seed),
            keep_initialized: false,
        }
    }

    pub fn with_config(config: &MutatorConfig) -> Self {
        Self {
            rng: EngineRng::new(config.seed),
            keep_initialized: config.keep_initialized,
        }
    }

    /// When set, `mutate` and `cross_over` re-establish required-field
    /// completeness before returning (up to the repair depth bound).
    pub fn set_keep_initialized(&mut self, keep_initialized: bool) {
        self.keep_initialized = keep_initialized;
    }

    pub fn keep_initialized(&self) -> bool {
        self.keep_initialized
    }

    /// Applies one random mutation to the tree.
    ///
    /// `size_increase_hint` is a soft budget on growth: large hints leave
    /// the add/delete balance alone, hints under the deletion threshold bias
    /// selection toward shrinking the tree, and value-producing mutations
    /// receive half the hint as their own budget.
    pub fn mutate(&mut self, root: &mut TreeNode, size_increase_hint: usize) {
        let schema = Arc::clone(root.schema());

        if let Some(selected) =
            MutationSampler::select(root, self.keep_initialized, size_increase_hint, &mut self.rng)
        {
            trace!(kind = ?selected.kind, "applying mutation");
            match selected.kind {
                MutationKind::Add => {
                    if self.rng.coin() {
                        let kind = selected.field.kind(root);
                        let default = selected.field.default_value(root);
                        let value =
                            self.mutated_value(kind, default, size_increase_hint / 2, &schema);
                        selected.field.create(root, value);
                    } else {
                        selected.field.create_default(root);
                    }
                }
                MutationKind::Mutate => {
                    let kind = selected.field.kind(root);
                    let current = selected.field.load(root);
                    let value = self.mutated_value(kind, current, size_increase_hint / 2, &schema);
                    selected.field.store(root, value);
                }
                MutationKind::Delete => selected.field.delete(root),
                MutationKind::Copy => self.apply_copy(root, &selected.field),
            }
        } else {
            trace!("no eligible mutation; tree left unchanged");
        }

        if self.keep_initialized && !root.is_initialized() {
            initialize_node(root, MAX_INITIALIZE_DEPTH);
        }
    }

    /// Recombines `source` into `target`. Both trees must be values of the
    /// same message type from the same schema.
    pub fn cross_over(&mut self, source: &TreeNode, target: &mut TreeNode) {
        assert!(
            Arc::ptr_eq(source.schema(), target.schema())
                && source.type_id() == target.type_id(),
            "cross_over requires two values of the same message type"
        );
        trace!(message_type = source.descriptor().name(), "crossing over");

        self.cross_over_impl(source, target);

        if self.keep_initialized && !target.is_initialized() {
            initialize_node(target, MAX_INITIALIZE_DEPTH);
        }
    }

    fn cross_over_impl(&mut self, source: &TreeNode, target: &mut TreeNode) {
        let schema = Arc::clone(source.schema());
        let descriptor = schema.message(source.type_id());
        for field in descriptor.fields() {
            let id = field.id();

            if field.is_repeated() {
                // Merge: append all of the source's elements, shuffle, keep a
                // random prefix. Surviving message elements may first absorb
                // recombined state from elements about to be dropped.
                for index in 0..source.len_of(id) {
                    let value = source.get_at(id, index).expect("dense repeated slot").clone();
                    let end = target.len_of(id);
                    target.insert_at(id, end, value);
                }

                let total = target.len_of(id);
                for offset in 0..total {
                    let jump = self.rng.uniform_index(total - offset);
                    if jump != 0 {
                        target.swap_elements(id, offset, offset + jump);
                    }
                }

                let keep = self.rng.uniform_index(total + 1);

                if field.kind().is_message() {
                    let remove = total - keep;
                    let crossings = self.rng.uniform_index(keep.min(remove) + 1);
                    for _ in 0..crossings {
                        let survivor = self.rng.uniform_index(keep);
                        let doomed = keep + self.rng.uniform_index(remove);
                        let (dst, src) = target.repeated_pair_mut(id, survivor, doomed);
                        self.cross_over_impl(src, dst);
                    }
                }

                for _ in keep..total {
                    target.remove_last(id);
                }
            } else if field.kind().is_message() {
                if !source.has(id) {
                    if self.rng.coin() {
                        target.clear(id);
                    }
                } else if !target.has(id) {
                    if self.rng.coin() {
                        let value = source.get(id).expect("present singular slot").clone();
                        target.set(id, value);
                    }
                } else {
                    let child = source.child(id).expect("present singular child");
                    self.cross_over_impl(child, target.child_mut(id).expect("present child"));
                }
            } else if self.rng.coin() {
                if source.has(id) {
                    let value = source.get(id).expect("present singular slot").clone();
                    target.set(id, value);
                } else {
                    target.clear(id);
                }
            }
        }
    }

    pub(crate) fn apply_copy(&mut self, root: &mut TreeNode, target: &FieldRef) {
        let kind = target.kind(root);
        match DataSourceSampler::select(root, kind, &mut self.rng) {
            Some(source) => {
                let value = source.load(root);
                target.store(root, value);
            }
            // Nothing of this type is set anywhere: degrade to a delete.
            None => target.delete(root),
        }
    }

    fn mutated_value(
        &mut self,
        kind: FieldKind,
        value: Value,
        size_hint: usize,
        schema: &Schema,
    ) -> Value {
        match value {
            Value::I32(v) => Value::I32(kernels::mutate_i32(v, &mut self.rng)),
            Value::I64(v) => Value::I64(kernels::mutate_i64(v, &mut self.rng)),
            Value::U32(v) => Value::U32(kernels::mutate_u32(v, &mut self.rng)),
            Value::U64(v) => Value::U64(kernels::mutate_u64(v, &mut self.rng)),
            Value::F32(v) => Value::F32(kernels::mutate_f32(v, &mut self.rng)),
            Value::F64(v) => Value::F64(kernels::mutate_f64(v, &mut self.rng)),
            Value::Bool(v) => Value::Bool(kernels::mutate_bool(v)),
            Value::Enum(v) => {
                let FieldKind::Enum(domain) = kind else {
                    unreachable!("enum value on non-enum field")
                };
                let count = schema.enum_type(domain).value_count();
                Value::Enum(kernels::mutate_enum(v, count, &mut self.rng))
            }
            Value::Str(v) => Value::Str(kernels::mutate_str(&v, size_hint, &mut self.rng)),
            // Message contents mutate through recursion in the sampler, not
            // at the slot level.
            Value::Message(node) => Value::Message(node),
        }
    }

    // ------------------------------------------------------------------
    // Scalar kernels, engine-seeded
    // ------------------------------------------------------------------

    pub fn mutate_i32(&mut self, value: i32) -> i32 {
        kernels::mutate_i32(value, &mut self.rng)
    }

    pub fn mutate_i64(&mut self, value: i64) -> i64 {
        kernels::mutate_i64(value, &mut self.rng)
    }

    pub fn mutate_u32(&mut self, value: u32) -> u32 {
        kernels::mutate_u32(value, &mut self.rng)
    }

    pub fn mutate_u64(&mut self, value: u64) -> u64 {
        kernels::mutate_u64(value, &mut self.rng)
    }

    pub fn mutate_f32(&mut self, value: f32) -> f32 {
        kernels::mutate_f32(value, &mut self.rng)
    }

    pub fn mutate_f64(&mut self, value: f64) -> f64 {
        kernels::mutate_f64(value, &mut self.rng)
    }

    pub fn mutate_bool(&mut self, value: bool) -> bool {
        kernels::mutate_bool(value)
    }

    pub fn mutate_enum(&mut self, index: u32, count: u32) -> u32 {
        kernels::mutate_enum(index, count, &mut self.rng)
    }

    pub fn mutate_str(&mut self, value: &[u8], size_hint: usize) -> Vec<u8> {
        kernels::mutate_str(value, size_hint, &mut self.rng)
    }
}

// ============================================================================
// Initialization Repair
// ============================================================================

/// Fills unset required fields with defaults, recursing into message
/// children while depth remains.
///
/// Entering a child consumes one level. Exhausting the budget leaves the
/// subtree as it stands; callers observe the outcome through
/// [`TreeNode::is_initialized`].
pub(crate) fn initialize_node(node: &mut TreeNode, max_depth: usize) {
    let schema = Arc::clone(node.schema());
    let descriptor = schema.message(node.type_id());
    for field in descriptor.fields() {
        let id = field.id();
        if field.is_required() && !node.has(id) {
            let value = node.default_value(id);
            node.set(id, value);
        }

        if max_depth > 0 && field.kind().is_message() {
            match field.cardinality() {
                Cardinality::Repeated => {
                    for index in 0..node.len_of(id) {
                        let child = node.child_at_mut(id, index).expect("dense repeated slot");
                        if !child.is_initialized() {
                            initialize_node(child, max_depth - 1);
                        }
                    }
                }
                Cardinality::Singular => {
                    if let Some(child) = node.child_mut(id) {
                        if !child.is_initialized() {
                            initialize_node(child, max_depth - 1);
                        }
                    }
                }
            }
        }
    }
}
