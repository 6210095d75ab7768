//! Candidate enumeration: the mutation sampler and the copy-source sampler.
//!
//! Both walk the tree depth-first in descriptor declaration order and stream
//! every legal candidate through a weighted reservoir, so a single pass picks
//! one candidate with probability proportional to its weight and the whole
//! selection costs one traversal regardless of tree size.

use burl_types::{Cardinality, FieldKind, TreeNode};

use crate::field::{FieldRef, NodePath};
use crate::reservoir::WeightedReservoirSampler;
use crate::rng::EngineRng;

/// Weight of an in-place value mutation per opportunity.
pub(crate) const MUTATE_WEIGHT: u64 = 1_000_000;

/// Hint value below which the size governor starts biasing against Add and
/// toward Delete.
pub(crate) const DELETION_THRESHOLD: usize = 128;

// ============================================================================
// Mutation Sampler
// ============================================================================

/// The structural transformations a mutation can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MutationKind {
    /// Materialize an unset or new slot.
    Add,
    /// Change a value in place.
    Mutate,
    /// Clear a slot or erase an element.
    Delete,
    /// Overwrite from a same-typed source elsewhere in the tree.
    Copy,
}

/// A selected `(slot, transformation)` pair.
#[derive(Debug)]
pub(crate) struct SelectedMutation {
    pub field: FieldRef,
    pub kind: MutationKind,
}

/// Enumerates every legal mutation across the tree and picks one.
///
/// Structural candidates (Add, Delete) run at a tenth of the value-mutation
/// weight; the size governor rebalances the two as the growth budget runs
/// out. Copying a message subtree grows the tree, so it is weighted like an
/// Add; copying a scalar is weighted like a value mutation.
pub(crate) struct MutationSampler<'r> {
    keep_initialized: bool,
    add_weight: u64,
    delete_weight: u64,
    rng: &'r mut EngineRng,
    reservoir: WeightedReservoirSampler<SelectedMutation>,
}

impl<'r> MutationSampler<'r> {
    /// Walks `root` and returns the selected candidate, or `None` when no
    /// slot is eligible (possible only for trees with no set fields once the
    /// governor has zeroed the Add weight).
    pub fn select(
        root: &TreeNode,
        keep_initialized: bool,
        size_increase_hint: usize,
        rng: &'r mut EngineRng,
    ) -> Option<SelectedMutation> {
        let mut add_weight = MUTATE_WEIGHT / 10;
        let mut delete_weight = MUTATE_WEIGHT / 10;
        if size_increase_hint < DELETION_THRESHOLD {
            // Approaching the growth budget: make Add rarer and Delete more
            // likely in proportion.
            let adjustment = 0.5 * size_increase_hint as f64 / DELETION_THRESHOLD as f64;
            add_weight = (add_weight as f64 * adjustment) as u64;
            delete_weight = (delete_weight as f64 * (1.0 - adjustment)) as u64;
        }

        let mut sampler = Self {
            keep_initialized,
            add_weight,
            delete_weight,
            rng,
            reservoir: WeightedReservoirSampler::new(),
        };
        sampler.sample(root, &NodePath::root());
        sampler.reservoir.into_selected()
    }

    fn sample(&mut self, node: &TreeNode, path: &NodePath) {
        let descriptor = node.descriptor();
        for field in descriptor.fields() {
            let id = field.id();

            if let Some(group) = field.oneof() {
                // The whole group is handled once, on its first member.
                let members = descriptor.oneof(group).members();
                if members[0] == id {
                    let target = members[self.rng.uniform_index(members.len())];
                    self.offer(
                        self.add_weight,
                        FieldRef::new(path.clone(), target, None),
                        MutationKind::Add,
                    );
                    if let Some(active) = node.active_oneof_member(group) {
                        let active_kind = descriptor
                            .field(active)
                            .expect("oneof member declared")
                            .kind();
                        if !active_kind.is_message() {
                            self.offer(
                                MUTATE_WEIGHT,
                                FieldRef::new(path.clone(), active, None),
                                MutationKind::Mutate,
                            );
                        }
                        self.offer(
                            self.delete_weight,
                            FieldRef::new(path.clone(), active, None),
                            MutationKind::Delete,
                        );
                        self.offer(
                            self.copy_weight(active_kind),
                            FieldRef::new(path.clone(), active, None),
                            MutationKind::Copy,
                        );
                    }
                }
            } else {
                match field.cardinality() {
                    Cardinality::Repeated => {
                        let size = node.len_of(id);
                        let insertion = self.rng.uniform_index(size + 1);
                        self.offer(
                            self.add_weight,
                            FieldRef::new(path.clone(), id, Some(insertion)),
                            MutationKind::Add,
                        );

                        if size > 0 {
                            let element = self.rng.uniform_index(size);
                            if !field.kind().is_message() {
                                self.offer(
                                    MUTATE_WEIGHT,
                                    FieldRef::new(path.clone(), id, Some(element)),
                                    MutationKind::Mutate,
                                );
                            }
                            self.offer(
                                self.delete_weight,
                                FieldRef::new(path.clone(), id, Some(element)),
                                MutationKind::Delete,
                            );
                            self.offer(
                                self.copy_weight(field.kind()),
                                FieldRef::new(path.clone(), id, Some(element)),
                                MutationKind::Copy,
                            );
                        }
                    }
                    Cardinality::Singular => {
                        if node.has(id) {
                            if !field.kind().is_message() {
                                self.offer(
                                    MUTATE_WEIGHT,
                                    FieldRef::new(path.clone(), id, None),
                                    MutationKind::Mutate,
                                );
                            }
                            if !field.is_required() || !self.keep_initialized {
                                self.offer(
                                    self.delete_weight,
                                    FieldRef::new(path.clone(), id, None),
                                    MutationKind::Delete,
                                );
                            }
                            self.offer(
                                self.copy_weight(field.kind()),
                                FieldRef::new(path.clone(), id, None),
                                MutationKind::Copy,
                            );
                        } else {
                            self.offer(
                                self.add_weight,
                                FieldRef::new(path.clone(), id, None),
                                MutationKind::Add,
                            );
                        }
                    }
                }
            }

            // Recurse into present message children.
            if field.kind().is_message() {
                match field.cardinality() {
                    Cardinality::Repeated => {
                        for index in 0..node.len_of(id) {
                            let child = node.child_at(id, index).expect("dense repeated slot");
                            self.sample(child, &path.descend(id, Some(index)));
                        }
                    }
                    Cardinality::Singular => {
                        if let Some(child) = node.child(id) {
                            self.sample(child, &path.descend(id, None));
                        }
                    }
                }
            }
        }
    }

    /// Copying a subtree is a growth operation; copying a scalar is as cheap
    /// as mutating one.
    fn copy_weight(&self, kind: FieldKind) -> u64 {
        if kind.is_message() {
            self.add_weight
        } else {
            MUTATE_WEIGHT
        }
    }

    fn offer(&mut self, weight: u64, field: FieldRef, kind: MutationKind) {
        self.reservoir
            .offer(weight, SelectedMutation { field, kind }, self.rng);
    }
}

// ============================================================================
// Data Source Sampler
// ============================================================================

/// Finds a copy source for a target slot: any currently-set field of the
/// same kind (and, for enums and messages, the same concrete type).
///
/// Repeated matches offer one random element weighted by their size, biasing
/// toward larger fields; singular matches offer with weight one. The target
/// itself is a legal source, so a selected Copy may be a no-op.
pub(crate) struct DataSourceSampler<'r> {
    target_kind: FieldKind,
    rng: &'r mut EngineRng,
    reservoir: WeightedReservoirSampler<FieldRef>,
}

impl<'r> DataSourceSampler<'r> {
    /// Returns a source slot, or `None` when nothing of the target's type is
    /// set anywhere in the tree.
    pub fn select(
        root: &TreeNode,
        target_kind: FieldKind,
        rng: &'r mut EngineRng,
    ) -> Option<FieldRef> {
        let mut sampler = Self {
            target_kind,
            rng,
            reservoir: WeightedReservoirSampler::new(),
        };
        sampler.sample(root, &NodePath::root());
        sampler.reservoir.into_selected()
    }

    fn sample(&mut self, node: &TreeNode, path: &NodePath) {
        for field in node.descriptor().fields() {
            let id = field.id();

            if field.kind().is_message() {
                match field.cardinality() {
                    Cardinality::Repeated => {
                        for index in 0..node.len_of(id) {
                            let child = node.child_at(id, index).expect("dense repeated slot");
                            self.sample(child, &path.descend(id, Some(index)));
                        }
                    }
                    Cardinality::Singular => {
                        if node.has(id) {
                            let child = node.child(id).expect("present singular child");
                            self.sample(child, &path.descend(id, None));
                        }
                    }
                }
            }

            if field.kind() != self.target_kind {
                continue;
            }
            match field.cardinality() {
                Cardinality::Repeated => {
                    let size = node.len_of(id);
                    if size > 0 {
                        let element = self.rng.uniform_index(size);
                        self.reservoir.offer(
                            size as u64,
                            FieldRef::new(path.clone(), id, Some(element)),
                            self.rng,
                        );
                    }
                }
                Cardinality::Singular => {
                    if node.has(id) {
                        self.reservoir
                            .offer(1, FieldRef::new(path.clone(), id, None), self.rng);
                    }
                }
            }
        }
    }
}
