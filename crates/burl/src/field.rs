//! Path-addressed field instances.
//!
//! The samplers enumerate candidates across the whole tree before anything
//! is applied, so a candidate cannot hold a live borrow into the tree.
//! Instead it records the *path* from the root to the owning node (field id
//! plus index per hop) and the slot inside that node; paths are resolved
//! against the root when the chosen transformation is applied. Sampling
//! never mutates, so recorded paths stay valid until then. Stale or
//! ill-typed paths are programmer errors and panic on resolution.

use burl_types::{FieldDescriptor, FieldId, FieldKind, TreeNode, Value};

// ============================================================================
// Paths
// ============================================================================

/// One hop from a node to a message child: singular (`index: None`) or a
/// repeated element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PathStep {
    pub field: FieldId,
    pub index: Option<usize>,
}

/// Root-relative address of a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct NodePath {
    steps: Vec<PathStep>,
}

impl NodePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// The path extended by one hop.
    pub fn descend(&self, field: FieldId, index: Option<usize>) -> Self {
        let mut steps = self.steps.clone();
        steps.push(PathStep { field, index });
        Self { steps }
    }

    pub fn resolve<'a>(&self, root: &'a TreeNode) -> &'a TreeNode {
        let mut node = root;
        for step in &self.steps {
            node = match step.index {
                Some(index) => node.child_at(step.field, index),
                None => node.child(step.field),
            }
            .expect("stale path");
        }
        node
    }

    pub fn resolve_mut<'a>(&self, root: &'a mut TreeNode) -> &'a mut TreeNode {
        let mut node = root;
        for step in &self.steps {
            node = match step.index {
                Some(index) => node.child_at_mut(step.field, index),
                None => node.child_mut(step.field),
            }
            .expect("stale path");
        }
        node
    }
}

// ============================================================================
// Field Instances
// ============================================================================

/// Addressable slot: owning node path, field id, and for repeated fields the
/// element (or insertion) index.
///
/// The index doubles as the cardinality marker: `None` addresses a singular
/// slot, `Some` an element of a repeated one. Used read-only with a shared
/// root borrow and read-write with a mutable one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldRef {
    owner: NodePath,
    field: FieldId,
    index: Option<usize>,
}

impl FieldRef {
    pub fn new(owner: NodePath, field: FieldId, index: Option<usize>) -> Self {
        Self {
            owner,
            field,
            index,
        }
    }

    pub fn descriptor<'a>(&self, root: &'a TreeNode) -> &'a FieldDescriptor {
        self.owner.resolve(root).field_descriptor(self.field)
    }

    pub fn kind(&self, root: &TreeNode) -> FieldKind {
        self.descriptor(root).kind()
    }

    /// Clones the current value out of the slot.
    pub fn load(&self, root: &TreeNode) -> Value {
        let node = self.owner.resolve(root);
        match self.index {
            Some(index) => node.get_at(self.field, index),
            None => node.get(self.field),
        }
        .expect("load from an unset slot")
        .clone()
    }

    /// The schema default for this slot's kind.
    pub fn default_value(&self, root: &TreeNode) -> Value {
        self.owner.resolve(root).default_value(self.field)
    }

    /// Overwrites the slot in place.
    pub fn store(&self, root: &mut TreeNode, value: Value) {
        let node = self.owner.resolve_mut(root);
        match self.index {
            Some(index) => node.set_at(self.field, index, value),
            None => node.set(self.field, value),
        }
    }

    /// Materializes a new value: sets a singular slot, inserts into a
    /// repeated one at the recorded index.
    pub fn create(&self, root: &mut TreeNode, value: Value) {
        let node = self.owner.resolve_mut(root);
        match self.index {
            Some(index) => node.insert_at(self.field, index, value),
            None => node.set(self.field, value),
        }
    }

    /// Materializes the schema default.
    pub fn create_default(&self, root: &mut TreeNode) {
        let value = self.default_value(root);
        self.create(root, value);
    }

    /// Clears a singular slot or erases the indexed element, keeping the
    /// remaining indices dense.
    pub fn delete(&self, root: &mut TreeNode) {
        let node = self.owner.resolve_mut(root);
        match self.index {
            Some(index) => node.remove_at(self.field, index),
            None => node.clear(self.field),
        }
    }
}
