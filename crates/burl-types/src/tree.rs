//! Dynamic tree values and their reflection operations.
//!
//! A [`TreeNode`] is a message value whose shape is constrained by its
//! [`MessageDescriptor`]: singular slots carry presence, repeated slots are
//! dense ordered sequences, and oneof exclusivity is enforced inside the
//! store operations. Kind mismatches between a value and its field
//! descriptor are programmer errors and panic with context; the mutation
//! engine cannot produce them by construction.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::schema::{
    Cardinality, FieldDescriptor, FieldId, FieldKind, MessageDescriptor, MessageTypeId, OneofIndex,
    Schema,
};

// ============================================================================
// Values
// ============================================================================

/// A single field value: one arm per field kind.
///
/// Enum values store the index into the enum domain. `Str` is a byte string;
/// mutation inserts arbitrary bytes and flips bits, which rules out UTF-8
/// `String` as a carrier.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    I32(i32),
    I64(i64),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Str(Vec<u8>),
    Enum(u32),
    Message(TreeNode),
}

impl Value {
    /// The default value for a field of the given kind.
    pub fn default_for(kind: FieldKind, schema: &Arc<Schema>) -> Value {
        match kind {
            FieldKind::I32 => Value::I32(0),
            FieldKind::I64 => Value::I64(0),
            FieldKind::U32 => Value::U32(0),
            FieldKind::U64 => Value::U64(0),
            FieldKind::F32 => Value::F32(0.0),
            FieldKind::F64 => Value::F64(0.0),
            FieldKind::Bool => Value::Bool(false),
            FieldKind::Str => Value::Str(Vec::new()),
            FieldKind::Enum(_) => Value::Enum(0),
            FieldKind::Message(id) => Value::Message(TreeNode::new(Arc::clone(schema), id)),
        }
    }

    pub fn as_message(&self) -> Option<&TreeNode> {
        match self {
            Value::Message(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_message_mut(&mut self) -> Option<&mut TreeNode> {
        match self {
            Value::Message(node) => Some(node),
            _ => None,
        }
    }

    fn conforms_to(&self, kind: FieldKind, schema: &Schema) -> bool {
        match (self, kind) {
            (Value::I32(_), FieldKind::I32)
            | (Value::I64(_), FieldKind::I64)
            | (Value::U32(_), FieldKind::U32)
            | (Value::U64(_), FieldKind::U64)
            | (Value::F32(_), FieldKind::F32)
            | (Value::F64(_), FieldKind::F64)
            | (Value::Bool(_), FieldKind::Bool)
            | (Value::Str(_), FieldKind::Str) => true,
            (Value::Enum(index), FieldKind::Enum(id)) => {
                *index < schema.enum_type(id).value_count()
            }
            (Value::Message(node), FieldKind::Message(id)) => node.type_id == id,
            _ => false,
        }
    }
}

// ============================================================================
// Tree Nodes
// ============================================================================

/// Storage for one field: either a singular value or a dense sequence.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Single(Value),
    Repeated(Vec<Value>),
}

/// A dynamic message value.
///
/// Nodes are created empty and populated through the typed operations below.
/// All operations validate the field id against the descriptor and the value
/// kind against the field kind; violations panic.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    schema: Arc<Schema>,
    type_id: MessageTypeId,
    slots: BTreeMap<FieldId, Slot>,
}

impl TreeNode {
    /// Creates an empty node of the given message type.
    pub fn new(schema: Arc<Schema>, type_id: MessageTypeId) -> Self {
        Self {
            schema,
            type_id,
            slots: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn type_id(&self) -> MessageTypeId {
        self.type_id
    }

    pub fn descriptor(&self) -> &MessageDescriptor {
        self.schema.message(self.type_id)
    }

    /// Looks up the descriptor of a declared field. Panics on unknown ids.
    pub fn field_descriptor(&self, id: FieldId) -> &FieldDescriptor {
        self.schema
            .message(self.type_id)
            .field(id)
            .unwrap_or_else(|| {
                panic!(
                    "no field {id} in message {}",
                    self.schema.message(self.type_id).name()
                )
            })
    }

    /// The default value for a declared field's kind.
    pub fn default_value(&self, id: FieldId) -> Value {
        let kind = self.field_descriptor(id).kind();
        Value::default_for(kind, &self.schema)
    }

    // ------------------------------------------------------------------
    // Presence and size
    // ------------------------------------------------------------------

    /// Whether a singular field is set.
    pub fn has(&self, id: FieldId) -> bool {
        debug_assert!(!self.field_descriptor(id).is_repeated());
        self.slots.contains_key(&id)
    }

    /// Number of elements in a repeated field. Absent slots read as empty.
    pub fn len_of(&self, id: FieldId) -> usize {
        debug_assert!(self.field_descriptor(id).is_repeated());
        match self.slots.get(&id) {
            Some(Slot::Repeated(items)) => items.len(),
            _ => 0,
        }
    }

    /// The active member of a oneof group, if any.
    pub fn active_oneof_member(&self, index: OneofIndex) -> Option<FieldId> {
        self.descriptor()
            .oneof(index)
            .members()
            .iter()
            .copied()
            .find(|id| self.slots.contains_key(id))
    }

    // ------------------------------------------------------------------
    // Singular access
    // ------------------------------------------------------------------

    pub fn get(&self, id: FieldId) -> Option<&Value> {
        match self.slots.get(&id) {
            Some(Slot::Single(value)) => Some(value),
            Some(Slot::Repeated(_)) => panic!("singular accessor on repeated field {id}"),
            None => None,
        }
    }

    /// Stores a singular value. For oneof members this clears the group's
    /// other active field first.
    pub fn set(&mut self, id: FieldId, value: Value) {
        let field = self.schema.message(self.type_id).field(id);
        let field = field.unwrap_or_else(|| panic!("no field {id}"));
        assert_eq!(
            field.cardinality(),
            Cardinality::Singular,
            "set on repeated field {id}"
        );
        self.check_kind(field.id(), field.kind(), &value);
        if let Some(group) = field.oneof() {
            let siblings: Vec<FieldId> = self
                .schema
                .message(self.type_id)
                .oneof(group)
                .members()
                .iter()
                .copied()
                .filter(|m| *m != id)
                .collect();
            for sibling in siblings {
                self.slots.remove(&sibling);
            }
        }
        self.slots.insert(id, Slot::Single(value));
    }

    /// Clears a singular field. Clearing an unset field is a no-op.
    pub fn clear(&mut self, id: FieldId) {
        debug_assert!(!self.field_descriptor(id).is_repeated());
        self.slots.remove(&id);
    }

    // ------------------------------------------------------------------
    // Repeated access
    // ------------------------------------------------------------------

    pub fn get_at(&self, id: FieldId, index: usize) -> Option<&Value> {
        match self.slots.get(&id) {
            Some(Slot::Repeated(items)) => items.get(index),
            Some(Slot::Single(_)) => panic!("indexed accessor on singular field {id}"),
            None => None,
        }
    }

    /// Replaces the element at `index`.
    pub fn set_at(&mut self, id: FieldId, index: usize, value: Value) {
        let kind = self.repeated_kind(id);
        self.check_kind(id, kind, &value);
        match self.slots.get_mut(&id) {
            Some(Slot::Repeated(items)) => items[index] = value,
            _ => panic!("set_at on empty repeated field {id}"),
        }
    }

    /// Inserts an element at `index`, shifting the tail right.
    pub fn insert_at(&mut self, id: FieldId, index: usize, value: Value) {
        let kind = self.repeated_kind(id);
        self.check_kind(id, kind, &value);
        let slot = self
            .slots
            .entry(id)
            .or_insert_with(|| Slot::Repeated(Vec::new()));
        match slot {
            Slot::Repeated(items) => items.insert(index, value),
            Slot::Single(_) => unreachable!("repeated slot holds singular value"),
        }
    }

    /// Removes the element at `index`, shifting the tail left. Indices stay
    /// dense.
    pub fn remove_at(&mut self, id: FieldId, index: usize) {
        match self.slots.get_mut(&id) {
            Some(Slot::Repeated(items)) => {
                items.remove(index);
                if items.is_empty() {
                    self.slots.remove(&id);
                }
            }
            _ => panic!("remove_at on empty repeated field {id}"),
        }
    }

    pub fn swap_elements(&mut self, id: FieldId, i: usize, j: usize) {
        match self.slots.get_mut(&id) {
            Some(Slot::Repeated(items)) => items.swap(i, j),
            _ => panic!("swap_elements on empty repeated field {id}"),
        }
    }

    pub fn remove_last(&mut self, id: FieldId) {
        match self.slots.get_mut(&id) {
            Some(Slot::Repeated(items)) => {
                items.pop();
                if items.is_empty() {
                    self.slots.remove(&id);
                }
            }
            _ => panic!("remove_last on empty repeated field {id}"),
        }
    }

    // ------------------------------------------------------------------
    // Child messages
    // ------------------------------------------------------------------

    pub fn child(&self, id: FieldId) -> Option<&TreeNode> {
        self.get(id).and_then(Value::as_message)
    }

    pub fn child_mut(&mut self, id: FieldId) -> Option<&mut TreeNode> {
        match self.slots.get_mut(&id) {
            Some(Slot::Single(value)) => value.as_message_mut(),
            Some(Slot::Repeated(_)) => panic!("singular accessor on repeated field {id}"),
            None => None,
        }
    }

    pub fn child_at(&self, id: FieldId, index: usize) -> Option<&TreeNode> {
        self.get_at(id, index).and_then(Value::as_message)
    }

    pub fn child_at_mut(&mut self, id: FieldId, index: usize) -> Option<&mut TreeNode> {
        match self.slots.get_mut(&id) {
            Some(Slot::Repeated(items)) => items.get_mut(index).and_then(Value::as_message_mut),
            Some(Slot::Single(_)) => panic!("indexed accessor on singular field {id}"),
            None => None,
        }
    }

    /// Disjoint borrow of two message elements of one repeated field:
    /// a mutable destination and a shared source, `dst < src`.
    pub fn repeated_pair_mut(
        &mut self,
        id: FieldId,
        dst: usize,
        src: usize,
    ) -> (&mut TreeNode, &TreeNode) {
        assert!(dst < src, "pair borrow requires dst < src");
        match self.slots.get_mut(&id) {
            Some(Slot::Repeated(items)) => {
                let (head, tail) = items.split_at_mut(src);
                let dst = head[dst]
                    .as_message_mut()
                    .expect("pair borrow on non-message element");
                let src = tail[0]
                    .as_message()
                    .expect("pair borrow on non-message element");
                (dst, src)
            }
            _ => panic!("pair borrow on empty repeated field {id}"),
        }
    }

    // ------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------

    /// Recursively true iff every reachable required field is set.
    pub fn is_initialized(&self) -> bool {
        for field in self.descriptor().fields() {
            let id = field.id();
            if field.is_required() && !self.slots.contains_key(&id) {
                return false;
            }
            if field.kind().is_message() {
                match field.cardinality() {
                    Cardinality::Repeated => {
                        for index in 0..self.len_of(id) {
                            let child = self.child_at(id, index).expect("dense repeated slot");
                            if !child.is_initialized() {
                                return false;
                            }
                        }
                    }
                    Cardinality::Singular => {
                        if let Some(child) = self.child(id) {
                            if !child.is_initialized() {
                                return false;
                            }
                        }
                    }
                }
            }
        }
        true
    }

    // ------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------

    fn repeated_kind(&self, id: FieldId) -> FieldKind {
        let field = self.field_descriptor(id);
        assert_eq!(
            field.cardinality(),
            Cardinality::Repeated,
            "indexed store on singular field {id}"
        );
        field.kind()
    }

    fn check_kind(&self, id: FieldId, kind: FieldKind, value: &Value) {
        assert!(
            value.conforms_to(kind, &self.schema),
            "value of wrong kind for field {id} in message {}",
            self.schema.message(self.type_id).name()
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
