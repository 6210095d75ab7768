//! Schema descriptors: per-field metadata and the type registry.
//!
//! Descriptors are immutable after construction. A [`Schema`] owns every
//! message and enum descriptor of one type universe; fields reference other
//! types by index ([`MessageTypeId`], [`EnumTypeId`]), which keeps recursive
//! message types representable and makes type identity a cheap id compare.

use std::fmt::{self, Display};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

// ============================================================================
// Identifiers - All Copy (cheap index/tag values)
// ============================================================================

/// Identifies a field within its enclosing message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FieldId(u32);

impl FieldId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for FieldId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Index of a message descriptor inside its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageTypeId(usize);

impl MessageTypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of an enum descriptor inside its [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EnumTypeId(usize);

impl EnumTypeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Index of a oneof group inside its message descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OneofIndex(usize);

impl OneofIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

// ============================================================================
// Field Metadata
// ============================================================================

/// The closed set of value categories a field can hold.
///
/// Enum and message kinds carry the concrete type they reference, so kind
/// equality is full type equality within one schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    I32,
    I64,
    U32,
    U64,
    F32,
    F64,
    Bool,
    /// Byte string. Mutations operate on raw bytes, so values are not
    /// required to be valid UTF-8.
    Str,
    Enum(EnumTypeId),
    Message(MessageTypeId),
}

impl FieldKind {
    pub fn is_message(self) -> bool {
        matches!(self, FieldKind::Message(_))
    }
}

/// Whether a field holds one value or an ordered sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    Singular,
    Repeated,
}

/// Metadata for a single declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    id: FieldId,
    name: String,
    kind: FieldKind,
    cardinality: Cardinality,
    required: bool,
    oneof: Option<OneofIndex>,
}

impl FieldDescriptor {
    pub fn id(&self) -> FieldId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn is_repeated(&self) -> bool {
        self.cardinality == Cardinality::Repeated
    }

    /// A required field must be set for the enclosing node to be initialized.
    pub fn is_required(&self) -> bool {
        self.required
    }

    /// The oneof group this field belongs to, if any. Oneof members are
    /// always singular and never required.
    pub fn oneof(&self) -> Option<OneofIndex> {
        self.oneof
    }
}

/// A named group of singular fields of which at most one may be active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneofDescriptor {
    name: String,
    members: Vec<FieldId>,
}

impl OneofDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member field ids in declaration order.
    pub fn members(&self) -> &[FieldId] {
        &self.members
    }
}

/// An enum domain: a closed, ordered set of named values.
///
/// Values are addressed by index in `[0, value_count)`. The builder rejects
/// domains with fewer than two values; the enum mutation kernel requires a
/// move to a different value, which a one-value domain cannot satisfy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDescriptor {
    name: String,
    values: Vec<String>,
}

impl EnumDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_count(&self) -> u32 {
        self.values.len() as u32
    }

    pub fn value_name(&self, index: u32) -> Option<&str> {
        self.values.get(index as usize).map(String::as_str)
    }
}

/// Metadata for one message type: its fields in declaration order plus its
/// oneof groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<OneofDescriptor>,
}

impl MessageDescriptor {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in declaration order. Traversals over a node follow
    /// this order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, id: FieldId) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn oneof(&self, index: OneofIndex) -> &OneofDescriptor {
        &self.oneofs[index.0]
    }

    pub fn oneofs(&self) -> &[OneofDescriptor] {
        &self.oneofs
    }
}

// ============================================================================
// Schema Registry
// ============================================================================

/// An immutable registry of message and enum descriptors.
///
/// Built once through [`SchemaBuilder`] and shared behind an [`Arc`]; every
/// tree value holds a handle to the schema it was built from. Type identity
/// is id equality within one registry.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    messages: Vec<MessageDescriptor>,
    enums: Vec<EnumDescriptor>,
}

impl Schema {
    pub fn message(&self, id: MessageTypeId) -> &MessageDescriptor {
        &self.messages[id.0]
    }

    pub fn enum_type(&self, id: EnumTypeId) -> &EnumDescriptor {
        &self.enums[id.0]
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Validation failures reported by [`SchemaBuilder::finish`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum SchemaError {
    #[error("message {message}: duplicate field id {id}")]
    DuplicateFieldId { message: String, id: FieldId },

    #[error("enum {name} must declare at least two values")]
    DegenerateEnum { name: String },

    #[error("message {message}: field {id} references an undeclared message type")]
    UnknownMessageType { message: String, id: FieldId },

    #[error("message {message}: field {id} references an undeclared enum type")]
    UnknownEnumType { message: String, id: FieldId },

    #[error("message {message}: oneof {oneof} has no members")]
    EmptyOneof { message: String, oneof: String },
}

// ============================================================================
// Builder
// ============================================================================

struct MessageDraft {
    name: String,
    fields: Vec<FieldDescriptor>,
    oneofs: Vec<OneofDescriptor>,
}

/// Builds a [`Schema`].
///
/// Message types are declared up front with [`add_message`], which makes
/// mutually recursive message fields straightforward: declare all types,
/// then fill in fields referencing any declared id.
///
/// [`add_message`]: SchemaBuilder::add_message
pub struct SchemaBuilder {
    messages: Vec<MessageDraft>,
    enums: Vec<EnumDescriptor>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            enums: Vec::new(),
        }
    }

    /// Declares a message type and returns its id. Fields are added through
    /// [`message`](SchemaBuilder::message).
    pub fn add_message(&mut self, name: &str) -> MessageTypeId {
        self.messages.push(MessageDraft {
            name: name.to_string(),
            fields: Vec::new(),
            oneofs: Vec::new(),
        });
        MessageTypeId(self.messages.len() - 1)
    }

    /// Declares an enum domain and returns its id.
    pub fn add_enum(&mut self, name: &str, values: &[&str]) -> EnumTypeId {
        self.enums.push(EnumDescriptor {
            name: name.to_string(),
            values: values.iter().map(|v| (*v).to_string()).collect(),
        });
        EnumTypeId(self.enums.len() - 1)
    }

    /// Returns a field-adding view of a declared message.
    pub fn message(&mut self, id: MessageTypeId) -> MessageFields<'_> {
        MessageFields {
            draft: &mut self.messages[id.0],
        }
    }

    /// Validates the declarations and produces the immutable registry.
    pub fn finish(self) -> Result<Arc<Schema>, SchemaError> {
        for e in &self.enums {
            if e.values.len() < 2 {
                return Err(SchemaError::DegenerateEnum {
                    name: e.name.clone(),
                });
            }
        }

        let message_count = self.messages.len();
        let enum_count = self.enums.len();
        for draft in &self.messages {
            for (i, field) in draft.fields.iter().enumerate() {
                if draft.fields[..i].iter().any(|f| f.id == field.id) {
                    return Err(SchemaError::DuplicateFieldId {
                        message: draft.name.clone(),
                        id: field.id,
                    });
                }
                match field.kind {
                    FieldKind::Message(m) if m.0 >= message_count => {
                        return Err(SchemaError::UnknownMessageType {
                            message: draft.name.clone(),
                            id: field.id,
                        });
                    }
                    FieldKind::Enum(e) if e.0 >= enum_count => {
                        return Err(SchemaError::UnknownEnumType {
                            message: draft.name.clone(),
                            id: field.id,
                        });
                    }
                    _ => {}
                }
            }
            for oneof in &draft.oneofs {
                if oneof.members.is_empty() {
                    return Err(SchemaError::EmptyOneof {
                        message: draft.name.clone(),
                        oneof: oneof.name.clone(),
                    });
                }
            }
        }

        Ok(Arc::new(Schema {
            messages: self
                .messages
                .into_iter()
                .map(|d| MessageDescriptor {
                    name: d.name,
                    fields: d.fields,
                    oneofs: d.oneofs,
                })
                .collect(),
            enums: self.enums,
        }))
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Field-adding view of one message draft. Methods chain.
pub struct MessageFields<'a> {
    draft: &'a mut MessageDraft,
}

impl MessageFields<'_> {
    /// Adds an optional singular field.
    pub fn singular(&mut self, id: u32, name: &str, kind: FieldKind) -> &mut Self {
        self.push(id, name, kind, Cardinality::Singular, false, None);
        self
    }

    /// Adds a required singular field.
    pub fn required(&mut self, id: u32, name: &str, kind: FieldKind) -> &mut Self {
        self.push(id, name, kind, Cardinality::Singular, true, None);
        self
    }

    /// Adds a repeated field.
    pub fn repeated(&mut self, id: u32, name: &str, kind: FieldKind) -> &mut Self {
        self.push(id, name, kind, Cardinality::Repeated, false, None);
        self
    }

    /// Adds a oneof group. Members are singular, never required.
    pub fn oneof(&mut self, name: &str, members: &[(u32, &str, FieldKind)]) -> &mut Self {
        let index = OneofIndex(self.draft.oneofs.len());
        self.draft.oneofs.push(OneofDescriptor {
            name: name.to_string(),
            members: members.iter().map(|(id, _, _)| FieldId(*id)).collect(),
        });
        for (id, name, kind) in members {
            self.push(*id, name, *kind, Cardinality::Singular, false, Some(index));
        }
        self
    }

    fn push(
        &mut self,
        id: u32,
        name: &str,
        kind: FieldKind,
        cardinality: Cardinality,
        required: bool,
        oneof: Option<OneofIndex>,
    ) {
        self.draft.fields.push(FieldDescriptor {
            id: FieldId(id),
            name: name.to_string(),
            kind,
            cardinality,
            required,
            oneof,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
