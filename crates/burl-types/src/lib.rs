//! # burl-types: Schema descriptors and dynamic tree values
//!
//! This crate defines the data model the `burl` mutation engine operates on:
//!
//! - **Descriptors**: per-field metadata (kind, cardinality, required-ness,
//!   oneof membership, enum domain, child message type) collected into a
//!   [`Schema`] registry built through [`SchemaBuilder`].
//! - **Values**: [`TreeNode`], a dynamic message value constrained by its
//!   descriptor, with the reflection operations the engine needs (presence,
//!   repeated-slot editing, child access, recursive initialization checks).
//!
//! ## Model
//!
//! A tree node is a mapping from field id to field value. Each field is bound
//! by its descriptor to a scalar kind, an enum, a nested message, or a
//! repeated sequence of one of those. Scalar and singular fields carry
//! presence; repeated fields always exist as a possibly-empty dense sequence;
//! a singular message child is exclusively owned by its parent. A node may
//! declare *oneof groups*: named subsets of singular fields of which at most
//! one may be active, enforced by the store operations themselves.
//!
//! ## Quick Start
//!
//! ```
//! use burl_types::{FieldKind, SchemaBuilder, TreeNode, Value};
//!
//! let mut builder = SchemaBuilder::new();
//! let root = builder.add_message("Root");
//! builder
//!     .message(root)
//!     .singular(1, "id", FieldKind::U64)
//!     .repeated(2, "tags", FieldKind::Str);
//! let schema = builder.finish().unwrap();
//!
//! let mut node = TreeNode::new(schema, root);
//! node.set(1.into(), Value::U64(7));
//! assert!(node.has(1.into()));
//! assert_eq!(node.len_of(2.into()), 0);
//! ```

mod schema;
mod tree;

pub use schema::{
    Cardinality, EnumDescriptor, EnumTypeId, FieldDescriptor, FieldId, FieldKind,
    MessageDescriptor, MessageFields, MessageTypeId, OneofDescriptor, OneofIndex, Schema,
    SchemaBuilder, SchemaError,
};
pub use tree::{TreeNode, Value};
