//! # burl: structure-aware mutation for schema-typed tree values
//!
//! `burl` is the mutation and crossover core of a coverage-guided fuzzer for
//! inputs whose shape is fixed by a schema. Given a tree value, one call to
//! [`Mutator::mutate`] applies a single random structural mutation; one call
//! to [`Mutator::cross_over`] produces an offspring by recombining two
//! same-schema parents. Unlike byte-level mutators, every output is again a
//! valid value of the schema, optionally with required-field completeness
//! restored.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Mutator                             │
//! │  ┌────────────┐  ┌─────────────────────┐  ┌───────────────┐  │
//! │  │ EngineRng  │  │ MutationSampler     │  │ Scalar        │  │
//! │  │ (seeded)   │  │ DataSourceSampler   │  │ kernels       │  │
//! │  └────────────┘  └──────────┬──────────┘  └───────────────┘  │
//! │                             │ weighted reservoir             │
//! │                  ┌──────────┴──────────┐                     │
//! │                  │ FieldRef (typed     │                     │
//! │                  │ slot transformations)│                    │
//! │                  └─────────────────────┘                     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! One traversal streams every legal `(slot, transformation)` candidate
//! through a weighted reservoir; the winner is applied through a typed
//! dispatch over the closed field-kind set. A post-pass re-fills required
//! fields when `keep_initialized` is set.
//!
//! ## Quick Start
//!
//! ```
//! use burl::{FieldKind, Mutator, SchemaBuilder, TreeNode, Value};
//!
//! let mut builder = SchemaBuilder::new();
//! let root = builder.add_message("Packet");
//! builder
//!     .message(root)
//!     .singular(1, "version", FieldKind::U32)
//!     .repeated(2, "payload", FieldKind::Str);
//! let schema = builder.finish().unwrap();
//!
//! let mut tree = TreeNode::new(schema, root);
//! tree.set(1.into(), Value::U32(1));
//!
//! let mut mutator = Mutator::new(42);
//! for _ in 0..100 {
//!     mutator.mutate(&mut tree, 1024);
//! }
//! ```
//!
//! ## Determinism
//!
//! The engine owns a seeded random source and nothing else mutates it: the
//! result of a call is a function of the seed state, the input tree, and the
//! options. Engines are single-threaded; run one engine per thread for
//! parallel fuzzing.

mod field;
mod kernels;
mod mutator;
mod reservoir;
mod rng;
mod sampler;

#[cfg(test)]
mod tests;

pub use kernels::{
    mutate_bool, mutate_enum, mutate_f32, mutate_f64, mutate_i32, mutate_i64, mutate_str,
    mutate_u32, mutate_u64,
};
pub use mutator::Mutator;
pub use rng::EngineRng;

// Re-export the data model so engine users need a single dependency.
pub use burl_types::{
    Cardinality, EnumDescriptor, EnumTypeId, FieldDescriptor, FieldId, FieldKind,
    MessageDescriptor, MessageFields, MessageTypeId, OneofDescriptor, OneofIndex, Schema,
    SchemaBuilder, SchemaError, TreeNode, Value,
};

use serde::{Deserialize, Serialize};

// ============================================================================
// Configuration
// ============================================================================

/// Engine options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutatorConfig {
    /// Seed for the deterministic random source.
    pub seed: u32,
    /// Re-establish required-field completeness after every call.
    pub keep_initialized: bool,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            keep_initialized: false,
        }
    }
}

impl MutatorConfig {
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_keep_initialized(mut self, keep_initialized: bool) -> Self {
        self.keep_initialized = keep_initialized;
        self
    }
}
