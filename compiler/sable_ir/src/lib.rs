//! Sable IR - AST arena, type pool, and string interning.
//!
//! This crate holds the data structures the rest of the compiler hangs work
//! off of:
//!
//! - [`AstArena`]: append-only node storage addressed by [`NodeId`] handles,
//!   with builder methods for every literal and construction node the
//!   metaprogram-result decoder can produce
//! - [`TypePool`]: append-only type storage addressed by [`TypeId`] handles,
//!   with byte-layout computation for composite types
//! - [`Interner`]: thread-safe string interning for identifiers and decoded
//!   string results
//!
//! Handles are dense `u32` indices. Equality on a handle is equality on the
//! thing it denotes; no structural comparison happens after construction.

mod ast;
mod interner;
mod span;
mod types;

pub use ast::{AstArena, CastKind, FuncId, Node, NodeId, NodeKind, NodeList};
pub use interner::{Interner, SharedInterner, StrId};
pub use span::Span;
pub use types::{FloatWidth, IntWidth, Member, TypeId, TypeKind, TypePool};
