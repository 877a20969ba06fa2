//! AST node arena and builders.
//!
//! Nodes are stored append-only and addressed by [`NodeId`]. The builder
//! methods cover exactly the node shapes the metaprogram-result decoder
//! produces: scalar literals, comma lists, struct/array construction,
//! implicit casts, and type/function references.
//!
//! The arena also records directive substitutions: when a `#run` expression
//! finishes executing, the decoded replacement node is registered against
//! the directive's placeholder and later splices take it from here.

#[cfg(test)]
mod tests;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::interner::StrId;
use crate::span::Span;
use crate::types::TypeId;

/// Handle to a node in the arena.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Raw index value.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Handle to a function declaration known to the compiler.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct FuncId(pub u32);

/// Kind tag carried by implicit cast nodes synthesized by the decoder.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum CastKind {
    /// Underlying representation converted back to its opaque wrapper.
    OpaqueConversion,
    /// Fixed-array construction viewed as a slice.
    FixedArrayToSlice,
}

/// Child list storage; most constructions have a handful of members.
pub type NodeList = SmallVec<[NodeId; 4]>;

/// Closed sum over node shapes.
#[derive(Clone, PartialEq, Debug)]
pub enum NodeKind {
    /// Integer literal; raw little-endian bits, interpreted per the node's
    /// type (signedness, width).
    IntLiteral { bits: u64 },
    BoolLiteral { value: bool },
    RealLiteral { value: f64 },
    StringLiteral { value: StrId },
    /// Comma-separated expression list (tuple results).
    CommaList { items: NodeList },
    /// Struct construction; a `None` slot is an inactive union member.
    StructCtor { args: Vec<Option<NodeId>> },
    ArrayCtor { items: NodeList },
    ImplicitCast { cast: CastKind, operand: NodeId },
    /// Reference to a type value.
    TypeRef { referenced: TypeId },
    /// Reference to a declared function.
    FuncRef { func: FuncId },
    /// Named declaration stub (enough of a declaration for references to
    /// point at).
    Declaration { name: StrId },
    /// A compile-time execution directive awaiting substitution.
    RunDirective,
}

/// One node: shape, type, and source location.
#[derive(Clone, PartialEq, Debug)]
pub struct Node {
    pub kind: NodeKind,
    pub ty: TypeId,
    pub span: Span,
}

/// Append-only node storage.
///
/// Not internally synchronized; the compiler context wraps it in a lock.
pub struct AstArena {
    nodes: Vec<Node>,
    substitutions: FxHashMap<NodeId, NodeId>,
}

impl AstArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        AstArena {
            nodes: Vec::with_capacity(64),
            substitutions: FxHashMap::default(),
        }
    }

    fn push(&mut self, kind: NodeKind, ty: TypeId, span: Span) -> NodeId {
        let raw = u32::try_from(self.nodes.len())
            .unwrap_or_else(|_| unreachable!("AST arena exceeded u32::MAX nodes"));
        self.nodes.push(Node { kind, ty, span });
        NodeId(raw)
    }

    /// Look up a node.
    ///
    /// # Panics
    /// Panics if the handle was not issued by this arena.
    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    /// Number of nodes allocated.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no node has been allocated.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // === Builders ===

    /// Integer literal from raw bits; `ty` decides signedness and width.
    pub fn int_literal(&mut self, ty: TypeId, bits: u64, span: Span) -> NodeId {
        self.push(NodeKind::IntLiteral { bits }, ty, span)
    }

    pub fn bool_literal(&mut self, value: bool, span: Span) -> NodeId {
        self.push(NodeKind::BoolLiteral { value }, TypeId::BOOL, span)
    }

    pub fn real_literal(&mut self, ty: TypeId, value: f64, span: Span) -> NodeId {
        self.push(NodeKind::RealLiteral { value }, ty, span)
    }

    pub fn string_literal(&mut self, value: StrId, span: Span) -> NodeId {
        self.push(NodeKind::StringLiteral { value }, TypeId::STR, span)
    }

    /// Comma list combining already-built items.
    pub fn comma_list(&mut self, ty: TypeId, items: NodeList, span: Span) -> NodeId {
        self.push(NodeKind::CommaList { items }, ty, span)
    }

    /// Struct construction; an inactive union slot is `None`.
    pub fn struct_ctor(&mut self, ty: TypeId, args: Vec<Option<NodeId>>, span: Span) -> NodeId {
        self.push(NodeKind::StructCtor { args }, ty, span)
    }

    pub fn array_ctor(&mut self, ty: TypeId, items: NodeList, span: Span) -> NodeId {
        self.push(NodeKind::ArrayCtor { items }, ty, span)
    }

    /// Implicit cast of `operand` to `ty`, tagged with why it exists.
    pub fn implicit_cast(
        &mut self,
        ty: TypeId,
        cast: CastKind,
        operand: NodeId,
        span: Span,
    ) -> NodeId {
        self.push(NodeKind::ImplicitCast { cast, operand }, ty, span)
    }

    pub fn type_ref(&mut self, referenced: TypeId, span: Span) -> NodeId {
        self.push(NodeKind::TypeRef { referenced }, TypeId::TYPE, span)
    }

    pub fn func_ref(&mut self, ty: TypeId, func: FuncId, span: Span) -> NodeId {
        self.push(NodeKind::FuncRef { func }, ty, span)
    }

    pub fn declaration(&mut self, ty: TypeId, name: StrId, span: Span) -> NodeId {
        self.push(NodeKind::Declaration { name }, ty, span)
    }

    /// Placeholder for a compile-time execution directive; substituted once
    /// its metaprogram finishes.
    pub fn run_directive(&mut self, ty: TypeId, span: Span) -> NodeId {
        self.push(NodeKind::RunDirective, ty, span)
    }

    // === Substitutions ===

    /// Record the decoded replacement for a directive placeholder.
    pub fn substitute(&mut self, placeholder: NodeId, replacement: NodeId) {
        debug_assert!(
            matches!(self.node(placeholder).kind, NodeKind::RunDirective),
            "substitution target must be a run directive"
        );
        self.substitutions.insert(placeholder, replacement);
    }

    /// Replacement registered for a placeholder, if its metaprogram has
    /// finished.
    pub fn substitution_for(&self, placeholder: NodeId) -> Option<NodeId> {
        self.substitutions.get(&placeholder).copied()
    }
}

impl Default for AstArena {
    fn default() -> Self {
        Self::new()
    }
}
