//! Wait conditions for suspended units.

use sable_ir::{Interner, NodeId, StrId, TypeId};

use crate::file::FileId;
use crate::unit::MetaprogramId;

/// The explicit, inspectable reason a unit cannot proceed yet.
///
/// Recorded by the worker when a phase handler suspends; consumed by the
/// dependency manager, which re-enqueues the unit once the condition
/// resolves.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum WaitCondition {
    /// Waiting for a type to finish validation.
    OnType(TypeId),
    /// Waiting for a declaration to finish validation.
    OnDeclaration(NodeId),
    /// Waiting for an as-yet-unknown symbol to appear.
    OnSymbol(StrId),
    /// Waiting for an operator overload to be declared.
    OnOperator(StrId),
    /// Waiting for a metaprogram to finish executing.
    OnMetaprogram(MetaprogramId),
    /// Waiting for IR to be generated for a declaration.
    OnIr(NodeId),
    /// Waiting for a compiler message to be acknowledged.
    OnMessage,
    /// Waiting for a file to finish loading.
    OnFileLoad(FileId),
    /// Waiting for a file to finish lexing.
    OnFileLex(FileId),
    /// Waiting for a file to finish parsing.
    OnFileParse(FileId),
}

impl WaitCondition {
    /// Human-readable description, for diagnostics about stuck units.
    pub fn describe(&self, interner: &Interner) -> String {
        match self {
            WaitCondition::OnType(ty) => format!("waiting on type #{}", ty.raw()),
            WaitCondition::OnDeclaration(node) => {
                format!("waiting on declaration #{}", node.raw())
            }
            WaitCondition::OnSymbol(name) => {
                format!("waiting on symbol '{}'", interner.resolve(*name))
            }
            WaitCondition::OnOperator(name) => {
                format!("waiting on operator '{}'", interner.resolve(*name))
            }
            WaitCondition::OnMetaprogram(mp) => format!("waiting on metaprogram #{}", mp.0),
            WaitCondition::OnIr(node) => format!("waiting on IR for #{}", node.raw()),
            WaitCondition::OnMessage => "waiting on message".to_owned(),
            WaitCondition::OnFileLoad(file) => format!("waiting on load of file #{}", file.0),
            WaitCondition::OnFileLex(file) => format!("waiting on lexing of file #{}", file.0),
            WaitCondition::OnFileParse(file) => {
                format!("waiting on parsing of file #{}", file.0)
            }
        }
    }
}
