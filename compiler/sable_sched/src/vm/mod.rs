//! The worker-private virtual machine seam.
//!
//! The instruction interpreter itself lives outside this core; workers
//! talk to it through [`MetaprogramVm`]. One VM per worker, never shared,
//! so no cross-thread locking exists anywhere on this boundary. The worker
//! polls (`step`), the VM returns finished items (`take_finished`) —
//! message passing, no callbacks.

mod memory;

pub use memory::{VmAddr, VmMemory};

use std::sync::Arc;

use rustc_hash::FxHashMap;

use sable_core::{CompilationUnit, MetaprogramId, SourceFile};
use sable_ir::{FuncId, NodeId, StrId, TypeId};

/// What triggered a metaprogram, and therefore what its result becomes.
#[derive(Clone, Debug)]
pub enum Directive {
    /// `#assert`: the result is a boolean; false is a user error.
    Assertion,
    /// `#run`: the decoded result replaces the directive node.
    Expression {
        placeholder: NodeId,
    },
    /// `#generate`: the result is source text spliced into `file`, which
    /// is then re-lexed.
    BodyText {
        file: Arc<SourceFile>,
    },
}

/// Compile-time code loaded into a worker's VM.
pub struct Metaprogram {
    pub id: MetaprogramId,
    pub unit: Arc<CompilationUnit>,
    pub directive: Directive,
}

/// How a metaprogram's execution ended.
#[derive(Clone, Debug)]
pub enum ExecutionOutcome {
    /// Result bytes live at `result_addr` in the VM's memory.
    Success {
        result_addr: VmAddr,
        result_type: TypeId,
    },
    Error {
        message: String,
    },
}

/// One metaprogram the VM reported finished during a step.
#[derive(Clone, Debug)]
pub struct FinishedMetaprogram {
    pub id: MetaprogramId,
    pub outcome: ExecutionOutcome,
}

/// The virtual machine, as the scheduler core sees it.
///
/// `step` advances all loaded metaprograms cooperatively; it never blocks
/// and never preempts. Implementations are `Send` so a worker can carry
/// its VM across its own thread, but they are never `Sync` by contract.
pub trait MetaprogramVm: Send {
    /// Install a metaprogram and acquire an execution slot for it.
    fn load_metaprogram(&mut self, id: MetaprogramId);

    /// Advance every loaded metaprogram by one cooperative slice.
    fn step(&mut self);

    /// Drain the metaprograms that finished during the latest steps.
    fn take_finished(&mut self) -> Vec<FinishedMetaprogram>;

    /// True when no loaded metaprogram remains unfinished.
    fn all_done(&self) -> bool;

    /// Release a finished metaprogram's execution-state slot.
    fn release_execution_slot(&mut self, id: MetaprogramId);

    /// The VM's addressable memory, for result decoding.
    fn memory_mut(&mut self) -> &mut VmMemory;
}

/// A function declaration addressable from VM memory.
#[derive(Clone, Debug)]
pub struct FunctionInfo {
    pub id: FuncId,
    pub name: StrId,
    pub ty: TypeId,
    /// Declaration node; decoding a function value without one is an
    /// internal invariant violation.
    pub declaration: Option<NodeId>,
}

/// Address-keyed table of functions the VM can hand back as values.
#[derive(Default)]
pub struct FunctionRegistry {
    by_address: FxHashMap<VmAddr, FunctionInfo>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function reachable at `address`.
    pub fn register(&mut self, address: VmAddr, info: FunctionInfo) {
        debug_assert_ne!(address, 0, "null is not a function address");
        self.by_address.insert(address, info);
    }

    /// Function at `address`, if registered.
    pub fn lookup(&self, address: VmAddr) -> Option<&FunctionInfo> {
        self.by_address.get(&address)
    }
}
