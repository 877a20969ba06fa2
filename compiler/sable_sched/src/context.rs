//! Compiler-wide shared state.
//!
//! One [`CompilerContext`] lives for the whole compilation and is shared
//! by every worker. The scheduler and the trait-object seams are lock-free
//! from the outside; the mutable pools (types, AST, function registry) sit
//! behind their own locks and are only held for the short decode window
//! when a metaprogram result comes back.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use sable_core::{MetaprogramId, Workspace};
use sable_ir::{AstArena, SharedInterner, TypePool};

use crate::deps::{DependencyManager, PhaseRunner};
use crate::scheduler::Scheduler;
use crate::stats::GlobalStats;
use crate::vm::{FunctionRegistry, Metaprogram, MetaprogramVm};

/// Builder of worker-private virtual machines.
///
/// Workers create their VM lazily, on the first metaprogram they execute;
/// most workers in a compilation without compile-time code never pay for
/// one.
pub type VmFactory = Arc<dyn Fn() -> Box<dyn MetaprogramVm> + Send + Sync>;

/// Everything a worker needs, shared across the pool.
pub struct CompilerContext {
    pub scheduler: Scheduler,
    pub deps: Arc<dyn DependencyManager>,
    pub phases: Arc<dyn PhaseRunner>,
    pub interner: SharedInterner,
    pub types: Mutex<TypePool>,
    pub arena: Mutex<AstArena>,
    pub functions: RwLock<FunctionRegistry>,
    /// Metaprograms handed out for execution, keyed by id until their
    /// result comes back.
    metaprograms: Mutex<FxHashMap<MetaprogramId, Arc<Metaprogram>>>,
    vm_factory: VmFactory,
    parallel: bool,
    pub stats: Mutex<GlobalStats>,
}

impl CompilerContext {
    pub fn new(
        deps: Arc<dyn DependencyManager>,
        phases: Arc<dyn PhaseRunner>,
        default_workspace: Arc<Workspace>,
        interner: SharedInterner,
        vm_factory: VmFactory,
        parallel: bool,
    ) -> Self {
        CompilerContext {
            scheduler: Scheduler::new(Arc::clone(&deps), default_workspace),
            deps,
            phases,
            interner,
            types: Mutex::new(TypePool::new()),
            arena: Mutex::new(AstArena::new()),
            functions: RwLock::new(FunctionRegistry::new()),
            metaprograms: Mutex::new(FxHashMap::default()),
            vm_factory,
            parallel,
            stats: Mutex::new(GlobalStats::default()),
        }
    }

    /// Whether the pool runs on real threads. Single-threaded drivers
    /// interleave workers by hand and must never busy-sleep.
    #[inline]
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Build a fresh worker-private VM.
    pub fn new_vm(&self) -> Box<dyn MetaprogramVm> {
        (self.vm_factory)()
    }

    /// Register a metaprogram about to be executed.
    pub fn register_metaprogram(&self, metaprogram: Metaprogram) {
        let previous = self
            .metaprograms
            .lock()
            .insert(metaprogram.id, Arc::new(metaprogram));
        debug_assert!(previous.is_none(), "metaprogram id registered twice");
    }

    /// Look up a registered metaprogram.
    pub fn metaprogram(&self, id: MetaprogramId) -> Option<Arc<Metaprogram>> {
        self.metaprograms.lock().get(&id).cloned()
    }

    /// Remove a metaprogram whose execution finished.
    pub(crate) fn take_metaprogram(&self, id: MetaprogramId) -> Option<Arc<Metaprogram>> {
        self.metaprograms.lock().remove(&id)
    }
}
