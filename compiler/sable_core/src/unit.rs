//! Compilation units and their reason-for-being.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use sable_ir::{NodeId, TypeId};

use crate::file::SourceFile;
use crate::wait::WaitCondition;
use crate::workspace::Workspace;

/// Handle to a compilation unit.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct UnitId(pub u32);

/// Handle to a metaprogram loaded into a worker's VM.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct MetaprogramId(pub u32);

/// Handle to a program being linked.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(transparent)]
pub struct ProgramId(pub u32);

/// The phase a unit currently needs performed.
///
/// The declaration order is the scheduler's fixed queue priority order:
/// earlier phases are always preferred by any worker able to run them.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ReasonForBeing {
    LoadFile,
    LexFile,
    ParseFile,
    TypeCheck,
    GenerateIr,
    /// IR for a metaprogram entry point; shares a queue with `GenerateIr`.
    GenerateIrForMetaprogram,
    Execute,
    GenerateMachineCode,
    LinkProgram,
    SendMessage,
    /// Convert a node to reflection data.
    ConvertNode,
    CreateTypeInitFunction,
    ComputeTypeSize,
}

/// Number of scheduler queues. `GenerateIr` and `GenerateIrForMetaprogram`
/// share one, so this is one less than the number of reasons.
pub const QUEUE_COUNT: usize = 12;

impl ReasonForBeing {
    /// All reasons, in queue priority order.
    pub const ALL: [ReasonForBeing; 13] = [
        ReasonForBeing::LoadFile,
        ReasonForBeing::LexFile,
        ReasonForBeing::ParseFile,
        ReasonForBeing::TypeCheck,
        ReasonForBeing::GenerateIr,
        ReasonForBeing::GenerateIrForMetaprogram,
        ReasonForBeing::Execute,
        ReasonForBeing::GenerateMachineCode,
        ReasonForBeing::LinkProgram,
        ReasonForBeing::SendMessage,
        ReasonForBeing::ConvertNode,
        ReasonForBeing::CreateTypeInitFunction,
        ReasonForBeing::ComputeTypeSize,
    ];

    /// Fixed, injective mapping from reason to scheduler queue index.
    #[inline]
    pub const fn queue_index(self) -> usize {
        match self {
            ReasonForBeing::LoadFile => 0,
            ReasonForBeing::LexFile => 1,
            ReasonForBeing::ParseFile => 2,
            ReasonForBeing::TypeCheck => 3,
            ReasonForBeing::GenerateIr | ReasonForBeing::GenerateIrForMetaprogram => 4,
            ReasonForBeing::Execute => 5,
            ReasonForBeing::GenerateMachineCode => 6,
            ReasonForBeing::LinkProgram => 7,
            ReasonForBeing::SendMessage => 8,
            ReasonForBeing::ConvertNode => 9,
            ReasonForBeing::CreateTypeInitFunction => 10,
            ReasonForBeing::ComputeTypeSize => 11,
        }
    }

    /// Short name for logs and statistics.
    pub const fn describe(self) -> &'static str {
        match self {
            ReasonForBeing::LoadFile => "load file",
            ReasonForBeing::LexFile => "lex file",
            ReasonForBeing::ParseFile => "parse file",
            ReasonForBeing::TypeCheck => "type-check",
            ReasonForBeing::GenerateIr => "generate IR",
            ReasonForBeing::GenerateIrForMetaprogram => "generate IR (metaprogram)",
            ReasonForBeing::Execute => "execute",
            ReasonForBeing::GenerateMachineCode => "generate machine code",
            ReasonForBeing::LinkProgram => "link program",
            ReasonForBeing::SendMessage => "send message",
            ReasonForBeing::ConvertNode => "convert node",
            ReasonForBeing::CreateTypeInitFunction => "create type-init function",
            ReasonForBeing::ComputeTypeSize => "compute type size",
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL[value as usize]
    }
}

/// Observable lifecycle state of a unit.
///
/// Forward-only within one scheduling round: `Queued → InProgress → {Done,
/// Suspended}`. A suspended unit re-enters `Queued` only through the
/// dependency manager. `Cancelled` is terminal and reached only through
/// workspace cancellation.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum UnitState {
    Queued = 0,
    InProgress = 1,
    Done = 2,
    Suspended = 3,
    Cancelled = 4,
}

impl UnitState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => UnitState::Queued,
            1 => UnitState::InProgress,
            2 => UnitState::Done,
            3 => UnitState::Suspended,
            4 => UnitState::Cancelled,
            other => unreachable!("invalid unit state tag {other}"),
        }
    }

    fn may_become(self, next: UnitState) -> bool {
        matches!(
            (self, next),
            (UnitState::Queued, UnitState::InProgress)
                | (UnitState::Queued, UnitState::Cancelled)
                | (UnitState::InProgress, UnitState::Done)
                | (UnitState::InProgress, UnitState::Suspended)
                | (UnitState::Suspended, UnitState::Queued)
        )
    }
}

/// Payload a unit operates on; which variant is populated follows from the
/// reason-for-being.
#[derive(Clone, Debug)]
pub enum UnitPayload {
    None,
    File(Arc<SourceFile>),
    Node(NodeId),
    Type(TypeId),
    Program(ProgramId),
    Metaprogram(MetaprogramId),
}

/// The smallest schedulable piece of work.
///
/// Owned by exactly one workspace; appears in at most one scheduler queue
/// at a time. The unit outlives any `Task` wrapping it and may be
/// re-wrapped later when the dependency manager re-enqueues it.
pub struct CompilationUnit {
    id: UnitId,
    workspace: Arc<Workspace>,
    reason: AtomicU8,
    state: AtomicU8,
    payload: UnitPayload,
    wait: Mutex<Option<WaitCondition>>,
    /// How many times this unit has been re-queued while waiting.
    cycle: AtomicU32,
}

impl CompilationUnit {
    /// Create a unit in the `Queued` state.
    pub fn new(
        id: UnitId,
        workspace: Arc<Workspace>,
        reason: ReasonForBeing,
        payload: UnitPayload,
    ) -> Arc<Self> {
        Arc::new(CompilationUnit {
            id,
            workspace,
            reason: AtomicU8::new(reason as u8),
            state: AtomicU8::new(UnitState::Queued as u8),
            payload,
            wait: Mutex::new(None),
            cycle: AtomicU32::new(0),
        })
    }

    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[inline]
    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    /// Current reason-for-being; determines the scheduler queue.
    #[inline]
    pub fn reason(&self) -> ReasonForBeing {
        ReasonForBeing::from_u8(self.reason.load(Ordering::Acquire))
    }

    /// Retarget the unit at another phase (dependency manager only).
    pub fn set_reason(&self, reason: ReasonForBeing) {
        self.reason.store(reason as u8, Ordering::Release);
    }

    #[inline]
    pub fn state(&self) -> UnitState {
        UnitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Advance the unit's state.
    ///
    /// Illegal transitions are compiler bugs and abort in debug builds.
    pub fn transition(&self, next: UnitState) {
        let previous = UnitState::from_u8(self.state.swap(next as u8, Ordering::AcqRel));
        debug_assert!(
            previous.may_become(next),
            "illegal unit state transition {previous:?} -> {next:?}"
        );
    }

    #[inline]
    pub fn payload(&self) -> &UnitPayload {
        &self.payload
    }

    /// File payload, for the load/lex/parse phases.
    pub fn file(&self) -> Option<&Arc<SourceFile>> {
        match &self.payload {
            UnitPayload::File(file) => Some(file),
            _ => None,
        }
    }

    /// Metaprogram payload, for the execute phase.
    pub fn metaprogram(&self) -> Option<MetaprogramId> {
        match &self.payload {
            UnitPayload::Metaprogram(mp) => Some(*mp),
            _ => None,
        }
    }

    /// Record why the unit is suspended.
    pub fn set_wait(&self, condition: WaitCondition) {
        *self.wait.lock() = Some(condition);
    }

    /// Clear and return the recorded wait condition.
    pub fn take_wait(&self) -> Option<WaitCondition> {
        self.wait.lock().take()
    }

    /// Bump and return the re-queue cycle counter.
    pub fn bump_cycle(&self) -> u32 {
        self.cycle.fetch_add(1, Ordering::AcqRel) + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(reason: ReasonForBeing) -> Arc<CompilationUnit> {
        let ws = Arc::new(Workspace::new("test"));
        CompilationUnit::new(UnitId(0), ws, reason, UnitPayload::None)
    }

    #[test]
    fn queue_index_is_injective_over_queues() {
        let mut seen = [false; QUEUE_COUNT];
        for reason in ReasonForBeing::ALL {
            seen[reason.queue_index()] = true;
        }
        assert!(seen.iter().all(|&s| s));
        // The only shared queue is the IR one.
        assert_eq!(
            ReasonForBeing::GenerateIr.queue_index(),
            ReasonForBeing::GenerateIrForMetaprogram.queue_index()
        );
    }

    #[test]
    fn priority_follows_declaration_order() {
        assert!(
            ReasonForBeing::LexFile.queue_index() < ReasonForBeing::TypeCheck.queue_index()
        );
        assert!(
            ReasonForBeing::Execute.queue_index()
                < ReasonForBeing::GenerateMachineCode.queue_index()
        );
    }

    #[test]
    fn file_payload_is_debug_formattable() {
        let file = Arc::new(crate::file::SourceFile::new(crate::file::FileId(3), "main.sb"));
        file.load_buffer("secret := 1\n");
        let rendered = format!("{:?}", UnitPayload::File(file));
        assert!(rendered.contains("main.sb"));
        // The buffer itself stays out of the debug output.
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn lifecycle_advances_forward() {
        let unit = unit(ReasonForBeing::TypeCheck);
        assert_eq!(unit.state(), UnitState::Queued);
        unit.transition(UnitState::InProgress);
        unit.transition(UnitState::Suspended);
        // Re-enqueue through the dependency manager.
        unit.transition(UnitState::Queued);
        unit.transition(UnitState::InProgress);
        unit.transition(UnitState::Done);
        assert_eq!(unit.state(), UnitState::Done);
    }

    #[test]
    #[should_panic(expected = "illegal unit state transition")]
    #[cfg(debug_assertions)]
    fn done_unit_cannot_restart() {
        let unit = unit(ReasonForBeing::TypeCheck);
        unit.transition(UnitState::InProgress);
        unit.transition(UnitState::Done);
        unit.transition(UnitState::InProgress);
    }

    #[test]
    fn wait_condition_round_trip() {
        let unit = unit(ReasonForBeing::TypeCheck);
        assert!(unit.take_wait().is_none());
        unit.set_wait(WaitCondition::OnMessage);
        assert!(matches!(unit.take_wait(), Some(WaitCondition::OnMessage)));
        assert!(unit.take_wait().is_none());
    }

    #[test]
    fn cycle_counter_increments() {
        let unit = unit(ReasonForBeing::TypeCheck);
        assert_eq!(unit.bump_cycle(), 1);
        assert_eq!(unit.bump_cycle(), 2);
    }
}
