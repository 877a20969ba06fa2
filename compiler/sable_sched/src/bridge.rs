//! Routing of finished metaprogram results back into the compiler.
//!
//! Workers call [`drain_finished_metaprograms`] after stepping their VM.
//! Each finished item is routed by its directive: assertions are checked,
//! expression results are decoded and registered as substitutions, and
//! generated source text is spliced into its file and queued for lexing.
//! Whatever the outcome, the execution slot is released and the unit is
//! reported finished so nothing in the pool can hang on it.

use sable_core::UnitState;
use sable_diagnostic::Diagnostic;
use sable_ir::TypeId;

use crate::context::CompilerContext;
use crate::decode::{self, DecodeContext};
use crate::vm::{Directive, ExecutionOutcome, FinishedMetaprogram, Metaprogram, MetaprogramVm};

/// Drain and route everything the VM finished. Returns how many
/// metaprograms completed.
pub fn drain_finished_metaprograms(ctx: &CompilerContext, vm: &mut dyn MetaprogramVm) -> usize {
    let finished = vm.take_finished();
    let count = finished.len();
    for item in finished {
        let Some(metaprogram) = ctx.take_metaprogram(item.id) else {
            unreachable!("VM finished a metaprogram that was never registered");
        };
        complete(ctx, vm, &metaprogram, item);
    }
    count
}

fn complete(
    ctx: &CompilerContext,
    vm: &mut dyn MetaprogramVm,
    metaprogram: &Metaprogram,
    finished: FinishedMetaprogram,
) {
    let unit = &metaprogram.unit;
    let workspace = unit.workspace();
    tracing::trace!(
        metaprogram = metaprogram.id.0,
        workspace = workspace.name(),
        "metaprogram finished"
    );

    match finished.outcome {
        ExecutionOutcome::Error { message } => {
            // A crashed metaprogram usually takes others down with it;
            // only the first such error per workspace surfaces.
            let shown = workspace.report_vm_error(Diagnostic::error(message));
            if !shown {
                tracing::debug!(
                    metaprogram = metaprogram.id.0,
                    "suppressed follow-on execution error"
                );
            }
        }
        ExecutionOutcome::Success {
            result_addr,
            result_type,
        } => match &metaprogram.directive {
            Directive::Assertion => {
                debug_assert_eq!(result_type, TypeId::BOOL);
                if vm.memory_mut().read_u8(result_addr) == 0 {
                    workspace.report(Diagnostic::error("compile-time assertion failed"));
                }
            }
            Directive::Expression { placeholder } => {
                let mut types = ctx.types.lock();
                let mut arena = ctx.arena.lock();
                let functions = ctx.functions.read();
                let span = arena.node(*placeholder).span;
                let decoded = {
                    let mut dctx = DecodeContext {
                        types: &mut types,
                        arena: &mut arena,
                        interner: &ctx.interner,
                        functions: &functions,
                        memory: vm.memory_mut(),
                        span,
                    };
                    decode::decode(&mut dctx, result_type, result_addr)
                };
                match decoded {
                    // A void result leaves the directive with no
                    // replacement, which is what the splice expects.
                    Ok(None) => {}
                    Ok(Some(replacement)) => arena.substitute(*placeholder, replacement),
                    Err(err) => workspace.report(Diagnostic::error(err.to_string()).with_span(span)),
                }
            }
            Directive::BodyText { file } => {
                debug_assert_eq!(result_type, TypeId::STR);
                let text = decode::read_string_value(vm.memory_mut(), result_addr);
                if text.is_empty() {
                    workspace.report(Diagnostic::error("metaprogram generated no source text"));
                } else if !text.ends_with('\n') {
                    workspace.report(Diagnostic::error(
                        "generated source text must end with a newline",
                    ));
                } else {
                    file.splice_generated_source(&text);
                    ctx.deps.request_lexing(workspace, file);
                }
            }
        },
    }

    vm.release_execution_slot(finished.id);
    unit.transition(UnitState::Done);
    ctx.deps.unit_finished(unit);
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    use sable_core::{
        CompilationUnit, FileId, MetaprogramId, ReasonForBeing, SourceFile, UnitId, UnitPayload,
        UnitState, WaitCondition, Workspace,
    };
    use sable_ir::{Interner, NodeKind, Span, TypeId};

    use super::drain_finished_metaprograms;
    use crate::context::{CompilerContext, VmFactory};
    use crate::deps::{DependencyManager, PhaseOutcome, PhaseRunner};
    use crate::scheduler::Scheduler;
    use crate::vm::{
        Directive, ExecutionOutcome, FinishedMetaprogram, Metaprogram, MetaprogramVm, VmAddr,
        VmMemory,
    };

    #[derive(Default)]
    struct RecordingDeps {
        finished: Mutex<Vec<UnitId>>,
        lex_requests: Mutex<Vec<FileId>>,
    }

    impl DependencyManager for RecordingDeps {
        fn create_tasks(&self, _scheduler: &Scheduler) {}

        fn unit_finished(&self, unit: &Arc<CompilationUnit>) {
            self.finished.lock().push(unit.id());
        }

        fn unit_waiting(&self, _unit: &Arc<CompilationUnit>, _condition: WaitCondition) {}

        fn request_lexing(&self, _workspace: &Arc<Workspace>, file: &Arc<SourceFile>) {
            self.lex_requests.lock().push(file.id());
        }
    }

    struct NullPhases;

    impl PhaseRunner for NullPhases {
        fn load_source(&self, _unit: &Arc<CompilationUnit>) -> io::Result<String> {
            Ok(String::new())
        }

        fn lex_source(&self, _unit: &Arc<CompilationUnit>, _text: &str) {}

        fn run_phase(&self, _unit: &Arc<CompilationUnit>) -> PhaseOutcome {
            PhaseOutcome::Finished
        }
    }

    /// VM double that plays back pre-scripted finished items.
    #[derive(Default)]
    struct ScriptedVm {
        memory: VmMemory,
        finished: Vec<FinishedMetaprogram>,
        released: Vec<MetaprogramId>,
    }

    impl MetaprogramVm for ScriptedVm {
        fn load_metaprogram(&mut self, _id: MetaprogramId) {}

        fn step(&mut self) {}

        fn take_finished(&mut self) -> Vec<FinishedMetaprogram> {
            std::mem::take(&mut self.finished)
        }

        fn all_done(&self) -> bool {
            self.finished.is_empty()
        }

        fn release_execution_slot(&mut self, id: MetaprogramId) {
            self.released.push(id);
        }

        fn memory_mut(&mut self) -> &mut VmMemory {
            &mut self.memory
        }
    }

    fn context(deps: Arc<RecordingDeps>) -> CompilerContext {
        let factory: VmFactory = Arc::new(|| Box::new(ScriptedVm::default()));
        CompilerContext::new(
            deps,
            Arc::new(NullPhases),
            Arc::new(Workspace::new("default")),
            Arc::new(Interner::new()),
            factory,
            true,
        )
    }

    fn executing_unit(
        ctx: &CompilerContext,
        id: u32,
        directive: Directive,
    ) -> (Arc<CompilationUnit>, MetaprogramId) {
        let mp_id = MetaprogramId(id);
        let unit = CompilationUnit::new(
            UnitId(id),
            Arc::clone(ctx.scheduler.default_workspace()),
            ReasonForBeing::Execute,
            UnitPayload::Metaprogram(mp_id),
        );
        unit.transition(UnitState::InProgress);
        ctx.register_metaprogram(Metaprogram {
            id: mp_id,
            unit: Arc::clone(&unit),
            directive,
        });
        (unit, mp_id)
    }

    fn success(id: MetaprogramId, addr: VmAddr, ty: TypeId) -> FinishedMetaprogram {
        FinishedMetaprogram {
            id,
            outcome: ExecutionOutcome::Success {
                result_addr: addr,
                result_type: ty,
            },
        }
    }

    #[test]
    fn failed_assertion_reports_and_still_finishes_the_unit() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let (unit, mp_id) = executing_unit(&ctx, 1, Directive::Assertion);

        let mut vm = ScriptedVm::default();
        let addr = vm.memory.stack_alloc(1);
        vm.memory.write_u8(addr, 0);
        vm.finished.push(success(mp_id, addr, TypeId::BOOL));

        let drained = drain_finished_metaprograms(&ctx, &mut vm);
        assert_eq!(drained, 1);
        assert!(unit.workspace().has_error());
        assert_eq!(unit.state(), UnitState::Done);
        assert_eq!(vm.released, vec![mp_id]);
        assert_eq!(deps.finished.lock().clone(), vec![UnitId(1)]);
    }

    #[test]
    fn passing_assertion_reports_nothing() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let (unit, mp_id) = executing_unit(&ctx, 1, Directive::Assertion);

        let mut vm = ScriptedVm::default();
        let addr = vm.memory.stack_alloc(1);
        vm.memory.write_u8(addr, 1);
        vm.finished.push(success(mp_id, addr, TypeId::BOOL));

        drain_finished_metaprograms(&ctx, &mut vm);
        assert!(!unit.workspace().has_error());
        assert_eq!(unit.state(), UnitState::Done);
    }

    #[test]
    fn expression_result_is_decoded_and_substituted() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let placeholder = ctx
            .arena
            .lock()
            .run_directive(TypeId::I32, Span::new(10, 4));
        let (_unit, mp_id) = executing_unit(&ctx, 1, Directive::Expression { placeholder });

        let mut vm = ScriptedVm::default();
        let addr = vm.memory.stack_alloc(4);
        vm.memory.write_u32(addr, 42);
        vm.finished.push(success(mp_id, addr, TypeId::I32));

        drain_finished_metaprograms(&ctx, &mut vm);
        let arena = ctx.arena.lock();
        let replacement = arena.substitution_for(placeholder);
        let node = arena.node(replacement.unwrap());
        assert_eq!(node.kind, NodeKind::IntLiteral { bits: 42 });
        // The synthesized literal sits at the directive's site.
        assert_eq!(node.span, Span::new(10, 4));
    }

    #[test]
    fn undecodable_expression_result_is_a_workspace_error() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let placeholder = ctx.arena.lock().run_directive(TypeId::I32, Span::DUMMY);
        let pointer = ctx.types.lock().pointer(TypeId::I32);
        let (unit, mp_id) = executing_unit(&ctx, 1, Directive::Expression { placeholder });

        let mut vm = ScriptedVm::default();
        let addr = vm.memory.stack_alloc(8);
        vm.finished.push(success(mp_id, addr, pointer));

        drain_finished_metaprograms(&ctx, &mut vm);
        assert!(unit.workspace().has_error());
        assert_eq!(ctx.arena.lock().substitution_for(placeholder), None);
        // The unit still completes; an error never wedges the pool.
        assert_eq!(unit.state(), UnitState::Done);
        assert_eq!(deps.finished.lock().clone(), vec![UnitId(1)]);
    }

    #[test]
    fn generated_source_is_spliced_and_queued_for_lexing() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let file = Arc::new(SourceFile::new(FileId(3), "generated.sb"));
        file.load_buffer("start\n");
        let (_unit, mp_id) = executing_unit(
            &ctx,
            1,
            Directive::BodyText {
                file: Arc::clone(&file),
            },
        );

        let mut vm = ScriptedVm::default();
        let text = "main :: () {}\n";
        let data = vm.memory.heap_alloc(text.len());
        vm.memory.write_bytes(data, text.as_bytes());
        let addr = vm.memory.stack_alloc(16);
        vm.memory.write_u64(addr, data);
        vm.memory.write_u64(addr + 8, text.len() as u64);
        vm.finished.push(success(mp_id, addr, TypeId::STR));

        drain_finished_metaprograms(&ctx, &mut vm);
        file.with_text(|t| assert_eq!(t, "start\nmain :: () {}\n"));
        assert_eq!(deps.lex_requests.lock().clone(), vec![FileId(3)]);
        // The decoder released the string's backing buffer.
        assert_eq!(vm.memory.live_allocations(), 0);
    }

    #[test]
    fn generated_source_without_trailing_newline_is_rejected() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let file = Arc::new(SourceFile::new(FileId(3), "generated.sb"));
        file.load_buffer("start\n");
        let (unit, mp_id) = executing_unit(
            &ctx,
            1,
            Directive::BodyText {
                file: Arc::clone(&file),
            },
        );

        let mut vm = ScriptedVm::default();
        let text = "main :: () {}";
        let data = vm.memory.heap_alloc(text.len());
        vm.memory.write_bytes(data, text.as_bytes());
        let addr = vm.memory.stack_alloc(16);
        vm.memory.write_u64(addr, data);
        vm.memory.write_u64(addr + 8, text.len() as u64);
        vm.finished.push(success(mp_id, addr, TypeId::STR));

        drain_finished_metaprograms(&ctx, &mut vm);
        assert!(unit.workspace().has_error());
        file.with_text(|t| assert_eq!(t, "start\n"));
        assert!(deps.lex_requests.lock().is_empty());
    }

    #[test]
    fn only_the_first_execution_error_per_workspace_surfaces() {
        let deps = Arc::new(RecordingDeps::default());
        let ctx = context(Arc::clone(&deps));
        let (unit_a, mp_a) = executing_unit(&ctx, 1, Directive::Assertion);
        let (_unit_b, mp_b) = executing_unit(&ctx, 2, Directive::Assertion);

        let mut vm = ScriptedVm::default();
        vm.finished.push(FinishedMetaprogram {
            id: mp_a,
            outcome: ExecutionOutcome::Error {
                message: "stack overflow in metaprogram".to_owned(),
            },
        });
        vm.finished.push(FinishedMetaprogram {
            id: mp_b,
            outcome: ExecutionOutcome::Error {
                message: "collateral crash".to_owned(),
            },
        });

        drain_finished_metaprograms(&ctx, &mut vm);
        let diagnostics = unit_a.workspace().diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].message, "stack overflow in metaprogram");
        // Both units complete regardless of the suppression.
        assert_eq!(deps.finished.lock().clone(), vec![UnitId(1), UnitId(2)]);
        assert_eq!(vm.released, vec![mp_a, mp_b]);
    }
}
