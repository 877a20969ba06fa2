//! Sable Diagnostic - user-facing error reporting.
//!
//! Failures cross the scheduler's dispatch boundary as [`Diagnostic`]
//! values collected on a workspace, never as panics. The rendering here is
//! deliberately plain; fancy terminal output belongs to the driver, which
//! is outside this core.

mod diagnostic;

pub use diagnostic::{Diagnostic, Severity};
