//! Coded diagnostics, severity levels, and terminal rendering.
//!
//! Pipeline stages report non-fatal findings (pruned connections, unbounded
//! runs, routing tables close to capacity) as structured [`Diagnostic`]s into
//! a thread-safe [`DiagnosticSink`]. Fatal conditions are `MapError`s instead.

#![warn(missing_docs)]

pub mod code;
pub mod diagnostic;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use renderer::{DiagnosticRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
