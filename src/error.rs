//! Crate-wide error aliases and the fatal-condition error type.
//!
//! Ordinary analysis problems (lexical, parse, evaluation, semantic) are
//! never represented as `Err` here -- they are diagnostic *values* pushed
//! through a `DiagnosticConsumer` (see `core::diagnostics`). `CoreError`
//! exists only for the "fatal conditions" of the processing pipeline: a
//! caller that sees one of these should stop driving the `Pipeline`, the
//! partial semantic index is still valid.

use thiserror::Error;

pub type DYNERR = Box<dyn std::error::Error>;
pub type STDRESULT = Result<(), DYNERR>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("id-interning table poisoned or exhausted")]
    Interning,
    #[error("analysis was cancelled")]
    Cancelled,
    #[error("internal invariant violated: {0}")]
    Invariant(&'static str),
    #[error("library provider could not resolve `{0}`")]
    LibraryNotFound(String),
}
