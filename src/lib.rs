//! Analysis core for a High-Level Assembler (HLASM) language server: a
//! column-aware lexer and continuation engine, a two-form parser, a
//! conditional-assembly expression engine, the ordinary/variable/
//! sequence/opcode symbol tables, the `DC`/`DS` data-definition type
//! system, the macro/`COPY`/`AREAD` engine, a lookahead attribute
//! resolver, and a passive semantic index for LSP-style queries.
//!
//! The crate never assembles a program -- it has no instruction encoder,
//! no linker, no object-file writer. What it promises is a structurally
//! accurate view of a source file's names, attributes, and diagnostics,
//! suitable for a language server or a command-line checker built on top
//! (`src/bin`).

pub mod core;
pub mod error;
pub mod server;

pub use error::{CoreError, DYNERR, STDRESULT};
