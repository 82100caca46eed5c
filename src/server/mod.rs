//! Glue between the analysis core and an LSP host: a `Checkpoint`-shaped
//! record of the most recent analysis of a document, and a `basic_diag`
//! convenience for building `lsp_types::Diagnostic` values.

use std::collections::HashMap;

use lsp_types as lsp;

use crate::core::catalog::{BuiltinCatalog, InstructionCatalog};
use crate::core::diagnostics::{Collect, Diagnostic as CoreDiagnostic, Severity};
use crate::core::index::{OccurrenceKind, SemanticIndex};
use crate::core::lexer::ColumnLayout;
use crate::core::library::LibraryProvider;
use crate::core::parser::ParsedOperands;
use crate::core::pipeline::{Pipeline, StepResult};
use crate::core::settings::Settings;
use crate::core::{Document, Id, ProcessingKind, Range};
use crate::STDRESULT;

pub fn basic_diag(range: lsp::Range, message: &str, severity: lsp::DiagnosticSeverity) -> lsp::Diagnostic {
    lsp::Diagnostic {
        range,
        severity: Some(severity),
        code: None,
        code_description: None,
        source: Some("hlasm".to_string()),
        message: message.to_string(),
        related_information: None,
        tags: None,
        data: None,
    }
}

fn lsp_severity(s: Severity) -> lsp::DiagnosticSeverity {
    match s {
        Severity::Error => lsp::DiagnosticSeverity::ERROR,
        Severity::Warning => lsp::DiagnosticSeverity::WARNING,
        Severity::Info => lsp::DiagnosticSeverity::INFORMATION,
    }
}

fn to_lsp_diag(d: &CoreDiagnostic) -> lsp::Diagnostic {
    let mut diag = basic_diag(d.range.to_lsp(), &d.message, lsp_severity(super::core::diagnostics::severity_of(d.code)));
    diag.code = Some(lsp::NumberOrString::String(d.code.to_string()));
    diag
}

/// A single checkpointed analysis of one document: the diagnostics from
/// the most recent run plus whatever landed in the shared semantic index
/// (`core::index::SemanticIndex` is keyed by URI across the whole
/// workspace, so only diagnostics need to live per-document here).
pub struct Checkpoint {
    pub doc: Document,
    pub diagnostics: Vec<CoreDiagnostic>,
}

/// Drives the pipeline over a whole document and records the result. This
/// is the one place `core::pipeline::Pipeline` gets wired up with a real
/// `InstructionCatalog` and the shared `SemanticIndex`; everything above
/// it (CLI, LSP server) only ever talks to `Analyzer`.
pub struct Analyzer {
    pub index: SemanticIndex,
    pub settings: Settings,
    checkpoints: HashMap<String, Checkpoint>,
    catalog: BuiltinCatalog,
}

impl Analyzer {
    pub fn new() -> Self {
        Self { index: SemanticIndex::new(), settings: Settings::new(), checkpoints: HashMap::new(), catalog: BuiltinCatalog }
    }

    pub fn apply_settings(&mut self, json: &str) -> STDRESULT {
        self.settings = crate::core::settings::parse(json)?;
        Ok(())
    }

    /// Re-analyzes `doc` end to end with no `COPY`-member resolution
    /// available: a `COPY` the pipeline hits simply stops the run early,
    /// same as a library miss would. Convenience for callers (tests, the
    /// CLI's quick-check path) that have no library provider on hand.
    pub fn analyze(&mut self, doc: Document) -> Vec<CoreDiagnostic> {
        self.analyze_with_library(doc, None)
    }

    /// Re-analyzes `doc` end to end: clears the index's prior entries for
    /// this file, runs the pipeline to completion (resolving `COPY`
    /// members through `library` when supplied), and records every label
    /// definition, operand symbol reference, and macro-invocation site the
    /// pipeline surfaces as an occurrence. Returns the fresh diagnostics
    /// the host should push to the client.
    pub fn analyze_with_library(&mut self, doc: Document, library: Option<&dyn LibraryProvider>) -> Vec<CoreDiagnostic> {
        self.index.clear_file(&doc.uri);
        let layout = ColumnLayout { begin: self.settings.columns.begin as usize, end: self.settings.columns.end as usize, continue_col: self.settings.columns.continue_col as usize };
        let lines: Vec<String> = doc.text.lines().map(String::from).collect();
        let mut pipeline = Pipeline::new(lines, &self.catalog, layout);
        let mut sink = Collect::default();
        loop {
            match pipeline.step(&mut sink) {
                StepResult::Yielded(outcome) => {
                    if let Some((id, range)) = outcome.label {
                        self.index.record(&doc.uri, id, range, OccurrenceKind::Definition);
                    }
                    if let Some((name, range)) = &outcome.opcode {
                        let id = crate::core::Id::intern(name);
                        if pipeline.macros.lookup(id).is_some() {
                            self.index.record(&doc.uri, id, *range, OccurrenceKind::MacroInvocation);
                        }
                    }
                    for (id, range) in operand_symbol_references(&outcome.operands) {
                        self.index.record(&doc.uri, id, range, OccurrenceKind::Reference);
                    }
                }
                StepResult::NeedLibrary(name) => {
                    let Some(provider) = library else { break };
                    match provider.fetch(&name) {
                        Some(text) => {
                            let copy_lines: Vec<String> = text.lines().map(String::from).collect();
                            pipeline.supply_library(ProcessingKind::CopyDef, copy_lines);
                        }
                        None => break,
                    }
                }
                StepResult::Finished => break,
            }
        }
        let diagnostics = sink.diagnostics;
        self.checkpoints.insert(doc.uri.as_str().to_string(), Checkpoint { doc, diagnostics: diagnostics.clone() });
        diagnostics
    }

    pub fn checkpoint(&self, uri: &str) -> Option<&Checkpoint> {
        self.checkpoints.get(uri)
    }

    pub fn push_diagnostics(&self, uri: &str) -> Option<lsp::PublishDiagnosticsParams> {
        let chk = self.checkpoint(uri)?;
        Some(lsp::PublishDiagnosticsParams {
            uri: chk.doc.uri.clone(),
            diagnostics: chk.diagnostics.iter().map(to_lsp_diag).collect(),
            version: chk.doc.version,
        })
    }
}

/// Pulls every HLASM-name-shaped token out of a statement's operand text
/// (ordinary symbols in machine/asm/data operands, macro-call arguments,
/// sequence-symbol branch targets) so `references(file, pos)` has
/// something beyond label definitions to answer with. Deliberately
/// coarse: it records the whole operand's range for every name found in
/// it rather than the name's own sub-span, since the parser does not
/// track per-token ranges within an operand.
fn operand_symbol_references(operands: &ParsedOperands) -> Vec<(Id, Range)> {
    let mut out = Vec::new();
    let mut scan = |text: &str, range: Range| {
        for name in hlasm_names(text) {
            out.push((Id::intern(&name), range));
        }
    };
    match operands {
        ParsedOperands::Machine(raws) | ParsedOperands::Asm(raws) | ParsedOperands::Data(raws) => {
            for r in raws {
                scan(&r.text, r.range);
            }
        }
        ParsedOperands::Mac(args) => {
            for a in args {
                scan(&a.value, a.range);
            }
        }
        ParsedOperands::CaBranch { targets, .. } => {
            for t in targets {
                out.push((Id::intern(t), Range::default()));
            }
        }
        ParsedOperands::CaExpr(_)
        | ParsedOperands::CaVarDef(_)
        | ParsedOperands::NoOp
        | ParsedOperands::Ignored
        | ParsedOperands::Deferred(_) => {}
    }
    out
}

/// A HLASM ordinary/variable name: starts with a letter, `$`, `@`, `#`, or
/// `&`, continues with those plus digits and `_`. Mirrors the identifier
/// shape `request.rs`'s `symbol_at` uses to resolve a cursor position.
fn hlasm_names(text: &str) -> Vec<String> {
    let is_start = |c: char| c.is_ascii_alphabetic() || matches!(c, '$' | '@' | '#' | '&');
    let is_cont = |c: char| c.is_ascii_alphanumeric() || matches!(c, '$' | '@' | '#' | '_' | '&');
    let chars: Vec<char> = text.chars().collect();
    let mut names = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if is_start(chars[i]) {
            let start = i;
            i += 1;
            while i < chars.len() && is_cont(chars[i]) {
                i += 1;
            }
            names.push(chars[start..i].iter().collect());
        } else {
            i += 1;
        }
    }
    names
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> Document {
        Document::new("file:///t.hlasm".parse().unwrap(), text.to_string(), Some(1))
    }

    #[test]
    fn analyze_records_label_definitions() {
        let mut a = Analyzer::new();
        let diags = a.analyze(doc("LBL      EQU   1\n"));
        assert!(diags.is_empty());
        assert!(a.index.definition(crate::core::Id::intern("LBL")).is_some());
    }

    #[test]
    fn reanalyzing_clears_stale_definitions() {
        let mut a = Analyzer::new();
        a.analyze(doc("LBL      EQU   1\n"));
        a.analyze(doc("OTHER    EQU   1\n"));
        assert!(a.index.definition(crate::core::Id::intern("LBL")).is_none());
    }

    struct FakeLibrary;
    impl crate::core::library::LibraryProvider for FakeLibrary {
        fn fetch(&self, logical_name: &str) -> Option<String> {
            if logical_name == "COPYBK" {
                Some("COPIED   EQU   1\n".to_string())
            } else {
                None
            }
        }
        fn has_library(&self, logical_name: &str) -> bool {
            logical_name == "COPYBK"
        }
    }

    #[test]
    fn analyze_records_a_machine_operand_reference() {
        let mut a = Analyzer::new();
        a.analyze(doc("TARGET   DC    C'X'\nLBL      MVC   TARGET,TARGET\n"));
        let refs = a.index.references(crate::core::Id::intern("TARGET"));
        assert!(!refs.is_empty());
    }

    #[test]
    fn analyze_records_a_macro_invocation_site() {
        let mut a = Analyzer::new();
        a.analyze(doc("         MACRO\n         MAC\n         MEND\n         MAC\n"));
        let sites = a.index.macro_invocation_sites(crate::core::Id::intern("MAC"));
        assert_eq!(sites.len(), 1);
    }

    #[test]
    fn copy_member_is_resolved_through_library_provider() {
        let mut a = Analyzer::new();
        let lib = FakeLibrary;
        a.analyze_with_library(doc("         COPY  COPYBK\n"), Some(&lib));
        assert!(a.index.definition(crate::core::Id::intern("COPIED")).is_some());
    }

    #[test]
    fn missing_copy_member_stops_analysis_without_panicking() {
        let mut a = Analyzer::new();
        let lib = FakeLibrary;
        let diags = a.analyze_with_library(doc("         COPY  NOPE\n"), Some(&lib));
        assert!(diags.is_empty());
    }
}
