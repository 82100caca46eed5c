//! Diagnostics-as-values: every analysis problem, from a
//! stray character to an unresolved macro call, is a `Diagnostic` value
//! pushed through a `Consumer` rather than an exception. This is what lets
//! the lookahead sub-pass (`core::lookahead`) silently discard diagnostics
//! from statements it merely peeks at without disturbing the ordinary pass.

use std::cell::RefCell;
use std::rc::Rc;

use super::Range;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub code: &'static str,
    pub severity: Severity,
    pub message: String,
    pub range: Range,
}

impl Diagnostic {
    pub fn new(code: &'static str, severity: Severity, message: impl Into<String>, range: Range) -> Self {
        Self { code, severity, message: message.into(), range }
    }
}

/// Severity is derived from the code's leading letter, matching the
/// taxonomy in : `A` advisory/info, `W`/`CW` warning, the rest
/// error. Exhaustively classifying every documented code range would just
/// restate this table, so unrecognized prefixes default to `Error`.
pub fn severity_of(code: &str) -> Severity {
    match code.chars().next() {
        Some('A') | Some('I') => Severity::Info,
        Some('W') => Severity::Warning,
        _ if code.starts_with("CW") => Severity::Warning,
        _ => Severity::Error,
    }
}

/// Where a frame's diagnostics go. Implementations mirror :
/// `Collect` accumulates into the semantic index for ordinary processing,
/// `Forward` re-emits into a parent consumer (macro body processed inside
/// a call site), and `Drop` is installed for lookahead frames.
pub trait DiagnosticConsumer {
    fn push(&mut self, diag: Diagnostic);
}

#[derive(Default)]
pub struct Collect {
    pub diagnostics: Vec<Diagnostic>,
}
impl DiagnosticConsumer for Collect {
    fn push(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }
}

/// Forwards into a shared parent sink, used when a macro body's
/// diagnostics should surface at the call site's file.
pub struct Forward {
    parent: Rc<RefCell<dyn DiagnosticConsumer>>,
}
impl Forward {
    pub fn new(parent: Rc<RefCell<dyn DiagnosticConsumer>>) -> Self {
        Self { parent }
    }
}
impl DiagnosticConsumer for Forward {
    fn push(&mut self, diag: Diagnostic) {
        self.parent.borrow_mut().push(diag);
    }
}

/// Installed for lookahead frames: diagnostics raised while peeking ahead are real
/// analysis noise, not something the user should see twice.
#[derive(Default)]
pub struct Drop;
impl DiagnosticConsumer for Drop {
    fn push(&mut self, _diag: Diagnostic) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_consumer_discards_everything() {
        let mut d = Drop;
        d.push(Diagnostic::new("E999", Severity::Error, "x", Range::default()));
    }

    #[test]
    fn collect_consumer_keeps_order() {
        let mut c = Collect::default();
        c.push(Diagnostic::new("A001", Severity::Info, "a", Range::default()));
        c.push(Diagnostic::new("E002", Severity::Error, "b", Range::default()));
        assert_eq!(c.diagnostics.len(), 2);
        assert_eq!(c.diagnostics[0].code, "A001");
    }

    #[test]
    fn severity_classification() {
        assert_eq!(severity_of("A100"), Severity::Info);
        assert_eq!(severity_of("W011"), Severity::Warning);
        assert_eq!(severity_of("CW001"), Severity::Warning);
        assert_eq!(severity_of("E010"), Severity::Error);
        assert_eq!(severity_of("CE009"), Severity::Error);
    }
}
