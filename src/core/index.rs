//! The passive LSP semantic index.
//!
//! The pipeline drives analysis; this module just watches, recording
//! every name occurrence (definition or reference) it is told about so
//! the host's LSP handlers (`definition`, `references`, `hover`,
//! `completion`, `document_symbol`) have something to
//! query without re-running the pipeline.

use std::collections::HashMap;

use lsp_types::Uri;

use super::{Id, Range};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OccurrenceKind {
    Definition,
    Reference,
    MacroInvocation,
}

#[derive(Clone, Debug)]
pub struct Occurrence {
    pub id: Id,
    pub range: Range,
    pub kind: OccurrenceKind,
}

#[derive(Default)]
pub struct FileIndex {
    pub occurrences: Vec<Occurrence>,
}

#[derive(Default)]
pub struct SemanticIndex {
    files: HashMap<String, FileIndex>,
    definitions: HashMap<Id, (String, Range)>,
    references: HashMap<Id, Vec<(String, Range)>>,
    macro_invocations: HashMap<Id, Vec<(String, Range)>>,
}

impl SemanticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(uri: &Uri) -> String {
        uri.as_str().to_string()
    }

    pub fn clear_file(&mut self, uri: &Uri) {
        let key = Self::key(uri);
        self.files.remove(&key);
        self.definitions.retain(|_, (u, _)| u != &key);
        for v in self.references.values_mut() {
            v.retain(|(u, _)| u != &key);
        }
        for v in self.macro_invocations.values_mut() {
            v.retain(|(u, _)| u != &key);
        }
    }

    pub fn record(&mut self, uri: &Uri, id: Id, range: Range, kind: OccurrenceKind) {
        let key = Self::key(uri);
        self.files.entry(key.clone()).or_default().occurrences.push(Occurrence { id, range, kind });
        match kind {
            OccurrenceKind::Definition => {
                self.definitions.entry(id).or_insert((key, range));
            }
            OccurrenceKind::Reference => {
                self.references.entry(id).or_default().push((key, range));
            }
            OccurrenceKind::MacroInvocation => {
                self.macro_invocations.entry(id).or_default().push((key, range));
            }
        }
    }

    pub fn definition(&self, id: Id) -> Option<(&str, Range)> {
        self.definitions.get(&id).map(|(u, r)| (u.as_str(), *r))
    }

    pub fn references(&self, id: Id) -> Vec<(&str, Range)> {
        self.references.get(&id).map(|v| v.iter().map(|(u, r)| (u.as_str(), *r)).collect()).unwrap_or_default()
    }

    pub fn macro_invocation_sites(&self, id: Id) -> Vec<(&str, Range)> {
        self.macro_invocations.get(&id).map(|v| v.iter().map(|(u, r)| (u.as_str(), *r)).collect()).unwrap_or_default()
    }

    pub fn hover(&self, id: Id) -> Option<String> {
        let (uri, range) = self.definition(id)?;
        Some(format!("{id} defined at {uri}:{}:{}", range.start.line + 1, range.start.col + 1))
    }

    /// Completion candidates whose canonical name starts with `prefix`
    /// (case-insensitive, since identifiers are already case-folded).
    pub fn completion(&self, prefix: &str) -> Vec<Id> {
        let prefix = prefix.to_uppercase();
        self.definitions.keys().filter(|id| id.to_string().starts_with(&prefix)).copied().collect()
    }

    pub fn document_symbols(&self, uri: &Uri) -> Vec<(Id, Range)> {
        let key = Self::key(uri);
        self.files
            .get(&key)
            .map(|f| {
                f.occurrences
                    .iter()
                    .filter(|o| o.kind == OccurrenceKind::Definition)
                    .map(|o| (o.id, o.range))
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Uri {
        "file:///test.hlasm".parse().unwrap()
    }

    #[test]
    fn records_and_finds_a_definition() {
        let mut idx = SemanticIndex::new();
        let id = Id::intern("LABEL1");
        idx.record(&uri(), id, Range::default(), OccurrenceKind::Definition);
        assert!(idx.definition(id).is_some());
    }

    #[test]
    fn references_accumulate_across_calls() {
        let mut idx = SemanticIndex::new();
        let id = Id::intern("LABEL1");
        idx.record(&uri(), id, Range::default(), OccurrenceKind::Reference);
        idx.record(&uri(), id, Range::default(), OccurrenceKind::Reference);
        assert_eq!(idx.references(id).len(), 2);
    }

    #[test]
    fn clear_file_drops_its_definitions() {
        let mut idx = SemanticIndex::new();
        let id = Id::intern("LABEL1");
        idx.record(&uri(), id, Range::default(), OccurrenceKind::Definition);
        idx.clear_file(&uri());
        assert!(idx.definition(id).is_none());
    }

    #[test]
    fn completion_matches_prefix_case_insensitively() {
        let mut idx = SemanticIndex::new();
        idx.record(&uri(), Id::intern("FOOBAR"), Range::default(), OccurrenceKind::Definition);
        assert_eq!(idx.completion("foo"), vec![Id::intern("FOOBAR")]);
    }
}
