//! The four symbol tables -- ordinary, variable, sequence, and opcode.

use std::collections::{HashMap, HashSet};

use super::ca_expr::CaType;
use super::{Id, OpcodeTag, Range};

#[derive(Clone, Debug)]
pub struct SymDiag {
    pub code: &'static str,
    pub message: String,
}
impl SymDiag {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

/// The eight ordinary-symbol attributes. `t` defaults to `'U'` (undefined)
/// until a symbol acquires a concrete type from its defining statement.
#[derive(Clone, Copy, Debug)]
pub struct Attributes {
    pub t: char,
    pub l: i32,
    pub s: i32,
    pub i: i32,
    pub d: bool,
    pub o: char,
    pub p: char,
    pub a: i64,
}

impl Default for Attributes {
    fn default() -> Self {
        Self { t: 'U', l: 0, s: 0, i: 0, d: false, o: 'U', p: 'U', a: 0 }
    }
}

#[derive(Clone, Debug)]
pub struct OrdinarySymbol {
    pub id: Id,
    pub value: Option<i64>,
    pub attrs: Attributes,
    pub defined_at: Range,
}

/// Tracks ordinary symbols. A symbol becomes immutable the moment it is
/// defined; attribute
/// queries seen before that point are recorded as pending demands so the
/// pipeline knows to run a lookahead sub-pass (`core::lookahead`).
#[derive(Default)]
pub struct OrdinaryTable {
    symbols: HashMap<Id, OrdinarySymbol>,
    pending_demands: HashSet<Id>,
}

impl OrdinaryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Id) -> Option<&OrdinarySymbol> {
        self.symbols.get(&id)
    }

    pub fn is_defined(&self, id: Id) -> bool {
        self.symbols.contains_key(&id)
    }

    /// Define `id`. Errors with `E010`-shaped diagnostic if already
    /// defined, mirroring the duplicate-symbol check in A
    /// prior lookahead-seeded entry (`seed_attributes`, value still `None`)
    /// is not a real definition yet and is simply completed here.
    pub fn define(&mut self, id: Id, value: i64, attrs: Attributes, at: Range) -> Result<(), SymDiag> {
        if let Some(existing) = self.symbols.get(&id) {
            if existing.value.is_some() {
                return Err(SymDiag::new("E010", format!("symbol `{id}` is already defined")));
            }
        }
        self.symbols.insert(id, OrdinarySymbol { id, value: Some(value), attrs, defined_at: at });
        Ok(())
    }

    /// Record that `id` was attribute-queried while still undefined. The
    /// pipeline consults `take_pending_demands` after a statement to decide
    /// whether to spawn a lookahead sub-pass.
    pub fn demand_attribute(&mut self, id: Id) {
        if !self.symbols.contains_key(&id) {
            self.pending_demands.insert(id);
        }
    }

    pub fn take_pending_demands(&mut self) -> Vec<Id> {
        self.pending_demands.drain().collect()
    }

    /// Install attributes discovered by a lookahead pass without providing
    /// a final value -- used when lookahead determines a symbol's `T`/`L`
    /// attributes from its eventual defining statement but the ordinary
    /// pass has not reached that statement yet. The entry stays mutable
    /// (not "defined") until the ordinary pass actually assigns a value.
    pub fn seed_attributes(&mut self, id: Id, attrs: Attributes, at: Range) {
        self.symbols.entry(id).or_insert(OrdinarySymbol { id, value: None, attrs, defined_at: at });
    }
}

/// Scope a `SETA`/`SETB`/`SETC` variable symbol lives in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum VarScope {
    Global,
    /// Local to the current open macro or main-program level; indexed by
    /// nesting depth so macro calls get fresh locals.
    Local(usize),
}

#[derive(Clone, Debug)]
pub enum VarSlot {
    Scalar(super::ca_expr::CaValue),
    Array(Vec<super::ca_expr::CaValue>),
}

struct VarEntry {
    kind: CaType,
    slot: VarSlot,
}

/// Variable-symbol table: one global map plus a stack of local maps, one
/// pushed per open macro-call level (scope rules).
pub struct VariableTable {
    global: HashMap<Id, VarEntry>,
    locals: Vec<HashMap<Id, VarEntry>>,
}

impl Default for VariableTable {
    fn default() -> Self {
        Self { global: HashMap::new(), locals: vec![HashMap::new()] }
    }
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_macro_level(&mut self) {
        self.locals.push(HashMap::new());
    }
    pub fn pop_macro_level(&mut self) {
        if self.locals.len() > 1 {
            self.locals.pop();
        }
    }

    fn local_mut(&mut self) -> &mut HashMap<Id, VarEntry> {
        self.locals.last_mut().expect("at least one local scope")
    }
    fn local(&self) -> &HashMap<Id, VarEntry> {
        self.locals.last().expect("at least one local scope")
    }

    /// `LCLA`/`LCLB`/`LCLC`/`GBLA`/`GBLB`/`GBLC`: declares `id` in the
    /// given scope with the given kind, default-initialized.
    pub fn declare(&mut self, id: Id, scope: VarScope, kind: CaType) {
        let default_slot = match kind {
            CaType::A => VarSlot::Scalar(super::ca_expr::CaValue::A(0)),
            CaType::B => VarSlot::Scalar(super::ca_expr::CaValue::B(false)),
            _ => VarSlot::Scalar(super::ca_expr::CaValue::C(String::new())),
        };
        let entry = VarEntry { kind, slot: default_slot };
        match scope {
            VarScope::Global => {
                self.global.insert(id, entry);
            }
            VarScope::Local(_) => {
                self.local_mut().insert(id, entry);
            }
        }
    }

    fn entry_mut(&mut self, id: Id) -> Option<&mut VarEntry> {
        self.local_mut().get_mut(&id).or_else(|| self.global.get_mut(&id))
    }
    fn entry(&self, id: Id) -> Option<&VarEntry> {
        self.local().get(&id).or_else(|| self.global.get(&id))
    }

    pub fn kind_of(&self, id: Id) -> Option<CaType> {
        self.entry(id).map(|e| e.kind)
    }

    pub fn get_scalar(&self, id: Id) -> Option<super::ca_expr::CaValue> {
        match &self.entry(id)?.slot {
            VarSlot::Scalar(v) => Some(v.clone()),
            VarSlot::Array(a) => a.first().cloned(),
        }
    }

    pub fn get_subscript(&self, id: Id, index: usize) -> Option<super::ca_expr::CaValue> {
        match &self.entry(id)?.slot {
            VarSlot::Array(a) => a.get(index.checked_sub(1)?).cloned(),
            VarSlot::Scalar(v) if index == 1 => Some(v.clone()),
            _ => None,
        }
    }

    pub fn set_scalar(&mut self, id: Id, value: super::ca_expr::CaValue) -> Result<(), SymDiag> {
        let entry = self.entry_mut(id).ok_or_else(|| SymDiag::new("E011", format!("variable symbol `{id}` was never declared")))?;
        entry.slot = VarSlot::Scalar(value);
        Ok(())
    }

    pub fn set_subscript(&mut self, id: Id, index: usize, value: super::ca_expr::CaValue) -> Result<(), SymDiag> {
        let entry = self.entry_mut(id).ok_or_else(|| SymDiag::new("E011", format!("variable symbol `{id}` was never declared")))?;
        if index == 0 {
            return Err(SymDiag::new("E012", "subscript must be at least 1"));
        }
        match &mut entry.slot {
            VarSlot::Array(a) => {
                if a.len() < index {
                    a.resize(index, value.clone());
                }
                a[index - 1] = value;
            }
            VarSlot::Scalar(v) => {
                let mut a = vec![v.clone(); index];
                a[index - 1] = value;
                entry.slot = VarSlot::Array(a);
            }
        }
        Ok(())
    }
}

/// Sequence symbols: duplicates are only an error if the earlier
/// definition was actually branched to before being redefined
/// ("duplicate sequence symbol" edge case).
#[derive(Default)]
pub struct SequenceTable {
    defined: HashMap<Id, Range>,
    used: HashSet<Id>,
}

impl SequenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_used(&mut self, id: Id) {
        self.used.insert(id);
    }

    pub fn define(&mut self, id: Id, at: Range) -> Result<(), SymDiag> {
        if self.defined.contains_key(&id) && self.used.contains(&id) {
            return Err(SymDiag::new("E013", format!("sequence symbol `{id}` redefined after being branched to")));
        }
        self.defined.insert(id, at);
        Ok(())
    }

    pub fn lookup(&self, id: Id) -> Option<Range> {
        self.defined.get(&id).copied()
    }
}

/// Opcode table: maps a mnemonic to its tag, aware of `OPSYN` synonyms.
#[derive(Default)]
pub struct OpcodeTable {
    synonyms: HashMap<Id, Id>,
    tags: HashMap<Id, OpcodeTag>,
}

impl OpcodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, id: Id, tag: OpcodeTag) {
        self.tags.insert(id, tag);
    }

    /// `OPSYN new,target` makes `new` resolve exactly as `target` does at
    /// the time of the `OPSYN` (a snapshot, not a live alias).
    pub fn opsyn(&mut self, new: Id, target: Id) {
        let resolved_target = self.resolve_canonical(target);
        self.synonyms.insert(new, resolved_target);
        if let Some(tag) = self.tags.get(&resolved_target).copied() {
            self.tags.insert(new, tag);
        }
    }

    fn resolve_canonical(&self, id: Id) -> Id {
        let mut cur = id;
        let mut guard = 0;
        while let Some(next) = self.synonyms.get(&cur) {
            cur = *next;
            guard += 1;
            if guard > 64 {
                break;
            }
        }
        cur
    }

    pub fn resolve(&self, id: Id) -> OpcodeTag {
        let canonical = self.resolve_canonical(id);
        self.tags.get(&canonical).copied().unwrap_or(OpcodeTag::Undefined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ca_expr::CaValue;

    #[test]
    fn ordinary_symbol_cannot_be_redefined() {
        let mut t = OrdinaryTable::new();
        let id = Id::intern("FOO");
        let r = Range::default();
        t.define(id, 100, Attributes::default(), r).unwrap();
        let err = t.define(id, 200, Attributes::default(), r).unwrap_err();
        assert_eq!(err.code, "E010");
    }

    #[test]
    fn pending_demand_is_cleared_once_defined() {
        let mut t = OrdinaryTable::new();
        let id = Id::intern("FWD");
        t.demand_attribute(id);
        assert_eq!(t.take_pending_demands(), vec![id]);
        assert!(t.take_pending_demands().is_empty());
    }

    #[test]
    fn variable_table_roundtrips_scalar() {
        let mut v = VariableTable::new();
        let id = Id::intern("&X");
        v.declare(id, VarScope::Local(0), CaType::A);
        v.set_scalar(id, CaValue::A(42)).unwrap();
        assert_eq!(v.get_scalar(id), Some(CaValue::A(42)));
    }

    #[test]
    fn sequence_symbol_duplicate_only_errors_if_used() {
        let mut s = SequenceTable::new();
        let id = Id::intern(".HERE");
        let r = Range::default();
        s.define(id, r).unwrap();
        s.define(id, r).unwrap(); // unused so far, redefinition is fine
        s.mark_used(id);
        let err = s.define(id, r).unwrap_err();
        assert_eq!(err.code, "E013");
    }

    #[test]
    fn opsyn_snapshots_target_tag() {
        let mut o = OpcodeTable::new();
        let real = Id::intern("MVC");
        let alias = Id::intern("MOVE");
        o.seed(real, OpcodeTag::MachineInstr);
        o.opsyn(alias, real);
        assert_eq!(o.resolve(alias), OpcodeTag::MachineInstr);
    }
}
