//! The statement-processing pipeline.
//!
//! Drives one statement at a time: joins continuation lines, splits the
//! four fields, asks the instruction catalog for the opcode's tag and
//! operand form, and dispatches to the right parse/evaluate path. `AIF`,
//! `AGO`, `SETx`, and `LCLx`/`GBLx` are handled inline since they mutate
//! pipeline state (the instruction pointer, the variable table); every
//! other statement is handed back to the caller as a `StatementOutcome`
//! for the semantic index (`core::index`) to record.
//!
//! The pipeline never blocks or spawns threads: `step`
//! returns as soon as one statement's worth of work is done, including
//! when that statement needs a library the host has not supplied yet.

use std::collections::HashMap;

use super::ca_expr::{resolve_expression_tree, CaType, CaValue, EvalContext};
use super::catalog::InstructionCatalog;
use super::diagnostics::{Diagnostic, DiagnosticConsumer, Severity};
use super::lexer::{join_continuation, ColumnLayout};
use super::lookahead::{scan_for_definition, try_type_attr_shortcircuit};
use super::macros::{bind_arguments, parse_prototype, substitute_line, syslist, MacroTable};
use super::parser::{parse_ca_expr, split_fields, split_operands, MacroArg, ParsedOperands, RawOperand};
use super::symbols::{Attributes, OpcodeTable, OrdinaryTable, SequenceTable, VarScope, VariableTable};
use super::{Id, OpcodeTag, OperandForm, ProcessingKind, Range};

pub struct Frame {
    pub kind: ProcessingKind,
    pub lines: Vec<String>,
    pub ip: usize,
    seq_index: HashMap<Id, usize>,
}

impl Frame {
    pub fn new(kind: ProcessingKind, lines: Vec<String>) -> Self {
        let seq_index = build_seq_index(&lines);
        Self { kind, lines, ip: 0, seq_index }
    }
}

/// Pre-scans a frame's source for sequence-symbol labels (`.NAME`) so a
/// forward `AGO`/`AIF` can jump to a target defined later in the same
/// frame without a separate pass.
fn build_seq_index(lines: &[String]) -> HashMap<Id, usize> {
    let mut idx = HashMap::new();
    for (i, line) in lines.iter().enumerate() {
        if let Some(rest) = line.strip_prefix('.') {
            let name: String = rest.chars().take_while(|c| !c.is_whitespace()).collect();
            if !name.is_empty() {
                idx.insert(Id::intern(&format!(".{name}")), i);
            }
        }
    }
    idx
}

#[derive(Debug)]
pub struct StatementOutcome {
    pub label: Option<(Id, Range)>,
    pub opcode: Option<(String, Range)>,
    pub operands: ParsedOperands,
    pub range: Range,
    pub loc_ctr_before: i64,
}

pub enum StepResult {
    Yielded(StatementOutcome),
    NeedLibrary(String),
    Finished,
}

/// State while a `MACRO`...`MEND` definition is being captured verbatim.
/// The line right after `MACRO` is the prototype (its opcode field names
/// the macro, its operand field lists the parameters); everything after
/// that, up to `MEND`, is cached as raw text and never evaluated here.
enum MacroCapture {
    AwaitingPrototype,
    Body { name: Id, operand_text: String, body: Vec<String>, defined_at: Range },
}

pub struct Pipeline<'a> {
    frames: Vec<Frame>,
    pub ordinary: OrdinaryTable,
    pub variables: VariableTable,
    pub sequences: SequenceTable,
    pub opcodes: OpcodeTable,
    pub macros: MacroTable,
    pub loc_ctr: i64,
    layout: ColumnLayout,
    catalog: &'a dyn InstructionCatalog,
    pending_library: Option<String>,
    macro_capture: Option<MacroCapture>,
}

impl<'a> Pipeline<'a> {
    pub fn new(source_lines: Vec<String>, catalog: &'a dyn InstructionCatalog, layout: ColumnLayout) -> Self {
        let mut opcodes = OpcodeTable::new();
        seed_builtin_opcodes(&mut opcodes, catalog);
        Self {
            frames: vec![Frame::new(ProcessingKind::Ordinary, source_lines)],
            ordinary: OrdinaryTable::new(),
            variables: VariableTable::new(),
            sequences: SequenceTable::new(),
            opcodes,
            macros: MacroTable::new(),
            loc_ctr: 0,
            layout,
            catalog,
            pending_library: None,
            macro_capture: None,
        }
    }

    pub fn push_frame(&mut self, kind: ProcessingKind, lines: Vec<String>) {
        if matches!(kind, ProcessingKind::MacroDef | ProcessingKind::Aread) {
            self.variables.push_macro_level();
        }
        self.frames.push(Frame::new(kind, lines));
    }

    fn pop_frame(&mut self) {
        if let Some(f) = self.frames.last() {
            if matches!(f.kind, ProcessingKind::MacroDef | ProcessingKind::Aread) {
                self.variables.pop_macro_level();
            }
        }
        self.frames.pop();
    }

    pub fn step(&mut self, sink: &mut dyn DiagnosticConsumer) -> StepResult {
        if let Some(name) = self.pending_library.take() {
            return StepResult::NeedLibrary(name);
        }
        loop {
            loop {
                let Some(frame) = self.frames.last() else { return StepResult::Finished };
                if frame.ip >= frame.lines.len() {
                    if self.frames.len() == 1 {
                        return StepResult::Finished;
                    }
                    self.pop_frame();
                    continue;
                }
                break;
            }

            let frame = self.frames.last().unwrap();
            let line_refs: Vec<&str> = frame.lines.iter().map(|s| s.as_str()).collect();
            let start_ip = frame.ip;
            let unlimited = matches!(frame.kind, ProcessingKind::Aread);
            let logical = join_continuation(&line_refs, start_ip, &self.layout, unlimited);
            let consumed = logical.physical_lines.max(1);

            let fields = split_fields(&logical.text);
            let range = logical.physical_range(0, logical.text.chars().count().max(1));

            let label = fields.label.map(|s| {
                let text: String = logical.text.chars().skip(s.start).take(s.end - s.start).collect();
                (Id::intern(&text), logical.physical_range(s.start, s.end))
            });
            let opcode_field = fields.opcode.map(|s| {
                let text: String = logical.text.chars().skip(s.start).take(s.end - s.start).collect();
                (text, logical.physical_range(s.start, s.end))
            });
            let opcode_upper = opcode_field.as_ref().map(|(n, _)| n.to_ascii_uppercase());

            if self.macro_capture.is_some() {
                self.frames.last_mut().unwrap().ip = start_ip + consumed;
                self.step_macro_capture(opcode_upper.as_deref(), &opcode_field, &logical.text, range);
                continue;
            }

            if opcode_upper.as_deref() == Some("MACRO") {
                self.frames.last_mut().unwrap().ip = start_ip + consumed;
                self.macro_capture = Some(MacroCapture::AwaitingPrototype);
                continue;
            }

            if let Some(name) = &opcode_upper {
                if self.macros.is_defined(Id::intern(name)) {
                    let operand_text: String = fields
                        .operand
                        .map(|s| logical.text.chars().skip(s.start).take(s.end - s.start).collect())
                        .unwrap_or_default();
                    self.frames.last_mut().unwrap().ip = start_ip + consumed;
                    let args = self.expand_macro_call(Id::intern(name), &operand_text, range);
                    return StepResult::Yielded(StatementOutcome {
                        label,
                        opcode: opcode_field,
                        operands: ParsedOperands::Mac(args),
                        range,
                        loc_ctr_before: self.loc_ctr,
                    });
                }
            }

            if let Some((name, at)) = &label {
                if name.text().starts_with('.') {
                    if let Err(e) = self.sequences.define(*name, *at) {
                        sink.push(Diagnostic::new(e.code, Severity::Error, e.message, *at));
                    }
                }
            }

            let operand_text: String = fields
                .operand
                .map(|s| logical.text.chars().skip(s.start).take(s.end - s.start).collect())
                .unwrap_or_default();

            let info = opcode_field.as_ref().and_then(|(name, _)| self.catalog.lookup(name));
            let tag = opcode_field
                .as_ref()
                .map(|(name, _)| self.opcodes.resolve(Id::intern(name)))
                .unwrap_or(OpcodeTag::Undefined);
            let form = info.map(|i| i.operand_form).unwrap_or(OperandForm::Ignored);

            let loc_before = self.loc_ctr;
            let operands = self.dispatch_operand_form(form, &operand_text, sink, range);

            let def_len = self.execute_definitions(opcode_upper.as_deref(), label.as_ref(), &operands, loc_before, start_ip, sink, range);

            // Inline-handled CA control statements advance `ip` themselves via
            // `dispatch_branch`; everything else just moves past the lines
            // this logical statement consumed.
            let jumped = self.handle_branch_or_varset(opcode_field.as_ref().map(|(n, _)| n.as_str()), label.as_ref(), &operands, sink, range, start_ip);
            if !jumped {
                self.frames.last_mut().unwrap().ip = start_ip + consumed;
            }

            match def_len {
                Some(len) => self.loc_ctr += len,
                None => self.advance_loc_ctr(&tag, &operands),
            }

            return StepResult::Yielded(StatementOutcome { label, opcode: opcode_field, operands, range, loc_ctr_before: loc_before });
        }
    }

    /// Advances `MacroCapture` state by one logical line: the prototype
    /// line names the macro and its parameters, `MEND` finalizes the
    /// definition into `self.macros`, everything else is cached verbatim.
    fn step_macro_capture(&mut self, opcode_upper: Option<&str>, opcode_field: &Option<(String, Range)>, line_text: &str, range: Range) {
        match self.macro_capture.take() {
            Some(MacroCapture::AwaitingPrototype) => {
                let fields = split_fields(line_text);
                let name = opcode_field.as_ref().map(|(n, _)| Id::intern(n)).unwrap_or_else(|| Id::intern("UNNAMED"));
                let operand_text: String =
                    fields.operand.map(|s| line_text.chars().skip(s.start).take(s.end - s.start).collect()).unwrap_or_default();
                self.macro_capture = Some(MacroCapture::Body { name, operand_text, body: Vec::new(), defined_at: range });
            }
            Some(MacroCapture::Body { name, operand_text, mut body, defined_at }) => {
                if opcode_upper == Some("MEND") {
                    let def = parse_prototype(name, &operand_text, body, defined_at);
                    self.macros.define(def);
                    self.macro_capture = None;
                } else {
                    body.push(line_text.to_string());
                    self.macro_capture = Some(MacroCapture::Body { name, operand_text, body, defined_at });
                }
            }
            None => {}
        }
    }

    /// Binds a call's arguments against the macro's prototype, substitutes
    /// every `&name`/`&SYSLIST(n)` reference in its cached body, and pushes
    /// the result as a new frame so the substituted lines are re-lexed and
    /// parsed exactly like ordinary source.
    fn expand_macro_call(&mut self, name: Id, operand_text: &str, range: Range) -> Vec<MacroArg> {
        let Some(def) = self.macros.lookup(name).cloned() else { return Vec::new() };
        let args = parse_macro_args(operand_text, range);
        let bindings = bind_arguments(&def, &args);
        let list = syslist(&args);
        let expanded: Vec<String> = def.body.iter().map(|line| substitute_line(line, &bindings, &list)).collect();
        self.push_frame(ProcessingKind::MacroDef, expanded);
        args
    }

    fn dispatch_operand_form(
        &mut self,
        form: OperandForm,
        text: &str,
        sink: &mut dyn DiagnosticConsumer,
        range: Range,
    ) -> ParsedOperands {
        match form {
            OperandForm::CaExpr => {
                let spans = split_operands(text);
                let mut exprs = Vec::new();
                for sp in spans {
                    let slice: String = text.chars().skip(sp.start).take(sp.end - sp.start).collect();
                    if slice.is_empty() {
                        continue;
                    }
                    match parse_ca_expr(&slice) {
                        Ok(e) => exprs.push(e),
                        Err(e) => sink.push(Diagnostic::new(e.code, Severity::Error, e.message, range)),
                    }
                }
                ParsedOperands::CaExpr(exprs)
            }
            OperandForm::CaBranch => self.parse_branch_operand(text),
            OperandForm::CaVarDef => self.parse_var_def_operand(text),
            OperandForm::Machine => ParsedOperands::Machine(raw_operands(text, range)),
            OperandForm::Asm => ParsedOperands::Asm(raw_operands(text, range)),
            OperandForm::Data => ParsedOperands::Data(raw_operands(text, range)),
            OperandForm::Mac => ParsedOperands::Mac(parse_macro_args(text, range)),
            OperandForm::NoOp => ParsedOperands::NoOp,
            OperandForm::Ignored => ParsedOperands::Ignored,
            OperandForm::Deferred => {
                ParsedOperands::Deferred(super::lexer::Lexer::new(text).tokenize())
            }
        }
    }

    fn parse_branch_operand(&mut self, text: &str) -> ParsedOperands {
        let trimmed = text.trim();
        if let Some(rest) = trimmed.strip_prefix('(') {
            if let Some(close) = rest.find(')') {
                let cond_text = &rest[..close];
                let targets_text = &rest[close + 1..];
                let targets_text = targets_text.strip_prefix('.').map(|_| targets_text).unwrap_or(targets_text);
                let targets: Vec<String> = targets_text.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
                let cond = parse_ca_expr(cond_text).ok();
                return ParsedOperands::CaBranch {
                    computed_selector: None,
                    condition: cond,
                    cond_text: Some(cond_text.to_string()),
                    targets,
                };
            }
        }
        let targets: Vec<String> = trimmed.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        ParsedOperands::CaBranch { computed_selector: None, condition: None, cond_text: None, targets }
    }

    fn parse_var_def_operand(&mut self, text: &str) -> ParsedOperands {
        let spans = split_operands(text);
        let mut out = Vec::new();
        for sp in spans {
            let slice: String = text.chars().skip(sp.start).take(sp.end - sp.start).collect();
            if slice.is_empty() {
                continue;
            }
            if let Some(eq) = slice.find('=') {
                let (name, value) = slice.split_at(eq);
                let value = &value[1..];
                let expr = parse_ca_expr(value).ok();
                out.push((name.trim().to_string(), None, expr));
            } else {
                out.push((slice.trim().to_string(), None, None));
            }
        }
        ParsedOperands::CaVarDef(out)
    }

    /// Executes `AIF`/`AGO`/`SETx`/`LCLx`/`GBLx` against pipeline state.
    /// Returns `true` if it changed `ip` itself (a taken branch). `SETx`
    /// names its target variable symbol in the statement's *label* field
    /// (`&N SETA 5`), not its operand field.
    fn handle_branch_or_varset(
        &mut self,
        opcode: Option<&str>,
        label: Option<&(Id, Range)>,
        operands: &ParsedOperands,
        sink: &mut dyn DiagnosticConsumer,
        range: Range,
        start_ip: usize,
    ) -> bool {
        let Some(opcode) = opcode else { return false };
        let upper = opcode.to_ascii_uppercase();
        match (upper.as_str(), operands) {
            ("AIF", ParsedOperands::CaBranch { condition: Some(cond), cond_text, targets, .. }) => {
                let shortcircuit = cond_text.as_deref().and_then(|text| {
                    try_type_attr_shortcircuit(text, |sym| {
                        self.ordinary.get(Id::intern(sym)).map(|s| s.attrs.t).unwrap_or('U')
                    })
                });
                let taken = match shortcircuit {
                    Some(b) => b,
                    None => {
                        let mut ctx = PipelineCtx { ordinary: &mut self.ordinary, variables: &mut self.variables, frames: &self.frames, current_from: start_ip };
                        match resolve_expression_tree(cond, Some(CaType::B), &mut ctx) {
                            Ok(CaValue::B(b)) => b,
                            Ok(_) => false,
                            Err(e) => {
                                sink.push(Diagnostic::new(e.code, Severity::Error, e.message, range));
                                return false;
                            }
                        }
                    }
                };
                if taken {
                    self.jump_to_target(targets.first(), sink, range)
                } else {
                    false
                }
            }
            ("AGO", ParsedOperands::CaBranch { targets, .. }) => self.jump_to_target(targets.first(), sink, range),
            ("SETA", ParsedOperands::CaExpr(exprs)) | ("SETB", ParsedOperands::CaExpr(exprs)) | ("SETC", ParsedOperands::CaExpr(exprs)) => {
                let Some((id, _)) = label else {
                    sink.push(Diagnostic::new("M003", Severity::Error, format!("{upper} requires a variable symbol in the label field"), range));
                    return false;
                };
                let kind = match upper.as_str() {
                    "SETA" => CaType::A,
                    "SETB" => CaType::B,
                    _ => CaType::C,
                };
                if self.variables.kind_of(*id).is_none() {
                    self.variables.declare(*id, VarScope::Local(0), kind);
                }
                if let Some(expr) = exprs.first() {
                    let mut ctx = PipelineCtx { ordinary: &mut self.ordinary, variables: &mut self.variables, frames: &self.frames, current_from: start_ip };
                    match resolve_expression_tree(expr, Some(kind), &mut ctx) {
                        Ok(v) => {
                            let _ = self.variables.set_scalar(*id, v);
                        }
                        Err(e) => sink.push(Diagnostic::new(e.code, Severity::Error, e.message, range)),
                    }
                }
                false
            }
            ("LCLA", ParsedOperands::CaVarDef(defs)) => self.declare_vars(defs, VarScope::Local(0), CaType::A),
            ("LCLB", ParsedOperands::CaVarDef(defs)) => self.declare_vars(defs, VarScope::Local(0), CaType::B),
            ("LCLC", ParsedOperands::CaVarDef(defs)) => self.declare_vars(defs, VarScope::Local(0), CaType::C),
            ("GBLA", ParsedOperands::CaVarDef(defs)) => self.declare_vars(defs, VarScope::Global, CaType::A),
            ("GBLB", ParsedOperands::CaVarDef(defs)) => self.declare_vars(defs, VarScope::Global, CaType::B),
            ("GBLC", ParsedOperands::CaVarDef(defs)) => self.declare_vars(defs, VarScope::Global, CaType::C),
            _ => false,
        }
    }

    /// Executes `EQU`/`DC`/`DS`/`OPSYN` against the ordinary-symbol and
    /// opcode tables during the normal (non-lookahead) pass. Returns the
    /// number of bytes a `DC`/`DS` reserves, so the caller can advance
    /// `loc_ctr` by the real per-type length instead of the generic
    /// machine-instruction estimate.
    fn execute_definitions(
        &mut self,
        opcode: Option<&str>,
        label: Option<&(Id, Range)>,
        operands: &ParsedOperands,
        loc_before: i64,
        start_ip: usize,
        sink: &mut dyn DiagnosticConsumer,
        range: Range,
    ) -> Option<i64> {
        let opcode = opcode?.to_ascii_uppercase();
        if opcode == "AREAD" {
            self.execute_aread(label, sink, range);
            return None;
        }
        let ParsedOperands::Asm(raws) = operands else { return None };
        match opcode.as_str() {
            "EQU" => {
                let value_expr = raws.first().and_then(|r| parse_ca_expr(&r.text).ok());
                let mut value = 0i64;
                if let Some(e) = &value_expr {
                    let mut ctx = PipelineCtx { ordinary: &mut self.ordinary, variables: &mut self.variables, frames: &self.frames, current_from: start_ip };
                    if let Ok(CaValue::A(n)) = resolve_expression_tree(e, Some(CaType::A), &mut ctx) {
                        value = n as i64;
                    }
                }
                let operand_text = raws.iter().map(|r| r.text.clone()).collect::<Vec<_>>().join(",");
                let attrs = super::lookahead::attrs_from_equ(&operand_text);
                if let Some((id, _)) = label {
                    self.define_label_value(*id, value, attrs, range, sink);
                }
                None
            }
            "DC" | "DS" => {
                let is_dc = opcode == "DC";
                let mut total: i64 = 0;
                let mut first_attrs = Attributes::default();
                for (idx, r) in raws.iter().enumerate() {
                    let Some(op) = super::datadef::parse_operand(&r.text) else { continue };
                    let (attrs, diags) = super::datadef::validate(&op, is_dc);
                    for d in diags {
                        sink.push(Diagnostic::new(d.code, Severity::Warning, d.message, r.range));
                    }
                    let dup = op.modifiers.duplication.unwrap_or(1).max(0).max(1);
                    total += attrs.length * dup;
                    if idx == 0 {
                        first_attrs = Attributes { t: attrs.ty_code, l: attrs.length as i32, s: attrs.scale as i32, i: attrs.integer as i32, d: true, ..Attributes::default() };
                    }
                }
                if let Some((id, _)) = label {
                    self.define_label_value(*id, loc_before, first_attrs, range, sink);
                }
                Some(total.max(1))
            }
            "OPSYN" => {
                if let (Some((name, _)), Some(target)) = (label, raws.first()) {
                    self.opcodes.opsyn(*name, Id::intern(target.text.trim()));
                }
                None
            }
            "COPY" => {
                if let Some(member) = raws.first() {
                    self.request_library(member.text.trim().to_string());
                }
                None
            }
            "MNOTE" => {
                self.execute_mnote(raws, sink, range);
                None
            }
            _ => None,
        }
    }

    /// `MNOTE severity,'message'`: `severity` is `*` for
    /// the assembler's own maximum, blank for a comment-only note, or a
    /// number 0-255. Emitted as a diagnostic at the note's own severity
    /// rather than always as an error, since a low-severity MNOTE is
    /// informational by design.
    fn execute_mnote(&mut self, raws: &[RawOperand], sink: &mut dyn DiagnosticConsumer, range: Range) {
        if raws.is_empty() {
            return;
        }
        let (sev_text, message) = if raws.len() >= 2 {
            (raws[0].text.trim().to_string(), raws[1].text.trim().trim_matches('\'').to_string())
        } else {
            (String::new(), raws[0].text.trim().trim_matches('\'').to_string())
        };
        let severity = if sev_text == "*" {
            Severity::Error
        } else {
            match sev_text.parse::<u32>() {
                Ok(0) | Err(_) => Severity::Info,
                Ok(n) if n < 8 => Severity::Warning,
                Ok(_) => Severity::Error,
            }
        };
        let code: &'static str = match severity {
            Severity::Error => "M999",
            Severity::Warning => "M500",
            Severity::Info => "M000",
        };
        sink.push(Diagnostic::new(code, severity, message, range));
    }

    /// `&VAR AREAD`: consumes the next physical line of
    /// the *enclosing* frame's source -- not the macro body currently
    /// executing -- and assigns it verbatim to `&VAR` as a `SETC` value.
    /// Only legal inside a macro expansion; outside one there is no
    /// enclosing frame to read from and the statement is a no-op.
    fn execute_aread(&mut self, label: Option<&(Id, Range)>, sink: &mut dyn DiagnosticConsumer, range: Range) {
        let Some((id, _)) = label else { return };
        let Some(enclosing) = self.frames.len().checked_sub(2) else { return };
        let line = self.frames.get(enclosing).and_then(|f| f.lines.get(f.ip)).cloned();
        if let Some(frame) = self.frames.get_mut(enclosing) {
            frame.ip += 1;
        }
        let text = line.unwrap_or_default();
        if self.variables.kind_of(*id).is_none() {
            self.variables.declare(*id, VarScope::Local(0), CaType::C);
        }
        if let Err(e) = self.variables.set_scalar(*id, CaValue::C(text)) {
            sink.push(Diagnostic::new(e.code, Severity::Error, e.message, range));
        }
    }

    fn declare_vars(&mut self, defs: &[(String, Option<super::ca_expr::Expr>, Option<super::ca_expr::Expr>)], scope: VarScope, kind: CaType) -> bool {
        for (name, ..) in defs {
            self.variables.declare(Id::intern(name), scope, kind);
        }
        false
    }

    fn jump_to_target(&mut self, target: Option<&String>, sink: &mut dyn DiagnosticConsumer, range: Range) -> bool {
        let Some(target) = target else { return false };
        let id = Id::intern(target);
        self.sequences.mark_used(id);
        let frame = self.frames.last_mut().unwrap();
        if let Some(&line) = frame.seq_index.get(&id) {
            frame.ip = line;
            true
        } else {
            sink.push(Diagnostic::new("E065", Severity::Error, format!("sequence symbol `{target}` not found"), range));
            false
        }
    }

    fn advance_loc_ctr(&mut self, tag: &OpcodeTag, operands: &ParsedOperands) {
        match (tag, operands) {
            (OpcodeTag::MachineInstr, _) => self.loc_ctr += 4,
            (OpcodeTag::AsmInstr, ParsedOperands::Data(raws)) => {
                for r in raws {
                    self.loc_ctr += estimate_data_length(&r.text);
                }
            }
            _ => {}
        }
    }

    /// Called by the host when a `COPY`/macro-library lookup failed and it
    /// has now fetched the text; resumes where `NeedLibrary` left off.
    pub fn supply_library(&mut self, kind: ProcessingKind, lines: Vec<String>) {
        self.push_frame(kind, lines);
    }

    pub fn request_library(&mut self, name: String) {
        self.pending_library = Some(name);
    }

    pub fn define_label_value(&mut self, id: Id, value: i64, attrs: Attributes, at: Range, sink: &mut dyn DiagnosticConsumer) {
        if let Err(e) = self.ordinary.define(id, value, attrs, at) {
            sink.push(Diagnostic::new(e.code, Severity::Error, e.message, at));
        }
    }
}

fn estimate_data_length(raw: &str) -> i64 {
    // Rough duplication-aware estimate good enough for label-value
    // progression in the absence of a real codegen pass; `core::datadef`
    // owns the precise per-type length computation used for `L'`.
    raw.len().max(1) as i64
}

fn raw_operands(text: &str, range: Range) -> Vec<RawOperand> {
    split_operands(text)
        .into_iter()
        .map(|sp| RawOperand { text: text.chars().skip(sp.start).take(sp.end - sp.start).collect(), range })
        .filter(|r: &RawOperand| !r.text.is_empty())
        .collect()
}

fn parse_macro_args(text: &str, range: Range) -> Vec<super::parser::MacroArg> {
    split_operands(text)
        .into_iter()
        .filter_map(|sp| {
            let slice: String = text.chars().skip(sp.start).take(sp.end - sp.start).collect();
            if slice.is_empty() {
                return None;
            }
            if let Some(eq) = slice.find('=') {
                let (k, v) = slice.split_at(eq);
                Some(super::parser::MacroArg { keyword: Some(k.trim().to_string()), value: v[1..].to_string(), range })
            } else {
                Some(super::parser::MacroArg { keyword: None, value: slice, range })
            }
        })
        .collect()
}

fn seed_builtin_opcodes(table: &mut OpcodeTable, catalog: &dyn InstructionCatalog) {
    for name in ["MVC", "MVI", "LA", "L", "ST", "LR", "BR", "BC", "CLC", "DC", "DS", "EQU", "CSECT", "DSECT", "USING", "DROP", "OPSYN", "ICTL", "END", "COPY", "MNOTE", "AREAD", "AIF", "AGO", "SETA", "SETB", "SETC", "LCLA", "LCLB", "LCLC", "GBLA", "GBLB", "GBLC", "MACRO", "MEND", "MEXIT"] {
        if let Some(info) = catalog.lookup(name) {
            table.seed(Id::intern(name), info.tag);
        }
    }
}

/// Bridges `ca_expr::EvalContext` to the pipeline's symbol tables. An
/// attribute query against a symbol not yet defined triggers an immediate
/// lookahead scan of the rest of the current frame (`core::lookahead`)
/// instead of failing outright; a symbol the scan cannot
/// find either is given the standard "never defined" attributes (`T='U'`,
/// everything else zero) rather than treated as an error, since `T'` of an
/// undefined symbol is well-defined by itself.
struct PipelineCtx<'p> {
    ordinary: &'p mut OrdinaryTable,
    variables: &'p mut VariableTable,
    frames: &'p [Frame],
    current_from: usize,
}

/// Scans the innermost-active frame forward from `current_from`, then
/// each enclosing frame forward from where it is paused (its own `ip`),
/// so a lookahead query made from inside a macro expansion still finds a
/// symbol defined later in the *calling* source.
fn scan_across_frames(frames: &[Frame], current_from: usize, target: &str) -> Option<(Attributes, Range)> {
    let n = frames.len();
    for i in (0..n).rev() {
        let frame = &frames[i];
        let from = if i == n - 1 { current_from } else { frame.ip };
        if let Some((attrs, at, _)) = scan_for_definition(&frame.lines, from, target) {
            return Some((attrs, at));
        }
    }
    None
}

fn attrs_to_value(attr: char, attrs: &Attributes) -> CaValue {
    match attr {
        'T' => CaValue::C(attrs.t.to_string()),
        'L' => CaValue::A(attrs.l),
        'S' => CaValue::A(attrs.s),
        'I' => CaValue::A(attrs.i),
        'D' => CaValue::B(attrs.d),
        'O' => CaValue::C(attrs.o.to_string()),
        'P' => CaValue::C(attrs.p.to_string()),
        'A' => CaValue::A(attrs.a as i32),
        _ => CaValue::B(false),
    }
}

impl<'p> EvalContext for PipelineCtx<'p> {
    fn lookup_var(&mut self, id: Id) -> Option<CaValue> {
        self.variables.get_scalar(id)
    }
    fn lookup_attr(&mut self, attr: char, symbol: Id) -> Option<CaValue> {
        if let Some(sym) = self.ordinary.get(symbol) {
            return Some(attrs_to_value(attr, &sym.attrs));
        }
        self.ordinary.demand_attribute(symbol);
        match scan_across_frames(self.frames, self.current_from, symbol.text()) {
            Some((attrs, at)) => {
                self.ordinary.seed_attributes(symbol, attrs, at);
                Some(attrs_to_value(attr, &attrs))
            }
            None => Some(attrs_to_value(attr, &Attributes::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::catalog::BuiltinCatalog;
    use crate::core::diagnostics::Collect;

    fn run(lines: Vec<&str>) -> (Vec<StatementOutcome>, Vec<Diagnostic>) {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(lines.into_iter().map(String::from).collect(), &catalog, ColumnLayout::default());
        let mut sink = Collect::default();
        let mut out = Vec::new();
        loop {
            match p.step(&mut sink) {
                StepResult::Yielded(s) => out.push(s),
                StepResult::Finished => break,
                StepResult::NeedLibrary(_) => break,
            }
        }
        (out, sink.diagnostics)
    }

    #[test]
    fn forward_ago_jumps_past_intervening_statements() {
        let (_out, diags) = run(vec![
            "         AGO   .SKIP",
            "         MVC   0(1,1),0(1)",
            ".SKIP    EQU   1",
        ]);
        assert!(diags.iter().all(|d| d.code != "E065"));
    }

    #[test]
    fn seta_updates_variable_table() {
        let (_out, diags) = run(vec!["         LCLA  &N", "&N       SETA  5"]);
        assert!(diags.is_empty());
    }

    #[test]
    fn unknown_sequence_target_is_diagnosed() {
        let (_out, diags) = run(vec!["         AGO   .NOWHERE"]);
        assert!(diags.iter().any(|d| d.code == "E065"));
    }

    #[test]
    fn equ_defines_ordinary_symbol_value_and_length() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(vec!["X        EQU   1,10,C'T'".to_string()], &catalog, ColumnLayout::default());
        let mut sink = Collect::default();
        loop {
            match p.step(&mut sink) {
                StepResult::Finished | StepResult::NeedLibrary(_) => break,
                StepResult::Yielded(_) => {}
            }
        }
        let sym = p.ordinary.get(Id::intern("X")).unwrap();
        assert_eq!(sym.value, Some(1));
        assert_eq!(sym.attrs.l, 10);
    }

    #[test]
    fn dc_defines_symbol_at_location_counter_with_type_length() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(vec!["LBL      DC    F'1'".to_string()], &catalog, ColumnLayout::default());
        let mut sink = Collect::default();
        loop {
            match p.step(&mut sink) {
                StepResult::Finished | StepResult::NeedLibrary(_) => break,
                StepResult::Yielded(_) => {}
            }
        }
        let sym = p.ordinary.get(Id::intern("LBL")).unwrap();
        assert_eq!(sym.value, Some(0));
        assert_eq!(sym.attrs.t, 'F');
        assert_eq!(sym.attrs.l, 4);
        assert_eq!(p.loc_ctr, 4);
    }

    #[test]
    fn aif_type_attr_shortcircuit_branches_and_skips_the_forward_scan() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(
            vec!["         AIF   (T'UNDEF EQ 'U').SKIP".to_string(), "         MVC   0(1,1),0(1)".to_string(), ".SKIP    EQU   1".to_string()],
            &catalog,
            ColumnLayout::default(),
        );
        let mut sink = Collect::default();
        loop {
            match p.step(&mut sink) {
                StepResult::Finished | StepResult::NeedLibrary(_) => break,
                StepResult::Yielded(_) => {}
            }
        }
        assert!(sink.diagnostics.iter().all(|d| d.code != "E065"));
        assert!(p.ordinary.take_pending_demands().is_empty());
    }

    #[test]
    fn opsyn_makes_new_mnemonic_resolve_as_target() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(vec!["MOVE     OPSYN MVC".to_string()], &catalog, ColumnLayout::default());
        let mut sink = Collect::default();
        loop {
            match p.step(&mut sink) {
                StepResult::Finished | StepResult::NeedLibrary(_) => break,
                StepResult::Yielded(_) => {}
            }
        }
        assert_eq!(p.opcodes.resolve(Id::intern("MOVE")), OpcodeTag::MachineInstr);
    }

    #[test]
    fn copy_statement_requests_the_named_library() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(vec!["         COPY  MYMEMB".to_string()], &catalog, ColumnLayout::default());
        let mut sink = Collect::default();
        assert!(matches!(p.step(&mut sink), StepResult::Yielded(_)));
        assert!(matches!(p.step(&mut sink), StepResult::NeedLibrary(name) if name == "MYMEMB"));
    }

    #[test]
    fn supplied_copy_text_is_processed_as_a_frame() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(vec!["         COPY  MYMEMB".to_string()], &catalog, ColumnLayout::default());
        let mut sink = Collect::default();
        let _ = p.step(&mut sink);
        match p.step(&mut sink) {
            StepResult::NeedLibrary(name) => assert_eq!(name, "MYMEMB"),
            _ => panic!("expected NeedLibrary"),
        }
        p.supply_library(ProcessingKind::CopyDef, vec!["COPIED   EQU   7".to_string()]);
        loop {
            match p.step(&mut sink) {
                StepResult::Finished | StepResult::NeedLibrary(_) => break,
                StepResult::Yielded(_) => {}
            }
        }
        let sym = p.ordinary.get(Id::intern("COPIED")).unwrap();
        assert_eq!(sym.value, Some(7));
    }

    #[test]
    fn mnote_emits_a_diagnostic_at_its_own_severity() {
        let (_out, diags) = run(vec!["         MNOTE 4,'careful here'"]);
        assert!(diags.iter().any(|d| d.code == "M500" && d.message == "careful here"));
    }

    #[test]
    fn aread_reads_next_line_of_the_calling_frame_into_a_setc_variable() {
        let catalog = BuiltinCatalog;
        let mut p = Pipeline::new(vec!["         MYMAC".to_string(), "THIS IS INPUT".to_string()], &catalog, ColumnLayout::default());
        p.macros.define(parse_prototype(Id::intern("MYMAC"), "", vec!["&LINE    AREAD".to_string()], Range::default()));
        let mut sink = Collect::default();
        loop {
            match p.step(&mut sink) {
                StepResult::Finished | StepResult::NeedLibrary(_) => break,
                StepResult::Yielded(_) => {}
            }
        }
        assert_eq!(p.variables.get_scalar(Id::intern("&LINE")), Some(CaValue::C("THIS IS INPUT".to_string())));
    }
}
