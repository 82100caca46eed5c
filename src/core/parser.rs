//! The two-form recursive-descent parser.
//!
//! "Two-form" refers to : operand fields are parsed either
//! *resolved* (built into the form-specific AST below, the ordinary path)
//! or *deferred* (kept as a raw token span, used by macro-definition
//! capture and lookahead so a model statement or skipped body can be
//! re-parsed later once substitution has happened). The parser itself
//! never decides which: the processing pipeline (`core::pipeline`) tells
//! it which `OperandForm` to build for a given statement, based on the
//! current processing kind and the opcode's catalog entry.

use super::ca_expr::{ArithOp, BoolOp, CmpOp, Expr};
use super::lexer::{Lexer, Token, TokenKind};
use super::Range;

#[derive(Clone, Copy, Debug)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// The four statement fields as char-offset spans into one logical line,
/// before any per-form interpretation of the operand field.
#[derive(Clone, Copy, Debug, Default)]
pub struct StatementFields {
    pub label: Option<Span>,
    pub opcode: Option<Span>,
    pub operand: Option<Span>,
    pub remark: Option<Span>,
}

/// Split a logical line into label/opcode/operand/remark fields. A blank
/// column 1 means there is no label; the operand field ends at the first
/// blank outside a string literal and outside parentheses, which is where
/// the (optional) remark begins.
pub fn split_fields(line: &str) -> StatementFields {
    let chars: Vec<char> = line.chars().collect();
    let mut idx = 0usize;
    let mut fields = StatementFields::default();

    if chars.first() == Some(&'*') {
        // whole-line comment: no label/opcode/operand, everything is remark.
        fields.remark = Some(Span { start: 0, end: chars.len() });
        return fields;
    }

    if idx < chars.len() && chars[idx] != ' ' {
        let start = idx;
        while idx < chars.len() && chars[idx] != ' ' {
            idx += 1;
        }
        fields.label = Some(Span { start, end: idx });
    }
    skip_blanks(&chars, &mut idx);

    if idx < chars.len() {
        let start = idx;
        while idx < chars.len() && chars[idx] != ' ' {
            idx += 1;
        }
        fields.opcode = Some(Span { start, end: idx });
    }
    skip_blanks(&chars, &mut idx);

    let operand_start = idx;
    let mut depth = 0i32;
    let mut in_str = false;
    while idx < chars.len() {
        let c = chars[idx];
        if in_str {
            if c == '\'' {
                if chars.get(idx + 1) == Some(&'\'') {
                    idx += 2;
                    continue;
                }
                in_str = false;
            }
            idx += 1;
            continue;
        }
        match c {
            '\'' => {
                in_str = true;
                idx += 1;
            }
            '(' => {
                depth += 1;
                idx += 1;
            }
            ')' => {
                depth = (depth - 1).max(0);
                idx += 1;
            }
            ' ' if depth == 0 => break,
            _ => idx += 1,
        }
    }
    if idx > operand_start {
        fields.operand = Some(Span { start: operand_start, end: idx });
    }
    skip_blanks(&chars, &mut idx);
    if idx < chars.len() {
        fields.remark = Some(Span { start: idx, end: chars.len() });
    }
    fields
}

fn skip_blanks(chars: &[char], idx: &mut usize) {
    while *idx < chars.len() && chars[*idx] == ' ' {
        *idx += 1;
    }
}

/// Split an operand field's text into top-level comma-separated operand
/// spans, respecting string literals and parenthesis nesting.
pub fn split_operands(text: &str) -> Vec<Span> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans = Vec::new();
    let mut start = 0usize;
    let mut idx = 0usize;
    let mut depth = 0i32;
    let mut in_str = false;
    while idx < chars.len() {
        let c = chars[idx];
        if in_str {
            if c == '\'' {
                if chars.get(idx + 1) == Some(&'\'') {
                    idx += 2;
                    continue;
                }
                in_str = false;
            }
            idx += 1;
            continue;
        }
        match c {
            '\'' => {
                in_str = true;
                idx += 1;
            }
            '(' => {
                depth += 1;
                idx += 1;
            }
            ')' => {
                depth = (depth - 1).max(0);
                idx += 1;
            }
            ',' if depth == 0 => {
                spans.push(Span { start, end: idx });
                idx += 1;
                start = idx;
            }
            _ => idx += 1,
        }
    }
    if start < chars.len() || !chars.is_empty() {
        spans.push(Span { start, end: chars.len() });
    }
    spans
}

/// A raw, unresolved operand -- used for `Machine`/`Asm` forms, where the
/// instruction catalog (an external collaborator, `core::catalog`) is the
/// one that knows how to interpret operand syntax further.
#[derive(Clone, Debug)]
pub struct RawOperand {
    pub text: String,
    pub range: Range,
}

#[derive(Clone, Debug)]
pub struct MacroArg {
    pub keyword: Option<String>,
    pub value: String,
    pub range: Range,
}

#[derive(Clone, Debug)]
pub enum ParsedOperands {
    CaExpr(Vec<Expr>),
    /// `AIF (bool-expr).target` / `AGO target` / computed `AGO (arith).t1,t2,...`.
    CaBranch {
        computed_selector: Option<Expr>,
        condition: Option<Expr>,
        /// The condition's original source text, kept alongside the parsed
        /// tree so the lookahead resolver's `T'` short-circuit can pattern
        /// match on it ahead of a full evaluation.
        cond_text: Option<String>,
        targets: Vec<String>,
    },
    /// `LCLx`/`GBLx` name lists, or `SETx name(sub),expr` assignments.
    CaVarDef(Vec<(String, Option<Expr>, Option<Expr>)>),
    Machine(Vec<RawOperand>),
    Asm(Vec<RawOperand>),
    Data(Vec<RawOperand>),
    Mac(Vec<MacroArg>),
    NoOp,
    Ignored,
    Deferred(Vec<Token>),
}

#[derive(Clone, Debug)]
pub struct ParseDiag {
    pub code: &'static str,
    pub message: String,
}
fn perr(code: &'static str, message: impl Into<String>) -> ParseDiag {
    ParseDiag { code, message: message.into() }
}

/// Parse one operand span's text as a CA expression, producing a tree the
/// pipeline hands to `ca_expr::resolve_expression_tree`.
pub fn parse_ca_expr(text: &str) -> Result<Expr, ParseDiag> {
    let tokens = Lexer::new(text).tokenize();
    let mut p = ExprParser { tokens, pos: 0 };
    let expr = p.parse_or()?;
    p.expect_eof()?;
    Ok(expr)
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }
    fn bump(&mut self) -> Token {
        let t = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        t
    }
    fn expect_eof(&self) -> Result<(), ParseDiag> {
        match self.peek().kind {
            TokenKind::Eof => Ok(()),
            _ => Err(perr("S100", format!("unexpected trailing text `{}`", self.peek().text))),
        }
    }
    fn is_keyword(&self, kw: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::OrdSymbol) && self.peek().text.eq_ignore_ascii_case(kw)
    }

    /// Consumes a trailing `NOT` keyword (for the `AND NOT`/`OR NOT`/
    /// `XOR NOT` compound operators) and returns whether it was present.
    fn eat_trailing_not(&mut self) -> bool {
        if self.is_keyword("NOT") {
            self.bump();
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseDiag> {
        let mut lhs = self.parse_and()?;
        while self.is_keyword("OR") || self.is_keyword("XOR") {
            let op = if self.is_keyword("OR") { BoolOp::Or } else { BoolOp::Xor };
            self.bump();
            let negate_rhs = self.eat_trailing_not();
            let mut rhs = self.parse_and()?;
            if negate_rhs {
                rhs = Expr::Bool { op: BoolOp::Not, lhs: Box::new(rhs), rhs: None };
            }
            lhs = Expr::Bool { op, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
        }
        Ok(lhs)
    }
    fn parse_and(&mut self) -> Result<Expr, ParseDiag> {
        let mut lhs = self.parse_not()?;
        while self.is_keyword("AND") {
            self.bump();
            let negate_rhs = self.eat_trailing_not();
            let mut rhs = self.parse_not()?;
            if negate_rhs {
                rhs = Expr::Bool { op: BoolOp::Not, lhs: Box::new(rhs), rhs: None };
            }
            lhs = Expr::Bool { op: BoolOp::And, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
        }
        Ok(lhs)
    }
    fn parse_not(&mut self) -> Result<Expr, ParseDiag> {
        if self.is_keyword("NOT") {
            self.bump();
            let e = self.parse_not()?;
            return Ok(Expr::Bool { op: BoolOp::Not, lhs: Box::new(e), rhs: None });
        }
        self.parse_cmp()
    }
    fn parse_cmp(&mut self) -> Result<Expr, ParseDiag> {
        let lhs = self.parse_concat()?;
        let op = if self.is_keyword("EQ") { Some(CmpOp::Eq) }
            else if self.is_keyword("NE") { Some(CmpOp::Ne) }
            else if self.is_keyword("LT") { Some(CmpOp::Lt) }
            else if self.is_keyword("LE") { Some(CmpOp::Le) }
            else if self.is_keyword("GT") { Some(CmpOp::Gt) }
            else if self.is_keyword("GE") { Some(CmpOp::Ge) }
            else { None };
        if let Some(op) = op {
            self.bump();
            let rhs = self.parse_concat()?;
            return Ok(Expr::Cmp { op, lhs: Box::new(lhs), rhs: Box::new(rhs) });
        }
        Ok(lhs)
    }
    fn parse_concat(&mut self) -> Result<Expr, ParseDiag> {
        let mut lhs = self.parse_add()?;
        while matches!(self.peek().kind, TokenKind::Dot) {
            self.bump();
            let rhs = self.parse_add()?;
            lhs = Expr::Concat(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }
    fn parse_add(&mut self) -> Result<Expr, ParseDiag> {
        let mut lhs = self.parse_shift()?;
        loop {
            match self.peek().kind {
                TokenKind::Plus => {
                    self.bump();
                    let rhs = self.parse_shift()?;
                    lhs = Expr::Arith { op: ArithOp::Add, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
                }
                TokenKind::Minus => {
                    self.bump();
                    let rhs = self.parse_shift()?;
                    lhs = Expr::Arith { op: ArithOp::Sub, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
                }
                _ => break,
            }
        }
        Ok(lhs)
    }
    /// `SLA`/`SLL`/`SRA`/`SRL` bind tighter than `+`/`-` but looser than
    /// `*`/`/` (precedence table).
    fn parse_shift(&mut self) -> Result<Expr, ParseDiag> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = if self.is_keyword("SLA") { Some(ArithOp::Sla) }
                else if self.is_keyword("SLL") { Some(ArithOp::Sll) }
                else if self.is_keyword("SRA") { Some(ArithOp::Sra) }
                else if self.is_keyword("SRL") { Some(ArithOp::Srl) }
                else { None };
            let Some(op) = op else { break };
            self.bump();
            let rhs = self.parse_mul()?;
            lhs = Expr::Arith { op, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
        }
        Ok(lhs)
    }
    fn parse_mul(&mut self) -> Result<Expr, ParseDiag> {
        let mut lhs = self.parse_unary()?;
        loop {
            match self.peek().kind {
                TokenKind::Star => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Arith { op: ArithOp::Mul, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
                }
                TokenKind::Slash => {
                    self.bump();
                    let rhs = self.parse_unary()?;
                    lhs = Expr::Arith { op: ArithOp::Div, lhs: Box::new(lhs), rhs: Some(Box::new(rhs)) };
                }
                _ => break,
            }
        }
        Ok(lhs)
    }
    fn parse_unary(&mut self) -> Result<Expr, ParseDiag> {
        if matches!(self.peek().kind, TokenKind::Minus) {
            self.bump();
            let e = self.parse_unary()?;
            return Ok(Expr::Arith { op: ArithOp::Neg, lhs: Box::new(e), rhs: None });
        }
        if matches!(self.peek().kind, TokenKind::Plus) {
            self.bump();
            return self.parse_unary();
        }
        self.parse_primary()
    }
    fn parse_primary(&mut self) -> Result<Expr, ParseDiag> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Numeric => {
                self.bump();
                let n: i32 = tok.text.parse().map_err(|_| perr("S100", format!("`{}` does not fit in an arithmetic term", tok.text)))?;
                // A numeric literal immediately followed by a string is a
                // duplication factor, e.g. `3'AB'`.
                if matches!(self.peek().kind, TokenKind::StringLit) {
                    let str_tok = self.bump();
                    let dup = Expr::Dup { factor: Box::new(Expr::LitA(n)), of: Box::new(Expr::LitC(str_tok.text)) };
                    return self.maybe_substring(dup);
                }
                Ok(Expr::LitA(n))
            }
            TokenKind::StringLit => {
                self.bump();
                self.maybe_substring(Expr::LitC(tok.text))
            }
            TokenKind::LParen => {
                self.bump();
                let e = self.parse_or()?;
                self.expect(TokenKind::RParen)?;
                Ok(e)
            }
            TokenKind::Attr(attr) => {
                self.bump();
                let name_tok = self.bump();
                Ok(Expr::AttrRef { attr, symbol: super::Id::intern(&name_tok.text) })
            }
            TokenKind::Ampersand => {
                self.bump();
                let name_tok = self.bump();
                let mut full = String::from("&");
                full.push_str(&name_tok.text);
                Ok(Expr::VarRef(super::Id::intern(&full)))
            }
            TokenKind::OrdSymbol => {
                self.bump();
                if matches!(self.peek().kind, TokenKind::LParen) {
                    if let Some(func) = super::ca_expr::BuiltinFn::from_name(&tok.text) {
                        self.bump();
                        let mut args = Vec::new();
                        if !matches!(self.peek().kind, TokenKind::RParen) {
                            loop {
                                args.push(self.parse_or()?);
                                if matches!(self.peek().kind, TokenKind::Comma) {
                                    self.bump();
                                    continue;
                                }
                                break;
                            }
                        }
                        self.expect(TokenKind::RParen)?;
                        return Ok(Expr::Call { name: func, args });
                    }
                }
                Ok(Expr::VarRef(super::Id::intern(&tok.text)))
            }
            _ => Err(perr("S100", format!("unexpected token `{}`", tok.text))),
        }
    }
    /// A parenthesized `(start,count)` immediately after a character value
    /// is substring notation, never a function call --
    /// there is no other grammar production for parens directly following
    /// a string or duplicated string.
    fn maybe_substring(&mut self, of: Expr) -> Result<Expr, ParseDiag> {
        if matches!(self.peek().kind, TokenKind::LParen) {
            self.bump();
            let start = self.parse_add()?;
            self.expect(TokenKind::Comma)?;
            let count = self.parse_add()?;
            self.expect(TokenKind::RParen)?;
            return Ok(Expr::Substring { start: Box::new(start), count: Box::new(count), of: Box::new(of) });
        }
        Ok(of)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), ParseDiag> {
        if std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(&kind) {
            self.bump();
            Ok(())
        } else {
            Err(perr("S100", format!("expected {:?}, found `{}`", kind, self.peek().text)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_label_opcode_operand_remark() {
        let f = split_fields("LBL      EQU   1+2       a remark");
        assert!(f.label.is_some());
        assert!(f.opcode.is_some());
        assert!(f.operand.is_some());
        assert!(f.remark.is_some());
    }

    #[test]
    fn whole_line_comment_has_only_remark() {
        let f = split_fields("* this is a comment");
        assert!(f.label.is_none());
        assert!(f.opcode.is_none());
        assert!(f.remark.is_some());
    }

    #[test]
    fn operand_field_blank_inside_quotes_does_not_end_it() {
        let f = split_fields("         DC    C'A B'    remark");
        let op_span = f.operand.unwrap();
        let text: String = "         DC    C'A B'    remark".chars().collect::<Vec<_>>()[op_span.start..op_span.end].iter().collect();
        assert_eq!(text, "C'A B'");
    }

    #[test]
    fn split_operands_respects_parens_and_quotes() {
        let spans = split_operands("A,(B,C),'X,Y'");
        assert_eq!(spans.len(), 3);
    }

    #[test]
    fn parse_simple_arithmetic() {
        let e = parse_ca_expr("1+2*3").unwrap();
        match e {
            Expr::Arith { op: ArithOp::Add, .. } => {}
            _ => panic!("expected top-level add"),
        }
    }

    #[test]
    fn parse_attribute_and_variable_ref() {
        let e = parse_ca_expr("&X").unwrap();
        matches!(e, Expr::VarRef(_));
    }

    #[test]
    fn parse_substring_notation() {
        let e = parse_ca_expr("'ABC'(5,0)").unwrap();
        matches!(e, Expr::Substring { .. });
    }

    #[test]
    fn parse_duplication_factor() {
        let e = parse_ca_expr("3'AB'").unwrap();
        matches!(e, Expr::Dup { .. });
    }

    #[test]
    fn parse_shift_operator() {
        let e = parse_ca_expr("1 SLA 2").unwrap();
        match e {
            Expr::Arith { op: ArithOp::Sla, .. } => {}
            _ => panic!("expected SLA node"),
        }
    }

    #[test]
    fn parse_and_not_negates_rhs() {
        let e = parse_ca_expr("1 AND NOT 0").unwrap();
        match e {
            Expr::Bool { op: BoolOp::And, rhs: Some(rhs), .. } => {
                assert!(matches!(*rhs, Expr::Bool { op: BoolOp::Not, .. }));
            }
            _ => panic!("expected AND node with negated rhs"),
        }
    }
}
