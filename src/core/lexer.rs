//! The column-aware lexer and continuation engine.
//!
//! HLASM statements live in fixed columns unless overridden by `ICTL`. A
//! non-blank character in the end column means the *next* physical line
//! continues this statement, resuming at the continuation column. This
//! module turns a run of physical lines into one logical line (with a
//! position map back to physical `(line, column)` for diagnostics) and then
//! tokenizes that logical line.

use super::{Position, Range};

/// Column layout in effect for a file, 1-based column numbers as HLASM
/// programmers write them; `ICTL` can change all three on the first
/// statement of a file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnLayout {
    pub begin: usize,
    pub end: usize,
    pub continue_col: usize,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self { begin: 1, end: 72, continue_col: 16 }
    }
}

impl ColumnLayout {
    /// Apply `ICTL begin,end,continue` operands; missing operands keep the
    /// default for that slot (ICTL's own defaults are 1/71/16 in the
    /// reference assembler, but we use the ordinary 1/72/16 layout unless
    /// the operand explicitly supplies a value, matching common practice).
    pub fn from_ictl(begin: Option<usize>, end: Option<usize>, continue_col: Option<usize>) -> Self {
        let mut layout = Self::default();
        if let Some(b) = begin {
            layout.begin = b;
        }
        if let Some(e) = end {
            layout.end = e;
        }
        if let Some(c) = continue_col {
            layout.continue_col = c;
        }
        layout
    }
}

/// One logical line assembled from one or more physical lines.
pub struct LogicalLine {
    pub text: String,
    /// `char_map[i]` is the physical `(line, column)` of `text`'s `i`-th
    /// character (0-based columns, in lock-step with `super::Range`).
    pub char_map: Vec<Position>,
    /// Number of physical lines consumed to build this logical line.
    pub physical_lines: usize,
}

impl LogicalLine {
    /// Map a `[start, end)` slice of `text` back to a physical `Range`.
    /// If the slice spans more than one physical line the range covers
    /// from the first character's position to the last.
    pub fn physical_range(&self, start: usize, end: usize) -> Range {
        let end = end.max(start + 1).min(self.char_map.len() + 1);
        let start_pos = self.char_map.get(start).copied().unwrap_or_default();
        let end_pos = if end == 0 {
            start_pos
        } else {
            match self.char_map.get(end - 1) {
                Some(p) => Position::new(p.line, p.col + 1),
                None => start_pos,
            }
        };
        Range::new(start_pos, end_pos)
    }
}

/// Joins continued physical lines starting at `lines[start]` into one
/// logical line. `unlimited` disables end-column handling, used when
/// re-parsing substituted model statements, literals, or `AREAD` text
///.
pub fn join_continuation(lines: &[&str], start: usize, layout: &ColumnLayout, unlimited: bool) -> LogicalLine {
    let mut text = String::new();
    let mut char_map = Vec::new();
    let mut idx = start;
    loop {
        if idx >= lines.len() {
            break;
        }
        let chars: Vec<char> = lines[idx].chars().collect();
        let begin0 = if idx == start { layout.begin.saturating_sub(1) } else { layout.continue_col.saturating_sub(1) };
        let end0 = if unlimited { chars.len() } else { (layout.end.saturating_sub(1)).min(chars.len()) };
        let begin0 = begin0.min(chars.len());
        let field_end = end0.max(begin0);
        for (offset, c) in chars[begin0..field_end].iter().enumerate() {
            text.push(*c);
            char_map.push(Position::new(idx as u32, (begin0 + offset) as u32));
        }
        let continues = !unlimited
            && chars.get(layout.end.saturating_sub(1)).map_or(false, |c| !c.is_whitespace());
        idx += 1;
        if !continues {
            break;
        }
    }
    LogicalLine { text, char_map, physical_lines: idx - start }
}

/// Attribute-query letters recognized before an apostrophe.
pub const ATTR_LETTERS: [char; 8] = ['T', 'L', 'S', 'I', 'D', 'O', 'P', 'A'];

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    OrdSymbol,
    Numeric,
    /// Apostrophe-delimited string; `text` excludes the delimiting quotes
    /// and has `''` already collapsed to `'`.
    StringLit,
    Ampersand,
    Dot,
    Equals,
    LParen,
    RParen,
    Comma,
    Attr(char),
    Plus,
    Minus,
    Star,
    Slash,
    Eol,
    Eof,
    /// Anything the lexer could not classify; carried through so the
    /// parser can still report a precise range.
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offsets (char count, since we index `Vec<char>`) into the
    /// logical line this token came from.
    pub start: usize,
    pub end: usize,
}

/// Tokenizes one already-joined logical line.
pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    _src: &'a str,
}

impl<'a> Lexer<'a> {
    pub fn new(line: &'a str) -> Self {
        Self { chars: line.chars().collect(), pos: 0, _src: line }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
    fn peek_at(&self, off: usize) -> Option<char> {
        self.chars.get(self.pos + off).copied()
    }

    /// Tokenize the whole line. Lexical errors (unterminated string) are
    /// reported as an `Unknown` token spanning to end of line; the caller
    /// decides whether that is worth a diagnostic.
    pub fn tokenize(mut self) -> Vec<Token> {
        let mut out = Vec::new();
        loop {
            self.skip_spaces();
            let start = self.pos;
            let Some(c) = self.peek() else {
                out.push(Token { kind: TokenKind::Eof, text: String::new(), start, end: start });
                break;
            };
            let tok = match c {
                '(' => { self.pos += 1; Token { kind: TokenKind::LParen, text: "(".into(), start, end: self.pos } }
                ')' => { self.pos += 1; Token { kind: TokenKind::RParen, text: ")".into(), start, end: self.pos } }
                ',' => { self.pos += 1; Token { kind: TokenKind::Comma, text: ",".into(), start, end: self.pos } }
                '=' => { self.pos += 1; Token { kind: TokenKind::Equals, text: "=".into(), start, end: self.pos } }
                '.' => { self.pos += 1; Token { kind: TokenKind::Dot, text: ".".into(), start, end: self.pos } }
                '&' => { self.pos += 1; Token { kind: TokenKind::Ampersand, text: "&".into(), start, end: self.pos } }
                '+' => { self.pos += 1; Token { kind: TokenKind::Plus, text: "+".into(), start, end: self.pos } }
                '-' => { self.pos += 1; Token { kind: TokenKind::Minus, text: "-".into(), start, end: self.pos } }
                '*' => { self.pos += 1; Token { kind: TokenKind::Star, text: "*".into(), start, end: self.pos } }
                '/' => { self.pos += 1; Token { kind: TokenKind::Slash, text: "/".into(), start, end: self.pos } }
                '\'' => self.lex_string(start),
                c if c.is_ascii_digit() => self.lex_numeric(start),
                c if is_symbol_start(c) => self.lex_symbol_or_attr(start),
                _ => { self.pos += 1; Token { kind: TokenKind::Unknown, text: c.to_string(), start, end: self.pos } }
            };
            out.push(tok);
        }
        out
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(c) if c == ' ' || c == '\t') {
            self.pos += 1;
        }
    }

    fn lex_string(&mut self, start: usize) -> Token {
        self.pos += 1; // opening quote
        let mut text = String::new();
        loop {
            match self.peek() {
                None => {
                    return Token { kind: TokenKind::Unknown, text, start, end: self.pos };
                }
                Some('\'') => {
                    if self.peek_at(1) == Some('\'') {
                        text.push('\'');
                        self.pos += 2;
                        continue;
                    }
                    self.pos += 1; // closing quote
                    return Token { kind: TokenKind::StringLit, text, start, end: self.pos };
                }
                Some(c) => {
                    text.push(c);
                    self.pos += 1;
                }
            }
        }
    }

    fn lex_numeric(&mut self, start: usize) -> Token {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.peek().unwrap());
            self.pos += 1;
        }
        Token { kind: TokenKind::Numeric, text, start, end: self.pos }
    }

    fn lex_symbol_or_attr(&mut self, start: usize) -> Token {
        // A single attribute letter immediately followed by `'` is an ATTR
        // token rather than the start of an ordinary symbol.
        let c = self.peek().unwrap();
        // `L'sym` etc.: the apostrophe here is the attribute separator, not
        // a string delimiter, so it is consumed as part of the ATTR token
        // and the symbol name that follows lexes as an ordinary symbol.
        if ATTR_LETTERS.contains(&c.to_ascii_uppercase()) && self.peek_at(1) == Some('\'') {
            self.pos += 2;
            return Token { kind: TokenKind::Attr(c.to_ascii_uppercase()), text: c.to_string(), start, end: self.pos };
        }
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if is_symbol_continue(c)) {
            text.push(self.peek().unwrap());
            self.pos += 1;
        }
        Token { kind: TokenKind::OrdSymbol, text, start, end: self.pos }
    }
}

fn is_symbol_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '$' || c == '@' || c == '#'
}
fn is_symbol_continue(c: char) -> bool {
    is_symbol_start(c) || c.is_ascii_digit() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_is_1_72_16() {
        let l = ColumnLayout::default();
        assert_eq!((l.begin, l.end, l.continue_col), (1, 72, 16));
    }

    #[test]
    fn simple_line_has_no_continuation() {
        let lines = vec!["LABEL    EQU   1"];
        let ll = join_continuation(&lines, 0, &ColumnLayout::default(), false);
        assert_eq!(ll.physical_lines, 1);
        assert_eq!(ll.text, "LABEL    EQU   1");
    }

    #[test]
    fn marker_in_column_72_continues() {
        let mut first = " ".repeat(71);
        first.push('X'); // column 72 (1-based) = index 71
        let cont = format!("{}CONT", " ".repeat(15));
        let lines = vec![first.as_str(), cont.as_str()];
        let ll = join_continuation(&lines, 0, &ColumnLayout::default(), false);
        assert_eq!(ll.physical_lines, 2);
        assert!(ll.text.ends_with("CONT"));
    }

    #[test]
    fn string_with_doubled_quote_escapes() {
        let toks = Lexer::new("'IT''S'").tokenize();
        assert_eq!(toks[0].kind, TokenKind::StringLit);
        assert_eq!(toks[0].text, "IT'S");
    }

    #[test]
    fn attribute_letter_before_quote_is_attr_token() {
        let toks = Lexer::new("L'X").tokenize();
        assert_eq!(toks[0].kind, TokenKind::Attr('L'));
        assert_eq!(toks[1].kind, TokenKind::OrdSymbol);
        assert_eq!(toks[1].text, "X");
    }

    #[test]
    fn ordinary_symbol_tokenizes_whole_name() {
        let toks = Lexer::new("MYLABEL1").tokenize();
        assert_eq!(toks[0].kind, TokenKind::OrdSymbol);
        assert_eq!(toks[0].text, "MYLABEL1");
    }
}
