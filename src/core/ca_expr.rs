//! The conditional-assembly expression tree.
//!
//! CA expressions come in three kinds -- arithmetic (`A`), binary/logical
//! (`B`), and character (`C`) -- plus an `Undefined` kind used while a
//! `SETC` variable's eventual type is still being inferred from context.
//! Kind promotion is monotonic: an expression starts `Undefined` and is
//! narrowed to a concrete kind the first time context demands one, never
//! the reverse.

use super::Id;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CaType {
    A,
    B,
    C,
    Undefined,
}

#[derive(Clone, PartialEq, Debug)]
pub enum CaValue {
    A(i32),
    B(bool),
    C(String),
}

impl CaValue {
    pub fn kind(&self) -> CaType {
        match self {
            CaValue::A(_) => CaType::A,
            CaValue::B(_) => CaType::B,
            CaValue::C(_) => CaType::C,
        }
    }
}

/// A diagnostic raised while building or resolving an expression tree.
/// Kept local to this module rather than routed through `core::diagnostics`
/// directly: the pipeline attaches the statement's range before forwarding
/// to a `DiagnosticConsumer`.
#[derive(Clone, Debug)]
pub struct CaDiag {
    pub code: &'static str,
    pub message: String,
}

impl CaDiag {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Neg,
    Sla,
    Sll,
    Sra,
    Srl,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BoolOp {
    And,
    Or,
    Xor,
    Not,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Clone, Debug)]
pub enum Expr {
    LitA(i32),
    LitB(bool),
    LitC(String),
    /// Reference to a SETA/SETB/SETC variable symbol, resolved through the
    /// active variable-symbol scope at evaluation time.
    VarRef(Id),
    /// An attribute query, `T'sym`, `L'sym`, etc. The ordinary-symbol
    /// lookup (and, if undefined, lookahead trigger) happens in
    /// `core::symbols`; this node just names the query.
    AttrRef { attr: char, symbol: Id },
    Arith { op: ArithOp, lhs: Box<Expr>, rhs: Option<Box<Expr>> },
    Bool { op: BoolOp, lhs: Box<Expr>, rhs: Option<Box<Expr>> },
    Cmp { op: CmpOp, lhs: Box<Expr>, rhs: Box<Expr> },
    /// Character concatenation, `'AB'.'CD'` or implicit juxtaposition.
    Concat(Box<Expr>, Box<Expr>),
    /// `substr(start:count,expr)` notation.
    Substring { start: Box<Expr>, count: Box<Expr>, of: Box<Expr> },
    /// `n'string'`: a string literal duplicated `factor` times before any
    /// substring is applied (duplication factor).
    Dup { factor: Box<Expr>, of: Box<Expr> },
    Call { name: BuiltinFn, args: Vec<Expr> },
}

/// Evaluation context: a minimal view the expression engine needs. The
/// pipeline's variable-symbol table and ordinary-symbol table satisfy
/// this; kept as a trait so `ca_expr` does not depend on `core::symbols`
/// or `core::pipeline` directly.
pub trait EvalContext {
    fn lookup_var(&mut self, id: Id) -> Option<CaValue>;
    /// Resolve an attribute query; `None` means "undefined", which the
    /// caller (ordinary path) turns into a lookahead trigger and the
    /// lookahead path turns into a pinned default per attribute.
    fn lookup_attr(&mut self, attr: char, symbol: Id) -> Option<CaValue>;
}

pub const MAX_STR_SIZE: usize = 4064;

/// Recursively evaluate `expr`, narrowing `Undefined` context to whatever
/// kind the expression naturally produces. `expected` is `None` when the
/// caller has no prior expectation (e.g. the right-hand side of a fresh
/// `SETC`).
pub fn resolve_expression_tree(
    expr: &Expr,
    expected: Option<CaType>,
    ctx: &mut dyn EvalContext,
) -> Result<CaValue, CaDiag> {
    let value = eval(expr, ctx)?;
    match expected {
        None | Some(CaType::Undefined) => Ok(value),
        Some(want) if want == value.kind() => Ok(value),
        Some(want) => convert(value, want),
    }
}

fn eval(expr: &Expr, ctx: &mut dyn EvalContext) -> Result<CaValue, CaDiag> {
    match expr {
        Expr::LitA(n) => Ok(CaValue::A(*n)),
        Expr::LitB(b) => Ok(CaValue::B(*b)),
        Expr::LitC(s) => Ok(CaValue::C(s.clone())),
        Expr::VarRef(id) => ctx
            .lookup_var(*id)
            .ok_or_else(|| CaDiag::new("CE001", format!("undefined variable symbol `{id}`"))),
        Expr::AttrRef { attr, symbol } => ctx
            .lookup_attr(*attr, *symbol)
            .ok_or_else(|| CaDiag::new("CE002", format!("attribute `{attr}'` of `{symbol}` could not be resolved"))),
        Expr::Arith { op, lhs, rhs } => eval_arith(*op, lhs, rhs.as_deref(), ctx),
        Expr::Bool { op, lhs, rhs } => eval_bool(*op, lhs, rhs.as_deref(), ctx),
        Expr::Cmp { op, lhs, rhs } => eval_cmp(*op, lhs, rhs, ctx),
        Expr::Concat(a, b) => {
            let a = as_char(eval(a, ctx)?)?;
            let b = as_char(eval(b, ctx)?)?;
            let mut s = a;
            s.push_str(&b);
            if s.len() > MAX_STR_SIZE {
                return Err(CaDiag::new("CE011", format!("character string exceeds {MAX_STR_SIZE} bytes")));
            }
            Ok(CaValue::C(s))
        }
        Expr::Substring { start, count, of } => eval_substring(start, count, of, ctx),
        Expr::Dup { factor, of } => {
            let n = as_arith(eval(factor, ctx)?)?;
            if n < 0 {
                return Err(CaDiag::new("CE010", "duplication factor must not be negative"));
            }
            let s = as_char(eval(of, ctx)?)?;
            let total = s.len().saturating_mul(n as usize);
            if total > MAX_STR_SIZE {
                return Err(CaDiag::new("CE011", format!("character string exceeds {MAX_STR_SIZE} bytes")));
            }
            Ok(CaValue::C(s.repeat(n as usize)))
        }
        Expr::Call { name, args } => {
            let mut vals = Vec::with_capacity(args.len());
            for a in args {
                vals.push(eval(a, ctx)?);
            }
            name.invoke(&vals)
        }
    }
}

fn as_arith(v: CaValue) -> Result<i32, CaDiag> {
    match v {
        CaValue::A(n) => Ok(n),
        other => convert(other, CaType::A).map(|v| match v {
            CaValue::A(n) => n,
            _ => unreachable!(),
        }),
    }
}
fn as_bool(v: CaValue) -> Result<bool, CaDiag> {
    match v {
        CaValue::B(b) => Ok(b),
        other => convert(other, CaType::B).map(|v| match v {
            CaValue::B(b) => b,
            _ => unreachable!(),
        }),
    }
}
fn as_char(v: CaValue) -> Result<String, CaDiag> {
    match v {
        CaValue::C(s) => Ok(s),
        other => convert(other, CaType::C).map(|v| match v {
            CaValue::C(s) => s,
            _ => unreachable!(),
        }),
    }
}

fn eval_arith(op: ArithOp, lhs: &Expr, rhs: Option<&Expr>, ctx: &mut dyn EvalContext) -> Result<CaValue, CaDiag> {
    let l = as_arith(eval(lhs, ctx)?)?;
    if op == ArithOp::Neg {
        return Ok(CaValue::A(l.checked_neg().unwrap_or(i32::MIN)));
    }
    let r = as_arith(eval(rhs.expect("binary arith op missing rhs"), ctx)?)?;
    if matches!(op, ArithOp::Sla | ArithOp::Sll | ArithOp::Sra | ArithOp::Srl) {
        let amount = (r.max(0) as u32) % 32;
        let v = match op {
            ArithOp::Sla => ((l as u32) << amount) as i32,
            ArithOp::Sll => ((l as u32) << amount) as i32,
            ArithOp::Sra => l >> amount,
            ArithOp::Srl => ((l as u32) >> amount) as i32,
            _ => unreachable!(),
        };
        return Ok(CaValue::A(v));
    }
    let result = match op {
        ArithOp::Add => l.checked_add(r),
        ArithOp::Sub => l.checked_sub(r),
        ArithOp::Mul => l.checked_mul(r),
        ArithOp::Div => {
            if r == 0 {
                return Err(CaDiag::new("CE003", "division by zero in arithmetic expression"));
            }
            Some(l / r)
        }
        ArithOp::Neg | ArithOp::Sla | ArithOp::Sll | ArithOp::Sra | ArithOp::Srl => unreachable!(),
    };
    result
        .map(CaValue::A)
        .ok_or_else(|| CaDiag::new("CE004", "arithmetic expression overflowed a 32-bit signed value"))
}

fn eval_bool(op: BoolOp, lhs: &Expr, rhs: Option<&Expr>, ctx: &mut dyn EvalContext) -> Result<CaValue, CaDiag> {
    let l = as_bool(eval(lhs, ctx)?)?;
    let v = match op {
        BoolOp::Not => !l,
        BoolOp::And => l && as_bool(eval(rhs.expect("AND missing rhs"), ctx)?)?,
        BoolOp::Or => l || as_bool(eval(rhs.expect("OR missing rhs"), ctx)?)?,
        BoolOp::Xor => l ^ as_bool(eval(rhs.expect("XOR missing rhs"), ctx)?)?,
    };
    Ok(CaValue::B(v))
}

fn eval_cmp(op: CmpOp, lhs: &Expr, rhs: &Expr, ctx: &mut dyn EvalContext) -> Result<CaValue, CaDiag> {
    let l = eval(lhs, ctx)?;
    let r = eval(rhs, ctx)?;
    let ordering = match (l, r) {
        (CaValue::A(a), CaValue::A(b)) => a.cmp(&b),
        (CaValue::C(a), CaValue::C(b)) => a.cmp(&b),
        (CaValue::B(a), CaValue::B(b)) => a.cmp(&b),
        _ => return Err(CaDiag::new("CE005", "comparison operands have mismatched kinds")),
    };
    use std::cmp::Ordering::*;
    let v = match (op, ordering) {
        (CmpOp::Eq, Equal) => true,
        (CmpOp::Ne, o) => o != Equal,
        (CmpOp::Lt, Less) => true,
        (CmpOp::Le, Less | Equal) => true,
        (CmpOp::Gt, Greater) => true,
        (CmpOp::Ge, Greater | Equal) => true,
        _ => false,
    };
    Ok(CaValue::B(v))
}

fn eval_substring(start: &Expr, count: &Expr, of: &Expr, ctx: &mut dyn EvalContext) -> Result<CaValue, CaDiag> {
    let s = as_arith(eval(start, ctx)?)?;
    let c = as_arith(eval(count, ctx)?)?;
    let text = as_char(eval(of, ctx)?)?;
    if c == 0 {
        return Ok(CaValue::C(String::new()));
    }
    if s < 1 {
        return Err(CaDiag::new("CE009", "substring start position must be at least 1"));
    }
    if c < 0 {
        return Err(CaDiag::new("CE009", "substring count must not be negative"));
    }
    let chars: Vec<char> = text.chars().collect();
    let start0 = (s - 1) as usize;
    let end0 = start0 + c as usize;
    if start0 >= chars.len() || end0 > chars.len() {
        return Err(CaDiag::new("CE009", "substring range extends past the end of the string"));
    }
    Ok(CaValue::C(chars[start0..end0].iter().collect()))
}

/// Type conversions between the three CA kinds.
fn convert(v: CaValue, to: CaType) -> Result<CaValue, CaDiag> {
    match (v, to) {
        (v, t) if v.kind() == t => Ok(v),
        (CaValue::A(n), CaType::B) => Ok(CaValue::B(n != 0)),
        (CaValue::B(b), CaType::A) => Ok(CaValue::A(if b { 1 } else { 0 })),
        (CaValue::A(n), CaType::C) => Ok(CaValue::C(n.to_string())),
        (CaValue::B(b), CaType::C) => Ok(CaValue::C(if b { "1".into() } else { "0".into() })),
        (CaValue::C(s), CaType::A) => self_defining_term(&s)
            .map(CaValue::A)
            .ok_or_else(|| CaDiag::new("CE004", format!("`{s}` is not a valid self-defining term"))),
        (CaValue::C(s), CaType::B) => match s.trim() {
            "0" => Ok(CaValue::B(false)),
            "1" => Ok(CaValue::B(true)),
            _ => Err(CaDiag::new("CE007", format!("`{s}` is not a valid binary term"))),
        },
        (_, CaType::Undefined) => Err(CaDiag::new("CE008", "cannot convert to an undefined kind")),
        _ => unreachable!(),
    }
}

/// Parses a self-defining term (`B'01'`, `C'...'`, `X'FF'`, `G'...'`, or a
/// bare decimal number) the way a `C`-kind value is reinterpreted as `A`
/// when an arithmetic context demands it. `B`/`X` read their digits as an
/// unsigned bit pattern reinterpreted as `i32`; `C`/`G` pack characters the
/// same way `C2A` does.
fn self_defining_term(s: &str) -> Option<i32> {
    let s = s.trim();
    let bytes = s.as_bytes();
    if bytes.len() >= 3 && bytes[1] == b'\'' && s.ends_with('\'') {
        let inner = &s[2..s.len() - 1];
        return match bytes[0].to_ascii_uppercase() {
            b'B' => u32::from_str_radix(inner, 2).ok().map(|n| n as i32),
            b'X' => u32::from_str_radix(inner, 16).ok().map(|n| n as i32),
            b'C' | b'G' => {
                let mut n: i32 = 0;
                for c in inner.chars() {
                    let b = ebcdic_byte(c).unwrap_or(0x40);
                    n = (n << 8) | b as i32;
                }
                Some(n)
            }
            _ => None,
        };
    }
    s.parse::<i32>().ok()
}

/// CP037 (EBCDIC US/Canada) code point for an ASCII character, used by the
/// `*2A`/`A2*` conversion family the way the real assembler's character
/// arithmetic does.
fn ebcdic_byte(c: char) -> Option<u8> {
    Some(match c {
        ' ' => 0x40,
        '0'..='9' => 0xF0 + (c as u8 - b'0'),
        'A'..='I' => 0xC1 + (c as u8 - b'A'),
        'J'..='R' => 0xD1 + (c as u8 - b'J'),
        'S'..='Z' => 0xE2 + (c as u8 - b'S'),
        'a'..='i' => 0x81 + (c as u8 - b'a'),
        'j'..='r' => 0x91 + (c as u8 - b'j'),
        's'..='z' => 0xA2 + (c as u8 - b's'),
        _ => return None,
    })
}

fn ascii_from_ebcdic(byte: u8) -> char {
    match byte {
        0x40 => ' ',
        0xF0..=0xF9 => (b'0' + (byte - 0xF0)) as char,
        0xC1..=0xC9 => (b'A' + (byte - 0xC1)) as char,
        0xD1..=0xD9 => (b'J' + (byte - 0xD1)) as char,
        0xE2..=0xE9 => (b'S' + (byte - 0xE2)) as char,
        0x81..=0x89 => (b'a' + (byte - 0x81)) as char,
        0x91..=0x99 => (b'j' + (byte - 0x91)) as char,
        0xA2..=0xA9 => (b's' + (byte - 0xA2)) as char,
        _ => '.',
    }
}

/// The 30-plus built-in SETA/SETB/SETC functions. The `N2M` conversion
/// family (binary/character/decimal/hex, each to each other kind) is
/// generated mechanically; the rest are named individually.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuiltinFn {
    B2A,
    B2C,
    B2D,
    B2X,
    C2A,
    C2B,
    C2D,
    C2X,
    D2A,
    D2B,
    D2C,
    D2X,
    X2A,
    X2B,
    X2C,
    X2D,
    A2B,
    A2C,
    A2D,
    A2X,
    DCLEN,
    DEQUOTE,
    DOUBLE,
    BYTE,
    FIND,
    INDEX,
    ISBIN,
    ISDEC,
    ISHEX,
    ISSYM,
    LOWER,
    UPPER,
    SIGNED,
    SYSATTRA,
    SYSATTRP,
    SYSLOC,
}

impl BuiltinFn {
    pub fn from_name(name: &str) -> Option<Self> {
        use BuiltinFn::*;
        Some(match name.to_ascii_uppercase().as_str() {
            "B2A" => B2A, "B2C" => B2C, "B2D" => B2D, "B2X" => B2X,
            "C2A" => C2A, "C2B" => C2B, "C2D" => C2D, "C2X" => C2X,
            "D2A" => D2A, "D2B" => D2B, "D2C" => D2C, "D2X" => D2X,
            "X2A" => X2A, "X2B" => X2B, "X2C" => X2C, "X2D" => X2D,
            "A2B" => A2B, "A2C" => A2C, "A2D" => A2D, "A2X" => A2X,
            "DCLEN" => DCLEN, "DEQUOTE" => DEQUOTE, "DOUBLE" => DOUBLE,
            "BYTE" => BYTE, "FIND" => FIND, "INDEX" => INDEX,
            "ISBIN" => ISBIN, "ISDEC" => ISDEC,
            "ISHEX" => ISHEX, "ISSYM" => ISSYM, "LOWER" => LOWER,
            "UPPER" => UPPER, "SIGNED" => SIGNED,
            "SYSATTRA" => SYSATTRA, "SYSATTRP" => SYSATTRP, "SYSLOC" => SYSLOC,
            _ => return None,
        })
    }

    fn invoke(&self, args: &[CaValue]) -> Result<CaValue, CaDiag> {
        use BuiltinFn::*;
        match self {
            B2A => str_to_arith(args, 2, 32, "B2A"),
            X2A => str_to_arith(args, 16, 8, "X2A"),
            D2A => str_to_arith(args, 10, 11, "D2A"),
            C2A => char_to_arith(args),
            A2B => arith_to_str(args, 2, None),
            A2X => arith_to_str(args, 16, None),
            A2D => {
                let n = arith_arg(args, 0)?;
                Ok(CaValue::C(if n >= 0 { format!("+{n}") } else { n.to_string() }))
            }
            A2C => arith_to_char(args),
            B2C => radix_to_char(args, 2),
            B2D => radix_to_dec(args, 2),
            B2X => radix_to_radix(args, 2, 16),
            C2B => char_to_radix(args, 2),
            C2D => char_to_radix(args, 10),
            C2X => char_to_radix(args, 16),
            D2B => radix_to_radix(args, 10, 2),
            D2C => radix_to_char(args, 10),
            D2X => radix_to_radix(args, 10, 16),
            X2B => radix_to_radix(args, 16, 2),
            X2C => radix_to_char(args, 16),
            X2D => radix_to_dec(args, 16),
            DCLEN => Ok(CaValue::A(char_arg(args, 0)?.chars().count() as i32)),
            DEQUOTE => {
                let s = char_arg(args, 0)?;
                Ok(CaValue::C(s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')).unwrap_or(&s).to_string()))
            }
            DOUBLE => {
                let s = char_arg(args, 0)?;
                Ok(CaValue::C(s.chars().flat_map(|c| if c == '\'' || c == '&' { vec![c, c] } else { vec![c] }).collect()))
            }
            BYTE => {
                let n = arith_arg(args, 0)?;
                if !(0..=255).contains(&n) {
                    return Err(CaDiag::new("CE007", "BYTE argument must be in the range 0 to 255"));
                }
                Ok(CaValue::C(ascii_from_ebcdic(n as u8).to_string()))
            }
            FIND => {
                let a = char_arg(args, 0)?;
                let set: std::collections::HashSet<char> = char_arg(args, 1)?.chars().collect();
                Ok(CaValue::A(a.chars().position(|c| set.contains(&c)).map(|i| i as i32 + 1).unwrap_or(0)))
            }
            INDEX => {
                let haystack = char_arg(args, 0)?;
                let needle = char_arg(args, 1)?;
                Ok(CaValue::A(haystack.find(&needle).map(|b| haystack[..b].chars().count() as i32 + 1).unwrap_or(0)))
            }
            ISBIN => is_predicate(args, |c| c == '0' || c == '1'),
            ISDEC => is_predicate(args, |c| c.is_ascii_digit()),
            ISHEX => is_predicate(args, |c| c.is_ascii_hexdigit()),
            ISSYM => {
                let s = char_arg(args, 0)?;
                if s.is_empty() {
                    return Err(CaDiag::new("CE007", "ISSYM argument must not be empty"));
                }
                Ok(CaValue::B(super::interner::is_valid_id(&s)))
            }
            LOWER => Ok(CaValue::C(char_arg(args, 0)?.to_lowercase())),
            UPPER => Ok(CaValue::C(char_arg(args, 0)?.to_uppercase())),
            SIGNED => Ok(CaValue::C(arith_arg(args, 0)?.to_string())),
            SYSATTRA | SYSATTRP | SYSLOC => {
                Err(CaDiag::new("CE012", "this function requires attribute/location context not available here"))
            }
        }
    }
}

fn arith_arg(args: &[CaValue], i: usize) -> Result<i32, CaDiag> {
    match args.get(i) {
        Some(CaValue::A(n)) => Ok(*n),
        _ => Err(CaDiag::new("CE013", "function expects an arithmetic argument")),
    }
}
/// `ISBIN`/`ISDEC`/`ISHEX` on an empty string is a hard error, not a
/// default-false predicate.
fn is_predicate(args: &[CaValue], pred: impl Fn(char) -> bool) -> Result<CaValue, CaDiag> {
    let s = char_arg(args, 0)?;
    if s.is_empty() {
        return Err(CaDiag::new("CE007", "argument must not be empty"));
    }
    Ok(CaValue::B(s.chars().all(pred)))
}

fn char_arg(args: &[CaValue], i: usize) -> Result<String, CaDiag> {
    match args.get(i) {
        Some(CaValue::C(s)) => Ok(s.clone()),
        _ => Err(CaDiag::new("CE014", "function expects a character argument")),
    }
}

fn str_to_arith(args: &[CaValue], radix: u32, max_digits: usize, name: &'static str) -> Result<CaValue, CaDiag> {
    let s = char_arg(args, 0)?;
    if s.len() > max_digits {
        return Err(CaDiag::new("CE015", format!("{name} argument exceeds {max_digits} digits")));
    }
    // B2A/X2A must round-trip with A2B/A2X, which format negative numbers as
    // the unsigned bit pattern (`A2B(-1)` is 32 `'1'` characters). Parsing as
    // `u32` and reinterpreting the bits as `i32` undoes exactly that, instead
    // of rejecting values that don't fit a signed 32-bit range. D2A is
    // decimal and keeps the signed parse since `A2D` writes an explicit sign.
    if radix == 10 {
        return i64::from_str_radix(&s, radix)
            .ok()
            .and_then(|n| i32::try_from(n).ok())
            .map(CaValue::A)
            .ok_or_else(|| CaDiag::new("CE016", format!("`{s}` is not a valid base-{radix} literal")));
    }
    u32::from_str_radix(&s, radix)
        .map(|n| CaValue::A(n as i32))
        .map_err(|_| CaDiag::new("CE016", format!("`{s}` is not a valid base-{radix} literal")))
}

fn char_to_arith(args: &[CaValue]) -> Result<CaValue, CaDiag> {
    let s = char_arg(args, 0)?;
    if s.chars().count() > 4 {
        return Err(CaDiag::new("CE015", "C2A argument exceeds 4 characters"));
    }
    let mut n: i32 = 0;
    for c in s.chars() {
        let b = ebcdic_byte(c).unwrap_or(0x40);
        n = (n << 8) | b as i32;
    }
    Ok(CaValue::A(n))
}

fn arith_to_str(args: &[CaValue], radix: u32, width: Option<usize>) -> Result<CaValue, CaDiag> {
    let n = arith_arg(args, 0)?;
    let mut s = match radix {
        2 => format!("{:b}", n as u32),
        16 => format!("{:X}", n as u32),
        _ => n.to_string(),
    };
    if let Some(w) = width {
        while s.len() < w {
            s.insert(0, '0');
        }
    }
    Ok(CaValue::C(s))
}

fn arith_to_char(args: &[CaValue]) -> Result<CaValue, CaDiag> {
    let n = arith_arg(args, 0)? as u32;
    let bytes = n.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(3);
    Ok(CaValue::C(bytes[first_nonzero..].iter().map(|b| ascii_from_ebcdic(*b)).collect()))
}

fn radix_to_radix(args: &[CaValue], from: u32, to: u32) -> Result<CaValue, CaDiag> {
    let s = char_arg(args, 0)?;
    let n = i64::from_str_radix(&s, from).map_err(|_| CaDiag::new("CE016", format!("`{s}` is not valid base {from}")))?;
    Ok(CaValue::C(match to {
        2 => format!("{:b}", n),
        16 => format!("{:X}", n),
        _ => n.to_string(),
    }))
}
fn radix_to_dec(args: &[CaValue], from: u32) -> Result<CaValue, CaDiag> {
    radix_to_radix(args, from, 10)
}
fn radix_to_char(args: &[CaValue], from: u32) -> Result<CaValue, CaDiag> {
    let s = char_arg(args, 0)?;
    let n = i64::from_str_radix(&s, from).map_err(|_| CaDiag::new("CE016", format!("`{s}` is not valid base {from}")))? as u32;
    let bytes = n.to_be_bytes();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(3);
    Ok(CaValue::C(bytes[first_nonzero..].iter().map(|b| ascii_from_ebcdic(*b)).collect()))
}
fn char_to_radix(args: &[CaValue], to: u32) -> Result<CaValue, CaDiag> {
    let CaValue::A(n) = char_to_arith(args)? else { unreachable!() };
    Ok(CaValue::C(match to {
        2 => format!("{:b}", n as u32),
        16 => format!("{:X}", n as u32),
        _ => n.to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullCtx;
    impl EvalContext for NullCtx {
        fn lookup_var(&mut self, _id: Id) -> Option<CaValue> {
            None
        }
        fn lookup_attr(&mut self, _attr: char, _symbol: Id) -> Option<CaValue> {
            None
        }
    }

    #[test]
    fn arithmetic_add() {
        let e = Expr::Arith { op: ArithOp::Add, lhs: Box::new(Expr::LitA(2)), rhs: Some(Box::new(Expr::LitA(3))) };
        let v = resolve_expression_tree(&e, Some(CaType::A), &mut NullCtx).unwrap();
        assert_eq!(v, CaValue::A(5));
    }

    #[test]
    fn division_by_zero_is_diagnosed() {
        let e = Expr::Arith { op: ArithOp::Div, lhs: Box::new(Expr::LitA(1)), rhs: Some(Box::new(Expr::LitA(0))) };
        let err = resolve_expression_tree(&e, Some(CaType::A), &mut NullCtx).unwrap_err();
        assert_eq!(err.code, "CE003");
    }

    #[test]
    fn substring_zero_count_is_empty_string() {
        let e = Expr::Substring {
            start: Box::new(Expr::LitA(1)),
            count: Box::new(Expr::LitA(0)),
            of: Box::new(Expr::LitC("HELLO".into())),
        };
        let v = resolve_expression_tree(&e, Some(CaType::C), &mut NullCtx).unwrap();
        assert_eq!(v, CaValue::C(String::new()));
    }

    #[test]
    fn substring_zero_count_skips_start_validation() {
        let e = Expr::Substring {
            start: Box::new(Expr::LitA(0)),
            count: Box::new(Expr::LitA(0)),
            of: Box::new(Expr::LitC("HELLO".into())),
        };
        let v = resolve_expression_tree(&e, Some(CaType::C), &mut NullCtx).unwrap();
        assert_eq!(v, CaValue::C(String::new()));
    }

    #[test]
    fn concat_overflow_is_ce011() {
        let a = "A".repeat(MAX_STR_SIZE);
        let e = Expr::Concat(Box::new(Expr::LitC(a)), Box::new(Expr::LitC("BB".into())));
        let err = resolve_expression_tree(&e, Some(CaType::C), &mut NullCtx).unwrap_err();
        assert_eq!(err.code, "CE011");
    }

    #[test]
    fn substring_out_of_range_is_diagnosed() {
        let e = Expr::Substring {
            start: Box::new(Expr::LitA(10)),
            count: Box::new(Expr::LitA(1)),
            of: Box::new(Expr::LitC("HI".into())),
        };
        let err = resolve_expression_tree(&e, Some(CaType::C), &mut NullCtx).unwrap_err();
        assert_eq!(err.code, "CE009");
    }

    #[test]
    fn d2a_respects_digit_cap() {
        let over = "1".repeat(12);
        let err = BuiltinFn::D2A.invoke(&[CaValue::C(over)]).unwrap_err();
        assert_eq!(err.code, "CE015");
    }

    #[test]
    fn a_to_b_conversion_is_nonzero_test() {
        let v = convert(CaValue::A(7), CaType::B).unwrap();
        assert_eq!(v, CaValue::B(true));
    }

    #[test]
    fn c2a_packs_ebcdic_bytes() {
        let v = BuiltinFn::C2A.invoke(&[CaValue::C("A".into())]).unwrap();
        assert_eq!(v, CaValue::A(0xC1));
    }

    #[test]
    fn b2a_a2b_round_trips_a_negative_number() {
        let bits = BuiltinFn::A2B.invoke(&[CaValue::A(-1)]).unwrap();
        let CaValue::C(s) = &bits else { panic!("expected a character value") };
        assert_eq!(s.len(), 32);
        let back = BuiltinFn::B2A.invoke(&[bits]).unwrap();
        assert_eq!(back, CaValue::A(-1));
    }

    #[test]
    fn x2a_a2x_round_trips_a_negative_number() {
        let hex = BuiltinFn::A2X.invoke(&[CaValue::A(-1)]).unwrap();
        let CaValue::C(s) = &hex else { panic!("expected a character value") };
        assert_eq!(s, "FFFFFFFF");
        let back = BuiltinFn::X2A.invoke(&[hex]).unwrap();
        assert_eq!(back, CaValue::A(-1));
    }

    #[test]
    fn d2a_a2d_round_trips_a_negative_number() {
        let dec = BuiltinFn::A2D.invoke(&[CaValue::A(-5)]).unwrap();
        assert_eq!(dec, CaValue::C("-5".into()));
        let back = BuiltinFn::D2A.invoke(&[dec]).unwrap();
        assert_eq!(back, CaValue::A(-5));
    }

    #[test]
    fn c_to_a_conversion_recognizes_self_defining_terms() {
        assert_eq!(convert(CaValue::C("X'FF'".into()), CaType::A).unwrap(), CaValue::A(255));
        assert_eq!(convert(CaValue::C("B'01'".into()), CaType::A).unwrap(), CaValue::A(1));
        assert_eq!(convert(CaValue::C("C'A'".into()), CaType::A).unwrap(), CaValue::A(0xC1));
        assert_eq!(convert(CaValue::C("42".into()), CaType::A).unwrap(), CaValue::A(42));
    }

    #[test]
    fn c_to_a_conversion_rejects_invalid_term_with_ce004() {
        let err = convert(CaValue::C("NOTATERM".into()), CaType::A).unwrap_err();
        assert_eq!(err.code, "CE004");
    }
}
