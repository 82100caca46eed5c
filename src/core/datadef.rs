//! The `DC`/`DS` data-definition type system.
//!
//! A data-definition operand is `[dup][mod-list]type[program-type][mod-list](nominal-values)`.
//! Each modifier (length, scale, exponent) has a bound that is one of
//! `NoCheck` (any value accepted), `NotApplicable` (the modifier makes no
//! sense for this type and is flagged with `D009`), `Ignored` (the
//! modifier is tolerated at value zero with a `D025` warning but rejected
//! with `D009` otherwise -- the binary/decimal floating-point program
//! types' scale modifier), or a closed `Range`. Validation walks the same
//! seven steps for every type so the per-type tables below are the only
//! thing that varies.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DataType {
    B,
    C,
    CA,
    CE,
    CU,
    G,
    X,
    H,
    F,
    FD,
    P,
    Z,
    E,
    D,
    L,
    /// Address constant (`A'expr'`): a full-word relocatable address.
    A,
    /// Relative-immediate halfword address constant.
    Y,
    /// `S'base-disp'` base/displacement address constant.
    S,
    /// `SY'base-disp'`, the extended (12-to-20-bit displacement) form of `S`.
    SY,
    /// Q-constant: address of a `DSECT`/`CSECT` or an external name's ESD entry.
    Q,
    /// V-constant: address of an external (possibly undefined) symbol.
    V,
    /// R-constant: address of an entry-point / relocatable symbol.
    R,
    /// J-constant: address minus the start of its controlling section.
    J,
}

impl DataType {
    pub fn from_letters(s: &str) -> Option<Self> {
        use DataType::*;
        Some(match s.to_ascii_uppercase().as_str() {
            "B" => B, "C" => C, "CA" => CA, "CE" => CE, "CU" => CU,
            "G" => G, "X" => X, "H" => H, "F" => F, "FD" => FD,
            "P" => P, "Z" => Z, "E" => E, "D" => D, "L" => L,
            "A" => A, "Y" => Y, "S" => S, "SY" => SY, "Q" => Q, "V" => V, "R" => R, "J" => J,
            _ => return None,
        })
    }

    /// Whether this type's length is implicit (fixed by the type, e.g. `H`
    /// is always 2 bytes) unless a length modifier overrides it.
    pub fn implicit_length(self) -> Option<i64> {
        use DataType::*;
        match self {
            H => Some(2),
            F => Some(4),
            FD => Some(8),
            E => Some(4),
            D => Some(8),
            L => Some(16),
            A => Some(4),
            Y => Some(2),
            S => Some(2),
            SY => Some(3),
            Q => Some(4),
            V => Some(4),
            R => Some(4),
            J => Some(4),
            _ => None,
        }
    }
}

/// A modifier's valid-value taxonomy (bound taxonomy).
#[derive(Clone, Copy, Debug)]
pub enum Bound {
    NoCheck,
    NotApplicable,
    /// Value zero is tolerated with a `D025` warning; any nonzero value is
    /// `D009`, same as `NotApplicable`.
    Ignored,
    Range(i64, i64),
}

#[derive(Clone, Debug)]
pub struct DataDiag {
    pub code: &'static str,
    pub message: String,
}
impl DataDiag {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }
}

fn length_bound(ty: DataType) -> Bound {
    use DataType::*;
    match ty {
        B | C | CA | CE | CU | X => Bound::Range(1, 65535),
        H | F | FD => Bound::Range(1, 8),
        P | Z => Bound::Range(1, 16),
        E => Bound::Range(4, 8),
        D => Bound::Range(8, 8),
        L => Bound::Range(4, 16),
        G => Bound::NoCheck,
        A | R | V | Q => Bound::Range(2, 8),
        Y => Bound::NotApplicable,
        S | SY => Bound::NotApplicable,
        J => Bound::Range(2, 8),
    }
}

/// The bit-length bound for a type's `L.n` form, distinct from its ordinary
/// byte-length bound. Types that forbid a bit-length form entirely (`CU`,
/// `G`, and the address-constant types) report `NotApplicable` here, which
/// `validate()` turns into `D007` rather than the generic `D009`.
fn bit_length_bound(ty: DataType) -> Bound {
    use DataType::*;
    match ty {
        B | C | CA | CE | X => Bound::Range(1, 2048),
        H | F | FD => Bound::Range(1, 64),
        P | Z => Bound::Range(1, 128),
        E | D => Bound::Range(1, 64),
        L => Bound::Range(1, 128),
        CU | G => Bound::NotApplicable,
        A | Y | S | SY | Q | V | R | J => Bound::NotApplicable,
    }
}

/// The scale modifier's binary/decimal floating-point program types (`ED`,
/// `EB`, `DD`, `DB`, `LD`, `LB`, carried here as `program_type` `'D'`/`'B'`)
/// force scale to 0 but tolerate an explicit `S0` with a warning rather
/// than rejecting it outright.
fn scale_bound(ty: DataType, program_type: Option<char>) -> Bound {
    use DataType::*;
    match ty {
        H | F | FD => Bound::Range(-187, 346),
        E | D | L if matches!(program_type, Some('B') | Some('D')) => Bound::Ignored,
        E | D | L => Bound::Range(-185, 185),
        _ => Bound::NotApplicable,
    }
}

fn exponent_bound(ty: DataType) -> Bound {
    use DataType::*;
    match ty {
        E | D | L => Bound::Range(-85, 75),
        _ => Bound::NotApplicable,
    }
}

/// Checks `value` against `bound`, returning the diagnostic code to raise
/// if it is out of range (`D008`), not applicable to this type (`D009`),
/// or an `Ignored` bound with a nonzero value (also `D009`; zero is
/// tolerated with `D025`).
fn check_bound(bound: Bound, value: Option<i64>, modifier: &str) -> Result<(), DataDiag> {
    match (bound, value) {
        (_, None) => Ok(()),
        (Bound::NoCheck, Some(_)) => Ok(()),
        (Bound::NotApplicable, Some(_)) => {
            Err(DataDiag::new("D009", format!("{modifier} modifier is not applicable to this type and is ignored")))
        }
        (Bound::Ignored, Some(0)) => {
            Err(DataDiag::new("D025", format!("{modifier} modifier is not applicable to this type and is ignored")))
        }
        (Bound::Ignored, Some(_)) => {
            Err(DataDiag::new("D009", format!("{modifier} modifier is not applicable to this type and is ignored")))
        }
        (Bound::Range(lo, hi), Some(v)) if v >= lo && v <= hi => Ok(()),
        (Bound::Range(lo, hi), Some(v)) => {
            Err(DataDiag::new("D008", format!("{modifier} modifier {v} is out of range [{lo},{hi}]")))
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Modifiers {
    pub duplication: Option<i64>,
    pub length: Option<i64>,
    /// Whether the length was written as a bit length (`L.n`) rather than
    /// a byte length.
    pub bit_length: bool,
    pub scale: Option<i64>,
    pub exponent: Option<i64>,
    pub program_type: Option<char>,
}

#[derive(Clone, Debug)]
pub struct Attributes {
    pub length: i64,
    pub scale: i64,
    pub integer: i64,
    pub ty_code: char,
}

/// A single parsed `DC`/`DS` operand, already through structural parsing --
/// this module validates and computes attributes, it does not tokenize.
pub struct DataDefOperand {
    pub ty: DataType,
    pub modifiers: Modifiers,
    pub nominal_value_count: usize,
    /// Raw text of the first nominal value (unquoted), when the operand
    /// has one. Used only to derive an implicit `S'` scale attribute from
    /// a literal's decimal point when no explicit `S` modifier is given
    /// (`PL3'-12.34'` has scale 2 even though nobody wrote `S2`).
    pub first_nominal: Option<String>,
}

/// Run the seven-step validation sequence and compute
/// the resulting `L`/`S`/`I`/`T` attributes. Diagnostics are collected
/// rather than short-circuiting on the first one, except where a later
/// step cannot proceed without a sane earlier value.
pub fn validate(op: &DataDefOperand, is_dc: bool) -> (Attributes, Vec<DataDiag>) {
    let mut diags = Vec::new();

    // Step 1: duplication factor must not be negative.
    let dup = op.modifiers.duplication.unwrap_or(1);
    if dup < 0 {
        diags.push(DataDiag::new("D011", "duplication factor must not be negative"));
    }

    // Step 2: type letter already resolved by the caller (constructing
    // `DataDefOperand` requires a valid `DataType`).

    // Step 3: length modifier, checked against the bit-length bound
    // instead of the ordinary byte-length bound when written as `L.n`.
    if op.modifiers.bit_length {
        match bit_length_bound(op.ty) {
            Bound::NotApplicable => {
                diags.push(DataDiag::new("D007", "bit length modifier is not allowed for this type"));
            }
            bound => {
                if let Err(e) = check_bound(bound, op.modifiers.length, "bit length") {
                    diags.push(e);
                }
            }
        }
    } else if let Err(e) = check_bound(length_bound(op.ty), op.modifiers.length, "length") {
        diags.push(e);
    }

    // Step 4: scale modifier.
    if let Err(e) = check_bound(scale_bound(op.ty, op.modifiers.program_type), op.modifiers.scale, "scale") {
        diags.push(e);
    }

    // Step 5: exponent modifier.
    if let Err(e) = check_bound(exponent_bound(op.ty), op.modifiers.exponent, "exponent") {
        diags.push(e);
    }

    // Step 6: nominal-value presence. `DC` requires one unless the
    // duplication factor is 0 (reserves nothing); `DS` never requires one.
    if is_dc && dup != 0 && op.nominal_value_count == 0 {
        diags.push(DataDiag::new("D016", "DC requires a nominal value"));
    }

    // Step 7 (attribute computation) plus the total-length bound check.
    // When no explicit `S` modifier is given, fixed-point types derive
    // their scale from the nominal literal's own decimal point
    // (`PL3'-12.34'` has scale 2).
    let length = op.modifiers.length.or_else(|| op.ty.implicit_length()).unwrap_or(1);
    let scale = op.modifiers.scale.unwrap_or_else(|| implicit_scale(op.ty, op.first_nominal.as_deref()));
    let integer = integer_attribute(op.ty, length, scale, op.modifiers.program_type);
    let ty_code = type_attribute_letter(op.ty);

    const MAX_TOTAL_BITS: i64 = ((1i64 << 31) - 1) * 8;
    let total_bits = dup.max(0).checked_mul(length).and_then(|b| b.checked_mul(8));
    if total_bits.map_or(true, |b| b >= MAX_TOTAL_BITS) {
        diags.push(DataDiag::new("D028", "total operand length exceeds the maximum"));
    }

    (Attributes { length, scale, integer, ty_code }, diags)
}

/// Counts digits after the decimal point of a fixed-point nominal value
/// (`-12.34` -> 2, `3.` -> 0, `.5` -> 1). Only meaningful for the
/// numeric-literal types (`H`/`F`/`FD`/`P`/`Z`); every other type ignores
/// its scale attribute entirely and this always returns 0 for them.
fn implicit_scale(ty: DataType, first_nominal: Option<&str>) -> i64 {
    use DataType::*;
    if !matches!(ty, H | F | FD | P | Z) {
        return 0;
    }
    let Some(raw) = first_nominal else { return 0 };
    let mantissa = raw.split(['E', 'e']).next().unwrap_or(raw);
    match mantissa.find('.') {
        Some(dot) => mantissa[dot + 1..].chars().filter(|c| c.is_ascii_digit()).count() as i64,
        None => 0,
    }
}

/// The `I'` (integer) attribute formulas, one per type.
fn integer_attribute(ty: DataType, length: i64, scale: i64, program_type: Option<char>) -> i64 {
    use DataType::*;
    match ty {
        H | F | FD => 8 * length - scale - 1,
        P => 2 * length - scale - 1,
        Z => length - scale,
        E | D | L => match program_type {
            Some('B') | Some('D') => 0,
            _ => 2 * (length - 1) - scale - if length > 8 { 2 } else { 0 },
        },
        A | Y | S | SY | Q | V | R | J => 8 * length - 1,
        _ => 0,
    }
}

fn type_attribute_letter(ty: DataType) -> char {
    use DataType::*;
    match ty {
        B => 'B', C => 'C', CA => 'C', CE => 'C', CU => 'C',
        G => 'G', X => 'X', H => 'H', F => 'F', FD => 'F',
        P => 'P', Z => 'Z', E => 'E', D => 'D', L => 'L',
        A => 'A', Y => 'Y', S => 'S', SY => 'Y', Q => 'Q', V => 'V', R => 'R', J => 'J',
    }
}

/// Per-type nominal-value content rules. Only a coarse
/// shape check: full expression parsing of the nominal value itself
/// happens through `core::ca_expr`/`core::parser`.
pub fn validate_nominal_shape(ty: DataType, raw: &str) -> Result<(), DataDiag> {
    use DataType::*;
    let ok = match ty {
        B => !raw.is_empty() && raw.chars().all(|c| c == '0' || c == '1'),
        X => !raw.is_empty() && raw.chars().all(|c| c.is_ascii_hexdigit()),
        C | CA | CE | CU => true, // any character content is legal
        G => !raw.is_empty(),
        H | F | FD | P | Z => raw.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '+'),
        E | D | L => raw.chars().all(|c| c.is_ascii_digit() || "-+.E".contains(c)),
        // Address constants: any address-or-expression text is accepted
        // here -- evaluating it is `core::ca_expr`/`core::parser`'s job.
        A | Y | S | SY | Q | V | R | J => !raw.is_empty(),
    };
    if ok {
        Ok(())
    } else {
        Err(DataDiag::new("D033", format!("nominal value `{raw}` is not valid for type")))
    }
}

/// Structurally parses one `DC`/`DS` operand -- `[dup][type][modifiers]('nominal'|(vals))`
/// -- into a `DataDefOperand`, without evaluating any nominal-value
/// expression. Returns `None` if no recognized type letter is found at
/// all (e.g. the operand text is empty or malformed past recovery).
pub fn parse_operand(text: &str) -> Option<DataDefOperand> {
    let text = text.trim();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    let dup_start = i;
    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    let duplication = if i > dup_start { chars[dup_start..i].iter().collect::<String>().parse::<i64>().ok() } else { None };

    // Longest-match type letters first so `FD`/`CA`/`CE`/`CU`/`SY` aren't
    // mistaken for `F`/`C`/`C`/`C`/`S`.
    let rest: String = chars[i..].iter().collect();
    let mut ty = None;
    for candidate in ["FD", "CA", "CE", "CU", "SY", "B", "C", "G", "X", "H", "F", "P", "Z", "E", "D", "L", "A", "Y", "S", "Q", "V", "R", "J"] {
        let upper: String = rest.chars().take(candidate.len()).collect::<String>().to_ascii_uppercase();
        if upper == candidate {
            ty = DataType::from_letters(candidate);
            i += candidate.len();
            break;
        }
    }
    let ty = ty?;

    let mut modifiers = Modifiers { duplication, ..Modifiers::default() };
    loop {
        match chars.get(i).map(|c| c.to_ascii_uppercase()) {
            Some('L') => {
                i += 1;
                let bit = chars.get(i) == Some(&'.');
                if bit {
                    i += 1;
                }
                let (n, next) = take_signed_int(&chars, i);
                modifiers.length = n;
                modifiers.bit_length = bit;
                i = next;
            }
            Some('S') => {
                i += 1;
                let (n, next) = take_signed_int(&chars, i);
                modifiers.scale = n;
                i = next;
            }
            Some('E') if chars.get(i + 1).map_or(false, |c| c.is_ascii_digit() || *c == '-' || *c == '+') => {
                i += 1;
                let (n, next) = take_signed_int(&chars, i);
                modifiers.exponent = n;
                i = next;
            }
            _ => break,
        }
    }

    let nominal_value_count = count_nominal_values(&chars[i..]);
    let first_nominal = first_nominal_text(&chars[i..]);
    Some(DataDefOperand { ty, modifiers, nominal_value_count, first_nominal })
}

/// Extracts the raw text of the first `'`-delimited nominal value (up to
/// the first top-level comma or closing quote, with `''` un-escaped to
/// `'`). Address-constant operands (parenthesized expression lists)
/// never need this -- `None` for anything not starting with `'`.
fn first_nominal_text(chars: &[char]) -> Option<String> {
    if chars.first() != Some(&'\'') {
        return None;
    }
    let mut buf = String::new();
    let mut i = 1;
    while i < chars.len() {
        match chars[i] {
            '\'' if chars.get(i + 1) == Some(&'\'') => {
                buf.push('\'');
                i += 2;
            }
            '\'' => break,
            ',' => break,
            c => {
                buf.push(c);
                i += 1;
            }
        }
    }
    Some(buf)
}

fn take_signed_int(chars: &[char], mut i: usize) -> (Option<i64>, usize) {
    let start = i;
    if matches!(chars.get(i), Some('-') | Some('+')) {
        i += 1;
    }
    while chars.get(i).map_or(false, |c| c.is_ascii_digit()) {
        i += 1;
    }
    if i == start {
        return (None, i);
    }
    let text: String = chars[start..i].iter().collect();
    (text.parse::<i64>().ok(), i)
}

/// Counts top-level nominal values inside the trailing `'...'` or
/// `(...)` of a data-definition operand, respecting nested parens and
/// doubled-quote escapes so a string like `C'A,B'` counts as one value
/// while `F'1,2,3'` counts as three.
fn count_nominal_values(chars: &[char]) -> usize {
    if chars.is_empty() {
        return 0;
    }
    let (open, close) = match chars[0] {
        '\'' => ('\'', '\''),
        '(' => ('(', ')'),
        _ => return 0,
    };
    let mut depth = 0i32;
    let mut count = 1usize;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == open && open == '\'' {
            if depth == 0 {
                depth = 1;
            } else if chars.get(i + 1) == Some(&'\'') {
                i += 1;
            } else {
                depth = 0;
            }
        } else if open == '(' {
            if c == '(' {
                depth += 1;
            } else if c == ')' {
                depth -= 1;
            } else if c == ',' && depth == 1 {
                count += 1;
            }
        } else if c == ',' && depth == 1 {
            count += 1;
        }
        i += 1;
        let _ = close;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fullword_length_within_bound_is_accepted() {
        let op = DataDefOperand { ty: DataType::F, modifiers: Modifiers { length: Some(8), ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().all(|d| d.code != "D008" && d.code != "D009"));
    }

    #[test]
    fn fullword_length_out_of_range_is_flagged() {
        let op = DataDefOperand { ty: DataType::F, modifiers: Modifiers { length: Some(9), ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D008"));
    }

    #[test]
    fn packed_decimal_integer_attribute_formula() {
        let op = DataDefOperand { ty: DataType::P, modifiers: Modifiers { length: Some(3), ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (attrs, _) = validate(&op, true);
        assert_eq!(attrs.integer, 2 * 3 - 0 - 1);
        assert_eq!(attrs.length, 3);
    }

    #[test]
    fn fullword_integer_attribute_formula() {
        let op = DataDefOperand { ty: DataType::F, modifiers: Modifiers::default(), nominal_value_count: 1, first_nominal: None };
        let (attrs, _) = validate(&op, true);
        assert_eq!(attrs.length, 4);
        assert_eq!(attrs.integer, 8 * 4 - 0 - 1);
    }

    #[test]
    fn fixed_point_scale_within_bound_is_accepted() {
        let op = DataDefOperand { ty: DataType::H, modifiers: Modifiers { scale: Some(1), ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().all(|d| d.code != "D008" && d.code != "D009"));
    }

    #[test]
    fn fixed_point_scale_out_of_range_is_flagged() {
        let op = DataDefOperand { ty: DataType::H, modifiers: Modifiers { scale: Some(400), ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D008"));
    }

    #[test]
    fn packed_decimal_scale_modifier_is_not_applicable() {
        let op = DataDefOperand { ty: DataType::P, modifiers: Modifiers { scale: Some(1), length: Some(3), ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D009"));
    }

    #[test]
    fn dc_with_no_nominal_value_is_flagged() {
        let op = DataDefOperand { ty: DataType::C, modifiers: Modifiers::default(), nominal_value_count: 0, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D016"));
    }

    #[test]
    fn ds_with_no_nominal_value_is_not_flagged() {
        let op = DataDefOperand { ty: DataType::C, modifiers: Modifiers::default(), nominal_value_count: 0, first_nominal: None };
        let (_, diags) = validate(&op, false);
        assert!(diags.iter().all(|d| d.code != "D016"));
    }

    #[test]
    fn dc_with_zero_duplication_factor_does_not_require_a_nominal_value() {
        let op = DataDefOperand { ty: DataType::C, modifiers: Modifiers { duplication: Some(0), ..Default::default() }, nominal_value_count: 0, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().all(|d| d.code != "D016"));
    }

    #[test]
    fn bit_length_is_accepted_for_a_type_that_allows_it() {
        let op = DataDefOperand { ty: DataType::X, modifiers: Modifiers { length: Some(16), bit_length: true, ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().all(|d| d.code != "D007"));
    }

    #[test]
    fn bit_length_is_flagged_for_a_type_that_forbids_it() {
        let op = DataDefOperand { ty: DataType::G, modifiers: Modifiers { length: Some(4), bit_length: true, ..Default::default() }, nominal_value_count: 1, first_nominal: None };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D007"));
    }

    #[test]
    fn decimal_floating_point_scale_zero_is_tolerated_with_a_warning() {
        let op = DataDefOperand {
            ty: DataType::E,
            modifiers: Modifiers { scale: Some(0), length: Some(4), program_type: Some('D'), ..Default::default() },
            nominal_value_count: 1,
            first_nominal: None,
        };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D025"));
        assert!(diags.iter().all(|d| d.code != "D009"));
    }

    #[test]
    fn decimal_floating_point_nonzero_scale_is_rejected() {
        let op = DataDefOperand {
            ty: DataType::E,
            modifiers: Modifiers { scale: Some(2), length: Some(4), program_type: Some('D'), ..Default::default() },
            nominal_value_count: 1,
            first_nominal: None,
        };
        let (_, diags) = validate(&op, true);
        assert!(diags.iter().any(|d| d.code == "D009"));
    }

    #[test]
    fn hex_literal_rejects_non_hex_digits() {
        assert!(validate_nominal_shape(DataType::X, "1G2").is_err());
        assert!(validate_nominal_shape(DataType::X, "1A2").is_ok());
    }

    #[test]
    fn parse_operand_reads_type_and_length() {
        let op = parse_operand("CL5'AB'").unwrap();
        assert_eq!(op.ty, DataType::C);
        assert_eq!(op.modifiers.length, Some(5));
        assert_eq!(op.nominal_value_count, 1);
    }

    #[test]
    fn parse_operand_counts_comma_separated_nominal_values() {
        let op = parse_operand("F'1,2,3'").unwrap();
        assert_eq!(op.ty, DataType::F);
        assert_eq!(op.nominal_value_count, 3);
    }

    #[test]
    fn parse_operand_prefers_longest_type_match() {
        let op = parse_operand("FD'1'").unwrap();
        assert_eq!(op.ty, DataType::FD);
    }

    #[test]
    fn parse_operand_reads_duplication_factor() {
        let op = parse_operand("3F'1'").unwrap();
        assert_eq!(op.modifiers.duplication, Some(3));
    }

    #[test]
    fn address_constant_length_and_type_attribute() {
        let op = DataDefOperand { ty: DataType::A, modifiers: Modifiers::default(), nominal_value_count: 1, first_nominal: None };
        let (attrs, diags) = validate(&op, true);
        assert_eq!(attrs.length, 4);
        assert_eq!(attrs.ty_code, 'A');
        assert!(diags.is_empty());
    }

    #[test]
    fn packed_decimal_scale_is_implied_by_the_literal_decimal_point() {
        let op = parse_operand("PL3'-12.34'").unwrap();
        let (attrs, _) = validate(&op, true);
        assert_eq!(attrs.length, 3);
        assert_eq!(attrs.scale, 2);
        assert_eq!(attrs.integer, 2 * 3 - 2 - 1);
    }

    #[test]
    fn explicit_scale_modifier_overrides_the_literal_decimal_point() {
        let op = parse_operand("PL3S1'-12.34'").unwrap();
        let (attrs, _) = validate(&op, true);
        assert_eq!(attrs.scale, 1);
    }

    #[test]
    fn character_type_never_derives_an_implicit_scale() {
        let op = parse_operand("CL5'3.14'").unwrap();
        let (attrs, _) = validate(&op, true);
        assert_eq!(attrs.scale, 0);
    }
}
