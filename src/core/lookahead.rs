//! The lookahead resolver.
//!
//! Triggered when an attribute reference (`T'`, `L'`, `S'`, `I'`, `D'`)
//! names a symbol the ordinary pass has not reached yet. A lookahead scan
//! runs forward over the remaining source looking only for that symbol's
//! *defining* statement, extracts the attributes it can determine
//! structurally (without fully evaluating the statement), and seeds them
//! into the ordinary-symbol table so the original attribute query can be
//! answered. It must never have side effects: no symbol table mutation
//! beyond the seeded attributes, and its own diagnostics are discarded
//! (`core::diagnostics::Drop`).
//!
//! `T'` gets a short-circuit: a structural `T'x EQ 'c'` (or mirrored
//! `'c' EQ T'x`) comparison resolves `x`'s type attribute directly against
//! the literal without needing the symbol's value at all, since `T'` of an
//! undefined symbol is well-defined (`'U'`) and does not require it to
//! ever be defined.

use super::datadef::validate;
use super::parser::split_fields;
use super::symbols::Attributes;
use super::Range;

/// Scan `lines[from..]` for the statement that defines `target` (as an
/// ordinary label), returning the attributes a lookahead pass can
/// determine without full evaluation. Only considers `EQU`, `DC`/`DS`,
/// and plain machine/assembler-instruction labels -- the statement kinds
/// attribute lookahead actually needs to see through.
pub fn scan_for_definition(lines: &[String], from: usize, target: &str) -> Option<(Attributes, Range, usize)> {
    for (offset, line) in lines.iter().enumerate().skip(from) {
        let fields = split_fields(line);
        let Some(label_span) = fields.label else { continue };
        let label_text: String = line.chars().skip(label_span.start).take(label_span.end - label_span.start).collect();
        if !label_text.eq_ignore_ascii_case(target) {
            continue;
        }
        let opcode_text: String = fields
            .opcode
            .map(|s| line.chars().skip(s.start).take(s.end - s.start).collect())
            .unwrap_or_default();
        let operand_text: String = fields
            .operand
            .map(|s| line.chars().skip(s.start).take(s.end - s.start).collect())
            .unwrap_or_default();
        let at = Range::on_line(offset as u32, label_span.start as u32, label_span.end as u32);

        let attrs = match opcode_text.to_ascii_uppercase().as_str() {
            "EQU" => attrs_from_equ(&operand_text),
            "DC" => attrs_from_datadef(&operand_text, true),
            "DS" => attrs_from_datadef(&operand_text, false),
            _ => Attributes { t: 'I', ..Attributes::default() }, // ordinary instruction label: instruction-address type
        };
        return Some((attrs, at, offset));
    }
    None
}

/// `EQU value,length,type,program-type,assembler-type`: extracts
/// `L`/`T`/`P`/`A`; operands past the value are optional and keep the
/// standard defaults (`L=1`, `T='U'`) when absent. A complex value operand
/// (anything that is not a plain integer literal) still yields a usable
/// length/type from the operands that follow it; only the value itself is
/// approximated here since lookahead does not need it.
pub fn attrs_from_equ(operand_text: &str) -> Attributes {
    let spans = super::parser::split_operands(operand_text);
    let texts: Vec<String> = spans
        .iter()
        .map(|sp| operand_text.chars().skip(sp.start).take(sp.end - sp.start).collect::<String>())
        .collect();
    let mut attrs = Attributes { l: 1, ..Attributes::default() };
    if let Some(len_text) = texts.get(1) {
        if let Ok(n) = len_text.trim().parse::<i32>() {
            attrs.l = n;
        }
    }
    if let Some(type_text) = texts.get(2) {
        if let Some(c) = quoted_char_literal(type_text) {
            attrs.t = c;
        }
    }
    if let Some(prog_text) = texts.get(3) {
        if let Some(c) = quoted_char_literal(prog_text) {
            attrs.p = c;
        }
    }
    attrs
}

/// Extracts the single character out of a `C'x'`-shaped self-defining
/// term, the form EQU's type/program-type operands use to name an
/// attribute letter literally rather than compute one.
fn quoted_char_literal(text: &str) -> Option<char> {
    let text = text.trim();
    let inner = text.strip_prefix("C'").or_else(|| text.strip_prefix("c'"))?;
    let inner = inner.strip_suffix('\'')?;
    inner.chars().next()
}

fn attrs_from_datadef(operand_text: &str, is_dc: bool) -> Attributes {
    let first = super::parser::split_operands(operand_text)
        .into_iter()
        .next()
        .map(|sp| operand_text.chars().skip(sp.start).take(sp.end - sp.start).collect::<String>())
        .unwrap_or_default();
    let Some(op) = super::datadef::parse_operand(&first) else {
        return Attributes::default();
    };
    let (attrs, _) = validate(&op, is_dc);
    Attributes { t: attrs.ty_code, l: attrs.length as i32, s: attrs.scale as i32, i: attrs.integer as i32, d: true, ..Attributes::default() }
}

/// Structural short-circuit for `T'x EQ 'c'` / `'c' EQ T'x` (and the `NE`
/// mirror): when the whole condition has this shape, the type attribute
/// is compared directly without needing `x` to resolve to anything else.
/// Returns the boolean result if the shape matched.
pub fn try_type_attr_shortcircuit(cond_text: &str, ordinary_type_of: impl Fn(&str) -> char) -> Option<bool> {
    let cond_text = cond_text.trim();
    for op in ["EQ", "NE"] {
        if let Some(result) = match_pattern(cond_text, op, &ordinary_type_of) {
            return Some(result);
        }
    }
    None
}

fn match_pattern(cond_text: &str, op: &str, ordinary_type_of: &impl Fn(&str) -> char) -> Option<bool> {
    let parts: Vec<&str> = cond_text.splitn(2, op).collect();
    if parts.len() != 2 {
        return None;
    }
    let (lhs, rhs) = (parts[0].trim(), parts[1].trim());
    let (type_side, lit_side) = if lhs.starts_with("T'") {
        (lhs, rhs)
    } else if rhs.starts_with("T'") {
        (rhs, lhs)
    } else {
        return None;
    };
    let sym = type_side.trim_start_matches("T'");
    let lit = lit_side.trim_matches('\'');
    if lit.chars().count() != 1 {
        return None;
    }
    let actual = ordinary_type_of(sym);
    let matches = actual == lit.chars().next().unwrap();
    Some(if op == "EQ" { matches } else { !matches })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_equ_definition_ahead() {
        let lines = vec!["         AGO   .X".to_string(), "FWD      EQU   5".to_string()];
        let (attrs, _, offset) = scan_for_definition(&lines, 0, "FWD").unwrap();
        assert_eq!(offset, 1);
        assert_eq!(attrs.t, 'U');
    }

    #[test]
    fn finds_dc_definition_and_computes_length() {
        let lines = vec!["LBL      DC    F'1'".to_string()];
        let (attrs, _, _) = scan_for_definition(&lines, 0, "LBL").unwrap();
        assert_eq!(attrs.t, 'F');
        assert_eq!(attrs.l, 4);
    }

    #[test]
    fn missing_target_returns_none() {
        let lines = vec!["LBL      EQU   1".to_string()];
        assert!(scan_for_definition(&lines, 0, "OTHER").is_none());
    }

    #[test]
    fn type_attr_shortcircuit_matches_either_order() {
        let type_of = |_: &str| 'F';
        assert_eq!(try_type_attr_shortcircuit("T'X EQ 'F'", type_of), Some(true));
        assert_eq!(try_type_attr_shortcircuit("'F' EQ T'X", type_of), Some(true));
        assert_eq!(try_type_attr_shortcircuit("T'X NE 'F'", type_of), Some(false));
    }

    #[test]
    fn non_matching_shape_returns_none() {
        let type_of = |_: &str| 'F';
        assert!(try_type_attr_shortcircuit("L'X EQ 4", type_of).is_none());
    }
}
