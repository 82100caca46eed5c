//! Black-box scenario tests run straight against the pipeline, the same
//! six cases used as worked examples: forward `AGO`, attribute lookahead,
//! zero-count substring, a duplicate sequence symbol in a branch that is
//! never taken, `DC PL3` attribute computation, and a macro parameter
//! feeding a lookahead `T'` query. Placed top-level (black-box) rather
//! than inside `core::pipeline`'s own test module since each exercises
//! several components together, mirroring the conventional split between
//! in-crate unit tests and a top-level `tests/` directory for
//! whole-pipeline scenarios.

use hlasm_analyzer::core::ca_expr::CaValue;
use hlasm_analyzer::core::catalog::BuiltinCatalog;
use hlasm_analyzer::core::diagnostics::Collect;
use hlasm_analyzer::core::lexer::ColumnLayout;
use hlasm_analyzer::core::pipeline::{Pipeline, StepResult};
use hlasm_analyzer::core::Id;

fn run(source: &str) -> (Pipeline<'static>, Collect) {
    static CATALOG: BuiltinCatalog = BuiltinCatalog;
    let lines: Vec<String> = source.lines().map(String::from).collect();
    let mut pipeline = Pipeline::new(lines, &CATALOG, ColumnLayout::default());
    let mut sink = Collect::default();
    loop {
        match pipeline.step(&mut sink) {
            StepResult::Yielded(_) => continue,
            StepResult::NeedLibrary(_) | StepResult::Finished => break,
        }
    }
    (pipeline, sink)
}

#[test]
fn forward_ago_skips_intervening_seta() {
    let (pipeline, _) = run("       AGO   .A\n&NEW   SETA  1\n.A     ANOP\n");
    assert!(pipeline.variables.get_scalar(Id::intern("&NEW")).is_none());
}

#[test]
fn attribute_lookahead_resolves_length() {
    let (pipeline, diags) = run("&A SETA L'X\nX  EQU 1,10,C'T'\n");
    assert_eq!(pipeline.variables.get_scalar(Id::intern("&A")), Some(CaValue::A(10)));
    assert!(diags.diagnostics.is_empty());
}

#[test]
fn substring_zero_count_is_empty_with_no_diagnostics() {
    let (pipeline, diags) = run("&S SETC 'ABC'(5,0)\n");
    assert_eq!(pipeline.variables.get_scalar(Id::intern("&S")), Some(CaValue::C(String::new())));
    assert!(diags.diagnostics.is_empty());
}

#[test]
fn duplicate_sequence_in_unused_branch_is_silent() {
    let (_, diags) = run("       AIF   (1).B\n.X     ANOP\n.X     ANOP\n.B     ANOP\n");
    assert!(diags.diagnostics.is_empty());
}

#[test]
fn packed_decimal_data_definition_computes_integer_attribute() {
    let (pipeline, _) = run("P DC PL3'-12.34'\n");
    let sym = pipeline.ordinary.get(Id::intern("P")).expect("P should be defined");
    assert_eq!(sym.attrs.t, 'P');
    assert_eq!(sym.attrs.l, 3);
    assert_eq!(sym.attrs.s, 2);
    assert_eq!(sym.attrs.i, 3);
}

#[test]
fn macro_parameter_feeds_lookahead_type_attribute() {
    let source = "\
      MACRO
      MAC  &LBL
&T    SETC T'&LBL
      MEND
      MAC  X
X     DS   C
";
    let (pipeline, diags) = run(source);
    assert_eq!(pipeline.variables.get_scalar(Id::intern("&T")), Some(CaValue::C("C".to_string())));
    assert!(diags.diagnostics.is_empty());
}
