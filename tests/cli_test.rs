//! Black-box tests against the `hlasm` binary itself, the same
//! `assert_cmd`/`predicates` shape the teacher's own `cli_test.rs` uses,
//! one `NamedTempFile` per case rather than fixed fixture files since the
//! cases here are small enough to inline.

use assert_cmd::cargo;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

type STDRESULT = Result<(), Box<dyn std::error::Error>>;

fn source_file(text: &str) -> std::io::Result<NamedTempFile> {
    let mut f = NamedTempFile::new()?;
    f.write_all(text.as_bytes())?;
    Ok(f)
}

#[test]
fn analyze_clean_file_reports_no_problems() -> STDRESULT {
    let f = source_file("LBL      EQU   1\n")?;
    let mut cmd = cargo::cargo_bin_cmd!("hlasm");
    cmd.arg("analyze").arg(f.path()).assert().success().stderr(predicate::str::contains("0 errors"));
    Ok(())
}

#[test]
fn analyze_reports_an_error_and_nonzero_exit() -> STDRESULT {
    let f = source_file("&A SETA 1/0\n")?;
    let mut cmd = cargo::cargo_bin_cmd!("hlasm");
    cmd.arg("analyze").arg(f.path()).assert().failure().stdout(predicate::str::contains("CE003"));
    Ok(())
}

#[test]
fn tokens_dumps_a_line_of_lexemes() -> STDRESULT {
    let f = source_file("X EQU 1\n")?;
    let mut cmd = cargo::cargo_bin_cmd!("hlasm");
    cmd.arg("tokens").arg(f.path()).assert().success().stdout(predicate::str::contains("OrdSymbol"));
    Ok(())
}

#[test]
fn check_config_accepts_a_well_formed_settings_blob() -> STDRESULT {
    let f = source_file(r#"{"columns":{"begin":1,"end":71,"continue":16}}"#)?;
    let mut cmd = cargo::cargo_bin_cmd!("hlasm");
    cmd.arg("check-config").arg(f.path()).assert().success();
    Ok(())
}

#[test]
fn check_config_falls_back_to_defaults_on_malformed_json() -> STDRESULT {
    let f = source_file("not json")?;
    let mut cmd = cargo::cargo_bin_cmd!("hlasm");
    cmd.arg("check-config").arg(f.path()).assert().success().stdout(predicate::str::contains("72"));
    Ok(())
}

#[test]
fn analyze_missing_file_fails_with_a_clear_message() -> STDRESULT {
    let mut cmd = cargo::cargo_bin_cmd!("hlasm");
    cmd.arg("analyze").arg("/no/such/file.hlasm").assert().failure();
    Ok(())
}
