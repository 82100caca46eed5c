//! Command-line entry point: `analyze`, `tokens`, and `check-config`
//! subcommands over the same `Analyzer` the language server uses.
//! Built around a `cli.rs` + `clap::Command` builder style and
//! an `err_warn_info_counts`-driven exit code.

use std::fs;
use std::process::ExitCode;

use clap::{arg, crate_version, Command};
use colored::Colorize;

use hlasm_analyzer::core::diagnostics::Severity;
use hlasm_analyzer::core::lexer::Lexer;
use hlasm_analyzer::core::Document;
use hlasm_analyzer::server::Analyzer;

fn build_cli() -> Command {
    Command::new("hlasm")
        .about("Analysis core for High-Level Assembler (HLASM) source.")
        .version(crate_version!())
        .subcommand_required(true)
        .subcommand(Command::new("analyze").arg(arg!(<FILE> "source file to analyze")))
        .subcommand(Command::new("tokens").arg(arg!(<FILE> "source file to tokenize")))
        .subcommand(Command::new("check-config").arg(arg!(<FILE> "settings JSON file to validate")))
}

fn main() -> ExitCode {
    env_logger::init();
    if !atty::is(atty::Stream::Stdout) {
        colored::control::set_override(false);
    }
    let matches = build_cli().get_matches();
    match matches.subcommand() {
        Some(("analyze", sub)) => analyze(sub.get_one::<String>("FILE").unwrap()),
        Some(("tokens", sub)) => tokens(sub.get_one::<String>("FILE").unwrap()),
        Some(("check-config", sub)) => check_config(sub.get_one::<String>("FILE").unwrap()),
        _ => ExitCode::FAILURE,
    }
}

fn analyze(path: &str) -> ExitCode {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    let uri = match file_uri(path) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    let mut analyzer = Analyzer::new();
    let diagnostics = analyzer.analyze(Document::new(uri, text, None));
    let (mut errors, mut warnings, mut infos) = (0u32, 0u32, 0u32);
    for d in &diagnostics {
        match hlasm_analyzer::core::diagnostics::severity_of(d.code) {
            Severity::Error => errors += 1,
            Severity::Warning => warnings += 1,
            Severity::Info => infos += 1,
        }
        println!("{}:{}: [{}] {}", d.range.start.line + 1, d.range.start.col + 1, d.code, d.message);
    }
    eprintln!("{errors} errors, {warnings} warnings, {infos} info");
    if errors > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Builds a `file://` URI from a filesystem path, percent-encoding any byte
/// not legal in a URI path segment instead of handing raw whitespace or
/// punctuation straight to the parser.
fn file_uri(path: &str) -> Result<lsp_types::Uri, String> {
    let mut encoded = String::from("file://");
    if !path.starts_with('/') {
        encoded.push('/');
    }
    for b in path.as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                encoded.push(*b as char);
            }
            _ => encoded.push_str(&format!("%{b:02X}")),
        }
    }
    encoded.parse().map_err(|e| format!("{path} is not a valid file URI: {e}"))
}

fn tokens(path: &str) -> ExitCode {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    for (i, line) in text.lines().enumerate() {
        let toks = Lexer::new(line).tokenize();
        println!("{}: {:?}", i + 1, toks.iter().map(|t| (&t.kind, &t.text)).collect::<Vec<_>>());
    }
    ExitCode::SUCCESS
}

fn check_config(path: &str) -> ExitCode {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            return ExitCode::FAILURE;
        }
    };
    match hlasm_analyzer::core::settings::parse(&text) {
        Ok(settings) => {
            println!("{settings:?}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{}: {e}", "error".red().bold());
            ExitCode::FAILURE
        }
    }
}
