//! Handles incoming notifications: document lifecycle and configuration
//! changes. Each document change re-runs the analyzer synchronously and
//! pushes fresh diagnostics, mirroring a conventional
//! `launch_analysis_thread` + `push_diagnostics` pairing minus the thread.

use lsp_types as lsp;
use lsp::notification::Notification as _;

use hlasm_analyzer::core::Document;

use super::{logger, push_diagnostics, Tools};

fn analyze_and_publish(connection: &lsp_server::Connection, tools: &Tools, doc: Document) {
    let uri = doc.uri.as_str().to_string();
    let mut analyzer = match tools.analyzer.lock() {
        Ok(a) => a,
        Err(_) => return,
    };
    analyzer.analyze(doc);
    if let Some(params) = analyzer.push_diagnostics(&uri) {
        push_diagnostics(connection, params);
    }
}

pub fn handle_notification(connection: &lsp_server::Connection, note: lsp_server::Notification, tools: &mut Tools) {
    match note.method.as_str() {
        lsp::notification::DidOpenTextDocument::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidOpenTextDocumentParams>(note.params) {
                let doc = Document::new(params.text_document.uri, params.text_document.text, Some(params.text_document.version));
                analyze_and_publish(connection, tools, doc);
            }
        }
        lsp::notification::DidChangeTextDocument::METHOD => {
            if let Ok(mut params) = serde_json::from_value::<lsp::DidChangeTextDocumentParams>(note.params) {
                if let Some(change) = params.content_changes.pop() {
                    let doc = Document::new(params.text_document.uri, change.text, Some(params.text_document.version));
                    analyze_and_publish(connection, tools, doc);
                }
            }
        }
        lsp::notification::DidChangeConfiguration::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DidChangeConfigurationParams>(note.params) {
                if let Ok(mut analyzer) = tools.analyzer.lock() {
                    if let Err(e) = analyzer.apply_settings(&params.settings.to_string()) {
                        logger(connection, &format!("settings update ignored: {e}"));
                    }
                }
            }
        }
        _ => {}
    }
}
