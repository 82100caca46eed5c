//! Provides responses to incoming requests, reading from the shared
//! `SemanticIndex` the analyzer built up as documents were analyzed.

use lsp_types as lsp;
use lsp::request::Request as _;
use lsp_server::{Connection, RequestId, Response};

use hlasm_analyzer::core::Id;

use super::{logger, rpc_error::PARSE_ERROR, Tools};

fn def_response(req_id: RequestId, meth: &str) -> Response {
    Response::new_err(req_id, PARSE_ERROR, format!("request {req_id} ({meth}) not understood"))
}

/// Finds the identifier token touching `pos` in `text`, if any. HLASM
/// names start with a letter, `$`, `@`, `#`, or `&`, and continue with
/// those plus digits and `_`.
fn symbol_at(text: &str, pos: lsp::Position) -> Option<String> {
    let line = text.lines().nth(pos.line as usize)?;
    let chars: Vec<char> = line.chars().collect();
    let col = (pos.character as usize).min(chars.len());
    let is_cont = |c: char| c.is_ascii_alphanumeric() || matches!(c, '$' | '@' | '#' | '_' | '&');
    if col >= chars.len() || !is_cont(chars[col]) {
        return None;
    }
    let mut start = col;
    while start > 0 && is_cont(chars[start - 1]) {
        start -= 1;
    }
    let mut end = col;
    while end < chars.len() && is_cont(chars[end]) {
        end += 1;
    }
    Some(chars[start..end].iter().collect())
}

fn range_of(uri: &str, range: hlasm_analyzer::core::Range) -> lsp::Location {
    lsp::Location { uri: uri.parse().expect("indexed uri should be a valid URI"), range: range.to_lsp() }
}

pub fn handle_request(connection: &Connection, req: lsp_server::Request, tools: &mut Tools) -> bool {
    let mut resp = def_response(req.id.clone(), &req.method);

    match req.method.as_str() {
        lsp::request::Shutdown::METHOD => {
            logger(connection, "shutdown request");
            resp = Response::new_ok(req.id.clone(), ());
            connection.sender.send(resp.into()).expect("failed to respond to shutdown request");
            let _ = connection.receiver.recv_timeout(std::time::Duration::from_secs(30));
            return true;
        }
        lsp::request::GotoDefinition::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::GotoDefinitionParams>(req.params) {
                if let Ok(analyzer) = tools.analyzer.lock() {
                    let uri = params.text_document_position_params.text_document.uri.as_str().to_string();
                    if let Some(chk) = analyzer.checkpoint(&uri) {
                        if let Some(name) = symbol_at(&chk.doc.text, params.text_document_position_params.position) {
                            if let Some((def_uri, range)) = analyzer.index.definition(Id::intern(&name)) {
                                let loc = range_of(def_uri, range);
                                resp = Response::new_ok(req.id.clone(), lsp::GotoDefinitionResponse::Scalar(loc));
                            }
                        }
                    }
                }
            }
        }
        lsp::request::References::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::ReferenceParams>(req.params) {
                if let Ok(analyzer) = tools.analyzer.lock() {
                    let uri = params.text_document_position.text_document.uri.as_str().to_string();
                    if let Some(chk) = analyzer.checkpoint(&uri) {
                        if let Some(name) = symbol_at(&chk.doc.text, params.text_document_position.position) {
                            let locs: Vec<lsp::Location> =
                                analyzer.index.references(Id::intern(&name)).into_iter().map(|(u, r)| range_of(u, r)).collect();
                            resp = Response::new_ok(req.id.clone(), locs);
                        }
                    }
                }
            }
        }
        lsp::request::HoverRequest::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::HoverParams>(req.params) {
                if let Ok(analyzer) = tools.analyzer.lock() {
                    let uri = params.text_document_position_params.text_document.uri.as_str().to_string();
                    if let Some(chk) = analyzer.checkpoint(&uri) {
                        if let Some(name) = symbol_at(&chk.doc.text, params.text_document_position_params.position) {
                            if let Some(text) = analyzer.index.hover(Id::intern(&name)) {
                                resp = Response::new_ok(
                                    req.id.clone(),
                                    lsp::Hover { contents: lsp::HoverContents::Scalar(lsp::MarkedString::String(text)), range: None },
                                );
                            }
                        }
                    }
                }
            }
        }
        lsp::request::Completion::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::CompletionParams>(req.params) {
                if let Ok(analyzer) = tools.analyzer.lock() {
                    let uri = params.text_document_position.text_document.uri.as_str().to_string();
                    let prefix = analyzer
                        .checkpoint(&uri)
                        .and_then(|chk| symbol_at(&chk.doc.text, params.text_document_position.position))
                        .unwrap_or_default();
                    let items: Vec<lsp::CompletionItem> = analyzer
                        .index
                        .completion(&prefix)
                        .into_iter()
                        .map(|id| lsp::CompletionItem { label: id.to_string(), kind: Some(lsp::CompletionItemKind::VARIABLE), ..Default::default() })
                        .collect();
                    resp = Response::new_ok(req.id.clone(), lsp::CompletionResponse::Array(items));
                }
            }
        }
        lsp::request::DocumentSymbolRequest::METHOD => {
            if let Ok(params) = serde_json::from_value::<lsp::DocumentSymbolParams>(req.params) {
                if let Ok(analyzer) = tools.analyzer.lock() {
                    let symbols: Vec<lsp::SymbolInformation> = analyzer
                        .index
                        .document_symbols(&params.text_document.uri)
                        .into_iter()
                        .map(|(id, range)| {
                            #[allow(deprecated)]
                            lsp::SymbolInformation {
                                name: id.to_string(),
                                kind: lsp::SymbolKind::FIELD,
                                tags: None,
                                deprecated: None,
                                location: lsp::Location { uri: params.text_document.uri.clone(), range: range.to_lsp() },
                                container_name: None,
                            }
                        })
                        .collect();
                    resp = Response::new_ok(req.id.clone(), lsp::DocumentSymbolResponse::Flat(symbols));
                }
            }
        }
        _ => {}
    }

    connection.sender.send(resp.into()).is_err()
}
