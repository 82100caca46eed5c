//! The HLASM language server. Cargo compiles this to a standalone
//! executable; `hlasm_analyzer::server::Analyzer` provides the analysis,
//! this file and its submodules are all the JSON-RPC plumbing.
//!
//! Same `logger`/`rpc_error` shape, same notification/request/response
//! submodule split as a typical `lsp-server` host. Analysis here runs
//! synchronously on the main loop rather than on a background thread
//! pool -- the core is a cooperative, non-threaded stepper by design, so
//! there is no long-running work to keep off the message loop.

use lsp_types as lsp;
use lsp::notification::Notification;
use std::error::Error;
use std::sync::{Arc, Mutex};

use hlasm_analyzer::server::Analyzer;

mod notification;
mod request;
mod response;

mod rpc_error {
    pub const PARSE_ERROR: i32 = -32700;
}

#[derive(thiserror::Error, Debug)]
enum ServerError {
    #[error("parsing")]
    Parsing,
}

pub fn logger(connection: &lsp_server::Connection, message: &str) {
    let note = lsp_server::Notification::new(
        lsp::notification::LogMessage::METHOD.to_string(),
        lsp::LogMessageParams { typ: lsp::MessageType::LOG, message: message.to_string() },
    );
    let _ = connection.sender.send(lsp_server::Message::Notification(note));
}

pub fn push_diagnostics(connection: &lsp_server::Connection, params: lsp::PublishDiagnosticsParams) {
    let note = lsp_server::Notification::new(lsp::notification::PublishDiagnostics::METHOD.to_string(), params);
    if connection.sender.send(lsp_server::Message::Notification(note)).is_err() {
        logger(connection, "could not push diagnostics");
    }
}

fn request_configuration(connection: &lsp_server::Connection) -> Result<(), Box<dyn Error>> {
    let req = lsp_server::Request::new(
        lsp_server::RequestId::from("hlasm-pull-config".to_string()),
        lsp::request::WorkspaceConfiguration::METHOD.to_string(),
        lsp::ConfigurationParams { items: vec![lsp::ConfigurationItem { scope_uri: None, section: Some("hlasm".to_string()) }] },
    );
    connection.sender.send(req.into()).map_err(|e| Box::new(e) as Box<dyn Error>)
}

pub struct Tools {
    pub analyzer: Arc<Mutex<Analyzer>>,
}

impl Tools {
    pub fn new() -> Self {
        Self { analyzer: Arc::new(Mutex::new(Analyzer::new())) }
    }
}

fn main() -> Result<(), Box<dyn Error + Sync + Send>> {
    let mut tools = Tools::new();
    let (connection, io_threads) = lsp_server::Connection::stdio();

    logger(&connection, "start initializing connection");
    let (id, params) = connection.initialize_start()?;
    let params: lsp::InitializeParams = serde_json::from_value(params)?;

    let result = lsp::InitializeResult {
        capabilities: lsp::ServerCapabilities {
            text_document_sync: Some(lsp::TextDocumentSyncCapability::Kind(lsp::TextDocumentSyncKind::FULL)),
            definition_provider: Some(lsp::OneOf::Left(true)),
            references_provider: Some(lsp::OneOf::Left(true)),
            hover_provider: Some(lsp::HoverProviderCapability::Simple(true)),
            completion_provider: Some(lsp::CompletionOptions {
                resolve_provider: Some(false),
                trigger_characters: Some(["&".to_string()].to_vec()),
                ..lsp::CompletionOptions::default()
            }),
            document_symbol_provider: Some(lsp::OneOf::Left(true)),
            ..lsp::ServerCapabilities::default()
        },
        server_info: Some(lsp::ServerInfo { name: "hlasm".to_string(), version: Some(env!("CARGO_PKG_VERSION").to_string()) }),
    };
    connection.initialize_finish(id, serde_json::to_value(result)?)?;
    logger(&connection, "connection initialized");

    let mut registrations: Vec<lsp::Registration> = Vec::new();
    if let Some(workspace) = params.capabilities.workspace {
        if workspace.configuration.unwrap_or(false) {
            registrations.push(lsp::Registration {
                id: "pull-config".to_string(),
                method: lsp::notification::DidChangeConfiguration::METHOD.to_string(),
                register_options: None,
            });
        }
    }
    let req = lsp_server::Request::new(
        lsp_server::RequestId::from("hlasm-reg-config".to_string()),
        lsp::request::RegisterCapability::METHOD.to_string(),
        lsp::RegistrationParams { registrations },
    );
    if connection.sender.send(req.into()).is_err() {
        logger(&connection, "could not register change configuration capability");
    }

    if request_configuration(&connection).is_err() {
        logger(&connection, "could not request starting configuration");
    }

    loop {
        match connection.receiver.recv() {
            Ok(lsp_server::Message::Notification(note)) => {
                notification::handle_notification(&connection, note, &mut tools);
            }
            Ok(lsp_server::Message::Request(req)) => {
                if request::handle_request(&connection, req, &mut tools) {
                    break;
                }
            }
            Ok(lsp_server::Message::Response(resp)) => {
                response::handle_response(&connection, resp, &mut tools);
            }
            Err(_) => break,
        }
    }

    io_threads.join()?;
    Ok(())
}
