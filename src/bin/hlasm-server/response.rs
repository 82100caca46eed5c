//! Handles responses to requests we issued ourselves -- currently only
//! the configuration pull sent from `main` at startup and on
//! `workspace/didChangeConfiguration`.

use super::{logger, Tools};

fn parse_configuration(resp: &lsp_server::Response) -> Option<String> {
    let result = resp.result.as_ref()?;
    let ary = result.as_array()?;
    ary.first().map(|item| item.to_string())
}

pub fn handle_response(connection: &lsp_server::Connection, resp: lsp_server::Response, tools: &mut Tools) {
    if resp.id.to_string() != "hlasm-pull-config" {
        return;
    }
    let Some(json_config) = parse_configuration(&resp) else {
        logger(connection, "configuration response had no payload");
        return;
    };
    if let Ok(mut analyzer) = tools.analyzer.lock() {
        if let Err(e) = analyzer.apply_settings(&json_config) {
            logger(connection, &format!("could not apply pulled configuration: {e}"));
        }
    }
}
