use super::handlers;
use super::helpers::HandlerErr;
use super::types::{AppState, Request};

type TryHandle = fn(&mut AppState, &Request) -> Option<serde_json::Value>;

const HANDLERS: &[TryHandle] = &[
    handlers::core::try_handle,
    handlers::session::try_handle,
    handlers::students::try_handle,
    handlers::attendance::try_handle,
    handlers::catechists::try_handle,
    handlers::deliveries::try_handle,
    handlers::payments::try_handle,
    handlers::ledger::try_handle,
    handlers::reports::try_handle,
    handlers::setup::try_handle,
    handlers::backup::try_handle,
];

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    tracing::debug!(id = %req.id, method = %req.method, "request");
    for try_handle in HANDLERS {
        if let Some(resp) = try_handle(state, &req) {
            if let Some(code) = resp.pointer("/error/code").and_then(|v| v.as_str()) {
                tracing::warn!(id = %req.id, method = %req.method, code, "request failed");
            }
            return resp;
        }
    }

    HandlerErr::not_implemented(&req.method).response(&req.id)
}
