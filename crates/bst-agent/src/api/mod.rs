//! REST API route tree.
//!
//! `POST /broadview/bst/{method}` and `POST /broadview/system/{method}`
//! carry JSON-RPC 2.0 requests. The method named in the path must match the
//! `method` member of the body.

pub mod bst;
pub mod error;
pub mod system;

use axum::Router;
use serde_json::Value;

use bst_common::protocol::{Method, Request, JSONRPC_VERSION};

use crate::state::AppState;

use self::error::ApiError;

/// Build the `/broadview` router.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/broadview/bst", bst::router())
        .nest("/broadview/system", system::router())
}

/// Decode and check a request envelope.
///
/// `allowed` lists the methods reachable under the route that received the
/// body.
pub fn parse_envelope(
    path_method: &str,
    body: &[u8],
    allowed: &[Method],
) -> Result<(Method, Request), ApiError> {
    let raw: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::parse_error(e.to_string()))?;
    let id = raw.get("id").and_then(Value::as_u64);

    let req: Request = serde_json::from_value(raw)
        .map_err(|e| ApiError::invalid_request(id, e.to_string()))?;
    if req.jsonrpc != JSONRPC_VERSION {
        return Err(ApiError::invalid_request(
            id,
            format!("unsupported jsonrpc version {:?}", req.jsonrpc),
        ));
    }

    let method = path_method
        .parse::<Method>()
        .ok()
        .filter(|m| allowed.contains(m))
        .ok_or_else(|| ApiError::method_not_found(id, format!("unknown method: {path_method}")))?;
    if req.method != method.as_str() {
        return Err(ApiError::invalid_request(
            id,
            format!("body method {:?} does not match path {}", req.method, method),
        ));
    }
    Ok((method, req))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bst_common::protocol::error_code;

    #[test]
    fn envelope_errors_map_to_rpc_codes() {
        let bst = &Method::BST;
        let err = parse_envelope("get-bst-feature", b"{not json", bst).unwrap_err();
        assert_eq!(err.code(), error_code::PARSE_ERROR);

        let body = br#"{"jsonrpc":"1.0","method":"get-bst-feature","asic-id":"1","id":3}"#;
        let err = parse_envelope("get-bst-feature", body, bst).unwrap_err();
        assert_eq!(err.code(), error_code::INVALID_REQUEST);

        let body = br#"{"jsonrpc":"2.0","method":"get-bst-tracking","asic-id":"1","id":3}"#;
        let err = parse_envelope("get-bst-feature", body, bst).unwrap_err();
        assert_eq!(err.code(), error_code::INVALID_REQUEST);

        let body = br#"{"jsonrpc":"2.0","method":"trigger-report","asic-id":"1","id":3}"#;
        let err = parse_envelope("trigger-report", body, bst).unwrap_err();
        assert_eq!(err.code(), error_code::METHOD_NOT_FOUND);

        let body = br#"{"jsonrpc":"2.0","method":"get-bst-feature","id":3}"#;
        let err = parse_envelope("get-bst-feature", body, bst).unwrap_err();
        assert_eq!(err.code(), error_code::INVALID_REQUEST);
    }

    #[test]
    fn accepts_matching_envelope() {
        let body = br#"{"jsonrpc":"2.0","method":"get-bst-report","asic-id":"1","params":{"include-device":1},"id":9}"#;
        let (method, req) = parse_envelope("get-bst-report", body, &Method::BST).unwrap();
        assert_eq!(method, Method::GetBstReport);
        assert_eq!(req.id, 9);
        assert_eq!(req.asic_id, "1");
    }
}
