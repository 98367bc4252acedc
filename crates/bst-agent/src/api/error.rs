//! JSON-RPC error responses.

use axum::http::StatusCode;
use axum::Json;

use bst_common::protocol::{error_code, Response};

use crate::engine::BstError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: i64,
    message: String,
    id: Option<u64>,
}

impl ApiError {
    fn new(status: StatusCode, code: i64, id: Option<u64>, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: msg.into(),
            id,
        }
    }

    /// The body is not JSON at all.
    pub fn parse_error(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_code::PARSE_ERROR, None, msg)
    }

    pub fn invalid_request(id: Option<u64>, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_code::INVALID_REQUEST, id, msg)
    }

    pub fn method_not_found(id: Option<u64>, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, error_code::METHOD_NOT_FOUND, id, msg)
    }

    pub fn invalid_params(id: Option<u64>, msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_code::INVALID_PARAMS, id, msg)
    }

    pub fn internal(id: Option<u64>, msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_code::INTERNAL_ERROR,
            id,
            msg,
        )
    }

    pub fn from_bst(id: u64, err: BstError) -> Self {
        let id = Some(id);
        match err.code() {
            error_code::INVALID_PARAMS => Self::invalid_params(id, err.to_string()),
            error_code::METHOD_NOT_FOUND => Self::method_not_found(id, err.to_string()),
            _ => Self::internal(id, err.to_string()),
        }
    }

    pub fn code(&self) -> i64 {
        self.code
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        if self.status.is_server_error() {
            tracing::error!(code = self.code, id = ?self.id, "{}", self.message);
        } else {
            tracing::warn!(code = self.code, id = ?self.id, "{}", self.message);
        }
        let body = Response::error(self.id, self.code, self.message);
        (self.status, Json(body)).into_response()
    }
}
