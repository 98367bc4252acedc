//! JSON-RPC client for the agent's REST API.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use bst_common::protocol::{Method, Request, Response, RpcError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("undecodable response (HTTP {status}): {source}")]
    Decode {
        status: u16,
        #[source]
        source: serde_json::Error,
    },
    #[error("agent returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("response id {got:?} does not match request id {expected}")]
    IdMismatch { expected: u64, got: Option<u64> },
}

/// An HTTP status with the decoded JSON-RPC response body.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub response: Response,
}

pub struct BstClient {
    http: reqwest::Client,
    base: String,
    asic_id: String,
    next_id: AtomicU64,
}

impl BstClient {
    pub fn new(ip: &str, port: u16, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base: format!("http://{ip}:{port}"),
            asic_id: "1".into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub fn asic_id(&self) -> &str {
        &self.asic_id
    }

    /// Send `method` and return the reply whatever its status.
    pub async fn call_raw(&self, method: Method, params: Value) -> Result<Reply, ClientError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = Request::new(method, self.asic_id.clone(), params, id);
        let url = format!("{}{}", self.base, method.path());
        tracing::debug!(%method, id, %url, "request");

        let resp = self.http.post(&url).json(&req).send().await?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await?;
        let response: Response = serde_json::from_slice(&body)
            .map_err(|source| ClientError::Decode { status, source })?;
        if response.id.is_some() && response.id != Some(id) {
            return Err(ClientError::IdMismatch {
                expected: id,
                got: response.id,
            });
        }
        Ok(Reply { status, response })
    }

    /// Send `method`; a JSON-RPC error becomes [`ClientError::Rpc`].
    pub async fn call(&self, method: Method, params: Value) -> Result<Response, ClientError> {
        let mut response = self.call_raw(method, params).await?.response;
        if let Some(RpcError { code, message }) = response.error.take() {
            return Err(ClientError::Rpc { code, message });
        }
        Ok(response)
    }
}
