//! JSON-RPC 2.0 envelope spoken on the BST REST API.
//!
//! Every method is reached at `POST /broadview/<app>/<method>` with a
//! [`Request`] body; the agent answers with a [`Response`]. Asynchronous
//! reports pushed to the collector use the same response shape without `id`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::report::RealmReport;

pub const JSONRPC_VERSION: &str = "2.0";
/// Value of the `version` field in responses.
pub const API_VERSION: &str = "1";

/// Standard JSON-RPC error codes.
pub mod error_code {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ── Methods ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    GetBstFeature,
    ConfigureBstFeature,
    GetBstTracking,
    ConfigureBstTracking,
    GetBstThresholds,
    ConfigureBstThresholds,
    ClearBstThresholds,
    GetBstReport,
    ClearBstStatistics,
    GetBstCongestionDropCounters,
    GetSwitchProperties,
    /// Agent-originated only; never accepted as a request.
    TriggerReport,
}

impl Method {
    pub const BST: [Method; 10] = [
        Method::GetBstFeature,
        Method::ConfigureBstFeature,
        Method::GetBstTracking,
        Method::ConfigureBstTracking,
        Method::GetBstThresholds,
        Method::ConfigureBstThresholds,
        Method::ClearBstThresholds,
        Method::GetBstReport,
        Method::ClearBstStatistics,
        Method::GetBstCongestionDropCounters,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GetBstFeature => "get-bst-feature",
            Method::ConfigureBstFeature => "configure-bst-feature",
            Method::GetBstTracking => "get-bst-tracking",
            Method::ConfigureBstTracking => "configure-bst-tracking",
            Method::GetBstThresholds => "get-bst-thresholds",
            Method::ConfigureBstThresholds => "configure-bst-thresholds",
            Method::ClearBstThresholds => "clear-bst-thresholds",
            Method::GetBstReport => "get-bst-report",
            Method::ClearBstStatistics => "clear-bst-statistics",
            Method::GetBstCongestionDropCounters => "get-bst-congestion-drop-counters",
            Method::GetSwitchProperties => "get-switch-properties",
            Method::TriggerReport => "trigger-report",
        }
    }

    /// REST path the method is served at.
    pub fn path(&self) -> String {
        match self {
            Method::GetSwitchProperties => format!("/broadview/system/{}", self.as_str()),
            _ => format!("/broadview/bst/{}", self.as_str()),
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::BST
            .iter()
            .chain([Method::GetSwitchProperties, Method::TriggerReport].iter())
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown method: {s}"))
    }
}

// ── Request ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Request {
    pub jsonrpc: String,
    pub method: String,
    pub asic_id: String,
    #[serde(default)]
    pub params: Value,
    pub id: u64,
}

impl Request {
    pub fn new(method: Method, asic_id: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: method.as_str().into(),
            asic_id: asic_id.into(),
            params,
            id,
        }
    }

    /// Parse `params` into a concrete type; absent params read as `{}`.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        match &self.params {
            Value::Null => serde_json::from_value(Value::Object(Map::new())),
            params => serde_json::from_value(params.clone()),
        }
    }
}

// ── Response ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Response {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asic_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_stamp: Option<String>,
    /// Triggering realm (`trigger-report` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    /// Triggering counter (`trigger-report` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Index keys of the triggering entry (`port`, `queue`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Response {
    fn envelope(method: Method, asic_id: &str, id: Option<u64>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            method: Some(method.as_str().into()),
            asic_id: Some(asic_id.into()),
            version: Some(API_VERSION.into()),
            id,
            ..Default::default()
        }
    }

    /// Acknowledgement for configure/clear methods.
    pub fn ack(method: Method, asic_id: &str, id: u64) -> Self {
        Self::envelope(method, asic_id, Some(id))
    }

    pub fn result(method: Method, asic_id: &str, id: u64, result: Value) -> Self {
        Self {
            result: Some(result),
            ..Self::envelope(method, asic_id, Some(id))
        }
    }

    /// Report-shaped document; `id` is absent for asynchronous reports.
    pub fn report(
        method: Method,
        asic_id: &str,
        id: Option<u64>,
        time_stamp: String,
        report: Value,
    ) -> Self {
        Self {
            time_stamp: Some(time_stamp),
            report: Some(report),
            ..Self::envelope(method, asic_id, id)
        }
    }

    pub fn error(id: Option<u64>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
            ..Default::default()
        }
    }

    /// Parse `result` into a concrete type.
    pub fn parse_result<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.result.clone().unwrap_or(Value::Null))
    }

    /// Parse `report` as realm reports.
    pub fn realm_reports(&self) -> Result<Vec<RealmReport>, serde_json::Error> {
        serde_json::from_value(self.report.clone().unwrap_or(Value::Array(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_shape() {
        let req = Request::new(
            Method::GetBstFeature,
            "1",
            serde_json::json!({}),
            7,
        );
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": "get-bst-feature",
                "asic-id": "1",
                "params": {},
                "id": 7
            })
        );
    }

    #[test]
    fn missing_params_parse_as_empty() {
        let req: Request = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "method": "clear-bst-statistics",
            "asic-id": "1",
            "id": 1
        }))
        .unwrap();
        let params: Map<String, Value> = req.parse_params().unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn ack_has_no_payload() {
        let json = serde_json::to_value(Response::ack(Method::ClearBstThresholds, "1", 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": "clear-bst-thresholds",
                "asic-id": "1",
                "version": "1",
                "id": 3
            })
        );
    }

    #[test]
    fn error_response_shape() {
        let json = serde_json::to_value(Response::error(
            Some(4),
            error_code::INVALID_PARAMS,
            "bad realm",
        ))
        .unwrap();
        assert_eq!(json["error"]["code"], -32602);
        assert_eq!(json["id"], 4);
        assert!(json.get("method").is_none());
    }

    #[test]
    fn trigger_index_keys_flatten() {
        let mut resp = Response::report(
            Method::TriggerReport,
            "1",
            None,
            "2016-01-01 - 00:00:00".into(),
            serde_json::json!([]),
        );
        resp.realm = Some("egress-uc-queue".into());
        resp.counter = Some("uc".into());
        resp.extra.insert("queue".into(), serde_json::json!(12));
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["queue"], 12);
        assert_eq!(json["counter"], "uc");
        assert!(json.get("id").is_none());

        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back.extra.get("queue"), Some(&serde_json::json!(12)));
    }

    #[test]
    fn method_paths() {
        assert_eq!(Method::GetBstReport.path(), "/broadview/bst/get-bst-report");
        assert_eq!(
            Method::GetSwitchProperties.path(),
            "/broadview/system/get-switch-properties"
        );
        assert_eq!(
            "get-bst-congestion-drop-counters".parse::<Method>().unwrap(),
            Method::GetBstCongestionDropCounters
        );
        assert!("cancel-request".parse::<Method>().is_err());
    }
}
