//! The nine BST API checks.
//!
//! Each check drives the agent through one API area and returns a
//! [`CheckOutcome`]: `Ok(())` or the step that failed with a message.
//! Checks that change agent configuration restore it before returning.

pub mod feature;
pub mod report;
pub mod thresholds;
pub mod tracking;

use std::fmt;

use serde_json::Value;

use bst_common::models::{FeatureConfig, ReportOptions};
use bst_common::protocol::{Method, Response, API_VERSION};
use bst_common::report::{decode, TIME_STAMP_FORMAT};
use bst_common::snapshot::Snapshot;

use crate::client::BstClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub step: String,
    pub message: String,
}

impl fmt::Display for CheckFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.step, self.message)
    }
}

impl std::error::Error for CheckFailure {}

pub type CheckOutcome = Result<(), CheckFailure>;

pub(crate) fn fail(step: &str, message: impl Into<String>) -> CheckFailure {
    CheckFailure {
        step: step.to_string(),
        message: message.into(),
    }
}

pub(crate) fn ensure(cond: bool, step: &str, message: impl FnOnce() -> String) -> CheckOutcome {
    if cond {
        Ok(())
    } else {
        Err(fail(step, message()))
    }
}

/// Attach the failing step to any error.
pub(crate) trait Step<T> {
    fn step(self, step: &str) -> Result<T, CheckFailure>;
}

impl<T, E: fmt::Display> Step<T> for Result<T, E> {
    fn step(self, step: &str) -> Result<T, CheckFailure> {
        self.map_err(|e| fail(step, e.to_string()))
    }
}

// ── Shared steps ────────────────────────────────────────────────────

fn to_params<T: serde::Serialize>(value: &T, step: &str) -> Result<Value, CheckFailure> {
    serde_json::to_value(value).step(step)
}

/// Envelope fields every successful response carries.
pub(crate) fn check_envelope(client: &BstClient, method: Method, resp: &Response) -> CheckOutcome {
    let step = method.as_str();
    ensure(resp.method.as_deref() == Some(step), step, || {
        format!("method echoed as {:?}", resp.method)
    })?;
    ensure(resp.asic_id.as_deref() == Some(client.asic_id()), step, || {
        format!("asic-id echoed as {:?}", resp.asic_id)
    })?;
    ensure(resp.version.as_deref() == Some(API_VERSION), step, || {
        format!("version is {:?}", resp.version)
    })
}

/// Envelope plus a well-formed `time-stamp` and decodable `report`.
pub(crate) fn check_report(
    client: &BstClient,
    method: Method,
    resp: &Response,
) -> Result<Snapshot, CheckFailure> {
    let step = method.as_str();
    check_envelope(client, method, resp)?;
    let stamp = resp
        .time_stamp
        .as_deref()
        .ok_or_else(|| fail(step, "missing time-stamp"))?;
    chrono::NaiveDateTime::parse_from_str(stamp, TIME_STAMP_FORMAT)
        .map_err(|e| fail(step, format!("time-stamp {stamp:?}: {e}")))?;
    let reports = resp.realm_reports().step(step)?;
    decode(&reports).step(step)
}

/// Send a request that must be rejected with `code`.
pub(crate) async fn expect_rejected(
    client: &BstClient,
    method: Method,
    params: Value,
    code: i64,
    step: &str,
) -> CheckOutcome {
    let reply = client.call_raw(method, params).await.step(step)?;
    let got = reply.response.error.as_ref().map(|e| e.code);
    ensure(got == Some(code), step, || {
        format!("expected error {code}, got {got:?} (HTTP {})", reply.status)
    })?;
    ensure(reply.status >= 400, step, || {
        format!("error reply carried HTTP {}", reply.status)
    })
}

pub(crate) async fn get_feature(client: &BstClient) -> Result<FeatureConfig, CheckFailure> {
    let step = "get-bst-feature";
    let resp = client
        .call(Method::GetBstFeature, serde_json::json!({}))
        .await
        .step(step)?;
    resp.parse_result().step(step)
}

pub(crate) async fn configure_feature(client: &BstClient, params: Value) -> CheckOutcome {
    let step = "configure-bst-feature";
    let resp = client
        .call(Method::ConfigureBstFeature, params)
        .await
        .step(step)?;
    check_envelope(client, Method::ConfigureBstFeature, &resp)
}

/// Put a saved feature configuration back.
pub(crate) async fn restore_feature(client: &BstClient, saved: &FeatureConfig) -> CheckOutcome {
    configure_feature(client, to_params(saved, "restore feature")?).await
}

pub(crate) fn all_realms() -> Result<Value, CheckFailure> {
    to_params(&ReportOptions::all(), "report options")
}

/// Report values in cells so thresholds compare one to one.
pub(crate) fn cells_params() -> Value {
    serde_json::json!({ "stat-units-in-cells": 1, "stats-in-percentage": 0 })
}
