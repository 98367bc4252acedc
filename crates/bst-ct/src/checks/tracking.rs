//! `get-bst-tracking` and `configure-bst-tracking`.

use serde_json::Value;

use bst_common::models::TrackingConfig;
use bst_common::protocol::{error_code, Method};
use bst_common::realm::Realm;

use super::{check_envelope, ensure, expect_rejected, CheckFailure, CheckOutcome, Step};
use crate::client::BstClient;

fn tracking_key(realm: Realm) -> String {
    format!("track-{}", realm.as_str())
}

async fn get_tracking(client: &BstClient) -> Result<(TrackingConfig, Value), CheckFailure> {
    let step = "get-bst-tracking";
    let resp = client
        .call(Method::GetBstTracking, serde_json::json!({}))
        .await
        .step(step)?;
    check_envelope(client, Method::GetBstTracking, &resp)?;
    let tracking = resp.parse_result().step(step)?;
    Ok((tracking, resp.result.unwrap_or_default()))
}

async fn configure_tracking(client: &BstClient, params: Value) -> CheckOutcome {
    let step = "configure-bst-tracking";
    let resp = client
        .call(Method::ConfigureBstTracking, params)
        .await
        .step(step)?;
    check_envelope(client, Method::ConfigureBstTracking, &resp)
}

pub async fn get_bst_tracking(client: &BstClient) -> CheckOutcome {
    let step = "get-bst-tracking";
    let (_, raw) = get_tracking(client).await?;
    let mut keys = vec!["track-peak-stats".to_string()];
    keys.extend(Realm::ALL.into_iter().map(tracking_key));
    for key in keys {
        let value = raw.get(&key).and_then(Value::as_u64);
        ensure(matches!(value, Some(0 | 1)), step, || {
            format!("{key} is {:?}, expected 0 or 1", raw.get(&key))
        })?;
    }
    Ok(())
}

pub async fn configure_bst_tracking(client: &BstClient) -> CheckOutcome {
    let (saved, _) = get_tracking(client).await?;
    let outcome = exercise(client, &saved).await;
    let params = serde_json::to_value(saved).step("restore tracking")?;
    configure_tracking(client, params).await?;
    outcome
}

async fn exercise(client: &BstClient, saved: &TrackingConfig) -> CheckOutcome {
    let step = "configure-bst-tracking";
    let mut expected = *saved;
    expected.track_peak_stats = !saved.track_peak_stats;
    expected.track_egress_cpu_queue = !saved.track_egress_cpu_queue;

    configure_tracking(
        client,
        serde_json::json!({
            "track-peak-stats": u8::from(expected.track_peak_stats),
            "track-egress-cpu-queue": u8::from(expected.track_egress_cpu_queue),
        }),
    )
    .await?;
    let (applied, _) = get_tracking(client).await?;
    ensure(applied == expected, step, || {
        format!("expected {expected:?} after update, got {applied:?}")
    })?;

    expect_rejected(
        client,
        Method::ConfigureBstTracking,
        serde_json::json!({ "track-device": 2 }),
        error_code::INVALID_PARAMS,
        "configure-bst-tracking (invalid flag)",
    )
    .await?;
    let (after, _) = get_tracking(client).await?;
    ensure(after == expected, step, || {
        format!("rejected update changed tracking: {after:?}")
    })
}
