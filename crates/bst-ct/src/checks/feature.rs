//! `get-bst-feature` and `configure-bst-feature`.

use bst_common::models::{
    FeatureConfig, COLLECTION_INTERVAL_RANGE, TRIGGER_RATE_LIMIT_INTERVAL_RANGE,
    TRIGGER_RATE_LIMIT_RANGE,
};
use bst_common::protocol::{error_code, Method};

use super::{
    check_envelope, configure_feature, ensure, expect_rejected, get_feature, restore_feature,
    CheckOutcome, Step,
};
use crate::client::BstClient;

const FEATURE_KEYS: [&str; 9] = [
    "bst-enable",
    "send-async-reports",
    "collection-interval",
    "stat-units-in-cells",
    "trigger-rate-limit",
    "send-snapshot-on-trigger",
    "trigger-rate-limit-interval",
    "async-full-reports",
    "stats-in-percentage",
];

pub async fn get_bst_feature(client: &BstClient) -> CheckOutcome {
    let step = "get-bst-feature";
    let resp = client
        .call(Method::GetBstFeature, serde_json::json!({}))
        .await
        .step(step)?;
    check_envelope(client, Method::GetBstFeature, &resp)?;

    let result = resp.result.clone().unwrap_or_default();
    for key in FEATURE_KEYS {
        ensure(result.get(key).is_some(), step, || format!("result lacks {key}"))?;
    }
    let feature: FeatureConfig = resp.parse_result().step(step)?;
    ensure(
        COLLECTION_INTERVAL_RANGE.contains(&feature.collection_interval),
        step,
        || format!("collection-interval {} out of range", feature.collection_interval),
    )?;
    ensure(
        TRIGGER_RATE_LIMIT_RANGE.contains(&feature.trigger_rate_limit),
        step,
        || format!("trigger-rate-limit {} out of range", feature.trigger_rate_limit),
    )?;
    ensure(
        TRIGGER_RATE_LIMIT_INTERVAL_RANGE.contains(&feature.trigger_rate_limit_interval),
        step,
        || {
            format!(
                "trigger-rate-limit-interval {} out of range",
                feature.trigger_rate_limit_interval
            )
        },
    )
}

pub async fn configure_bst_feature(client: &BstClient) -> CheckOutcome {
    let saved = get_feature(client).await?;
    let outcome = exercise(client, &saved).await;
    restore_feature(client, &saved).await?;
    outcome
}

async fn exercise(client: &BstClient, saved: &FeatureConfig) -> CheckOutcome {
    let step = "configure-bst-feature";
    let mut expected = *saved;
    expected.collection_interval = if saved.collection_interval == 120 { 90 } else { 120 };
    expected.trigger_rate_limit = if saved.trigger_rate_limit == 3 { 4 } else { 3 };
    expected.stat_units_in_cells = !saved.stat_units_in_cells;

    configure_feature(
        client,
        serde_json::json!({
            "collection-interval": expected.collection_interval,
            "trigger-rate-limit": expected.trigger_rate_limit,
            "stat-units-in-cells": u8::from(expected.stat_units_in_cells),
        }),
    )
    .await?;
    let applied = get_feature(client).await?;
    ensure(applied == expected, step, || {
        format!("expected {expected:?} after update, got {applied:?}")
    })?;

    // An out-of-range value rejects the whole request.
    expect_rejected(
        client,
        Method::ConfigureBstFeature,
        serde_json::json!({
            "bst-enable": u8::from(!expected.bst_enable),
            "collection-interval": COLLECTION_INTERVAL_RANGE.end() + 1,
        }),
        error_code::INVALID_PARAMS,
        "configure-bst-feature (out of range)",
    )
    .await?;
    expect_rejected(
        client,
        Method::ConfigureBstFeature,
        serde_json::json!({ "trigger-rate-limit": 0 }),
        error_code::INVALID_PARAMS,
        "configure-bst-feature (rate limit 0)",
    )
    .await?;
    let after = get_feature(client).await?;
    ensure(after == expected, step, || {
        format!("rejected update changed the feature: {after:?}")
    })
}
