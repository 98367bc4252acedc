//! `get-bst-thresholds`, `configure-bst-thresholds` and `clear-bst-thresholds`.

use serde_json::Value;

use bst_common::protocol::{error_code, Method};
use bst_common::realm::Realm;
use bst_common::snapshot::{Index, Snapshot};

use super::{
    all_realms, cells_params, check_envelope, check_report, configure_feature, ensure,
    expect_rejected, get_feature, restore_feature, CheckFailure, CheckOutcome, Step,
};
use crate::client::BstClient;

async fn get_thresholds(client: &BstClient) -> Result<Snapshot, CheckFailure> {
    let step = "get-bst-thresholds";
    let resp = client
        .call(Method::GetBstThresholds, all_realms()?)
        .await
        .step(step)?;
    check_report(client, Method::GetBstThresholds, &resp)
}

async fn configure(client: &BstClient, params: Value) -> CheckOutcome {
    let step = "configure-bst-thresholds";
    let resp = client
        .call(Method::ConfigureBstThresholds, params)
        .await
        .step(step)?;
    check_envelope(client, Method::ConfigureBstThresholds, &resp)
}

async fn clear(client: &BstClient) -> CheckOutcome {
    let step = "clear-bst-thresholds";
    let resp = client
        .call(Method::ClearBstThresholds, serde_json::json!({}))
        .await
        .step(step)?;
    check_envelope(client, Method::ClearBstThresholds, &resp)
}

fn expect_value(
    thresholds: &Snapshot,
    realm: Realm,
    index: Index,
    position: usize,
    want: u64,
    step: &str,
) -> CheckOutcome {
    let got = thresholds.get(realm, index).map(|c| c[position]);
    ensure(got == Some(want), step, || {
        format!("{realm} {index:?} counter {position}: expected {want}, got {got:?}")
    })
}

pub async fn get_bst_thresholds(client: &BstClient) -> CheckOutcome {
    let step = "get-bst-thresholds";
    let thresholds = get_thresholds(client).await?;
    ensure(thresholds.get(Realm::Device, Index::DEVICE).is_some(), step, || {
        "no device threshold reported".into()
    })
}

pub async fn configure_bst_thresholds(client: &BstClient) -> CheckOutcome {
    let saved = get_feature(client).await?;
    let outcome = async {
        configure_feature(client, cells_params()).await?;
        exercise_configure(client).await
    }
    .await;
    let cleared = clear(client).await;
    restore_feature(client, &saved).await?;
    outcome.and(cleared)
}

async fn exercise_configure(client: &BstClient) -> CheckOutcome {
    let step = "configure-bst-thresholds";
    configure(client, serde_json::json!({ "realm": "device", "threshold": 1000 })).await?;
    configure(
        client,
        serde_json::json!({ "realm": "egress-uc-queue", "queue": 5, "uc-threshold": 400 }),
    )
    .await?;
    configure(
        client,
        serde_json::json!({
            "realm": "ingress-port-priority-group",
            "port": "2",
            "priority-group": 3,
            "um-share-threshold": 300,
            "um-headroom-threshold": 200
        }),
    )
    .await?;
    configure(
        client,
        serde_json::json!({
            "realm": "egress-service-pool",
            "service-pool": 1,
            "mc-share-threshold": 150
        }),
    )
    .await?;

    let thresholds = get_thresholds(client).await?;
    expect_value(&thresholds, Realm::Device, Index::DEVICE, 0, 1000, step)?;
    expect_value(&thresholds, Realm::EgressUcQueue, Index::single(5), 0, 400, step)?;
    let pg = Index::new(2, 3);
    expect_value(&thresholds, Realm::IngressPortPriorityGroup, pg, 0, 300, step)?;
    expect_value(&thresholds, Realm::IngressPortPriorityGroup, pg, 1, 200, step)?;
    expect_value(&thresholds, Realm::EgressServicePool, Index::single(1), 1, 150, step)?;

    expect_rejected(
        client,
        Method::ConfigureBstThresholds,
        serde_json::json!({ "realm": "egress-uc-queue", "uc-threshold": 10 }),
        error_code::INVALID_PARAMS,
        "configure-bst-thresholds (missing queue)",
    )
    .await?;
    expect_rejected(
        client,
        Method::ConfigureBstThresholds,
        serde_json::json!({ "realm": "buffer-of-holding", "threshold": 10 }),
        error_code::INVALID_PARAMS,
        "configure-bst-thresholds (unknown realm)",
    )
    .await?;
    expect_rejected(
        client,
        Method::ConfigureBstThresholds,
        serde_json::json!({ "realm": "egress-cpu-queue", "queue": 4096, "cpu-threshold": 10 }),
        error_code::INVALID_PARAMS,
        "configure-bst-thresholds (queue out of range)",
    )
    .await
}

pub async fn clear_bst_thresholds(client: &BstClient) -> CheckOutcome {
    let saved = get_feature(client).await?;
    let outcome = async {
        configure_feature(client, cells_params()).await?;
        exercise_clear(client).await
    }
    .await;
    restore_feature(client, &saved).await?;
    outcome
}

async fn exercise_clear(client: &BstClient) -> CheckOutcome {
    let step = "clear-bst-thresholds";
    configure(client, serde_json::json!({ "realm": "device", "threshold": 1234 })).await?;
    configure(
        client,
        serde_json::json!({ "realm": "egress-cpu-queue", "queue": 3, "cpu-threshold": 7 }),
    )
    .await?;
    let before = get_thresholds(client).await?;
    expect_value(&before, Realm::EgressCpuQueue, Index::single(3), 0, 7, step)?;

    clear(client).await?;
    let after = get_thresholds(client).await?;
    ensure(after.get(Realm::EgressCpuQueue, Index::single(3)).is_none(), step, || {
        "egress-cpu-queue 3 threshold survived clear".into()
    })?;
    let device = after.get(Realm::Device, Index::DEVICE).map(|c| c[0]);
    ensure(matches!(device, Some(v) if v != 1234), step, || {
        format!("device threshold after clear is {device:?}")
    })
}
