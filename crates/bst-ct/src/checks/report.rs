//! `get-bst-report` and `clear-bst-statistics`.

use bst_common::protocol::Method;
use bst_common::realm::Realm;
use bst_common::snapshot::{Index, Snapshot};

use super::{
    all_realms, cells_params, check_envelope, check_report, configure_feature, ensure,
    get_feature, restore_feature, CheckFailure, CheckOutcome, Step,
};
use crate::client::BstClient;

async fn get_report(client: &BstClient) -> Result<Snapshot, CheckFailure> {
    let resp = client
        .call(Method::GetBstReport, all_realms()?)
        .await
        .step("get-bst-report")?;
    check_report(client, Method::GetBstReport, &resp)
}

pub async fn get_bst_report(client: &BstClient) -> CheckOutcome {
    let saved = get_feature(client).await?;
    let outcome = async {
        let mut params = cells_params();
        params["bst-enable"] = 1.into();
        configure_feature(client, params).await?;
        let report = get_report(client).await?;
        ensure(
            report.get(Realm::Device, Index::DEVICE).is_some(),
            "get-bst-report",
            || "no device entry in report".into(),
        )
    }
    .await;
    restore_feature(client, &saved).await?;
    outcome
}

pub async fn clear_bst_statistics(client: &BstClient) -> CheckOutcome {
    let saved = get_feature(client).await?;
    let outcome = async {
        // Stop collection so nothing refills the counters after the clear.
        let mut params = cells_params();
        params["bst-enable"] = 0.into();
        configure_feature(client, params).await?;

        let step = "clear-bst-statistics";
        let resp = client
            .call(Method::ClearBstStatistics, serde_json::json!({}))
            .await
            .step(step)?;
        check_envelope(client, Method::ClearBstStatistics, &resp)?;

        let report = get_report(client).await?;
        for realm in Realm::ALL {
            for (index, counters) in report.entries(realm) {
                ensure(counters.iter().all(|c| *c == 0), step, || {
                    format!("{realm} {index:?} still reports {counters:?}")
                })?;
            }
        }
        Ok::<(), CheckFailure>(())
    }
    .await;
    restore_feature(client, &saved).await?;
    outcome
}
