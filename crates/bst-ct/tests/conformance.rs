//! End-to-end run of the conformance checks.
//!
//! Each test serves an in-process agent on a loopback port and runs the
//! suite against it over real HTTP.

use std::time::Duration;

use bst_agent::engine::{AgentInfo, BstApp};
use bst_agent::silicon::{Silicon, SimulatedAsic};
use bst_agent::state::AppState;
use bst_common::asic::AsicCapabilities;
use bst_ct::client::BstClient;
use bst_ct::suite::{CheckId, Suite};

/// Start an agent on 127.0.0.1 and return its port.
async fn spawn_agent(asic: SimulatedAsic) -> u16 {
    let silicon: Vec<Box<dyn Silicon>> = vec![Box::new(asic)];
    let info = AgentInfo {
        network_os: "test".into(),
        uid: "0000000000000001".into(),
    };
    let app = BstApp::new(silicon, info).unwrap();
    let state = AppState::new(app);
    let router = bst_agent::api::router().with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move { axum::serve(listener, router).await });
    port
}

async fn client_for(asic: SimulatedAsic) -> BstClient {
    let port = spawn_agent(asic).await;
    BstClient::new("127.0.0.1", port, Duration::from_secs(5)).unwrap()
}

fn assert_all_passed(summary: &bst_ct::suite::Summary) {
    let failures: Vec<String> = summary
        .failures()
        .map(|(id, f)| format!("{id}: {f}"))
        .collect();
    assert!(failures.is_empty(), "failed checks: {failures:#?}");
    assert_eq!(summary.results.len(), 9);
}

#[tokio::test]
async fn all_checks_pass_against_quiescent_agent() {
    let client = client_for(SimulatedAsic::quiescent(AsicCapabilities::trident2())).await;
    let summary = Suite::new(&client).run_all().await;
    assert_all_passed(&summary);
}

#[tokio::test]
async fn all_checks_pass_with_simulated_traffic() {
    let client = client_for(SimulatedAsic::new(AsicCapabilities::trident2(), 7)).await;
    let summary = Suite::new(&client).run_all().await;
    assert_all_passed(&summary);
}

#[tokio::test]
async fn checks_restore_feature_configuration() {
    let client = client_for(SimulatedAsic::quiescent(AsicCapabilities::trident2())).await;
    let before = client
        .call(bst_common::protocol::Method::GetBstFeature, serde_json::json!({}))
        .await
        .unwrap();
    Suite::new(&client).run_all().await;
    let after = client
        .call(bst_common::protocol::Method::GetBstFeature, serde_json::json!({}))
        .await
        .unwrap();
    assert_eq!(before.result, after.result);
}

#[tokio::test]
async fn subset_keeps_fixed_order() {
    let client = client_for(SimulatedAsic::quiescent(AsicCapabilities::trident2())).await;
    let summary = Suite::new(&client)
        .only(&[CheckId::ClearBstThresholds, CheckId::GetBstFeature])
        .run_all()
        .await;
    let ran: Vec<CheckId> = summary.results.iter().map(|(id, _)| *id).collect();
    assert_eq!(ran, vec![CheckId::GetBstFeature, CheckId::ClearBstThresholds]);
    assert!(summary.all_passed());
}

#[tokio::test]
async fn unreachable_agent_fails_checks() {
    // Nothing listens on port 9 of the loopback address.
    let client = BstClient::new("127.0.0.1", 9, Duration::from_secs(1)).unwrap();
    let summary = Suite::new(&client).only(&[CheckId::GetBstFeature]).run_all().await;
    assert!(!summary.all_passed());
    let (id, failure) = summary.failures().next().unwrap();
    assert_eq!(id, CheckId::GetBstFeature);
    assert_eq!(failure.step, "get-bst-feature");
}
