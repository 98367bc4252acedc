//! Asynchronous report delivery.
//!
//! One task per unit sleeps for the configured collection interval, asks
//! the BST application for the tick's documents (periodic report, trigger
//! reports) and POSTs each of them to the collector. A configuration change
//! restarts the wait so a new interval takes effect at once.

use std::time::Duration;

use tokio::sync::watch;

use bst_common::protocol::Response;

use crate::state::AppState;

const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the report collector.
#[derive(Clone)]
pub struct Collector {
    client: reqwest::Client,
    url: String,
}

impl Collector {
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(DELIVERY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn deliver(&self, doc: &Response) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.url)
            .json(doc)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Run the report loop for `unit` until `shutdown` flips to true.
pub async fn run(
    state: AppState,
    collector: Collector,
    unit: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut changes = state.app().subscribe();
    tracing::info!(unit, url = collector.url(), "report collector started");

    loop {
        let period = match state.app().schedule(unit) {
            Ok(period) => period,
            Err(e) => {
                tracing::error!(unit, error = %e, "cannot schedule reports, stopping");
                return;
            }
        };
        let wait = async {
            match period {
                Some(period) => tokio::time::sleep(period).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = wait => {}
            changed = changes.changed() => {
                if changed.is_err() {
                    return;
                }
                tracing::debug!(unit, "configuration changed, rescheduling");
                continue;
            }
            closed = shutdown.changed() => {
                if closed.is_err() || *shutdown.borrow() {
                    tracing::info!(unit, "report collector stopped");
                    return;
                }
                continue;
            }
        }

        let docs = match state.app().collect(unit) {
            Ok(docs) => docs,
            Err(e) => {
                tracing::warn!(unit, error = %e, "collection failed");
                continue;
            }
        };
        for doc in &docs {
            let method = doc.method.as_deref().unwrap_or("?");
            match collector.deliver(doc).await {
                Ok(()) => tracing::debug!(unit, method, "report delivered"),
                Err(e) => tracing::warn!(unit, method, error = %e, "report delivery failed"),
            }
        }
    }
}
