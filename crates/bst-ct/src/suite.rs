//! Fixed-order execution of the API checks.

use std::fmt;
use std::str::FromStr;

use crate::checks::{feature, report, thresholds, tracking, CheckOutcome};
use crate::client::BstClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckId {
    GetBstFeature,
    GetBstTracking,
    GetBstThresholds,
    GetBstReport,
    ConfigureBstFeature,
    ConfigureBstTracking,
    ConfigureBstThresholds,
    ClearBstStatistics,
    ClearBstThresholds,
}

impl CheckId {
    /// Execution order.
    pub const ALL: [CheckId; 9] = [
        CheckId::GetBstFeature,
        CheckId::GetBstTracking,
        CheckId::GetBstThresholds,
        CheckId::GetBstReport,
        CheckId::ConfigureBstFeature,
        CheckId::ConfigureBstTracking,
        CheckId::ConfigureBstThresholds,
        CheckId::ClearBstStatistics,
        CheckId::ClearBstThresholds,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckId::GetBstFeature => "get_bst_feature",
            CheckId::GetBstTracking => "get_bst_tracking",
            CheckId::GetBstThresholds => "get_bst_thresholds",
            CheckId::GetBstReport => "get_bst_report",
            CheckId::ConfigureBstFeature => "configure_bst_feature",
            CheckId::ConfigureBstTracking => "configure_bst_tracking",
            CheckId::ConfigureBstThresholds => "configure_bst_thresholds",
            CheckId::ClearBstStatistics => "clear_bst_statistics",
            CheckId::ClearBstThresholds => "clear_bst_thresholds",
        }
    }

    pub async fn run(&self, client: &BstClient) -> CheckOutcome {
        match self {
            CheckId::GetBstFeature => feature::get_bst_feature(client).await,
            CheckId::GetBstTracking => tracking::get_bst_tracking(client).await,
            CheckId::GetBstThresholds => thresholds::get_bst_thresholds(client).await,
            CheckId::GetBstReport => report::get_bst_report(client).await,
            CheckId::ConfigureBstFeature => feature::configure_bst_feature(client).await,
            CheckId::ConfigureBstTracking => tracking::configure_bst_tracking(client).await,
            CheckId::ConfigureBstThresholds => thresholds::configure_bst_thresholds(client).await,
            CheckId::ClearBstStatistics => report::clear_bst_statistics(client).await,
            CheckId::ClearBstThresholds => thresholds::clear_bst_thresholds(client).await,
        }
    }
}

impl fmt::Display for CheckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CheckId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.replace('-', "_");
        CheckId::ALL
            .into_iter()
            .find(|c| c.name() == wanted)
            .ok_or_else(|| format!("unknown check: {s}"))
    }
}

/// Result of one suite run.
#[derive(Debug, Default)]
pub struct Summary {
    pub results: Vec<(CheckId, CheckOutcome)>,
}

impl Summary {
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|(_, r)| r.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (CheckId, &crate::checks::CheckFailure)> + '_ {
        self.results
            .iter()
            .filter_map(|(id, r)| r.as_ref().err().map(|f| (*id, f)))
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }
}

pub struct Suite<'a> {
    client: &'a BstClient,
    checks: Vec<CheckId>,
}

impl<'a> Suite<'a> {
    pub fn new(client: &'a BstClient) -> Self {
        Self {
            client,
            checks: CheckId::ALL.to_vec(),
        }
    }

    /// Restrict the run to `selected`, keeping the fixed order.
    pub fn only(mut self, selected: &[CheckId]) -> Self {
        if !selected.is_empty() {
            self.checks.retain(|c| selected.contains(c));
        }
        self
    }

    /// Run every selected check in order. A failure does not stop the run.
    pub async fn run_all(&self) -> Summary {
        let mut summary = Summary::default();
        for id in &self.checks {
            let outcome = id.run(self.client).await;
            match &outcome {
                Ok(()) => tracing::info!(check = %id, "PASSED"),
                Err(failure) => tracing::error!(
                    check = %id,
                    step = %failure.step,
                    "FAILED: {}",
                    failure.message
                ),
            }
            summary.results.push((*id, outcome));
        }
        tracing::info!(
            passed = summary.passed(),
            total = summary.results.len(),
            "suite finished"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_names_parse() {
        for id in CheckId::ALL {
            assert_eq!(id.name().parse::<CheckId>().unwrap(), id);
        }
        assert_eq!(
            "clear-bst-statistics".parse::<CheckId>().unwrap(),
            CheckId::ClearBstStatistics
        );
        assert!("get_bst_colour".parse::<CheckId>().is_err());
    }

    #[test]
    fn clear_statistics_runs_before_clear_thresholds() {
        let pos = |id| CheckId::ALL.iter().position(|c| *c == id).unwrap();
        assert_eq!(pos(CheckId::GetBstFeature), 0);
        assert!(pos(CheckId::ClearBstStatistics) < pos(CheckId::ClearBstThresholds));
        assert_eq!(CheckId::ALL.len(), 9);
    }
}
