//! BST configuration models and request parameters.
//!
//! Boolean settings travel as `0`/`1` integers on the wire; `true`/`false`
//! are accepted on input as well. Update types carry `Option` fields so that
//! only the keys present in a request are applied.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::realm::{Counter, Realm};

// ── Parameter errors ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    #[error("{key} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        key: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

fn check_range(
    key: &'static str,
    value: u32,
    range: RangeInclusive<u32>,
) -> Result<u32, ParamError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ParamError::OutOfRange {
            key,
            value: value.into(),
            min: (*range.start()).into(),
            max: (*range.end()).into(),
        })
    }
}

/// Serde helpers for 0/1 integer flags.
pub mod flag {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(value: &bool, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        parse(Value::deserialize(d)?).map_err(D::Error::custom)
    }

    pub fn deserialize_option<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
        match Option::<Value>::deserialize(d)? {
            None | Some(Value::Null) => Ok(None),
            Some(v) => parse(v).map(Some).map_err(D::Error::custom),
        }
    }

    fn parse(value: Value) -> Result<bool, String> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Number(n) => match n.as_u64() {
                Some(0) => Ok(false),
                Some(1) => Ok(true),
                _ => Err(format!("expected 0 or 1, got {n}")),
            },
            other => Err(format!("expected 0 or 1, got {other}")),
        }
    }
}

// ── Feature ─────────────────────────────────────────────────────────

pub const COLLECTION_INTERVAL_RANGE: RangeInclusive<u32> = 0..=600;
pub const TRIGGER_RATE_LIMIT_RANGE: RangeInclusive<u32> = 1..=5;
pub const TRIGGER_RATE_LIMIT_INTERVAL_RANGE: RangeInclusive<u32> = 1..=60;

/// Global BST behaviour of one ASIC (`get-bst-feature` result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureConfig {
    #[serde(with = "flag")]
    pub bst_enable: bool,
    #[serde(with = "flag")]
    pub send_async_reports: bool,
    /// Seconds between periodic reports.
    pub collection_interval: u32,
    #[serde(with = "flag")]
    pub stat_units_in_cells: bool,
    /// Trigger reports allowed per rate-limit interval.
    pub trigger_rate_limit: u32,
    #[serde(with = "flag")]
    pub send_snapshot_on_trigger: bool,
    pub trigger_rate_limit_interval: u32,
    #[serde(with = "flag")]
    pub async_full_reports: bool,
    #[serde(with = "flag")]
    pub stats_in_percentage: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            bst_enable: false,
            send_async_reports: false,
            collection_interval: 60,
            stat_units_in_cells: false,
            trigger_rate_limit: 1,
            send_snapshot_on_trigger: true,
            trigger_rate_limit_interval: 1,
            async_full_reports: true,
            stats_in_percentage: false,
        }
    }
}

/// `configure-bst-feature` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FeatureUpdate {
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub bst_enable: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub send_async_reports: Option<bool>,
    pub collection_interval: Option<u32>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub stat_units_in_cells: Option<bool>,
    pub trigger_rate_limit: Option<u32>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub send_snapshot_on_trigger: Option<bool>,
    pub trigger_rate_limit_interval: Option<u32>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub async_full_reports: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub stats_in_percentage: Option<bool>,
}

impl FeatureConfig {
    /// Apply the keys present in `update`. Nothing is applied unless every
    /// supplied value is valid.
    pub fn apply(&self, update: &FeatureUpdate) -> Result<FeatureConfig, ParamError> {
        let mut next = *self;
        if let Some(v) = update.collection_interval {
            next.collection_interval =
                check_range("collection-interval", v, COLLECTION_INTERVAL_RANGE)?;
        }
        if let Some(v) = update.trigger_rate_limit {
            next.trigger_rate_limit =
                check_range("trigger-rate-limit", v, TRIGGER_RATE_LIMIT_RANGE)?;
        }
        if let Some(v) = update.trigger_rate_limit_interval {
            next.trigger_rate_limit_interval = check_range(
                "trigger-rate-limit-interval",
                v,
                TRIGGER_RATE_LIMIT_INTERVAL_RANGE,
            )?;
        }
        if let Some(v) = update.bst_enable {
            next.bst_enable = v;
        }
        if let Some(v) = update.send_async_reports {
            next.send_async_reports = v;
        }
        if let Some(v) = update.stat_units_in_cells {
            next.stat_units_in_cells = v;
        }
        if let Some(v) = update.send_snapshot_on_trigger {
            next.send_snapshot_on_trigger = v;
        }
        if let Some(v) = update.async_full_reports {
            next.async_full_reports = v;
        }
        if let Some(v) = update.stats_in_percentage {
            next.stats_in_percentage = v;
        }
        Ok(next)
    }
}

// ── Tracking ────────────────────────────────────────────────────────

/// Which realms are tracked (`get-bst-tracking` result).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackingConfig {
    #[serde(with = "flag")]
    pub track_peak_stats: bool,
    #[serde(with = "flag")]
    pub track_ingress_port_priority_group: bool,
    #[serde(with = "flag")]
    pub track_ingress_port_service_pool: bool,
    #[serde(with = "flag")]
    pub track_ingress_service_pool: bool,
    #[serde(with = "flag")]
    pub track_egress_port_service_pool: bool,
    #[serde(with = "flag")]
    pub track_egress_service_pool: bool,
    #[serde(with = "flag")]
    pub track_egress_uc_queue: bool,
    #[serde(with = "flag")]
    pub track_egress_uc_queue_group: bool,
    #[serde(with = "flag")]
    pub track_egress_mc_queue: bool,
    #[serde(with = "flag")]
    pub track_egress_cpu_queue: bool,
    #[serde(with = "flag")]
    pub track_egress_rqe_queue: bool,
    #[serde(with = "flag")]
    pub track_device: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            track_peak_stats: false,
            track_ingress_port_priority_group: true,
            track_ingress_port_service_pool: true,
            track_ingress_service_pool: true,
            track_egress_port_service_pool: true,
            track_egress_service_pool: true,
            track_egress_uc_queue: true,
            track_egress_uc_queue_group: true,
            track_egress_mc_queue: true,
            track_egress_cpu_queue: true,
            track_egress_rqe_queue: true,
            track_device: true,
        }
    }
}

/// `configure-bst-tracking` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TrackingUpdate {
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_peak_stats: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_ingress_port_priority_group: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_ingress_port_service_pool: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_ingress_service_pool: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_port_service_pool: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_service_pool: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_uc_queue: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_uc_queue_group: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_mc_queue: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_cpu_queue: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_egress_rqe_queue: Option<bool>,
    #[serde(default, deserialize_with = "flag::deserialize_option")]
    pub track_device: Option<bool>,
}

impl TrackingConfig {
    pub fn tracks(&self, realm: Realm) -> bool {
        *self.realm_flag(realm)
    }

    fn realm_flag(&self, realm: Realm) -> &bool {
        match realm {
            Realm::Device => &self.track_device,
            Realm::IngressPortPriorityGroup => &self.track_ingress_port_priority_group,
            Realm::IngressPortServicePool => &self.track_ingress_port_service_pool,
            Realm::IngressServicePool => &self.track_ingress_service_pool,
            Realm::EgressPortServicePool => &self.track_egress_port_service_pool,
            Realm::EgressServicePool => &self.track_egress_service_pool,
            Realm::EgressUcQueue => &self.track_egress_uc_queue,
            Realm::EgressUcQueueGroup => &self.track_egress_uc_queue_group,
            Realm::EgressMcQueue => &self.track_egress_mc_queue,
            Realm::EgressCpuQueue => &self.track_egress_cpu_queue,
            Realm::EgressRqeQueue => &self.track_egress_rqe_queue,
        }
    }

    pub fn apply(&self, update: &TrackingUpdate) -> TrackingConfig {
        let mut next = *self;
        let pairs = [
            (&mut next.track_peak_stats, update.track_peak_stats),
            (
                &mut next.track_ingress_port_priority_group,
                update.track_ingress_port_priority_group,
            ),
            (
                &mut next.track_ingress_port_service_pool,
                update.track_ingress_port_service_pool,
            ),
            (&mut next.track_ingress_service_pool, update.track_ingress_service_pool),
            (
                &mut next.track_egress_port_service_pool,
                update.track_egress_port_service_pool,
            ),
            (&mut next.track_egress_service_pool, update.track_egress_service_pool),
            (&mut next.track_egress_uc_queue, update.track_egress_uc_queue),
            (&mut next.track_egress_uc_queue_group, update.track_egress_uc_queue_group),
            (&mut next.track_egress_mc_queue, update.track_egress_mc_queue),
            (&mut next.track_egress_cpu_queue, update.track_egress_cpu_queue),
            (&mut next.track_egress_rqe_queue, update.track_egress_rqe_queue),
            (&mut next.track_device, update.track_device),
        ];
        for (slot, value) in pairs {
            if let Some(v) = value {
                *slot = v;
            }
        }
        next
    }
}

// ── Report options ──────────────────────────────────────────────────

/// Realms requested by `get-bst-report` / `get-bst-thresholds`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReportOptions {
    #[serde(with = "flag")]
    pub include_ingress_port_priority_group: bool,
    #[serde(with = "flag")]
    pub include_ingress_port_service_pool: bool,
    #[serde(with = "flag")]
    pub include_ingress_service_pool: bool,
    #[serde(with = "flag")]
    pub include_egress_port_service_pool: bool,
    #[serde(with = "flag")]
    pub include_egress_service_pool: bool,
    #[serde(with = "flag")]
    pub include_egress_uc_queue: bool,
    #[serde(with = "flag")]
    pub include_egress_uc_queue_group: bool,
    #[serde(with = "flag")]
    pub include_egress_mc_queue: bool,
    #[serde(with = "flag")]
    pub include_egress_cpu_queue: bool,
    #[serde(with = "flag")]
    pub include_egress_rqe_queue: bool,
    #[serde(with = "flag")]
    pub include_device: bool,
}

impl ReportOptions {
    pub fn all() -> Self {
        Self::only(&Realm::ALL)
    }

    pub fn only(realms: &[Realm]) -> Self {
        let mut opts = Self::default();
        for realm in realms {
            *opts.realm_flag_mut(*realm) = true;
        }
        opts
    }

    /// Periodic reports cover exactly the tracked realms.
    pub fn from_tracking(tracking: &TrackingConfig) -> Self {
        let mut opts = Self::default();
        for realm in Realm::ALL {
            *opts.realm_flag_mut(realm) = tracking.tracks(realm);
        }
        opts
    }

    pub fn includes(&self, realm: Realm) -> bool {
        match realm {
            Realm::Device => self.include_device,
            Realm::IngressPortPriorityGroup => self.include_ingress_port_priority_group,
            Realm::IngressPortServicePool => self.include_ingress_port_service_pool,
            Realm::IngressServicePool => self.include_ingress_service_pool,
            Realm::EgressPortServicePool => self.include_egress_port_service_pool,
            Realm::EgressServicePool => self.include_egress_service_pool,
            Realm::EgressUcQueue => self.include_egress_uc_queue,
            Realm::EgressUcQueueGroup => self.include_egress_uc_queue_group,
            Realm::EgressMcQueue => self.include_egress_mc_queue,
            Realm::EgressCpuQueue => self.include_egress_cpu_queue,
            Realm::EgressRqeQueue => self.include_egress_rqe_queue,
        }
    }

    fn realm_flag_mut(&mut self, realm: Realm) -> &mut bool {
        match realm {
            Realm::Device => &mut self.include_device,
            Realm::IngressPortPriorityGroup => &mut self.include_ingress_port_priority_group,
            Realm::IngressPortServicePool => &mut self.include_ingress_port_service_pool,
            Realm::IngressServicePool => &mut self.include_ingress_service_pool,
            Realm::EgressPortServicePool => &mut self.include_egress_port_service_pool,
            Realm::EgressServicePool => &mut self.include_egress_service_pool,
            Realm::EgressUcQueue => &mut self.include_egress_uc_queue,
            Realm::EgressUcQueueGroup => &mut self.include_egress_uc_queue_group,
            Realm::EgressMcQueue => &mut self.include_egress_mc_queue,
            Realm::EgressCpuQueue => &mut self.include_egress_cpu_queue,
            Realm::EgressRqeQueue => &mut self.include_egress_rqe_queue,
        }
    }

    pub fn realms(&self) -> impl Iterator<Item = Realm> + '_ {
        Realm::ALL.into_iter().filter(|r| self.includes(*r))
    }
}

// ── Thresholds ──────────────────────────────────────────────────────

/// `configure-bst-thresholds` parameters.
///
/// Which index and threshold keys are required depends on the realm.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ThresholdParams {
    pub realm: Option<String>,
    pub port: Option<String>,
    pub priority_group: Option<u32>,
    pub service_pool: Option<u32>,
    pub queue: Option<u32>,
    pub queue_group: Option<u32>,
    pub threshold: Option<u64>,
    pub um_share_threshold: Option<u64>,
    pub um_headroom_threshold: Option<u64>,
    pub uc_share_threshold: Option<u64>,
    pub mc_share_threshold: Option<u64>,
    pub mc_share_queue_entries_threshold: Option<u64>,
    pub uc_threshold: Option<u64>,
    pub mc_threshold: Option<u64>,
    pub mc_queue_entries_threshold: Option<u64>,
    pub cpu_threshold: Option<u64>,
    pub rqe_threshold: Option<u64>,
}

impl ThresholdParams {
    /// The supplied threshold for `counter`, if any.
    pub fn counter_threshold(&self, counter: Counter) -> Option<u64> {
        match counter {
            Counter::Data => self.threshold,
            Counter::UmShare => self.um_share_threshold,
            Counter::UmHeadroom => self.um_headroom_threshold,
            Counter::UcShare => self.uc_share_threshold,
            Counter::McShare => self.mc_share_threshold,
            Counter::McShareQueueEntries => self.mc_share_queue_entries_threshold,
            Counter::Uc => self.uc_threshold,
            Counter::Mc => self.mc_threshold,
            Counter::McQueueEntries => self.mc_queue_entries_threshold,
            Counter::Cpu => self.cpu_threshold,
            Counter::Rqe => self.rqe_threshold,
        }
    }
}

// ── Congestion drop counters ────────────────────────────────────────

pub const DROP_COUNT_RANGE: RangeInclusive<u32> = 1..=64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DropRequestType {
    TopDrops,
    TopPortQueueDrops,
    PortDrops,
    PortQueueDrops,
}

impl DropRequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropRequestType::TopDrops => "top-drops",
            DropRequestType::TopPortQueueDrops => "top-port-queue-drops",
            DropRequestType::PortDrops => "port-drops",
            DropRequestType::PortQueueDrops => "port-queue-drops",
        }
    }
}

impl std::str::FromStr for DropRequestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "top-drops" => Ok(DropRequestType::TopDrops),
            "top-port-queue-drops" => Ok(DropRequestType::TopPortQueueDrops),
            "port-drops" => Ok(DropRequestType::PortDrops),
            "port-queue-drops" => Ok(DropRequestType::PortQueueDrops),
            other => Err(format!("unknown request-type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType {
    Ucast,
    Mcast,
    All,
}

impl QueueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType::Ucast => "ucast",
            QueueType::Mcast => "mcast",
            QueueType::All => "all",
        }
    }
}

impl std::str::FromStr for QueueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ucast" => Ok(QueueType::Ucast),
            "mcast" => Ok(QueueType::Mcast),
            "all" => Ok(QueueType::All),
            other => Err(format!("unknown queue-type: {other}")),
        }
    }
}

/// `get-bst-congestion-drop-counters` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DropCounterParams {
    pub request_type: Option<String>,
    #[serde(default)]
    pub request_params: DropRequestParams,
    #[serde(default)]
    pub collection_interval: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DropRequestParams {
    pub count: Option<u32>,
    pub port_list: Option<Vec<String>>,
    pub queue_type: Option<String>,
    pub queue_list: Option<Vec<u32>>,
}

// ── Switch properties ───────────────────────────────────────────────

/// `get-switch-properties` result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SwitchProperties {
    pub number_of_asics: u32,
    /// `(asic-id, chip type, port count)` per ASIC.
    pub asic_info: Vec<(String, String, u32)>,
    pub supported_features: Vec<String>,
    pub network_os: String,
    pub uid: String,
    pub agent_sw_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_serializes_flags_as_integers() {
        let json = serde_json::to_value(FeatureConfig::default()).unwrap();
        assert_eq!(json["bst-enable"], 0);
        assert_eq!(json["send-snapshot-on-trigger"], 1);
        assert_eq!(json["collection-interval"], 60);
        assert_eq!(json["stats-in-percentage"], 0);
    }

    #[test]
    fn feature_update_touches_only_supplied_keys() {
        let update: FeatureUpdate = serde_json::from_value(serde_json::json!({
            "bst-enable": 1,
            "collection-interval": 120
        }))
        .unwrap();
        let next = FeatureConfig::default().apply(&update).unwrap();
        assert!(next.bst_enable);
        assert_eq!(next.collection_interval, 120);
        assert_eq!(next.trigger_rate_limit, 1);
        assert!(next.async_full_reports);
    }

    #[test]
    fn feature_update_rejects_out_of_range() {
        let update: FeatureUpdate = serde_json::from_value(serde_json::json!({
            "bst-enable": 1,
            "trigger-rate-limit": 9
        }))
        .unwrap();
        let err = FeatureConfig::default().apply(&update).unwrap_err();
        assert!(matches!(
            err,
            ParamError::OutOfRange {
                key: "trigger-rate-limit",
                ..
            }
        ));
    }

    #[test]
    fn flag_rejects_values_other_than_zero_and_one() {
        let bad = serde_json::from_value::<FeatureUpdate>(serde_json::json!({ "bst-enable": 2 }));
        assert!(bad.is_err());
        let ok: FeatureUpdate =
            serde_json::from_value(serde_json::json!({ "bst-enable": true })).unwrap();
        assert_eq!(ok.bst_enable, Some(true));
    }

    #[test]
    fn tracking_update_is_masked() {
        let update: TrackingUpdate = serde_json::from_value(serde_json::json!({
            "track-peak-stats": 1,
            "track-egress-uc-queue": 0
        }))
        .unwrap();
        let next = TrackingConfig::default().apply(&update);
        assert!(next.track_peak_stats);
        assert!(!next.tracks(Realm::EgressUcQueue));
        assert!(next.tracks(Realm::EgressMcQueue));
        assert!(next.tracks(Realm::Device));
    }

    #[test]
    fn report_options_missing_keys_default_off() {
        let opts: ReportOptions = serde_json::from_value(serde_json::json!({
            "include-device": 1,
            "include-egress-cpu-queue": 1
        }))
        .unwrap();
        assert_eq!(
            opts.realms().collect::<Vec<_>>(),
            vec![Realm::EgressCpuQueue, Realm::Device]
        );
    }

    #[test]
    fn report_options_follow_tracking() {
        let mut tracking = TrackingConfig::default();
        tracking.track_device = false;
        let opts = ReportOptions::from_tracking(&tracking);
        assert!(!opts.includes(Realm::Device));
        assert!(opts.includes(Realm::EgressRqeQueue));
    }

    #[test]
    fn threshold_params_map_counters() {
        let params: ThresholdParams = serde_json::from_value(serde_json::json!({
            "realm": "egress-port-service-pool",
            "port": "3",
            "service-pool": 1,
            "uc-share-threshold": 512,
            "mc-share-queue-entries-threshold": 12
        }))
        .unwrap();
        assert_eq!(params.counter_threshold(Counter::UcShare), Some(512));
        assert_eq!(params.counter_threshold(Counter::McShareQueueEntries), Some(12));
        assert_eq!(params.counter_threshold(Counter::UmShare), None);
    }

    #[test]
    fn drop_request_names() {
        assert_eq!(
            "top-port-queue-drops".parse::<DropRequestType>().unwrap(),
            DropRequestType::TopPortQueueDrops
        );
        assert!("bottom-drops".parse::<DropRequestType>().is_err());
        assert_eq!("mcast".parse::<QueueType>().unwrap(), QueueType::Mcast);
    }
}
