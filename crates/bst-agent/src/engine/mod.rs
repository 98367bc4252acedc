//! The BST application.
//!
//! Owns one [`UnitContext`] per ASIC, validates and applies configuration,
//! builds reports from silicon snapshots, and produces the asynchronous
//! documents the collector task delivers.
//!
//! Each unit context sits behind a `std::sync::Mutex`. Locks are held only
//! for synchronous work; nothing awaits while holding one.

pub mod drops;
pub mod report;
pub mod thresholds;
pub mod trigger;

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::watch;

use bst_common::asic::{asic_id_from_notation, asic_id_to_notation};
use bst_common::models::{
    DropCounterParams, FeatureConfig, FeatureUpdate, ParamError, ReportOptions, SwitchProperties,
    ThresholdParams, TrackingConfig, TrackingUpdate,
};
use bst_common::protocol::{Method, Request, Response, error_code};
use bst_common::report::{DropReport, time_stamp};
use bst_common::snapshot::Snapshot;

use crate::silicon::{Silicon, SiliconError};

use self::report::{Scale, mask_untracked, stats_body, thresholds_body};
use self::trigger::{TriggerWindow, find_triggers};

#[derive(Debug, Error)]
pub enum BstError {
    #[error("invalid asic-id: {0}")]
    UnknownAsic(String),
    #[error(transparent)]
    InvalidParam(#[from] ParamError),
    #[error("malformed params: {0}")]
    MalformedParams(String),
    #[error("method {0} is not served by the BST application")]
    UnsupportedMethod(Method),
    #[error(transparent)]
    Silicon(#[from] SiliconError),
    #[error("state of unit {0} is poisoned")]
    Poisoned(u32),
    #[error("response encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
}

impl BstError {
    /// JSON-RPC error code reported to the client.
    pub fn code(&self) -> i64 {
        match self {
            BstError::UnknownAsic(_) | BstError::InvalidParam(_) | BstError::MalformedParams(_) => {
                error_code::INVALID_PARAMS
            }
            BstError::UnsupportedMethod(_) => error_code::METHOD_NOT_FOUND,
            BstError::Silicon(_) | BstError::Poisoned(_) | BstError::Encode(_) => {
                error_code::INTERNAL_ERROR
            }
        }
    }
}

/// Identity reported by `get-switch-properties`.
#[derive(Debug, Clone)]
pub struct AgentInfo {
    pub network_os: String,
    pub uid: String,
}

/// Per-ASIC BST state.
pub struct UnitContext {
    silicon: Box<dyn Silicon>,
    feature: FeatureConfig,
    tracking: TrackingConfig,
    /// Latest snapshot read from silicon.
    current: Snapshot,
    /// Values reported: peaks since last clear, or the latest snapshot.
    active: Snapshot,
    /// What the last periodic report carried; baseline for incremental reports.
    backup: Snapshot,
    /// Threshold cache in bytes, configured entries only.
    thresholds: Snapshot,
    triggers: TriggerWindow,
}

impl UnitContext {
    fn new(mut silicon: Box<dyn Silicon>) -> Result<Self, SiliconError> {
        let feature = FeatureConfig::default();
        let tracking = TrackingConfig::default();
        silicon.apply_config(&feature, &tracking)?;
        let thresholds = silicon.thresholds()?;
        Ok(Self {
            silicon,
            feature,
            tracking,
            current: Snapshot::new(),
            active: Snapshot::new(),
            backup: Snapshot::new(),
            thresholds,
            triggers: TriggerWindow::default(),
        })
    }

    /// Read silicon and fold the result into the active record.
    fn refresh(&mut self) -> Result<(), SiliconError> {
        let snapshot = self.silicon.snapshot()?;
        if self.tracking.track_peak_stats {
            self.active.merge_peak(&snapshot);
        } else {
            self.active = snapshot.clone();
        }
        self.current = snapshot;
        Ok(())
    }
}

pub struct BstApp {
    units: Vec<Mutex<UnitContext>>,
    info: AgentInfo,
    changes: watch::Sender<u64>,
}

impl BstApp {
    pub fn new(silicon: Vec<Box<dyn Silicon>>, info: AgentInfo) -> Result<Self, BstError> {
        let units = silicon
            .into_iter()
            .map(|s| UnitContext::new(s).map(Mutex::new))
            .collect::<Result<Vec<_>, _>>()?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            units,
            info,
            changes,
        })
    }

    pub fn unit_count(&self) -> u32 {
        self.units.len() as u32
    }

    /// Receiver bumped whenever a unit's feature or tracking configuration
    /// changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    fn notify(&self) {
        self.changes.send_modify(|generation| *generation += 1);
    }

    fn lock(&self, unit: u32) -> Result<MutexGuard<'_, UnitContext>, BstError> {
        let slot = self
            .units
            .get(unit as usize)
            .ok_or_else(|| BstError::UnknownAsic(asic_id_to_notation(unit)))?;
        slot.lock().map_err(|_| BstError::Poisoned(unit))
    }

    fn unit(&self, asic_id: &str) -> Result<(u32, MutexGuard<'_, UnitContext>), BstError> {
        let unit = asic_id_from_notation(asic_id)
            .filter(|u| (*u as usize) < self.units.len())
            .ok_or_else(|| BstError::UnknownAsic(asic_id.to_string()))?;
        Ok((unit, self.lock(unit)?))
    }

    // ── Feature & tracking ──────────────────────────────────────

    pub fn feature(&self, asic_id: &str) -> Result<FeatureConfig, BstError> {
        Ok(self.unit(asic_id)?.1.feature)
    }

    pub fn configure_feature(&self, asic_id: &str, update: &FeatureUpdate) -> Result<(), BstError> {
        let (unit, mut ctx) = self.unit(asic_id)?;
        let next = ctx.feature.apply(update)?;
        let tracking = ctx.tracking;
        ctx.silicon.apply_config(&next, &tracking)?;
        if next.bst_enable != ctx.feature.bst_enable {
            ctx.triggers.reset();
        }
        ctx.feature = next;
        drop(ctx);

        tracing::info!(
            unit,
            bst_enable = next.bst_enable,
            send_async_reports = next.send_async_reports,
            collection_interval = next.collection_interval,
            "bst feature configured"
        );
        self.notify();
        Ok(())
    }

    pub fn tracking(&self, asic_id: &str) -> Result<TrackingConfig, BstError> {
        Ok(self.unit(asic_id)?.1.tracking)
    }

    pub fn configure_tracking(
        &self,
        asic_id: &str,
        update: &TrackingUpdate,
    ) -> Result<(), BstError> {
        let (unit, mut ctx) = self.unit(asic_id)?;
        let next = ctx.tracking.apply(update);
        let feature = ctx.feature;
        ctx.silicon.apply_config(&feature, &next)?;
        if next != ctx.tracking {
            ctx.active.clear();
            ctx.backup.clear();
        }
        ctx.tracking = next;
        drop(ctx);

        tracing::info!(unit, track_peak_stats = next.track_peak_stats, "bst tracking configured");
        self.notify();
        Ok(())
    }

    // ── Thresholds ──────────────────────────────────────────────

    pub fn configure_thresholds(
        &self,
        asic_id: &str,
        params: &ThresholdParams,
    ) -> Result<(), BstError> {
        let (unit, mut ctx) = self.unit(asic_id)?;
        let caps = ctx.silicon.capabilities().clone();
        let scale = Scale::new(&ctx.feature, &caps);
        let update = thresholds::validate(params, &scale)?;
        let entry = update.merge_into(ctx.thresholds.get(update.realm, update.index), &scale);
        ctx.silicon.set_threshold(update.realm, update.index, entry)?;
        ctx.thresholds = ctx.silicon.thresholds()?;

        tracing::debug!(unit, realm = %update.realm, index = ?update.index, "threshold programmed");
        Ok(())
    }

    /// `report` array of `get-bst-thresholds`.
    pub fn thresholds_report(
        &self,
        asic_id: &str,
        options: &ReportOptions,
    ) -> Result<serde_json::Value, BstError> {
        let (_, ctx) = self.unit(asic_id)?;
        let scale = Scale::new(&ctx.feature, ctx.silicon.capabilities());
        Ok(thresholds_body(&ctx.thresholds, options, &scale))
    }

    pub fn clear_thresholds(&self, asic_id: &str) -> Result<(), BstError> {
        let (unit, mut ctx) = self.unit(asic_id)?;
        ctx.silicon.clear_thresholds()?;
        ctx.thresholds = ctx.silicon.thresholds()?;
        tracing::info!(unit, "bst thresholds cleared");
        Ok(())
    }

    // ── Statistics ──────────────────────────────────────────────

    /// `report` array of `get-bst-report`, restricted to tracked realms.
    pub fn report(
        &self,
        asic_id: &str,
        options: &ReportOptions,
    ) -> Result<serde_json::Value, BstError> {
        let (_, mut ctx) = self.unit(asic_id)?;
        ctx.refresh()?;
        let options = mask_untracked(options, &ctx.tracking);
        let scale = Scale::new(&ctx.feature, ctx.silicon.capabilities());
        Ok(stats_body(&ctx.active, &options, &scale))
    }

    pub fn clear_statistics(&self, asic_id: &str) -> Result<(), BstError> {
        let (unit, mut ctx) = self.unit(asic_id)?;
        ctx.current.clear();
        ctx.active.clear();
        ctx.backup.clear();
        ctx.silicon.clear_stats()?;
        tracing::info!(unit, "bst statistics cleared");
        Ok(())
    }

    pub fn drop_counters(
        &self,
        asic_id: &str,
        params: &DropCounterParams,
    ) -> Result<DropReport, BstError> {
        let (_, mut ctx) = self.unit(asic_id)?;
        let request = drops::validate(params, ctx.silicon.capabilities())?;
        Ok(drops::collect(&request, ctx.silicon.as_mut())?)
    }

    pub fn switch_properties(&self) -> Result<SwitchProperties, BstError> {
        let mut asic_info = Vec::with_capacity(self.units.len());
        for unit in 0..self.unit_count() {
            let ctx = self.lock(unit)?;
            let caps = ctx.silicon.capabilities();
            asic_info.push((asic_id_to_notation(unit), caps.asic_type.clone(), caps.num_ports));
        }
        Ok(SwitchProperties {
            number_of_asics: self.unit_count(),
            asic_info,
            supported_features: vec!["BST".into()],
            network_os: self.info.network_os.clone(),
            uid: self.info.uid.clone(),
            agent_sw_version: env!("CARGO_PKG_VERSION").into(),
        })
    }

    // ── Asynchronous reports ────────────────────────────────────

    /// Collection period of `unit`, or `None` while BST is disabled.
    pub fn schedule(&self, unit: u32) -> Result<Option<Duration>, BstError> {
        let ctx = self.lock(unit)?;
        Ok(ctx
            .feature
            .bst_enable
            .then(|| Duration::from_secs(ctx.feature.collection_interval.max(1).into())))
    }

    /// One collection tick: the periodic report (when enabled) followed by
    /// any admitted trigger reports.
    pub fn collect(&self, unit: u32) -> Result<Vec<Response>, BstError> {
        let mut ctx = self.lock(unit)?;
        if !ctx.feature.bst_enable {
            return Ok(Vec::new());
        }
        ctx.refresh()?;
        let asic_id = asic_id_to_notation(unit);
        let stamp = time_stamp(&chrono::Local::now());
        let feature = ctx.feature;
        let caps = ctx.silicon.capabilities().clone();
        let scale = Scale::new(&feature, &caps);
        let mut docs = Vec::new();

        if feature.send_async_reports {
            let options = ReportOptions::from_tracking(&ctx.tracking);
            let body = if feature.async_full_reports {
                ctx.active.clone()
            } else {
                ctx.active.changed_since(&ctx.backup)
            };
            ctx.backup = ctx.active.clone();
            if feature.async_full_reports || !body.is_empty() {
                docs.push(Response::report(
                    Method::GetBstReport,
                    &asic_id,
                    None,
                    stamp.clone(),
                    stats_body(&body, &options, &scale),
                ));
            }
        }

        let now = Instant::now();
        let interval = Duration::from_secs(feature.trigger_rate_limit_interval.into());
        for hit in find_triggers(&ctx.current, &ctx.thresholds, &caps) {
            if !ctx.triggers.admit(now, feature.trigger_rate_limit, interval) {
                tracing::debug!(unit, realm = %hit.realm, "trigger report rate limited");
                break;
            }
            let options = if feature.send_snapshot_on_trigger {
                ReportOptions::from_tracking(&ctx.tracking)
            } else {
                ReportOptions::only(&[hit.realm])
            };
            let mut doc = Response::report(
                Method::TriggerReport,
                &asic_id,
                None,
                stamp.clone(),
                stats_body(&ctx.current, &options, &scale),
            );
            doc.realm = Some(hit.realm.as_str().into());
            doc.counter = Some(hit.counter.as_str().into());
            doc.extra = hit.index_fields();
            docs.push(doc);
        }
        Ok(docs)
    }

    // ── Dispatch ────────────────────────────────────────────────

    /// Execute one BST request.
    pub fn handle(&self, method: Method, req: &Request) -> Result<Response, BstError> {
        let asic = req.asic_id.as_str();
        let id = req.id;

        match method {
            Method::GetBstFeature => {
                let feature = self.feature(asic)?;
                Ok(Response::result(method, asic, id, encode(&feature)?))
            }
            Method::ConfigureBstFeature => {
                self.configure_feature(asic, &params(req)?)?;
                Ok(Response::ack(method, asic, id))
            }
            Method::GetBstTracking => {
                let tracking = self.tracking(asic)?;
                Ok(Response::result(method, asic, id, encode(&tracking)?))
            }
            Method::ConfigureBstTracking => {
                self.configure_tracking(asic, &params(req)?)?;
                Ok(Response::ack(method, asic, id))
            }
            Method::ConfigureBstThresholds => {
                self.configure_thresholds(asic, &params(req)?)?;
                Ok(Response::ack(method, asic, id))
            }
            Method::GetBstThresholds => {
                let body = self.thresholds_report(asic, &params(req)?)?;
                Ok(Response::report(method, asic, Some(id), now_stamp(), body))
            }
            Method::ClearBstThresholds => {
                self.clear_thresholds(asic)?;
                Ok(Response::ack(method, asic, id))
            }
            Method::GetBstReport => {
                let body = self.report(asic, &params(req)?)?;
                Ok(Response::report(method, asic, Some(id), now_stamp(), body))
            }
            Method::ClearBstStatistics => {
                self.clear_statistics(asic)?;
                Ok(Response::ack(method, asic, id))
            }
            Method::GetBstCongestionDropCounters => {
                let report = self.drop_counters(asic, &params(req)?)?;
                let body = serde_json::Value::Array(vec![encode(&report)?]);
                Ok(Response::report(method, asic, Some(id), now_stamp(), body))
            }
            Method::GetSwitchProperties => {
                let props = self.switch_properties()?;
                Ok(Response::result(method, asic, id, encode(&props)?))
            }
            Method::TriggerReport => Err(BstError::UnsupportedMethod(method)),
        }
    }
}

fn params<T: DeserializeOwned>(req: &Request) -> Result<T, BstError> {
    req.parse_params()
        .map_err(|e| BstError::MalformedParams(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, BstError> {
    serde_json::to_value(value).map_err(BstError::Encode)
}

fn now_stamp() -> String {
    time_stamp(&chrono::Local::now())
}
