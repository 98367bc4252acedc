//! Unit conversion and report bodies.

use serde_json::Value;

use bst_common::asic::AsicCapabilities;
use bst_common::models::{FeatureConfig, ParamError, ReportOptions, TrackingConfig};
use bst_common::realm::Realm;
use bst_common::report;
use bst_common::snapshot::{Counters, Index, MAX_COUNTERS, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units {
    Bytes,
    Cells,
    Percent,
}

impl Units {
    /// Percentage takes precedence over the cells/bytes choice.
    pub fn of(feature: &FeatureConfig) -> Self {
        if feature.stats_in_percentage {
            Units::Percent
        } else if feature.stat_units_in_cells {
            Units::Cells
        } else {
            Units::Bytes
        }
    }
}

/// Converts between ASIC cells and the units configured on a unit.
#[derive(Debug, Clone, Copy)]
pub struct Scale<'a> {
    units: Units,
    caps: &'a AsicCapabilities,
}

fn percent_of(value: u64, max: u64) -> u64 {
    if max == 0 {
        0
    } else {
        (value.saturating_mul(100) + max / 2) / max
    }
}

impl<'a> Scale<'a> {
    pub fn new(feature: &FeatureConfig, caps: &'a AsicCapabilities) -> Self {
        Self {
            units: Units::of(feature),
            caps,
        }
    }

    pub fn caps(&self) -> &'a AsicCapabilities {
        self.caps
    }

    /// Occupancy in reported units.
    pub fn stat(&self, realm: Realm, cells: u64) -> u64 {
        match self.units {
            Units::Percent => percent_of(cells, self.caps.max_buffer_cells(realm)),
            Units::Cells => cells,
            Units::Bytes => cells.saturating_mul(self.caps.cell_to_byte.into()),
        }
    }

    fn cell_bytes(&self) -> u64 {
        u64::from(self.caps.cell_to_byte.max(1))
    }

    /// Threshold held in bytes, in reported units; percentages never
    /// exceed 100.
    pub fn threshold(&self, realm: Realm, bytes: u64) -> u64 {
        match self.units {
            Units::Percent => {
                let max = self.caps.max_buffer_cells(realm).saturating_mul(self.cell_bytes());
                percent_of(bytes, max).min(100)
            }
            Units::Cells => bytes / self.cell_bytes(),
            Units::Bytes => bytes,
        }
    }

    /// Convert a configured threshold to bytes, rejecting values above the
    /// realm's buffer.
    pub fn threshold_to_bytes(
        &self,
        realm: Realm,
        key: &'static str,
        value: u64,
    ) -> Result<u64, ParamError> {
        let max_cells = self.caps.max_buffer_cells(realm);
        let cell = self.cell_bytes();
        let limit = match self.units {
            Units::Percent => 100,
            Units::Cells => max_cells,
            Units::Bytes => max_cells.saturating_mul(cell),
        };
        if value > limit {
            return Err(ParamError::OutOfRange {
                key,
                value,
                min: 0,
                max: limit,
            });
        }
        Ok(match self.units {
            Units::Percent => (value * max_cells + 50) / 100 * cell,
            Units::Cells => value * cell,
            Units::Bytes => value,
        })
    }
}

/// Whether `cells` of occupancy exceed a threshold of `bytes`.
pub fn exceeds(caps: &AsicCapabilities, cells: u64, bytes: u64) -> bool {
    cells.saturating_mul(caps.cell_to_byte.max(1).into()) > bytes
}

/// Default thresholds of one entry, in bytes: the realm's whole buffer.
pub fn default_thresholds(caps: &AsicCapabilities, realm: Realm) -> Counters {
    let whole = caps
        .max_buffer_cells(realm)
        .saturating_mul(caps.cell_to_byte.max(1).into());
    let mut out = [0u64; MAX_COUNTERS];
    for slot in out.iter_mut().take(realm.counters().len()) {
        *slot = whole;
    }
    out
}

/// Restrict `options` to the realms being tracked.
pub fn mask_untracked(options: &ReportOptions, tracking: &TrackingConfig) -> ReportOptions {
    let realms: Vec<Realm> = options.realms().filter(|r| tracking.tracks(*r)).collect();
    ReportOptions::only(&realms)
}

fn to_array(reports: Vec<report::RealmReport>) -> Value {
    Value::Array(
        reports
            .into_iter()
            .map(|r| serde_json::json!({ "realm": r.realm.as_str(), "data": r.data }))
            .collect(),
    )
}

/// `report` array of a statistics document.
pub fn stats_body(snapshot: &Snapshot, options: &ReportOptions, scale: &Scale<'_>) -> Value {
    to_array(report::encode(snapshot, options, |realm, v| scale.stat(realm, v)))
}

/// `report` array of a `get-bst-thresholds` document. The device threshold
/// is always listed; other realms list every configured entry, zero
/// thresholds included.
pub fn thresholds_body(configured: &Snapshot, options: &ReportOptions, scale: &Scale<'_>) -> Value {
    let mut table = configured.clone();
    if table.get(Realm::Device, Index::DEVICE).is_none() {
        table.insert(
            Realm::Device,
            Index::DEVICE,
            default_thresholds(scale.caps(), Realm::Device),
        );
    }
    to_array(report::encode_all(&table, options, |realm, v| scale.threshold(realm, v)))
}
