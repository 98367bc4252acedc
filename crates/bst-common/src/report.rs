//! Report body encoding.
//!
//! `get-bst-report`, `get-bst-thresholds` and `trigger-report` documents
//! carry a `report` array with one element per realm:
//!
//! ```json
//! { "realm": "device", "data": 46 }
//! { "realm": "egress-service-pool", "data": [[1, 120, 0]] }
//! { "realm": "ingress-port-priority-group",
//!   "data": [{ "port": "2", "data": [[5, 455, 444]] }] }
//! ```
//!
//! Inner rows are `[index, counter...]` with counters in [`Realm::counters`]
//! order.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::asic::{port_from_notation, port_to_notation};
use crate::models::{DropRequestType, QueueType, ReportOptions};
use crate::realm::Realm;
use crate::snapshot::{Counters, Index, MAX_COUNTERS, Snapshot};

/// Format of the `time-stamp` field.
pub const TIME_STAMP_FORMAT: &str = "%Y-%m-%d - %H:%M:%S";

pub fn time_stamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format(TIME_STAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealmReport {
    pub realm: Realm,
    pub data: Value,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("malformed {realm} report: {reason}")]
    Malformed { realm: Realm, reason: String },
}

fn malformed(realm: Realm, reason: impl Into<String>) -> ReportError {
    ReportError::Malformed {
        realm,
        reason: reason.into(),
    }
}

/// Encode the realms selected by `options`.
///
/// A device entry is emitted whenever the snapshot holds one; other realms
/// emit only entries with at least one non-zero counter, and realms without
/// such entries are left out. `convert` maps a raw cell count of `realm` to
/// the reported unit.
pub fn encode<F>(snapshot: &Snapshot, options: &ReportOptions, convert: F) -> Vec<RealmReport>
where
    F: Fn(Realm, u64) -> u64,
{
    encode_rows(snapshot, options, false, convert)
}

/// Like [`encode`], but every entry of the snapshot is emitted, all-zero
/// rows included. Threshold listings use this.
pub fn encode_all<F>(snapshot: &Snapshot, options: &ReportOptions, convert: F) -> Vec<RealmReport>
where
    F: Fn(Realm, u64) -> u64,
{
    encode_rows(snapshot, options, true, convert)
}

fn encode_rows<F>(
    snapshot: &Snapshot,
    options: &ReportOptions,
    keep_zero: bool,
    convert: F,
) -> Vec<RealmReport>
where
    F: Fn(Realm, u64) -> u64,
{
    let mut out = Vec::new();
    for realm in options.realms() {
        let width = realm.counters().len();
        if realm == Realm::Device {
            if let Some(counters) = snapshot.get(realm, Index::DEVICE) {
                out.push(RealmReport {
                    realm,
                    data: Value::from(convert(realm, counters[0])),
                });
            }
            continue;
        }

        let row = |lead: u32, counters: &Counters| -> Value {
            let mut cells = Vec::with_capacity(width + 1);
            cells.push(Value::from(lead));
            cells.extend(counters[..width].iter().map(|c| Value::from(convert(realm, *c))));
            Value::Array(cells)
        };
        let live = snapshot
            .entries(realm)
            .filter(|(_, c)| keep_zero || c[..width].iter().any(|v| *v != 0));

        let data: Vec<Value> = if realm.is_port_indexed() {
            let mut ports: Vec<(u32, Vec<Value>)> = Vec::new();
            for (index, counters) in live {
                match ports.last_mut() {
                    Some((port, rows)) if *port == index.first => {
                        rows.push(row(index.second, counters))
                    }
                    _ => ports.push((index.first, vec![row(index.second, counters)])),
                }
            }
            ports
                .into_iter()
                .map(|(port, rows)| {
                    serde_json::json!({ "port": port_to_notation(port), "data": rows })
                })
                .collect()
        } else {
            live.map(|(index, counters)| row(index.first, counters)).collect()
        };

        if !data.is_empty() {
            out.push(RealmReport {
                realm,
                data: Value::Array(data),
            });
        }
    }
    out
}

/// Rebuild a snapshot from encoded realm reports (values as reported).
pub fn decode(reports: &[RealmReport]) -> Result<Snapshot, ReportError> {
    let mut snapshot = Snapshot::new();
    for report in reports {
        let realm = report.realm;
        if realm == Realm::Device {
            let value = report
                .data
                .as_u64()
                .ok_or_else(|| malformed(realm, "device data is not a number"))?;
            snapshot.insert(realm, Index::DEVICE, [value, 0, 0, 0]);
            continue;
        }

        let items = report
            .data
            .as_array()
            .ok_or_else(|| malformed(realm, "data is not an array"))?;
        for item in items {
            if realm.is_port_indexed() {
                let port = item
                    .get("port")
                    .and_then(Value::as_str)
                    .and_then(port_from_notation)
                    .ok_or_else(|| malformed(realm, "missing or invalid port"))?;
                let rows = item
                    .get("data")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed(realm, "port entry has no data rows"))?;
                for row in rows {
                    let (second, counters) = decode_row(realm, row)?;
                    snapshot.insert(realm, Index::new(port, second), counters);
                }
            } else {
                let (first, counters) = decode_row(realm, item)?;
                snapshot.insert(realm, Index::single(first), counters);
            }
        }
    }
    Ok(snapshot)
}

fn decode_row(realm: Realm, row: &Value) -> Result<(u32, Counters), ReportError> {
    let cells = row
        .as_array()
        .ok_or_else(|| malformed(realm, "row is not an array"))?;
    let width = realm.counters().len();
    if cells.len() != width + 1 {
        return Err(malformed(
            realm,
            format!("row has {} values, expected {}", cells.len(), width + 1),
        ));
    }
    let number = |v: &Value| v.as_u64().ok_or_else(|| malformed(realm, "non-numeric value"));
    let lead = u32::try_from(number(&cells[0])?).map_err(|_| malformed(realm, "index too large"))?;
    let mut counters = [0u64; MAX_COUNTERS];
    for (slot, cell) in counters.iter_mut().zip(&cells[1..]) {
        *slot = number(cell)?;
    }
    Ok((lead, counters))
}

// ── Congestion drop reports ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DropReport {
    pub report_type: DropRequestType,
    pub data: Vec<DropEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DropEntry {
    /// Per-queue drops of one port, `data` is `[[queue, drops], ...]`.
    PortQueue {
        port: String,
        #[serde(rename = "queue-type")]
        queue_type: QueueType,
        data: Vec<(u32, u64)>,
    },
    /// Total drops of one port.
    Port { port: String, data: u64 },
}

impl DropEntry {
    /// Largest drop count carried by the entry.
    pub fn peak(&self) -> u64 {
        match self {
            DropEntry::Port { data, .. } => *data,
            DropEntry::PortQueue { data, .. } => data.iter().map(|(_, d)| *d).max().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        let mut snap = Snapshot::new();
        snap.insert(Realm::Device, Index::DEVICE, [46, 0, 0, 0]);
        snap.insert(Realm::IngressPortPriorityGroup, Index::new(2, 5), [455, 444, 0, 0]);
        snap.insert(Realm::IngressPortPriorityGroup, Index::new(2, 6), [1, 0, 0, 0]);
        snap.insert(Realm::IngressPortPriorityGroup, Index::new(3, 0), [0, 0, 0, 0]);
        snap.insert(Realm::EgressServicePool, Index::single(1), [120, 0, 0, 0]);
        snap
    }

    #[test]
    fn encodes_realm_shapes() {
        let reports = encode(&sample(), &ReportOptions::all(), |_, v| v);
        let json = serde_json::to_value(&reports).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "realm": "device", "data": 46 },
                { "realm": "ingress-port-priority-group",
                  "data": [{ "port": "2", "data": [[5, 455, 444], [6, 1, 0]] }] },
                { "realm": "egress-service-pool", "data": [[1, 120, 0]] }
            ])
        );
    }

    #[test]
    fn respects_options_and_conversion() {
        let opts = ReportOptions::only(&[Realm::EgressServicePool]);
        let reports = encode(&sample(), &opts, |_, v| v * 2);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].data, serde_json::json!([[1, 240, 0]]));
    }

    #[test]
    fn encode_all_keeps_zero_rows() {
        let opts = ReportOptions::only(&[Realm::IngressPortPriorityGroup]);
        let reports = encode_all(&sample(), &opts, |_, v| v);
        assert_eq!(
            reports[0].data,
            serde_json::json!([
                { "port": "2", "data": [[5, 455, 444], [6, 1, 0]] },
                { "port": "3", "data": [[0, 0, 0]] }
            ])
        );
    }

    #[test]
    fn decode_inverts_encode() {
        let snap = sample();
        let reports = encode(&snap, &ReportOptions::all(), |_, v| v);
        let back = decode(&reports).unwrap();
        assert_eq!(back.value(Realm::Device, Index::DEVICE, 0), 46);
        assert_eq!(back.value(Realm::IngressPortPriorityGroup, Index::new(2, 5), 1), 444);
        assert!(back.get(Realm::IngressPortPriorityGroup, Index::new(3, 0)).is_none());
    }

    #[test]
    fn decode_rejects_short_rows() {
        let reports = vec![RealmReport {
            realm: Realm::EgressMcQueue,
            data: serde_json::json!([[4, 10]]),
        }];
        assert!(decode(&reports).is_err());
    }

    #[test]
    fn drop_entries_are_untagged() {
        let entry: DropEntry = serde_json::from_value(serde_json::json!({
            "port": "4", "queue-type": "ucast", "data": [[1, 30], [2, 70]]
        }))
        .unwrap();
        assert_eq!(entry.peak(), 70);
        let entry: DropEntry =
            serde_json::from_value(serde_json::json!({ "port": "4", "data": 12 })).unwrap();
        assert!(matches!(entry, DropEntry::Port { data: 12, .. }));
    }

    #[test]
    fn time_stamp_format() {
        let at = chrono::Utc.with_ymd_and_hms(2016, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(time_stamp(&at), "2016-03-04 - 05:06:07");
    }
}
