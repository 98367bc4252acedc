//! Threshold crossings and trigger-report rate limiting.

use std::time::{Duration, Instant};

use serde_json::{Map, Value};

use bst_common::asic::{AsicCapabilities, port_to_notation};
use bst_common::realm::{Counter, IndexKey, Realm};
use bst_common::snapshot::{Index, Snapshot};

use super::report::{default_thresholds, exceeds};

/// An entry whose counter exceeded its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub realm: Realm,
    pub counter: Counter,
    pub index: Index,
}

impl Trigger {
    /// Index keys of the triggering entry, as carried on a trigger report.
    pub fn index_fields(&self) -> Map<String, Value> {
        let mut out = Map::new();
        let values = [self.index.first, self.index.second];
        for (key, value) in self.realm.index_keys().iter().zip(values) {
            let encoded = match key {
                IndexKey::Port => Value::String(port_to_notation(value)),
                _ => Value::from(value),
            };
            out.insert(key.as_str().to_string(), encoded);
        }
        out
    }
}

/// Every counter in `current` strictly above its threshold. Occupancy is
/// in cells, thresholds in bytes.
pub fn find_triggers(
    current: &Snapshot,
    thresholds: &Snapshot,
    caps: &AsicCapabilities,
) -> Vec<Trigger> {
    let mut out = Vec::new();
    for realm in current.realms() {
        let defaults = default_thresholds(caps, realm);
        for (index, counters) in current.entries(realm) {
            let limits = thresholds.get(realm, index).unwrap_or(&defaults);
            for (position, counter) in realm.counters().iter().enumerate() {
                if exceeds(caps, counters[position], limits[position]) {
                    out.push(Trigger {
                        realm,
                        counter: *counter,
                        index,
                    });
                }
            }
        }
    }
    out
}

/// Admits at most `limit` trigger reports per interval.
#[derive(Debug, Default)]
pub struct TriggerWindow {
    started: Option<Instant>,
    sent: u32,
}

impl TriggerWindow {
    pub fn admit(&mut self, now: Instant, limit: u32, interval: Duration) -> bool {
        let expired = match self.started {
            Some(start) => now.duration_since(start) >= interval,
            None => true,
        };
        if expired {
            self.started = Some(now);
            self.sent = 0;
        }
        if self.sent < limit {
            self.sent += 1;
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.sent = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_requires_strictly_greater() {
        let caps = AsicCapabilities::trident2();
        let mut thresholds = Snapshot::new();
        thresholds.insert(Realm::EgressUcQueue, Index::single(3), [100 * 208, 0, 0, 0]);

        let mut current = Snapshot::new();
        current.insert(Realm::Device, Index::DEVICE, [10, 0, 0, 0]);
        current.insert(Realm::EgressUcQueue, Index::single(3), [100, 0, 0, 0]);
        assert!(find_triggers(&current, &thresholds, &caps).is_empty());

        current.insert(Realm::EgressUcQueue, Index::single(3), [101, 0, 0, 0]);
        assert_eq!(
            find_triggers(&current, &thresholds, &caps),
            vec![Trigger {
                realm: Realm::EgressUcQueue,
                counter: Counter::Uc,
                index: Index::single(3),
            }]
        );
    }

    #[test]
    fn sub_cell_threshold_fires_on_one_cell() {
        let caps = AsicCapabilities::trident2();
        let mut thresholds = Snapshot::new();
        thresholds.insert(Realm::EgressCpuQueue, Index::single(3), [100, 0, 0, 0]);

        let mut current = Snapshot::new();
        current.insert(Realm::EgressCpuQueue, Index::single(3), [0, 0, 0, 0]);
        assert!(find_triggers(&current, &thresholds, &caps).is_empty());

        current.insert(Realm::EgressCpuQueue, Index::single(3), [1, 0, 0, 0]);
        assert_eq!(find_triggers(&current, &thresholds, &caps).len(), 1);
    }

    #[test]
    fn default_thresholds_never_trigger() {
        let caps = AsicCapabilities::trident2();
        let mut current = Snapshot::new();
        current.insert(Realm::Device, Index::DEVICE, [caps.total_cells, 0, 0, 0]);
        assert!(find_triggers(&current, &Snapshot::new(), &caps).is_empty());
    }

    #[test]
    fn index_fields_use_port_notation() {
        let trigger = Trigger {
            realm: Realm::IngressPortPriorityGroup,
            counter: Counter::UmShare,
            index: Index::new(4, 2),
        };
        let fields = trigger.index_fields();
        assert_eq!(fields["port"], "4");
        assert_eq!(fields["priority-group"], 2);
    }

    #[test]
    fn window_limits_per_interval() {
        let mut window = TriggerWindow::default();
        let t0 = Instant::now();
        let interval = Duration::from_secs(1);
        assert!(window.admit(t0, 2, interval));
        assert!(window.admit(t0, 2, interval));
        assert!(!window.admit(t0 + Duration::from_millis(500), 2, interval));
        assert!(window.admit(t0 + Duration::from_secs(1), 2, interval));
    }
}
