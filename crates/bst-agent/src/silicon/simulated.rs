//! Simulated ASIC.
//!
//! Generates pseudo-random buffer occupancy for tracked realms while BST is
//! enabled. A fixed seed makes runs reproducible; a quiescent instance never
//! generates traffic on its own and only reports what is injected.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::StdRng;
use rand::{RngExt as _, SeedableRng};

use bst_common::asic::AsicCapabilities;
use bst_common::models::{FeatureConfig, QueueType, TrackingConfig};
use bst_common::realm::{IndexKey, Realm};
use bst_common::snapshot::{Counters, Index, Snapshot};

use super::{Silicon, SiliconError};

pub struct SimulatedAsic {
    caps: AsicCapabilities,
    rng: StdRng,
    traffic: bool,
    enabled: bool,
    tracking: TrackingConfig,
    occupancy: Snapshot,
    thresholds: Snapshot,
    port_drops: BTreeMap<u32, u64>,
    queue_drops: BTreeMap<(u32, QueueType, u32), u64>,
}

impl SimulatedAsic {
    /// ASIC with random traffic driven by `seed`.
    pub fn new(caps: AsicCapabilities, seed: u64) -> Self {
        let mut occupancy = Snapshot::new();
        occupancy.insert(Realm::Device, Index::DEVICE, [0; 4]);
        Self {
            caps,
            rng: StdRng::seed_from_u64(seed),
            traffic: true,
            enabled: false,
            tracking: TrackingConfig::default(),
            occupancy,
            thresholds: Snapshot::new(),
            port_drops: BTreeMap::new(),
            queue_drops: BTreeMap::new(),
        }
    }

    /// ASIC that only reports injected values.
    pub fn quiescent(caps: AsicCapabilities) -> Self {
        Self {
            traffic: false,
            ..Self::new(caps, 0)
        }
    }

    /// Overwrite the occupancy of one entry.
    pub fn inject(&mut self, realm: Realm, index: Index, counters: Counters) {
        self.occupancy.insert(realm, index, counters);
    }

    /// Add drops to one queue of `port` (and to the port total).
    pub fn inject_drops(&mut self, port: u32, queue_type: QueueType, queue: u32, drops: u64) {
        *self.queue_drops.entry((port, queue_type, queue)).or_default() += drops;
        *self.port_drops.entry(port).or_default() += drops;
    }

    fn generate(&mut self) {
        let ceiling = self.caps.total_cells / 8;
        for realm in Realm::ALL {
            if !self.tracking.tracks(realm) {
                continue;
            }
            if realm == Realm::Device {
                let used = self.rng.random_range(0..=self.caps.total_cells / 2);
                self.occupancy.insert(realm, Index::DEVICE, [used, 0, 0, 0]);
                continue;
            }
            if !self.rng.random_bool(0.5) {
                continue;
            }
            for _ in 0..self.rng.random_range(1..=3) {
                let index = random_index(&mut self.rng, &self.caps, realm);
                let mut counters = [0u64; 4];
                for slot in counters.iter_mut().take(realm.counters().len()) {
                    *slot = self.rng.random_range(0..=ceiling);
                }
                self.occupancy.insert(realm, index, counters);
            }
        }

        let port = self.rng.random_range(1..=self.caps.num_ports);
        let queue = self
            .rng
            .random_range(0..self.caps.queues_per_port(QueueType::Ucast).max(1));
        let drops = self.rng.random_range(0..500);
        self.inject_drops(port, QueueType::Ucast, queue, drops);
    }
}

fn random_index(rng: &mut StdRng, caps: &AsicCapabilities, realm: Realm) -> Index {
    let mut values = [0u32; 2];
    for (slot, key) in values.iter_mut().zip(realm.index_keys()) {
        let extent = caps.index_extent(realm, *key).max(1);
        *slot = match key {
            IndexKey::Port => rng.random_range(1..=extent),
            _ => rng.random_range(0..extent),
        };
    }
    Index::new(values[0], values[1])
}

/// Whether `index` addresses an existing entry of `realm`.
pub fn entry_in_range(caps: &AsicCapabilities, realm: Realm, index: Index) -> bool {
    let values = [index.first, index.second];
    let keys = realm.index_keys();
    keys.iter()
        .zip(values)
        .all(|(key, value)| caps.index_in_range(realm, *key, value))
        && values[keys.len()..].iter().all(|v| *v == 0)
}

impl Silicon for SimulatedAsic {
    fn capabilities(&self) -> &AsicCapabilities {
        &self.caps
    }

    fn apply_config(
        &mut self,
        feature: &FeatureConfig,
        tracking: &TrackingConfig,
    ) -> Result<(), SiliconError> {
        self.enabled = feature.bst_enable;
        self.tracking = *tracking;
        Ok(())
    }

    fn snapshot(&mut self) -> Result<Snapshot, SiliconError> {
        if self.enabled && self.traffic {
            self.generate();
        }
        let mut out = Snapshot::new();
        for realm in Realm::ALL.into_iter().filter(|r| self.tracking.tracks(*r)) {
            for (index, counters) in self.occupancy.entries(realm) {
                out.insert(realm, index, *counters);
            }
        }
        Ok(out)
    }

    fn clear_stats(&mut self) -> Result<(), SiliconError> {
        self.occupancy.clear();
        self.occupancy.insert(Realm::Device, Index::DEVICE, [0; 4]);
        Ok(())
    }

    fn thresholds(&self) -> Result<Snapshot, SiliconError> {
        Ok(self.thresholds.clone())
    }

    fn set_threshold(
        &mut self,
        realm: Realm,
        index: Index,
        thresholds: Counters,
    ) -> Result<(), SiliconError> {
        if !entry_in_range(&self.caps, realm, index) {
            return Err(SiliconError::NoSuchEntry { realm, index });
        }
        self.thresholds.insert(realm, index, thresholds);
        Ok(())
    }

    fn clear_thresholds(&mut self) -> Result<(), SiliconError> {
        self.thresholds.clear();
        Ok(())
    }

    fn port_drops(&mut self, port: u32) -> Result<u64, SiliconError> {
        Ok(self.port_drops.get(&port).copied().unwrap_or(0))
    }

    fn queue_drops(
        &mut self,
        port: u32,
        queue_type: QueueType,
        queue: u32,
    ) -> Result<u64, SiliconError> {
        if queue_type == QueueType::All {
            return Err(SiliconError::UnsupportedQueueType(queue_type));
        }
        Ok(self
            .queue_drops
            .get(&(port, queue_type, queue))
            .copied()
            .unwrap_or(0))
    }
}

/// A simulated ASIC that stays reachable after the agent takes ownership of
/// it, so tests can inject occupancy and drops into a running agent.
#[derive(Clone)]
pub struct SharedAsic {
    caps: AsicCapabilities,
    inner: Arc<Mutex<SimulatedAsic>>,
}

impl SharedAsic {
    pub fn new(asic: SimulatedAsic) -> Self {
        Self {
            caps: asic.caps.clone(),
            inner: Arc::new(Mutex::new(asic)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimulatedAsic>, SiliconError> {
        self.inner
            .lock()
            .map_err(|_| SiliconError::Access("simulated asic lock poisoned".into()))
    }

    pub fn inject(
        &self,
        realm: Realm,
        index: Index,
        counters: Counters,
    ) -> Result<(), SiliconError> {
        self.lock()?.inject(realm, index, counters);
        Ok(())
    }

    pub fn inject_drops(
        &self,
        port: u32,
        queue_type: QueueType,
        queue: u32,
        drops: u64,
    ) -> Result<(), SiliconError> {
        self.lock()?.inject_drops(port, queue_type, queue, drops);
        Ok(())
    }
}

impl Silicon for SharedAsic {
    fn capabilities(&self) -> &AsicCapabilities {
        &self.caps
    }

    fn apply_config(
        &mut self,
        feature: &FeatureConfig,
        tracking: &TrackingConfig,
    ) -> Result<(), SiliconError> {
        self.lock()?.apply_config(feature, tracking)
    }

    fn snapshot(&mut self) -> Result<Snapshot, SiliconError> {
        self.lock()?.snapshot()
    }

    fn clear_stats(&mut self) -> Result<(), SiliconError> {
        self.lock()?.clear_stats()
    }

    fn thresholds(&self) -> Result<Snapshot, SiliconError> {
        self.lock()?.thresholds()
    }

    fn set_threshold(
        &mut self,
        realm: Realm,
        index: Index,
        thresholds: Counters,
    ) -> Result<(), SiliconError> {
        self.lock()?.set_threshold(realm, index, thresholds)
    }

    fn clear_thresholds(&mut self) -> Result<(), SiliconError> {
        self.lock()?.clear_thresholds()
    }

    fn port_drops(&mut self, port: u32) -> Result<u64, SiliconError> {
        self.lock()?.port_drops(port)
    }

    fn queue_drops(
        &mut self,
        port: u32,
        queue_type: QueueType,
        queue: u32,
    ) -> Result<u64, SiliconError> {
        self.lock()?.queue_drops(port, queue_type, queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled(asic: &mut SimulatedAsic) {
        let feature = FeatureConfig {
            bst_enable: true,
            ..FeatureConfig::default()
        };
        asic.apply_config(&feature, &TrackingConfig::default()).unwrap();
    }

    #[test]
    fn quiescent_reports_only_injected_values() {
        let mut asic = SimulatedAsic::quiescent(AsicCapabilities::trident2());
        enabled(&mut asic);
        asic.inject(Realm::EgressUcQueue, Index::single(4), [300, 0, 0, 0]);

        let snap = asic.snapshot().unwrap();
        assert_eq!(snap.value(Realm::Device, Index::DEVICE, 0), 0);
        assert_eq!(snap.value(Realm::EgressUcQueue, Index::single(4), 0), 300);
        assert_eq!(snap.realms().count(), 2);
    }

    #[test]
    fn no_traffic_while_disabled() {
        let mut asic = SimulatedAsic::new(AsicCapabilities::trident2(), 7);
        let snap = asic.snapshot().unwrap();
        assert_eq!(snap.value(Realm::Device, Index::DEVICE, 0), 0);
        assert_eq!(snap.realms().count(), 1);
    }

    #[test]
    fn seeded_traffic_is_reproducible_and_in_range() {
        let caps = AsicCapabilities::trident2();
        let mut a = SimulatedAsic::new(caps.clone(), 42);
        let mut b = SimulatedAsic::new(caps.clone(), 42);
        enabled(&mut a);
        enabled(&mut b);
        for _ in 0..5 {
            let sa = a.snapshot().unwrap();
            let sb = b.snapshot().unwrap();
            assert_eq!(sa, sb);
            for realm in sa.realms() {
                for (index, _) in sa.entries(realm) {
                    assert!(entry_in_range(&caps, realm, index), "{realm} {index:?}");
                }
            }
        }
    }

    #[test]
    fn untracked_realms_are_hidden() {
        let mut asic = SimulatedAsic::quiescent(AsicCapabilities::trident2());
        asic.inject(Realm::EgressCpuQueue, Index::single(1), [5, 0, 0, 0]);
        let tracking = TrackingConfig {
            track_egress_cpu_queue: false,
            ..TrackingConfig::default()
        };
        asic.apply_config(&FeatureConfig::default(), &tracking).unwrap();
        assert!(asic.snapshot().unwrap().get(Realm::EgressCpuQueue, Index::single(1)).is_none());
    }

    #[test]
    fn clear_stats_keeps_device_entry() {
        let mut asic = SimulatedAsic::quiescent(AsicCapabilities::trident2());
        asic.inject(Realm::Device, Index::DEVICE, [99, 0, 0, 0]);
        asic.inject(Realm::EgressMcQueue, Index::single(2), [1, 2, 0, 0]);
        asic.clear_stats().unwrap();
        let snap = asic.snapshot().unwrap();
        assert_eq!(snap.value(Realm::Device, Index::DEVICE, 0), 0);
        assert!(snap.get(Realm::EgressMcQueue, Index::single(2)).is_none());
    }

    #[test]
    fn threshold_entries_must_exist() {
        let mut asic = SimulatedAsic::quiescent(AsicCapabilities::trident2());
        assert!(asic
            .set_threshold(Realm::EgressCpuQueue, Index::single(3), [10, 0, 0, 0])
            .is_ok());
        assert!(matches!(
            asic.set_threshold(Realm::EgressCpuQueue, Index::single(8), [10, 0, 0, 0]),
            Err(SiliconError::NoSuchEntry { .. })
        ));
        assert!(asic
            .set_threshold(Realm::IngressPortServicePool, Index::new(0, 1), [10, 0, 0, 0])
            .is_err());
        asic.clear_thresholds().unwrap();
        assert!(asic.thresholds().unwrap().is_empty());
    }

    #[test]
    fn drops_accumulate_per_port() {
        let mut asic = SimulatedAsic::quiescent(AsicCapabilities::trident2());
        asic.inject_drops(3, QueueType::Ucast, 1, 10);
        asic.inject_drops(3, QueueType::Mcast, 0, 5);
        assert_eq!(asic.port_drops(3).unwrap(), 15);
        assert_eq!(asic.queue_drops(3, QueueType::Mcast, 0).unwrap(), 5);
        assert!(asic.queue_drops(3, QueueType::All, 0).is_err());
    }

    #[test]
    fn shared_handle_reaches_owned_asic() {
        let handle = SharedAsic::new(SimulatedAsic::quiescent(AsicCapabilities::trident2()));
        let mut owned: Box<dyn Silicon> = Box::new(handle.clone());
        handle
            .inject(Realm::EgressRqeQueue, Index::single(2), [17, 0, 0, 0])
            .unwrap();
        let snap = owned.snapshot().unwrap();
        assert_eq!(snap.value(Realm::EgressRqeQueue, Index::single(2), 0), 17);
    }
}
