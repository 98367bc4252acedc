//! ASIC scaling parameters and external notation for ids and ports.
//!
//! Units are numbered from 0 internally and from 1 on the wire (`"1"` is
//! unit 0). Ports are 1-based in both places.

use serde::{Deserialize, Serialize};

use crate::models::QueueType;
use crate::realm::{IndexKey, Realm};

/// Scaling parameters of one switching ASIC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AsicCapabilities {
    pub asic_type: String,
    pub num_ports: u32,
    pub num_unicast_queues: u32,
    pub num_unicast_queue_groups: u32,
    pub num_multicast_queues: u32,
    pub num_service_pools: u32,
    pub num_common_pools: u32,
    pub num_cpu_queues: u32,
    pub num_rqe_queues: u32,
    pub num_rqe_queue_pools: u32,
    pub num_priority_groups: u32,
    /// Bytes per buffer cell.
    pub cell_to_byte: u32,
    /// Total buffer cells; the ceiling for every counter and threshold.
    pub total_cells: u64,
}

impl AsicCapabilities {
    /// Trident2-class parameters, as reported by the reference platform.
    pub fn trident2() -> Self {
        Self {
            asic_type: "BCM56850".into(),
            num_ports: 100,
            num_unicast_queues: 2960,
            num_unicast_queue_groups: 128,
            num_multicast_queues: 1040,
            num_service_pools: 4,
            num_common_pools: 1,
            num_cpu_queues: 8,
            num_rqe_queues: 11,
            num_rqe_queue_pools: 4,
            num_priority_groups: 8,
            cell_to_byte: 208,
            total_cells: 59_392,
        }
    }

    /// Number of valid values for `key` within `realm`.
    ///
    /// Ports are 1-based (`1..=num_ports`); every other index is 0-based.
    pub fn index_extent(&self, realm: Realm, key: IndexKey) -> u32 {
        match key {
            IndexKey::Port => self.num_ports,
            IndexKey::PriorityGroup => self.num_priority_groups,
            IndexKey::ServicePool => self.num_service_pools,
            IndexKey::QueueGroup => self.num_unicast_queue_groups,
            IndexKey::Queue => match realm {
                Realm::EgressMcQueue => self.num_multicast_queues,
                Realm::EgressCpuQueue => self.num_cpu_queues,
                Realm::EgressRqeQueue => self.num_rqe_queues,
                _ => self.num_unicast_queues,
            },
        }
    }

    /// Whether `value` is a valid `key` index within `realm`.
    pub fn index_in_range(&self, realm: Realm, key: IndexKey, value: u32) -> bool {
        let extent = self.index_extent(realm, key);
        match key {
            IndexKey::Port => (1..=extent).contains(&value),
            _ => value < extent,
        }
    }

    /// Queues of `queue_type` attached to each port. `All` yields the wider
    /// of the unicast and multicast sets.
    pub fn queues_per_port(&self, queue_type: QueueType) -> u32 {
        let per_port = |total: u32| total / self.num_ports.max(1);
        match queue_type {
            QueueType::Ucast => per_port(self.num_unicast_queues),
            QueueType::Mcast => per_port(self.num_multicast_queues),
            QueueType::All => per_port(self.num_unicast_queues)
                .max(per_port(self.num_multicast_queues)),
        }
    }

    /// Maximum buffer (in cells) any counter of `realm` can reach.
    ///
    /// Every realm shares the whole device buffer as its ceiling; there are
    /// no per-queue or per-pool maxima. Percentages and default thresholds
    /// of queue and pool realms are therefore relative to the device
    /// buffer, not to the entry's own share of it.
    pub fn max_buffer_cells(&self, _realm: Realm) -> u64 {
        self.total_cells
    }
}

/// Render a unit number in wire notation.
pub fn asic_id_to_notation(unit: u32) -> String {
    (unit + 1).to_string()
}

/// Parse a wire asic id into a unit number.
pub fn asic_id_from_notation(s: &str) -> Option<u32> {
    match s.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Some(n - 1),
        _ => None,
    }
}

pub fn port_to_notation(port: u32) -> String {
    port.to_string()
}

/// Parse a wire port into a port number. Range is checked separately.
pub fn port_from_notation(s: &str) -> Option<u32> {
    s.trim().parse::<u32>().ok().filter(|p| *p >= 1)
}
