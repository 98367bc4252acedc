//! BST realms and the counters tracked within each.
//!
//! A realm is a class of buffer accounting on the ASIC (device-wide, per
//! ingress port/priority-group, per egress queue, ...). Every entry in a realm
//! is addressed by up to two index keys and carries a fixed list of counters.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Realm {
    Device,
    IngressPortPriorityGroup,
    IngressPortServicePool,
    IngressServicePool,
    EgressPortServicePool,
    EgressServicePool,
    EgressUcQueue,
    EgressUcQueueGroup,
    EgressMcQueue,
    EgressCpuQueue,
    EgressRqeQueue,
}

/// Index key naming the position of an entry within a realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKey {
    Port,
    PriorityGroup,
    ServicePool,
    Queue,
    QueueGroup,
}

impl IndexKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKey::Port => "port",
            IndexKey::PriorityGroup => "priority-group",
            IndexKey::ServicePool => "service-pool",
            IndexKey::Queue => "queue",
            IndexKey::QueueGroup => "queue-group",
        }
    }
}

/// A buffer counter within a realm entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Counter {
    Data,
    UmShare,
    UmHeadroom,
    UcShare,
    McShare,
    McShareQueueEntries,
    Uc,
    Mc,
    McQueueEntries,
    Cpu,
    Rqe,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::Data => "data",
            Counter::UmShare => "um-share",
            Counter::UmHeadroom => "um-headroom",
            Counter::UcShare => "uc-share",
            Counter::McShare => "mc-share",
            Counter::McShareQueueEntries => "mc-share-queue-entries",
            Counter::Uc => "uc",
            Counter::Mc => "mc",
            Counter::McQueueEntries => "mc-queue-entries",
            Counter::Cpu => "cpu",
            Counter::Rqe => "rqe",
        }
    }

    /// Parameter name used by `configure-bst-thresholds` for this counter.
    pub fn threshold_key(&self) -> &'static str {
        match self {
            Counter::Data => "threshold",
            Counter::UmShare => "um-share-threshold",
            Counter::UmHeadroom => "um-headroom-threshold",
            Counter::UcShare => "uc-share-threshold",
            Counter::McShare => "mc-share-threshold",
            Counter::McShareQueueEntries => "mc-share-queue-entries-threshold",
            Counter::Uc => "uc-threshold",
            Counter::Mc => "mc-threshold",
            Counter::McQueueEntries => "mc-queue-entries-threshold",
            Counter::Cpu => "cpu-threshold",
            Counter::Rqe => "rqe-threshold",
        }
    }
}

impl Realm {
    pub const ALL: [Realm; 11] = [
        Realm::Device,
        Realm::IngressPortPriorityGroup,
        Realm::IngressPortServicePool,
        Realm::IngressServicePool,
        Realm::EgressPortServicePool,
        Realm::EgressServicePool,
        Realm::EgressUcQueue,
        Realm::EgressUcQueueGroup,
        Realm::EgressMcQueue,
        Realm::EgressCpuQueue,
        Realm::EgressRqeQueue,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Realm::Device => "device",
            Realm::IngressPortPriorityGroup => "ingress-port-priority-group",
            Realm::IngressPortServicePool => "ingress-port-service-pool",
            Realm::IngressServicePool => "ingress-service-pool",
            Realm::EgressPortServicePool => "egress-port-service-pool",
            Realm::EgressServicePool => "egress-service-pool",
            Realm::EgressUcQueue => "egress-uc-queue",
            Realm::EgressUcQueueGroup => "egress-uc-queue-group",
            Realm::EgressMcQueue => "egress-mc-queue",
            Realm::EgressCpuQueue => "egress-cpu-queue",
            Realm::EgressRqeQueue => "egress-rqe-queue",
        }
    }

    /// Index keys addressing an entry, outermost first.
    pub fn index_keys(&self) -> &'static [IndexKey] {
        match self {
            Realm::Device => &[],
            Realm::IngressPortPriorityGroup => &[IndexKey::Port, IndexKey::PriorityGroup],
            Realm::IngressPortServicePool | Realm::EgressPortServicePool => {
                &[IndexKey::Port, IndexKey::ServicePool]
            }
            Realm::IngressServicePool | Realm::EgressServicePool => &[IndexKey::ServicePool],
            Realm::EgressUcQueue
            | Realm::EgressMcQueue
            | Realm::EgressCpuQueue
            | Realm::EgressRqeQueue => &[IndexKey::Queue],
            Realm::EgressUcQueueGroup => &[IndexKey::QueueGroup],
        }
    }

    /// Counters carried by each entry, in wire order.
    pub fn counters(&self) -> &'static [Counter] {
        match self {
            Realm::Device => &[Counter::Data],
            Realm::IngressPortPriorityGroup => &[Counter::UmShare, Counter::UmHeadroom],
            Realm::IngressPortServicePool | Realm::IngressServicePool => &[Counter::UmShare],
            Realm::EgressPortServicePool => &[
                Counter::UcShare,
                Counter::UmShare,
                Counter::McShare,
                Counter::McShareQueueEntries,
            ],
            Realm::EgressServicePool => &[Counter::UmShare, Counter::McShare],
            Realm::EgressUcQueue | Realm::EgressUcQueueGroup => &[Counter::Uc],
            Realm::EgressMcQueue => &[Counter::Mc, Counter::McQueueEntries],
            Realm::EgressCpuQueue => &[Counter::Cpu],
            Realm::EgressRqeQueue => &[Counter::Rqe],
        }
    }

    /// Position of `counter` within [`Realm::counters`].
    pub fn counter_position(&self, counter: Counter) -> Option<usize> {
        self.counters().iter().position(|c| *c == counter)
    }

    /// Whether the outermost index is a front-panel port.
    pub fn is_port_indexed(&self) -> bool {
        self.index_keys().first() == Some(&IndexKey::Port)
    }
}

impl std::fmt::Display for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Realm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Realm::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown realm: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realm_names_match_serde() {
        for realm in Realm::ALL {
            let json = serde_json::to_string(&realm).unwrap();
            assert_eq!(json, format!("\"{}\"", realm.as_str()));
            assert_eq!(realm.as_str().parse::<Realm>().unwrap(), realm);
        }
    }

    #[test]
    fn unknown_realm_is_rejected() {
        assert!("egress-xyz-queue".parse::<Realm>().is_err());
    }

    #[test]
    fn counters_fit_entry_width() {
        for realm in Realm::ALL {
            assert!(realm.counters().len() <= crate::snapshot::MAX_COUNTERS);
            assert!(realm.index_keys().len() <= 2);
        }
    }

    #[test]
    fn port_indexed_realms() {
        assert!(Realm::IngressPortPriorityGroup.is_port_indexed());
        assert!(Realm::EgressPortServicePool.is_port_indexed());
        assert!(!Realm::EgressUcQueue.is_port_indexed());
        assert!(!Realm::Device.is_port_indexed());
    }
}
