//! Southbound access to the switching ASIC.
//!
//! The BST application never touches hardware directly; it reads buffer
//! occupancy and programs thresholds through [`Silicon`]. Only a simulated
//! implementation ships with the agent.

pub mod simulated;

use thiserror::Error;

use bst_common::asic::AsicCapabilities;
use bst_common::models::{FeatureConfig, QueueType, TrackingConfig};
use bst_common::realm::Realm;
use bst_common::snapshot::{Counters, Index, Snapshot};

pub use simulated::{SharedAsic, SimulatedAsic};

#[derive(Debug, Error)]
pub enum SiliconError {
    #[error("{realm} entry {index:?} is outside the ASIC's tables")]
    NoSuchEntry { realm: Realm, index: Index },
    #[error("queue type {0:?} has no per-port counters")]
    UnsupportedQueueType(QueueType),
    #[error("silicon access failed: {0}")]
    Access(String),
}

/// One switching ASIC as seen by the BST application.
///
/// Occupancy counters exchanged here are in cells; thresholds are in bytes.
pub trait Silicon: Send {
    fn capabilities(&self) -> &AsicCapabilities;

    /// Push the feature and tracking configuration down to the ASIC.
    fn apply_config(
        &mut self,
        feature: &FeatureConfig,
        tracking: &TrackingConfig,
    ) -> Result<(), SiliconError>;

    /// Current buffer occupancy of every tracked realm. The device entry is
    /// always present.
    fn snapshot(&mut self) -> Result<Snapshot, SiliconError>;

    /// Zero all occupancy counters.
    fn clear_stats(&mut self) -> Result<(), SiliconError>;

    /// Thresholds that differ from the defaults.
    fn thresholds(&self) -> Result<Snapshot, SiliconError>;

    /// Program the thresholds of one entry.
    fn set_threshold(
        &mut self,
        realm: Realm,
        index: Index,
        thresholds: Counters,
    ) -> Result<(), SiliconError>;

    /// Restore every threshold to its default.
    fn clear_thresholds(&mut self) -> Result<(), SiliconError>;

    /// Packets dropped on `port` since start.
    fn port_drops(&mut self, port: u32) -> Result<u64, SiliconError>;

    /// Packets dropped on one queue of `port`. `queue_type` is `Ucast` or `Mcast`.
    fn queue_drops(
        &mut self,
        port: u32,
        queue_type: QueueType,
        queue: u32,
    ) -> Result<u64, SiliconError>;
}
