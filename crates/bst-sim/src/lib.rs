//! Network simulation toolkit for conformance testing.
//!
//! Provides Linux network namespace management, a single-switch topology
//! whose switch node hosts the agent under test, and process control
//! (launch, pgrep, SIGTERM) on those nodes.

pub mod process;
pub mod topology;

pub use topology::{check_privileges, Network, Node, SingleSwitchTopo, TopologyError};

#[cfg(test)]
pub(crate) mod test_util;
