//! Shared types for the BST agent and its conformance harness.
//!
//! This crate contains:
//! - **Realms**: the eleven buffer-statistics realms and their index keys
//! - **ASIC model**: scaling parameters and external id/port notation
//! - **Data models**: feature, tracking, threshold and drop-counter parameters
//! - **Snapshots**: per-realm counter tables and their JSON report encoding
//! - **Protocol**: the JSON-RPC 2.0 envelope spoken over the REST API

pub mod asic;
pub mod models;
pub mod protocol;
pub mod realm;
pub mod report;
pub mod snapshot;
