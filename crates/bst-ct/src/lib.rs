//! BST REST conformance harness.
//!
//! Reads `serverDetails.ini`, optionally builds a virtual single-switch
//! topology, starts the agent inside it, and runs the nine API checks
//! against the agent's REST endpoint.

pub mod checks;
pub mod client;
pub mod config;
pub mod fixture;
pub mod ifconfig;
pub mod suite;
