//! BST agent library.
//!
//! Re-exports the API router, shared state, the BST application and the
//! silicon layer so they can be used by integration tests and by the
//! conformance harness, which embeds an agent for loopback runs.

pub mod api;
pub mod collector;
pub mod config;
pub mod engine;
pub mod silicon;
pub mod state;
