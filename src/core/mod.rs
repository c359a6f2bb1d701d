//! Core modules for the kips store.
//!
//! Connection handling, schema, configuration, errors and the agent-facing RPC server
//! live here. The tagged-entity subsystems in `plugins` build on top of them.

pub mod config;
pub mod db;
pub mod error;
pub mod rpc;
pub mod schemas;
pub mod store;
pub mod time;
