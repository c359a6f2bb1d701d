//! Tagged-entity subsystems built on the core store.

pub mod entities;
pub mod gateway;
pub mod import;
pub mod tabular;
pub mod tags;
