//! Genesis Sim - Entity lifecycle simulation engine

pub mod core;
pub mod records;
pub mod simulation;
pub mod store;
