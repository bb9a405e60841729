//! Record shapes for the five persisted collections
//!
//! Records cross-reference each other by id only; referential integrity is
//! kept by the engine, not the store.

pub mod bond;
pub mod cell;
pub mod consolidation;
pub mod entity;
pub mod multiplier;

pub use bond::{Bond, BondStatus, NewBond};
pub use cell::{Cell, CellStatus, NewCell};
pub use consolidation::{Consolidation, ConsolidationState};
pub use entity::{BondRecord, Entity};
pub use multiplier::{multiplier_value, Multiplier, DEFAULT_MULTIPLIER};
