//! Cells - growth units that divide inside one consolidation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{CellKey, ConsolidationId, EntityId, Millis, Trait};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    Normal,
    Forming,
    Dividing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub key: CellKey,
    /// Serial within the owning consolidation; 0 is the origin cell
    pub cell_id: u32,
    /// Empty for the seeded origin cell, otherwise the two bonded entities
    pub parent_entity_ids: Vec<EntityId>,
    pub consolidation: Option<ConsolidationId>,
    /// None only for the seeded origin cell
    pub potential_trait: Option<Trait>,
    pub energy_level: u32,
    pub status: CellStatus,
    pub division_started_at: Option<DateTime<Utc>>,
    pub division_duration_ms: Option<Millis>,
    /// Most recent child produced by a division of this cell
    pub resulting_cell: Option<CellKey>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// A cell before the store has assigned its key
#[derive(Debug, Clone, PartialEq)]
pub struct NewCell {
    pub cell_id: u32,
    pub parent_entity_ids: Vec<EntityId>,
    pub consolidation: Option<ConsolidationId>,
    pub potential_trait: Option<Trait>,
    pub energy_level: u32,
    pub status: CellStatus,
    pub created_at: DateTime<Utc>,
}

impl NewCell {
    pub fn into_cell(self, key: CellKey) -> Cell {
        Cell {
            key,
            cell_id: self.cell_id,
            parent_entity_ids: self.parent_entity_ids,
            consolidation: self.consolidation,
            potential_trait: self.potential_trait,
            energy_level: self.energy_level,
            status: self.status,
            division_started_at: None,
            division_duration_ms: None,
            resulting_cell: None,
            created_at: self.created_at,
            last_updated: self.created_at,
        }
    }
}

impl Cell {
    /// Normal, above the energy threshold and attached to a consolidation
    pub fn can_divide(&self, min_energy: u32) -> bool {
        self.status == CellStatus::Normal
            && self.energy_level > min_energy
            && self.consolidation.is_some()
    }

    /// Halve this cell's energy and enter `dividing`
    ///
    /// Returns the child's share. Both halves are floored, so an odd level
    /// loses one unit and the total never grows.
    pub fn begin_division(
        &mut self,
        now: DateTime<Utc>,
        duration_ms: Millis,
    ) -> u32 {
        let half = self.energy_level / 2;
        self.energy_level = half;
        self.status = CellStatus::Dividing;
        self.division_started_at = Some(now);
        self.division_duration_ms = Some(duration_ms);
        self.last_updated = now;
        half
    }

    /// Leave `dividing` and regain energy up to `cap`
    pub fn finish_division(&mut self, regeneration: u32, cap: u32, now: DateTime<Utc>) {
        self.status = CellStatus::Normal;
        self.energy_level = self.energy_level.saturating_add(regeneration).min(cap);
        self.last_updated = now;
    }
}
