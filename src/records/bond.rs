//! Bonds - timed pairings that mature into a cell and consolidation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{BondId, CellKey, EntityId, Millis};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub id: BondId,
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    pub start_time: DateTime<Utc>,
    pub duration_ms: Millis,
    pub status: BondStatus,
    /// Set iff the bond is completed
    pub resulting_cell: Option<CellKey>,
}

/// A bond before the store has assigned its id
#[derive(Debug, Clone, PartialEq)]
pub struct NewBond {
    pub entity_a: EntityId,
    pub entity_b: EntityId,
    pub start_time: DateTime<Utc>,
    pub duration_ms: Millis,
}

impl NewBond {
    pub fn into_bond(self, id: BondId) -> Bond {
        Bond {
            id,
            entity_a: self.entity_a,
            entity_b: self.entity_b,
            start_time: self.start_time,
            duration_ms: self.duration_ms,
            status: BondStatus::Active,
            resulting_cell: None,
        }
    }
}

impl Bond {
    pub fn is_active(&self) -> bool {
        self.status == BondStatus::Active
    }

    /// Active -> completed, once. Returns false if already completed.
    pub fn complete(&mut self, cell: CellKey) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = BondStatus::Completed;
        self.resulting_cell = Some(cell);
        true
    }

    /// The other side of the bond, if `id` is one of its members
    pub fn partner_of(&self, id: EntityId) -> Option<EntityId> {
        if id == self.entity_a {
            Some(self.entity_b)
        } else if id == self.entity_b {
            Some(self.entity_a)
        } else {
            None
        }
    }
}
