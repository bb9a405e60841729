//! Consolidations - ordered clusters of cells that may evolve into entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{GenesisError, Result};
use crate::core::types::{CellKey, ConsolidationId, EntityId};

/// Lifecycle of a consolidation; only ever moves forward one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationState {
    Transparent,
    Dense,
    EntityForming,
}

impl ConsolidationState {
    pub fn successor(self) -> Option<Self> {
        match self {
            ConsolidationState::Transparent => Some(ConsolidationState::Dense),
            ConsolidationState::Dense => Some(ConsolidationState::EntityForming),
            ConsolidationState::EntityForming => None,
        }
    }
}

impl fmt::Display for ConsolidationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConsolidationState::Transparent => "transparent",
            ConsolidationState::Dense => "dense",
            ConsolidationState::EntityForming => "entity_forming",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consolidation {
    pub id: ConsolidationId,
    pub origin_cell: CellKey,
    /// Append-only, in creation order
    pub cell_ids: Vec<CellKey>,
    pub state: ConsolidationState,
    /// Set iff state is `EntityForming`
    pub evolved_to_entity: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

impl Consolidation {
    /// A transparent consolidation holding only its origin cell
    pub fn new(id: ConsolidationId, origin_cell: CellKey, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            origin_cell,
            cell_ids: vec![origin_cell],
            state: ConsolidationState::Transparent,
            evolved_to_entity: None,
            created_at,
        }
    }

    pub fn size(&self) -> usize {
        self.cell_ids.len()
    }

    /// Large enough and still transparent
    pub fn can_evolve(&self, min_cells: usize) -> bool {
        self.size() >= min_cells && self.state == ConsolidationState::Transparent
    }

    /// Step the state forward; anything but the immediate successor is refused
    pub fn advance(&mut self, next: ConsolidationState) -> Result<()> {
        if self.state.successor() != Some(next) {
            return Err(GenesisError::StateRegression {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        Ok(())
    }
}
