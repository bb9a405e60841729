//! Entities - the only records that bond, and the output of evolution

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{EntityId, Trait};

/// One finished pairing in an entity's history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BondRecord {
    pub partner: EntityId,
    pub cells_produced: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "trait")]
    pub trait_kind: Trait,
    /// Partner of the active bond; symmetric while the bond lasts
    pub currently_bonding_with: Option<EntityId>,
    /// Starts at 1 for evolved entities
    pub generation: u32,
    pub bond_history: Vec<BondRecord>,
    pub created_at: DateTime<Utc>,
}

impl Entity {
    /// A first-generation entity with no bonds
    pub fn new(id: EntityId, trait_kind: Trait, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            trait_kind,
            currently_bonding_with: None,
            generation: 1,
            bond_history: Vec::new(),
            created_at,
        }
    }

    pub fn is_free(&self) -> bool {
        self.currently_bonding_with.is_none()
    }

    /// Clear the active partner and remember the finished bond
    pub fn finish_bond(&mut self, partner: EntityId, cells_produced: u32) {
        self.currently_bonding_with = None;
        self.bond_history.push(BondRecord {
            partner,
            cells_produced,
        });
    }
}
