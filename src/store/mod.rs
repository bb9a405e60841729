//! Record store contract
//!
//! The engine reads and writes every record through this trait. Each call is
//! a suspension point; implementations guarantee single-record atomicity
//! only. Nothing here spans records, so multi-record transitions may be
//! observed half-applied.

pub mod memory;
pub mod snapshot;

use async_trait::async_trait;

use crate::core::error::StoreError;
use crate::core::types::{BondId, CellKey, ConsolidationId, EntityId};
use crate::records::{
    Bond, Cell, CellStatus, Consolidation, ConsolidationState, Entity, Multiplier, NewBond, NewCell,
};

pub use memory::{MemoryStore, StoreDump};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Filter for entity lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityQuery {
    /// Only entities with no active bond partner
    pub free_only: bool,
}

impl EntityQuery {
    pub fn free() -> Self {
        Self { free_only: true }
    }

    pub fn matches(&self, entity: &Entity) -> bool {
        !self.free_only || entity.is_free()
    }
}

/// Filter for cell lookups
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CellQuery {
    pub status: Option<CellStatus>,
    /// Energy strictly above this value
    pub energy_above: Option<u32>,
    /// Only cells already linked to a consolidation
    pub attached_only: bool,
    pub consolidation: Option<ConsolidationId>,
}

impl CellQuery {
    /// Cells that may divide this cycle
    pub fn dividable(min_energy: u32) -> Self {
        Self {
            status: Some(CellStatus::Normal),
            energy_above: Some(min_energy),
            attached_only: true,
            consolidation: None,
        }
    }

    pub fn in_consolidation(id: ConsolidationId) -> Self {
        Self {
            consolidation: Some(id),
            ..Self::default()
        }
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        self.status.map_or(true, |s| cell.status == s)
            && self.energy_above.map_or(true, |e| cell.energy_level > e)
            && (!self.attached_only || cell.consolidation.is_some())
            && self
                .consolidation
                .map_or(true, |c| cell.consolidation == Some(c))
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    // === ENTITIES ===

    async fn entity(&self, id: EntityId) -> StoreResult<Option<Entity>>;

    /// Matching entities in ascending id order, at most `limit`
    async fn find_entities(&self, query: EntityQuery, limit: usize) -> StoreResult<Vec<Entity>>;

    async fn count_entities(&self, query: EntityQuery) -> StoreResult<u64>;

    async fn max_entity_id(&self) -> StoreResult<Option<EntityId>>;

    /// Fails with `DuplicateKey` if the id is taken
    async fn insert_entity(&self, entity: Entity) -> StoreResult<()>;

    async fn save_entity(&self, entity: &Entity) -> StoreResult<()>;

    /// Apply `patch` to each listed entity that exists, each under the
    /// store's lock; returns how many were updated
    async fn update_entities(
        &self,
        ids: &[EntityId],
        patch: &(dyn for<'e> Fn(&'e mut Entity) + Send + Sync),
    ) -> StoreResult<usize>;

    // === BONDS ===

    async fn insert_bond(&self, bond: NewBond) -> StoreResult<Bond>;

    async fn bond(&self, id: BondId) -> StoreResult<Option<Bond>>;

    async fn save_bond(&self, bond: &Bond) -> StoreResult<()>;

    // === CELLS ===

    async fn insert_cell(&self, cell: NewCell) -> StoreResult<Cell>;

    async fn cell(&self, key: CellKey) -> StoreResult<Option<Cell>>;

    /// Matching cells in ascending key order, at most `limit`
    async fn find_cells(&self, query: CellQuery, limit: usize) -> StoreResult<Vec<Cell>>;

    /// Highest per-consolidation serial in use, if the consolidation has cells
    async fn max_cell_id_in(&self, consolidation: ConsolidationId) -> StoreResult<Option<u32>>;

    async fn save_cell(&self, cell: &Cell) -> StoreResult<()>;

    // === CONSOLIDATIONS ===

    async fn consolidation(&self, id: ConsolidationId) -> StoreResult<Option<Consolidation>>;

    async fn max_consolidation_id(&self) -> StoreResult<Option<ConsolidationId>>;

    /// Fails with `DuplicateKey` if the id is taken
    async fn insert_consolidation(&self, consolidation: Consolidation) -> StoreResult<()>;

    /// Move a consolidation to `next` if that is its immediate successor,
    /// recording `evolved_to` alongside; no other field is written
    ///
    /// False if the consolidation is missing or not in the preceding state.
    async fn advance_consolidation(
        &self,
        id: ConsolidationId,
        next: ConsolidationState,
        evolved_to: Option<EntityId>,
    ) -> StoreResult<bool>;

    /// Push a cell onto the consolidation's list; false if it doesn't exist
    async fn append_cell(&self, id: ConsolidationId, cell: CellKey) -> StoreResult<bool>;

    // === MULTIPLIERS ===

    async fn insert_multiplier(&self, multiplier: Multiplier) -> StoreResult<()>;

    /// Most recent record by timestamp
    async fn latest_multiplier(&self) -> StoreResult<Option<Multiplier>>;

    // === BULK READS ===

    async fn all_entities(&self) -> StoreResult<Vec<Entity>>;
    async fn all_bonds(&self) -> StoreResult<Vec<Bond>>;
    async fn all_cells(&self) -> StoreResult<Vec<Cell>>;
    async fn all_consolidations(&self) -> StoreResult<Vec<Consolidation>>;
}
