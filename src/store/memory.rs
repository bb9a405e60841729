//! In-memory record store
//!
//! Five ordered tables behind one async lock. Every trait call takes the lock
//! once, so each call is atomic on its own and nothing more.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::error::StoreError;
use crate::core::types::{BondId, CellKey, ConsolidationId, EntityId};
use crate::records::{
    Bond, Cell, Consolidation, ConsolidationState, Entity, Multiplier, NewBond, NewCell,
};
use crate::store::{CellQuery, EntityQuery, RecordStore, StoreResult};

/// Serializable copy of every collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreDump {
    pub entities: Vec<Entity>,
    pub bonds: Vec<Bond>,
    pub cells: Vec<Cell>,
    pub consolidations: Vec<Consolidation>,
    pub multipliers: Vec<Multiplier>,
}

#[derive(Debug)]
struct Tables {
    entities: BTreeMap<EntityId, Entity>,
    bonds: BTreeMap<BondId, Bond>,
    cells: BTreeMap<CellKey, Cell>,
    consolidations: BTreeMap<ConsolidationId, Consolidation>,
    /// Insertion order
    multipliers: Vec<Multiplier>,
    next_bond: BondId,
    next_cell: CellKey,
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
            bonds: BTreeMap::new(),
            cells: BTreeMap::new(),
            consolidations: BTreeMap::new(),
            multipliers: Vec::new(),
            next_bond: BondId(1),
            next_cell: CellKey(1),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from a dump, continuing key allocation after it
    pub fn from_dump(dump: StoreDump) -> Self {
        let mut tables = Tables::default();

        for entity in dump.entities {
            tables.entities.insert(entity.id, entity);
        }
        for bond in dump.bonds {
            tables.bonds.insert(bond.id, bond);
        }
        for cell in dump.cells {
            tables.cells.insert(cell.key, cell);
        }
        for consolidation in dump.consolidations {
            tables.consolidations.insert(consolidation.id, consolidation);
        }
        tables.multipliers = dump.multipliers;

        if let Some(last) = tables.bonds.keys().next_back() {
            tables.next_bond = last.next();
        }
        if let Some(last) = tables.cells.keys().next_back() {
            tables.next_cell = last.next();
        }

        Self {
            tables: RwLock::new(tables),
            offline: AtomicBool::new(false),
        }
    }

    pub async fn dump(&self) -> StoreDump {
        let tables = self.tables.read().await;
        StoreDump {
            entities: tables.entities.values().cloned().collect(),
            bonds: tables.bonds.values().cloned().collect(),
            cells: tables.cells.values().cloned().collect(),
            consolidations: tables.consolidations.values().cloned().collect(),
            multipliers: tables.multipliers.clone(),
        }
    }

    /// Simulate an outage: every call fails with `Unavailable` while set
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn entity(&self, id: EntityId) -> StoreResult<Option<Entity>> {
        self.check()?;
        Ok(self.tables.read().await.entities.get(&id).cloned())
    }

    async fn find_entities(&self, query: EntityQuery, limit: usize) -> StoreResult<Vec<Entity>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .entities
            .values()
            .filter(|e| query.matches(e))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_entities(&self, query: EntityQuery) -> StoreResult<u64> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.entities.values().filter(|e| query.matches(e)).count() as u64)
    }

    async fn max_entity_id(&self) -> StoreResult<Option<EntityId>> {
        self.check()?;
        Ok(self.tables.read().await.entities.keys().next_back().copied())
    }

    async fn insert_entity(&self, entity: Entity) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.entities.contains_key(&entity.id) {
            return Err(StoreError::DuplicateKey {
                collection: "entities",
                key: entity.id.0,
            });
        }
        tables.entities.insert(entity.id, entity);
        Ok(())
    }

    async fn save_entity(&self, entity: &Entity) -> StoreResult<()> {
        self.check()?;
        self.tables
            .write()
            .await
            .entities
            .insert(entity.id, entity.clone());
        Ok(())
    }

    async fn update_entities(
        &self,
        ids: &[EntityId],
        patch: &(dyn for<'e> Fn(&'e mut Entity) + Send + Sync),
    ) -> StoreResult<usize> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(entity) = tables.entities.get_mut(id) {
                patch(entity);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn insert_bond(&self, bond: NewBond) -> StoreResult<Bond> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let id = tables.next_bond;
        tables.next_bond = id.next();
        let bond = bond.into_bond(id);
        tables.bonds.insert(id, bond.clone());
        Ok(bond)
    }

    async fn bond(&self, id: BondId) -> StoreResult<Option<Bond>> {
        self.check()?;
        Ok(self.tables.read().await.bonds.get(&id).cloned())
    }

    async fn save_bond(&self, bond: &Bond) -> StoreResult<()> {
        self.check()?;
        self.tables.write().await.bonds.insert(bond.id, bond.clone());
        Ok(())
    }

    async fn insert_cell(&self, cell: NewCell) -> StoreResult<Cell> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let key = tables.next_cell;
        tables.next_cell = key.next();
        let cell = cell.into_cell(key);
        tables.cells.insert(key, cell.clone());
        Ok(cell)
    }

    async fn cell(&self, key: CellKey) -> StoreResult<Option<Cell>> {
        self.check()?;
        Ok(self.tables.read().await.cells.get(&key).cloned())
    }

    async fn find_cells(&self, query: CellQuery, limit: usize) -> StoreResult<Vec<Cell>> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .cells
            .values()
            .filter(|c| query.matches(c))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn max_cell_id_in(&self, consolidation: ConsolidationId) -> StoreResult<Option<u32>> {
        self.check()?;
        let query = CellQuery::in_consolidation(consolidation);
        let tables = self.tables.read().await;
        Ok(tables
            .cells
            .values()
            .filter(|c| query.matches(c))
            .map(|c| c.cell_id)
            .max())
    }

    async fn save_cell(&self, cell: &Cell) -> StoreResult<()> {
        self.check()?;
        self.tables.write().await.cells.insert(cell.key, cell.clone());
        Ok(())
    }

    async fn consolidation(&self, id: ConsolidationId) -> StoreResult<Option<Consolidation>> {
        self.check()?;
        Ok(self.tables.read().await.consolidations.get(&id).cloned())
    }

    async fn max_consolidation_id(&self) -> StoreResult<Option<ConsolidationId>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .consolidations
            .keys()
            .next_back()
            .copied())
    }

    async fn insert_consolidation(&self, consolidation: Consolidation) -> StoreResult<()> {
        self.check()?;
        let mut tables = self.tables.write().await;
        if tables.consolidations.contains_key(&consolidation.id) {
            return Err(StoreError::DuplicateKey {
                collection: "consolidations",
                key: consolidation.id.0,
            });
        }
        tables.consolidations.insert(consolidation.id, consolidation);
        Ok(())
    }

    async fn advance_consolidation(
        &self,
        id: ConsolidationId,
        next: ConsolidationState,
        evolved_to: Option<EntityId>,
    ) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let Some(consolidation) = tables.consolidations.get_mut(&id) else {
            return Ok(false);
        };
        if consolidation.advance(next).is_err() {
            return Ok(false);
        }
        if evolved_to.is_some() {
            consolidation.evolved_to_entity = evolved_to;
        }
        Ok(true)
    }

    async fn append_cell(&self, id: ConsolidationId, cell: CellKey) -> StoreResult<bool> {
        self.check()?;
        let mut tables = self.tables.write().await;
        match tables.consolidations.get_mut(&id) {
            Some(consolidation) => {
                consolidation.cell_ids.push(cell);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_multiplier(&self, multiplier: Multiplier) -> StoreResult<()> {
        self.check()?;
        self.tables.write().await.multipliers.push(multiplier);
        Ok(())
    }

    async fn latest_multiplier(&self) -> StoreResult<Option<Multiplier>> {
        self.check()?;
        let tables = self.tables.read().await;
        // max_by_key keeps the last of equal timestamps, i.e. the newest insert
        Ok(tables
            .multipliers
            .iter()
            .max_by_key(|m| m.timestamp)
            .cloned())
    }

    async fn all_entities(&self) -> StoreResult<Vec<Entity>> {
        self.check()?;
        Ok(self.tables.read().await.entities.values().cloned().collect())
    }

    async fn all_bonds(&self) -> StoreResult<Vec<Bond>> {
        self.check()?;
        Ok(self.tables.read().await.bonds.values().cloned().collect())
    }

    async fn all_cells(&self) -> StoreResult<Vec<Cell>> {
        self.check()?;
        Ok(self.tables.read().await.cells.values().cloned().collect())
    }

    async fn all_consolidations(&self) -> StoreResult<Vec<Consolidation>> {
        self.check()?;
        Ok(self
            .tables
            .read()
            .await
            .consolidations
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Trait;
    use crate::records::CellStatus;
    use chrono::{Duration, Utc};

    fn new_cell(cell_id: u32, consolidation: Option<ConsolidationId>, energy: u32) -> NewCell {
        NewCell {
            cell_id,
            parent_entity_ids: Vec::new(),
            consolidation,
            potential_trait: Some(Trait::Speed),
            energy_level: energy,
            status: CellStatus::Normal,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_entity_rejects_duplicate_id() {
        let store = MemoryStore::new();
        let entity = Entity::new(EntityId(1), Trait::Agility, Utc::now());
        store.insert_entity(entity.clone()).await.unwrap();

        let err = store.insert_entity(entity).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::DuplicateKey {
                collection: "entities",
                key: 1
            }
        );
    }

    #[tokio::test]
    async fn test_find_free_entities_respects_limit_and_filter() {
        let store = MemoryStore::new();
        for id in 1..=5 {
            let mut entity = Entity::new(EntityId(id), Trait::Energy, Utc::now());
            if id == 2 {
                entity.currently_bonding_with = Some(EntityId(9));
            }
            store.insert_entity(entity).await.unwrap();
        }

        let free = store.find_entities(EntityQuery::free(), 3).await.unwrap();
        let ids: Vec<_> = free.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 3, 4]);
        assert_eq!(store.count_entities(EntityQuery::default()).await.unwrap(), 5);
        assert_eq!(store.count_entities(EntityQuery::free()).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_dividable_query_and_per_consolidation_serial() {
        let store = MemoryStore::new();
        let c1 = Some(ConsolidationId(1));
        store.insert_cell(new_cell(0, c1, 100)).await.unwrap();
        store.insert_cell(new_cell(4, c1, 40)).await.unwrap();
        store.insert_cell(new_cell(0, None, 90)).await.unwrap();
        store.insert_cell(new_cell(0, Some(ConsolidationId(2)), 60)).await.unwrap();

        let dividable = store.find_cells(CellQuery::dividable(40), 15).await.unwrap();
        assert_eq!(dividable.len(), 2);
        assert!(dividable.iter().all(|c| c.energy_level > 40 && c.consolidation.is_some()));

        assert_eq!(store.max_cell_id_in(ConsolidationId(1)).await.unwrap(), Some(4));
        assert_eq!(store.max_cell_id_in(ConsolidationId(3)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_multiplier_by_timestamp() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for (offset, value) in [(0, 1.2), (60, 1.8), (30, 0.7)] {
            store
                .insert_multiplier(Multiplier {
                    timestamp: now + Duration::seconds(offset),
                    market_cap: 500_000,
                    multiplier: value,
                })
                .await
                .unwrap();
        }
        let latest = store.latest_multiplier().await.unwrap().unwrap();
        assert_eq!(latest.multiplier, 1.8);
    }

    #[tokio::test]
    async fn test_offline_store_fails_transiently() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.count_entities(EntityQuery::default()).await,
            Err(StoreError::Unavailable(_))
        ));
        store.set_offline(false);
        assert_eq!(store.count_entities(EntityQuery::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dump_round_trip_continues_keys() {
        let store = MemoryStore::new();
        store.insert_cell(new_cell(0, None, 50)).await.unwrap();
        store.insert_cell(new_cell(1, None, 50)).await.unwrap();

        let restored = MemoryStore::from_dump(store.dump().await);
        let next = restored.insert_cell(new_cell(2, None, 50)).await.unwrap();
        assert_eq!(next.key, CellKey(3));
    }

    #[tokio::test]
    async fn test_advance_consolidation_keeps_appended_cells() {
        let store = MemoryStore::new();
        let mut consolidation = Consolidation::new(ConsolidationId(4), CellKey(1), Utc::now());
        consolidation.advance(ConsolidationState::Dense).unwrap();
        store.insert_consolidation(consolidation).await.unwrap();

        // A division lands between the read and the transition
        store.append_cell(ConsolidationId(4), CellKey(2)).await.unwrap();
        let advanced = store
            .advance_consolidation(
                ConsolidationId(4),
                ConsolidationState::EntityForming,
                Some(EntityId(7)),
            )
            .await
            .unwrap();
        assert!(advanced);

        let stored = store.consolidation(ConsolidationId(4)).await.unwrap().unwrap();
        assert_eq!(stored.cell_ids, vec![CellKey(1), CellKey(2)]);
        assert_eq!(stored.state, ConsolidationState::EntityForming);
        assert_eq!(stored.evolved_to_entity, Some(EntityId(7)));
    }

    #[tokio::test]
    async fn test_advance_consolidation_refuses_skips_and_repeats() {
        let store = MemoryStore::new();
        store
            .insert_consolidation(Consolidation::new(ConsolidationId(1), CellKey(1), Utc::now()))
            .await
            .unwrap();

        let skip = store
            .advance_consolidation(ConsolidationId(1), ConsolidationState::EntityForming, None)
            .await
            .unwrap();
        assert!(!skip);
        let dense = store
            .advance_consolidation(ConsolidationId(1), ConsolidationState::Dense, None)
            .await
            .unwrap();
        assert!(dense);
        let again = store
            .advance_consolidation(ConsolidationId(1), ConsolidationState::Dense, None)
            .await
            .unwrap();
        assert!(!again);
        let missing = store
            .advance_consolidation(ConsolidationId(2), ConsolidationState::Dense, None)
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_update_entities_patches_existing_only() {
        let store = MemoryStore::new();
        for id in [1, 2] {
            let mut entity = Entity::new(EntityId(id), Trait::Wisdom, Utc::now());
            entity.currently_bonding_with = Some(EntityId(3 - id));
            store.insert_entity(entity).await.unwrap();
        }

        let updated = store
            .update_entities(&[EntityId(1), EntityId(2), EntityId(5)], &|entity: &mut Entity| {
                entity.currently_bonding_with = None;
            })
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(store.count_entities(EntityQuery::free()).await.unwrap(), 2);
    }
}
