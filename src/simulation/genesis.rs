//! Seeding an empty store
//!
//! Creates origin cell 0 inside consolidation 0 and, for demonstration runs,
//! a handful of free first-generation entities. Safe to call on every start.

use tracing::info;

use crate::core::error::Result;
use crate::core::types::ConsolidationId;
use crate::records::{CellStatus, Consolidation, NewCell};
use crate::simulation::engine::Engine;
use crate::simulation::probability::pick_trait;

const ORIGIN_ENERGY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenesisReport {
    pub origin_created: bool,
    pub entities_created: u32,
}

impl Engine {
    /// Seed the origin consolidation if none exists, then add `entities`
    /// free entities after the highest existing id
    pub async fn seed_origin(&self, entities: u32) -> Result<GenesisReport> {
        let mut report = GenesisReport::default();

        if self.store.max_consolidation_id().await?.is_none() {
            let now = self.now();
            let mut cell = self
                .store
                .insert_cell(NewCell {
                    cell_id: 0,
                    parent_entity_ids: Vec::new(),
                    consolidation: None,
                    potential_trait: None,
                    energy_level: ORIGIN_ENERGY,
                    status: CellStatus::Normal,
                    created_at: now,
                })
                .await?;

            let origin = ConsolidationId(0);
            self.store
                .insert_consolidation(Consolidation::new(origin, cell.key, now))
                .await?;
            cell.consolidation = Some(origin);
            self.store.save_cell(&cell).await?;

            info!(cell = %cell.key, consolidation = %origin, "Created origin cell 0");
            report.origin_created = true;
        }

        for _ in 0..entities {
            let trait_kind = self.with_dice_mut(pick_trait);
            self.insert_next_entity(trait_kind).await?;
            report.entities_created += 1;
        }
        if entities > 0 {
            info!(count = entities, "Seeded free entities");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::records::ConsolidationState;
    use crate::store::{EntityQuery, MemoryStore, RecordStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_seeds_origin_once() {
        let engine = Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default());

        let first = engine.seed_origin(0).await.unwrap();
        assert!(first.origin_created);
        let second = engine.seed_origin(0).await.unwrap();
        assert!(!second.origin_created);

        let store = engine.store();
        let origin = store.consolidation(ConsolidationId(0)).await.unwrap().unwrap();
        assert_eq!(origin.state, ConsolidationState::Transparent);
        assert_eq!(origin.size(), 1);

        let cell = store.cell(origin.origin_cell).await.unwrap().unwrap();
        assert_eq!(cell.cell_id, 0);
        assert_eq!(cell.energy_level, 100);
        assert_eq!(cell.status, CellStatus::Normal);
        assert!(cell.parent_entity_ids.is_empty());
        assert_eq!(cell.consolidation, Some(ConsolidationId(0)));
        assert_eq!(store.count_entities(EntityQuery::default()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_entities_continue_after_existing_ids() {
        let engine = Engine::new(Arc::new(MemoryStore::new()), EngineConfig::default());
        engine.seed_origin(2).await.unwrap();
        let report = engine.seed_origin(3).await.unwrap();
        assert_eq!(report.entities_created, 3);

        let free = engine
            .store()
            .find_entities(EntityQuery::free(), 10)
            .await
            .unwrap();
        let ids: Vec<_> = free.iter().map(|e| e.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
