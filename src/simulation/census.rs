//! Derived counts over every collection

use serde::Serialize;

use crate::core::error::Result;
use crate::records::{
    multiplier_value, Bond, Cell, CellStatus, Consolidation, ConsolidationState, Entity,
    Multiplier,
};
use crate::simulation::engine::Engine;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Census {
    pub entities: usize,
    pub free_entities: usize,
    pub bonds: usize,
    pub active_bonds: usize,
    pub cells: usize,
    pub forming_cells: usize,
    pub dividing_cells: usize,
    pub consolidations: usize,
    pub transparent_consolidations: usize,
    pub dense_consolidations: usize,
    pub evolved_consolidations: usize,
    pub multiplier: f64,
    pub market_cap: u64,
}

impl Census {
    pub fn from_records(
        entities: &[Entity],
        bonds: &[Bond],
        cells: &[Cell],
        consolidations: &[Consolidation],
        latest: Option<&Multiplier>,
    ) -> Self {
        let cells_in = |status: CellStatus| cells.iter().filter(|c| c.status == status).count();
        let consolidations_in =
            |state: ConsolidationState| consolidations.iter().filter(|c| c.state == state).count();

        Self {
            entities: entities.len(),
            free_entities: entities.iter().filter(|e| e.is_free()).count(),
            bonds: bonds.len(),
            active_bonds: bonds.iter().filter(|b| b.is_active()).count(),
            cells: cells.len(),
            forming_cells: cells_in(CellStatus::Forming),
            dividing_cells: cells_in(CellStatus::Dividing),
            consolidations: consolidations.len(),
            transparent_consolidations: consolidations_in(ConsolidationState::Transparent),
            dense_consolidations: consolidations_in(ConsolidationState::Dense),
            evolved_consolidations: consolidations_in(ConsolidationState::EntityForming),
            multiplier: multiplier_value(latest),
            market_cap: latest.map_or(0, |m| m.market_cap),
        }
    }
}

impl Engine {
    pub async fn census(&self) -> Result<Census> {
        let entities = self.store.all_entities().await?;
        let bonds = self.store.all_bonds().await?;
        let cells = self.store.all_cells().await?;
        let consolidations = self.store.all_consolidations().await?;
        let latest = self.store.latest_multiplier().await?;
        Ok(Census::from_records(
            &entities,
            &bonds,
            &cells,
            &consolidations,
            latest.as_ref(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{BondId, CellKey, ConsolidationId, EntityId, Trait};
    use crate::records::{NewBond, NewCell};
    use chrono::Utc;

    #[test]
    fn test_counts_by_state() {
        let now = Utc::now();
        let mut bonded = Entity::new(EntityId(1), Trait::Speed, now);
        bonded.currently_bonding_with = Some(EntityId(2));
        let entities = vec![bonded, Entity::new(EntityId(3), Trait::Wisdom, now)];

        let bond = |id| {
            NewBond {
                entity_a: EntityId(1),
                entity_b: EntityId(2),
                start_time: now,
                duration_ms: 60_000,
            }
            .into_bond(BondId(id))
        };
        let mut done = bond(2);
        done.complete(CellKey(1));
        let bonds = vec![bond(1), done];

        let cell = |key, status| {
            NewCell {
                cell_id: 0,
                parent_entity_ids: Vec::new(),
                consolidation: None,
                potential_trait: None,
                energy_level: 50,
                status,
                created_at: now,
            }
            .into_cell(CellKey(key))
        };
        let cells = vec![
            cell(1, CellStatus::Normal),
            cell(2, CellStatus::Forming),
            cell(3, CellStatus::Dividing),
            cell(4, CellStatus::Dividing),
        ];

        let mut dense = Consolidation::new(ConsolidationId(2), CellKey(2), now);
        dense.advance(ConsolidationState::Dense).unwrap();
        let consolidations = vec![Consolidation::new(ConsolidationId(1), CellKey(1), now), dense];

        let census = Census::from_records(&entities, &bonds, &cells, &consolidations, None);
        assert_eq!(census.entities, 2);
        assert_eq!(census.free_entities, 1);
        assert_eq!(census.active_bonds, 1);
        assert_eq!(census.forming_cells, 1);
        assert_eq!(census.dividing_cells, 2);
        assert_eq!(census.transparent_consolidations, 1);
        assert_eq!(census.dense_consolidations, 1);
        assert_eq!(census.multiplier, 1.0);
        assert_eq!(census.market_cap, 0);
    }
}
