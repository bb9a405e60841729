//! Bond subsystem
//!
//! Pairs two free entities, then after the bond's duration turns the pair
//! into a new origin cell inside a new consolidation and frees them again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::core::error::Result;
use crate::core::types::{BondId, CellKey, ConsolidationId, EntityId, Millis};
use crate::records::{CellStatus, Entity, NewBond, NewCell};
use crate::simulation::engine::Engine;
use crate::simulation::probability::{effective_probability, pick_pair, pick_trait, roll};
use crate::store::EntityQuery;

/// What one bond-generation pass did
#[derive(Debug, Clone, PartialEq)]
pub enum BondOutcome {
    /// Fewer than two free entities
    NotEnoughEntities { available: usize },
    RollFailed { chance: f64 },
    /// Pair selection kept landing on the same entity
    NoDistinctPair,
    Formed {
        bond: BondId,
        entity_a: EntityId,
        entity_b: EntityId,
        duration_ms: Millis,
        chance: f64,
    },
}

/// Records produced when a bond matures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BondCompletion {
    pub bond: BondId,
    pub cell: CellKey,
    pub consolidation: ConsolidationId,
}

impl Engine {
    /// Try to pair two free entities and schedule the bond's completion
    pub async fn generate_bonds(self: &Arc<Self>) -> Result<BondOutcome> {
        let cfg = &self.config.bonds;

        let candidates = self
            .store
            .find_entities(EntityQuery::free(), cfg.candidate_limit)
            .await?;
        if candidates.len() < 2 {
            info!(
                available = candidates.len(),
                "Not enough entities available to form bonds"
            );
            return Ok(BondOutcome::NotEnoughEntities {
                available: candidates.len(),
            });
        }

        let multiplier = self.current_multiplier().await?;
        let chance = effective_probability(cfg.base_chance, multiplier, cfg.chance_cap);

        if !self.with_dice_mut(|dice| roll(dice, chance)) {
            debug!(chance, "Bond roll failed");
            return Ok(BondOutcome::RollFailed { chance });
        }

        let Some((i, j)) = self.with_dice_mut(|dice| pick_pair(dice, candidates.len())) else {
            debug!("No distinct pair of entities drawn");
            return Ok(BondOutcome::NoDistinctPair);
        };
        let duration_ms =
            self.with_dice_mut(|dice| dice.range_u64(cfg.min_duration_ms, cfg.max_duration_ms));

        let mut entity_a = candidates[i].clone();
        let mut entity_b = candidates[j].clone();

        let bond = self
            .store
            .insert_bond(NewBond {
                entity_a: entity_a.id,
                entity_b: entity_b.id,
                start_time: self.now(),
                duration_ms,
            })
            .await?;

        entity_a.currently_bonding_with = Some(entity_b.id);
        entity_b.currently_bonding_with = Some(entity_a.id);
        self.store.save_entity(&entity_a).await?;
        self.store.save_entity(&entity_b).await?;

        info!(
            bond_id = %bond.id,
            entity_a = %entity_a.id,
            entity_b = %entity_b.id,
            chance = %format!("{:.1}%", chance * 100.0),
            multiplier = %format!("{:.2}", multiplier),
            "Bond formed"
        );

        let (a, b) = (entity_a.id, entity_b.id);
        self.schedule_completion(bond.id, a, b, duration_ms);

        Ok(BondOutcome::Formed {
            bond: bond.id,
            entity_a: a,
            entity_b: b,
            duration_ms,
            chance,
        })
    }

    pub(crate) fn schedule_completion(
        self: &Arc<Self>,
        bond_id: BondId,
        entity_a: EntityId,
        entity_b: EntityId,
        delay_ms: Millis,
    ) {
        let engine = Arc::clone(self);
        self.deferred.schedule(
            "complete_bond",
            Duration::from_millis(delay_ms),
            async move {
                if let Err(e) = engine.complete_bond(bond_id, entity_a, entity_b).await {
                    error!(bond_id = %bond_id, error = %e, "Error completing bond");
                }
            },
        );
    }

    /// Mature a bond into a new cell and consolidation
    ///
    /// A no-op returning `None` if the bond is missing or already completed.
    /// The writes are sequential and not atomic as a group.
    pub async fn complete_bond(
        &self,
        bond_id: BondId,
        entity_a: EntityId,
        entity_b: EntityId,
    ) -> Result<Option<BondCompletion>> {
        let Some(mut bond) = self.store.bond(bond_id).await? else {
            debug!(bond_id = %bond_id, "Bond completion skipped: bond not found");
            return Ok(None);
        };
        if !bond.is_active() {
            debug!(bond_id = %bond_id, "Bond completion skipped: already completed");
            return Ok(None);
        }

        let cfg = &self.config.bonds;
        let (potential_trait, energy_level) = self.with_dice_mut(|dice| {
            (
                pick_trait(dice),
                dice.range_u64(cfg.min_cell_energy as u64, cfg.max_cell_energy as u64) as u32,
            )
        });

        let now = self.now();
        let mut cell = self
            .store
            .insert_cell(NewCell {
                cell_id: 0,
                parent_entity_ids: vec![entity_a, entity_b],
                consolidation: None,
                potential_trait: Some(potential_trait),
                energy_level,
                status: CellStatus::Forming,
                created_at: now,
            })
            .await?;

        let consolidation_id = self.insert_next_consolidation(cell.key).await?;

        cell.consolidation = Some(consolidation_id);
        cell.status = CellStatus::Normal;
        cell.last_updated = now;
        self.store.save_cell(&cell).await?;

        bond.complete(cell.key);
        self.store.save_bond(&bond).await?;

        self.store
            .update_entities(&[entity_a, entity_b], &|entity: &mut Entity| {
                if let Some(partner) = bond.partner_of(entity.id) {
                    entity.finish_bond(partner, 1);
                }
            })
            .await?;

        info!(
            bond_id = %bond_id,
            cell = %cell.key,
            consolidation = %consolidation_id,
            entity_a = %entity_a,
            entity_b = %entity_b,
            "Bond completed: created cell 0 of a new consolidation"
        );

        Ok(Some(BondCompletion {
            bond: bond_id,
            cell: cell.key,
            consolidation: consolidation_id,
        }))
    }
}
