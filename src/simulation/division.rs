//! Cell division
//!
//! Each pass scans a bounded set of eligible cells and rolls each one
//! independently. A dividing parent hands half its energy to a new sibling,
//! sits out a cooldown, then resets with some energy back. Every division
//! also gives the consolidation a chance to evolve.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::core::error::Result;
use crate::core::types::{CellKey, ConsolidationId, Millis};
use crate::records::{Cell, CellStatus, NewCell};
use crate::simulation::engine::Engine;
use crate::simulation::evolution::EvolutionCheck;
use crate::simulation::probability::{effective_probability, pick_trait, roll};
use crate::store::CellQuery;

#[derive(Debug, Clone, PartialEq)]
pub struct Division {
    pub parent: CellKey,
    pub child: CellKey,
    pub consolidation: ConsolidationId,
    /// Serial of the child within its consolidation
    pub child_cell_id: u32,
    pub parent_energy_before: u32,
    pub parent_energy_after: u32,
    pub child_energy: u32,
    pub boost: bool,
    /// None if the evolution check itself failed
    pub evolution: Option<EvolutionCheck>,
}

/// What one division pass did
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DivisionReport {
    pub chance: f64,
    pub candidates: usize,
    pub divisions: Vec<Division>,
}

impl Engine {
    /// Scan eligible cells and divide those whose roll succeeds
    pub async fn generate_cells(self: &Arc<Self>) -> Result<DivisionReport> {
        let cfg = &self.config.division;

        let multiplier = self.current_multiplier().await?;
        let chance = effective_probability(cfg.base_chance, multiplier, cfg.chance_cap);

        let candidates = self
            .store
            .find_cells(CellQuery::dividable(cfg.min_energy), cfg.candidate_limit)
            .await?;

        if !candidates.is_empty() {
            info!(
                candidates = candidates.len(),
                chance = %format!("{:.1}%", chance * 100.0),
                multiplier = %format!("{:.2}", multiplier),
                "Checking cells for division"
            );
        }

        let mut report = DivisionReport {
            chance,
            candidates: candidates.len(),
            divisions: Vec::new(),
        };

        for candidate in &candidates {
            if !self.with_dice_mut(|dice| roll(dice, chance)) {
                continue;
            }
            if let Some(division) = self.divide(candidate).await? {
                report.divisions.push(division);
            }
        }

        Ok(report)
    }

    async fn divide(self: &Arc<Self>, candidate: &Cell) -> Result<Option<Division>> {
        let cfg = &self.config.division;

        let Some(consolidation_id) = candidate.consolidation else {
            return Ok(None);
        };
        let Some(consolidation) = self.store.consolidation(consolidation_id).await? else {
            debug!(
                cell = %candidate.key,
                consolidation = %consolidation_id,
                "Division skipped: consolidation not found"
            );
            return Ok(None);
        };

        // The scan result may be stale by now
        let Some(mut parent) = self.store.cell(candidate.key).await? else {
            return Ok(None);
        };
        if !parent.can_divide(cfg.min_energy) {
            debug!(cell = %parent.key, "Division skipped: cell no longer eligible");
            return Ok(None);
        }

        let child_cell_id = self
            .store
            .max_cell_id_in(consolidation_id)
            .await?
            .map_or(1, |max| max + 1);

        let now = self.now();
        let parent_energy_before = parent.energy_level;
        let child_energy = parent.begin_division(now, cfg.reset_delay_ms);

        let potential_trait = self.with_dice_mut(pick_trait);
        let child = self
            .store
            .insert_cell(NewCell {
                cell_id: child_cell_id,
                parent_entity_ids: parent.parent_entity_ids.clone(),
                consolidation: Some(consolidation_id),
                potential_trait: Some(potential_trait),
                energy_level: child_energy,
                status: CellStatus::Normal,
                created_at: now,
            })
            .await?;

        parent.resulting_cell = Some(child.key);
        self.store.save_cell(&parent).await?;
        self.store.append_cell(consolidation_id, child.key).await?;

        self.schedule_reset(parent.key, cfg.reset_delay_ms);

        info!(
            parent = parent.cell_id,
            child = child_cell_id,
            consolidation = %consolidation.id,
            "Cell division"
        );

        let progress = self.division_progress().await?;
        let evolution = match self.check_evolution(consolidation_id, progress.boost).await {
            Ok(check) => Some(check),
            Err(e) => {
                error!(
                    consolidation = %consolidation_id,
                    error = %e,
                    "Error checking consolidation evolution"
                );
                None
            }
        };

        Ok(Some(Division {
            parent: parent.key,
            child: child.key,
            consolidation: consolidation_id,
            child_cell_id,
            parent_energy_before,
            parent_energy_after: parent.energy_level,
            child_energy,
            boost: progress.boost,
            evolution,
        }))
    }

    pub(crate) fn schedule_reset(self: &Arc<Self>, key: CellKey, delay_ms: Millis) {
        let engine = Arc::clone(self);
        self.deferred.schedule(
            "reset_division",
            Duration::from_millis(delay_ms),
            async move {
                if let Err(e) = engine.reset_division(key).await {
                    error!(cell = %key, error = %e, "Error resetting divided cell");
                }
            },
        );
    }

    /// End a parent's cooldown: back to normal with regenerated energy
    ///
    /// Returns false if the cell is gone or no longer dividing.
    pub async fn reset_division(&self, key: CellKey) -> Result<bool> {
        let cfg = &self.config.division;
        let Some(mut cell) = self.store.cell(key).await? else {
            return Ok(false);
        };
        if cell.status != CellStatus::Dividing {
            debug!(cell = %key, "Division reset skipped: cell not dividing");
            return Ok(false);
        }
        cell.finish_division(cfg.regeneration, cfg.energy_cap, self.now());
        self.store.save_cell(&cell).await?;
        Ok(true)
    }
}
