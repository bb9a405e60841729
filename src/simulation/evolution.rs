//! Consolidation evolution
//!
//! A transparent consolidation with enough cells may turn dense; after a
//! delay a dense consolidation becomes a new entity. This is the only way
//! entities enter the system.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::core::config::EvolutionConfig;
use crate::core::error::Result;
use crate::core::types::{ConsolidationId, EntityId, Millis};
use crate::records::ConsolidationState;
use crate::simulation::engine::Engine;
use crate::simulation::probability::{pick_trait, roll};

/// Result of one evolution check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EvolutionCheck {
    Missing,
    /// Too small, or no longer transparent
    Ineligible { size: usize, state: ConsolidationState },
    RollFailed { chance: f64 },
    /// Another writer moved the consolidation on first
    Raced,
    /// Now dense; the entity follows after `delay_ms`
    Densified { chance: f64, delay_ms: Millis },
}

/// Base chance, or the boosted chance capped at `boost_cap`
pub fn evolution_chance(cfg: &EvolutionConfig, boost: bool) -> f64 {
    if boost {
        (cfg.base_chance * cfg.boost_factor).min(cfg.boost_cap)
    } else {
        cfg.base_chance
    }
}

impl Engine {
    /// Roll a consolidation into the dense state and schedule its evolution
    pub async fn check_evolution(
        self: &Arc<Self>,
        consolidation_id: ConsolidationId,
        boost: bool,
    ) -> Result<EvolutionCheck> {
        let cfg = &self.config.evolution;

        let Some(consolidation) = self.store.consolidation(consolidation_id).await? else {
            return Ok(EvolutionCheck::Missing);
        };
        if !consolidation.can_evolve(cfg.min_cells) {
            return Ok(EvolutionCheck::Ineligible {
                size: consolidation.size(),
                state: consolidation.state,
            });
        }

        let chance = evolution_chance(cfg, boost);
        if !self.with_dice_mut(|dice| roll(dice, chance)) {
            debug!(consolidation = %consolidation_id, chance, "Evolution roll failed");
            return Ok(EvolutionCheck::RollFailed { chance });
        }

        let densified = self
            .store
            .advance_consolidation(consolidation_id, ConsolidationState::Dense, None)
            .await?;
        if !densified {
            debug!(consolidation = %consolidation_id, "Evolution skipped: state changed");
            return Ok(EvolutionCheck::Raced);
        }

        let delay_ms = self.evolution_delay();

        info!(
            consolidation = %consolidation_id,
            cells = consolidation.size(),
            boost,
            delay_ms,
            "Consolidation evolved to dense state"
        );
        self.schedule_evolution(consolidation_id, delay_ms);

        Ok(EvolutionCheck::Densified { chance, delay_ms })
    }

    pub(crate) fn evolution_delay(&self) -> Millis {
        let cfg = &self.config.evolution;
        self.with_dice_mut(|dice| dice.range_u64(cfg.min_delay_ms, cfg.max_delay_ms))
    }

    pub(crate) fn schedule_evolution(
        self: &Arc<Self>,
        consolidation_id: ConsolidationId,
        delay_ms: Millis,
    ) {
        let engine = Arc::clone(self);
        self.deferred.schedule(
            "evolve_to_entity",
            Duration::from_millis(delay_ms),
            async move {
                if let Err(e) = engine.evolve_to_entity(consolidation_id).await {
                    error!(
                        consolidation = %consolidation_id,
                        error = %e,
                        "Error evolving consolidation to entity"
                    );
                }
            },
        );
    }

    /// Turn a dense consolidation into a new first-generation entity
    ///
    /// Re-reads the consolidation and aborts unless it is still dense, so a
    /// second firing for the same id produces nothing. Only the state and
    /// the resulting entity are written; cells appended meanwhile stay.
    pub async fn evolve_to_entity(
        &self,
        consolidation_id: ConsolidationId,
    ) -> Result<Option<EntityId>> {
        let Some(consolidation) = self.store.consolidation(consolidation_id).await? else {
            debug!(consolidation = %consolidation_id, "Evolution skipped: consolidation not found");
            return Ok(None);
        };
        if consolidation.state != ConsolidationState::Dense {
            debug!(
                consolidation = %consolidation_id,
                state = %consolidation.state,
                "Evolution skipped: already processed"
            );
            return Ok(None);
        }

        let trait_kind = self.with_dice_mut(pick_trait);
        let entity_id = self.insert_next_entity(trait_kind).await?;

        let advanced = self
            .store
            .advance_consolidation(
                consolidation_id,
                ConsolidationState::EntityForming,
                Some(entity_id),
            )
            .await?;
        if !advanced {
            warn!(
                consolidation = %consolidation_id,
                entity = %entity_id,
                "Consolidation left the dense state while its entity was created"
            );
        }

        info!(
            consolidation = %consolidation_id,
            entity = %entity_id,
            trait_kind = %trait_kind,
            "Consolidation evolved into entity"
        );
        Ok(Some(entity_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::EngineConfig;
    use crate::core::types::CellKey;
    use crate::records::Consolidation;
    use crate::simulation::probability::testing::ScriptedDice;
    use crate::store::{EntityQuery, MemoryStore, RecordStore};
    use chrono::Utc;

    async fn engine_with_consolidation(dice: ScriptedDice, cells: u64) -> Arc<Engine> {
        let store = Arc::new(MemoryStore::new());
        let mut consolidation = Consolidation::new(ConsolidationId(1), CellKey(1), Utc::now());
        consolidation.cell_ids.extend((2..=cells).map(CellKey));
        store.insert_consolidation(consolidation).await.unwrap();
        Arc::new(Engine::new(store, EngineConfig::default()).with_dice(Box::new(dice)))
    }

    #[test]
    fn test_boost_chance_is_capped() {
        let cfg = EvolutionConfig::default();
        assert_eq!(evolution_chance(&cfg, false), 0.25);
        assert_eq!(evolution_chance(&cfg, true), 0.45);

        let generous = EvolutionConfig {
            base_chance: 0.4,
            ..EvolutionConfig::default()
        };
        assert_eq!(evolution_chance(&generous, true), 0.45);
    }

    #[tokio::test]
    async fn test_small_consolidation_is_ineligible() {
        let engine = engine_with_consolidation(ScriptedDice::lucky(), 49).await;
        let check = engine.check_evolution(ConsolidationId(1), true).await.unwrap();
        assert_eq!(
            check,
            EvolutionCheck::Ineligible {
                size: 49,
                state: ConsolidationState::Transparent
            }
        );
    }

    #[tokio::test]
    async fn test_missing_consolidation() {
        let engine = engine_with_consolidation(ScriptedDice::lucky(), 1).await;
        let check = engine.check_evolution(ConsolidationId(7), false).await.unwrap();
        assert_eq!(check, EvolutionCheck::Missing);
    }

    #[tokio::test]
    async fn test_boost_turns_a_failed_roll_into_success() {
        // 0.30 fails the base 0.25 but passes the boosted 0.45
        let engine =
            engine_with_consolidation(ScriptedDice::lucky().with_units(&[0.30, 0.30]), 50).await;
        assert_eq!(
            engine.check_evolution(ConsolidationId(1), false).await.unwrap(),
            EvolutionCheck::RollFailed { chance: 0.25 }
        );
        assert!(matches!(
            engine.check_evolution(ConsolidationId(1), true).await.unwrap(),
            EvolutionCheck::Densified { chance, .. } if chance == 0.45
        ));
    }

    #[tokio::test]
    async fn test_densify_then_evolve_exactly_once() {
        let engine = engine_with_consolidation(ScriptedDice::lucky(), 50).await;

        let check = engine.check_evolution(ConsolidationId(1), false).await.unwrap();
        assert_eq!(
            check,
            EvolutionCheck::Densified {
                chance: 0.25,
                delay_ms: 60_000
            }
        );
        let store = engine.store();
        let dense = store.consolidation(ConsolidationId(1)).await.unwrap().unwrap();
        assert_eq!(dense.state, ConsolidationState::Dense);

        // A dense consolidation is not checked again
        assert!(matches!(
            engine.check_evolution(ConsolidationId(1), true).await.unwrap(),
            EvolutionCheck::Ineligible { .. }
        ));

        let first = engine.evolve_to_entity(ConsolidationId(1)).await.unwrap();
        let second = engine.evolve_to_entity(ConsolidationId(1)).await.unwrap();
        assert_eq!(first, Some(EntityId(1)));
        assert_eq!(second, None);
        assert_eq!(store.count_entities(EntityQuery::default()).await.unwrap(), 1);

        let evolved = store.consolidation(ConsolidationId(1)).await.unwrap().unwrap();
        assert_eq!(evolved.state, ConsolidationState::EntityForming);
        assert_eq!(evolved.evolved_to_entity, Some(EntityId(1)));

        let entity = store.entity(EntityId(1)).await.unwrap().unwrap();
        assert_eq!(entity.generation, 1);
        assert!(entity.is_free());
    }

    #[tokio::test]
    async fn test_evolve_refuses_transparent_consolidation() {
        let engine = engine_with_consolidation(ScriptedDice::lucky(), 60).await;
        assert_eq!(engine.evolve_to_entity(ConsolidationId(1)).await.unwrap(), None);
        assert_eq!(
            engine
                .store()
                .count_entities(EntityQuery::default())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_evolution_fires_after_delay() {
        let engine = engine_with_consolidation(ScriptedDice::lucky(), 50).await;
        engine.check_evolution(ConsolidationId(1), false).await.unwrap();
        assert_eq!(engine.pending_transitions(), 1);

        tokio::time::sleep(Duration::from_millis(60_001)).await;
        let consolidation = engine
            .store()
            .consolidation(ConsolidationId(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(consolidation.state, ConsolidationState::EntityForming);
        assert_eq!(engine.pending_transitions(), 0);
    }
}
