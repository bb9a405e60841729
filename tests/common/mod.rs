//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use genesis_sim::core::config::EngineConfig;
use genesis_sim::simulation::{Dice, Engine};
use genesis_sim::store::MemoryStore;

/// Replays queued draws, then falls back to fixed values
///
/// Unit draws fall back to `fallback_unit` (0.0 passes every roll), index
/// draws to 0, ranges to their lower bound.
#[derive(Debug, Default)]
pub struct ForcedDice {
    units: VecDeque<f64>,
    indices: VecDeque<usize>,
    fallback_unit: f64,
}

impl ForcedDice {
    pub fn succeed() -> Self {
        Self::default()
    }

    pub fn fail() -> Self {
        Self {
            fallback_unit: 0.999_999,
            ..Self::default()
        }
    }

    pub fn indices(mut self, indices: &[usize]) -> Self {
        self.indices.extend(indices.iter().copied());
        self
    }

    pub fn units(mut self, units: &[f64]) -> Self {
        self.units.extend(units.iter().copied());
        self
    }
}

impl Dice for ForcedDice {
    fn unit(&mut self) -> f64 {
        self.units.pop_front().unwrap_or(self.fallback_unit)
    }

    fn below(&mut self, len: usize) -> usize {
        self.indices
            .pop_front()
            .map_or(0, |i| i.min(len.saturating_sub(1)))
    }

    fn range_u64(&mut self, low: u64, _high: u64) -> u64 {
        low
    }

    fn range_f64(&mut self, low: f64, _high: f64) -> f64 {
        low
    }
}

/// Fresh store and engine with the origin consolidation already seeded
pub async fn seeded_engine(dice: ForcedDice) -> (Arc<Engine>, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Arc::new(
        Engine::new(store.clone(), EngineConfig::default()).with_dice(Box::new(dice)),
    );
    engine
        .seed_origin(0)
        .await
        .expect("seeding an empty store succeeds");
    (engine, store)
}
