//! Multiplier feed
//!
//! Emits a new economic signal record now and then. Readers only ever use
//! the latest one; history is kept but never consulted.

use tracing::info;

use crate::core::error::Result;
use crate::records::{multiplier_value, Multiplier};
use crate::simulation::engine::Engine;
use crate::simulation::probability::roll;

impl Engine {
    /// Latest multiplier value, 1.0 when none has been emitted
    pub async fn current_multiplier(&self) -> Result<f64> {
        let latest = self.store.latest_multiplier().await?;
        Ok(multiplier_value(latest.as_ref()))
    }

    /// Draw and persist a new signal
    pub async fn refresh_multiplier(&self) -> Result<Multiplier> {
        let cfg = &self.config.multiplier;
        let (market_cap, multiplier) = self.with_dice_mut(|dice| {
            (
                dice.range_u64(cfg.min_market_cap, cfg.max_market_cap),
                dice.range_f64(cfg.min_multiplier, cfg.max_multiplier),
            )
        });

        let record = Multiplier {
            timestamp: self.now(),
            market_cap,
            multiplier,
        };
        self.store.insert_multiplier(record.clone()).await?;

        info!(
            multiplier = %format!("{:.2}", multiplier),
            market_cap,
            "Updated multiplier"
        );
        Ok(record)
    }

    /// Refresh with the configured per-cycle chance
    pub async fn maybe_refresh_multiplier(&self) -> Result<Option<Multiplier>> {
        let chance = self.config.cycle.multiplier_refresh_chance;
        if !self.with_dice_mut(|dice| roll(dice, chance)) {
            return Ok(None);
        }
        self.refresh_multiplier().await.map(Some)
    }
}
