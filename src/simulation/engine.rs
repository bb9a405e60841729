//! The engine shared by every subsystem
//!
//! Holds the store handle, configuration, random source, clock and the queue
//! of delayed transitions. The subsystems live in sibling modules as
//! `impl Engine` blocks. Apart from the dice and the pending counter the
//! engine keeps no state between calls; everything else is re-read from the
//! store.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, FixedOffset, Utc};
use tracing::warn;

use crate::core::config::EngineConfig;
use crate::core::error::{Result, StoreError};
use crate::core::types::{CellKey, Clock, ConsolidationId, EntityId, SystemClock, Trait};
use crate::records::{Consolidation, Entity};
use crate::simulation::deferred::DeferredQueue;
use crate::simulation::probability::{Dice, RngDice};
use crate::store::RecordStore;

/// Attempts at a max+1 id before a collision is reported
const ID_ATTEMPTS: usize = 3;

pub struct Engine {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) config: EngineConfig,
    dice: Mutex<Box<dyn Dice>>,
    clock: Arc<dyn Clock>,
    pub(crate) deferred: DeferredQueue,
}

impl Engine {
    /// Engine on the system clock, seeded from `config.genesis.seed` or entropy
    pub fn new(store: Arc<dyn RecordStore>, config: EngineConfig) -> Self {
        let dice: Box<dyn Dice> = match config.genesis.seed {
            Some(seed) => Box::new(RngDice::seeded(seed)),
            None => Box::new(RngDice::from_entropy()),
        };
        Self {
            store,
            config,
            dice: Mutex::new(dice),
            clock: Arc::new(SystemClock),
            deferred: DeferredQueue::new(),
        }
    }

    pub fn with_dice(mut self, dice: Box<dyn Dice>) -> Self {
        self.dice = Mutex::new(dice);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Delayed transitions that have not fired yet
    pub fn pending_transitions(&self) -> usize {
        self.deferred.pending()
    }

    /// Borrow the dice for a synchronous draw
    ///
    /// The lock never spans an await point.
    pub(crate) fn with_dice_mut<T>(&self, f: impl FnOnce(&mut dyn Dice) -> T) -> T {
        let mut dice = self.dice.lock().unwrap_or_else(PoisonError::into_inner);
        f(dice.as_mut())
    }

    /// Insert a new free entity under the next unused id
    ///
    /// Ids are max+1, so a concurrent insert may take the same one first;
    /// the allocation is retried a few times before the collision is returned.
    pub(crate) async fn insert_next_entity(&self, trait_kind: Trait) -> Result<EntityId> {
        let mut attempt = 1;
        loop {
            let id = self
                .store
                .max_entity_id()
                .await?
                .map_or(EntityId(1), EntityId::next);
            match self
                .store
                .insert_entity(Entity::new(id, trait_kind, self.now()))
                .await
            {
                Ok(()) => return Ok(id),
                Err(StoreError::DuplicateKey { .. }) if attempt < ID_ATTEMPTS => {
                    warn!(entity = %id, attempt, "Entity id taken, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Insert a new consolidation around `origin_cell` under the next unused id
    pub(crate) async fn insert_next_consolidation(
        &self,
        origin_cell: CellKey,
    ) -> Result<ConsolidationId> {
        let mut attempt = 1;
        loop {
            let id = self
                .store
                .max_consolidation_id()
                .await?
                .map_or(ConsolidationId(1), ConsolidationId::next);
            match self
                .store
                .insert_consolidation(Consolidation::new(id, origin_cell, self.now()))
                .await
            {
                Ok(()) => return Ok(id),
                Err(StoreError::DuplicateKey { .. }) if attempt < ID_ATTEMPTS => {
                    warn!(consolidation = %id, attempt, "Consolidation id taken, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    pub(crate) fn local_now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("pending_transitions", &self.deferred.pending())
            .finish_non_exhaustive()
    }
}
