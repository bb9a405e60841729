//! Resuming delayed transitions after a restart
//!
//! Delayed transitions live only in the runtime, so a restored store holds
//! active bonds, dividing cells and dense consolidations with nothing left
//! to move them on. Bonds and cells are rescheduled for whatever remains of
//! their recorded duration; dense consolidations draw a fresh delay.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::core::error::Result;
use crate::core::types::Millis;
use crate::records::{CellStatus, ConsolidationState};
use crate::simulation::engine::Engine;
use crate::store::CellQuery;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResumeReport {
    pub bonds: usize,
    pub resets: usize,
    pub evolutions: usize,
}

impl ResumeReport {
    pub fn total(&self) -> usize {
        self.bonds + self.resets + self.evolutions
    }
}

/// Time left until `started + duration_ms`, zero if already due
fn remaining_ms(started: DateTime<Utc>, duration_ms: Millis, now: DateTime<Utc>) -> Millis {
    let elapsed = now.signed_duration_since(started).num_milliseconds();
    let elapsed = u64::try_from(elapsed).unwrap_or(0);
    duration_ms.saturating_sub(elapsed)
}

impl Engine {
    /// Reschedule every transition a restored store is waiting on
    pub async fn resume_pending(self: &Arc<Self>) -> Result<ResumeReport> {
        let now = self.now();
        let mut report = ResumeReport::default();

        for bond in self.store.all_bonds().await? {
            if !bond.is_active() {
                continue;
            }
            let delay_ms = remaining_ms(bond.start_time, bond.duration_ms, now);
            self.schedule_completion(bond.id, bond.entity_a, bond.entity_b, delay_ms);
            report.bonds += 1;
        }

        let dividing = CellQuery {
            status: Some(CellStatus::Dividing),
            ..CellQuery::default()
        };
        for cell in self.store.find_cells(dividing, usize::MAX).await? {
            let delay_ms = match (cell.division_started_at, cell.division_duration_ms) {
                (Some(started), Some(duration)) => remaining_ms(started, duration, now),
                _ => 0,
            };
            self.schedule_reset(cell.key, delay_ms);
            report.resets += 1;
        }

        for consolidation in self.store.all_consolidations().await? {
            if consolidation.state != ConsolidationState::Dense {
                continue;
            }
            let delay_ms = self.evolution_delay();
            self.schedule_evolution(consolidation.id, delay_ms);
            report.evolutions += 1;
        }

        if report.total() > 0 {
            info!(
                bonds = report.bonds,
                resets = report.resets,
                evolutions = report.evolutions,
                "Resumed pending transitions"
            );
        }
        Ok(report)
    }
}
