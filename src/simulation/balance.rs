//! Dynamic balancing toward a daily entity production target
//!
//! Two "expected by now" formulas are in use and they disagree:
//!
//! - the cycle scheduler counts whole days since the start of the year plus
//!   the fraction of today elapsed ([`expected_by_now`]);
//! - the per-division evolution check counts only the fraction of today
//!   ([`expected_today`]).
//!
//! Each call site keeps its own formula.

use chrono::{Datelike, Timelike};
use serde::Serialize;

use crate::core::error::Result;
use crate::simulation::engine::Engine;
use crate::store::EntityQuery;

const MINUTES_PER_DAY: f64 = 1440.0;

/// Entity count against the target at one instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub actual: u64,
    pub expected: u64,
    pub boost: bool,
}

fn minutes_of_day<T: Timelike>(now: &T) -> f64 {
    (now.hour() * 60 + now.minute()) as f64
}

/// `floor(target * (day_of_year + minutes_today / 1440))`
///
/// January 1st is day 1, so the count never starts from zero.
pub fn expected_by_now<T: Datelike + Timelike>(target_per_day: f64, now: &T) -> u64 {
    let days = now.ordinal() as f64 + minutes_of_day(now) / MINUTES_PER_DAY;
    (target_per_day * days).floor() as u64
}

/// `floor(target * minutes_today / 1440)`
pub fn expected_today<T: Timelike>(target_per_day: f64, now: &T) -> u64 {
    (target_per_day * minutes_of_day(now) / MINUTES_PER_DAY).floor() as u64
}

/// Behind target when `actual < threshold * expected`
pub fn is_behind(actual: u64, expected: u64, threshold: f64) -> bool {
    (actual as f64) < expected as f64 * threshold
}

impl Engine {
    /// Progress as the cycle scheduler measures it
    pub async fn cycle_progress(&self) -> Result<Progress> {
        let cfg = &self.config.balance;
        let actual = self.store.count_entities(EntityQuery::default()).await?;
        let expected = expected_by_now(cfg.target_entities_per_day, &self.local_now());
        Ok(Progress {
            actual,
            expected,
            boost: is_behind(actual, expected, cfg.boost_threshold),
        })
    }

    /// Progress as the per-division evolution check measures it
    pub async fn division_progress(&self) -> Result<Progress> {
        let cfg = &self.config.balance;
        let actual = self.store.count_entities(EntityQuery::default()).await?;
        let expected = expected_today(cfg.target_entities_per_day, &self.local_now());
        Ok(Progress {
            actual,
            expected,
            boost: is_behind(actual, expected, cfg.boost_threshold),
        })
    }
}
