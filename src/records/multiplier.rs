use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value used when no multiplier record exists yet
pub const DEFAULT_MULTIPLIER: f64 = 1.0;

/// One emission of the economic signal; only the latest is authoritative
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiplier {
    pub timestamp: DateTime<Utc>,
    pub market_cap: u64,
    pub multiplier: f64,
}

/// The effective multiplier given the latest record, if any
pub fn multiplier_value(latest: Option<&Multiplier>) -> f64 {
    latest.map_or(DEFAULT_MULTIPLIER, |m| m.multiplier)
}
