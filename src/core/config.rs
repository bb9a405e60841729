//! Engine configuration with documented constants
//!
//! All rates, caps, limits and delays live here. The defaults reproduce the
//! production tuning; a TOML file may override any subset of them.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{GenesisError, Result};
use crate::core::types::Millis;

/// Configuration for the whole engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cycle: CycleConfig,
    pub balance: BalanceConfig,
    pub bonds: BondConfig,
    pub division: DivisionConfig,
    pub evolution: EvolutionConfig,
    pub multiplier: MultiplierConfig,
    pub genesis: GenesisConfig,
}

/// Periodic trigger settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Time between cycle starts (seconds)
    ///
    /// At 240 s a full day holds 360 cycles.
    pub period_secs: u64,

    /// Delay before the first cycle after start (seconds)
    ///
    /// Gives the store connection time to come up.
    pub startup_delay_secs: u64,

    /// Chance per cycle that a new multiplier record is emitted
    ///
    /// At 0.16 a new signal appears roughly every six cycles.
    pub multiplier_refresh_chance: f64,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            period_secs: 240,
            startup_delay_secs: 15,
            multiplier_refresh_chance: 0.16,
        }
    }
}

/// Dynamic balancing toward a daily entity production target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    /// Entities the system aims to produce per day
    pub target_entities_per_day: f64,

    /// Boost mode engages when actual < threshold * expected
    pub boost_threshold: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            target_entities_per_day: 90.0,
            boost_threshold: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BondConfig {
    /// Base formation chance before the multiplier is applied
    pub base_chance: f64,

    /// Upper bound on the effective chance
    ///
    /// At multiplier 2.0 the scaled chance would be 0.80, so the cap binds
    /// exactly at the top of the multiplier range.
    pub chance_cap: f64,

    /// Maximum free entities considered per cycle
    pub candidate_limit: usize,

    /// Shortest bond maturation (ms)
    pub min_duration_ms: Millis,

    /// Longest bond maturation (ms)
    pub max_duration_ms: Millis,

    /// Energy range of the cell a completed bond produces
    pub min_cell_energy: u32,
    pub max_cell_energy: u32,
}

impl Default for BondConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.40,
            chance_cap: 0.80,
            candidate_limit: 10,
            min_duration_ms: 60_000,
            max_duration_ms: 360_000,
            min_cell_energy: 50,
            max_cell_energy: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivisionConfig {
    pub base_chance: f64,
    pub chance_cap: f64,

    /// Maximum cells scanned per cycle
    pub candidate_limit: usize,

    /// Cells divide only with energy strictly above this
    pub min_energy: u32,

    /// How long a parent stays in `dividing` before it resets (ms)
    pub reset_delay_ms: Millis,

    /// Energy a parent regains when it resets
    pub regeneration: u32,

    /// Energy ceiling applied on regeneration
    pub energy_cap: u32,
}

impl Default for DivisionConfig {
    fn default() -> Self {
        Self {
            base_chance: 0.50,
            chance_cap: 1.00,
            candidate_limit: 15,
            min_energy: 40,
            reset_delay_ms: 15_000,
            regeneration: 20,
            energy_cap: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Cells a consolidation needs before it may evolve
    pub min_cells: usize,

    pub base_chance: f64,

    /// Factor applied to the base chance in boost mode
    pub boost_factor: f64,

    /// Cap on the boosted chance
    pub boost_cap: f64,

    /// Delay range between densification and the new entity (ms)
    pub min_delay_ms: Millis,
    pub max_delay_ms: Millis,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            min_cells: 50,
            base_chance: 0.25,
            boost_factor: 1.8,
            boost_cap: 0.45,
            min_delay_ms: 60_000,
            max_delay_ms: 180_000,
        }
    }
}

/// Ranges the economic signal is drawn from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplierConfig {
    pub min_market_cap: u64,
    pub max_market_cap: u64,
    pub min_multiplier: f64,
    pub max_multiplier: f64,
}

impl Default for MultiplierConfig {
    fn default() -> Self {
        Self {
            min_market_cap: 100_000,
            max_market_cap: 1_100_000,
            min_multiplier: 0.5,
            max_multiplier: 2.0,
        }
    }
}

/// Seeding for an empty store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    /// Free entities created next to the origin cell
    ///
    /// Zero reproduces the production bootstrap, where entities only ever
    /// come from evolution.
    pub entities: u32,

    /// RNG seed; entropy when absent
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document, filling missing keys with defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.cycle.period_secs == 0 {
            return Err(GenesisError::Config("cycle.period_secs must be non-zero".into()));
        }

        let probabilities = [
            ("cycle.multiplier_refresh_chance", self.cycle.multiplier_refresh_chance),
            ("bonds.base_chance", self.bonds.base_chance),
            ("bonds.chance_cap", self.bonds.chance_cap),
            ("division.base_chance", self.division.base_chance),
            ("division.chance_cap", self.division.chance_cap),
            ("evolution.base_chance", self.evolution.base_chance),
            ("evolution.boost_cap", self.evolution.boost_cap),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(GenesisError::Config(format!(
                    "{} ({}) must be within [0, 1]",
                    name, value
                )));
            }
        }

        if self.bonds.chance_cap < self.bonds.base_chance
            || self.division.chance_cap < self.division.base_chance
        {
            return Err(GenesisError::Config(
                "chance caps must not be below their base chance".into(),
            ));
        }

        if self.bonds.candidate_limit < 2 {
            return Err(GenesisError::Config(
                "bonds.candidate_limit must allow at least two entities".into(),
            ));
        }

        let ranges = [
            ("bonds duration", self.bonds.min_duration_ms, self.bonds.max_duration_ms),
            (
                "bond cell energy",
                self.bonds.min_cell_energy as u64,
                self.bonds.max_cell_energy as u64,
            ),
            ("evolution delay", self.evolution.min_delay_ms, self.evolution.max_delay_ms),
            (
                "market cap",
                self.multiplier.min_market_cap,
                self.multiplier.max_market_cap,
            ),
        ];
        for (name, low, high) in ranges {
            if low > high {
                return Err(GenesisError::Config(format!(
                    "{} range is inverted ({} > {})",
                    name, low, high
                )));
            }
        }

        if self.multiplier.min_multiplier <= 0.0
            || self.multiplier.min_multiplier > self.multiplier.max_multiplier
        {
            return Err(GenesisError::Config(format!(
                "multiplier range [{}, {}] must be positive and ordered",
                self.multiplier.min_multiplier, self.multiplier.max_multiplier
            )));
        }

        if self.balance.target_entities_per_day < 0.0 {
            return Err(GenesisError::Config(
                "balance.target_entities_per_day must not be negative".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [cycle]
            period_secs = 30

            [genesis]
            entities = 4
            seed = 9
            "#,
        )
        .unwrap();

        assert_eq!(config.cycle.period_secs, 30);
        assert_eq!(config.cycle.startup_delay_secs, 15);
        assert_eq!(config.bonds.chance_cap, 0.80);
        assert_eq!(config.genesis.entities, 4);
        assert_eq!(config.genesis.seed, Some(9));
    }

    #[test]
    fn test_rejects_probability_out_of_range() {
        let mut config = EngineConfig::default();
        config.bonds.base_chance = 1.5;
        assert!(matches!(config.validate(), Err(GenesisError::Config(_))));
    }

    #[test]
    fn test_rejects_inverted_delay_range() {
        let mut config = EngineConfig::default();
        config.evolution.min_delay_ms = 200_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_period() {
        let result = EngineConfig::from_toml("[cycle]\nperiod_secs = 0\n");
        assert!(result.is_err());
    }
}
