//! Probability engine
//!
//! Every chance in the system is a base rate scaled by the global multiplier
//! and clamped to a cap. Randomness goes through [`Dice`] so tests can script
//! outcomes and replays can be seeded.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::types::Trait;

/// `min(cap, base * multiplier)`
pub fn effective_probability(base: f64, multiplier: f64, cap: f64) -> f64 {
    (base * multiplier).min(cap)
}

/// Source of randomness for the engine
pub trait Dice: Send {
    /// Uniform in [0, 1)
    fn unit(&mut self) -> f64;

    /// Uniform index in [0, len); 0 when `len` is 0
    fn below(&mut self, len: usize) -> usize;

    /// Uniform integer in [low, high]
    fn range_u64(&mut self, low: u64, high: u64) -> u64;

    /// Uniform float in [low, high]
    fn range_f64(&mut self, low: f64, high: f64) -> f64;
}

/// [`Dice`] backed by any `rand` generator
#[derive(Debug, Clone)]
pub struct RngDice<R>(pub R);

impl RngDice<ChaCha8Rng> {
    pub fn seeded(seed: u64) -> Self {
        Self(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self(ChaCha8Rng::from_entropy())
    }
}

impl<R: Rng + Send> Dice for RngDice<R> {
    fn unit(&mut self) -> f64 {
        self.0.gen()
    }

    fn below(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.0.gen_range(0..len)
    }

    fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        self.0.gen_range(low..=high)
    }

    fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        self.0.gen_range(low..=high)
    }
}

/// True with probability `chance`
pub fn roll(dice: &mut dyn Dice, chance: f64) -> bool {
    dice.unit() < chance
}

/// Uniform draw from the trait vocabulary
pub fn pick_trait(dice: &mut dyn Dice) -> Trait {
    Trait::ALL[dice.below(Trait::ALL.len())]
}

/// Two distinct indices into a set of `len` candidates
///
/// The second pick is redrawn on collision at most `len` times; `None` if it
/// still matches the first.
pub fn pick_pair(dice: &mut dyn Dice, len: usize) -> Option<(usize, usize)> {
    if len < 2 {
        return None;
    }
    let first = dice.below(len);
    let mut second = dice.below(len);
    let mut redraws = 0;
    while second == first && redraws < len {
        second = dice.below(len);
        redraws += 1;
    }
    (second != first).then_some((first, second))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;

    use super::Dice;

    /// Dice that replay queued values, then fall back to fixed defaults
    ///
    /// Defaults: `unit` 0.0 (every roll succeeds), `below` 0, ranges yield
    /// their lower bound.
    #[derive(Debug, Default)]
    pub struct ScriptedDice {
        units: VecDeque<f64>,
        indices: VecDeque<usize>,
        fallback_unit: f64,
    }

    impl ScriptedDice {
        /// Every roll succeeds
        pub fn lucky() -> Self {
            Self::default()
        }

        /// Every roll fails
        pub fn unlucky() -> Self {
            Self {
                fallback_unit: 0.999_999,
                ..Self::default()
            }
        }

        pub fn with_units(mut self, units: &[f64]) -> Self {
            self.units.extend(units.iter().copied());
            self
        }

        pub fn with_indices(mut self, indices: &[usize]) -> Self {
            self.indices.extend(indices.iter().copied());
            self
        }
    }

    impl Dice for ScriptedDice {
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
}
