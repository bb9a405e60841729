//! Core type definitions used throughout the engine

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds, the unit of every delay in the engine
pub type Millis = u64;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// The id that follows this one in allocation order
            pub fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

record_id!(
    /// Serial identifier for entities, allocated as max + 1
    EntityId
);
record_id!(
    /// Store-assigned identifier for bonds
    BondId
);
record_id!(
    /// Store-assigned global key for cells
    ///
    /// Distinct from `Cell::cell_id`, which is only a serial within the
    /// owning consolidation.
    CellKey
);
record_id!(
    /// Unique identifier for consolidations, allocated as max + 1
    ConsolidationId
);

/// The fixed trait vocabulary entities and cells draw from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trait {
    Strength,
    Intelligence,
    Agility,
    Resilience,
    Creativity,
    Adaptability,
    Energy,
    Speed,
    Endurance,
    Wisdom,
}

impl Trait {
    pub const ALL: [Trait; 10] = [
        Trait::Strength,
        Trait::Intelligence,
        Trait::Agility,
        Trait::Resilience,
        Trait::Creativity,
        Trait::Adaptability,
        Trait::Energy,
        Trait::Speed,
        Trait::Endurance,
        Trait::Wisdom,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Trait::Strength => "strength",
            Trait::Intelligence => "intelligence",
            Trait::Agility => "agility",
            Trait::Resilience => "resilience",
            Trait::Creativity => "creativity",
            Trait::Adaptability => "adaptability",
            Trait::Energy => "energy",
            Trait::Speed => "speed",
            Trait::Endurance => "endurance",
            Trait::Wisdom => "wisdom",
        }
    }
}

impl fmt::Display for Trait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source of wall-clock time
///
/// The dynamic production target is computed from local calendar time, so
/// the clock carries its UTC offset.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;

    fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }
}

/// Reads the host clock in the host timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock frozen at one instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
