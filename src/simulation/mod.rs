pub mod balance;
pub mod bonds;
pub mod census;
pub mod deferred;
pub mod division;
pub mod engine;
pub mod evolution;
pub mod genesis;
pub mod multiplier;
pub mod probability;
pub mod recovery;
pub mod tick;

pub use balance::Progress;
pub use bonds::{BondCompletion, BondOutcome};
pub use census::Census;
pub use division::{Division, DivisionReport};
pub use engine::Engine;
pub use evolution::EvolutionCheck;
pub use genesis::GenesisReport;
pub use probability::{Dice, RngDice};
pub use recovery::ResumeReport;
pub use tick::{CycleOutcome, CycleReport, CycleScheduler, CycleSummary, SchedulerHandle};
