use thiserror::Error;

use crate::core::types::ConsolidationId;
use crate::records::ConsolidationState;

/// Failures reported by a record store
///
/// `Unavailable` is transient: the calling subsystem gives up for this
/// invocation and the next cycle tries again.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("duplicate {collection} key {key}")]
    DuplicateKey { collection: &'static str, key: u64 },
}

#[derive(Error, Debug)]
pub enum GenesisError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Consolidation {id} cannot move from {from} to {to}")]
    StateRegression {
        id: ConsolidationId,
        from: ConsolidationState,
        to: ConsolidationState,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, GenesisError>;
