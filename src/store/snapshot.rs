//! JSON state file for the in-memory store

use std::path::Path;

use crate::core::error::Result;
use crate::store::StoreDump;

/// Read a state file; `None` if it does not exist yet
pub fn load(path: &Path) -> Result<Option<StoreDump>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

pub fn save(path: &Path, dump: &StoreDump) -> Result<()> {
    let json = serde_json::to_string_pretty(dump)?;
    std::fs::write(path, json)?;
    Ok(())
}
