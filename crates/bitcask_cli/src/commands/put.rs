//! `put` command implementation.

use bitcask_core::Database;
use std::path::Path;

/// Runs the put command.
pub fn run(path: &Path, key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    db.put(key.as_bytes(), value.as_bytes())?;
    Ok(())
}
