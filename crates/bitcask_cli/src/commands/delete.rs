//! `delete` command implementation.

use bitcask_core::Database;
use std::path::Path;

/// Runs the delete command.
pub fn run(path: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    db.delete(key.as_bytes())?;
    Ok(())
}
