//! `merge` command implementation.

use bitcask_core::Database;
use std::path::Path;

/// Runs the merge command. The compacted log only takes effect the next
/// time the database is opened.
pub fn run(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    db.merge()?;
    println!("merge staged; reopen the database to pick up the compacted log");
    Ok(())
}
