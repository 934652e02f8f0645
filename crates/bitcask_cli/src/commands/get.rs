//! `get` command implementation.

use bitcask_core::{CoreError, Database};
use std::path::Path;

/// Runs the get command.
pub fn run(path: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    match db.get(key.as_bytes()) {
        Ok(value) => {
            println!("{}", String::from_utf8_lossy(&value));
            Ok(())
        }
        Err(CoreError::NoRecord) => Err(format!("key not found: {key}").into()),
        Err(e) => Err(e.into()),
    }
}
