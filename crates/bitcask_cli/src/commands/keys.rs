//! `keys` command implementation.

use bitcask_core::Database;
use std::path::Path;

/// Runs the keys command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    let keys: Vec<String> = db
        .list_keys()
        .into_iter()
        .map(|k| String::from_utf8_lossy(&k).into_owned())
        .collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&keys)?),
        _ => {
            for key in &keys {
                println!("{key}");
            }
        }
    }
    Ok(())
}
