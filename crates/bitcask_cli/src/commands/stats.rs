//! `stats` command implementation.

use bitcask_core::Database;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct StatsOutput {
    path: String,
    key_count: usize,
    segment_count: usize,
    active_segment: u32,
}

/// Runs the stats command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(path)?;
    let stats = db.stats();
    let output = StatsOutput {
        path: path.display().to_string(),
        key_count: stats.key_count,
        segment_count: stats.segment_count,
        active_segment: stats.active_segment,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&output)?),
        _ => {
            println!("path:            {}", output.path);
            println!("keys:            {}", output.key_count);
            println!("segments:        {}", output.segment_count);
            println!("active segment:  {}", output.active_segment);
        }
    }
    Ok(())
}
