//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, XiphosArgs};
use crate::error::Result;
use crate::vector::SearchResults;

/// Result structure for the write command.
#[derive(Debug, Serialize, Deserialize)]
pub struct WriteResult {
    pub path: String,
    pub column: u32,
    pub dimension: usize,
    pub rows_written: u64,
}

/// Result structure for the inspect command.
#[derive(Debug, Serialize, Deserialize)]
pub struct InspectResult {
    pub path: String,
    pub version: u16,
    pub dimension: usize,
    pub rows: u64,
    pub checksum_ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

/// Output search results in the requested format.
pub fn output_search_results(results: &SearchResults, args: &XiphosArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Json => output_json(results, args),
        OutputFormat::Human => {
            println!(
                "Nearest neighbours ({}, {} of {} candidates):",
                results.metric,
                results.hits.len(),
                results.candidates_scanned
            );
            println!("═══════════════════════════════");
            for hit in &results.hits {
                print!(
                    "{:>4}. score {:<14.6} {} row {}",
                    hit.rank, hit.score, hit.origin.file, hit.origin.row_id
                );
                if let Some(vector) = &hit.vector {
                    print!("  {:?}", vector.as_slice());
                }
                println!();
            }
            if args.verbosity() > 1 {
                println!();
                println!("Files scanned: {}", results.files_scanned);
                println!("Search time: {:.3}ms", results.search_time_ms);
            }
            Ok(())
        }
    }
}

/// Output a result in the specified format.
pub fn output_result<T: Serialize>(message: &str, result: &T, args: &XiphosArgs) -> Result<()> {
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: Serialize>(message: &str, result: &T, args: &XiphosArgs) -> Result<()> {
    if args.verbosity() > 0 {
        println!("{message}");
    }

    let value = serde_json::to_value(result)?;
    if let Some(obj) = value.as_object() {
        for (key, value) in obj {
            match value {
                serde_json::Value::String(s) => println!("  {key}: {s}"),
                other => println!("  {key}: {other}"),
            }
        }
    }
    Ok(())
}

/// Output in JSON format.
fn output_json<T: Serialize>(result: &T, args: &XiphosArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}
