//! Command implementations for the Xiphos CLI.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::sync::Arc;

use anyhow::Context;
use log::info;
use serde::Deserialize;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{Result, XiphosError};
use crate::storage::column_file::{ColumnFileReader, read_header_from_path, write_file_atomic};
use crate::storage::directory::DirectoryCatalog;
use crate::vector::search::ExactSearchConfig;
use crate::vector::search::exact::ExactSearcher;
use crate::vector::source::VectorIterator;

/// Execute a CLI command.
pub fn execute_command(args: XiphosArgs) -> Result<()> {
    match &args.command {
        Command::Search(search_args) => search_column(search_args.clone(), &args),
        Command::Write(write_args) => write_column_file(write_args.clone(), &args),
        Command::Inspect(inspect_args) => inspect_column_file(inspect_args.clone(), &args),
    }
}

/// Run an exact search against a directory catalog.
fn search_column(args: SearchArgs, cli_args: &XiphosArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ExactSearchConfig::from_json_file(path)?,
        None => ExactSearchConfig::default(),
    };
    if args.parallel {
        config.parallel = true;
    }
    if args.no_vectors {
        config.include_vectors = false;
    }

    let catalog = Arc::new(DirectoryCatalog::open(&args.root)?);
    let reader = Arc::new(ColumnFileReader::new());
    let searcher = ExactSearcher::with_config(catalog, reader, config);

    // An absent --query is a missing vector, not an empty one.
    let query = (!args.query.is_empty()).then_some(args.query);
    let results = searcher.exact_nns(query, args.column, &args.metric, args.k)?;

    output_search_results(&results, cli_args)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonRow {
    Plain(Vec<f64>),
    Tagged { row_id: u64, vector: Vec<f64> },
}

/// Parse one JSON line into `(row_id, values)`; plain arrays take `ordinal` as row id.
fn parse_row_line(line: &str, ordinal: u64) -> Result<(u64, Vec<f64>)> {
    match serde_json::from_str::<JsonRow>(line)? {
        JsonRow::Plain(values) => Ok((ordinal, values)),
        JsonRow::Tagged { row_id, vector } => Ok((row_id, vector)),
    }
}

/// Build a column file from a JSON-lines input.
fn write_column_file(args: WriteArgs, cli_args: &XiphosArgs) -> Result<()> {
    let input = File::open(&args.input)
        .with_context(|| format!("failed to open input {}", args.input.display()))?;

    let mut rows: Vec<(u64, Vec<f64>)> = Vec::new();
    for (line_no, line) in BufReader::new(input).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = parse_row_line(&line, rows.len() as u64)
            .with_context(|| format!("line {}", line_no + 1))?;
        if let Some((_, first)) = rows.first()
            && first.len() != row.1.len()
        {
            return Err(XiphosError::invalid_input(format!(
                "line {}: expected {} components, got {}",
                line_no + 1,
                first.len(),
                row.1.len()
            )));
        }
        rows.push(row);
    }

    let dimension = match rows.first() {
        Some((_, values)) => values.len(),
        None => {
            return Err(XiphosError::invalid_input(
                "input holds no rows; cannot infer the dimension",
            ));
        }
    };

    std::fs::create_dir_all(&args.root)?;
    let catalog = DirectoryCatalog::open(&args.root)?;
    let path = catalog.file_path(args.column, &args.name)?;
    if path.exists() && !args.force {
        return Err(XiphosError::invalid_input(format!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        )));
    }

    let rows_written = write_file_atomic(&path, dimension, &rows)?;
    info!("wrote {rows_written} rows to {}", path.display());

    output_result(
        "Column file written",
        &WriteResult {
            path: path.to_string_lossy().to_string(),
            column: args.column,
            dimension,
            rows_written,
        },
        cli_args,
    )
}

/// Describe a column file, reading it fully to verify the checksum.
fn inspect_column_file(args: InspectArgs, cli_args: &XiphosArgs) -> Result<()> {
    let header = read_header_from_path(&args.file)?;
    let mut rows = ColumnFileReader::open_path(&args.file)?;

    let mut count = 0u64;
    let problem = loop {
        match rows.next() {
            Ok(Some(_)) => count += 1,
            Ok(None) => break None,
            Err(e) => break Some(e.to_string()),
        }
    };

    output_result(
        "Column file",
        &InspectResult {
            path: args.file.to_string_lossy().to_string(),
            version: header.version,
            dimension: header.dimension,
            rows: count,
            checksum_ok: problem.is_none(),
            problem,
        },
        cli_args,
    )
}
