//! Xiphos CLI binary.

use std::io::Write;
use std::process;

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;

use xiphos::cli::args::*;
use xiphos::cli::commands::*;

fn main() {
    let args = XiphosArgs::parse();

    let log_level = match args.verbosity() {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        // -vvv shows per-query and per-file scan logging
        _ => LevelFilter::Debug,
    };

    Builder::new()
        .filter_level(log_level)
        // XIPHOS_LOG (env_logger filter syntax) overrides the flags
        .parse_env("XIPHOS_LOG")
        .format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()))
        .init();

    if let Err(e) = execute_command(args) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
