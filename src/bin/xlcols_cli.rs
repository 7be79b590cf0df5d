//! CLI tool for xlcols - replays column actions and prints a JSON report
//!
//! Usage:
//!   xlcols_cli <actions.json>                     # Report to stdout
//!   xlcols_cli <actions.json> -o report.json      # Report to file
//!   xlcols_cli - --config config.json             # Actions from stdin
//!
//! Logs go to stderr. Set `XLCOLS_LOG` (or `RUST_LOG`) to e.g. `debug`.

#![allow(clippy::exit)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::indexing_slicing)]

use std::env;
use std::fs;
use std::io::{self, Read, Write};

use serde_json::json;
use tracing_subscriber::EnvFilter;
use xlcols::replay::{parse_actions, replay};
use xlcols::{ColumnConfig, ColumnManager, SchemaRecord};

struct Args {
    input: String,
    output: Option<String>,
    config: Option<String>,
}

fn parse_args() -> Option<Args> {
    let mut args = env::args().skip(1);
    let mut input = None;
    let mut output = None;
    let mut config = None;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-o" => output = Some(args.next()?),
            "--config" => config = Some(args.next()?),
            _ if input.is_none() => input = Some(arg),
            _ => return None,
        }
    }
    Some(Args {
        input: input?,
        output,
        config,
    })
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("XLCOLS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn default_schema(schema: i64, _view: i64) -> SchemaRecord {
    let mut record = SchemaRecord::new();
    record.insert("id".into(), json!(format!("col{schema}")));
    record
}

fn main() {
    init_logging();

    let Some(args) = parse_args() else {
        eprintln!("Usage: xlcols_cli <actions.json | -> [-o report.json] [--config config.json]");
        std::process::exit(1);
    };

    let config = match &args.config {
        Some(path) => {
            let text = match fs::read_to_string(path) {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("Error reading {}: {}", path, e);
                    std::process::exit(1);
                }
            };
            match ColumnConfig::from_json(&text) {
                Ok(c) => c,
                Err(e) => {
                    eprintln!("Error parsing config {}: {}", path, e);
                    std::process::exit(1);
                }
            }
        }
        None => ColumnConfig::default(),
    };

    // Read actions
    let text = if args.input == "-" {
        let mut buf = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut buf) {
            eprintln!("Error reading stdin: {}", e);
            std::process::exit(1);
        }
        buf
    } else {
        match fs::read_to_string(&args.input) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error reading {}: {}", args.input, e);
                std::process::exit(1);
            }
        }
    };

    let actions = match parse_actions(&text) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error parsing actions: {}", e);
            std::process::exit(1);
        }
    };

    let mut manager = ColumnManager::new(default_schema, config);
    let report = replay(&mut manager, actions);
    tracing::info!(
        steps = report.steps.len(),
        failed = report.failed,
        "replay finished"
    );

    // Serialize to JSON
    let json = match serde_json::to_string_pretty(&report) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("Error serializing JSON: {}", e);
            std::process::exit(1);
        }
    };

    // Output
    match args.output {
        Some(path) => {
            if let Err(e) = fs::write(&path, &json) {
                eprintln!("Error writing {}: {}", path, e);
                std::process::exit(1);
            }
            eprintln!("Written: {}", path);
        }
        None => {
            io::stdout().write_all(json.as_bytes()).unwrap();
            println!();
        }
    }
}
