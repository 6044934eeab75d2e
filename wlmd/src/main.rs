// WLM - wlmd
// Module: Command line entry point
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

//! Entry point of the `wlmd` binary. See the library documentation for
//! usage.

use std::env;

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use wlmd::{Args, format_stats, run};

fn main() -> Result<()> {
    initialize_tracing();
    let args = Args::parse();

    let report = run(&args).inspect_err(|err| error!("{err:#}"))?;
    if args.describe {
        print!("{}", report.description);
    }
    for result in &report.results {
        println!("{result}");
    }
    if args.stats {
        println!("{}", format_stats(&report.stats));
    }
    Ok(())
}

/// Initialize the tracing system for logging
///
/// `RUST_LOG` selects what is logged, `RUST_LOG_FORMAT` picks `json`,
/// `compact` or `pretty` output. Logs go to stderr so results on stdout
/// stay machine readable.
fn initialize_tracing() {
    let format = env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true);

    match format.as_str() {
        "json" => subscriber.json().init(),
        "pretty" => subscriber.pretty().init(),
        _ => subscriber.compact().init(),
    }
}
