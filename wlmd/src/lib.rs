// WLM - wlmd
// Module: Command line runner
//
// Copyright (c) 2024 Ralf Anton Beier
// Licensed under the MIT license.
// SPDX-License-Identifier: MIT

#![forbid(unsafe_code)] // Rule 2

//! # WebAssembly Lifecycle Manager runner (wlmd)
//!
//! Drives one module through its whole lifecycle: load, instantiate, look
//! up a function, call it, deinstantiate and unload.
//!
//! ## Usage
//!
//! ```bash
//! wlmd <wasm-file> [--call <function>] [--args 1,2.5] [--fuel <amount>] [--config <file>] [--describe] [--stats]
//! ```
//!
//! Arguments are converted to the parameter types of the called function,
//! results are printed one per line. A trap or any lifecycle error ends
//! the process with a non-zero status.

#![warn(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use wlm::{ExecutionStats, Invocation, ModuleDescription, Runtime, RuntimeConfig};

/// Preset limits a configuration file starts from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Profile {
    /// Defaults suitable for most modules
    #[default]
    Default,
    /// Tight limits and a fuel budget
    Strict,
    /// Generous limits for trusted modules
    Relaxed,
}

/// wlmd command line arguments
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub struct Args {
    /// Path to the WebAssembly module to run
    pub wasm_file: PathBuf,

    /// Exported function to call
    #[arg(short, long, default_value = "main")]
    pub call: String,

    /// Comma separated arguments, converted to the function's parameter types
    #[arg(short, long, value_delimiter = ',', allow_hyphen_values = true)]
    pub args: Vec<f64>,

    /// Instruction budget for the call
    #[arg(short, long, env = "WLMD_FUEL")]
    pub fuel: Option<u64>,

    /// TOML file with runtime configuration
    #[arg(long, env = "WLMD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Limits used when no configuration file is given
    #[arg(long, value_enum, default_value_t = Profile::Default)]
    pub profile: Profile,

    /// Print the module's imports and exports before running it
    #[arg(short, long)]
    pub describe: bool,

    /// Print execution statistics after running
    #[arg(short, long)]
    pub stats: bool,
}

/// What a run produced
#[derive(Debug, Clone)]
pub struct Report {
    /// Imports and exports of the module
    pub description: ModuleDescription,
    /// Results of the call
    pub results:     Vec<f64>,
    /// Counters of the instance, sampled after the call
    pub stats:       ExecutionStats,
}

/// Build the runtime configuration from a file or a preset, then apply
/// the fuel override.
///
/// # Errors
///
/// Fails if the file cannot be read or is not valid configuration.
pub fn load_config(path: Option<&Path>, profile: Profile, fuel: Option<u64>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read configuration {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("invalid configuration in {}", path.display()))?
        }
        None => match profile {
            Profile::Default => RuntimeConfig::default(),
            Profile::Strict => RuntimeConfig::strict(),
            Profile::Relaxed => RuntimeConfig::relaxed(),
        },
    };
    Ok(match fuel {
        Some(fuel) => config.with_fuel(Some(fuel)),
        None => config,
    })
}

/// Run one module through its lifecycle.
///
/// # Errors
///
/// Fails on unreadable files, lifecycle errors and traps. The instance and
/// module are released on every path that created them.
pub fn run(args: &Args) -> Result<Report> {
    let config = load_config(args.config.as_deref(), args.profile, args.fuel)?;
    let bytes = fs::read(&args.wasm_file).with_context(|| format!("failed to read {}", args.wasm_file.display()))?;
    info!(path = %args.wasm_file.display(), size = bytes.len(), "loaded module file");

    let runtime = Runtime::new(config);
    debug!(engine = runtime.engine_name(), "runtime ready");
    let module = runtime
        .load(&bytes)
        .with_context(|| format!("failed to load {}", args.wasm_file.display()))?;
    let description = runtime.describe_module(module)?;

    let outcome = runtime
        .instantiate(module)
        .context("failed to instantiate module")
        .and_then(|instance| {
            let called = call(&runtime, instance, args);
            let stats = runtime.instance_stats(instance)?;
            runtime.deinstantiate(instance)?;
            called.map(|results| (results, stats))
        });
    runtime.unload(module)?;

    let (results, stats) = outcome?;
    info!(function = %args.call, ?results, "call completed");
    Ok(Report {
        description,
        results,
        stats,
    })
}

fn call(runtime: &Runtime, instance: wlm::InstanceHandle, args: &Args) -> Result<Vec<f64>> {
    let function = runtime
        .lookup_function(instance, &args.call)
        .with_context(|| format!("cannot call \"{}\"", args.call))?;
    debug!(%function, "resolved function");
    let values = wlm::marshal::to_values(function.ty(), &args.args)?;
    match runtime.execute_function(&function, &values)? {
        Invocation::Returned(values) => Ok(wlm::marshal::from_values(&values)?),
        Invocation::Trapped(trap) => Err(anyhow!("{} trapped: {trap}", args.call)),
    }
}

/// Render counters the way `--stats` prints them
pub fn format_stats(stats: &ExecutionStats) -> String {
    format!(
        "invocations: {}\ninstructions: {}\nfunction calls: {}\nmax call depth: {}\nfuel consumed: {}\ntraps: {}",
        stats.invocations,
        stats.instructions_executed,
        stats.function_calls,
        stats.max_call_depth,
        stats.fuel_consumed,
        stats.traps,
    )
}
