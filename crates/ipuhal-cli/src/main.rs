// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

mod connections;
mod error;
mod plugin;
mod select;
mod utils;

use clap::{Parser, Subcommand};
use error::result_to_exit_code;
use std::process::ExitCode;

/// IPU HAL CLI - graph selection, pipeline inspection and plugin inspection
#[derive(Parser)]
#[command(name = "ipuhal")]
#[command(version)]
#[command(about = "IPU HAL CLI - graph selection, pipeline inspection and plugin inspection")]
#[command(long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (use RUST_LOG=trace for more)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output reports in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select graph settings for a stream configuration
    Select(select::Args),

    /// List the internal pipeline connections of a selected graph
    Connections(connections::Args),

    /// Inspect the Custom AIC plugin of a camera
    Plugin(plugin::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Select(args) => select::execute(args, cli.json),
        Commands::Connections(args) => connections::execute(args, cli.json),
        Commands::Plugin(args) => plugin::execute(args, cli.json),
    };

    result_to_exit_code(result)
}

/// Initialize env_logger based on verbosity flags
fn init_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default();

    let env = if quiet {
        env.default_filter_or("error")
    } else if verbose {
        env.default_filter_or("debug")
    } else {
        env.default_filter_or("info")
    };

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .init();

    log::debug!("Logging initialized");
}
