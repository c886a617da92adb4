// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw` — the MTP gateway command line.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod logging;
mod overrides;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mtpgw", about = "MTP gateway bridging legacy PLCs to VDI/VDE/NAMUR 2658")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway
    Run {
        /// Path to the configuration document
        config: PathBuf,
        /// Configuration overrides as dotted.path=value pairs
        #[arg(long = "override", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
        /// Log level filter (trace, debug, info, warn, error)
        #[arg(long, default_value = "info")]
        log_level: String,
        /// Log format (text or json)
        #[arg(long, default_value = "text")]
        log_format: String,
    },
    /// Validate a configuration document
    Validate {
        config: PathBuf,
        /// Also print warnings and a section summary
        #[arg(long)]
        verbose: bool,
    },
    /// Generate the AutomationML/CAEX manifest
    GenerateManifest {
        config: PathBuf,
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Emit a .mtp ZIP package instead of bare XML
        #[arg(long)]
        package: bool,
    },
    /// Generate the NodeSet2 XML export
    GenerateNodeset {
        config: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        /// Stable ids and a fixed timestamp for reproducible output
        #[arg(long)]
        deterministic: bool,
    },
    /// Probe southbound connectivity
    Probe {
        config: PathBuf,
        /// Probe only this connector
        #[arg(long)]
        connector: Option<String>,
    },
    /// Write an example configuration
    GenerateExample {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Configuration schema tooling
    Schema {
        #[command(subcommand)]
        command: commands::schema::SchemaCommand,
    },
    /// Certificate tooling
    Security {
        #[command(subcommand)]
        command: commands::security::SecurityCommand,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Run { config, overrides, log_level, log_format } => {
            commands::run::run(&config, &overrides, &log_level, &log_format)
        }
        Command::Validate { config, verbose } => commands::validate::validate(&config, verbose),
        Command::GenerateManifest { config, output, package } => {
            commands::manifest::generate(&config, output.as_deref(), package)
        }
        Command::GenerateNodeset { config, output, deterministic } => {
            commands::nodeset::generate(&config, output.as_deref(), deterministic)
        }
        Command::Probe { config, connector } => {
            commands::probe::probe(&config, connector.as_deref())
        }
        Command::GenerateExample { output } => commands::example::generate(output.as_deref()),
        Command::Schema { command } => commands::schema::run(command),
        Command::Security { command } => commands::security::run(command),
    };

    if let Err(error) = result {
        eprintln!("error: {error:#}");
        std::process::exit(1);
    }
}
