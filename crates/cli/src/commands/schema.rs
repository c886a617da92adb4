// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw schema export|validate|version`.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum SchemaCommand {
    /// Print the machine-readable schema description as JSON
    Export,
    /// Check a document against the schema (structural only)
    Validate { config: PathBuf },
    /// Print the schema version
    Version,
}

pub fn run(command: SchemaCommand) -> anyhow::Result<()> {
    match command {
        SchemaCommand::Export => {
            println!("{}", serde_json::to_string_pretty(&mtpgw_config::schema_document())?);
            Ok(())
        }
        SchemaCommand::Validate { config } => {
            let config = mtpgw_config::load_file(&config)?;
            let report = mtpgw_config::validate(&config, false);
            for error in report.errors() {
                eprintln!("{error}");
            }
            if report.has_errors() {
                anyhow::bail!("document does not match the schema");
            }
            println!("schema ok (version {})", config.version);
            Ok(())
        }
        SchemaCommand::Version => {
            println!("{}", mtpgw_config::schema_version());
            Ok(())
        }
    }
}
