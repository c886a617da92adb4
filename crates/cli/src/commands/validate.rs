// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw validate <config>` — strict validation with field paths.

use std::path::Path;

pub fn validate(config_path: &Path, verbose: bool) -> anyhow::Result<()> {
    let config = mtpgw_config::load_file(config_path)?;
    let report = mtpgw_config::validate(&config, true);

    for error in report.errors() {
        eprintln!("{error}");
    }
    if verbose {
        for warning in report.warnings() {
            eprintln!("{warning}");
        }
        println!(
            "{}: {} connectors, {} tags, {} data assemblies, {} services",
            config.gateway.name,
            config.connectors.len(),
            config.tags.len(),
            config.data_assemblies.len(),
            config.services.len(),
        );
    }

    if report.has_errors() {
        anyhow::bail!("configuration invalid");
    }
    println!("configuration valid");
    Ok(())
}
