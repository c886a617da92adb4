// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw generate-nodeset <config>`.

use anyhow::Context;
use mtpgw_northbound::NodeSetGenerator;
use std::path::Path;

pub fn generate(
    config_path: &Path,
    output: Option<&Path>,
    deterministic: bool,
) -> anyhow::Result<()> {
    let config = mtpgw_config::load_validated(config_path, true)?;
    let xml = NodeSetGenerator::new(&config, deterministic).generate()?;

    match output {
        Some(path) => {
            std::fs::write(path, &xml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => print!("{xml}"),
    }
    Ok(())
}
