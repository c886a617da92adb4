// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw generate-manifest <config>`.

use anyhow::Context;
use mtpgw_northbound::ManifestGenerator;
use std::path::Path;

pub fn generate(config_path: &Path, output: Option<&Path>, package: bool) -> anyhow::Result<()> {
    let config = mtpgw_config::load_validated(config_path, true)?;
    // Packages and files are generated deterministically so re-runs diff
    // cleanly; stdout keeps the same behavior
    let generator = ManifestGenerator::new(&config, true);

    if package {
        let output = output.context("--package requires --output")?;
        generator.generate_package(output)?;
        println!("wrote {}", output.display());
        return Ok(());
    }

    let xml = generator.generate()?;
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
