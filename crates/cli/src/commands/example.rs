// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw generate-example` — write the documented example config.

use anyhow::Context;
use std::path::Path;

pub fn generate(output: Option<&Path>) -> anyhow::Result<()> {
    let yaml = mtpgw_config::example_yaml();
    match output {
        Some(path) => {
            std::fs::write(path, &yaml)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("wrote {}", path.display());
        }
        None => print!("{yaml}"),
    }
    Ok(())
}
