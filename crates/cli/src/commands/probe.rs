// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw probe <config>` — check southbound connectivity.

use std::path::Path;

pub fn probe(config_path: &Path, only: Option<&str>) -> anyhow::Result<()> {
    let config = mtpgw_config::load_validated(config_path, true)?;

    let selected: Vec<_> = config
        .connectors
        .iter()
        .filter(|c| only.map_or(true, |name| c.name == name))
        .collect();
    if selected.is_empty() {
        anyhow::bail!(match only {
            Some(name) => format!("no connector named '{name}'"),
            None => "no connectors configured".to_string(),
        });
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let mut failures = 0usize;
    runtime.block_on(async {
        for connector_config in selected {
            let connector = mtpgw_adapters::create_connector(connector_config);
            match connector.connect().await {
                Ok(()) => {
                    let health = connector.health_status();
                    println!(
                        "{}: connected ({})",
                        connector_config.name,
                        health.state
                    );
                    connector.disconnect().await;
                }
                Err(e) => {
                    failures += 1;
                    println!("{}: FAILED — {e}", connector_config.name);
                }
            }
        }
    });

    if failures > 0 {
        anyhow::bail!("{failures} connector(s) unreachable");
    }
    Ok(())
}
