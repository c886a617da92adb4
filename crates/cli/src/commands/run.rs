// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `mtpgw run <config>` — run the gateway until interrupted.

use anyhow::Context;
use mtpgw_gateway::Gateway;
use std::path::Path;

pub fn run(
    config_path: &Path,
    overrides: &[String],
    log_level: &str,
    log_format: &str,
) -> anyhow::Result<()> {
    crate::logging::init(log_level, log_format)?;

    let text = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let mut document: serde_yaml::Value = serde_yaml::from_str(&text)?;
    crate::overrides::apply(&mut document, overrides)?;
    let config: mtpgw_config::GatewayConfig = serde_yaml::from_value(document)?;

    let report = mtpgw_config::validate(&config, true);
    for warning in report.warnings() {
        tracing::warn!("{warning}");
    }
    if report.has_errors() {
        anyhow::bail!("configuration invalid:\n{report}");
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let gateway = Gateway::start(config).await?;
        tracing::info!("gateway running; press ctrl-c to stop");
        tokio::signal::ctrl_c().await?;
        gateway.shutdown().await;
        Ok::<(), anyhow::Error>(())
    })
}
