// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing subscriber setup for the `run` command.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str, log_format: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("invalid log level '{log_level}'"))?;

    match log_format {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?,
        "text" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to init logging: {e}"))?,
        other => anyhow::bail!("unknown log format '{other}' (text or json)"),
    }
    Ok(())
}
