// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway lifecycle: startup wiring and ordered shutdown.

mod startup;

pub use startup::Gateway;

use thiserror::Error;

/// Fatal startup errors. Transport failures are not fatal — connectors
/// reconnect in the background — but an invalid configuration or an
/// unbindable port halts startup.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] mtpgw_config::ConfigError),

    #[error(transparent)]
    Storage(#[from] mtpgw_storage::StorageError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
