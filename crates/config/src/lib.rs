// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-config: the gateway configuration document.
//!
//! A single YAML document describes the gateway identity, the OPC UA
//! endpoint, connectors, tags, data assemblies, services, safety rules and
//! the Web UI. This crate owns the schema, loading, validation (with field
//! paths), conversion into the domain model, and the example/schema tooling
//! behind the CLI.

pub mod convert;
pub mod example;
pub mod schema;
pub mod schema_export;
pub mod validate;

pub use example::example_yaml;
pub use schema::{
    AuthConfig, ConnectorConfig, ConnectorTransport, DataAssemblyConfig, GatewayConfig,
    GatewayInfo, HistoryConfig, InterlockBindingConfig, MonitorLimits, OpcUaConfig,
    OpcUaSecurityConfig, ProcedureConfig, SafetySection, ServiceConfig, StateHooksConfig,
    StorageConfig, TagConfig, UserConfig, WebUiConfig, CONFIG_SCHEMA_VERSION,
};
pub use schema_export::{schema_document, schema_version};
pub use validate::{validate, ValidationIssue, ValidationReport};

use thiserror::Error;

/// Errors loading a configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("configuration invalid:\n{0}")]
    Invalid(ValidationReport),
}

/// Load a configuration document from a YAML file, without validating.
pub fn load_file(path: &std::path::Path) -> Result<GatewayConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_str(&text)
}

/// Parse a configuration document from YAML text, without validating.
pub fn load_str(text: &str) -> Result<GatewayConfig, ConfigError> {
    Ok(serde_yaml::from_str(text)?)
}

/// Load and validate; strict mode also runs the protocol address parsers.
pub fn load_validated(path: &std::path::Path, strict: bool) -> Result<GatewayConfig, ConfigError> {
    let config = load_file(path)?;
    let report = validate(&config, strict);
    if report.has_errors() {
        return Err(ConfigError::Invalid(report));
    }
    Ok(config)
}
