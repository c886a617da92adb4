// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration validation with field paths.
//!
//! Structural checks always run; strict mode additionally pushes every tag
//! address through its protocol parser. Every issue names the offending
//! field path so the operator can fix the document directly.

use crate::schema::{GatewayConfig, DATA_ASSEMBLY_TYPES};
use mtpgw_core::packml::PackMlState;
use mtpgw_core::service::ProxyMode;
use std::collections::{HashMap, HashSet};

/// Severity of a validation finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding, anchored at a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{tag}: {}: {}", self.path, self.message)
    }
}

/// All findings for a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        });
    }

    fn warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.issues.push(ValidationIssue {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        });
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for issue in &self.issues {
            writeln!(f, "{issue}")?;
        }
        Ok(())
    }
}

/// Validate a configuration document. Strict mode runs address parsers.
pub fn validate(config: &GatewayConfig, strict: bool) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_version(config, &mut report);
    check_gateway(config, &mut report);
    let connectors = check_connectors(config, &mut report);
    let tags = check_tags(config, &connectors, strict, &mut report);
    check_data_assemblies(config, &tags, &mut report);
    check_services(config, &tags, &mut report);
    check_interlocks(config, &tags, &mut report);
    check_safety(config, &tags, &mut report);
    check_webui(config, &mut report);

    report
}

fn check_version(config: &GatewayConfig, report: &mut ValidationReport) {
    let supported_major = major(crate::schema::CONFIG_SCHEMA_VERSION);
    match major(&config.version) {
        Some(m) if Some(m) == supported_major => {}
        Some(m) => report.error(
            "version",
            format!(
                "schema major version {m} is not supported (expected {})",
                crate::schema::CONFIG_SCHEMA_VERSION
            ),
        ),
        None => report.error("version", format!("'{}' is not a semver version", config.version)),
    }
}

fn major(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

fn check_gateway(config: &GatewayConfig, report: &mut ValidationReport) {
    if config.gateway.name.is_empty() {
        report.error("gateway.name", "must not be empty");
    } else if !config
        .gateway
        .name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    {
        report.error(
            "gateway.name",
            "may only contain letters, digits, '_' and '-' (it becomes part of every NodeId)",
        );
    }
    if config.opcua.endpoint.is_empty() {
        report.error("opcua.endpoint", "must not be empty");
    } else if !config.opcua.endpoint.starts_with("opc.tcp://") {
        report.warning("opcua.endpoint", "expected an opc.tcp:// URL");
    }
    if config.opcua.namespace_uri.is_empty() {
        report.error("opcua.namespace_uri", "must not be empty");
    }
}

fn check_connectors<'a>(
    config: &'a GatewayConfig,
    report: &mut ValidationReport,
) -> HashMap<&'a str, &'a str> {
    let mut seen = HashSet::new();
    let mut protocols = HashMap::new();
    for (i, connector) in config.connectors.iter().enumerate() {
        let path = format!("connectors[{i}]");
        if connector.name.is_empty() {
            report.error(format!("{path}.name"), "must not be empty");
            continue;
        }
        if !seen.insert(connector.name.as_str()) {
            report.error(
                format!("{path}.name"),
                format!("duplicate connector name '{}'", connector.name),
            );
        }
        if connector.poll_interval_ms == 0 {
            report.error(format!("{path}.poll_interval_ms"), "must be greater than zero");
        }
        protocols.insert(connector.name.as_str(), connector.transport.protocol());
    }
    protocols
}

fn check_tags<'a>(
    config: &'a GatewayConfig,
    connectors: &HashMap<&str, &str>,
    strict: bool,
    report: &mut ValidationReport,
) -> HashMap<&'a str, &'a crate::schema::TagConfig> {
    let mut tags: HashMap<&str, &crate::schema::TagConfig> = HashMap::new();
    for (i, tag) in config.tags.iter().enumerate() {
        let path = format!("tags[{i}]");
        if tag.name.is_empty() {
            report.error(format!("{path}.name"), "must not be empty");
            continue;
        }
        if tags.insert(tag.name.as_str(), tag).is_some() {
            report.error(format!("{path}.name"), format!("duplicate tag name '{}'", tag.name));
        }
        match connectors.get(tag.connector.as_str()) {
            None => report.error(
                format!("{path}.connector"),
                format!("unknown connector '{}'", tag.connector),
            ),
            Some(protocol) if strict => {
                let validation = mtpgw_addr::validate_for_protocol(protocol, &tag.address);
                if !validation.valid {
                    report.error(
                        format!("{path}.address"),
                        validation.error.unwrap_or_else(|| "invalid address".to_string()),
                    );
                }
            }
            Some(_) => {}
        }
        if let Some(scale) = &tag.scale {
            if scale.gain == 0.0 {
                report.error(format!("{path}.scale.gain"), "must not be zero");
            }
        }
    }
    tags
}

fn check_data_assemblies(
    config: &GatewayConfig,
    tags: &HashMap<&str, &crate::schema::TagConfig>,
    report: &mut ValidationReport,
) {
    let mut seen = HashSet::new();
    for (i, da) in config.data_assemblies.iter().enumerate() {
        let path = format!("data_assemblies[{i}]");
        if !seen.insert(da.name.as_str()) {
            report.error(format!("{path}.name"), format!("duplicate data assembly '{}'", da.name));
        }
        if !DATA_ASSEMBLY_TYPES.contains(&da.da_type.as_str()) {
            report.error(
                format!("{path}.type"),
                format!("unknown data assembly type '{}'", da.da_type),
            );
        }
        for (attr, tag_name) in &da.bindings {
            if !tags.contains_key(tag_name.as_str()) {
                report.error(
                    format!("{path}.bindings.{attr}"),
                    format!("unknown tag '{tag_name}'"),
                );
            }
        }
        if matches!(da.da_type.as_str(), "AnaMon" | "BinMon") && !da.bindings.contains_key("V") {
            report.error(format!("{path}.bindings"), "monitor assemblies need a V binding");
        }
        if let Some(interlock) = &da.interlock_binding {
            if !matches!(da.da_type.as_str(), "AnaVlv" | "AnaDrv" | "BinVlv" | "BinDrv") {
                report.error(
                    format!("{path}.interlock_binding"),
                    format!("interlock bindings are not supported on {}", da.da_type),
                );
            } else if !tags.contains_key(interlock.source_tag.as_str()) {
                report.error(
                    format!("{path}.interlock_binding.source_tag"),
                    format!("unknown tag '{}'", interlock.source_tag),
                );
            }
        }
    }
}

fn check_services(
    config: &GatewayConfig,
    tags: &HashMap<&str, &crate::schema::TagConfig>,
    report: &mut ValidationReport,
) {
    let mut seen = HashSet::new();
    for (i, service) in config.services.iter().enumerate() {
        let path = format!("services[{i}]");
        if !seen.insert(service.name.as_str()) {
            report.error(format!("{path}.name"), format!("duplicate service '{}'", service.name));
        }

        let defaults = service.procedures.iter().filter(|p| p.is_default).count();
        if defaults > 1 {
            report.error(format!("{path}.procedures"), "at most one procedure may be default");
        }
        let mut proc_ids = HashSet::new();
        for (j, proc) in service.procedures.iter().enumerate() {
            if !proc_ids.insert(proc.id) {
                report.error(
                    format!("{path}.procedures[{j}].id"),
                    format!("duplicate procedure id {}", proc.id),
                );
            }
        }

        match service.mode {
            ProxyMode::Thin | ProxyMode::Hybrid => {
                match &service.command_op_tag {
                    None => report.error(
                        format!("{path}.command_op_tag"),
                        format!("required for {} proxy mode", service.mode),
                    ),
                    Some(tag_name) => match tags.get(tag_name.as_str()) {
                        None => report.error(
                            format!("{path}.command_op_tag"),
                            format!("unknown tag '{tag_name}'"),
                        ),
                        Some(tag) if !tag.writable => report.error(
                            format!("{path}.command_op_tag"),
                            format!("tag '{tag_name}' must be writable"),
                        ),
                        Some(_) => {}
                    },
                }
                match &service.state_cur_tag {
                    None => report.error(
                        format!("{path}.state_cur_tag"),
                        format!("required for {} proxy mode", service.mode),
                    ),
                    Some(tag_name) if !tags.contains_key(tag_name.as_str()) => report.error(
                        format!("{path}.state_cur_tag"),
                        format!("unknown tag '{tag_name}'"),
                    ),
                    Some(_) => {}
                }
            }
            ProxyMode::Thick => {
                if service.command_op_tag.is_some() || service.state_cur_tag.is_some() {
                    report.error(
                        format!("{path}.mode"),
                        "thick services must not reference command_op_tag/state_cur_tag",
                    );
                }
            }
        }

        for (state_name, hooks) in [
            ("on_starting", &service.state_hooks.on_starting),
            ("on_execute", &service.state_hooks.on_execute),
            ("on_completing", &service.state_hooks.on_completing),
            ("on_completed", &service.state_hooks.on_completed),
            ("on_stopping", &service.state_hooks.on_stopping),
            ("on_stopped", &service.state_hooks.on_stopped),
            ("on_aborting", &service.state_hooks.on_aborting),
            ("on_aborted", &service.state_hooks.on_aborted),
            ("on_holding", &service.state_hooks.on_holding),
            ("on_held", &service.state_hooks.on_held),
            ("on_unholding", &service.state_hooks.on_unholding),
            ("on_resetting", &service.state_hooks.on_resetting),
        ] {
            for (j, action) in hooks.iter().enumerate() {
                let hook_path = format!("{path}.state_hooks.{state_name}[{j}].tag");
                match tags.get(action.tag.as_str()) {
                    None => report.error(hook_path, format!("unknown tag '{}'", action.tag)),
                    Some(tag) if !tag.writable => {
                        report.error(hook_path, format!("tag '{}' must be writable", action.tag))
                    }
                    Some(_) => {}
                }
            }
        }

        if let Some(condition) = &service.completion.condition {
            if !tags.contains_key(condition.tag.as_str()) {
                report.error(
                    format!("{path}.completion.condition.tag"),
                    format!("unknown tag '{}'", condition.tag),
                );
            }
        }

        for state_name in service.timeouts.timeouts.keys() {
            if PackMlState::from_name(state_name).is_none() {
                report.error(
                    format!("{path}.timeouts.timeouts.{state_name}"),
                    "unknown PackML state",
                );
            }
        }
        for (state_name, condition) in &service.acting_state_conditions {
            match PackMlState::from_name(state_name) {
                None => report.error(
                    format!("{path}.acting_state_conditions.{state_name}"),
                    "unknown PackML state",
                ),
                Some(state) if !state.is_acting() => report.error(
                    format!("{path}.acting_state_conditions.{state_name}"),
                    "not an acting state",
                ),
                Some(_) => {}
            }
            if !tags.contains_key(condition.tag.as_str()) {
                report.error(
                    format!("{path}.acting_state_conditions.{state_name}.tag"),
                    format!("unknown tag '{}'", condition.tag),
                );
            }
        }
    }
}

fn check_interlocks(
    config: &GatewayConfig,
    tags: &HashMap<&str, &crate::schema::TagConfig>,
    report: &mut ValidationReport,
) {
    let services: HashSet<&str> = config.services.iter().map(|s| s.name.as_str()).collect();
    for (service, rows) in &config.interlocks {
        if !services.contains(service.as_str()) {
            report.error(format!("interlocks.{service}"), "unknown service");
        }
        for (i, row) in rows.iter().enumerate() {
            if !tags.contains_key(row.source_tag.as_str()) {
                report.error(
                    format!("interlocks.{service}[{i}].source_tag"),
                    format!("unknown tag '{}'", row.source_tag),
                );
            }
        }
    }
}

fn check_safety(
    config: &GatewayConfig,
    tags: &HashMap<&str, &crate::schema::TagConfig>,
    report: &mut ValidationReport,
) {
    for (i, tag_name) in config.safety.write_allowlist.iter().enumerate() {
        if !tags.contains_key(tag_name.as_str()) {
            report.error(
                format!("safety.write_allowlist[{i}]"),
                format!("unknown tag '{tag_name}'"),
            );
        }
    }
    for tag_name in config.safety.safe_state.keys() {
        match tags.get(tag_name.as_str()) {
            None => report.error(
                format!("safety.safe_state.{tag_name}"),
                "unknown tag",
            ),
            Some(tag) if !tag.writable => report.error(
                format!("safety.safe_state.{tag_name}"),
                "safe-state tags must be writable",
            ),
            Some(_) => {}
        }
    }
    if let Some(rate) = config.safety.max_writes_per_second {
        if rate <= 0.0 {
            report.error("safety.max_writes_per_second", "must be positive");
        }
    }
}

fn check_webui(config: &GatewayConfig, report: &mut ValidationReport) {
    if !config.webui.enabled {
        return;
    }
    if config.webui.auth.users.is_empty() {
        report.warning("webui.auth.users", "no users configured; the API will reject all logins");
    }
    for (i, user) in config.webui.auth.users.iter().enumerate() {
        if !matches!(user.role.as_str(), "operator" | "engineer" | "admin") {
            report.error(
                format!("webui.auth.users[{i}].role"),
                format!("unknown role '{}' (operator, engineer, admin)", user.role),
            );
        }
    }
    if config.webui.min_update_interval_ms == 0 {
        report.error("webui.min_update_interval_ms", "must be greater than zero");
    }
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
