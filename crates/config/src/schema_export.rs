// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Machine-readable schema description for `mtpgw schema export`.

use serde_json::{json, Value};

/// Current schema version string.
pub fn schema_version() -> &'static str {
    crate::schema::CONFIG_SCHEMA_VERSION
}

/// A JSON document describing the configuration schema: top-level sections,
/// connector types, data assembly types, and enumerations external tools
/// need to build editors against.
pub fn schema_document() -> Value {
    json!({
        "schema_version": schema_version(),
        "sections": {
            "gateway": ["name", "version", "description", "vendor", "vendor_url"],
            "opcua": ["endpoint", "namespace_uri", "security"],
            "connectors": {
                "types": ["modbus_tcp", "modbus_rtu", "s7", "eip", "opcua_client"],
                "common": ["name", "poll_interval_ms", "timeout_ms", "retry_delay_ms", "retry_count"],
            },
            "tags": [
                "name", "connector", "address", "datatype", "writable",
                "scale", "unit", "description", "byte_order", "word_order",
            ],
            "data_assemblies": {
                "types": crate::schema::DATA_ASSEMBLY_TYPES,
                "fields": [
                    "name", "type", "bindings", "description",
                    "v_scl_min", "v_scl_max", "v_unit", "v_state_0", "v_state_1",
                    "monitor_limits", "expected_state", "interlock_binding",
                ],
            },
            "services": [
                "name", "mode", "procedures", "parameters", "report_values",
                "state_hooks", "completion", "timeouts", "acting_state_conditions",
                "state_cur_tag", "command_op_tag",
            ],
            "webui": ["enabled", "bind", "port", "min_update_interval_ms", "history", "auth"],
            "safety": ["write_allowlist", "max_writes_per_second", "burst", "safe_state"],
            "interlocks": "map of service name to bindings",
            "storage": ["data_dir"],
        },
        "enums": {
            "datatype": [
                "bool", "int16", "uint16", "int32", "uint32",
                "int64", "uint64", "float32", "float64", "string",
            ],
            "proxy_mode": ["thin", "thick", "hybrid"],
            "comparison_op": ["==", "!=", ">", ">=", "<", "<="],
            "security_policy": ["None", "Basic128Rsa15", "Basic256", "Basic256Sha256"],
            "security_mode": ["None", "Sign", "SignAndEncrypt"],
            "roles": ["operator", "engineer", "admin"],
        },
    })
}
