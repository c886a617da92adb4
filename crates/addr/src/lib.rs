// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-addr: protocol address parsers.
//!
//! Each southbound protocol has its own address syntax. The parsers here
//! turn raw strings into structured addresses, print them back in a
//! normalized form (parse ∘ format is the identity), and back the config
//! validator's strict mode via [`Validation`].

pub mod eip;
pub mod modbus;
pub mod opcua;
pub mod s7;

use serde::{Deserialize, Serialize};

/// Outcome of validating an address string, independent of protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub valid: bool,
    /// Normalized form when valid.
    pub normalized: Option<String>,
    /// Parse error when invalid.
    pub error: Option<String>,
}

impl Validation {
    fn ok(normalized: String) -> Self {
        Self { valid: true, normalized: Some(normalized), error: None }
    }

    fn err(error: impl std::fmt::Display) -> Self {
        Self { valid: false, normalized: None, error: Some(error.to_string()) }
    }
}

/// Validate an address against a named protocol family.
///
/// `protocol` matches the connector type string from configuration
/// (`modbus_tcp`, `modbus_rtu`, `s7`, `eip`, `opcua_client`).
pub fn validate_for_protocol(protocol: &str, address: &str) -> Validation {
    match protocol {
        "modbus_tcp" | "modbus_rtu" => modbus::validate(address),
        "s7" => s7::validate(address),
        "eip" => eip::validate(address),
        "opcua_client" => opcua::validate(address),
        other => Validation::err(format!("unknown protocol '{other}'")),
    }
}

pub use eip::{parse_eip_address, EipAddress};
pub use modbus::{parse_modbus_address, ModbusAddress, RegisterType};
pub use opcua::{parse_node_id, NodeId, NodeIdentifier};
pub use s7::{parse_s7_address, S7Address, S7Area, S7Width};
