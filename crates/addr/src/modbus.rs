// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modbus address parsing.
//!
//! Accepted forms:
//! - 5-digit data-model addresses: `1`–`9999` coils, `10001`–`19999`
//!   discrete inputs, `30001`–`39999` input registers, `40001`–`49999`
//!   holding registers
//! - extended 6-digit addresses: `000001`–`065536`, `100001`–`165536`,
//!   `300001`–`365536`, `400001`–`465536`
//! - named prefixes with 0-based offsets: `C50`, `DI10`, `IR200`, `HR100`
//! - an optional `.bit` suffix (0–15) for register bit access
//! - an optional `unit:` prefix selecting the Modbus unit id, e.g. `2:40001`
//!
//! The normalized form is `[unit:]<prefix><0-based offset>[.bit]`.

use crate::Validation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Modbus register types, determined by address range or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegisterType {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl RegisterType {
    pub fn prefix(self) -> &'static str {
        match self {
            RegisterType::Coil => "C",
            RegisterType::DiscreteInput => "DI",
            RegisterType::InputRegister => "IR",
            RegisterType::HoldingRegister => "HR",
        }
    }

    /// Coils and holding registers accept writes.
    pub fn writable(self) -> bool {
        matches!(self, RegisterType::Coil | RegisterType::HoldingRegister)
    }

    /// Bit access only applies to 16-bit registers.
    pub fn is_register(self) -> bool {
        matches!(self, RegisterType::InputRegister | RegisterType::HoldingRegister)
    }
}

/// A parsed Modbus address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModbusAddress {
    pub register_type: RegisterType,
    /// 0-based register/coil offset.
    pub address: u16,
    /// Number of registers covered (1 until a datatype widens it).
    pub count: u16,
    /// Bit within a 16-bit register, 0–15.
    pub bit_offset: Option<u8>,
    /// Modbus unit id override from the `unit:` prefix.
    pub unit: Option<u8>,
}

impl std::fmt::Display for ModbusAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(unit) = self.unit {
            write!(f, "{unit}:")?;
        }
        write!(f, "{}{}", self.register_type.prefix(), self.address)?;
        if let Some(bit) = self.bit_offset {
            write!(f, ".{bit}")?;
        }
        Ok(())
    }
}

/// Modbus address parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModbusAddrError {
    #[error("invalid modbus address format: '{0}'")]
    Invalid(String),

    #[error("modbus address {0} is outside every data-model range")]
    OutOfRange(u32),

    #[error("bit offset {0} out of range 0-15")]
    BitOutOfRange(u32),

    #[error("invalid unit id in '{0}'")]
    InvalidUnit(String),

    #[error("bit access not supported on {0:?}")]
    BitOnBoolean(RegisterType),
}

/// Parse a Modbus address string.
pub fn parse_modbus_address(address: &str) -> Result<ModbusAddress, ModbusAddrError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ModbusAddrError::Invalid(address.to_string()));
    }

    // unit: prefix
    let (unit, rest) = match trimmed.split_once(':') {
        Some((unit_str, rest)) => {
            let unit: u8 = unit_str
                .trim()
                .parse()
                .map_err(|_| ModbusAddrError::InvalidUnit(address.to_string()))?;
            (Some(unit), rest.trim())
        }
        None => (None, trimmed),
    };

    // .bit suffix
    let (base, bit_offset) = match rest.split_once('.') {
        Some((base, bit_str)) => {
            let bit: u32 = bit_str
                .parse()
                .map_err(|_| ModbusAddrError::Invalid(address.to_string()))?;
            if bit > 15 {
                return Err(ModbusAddrError::BitOutOfRange(bit));
            }
            (base, Some(bit as u8))
        }
        None => (rest, None),
    };

    let upper = base.to_ascii_uppercase();
    let mut parsed = if let Some(offset) = upper.strip_prefix("HR") {
        named(RegisterType::HoldingRegister, offset, address)?
    } else if let Some(offset) = upper.strip_prefix("IR") {
        named(RegisterType::InputRegister, offset, address)?
    } else if let Some(offset) = upper.strip_prefix("DI") {
        named(RegisterType::DiscreteInput, offset, address)?
    } else if let Some(offset) = upper.strip_prefix('C') {
        named(RegisterType::Coil, offset, address)?
    } else {
        numeric(&upper, address)?
    };

    if let Some(bit) = bit_offset {
        if !parsed.register_type.is_register() {
            return Err(ModbusAddrError::BitOnBoolean(parsed.register_type));
        }
        parsed.bit_offset = Some(bit);
    }
    parsed.unit = unit;
    Ok(parsed)
}

fn named(
    register_type: RegisterType,
    offset: &str,
    original: &str,
) -> Result<ModbusAddress, ModbusAddrError> {
    let address: u16 = offset
        .parse()
        .map_err(|_| ModbusAddrError::Invalid(original.to_string()))?;
    Ok(ModbusAddress { register_type, address, count: 1, bit_offset: None, unit: None })
}

fn numeric(digits: &str, original: &str) -> Result<ModbusAddress, ModbusAddrError> {
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ModbusAddrError::Invalid(original.to_string()));
    }
    let value: u32 = digits
        .parse()
        .map_err(|_| ModbusAddrError::Invalid(original.to_string()))?;

    // 6-digit strings use the extended data model (65536 points per block);
    // shorter strings use the classic 5-digit model (9999 points).
    let (block_size, extended) = if digits.len() >= 6 { (65536u32, true) } else { (9999u32, false) };

    let (register_type, base) = if extended {
        match value {
            1..=65536 => (RegisterType::Coil, 1),
            100001..=165536 => (RegisterType::DiscreteInput, 100001),
            300001..=365536 => (RegisterType::InputRegister, 300001),
            400001..=465536 => (RegisterType::HoldingRegister, 400001),
            _ => return Err(ModbusAddrError::OutOfRange(value)),
        }
    } else {
        match value {
            1..=9999 => (RegisterType::Coil, 1),
            10001..=19999 => (RegisterType::DiscreteInput, 10001),
            30001..=39999 => (RegisterType::InputRegister, 30001),
            40001..=49999 => (RegisterType::HoldingRegister, 40001),
            _ => return Err(ModbusAddrError::OutOfRange(value)),
        }
    };
    debug_assert!(value - base < block_size);

    Ok(ModbusAddress {
        register_type,
        address: (value - base) as u16,
        count: 1,
        bit_offset: None,
        unit: None,
    })
}

/// Validate an address for the config validator's strict mode.
pub fn validate(address: &str) -> Validation {
    match parse_modbus_address(address) {
        Ok(parsed) => Validation::ok(parsed.to_string()),
        Err(e) => Validation::err(e),
    }
}

#[cfg(test)]
#[path = "modbus_tests.rs"]
mod tests;
