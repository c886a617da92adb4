// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Siemens S7 address parsing.
//!
//! Accepted forms:
//! - `DB<n>.DBX<offset>.<bit>` / `DB<n>.DBB<offset>` / `DB<n>.DBW<offset>` /
//!   `DB<n>.DBD<offset>` — data blocks; `DBX` requires a bit index, the
//!   others forbid one
//! - `M<offset>.<bit>` / `MB<offset>` / `MW<offset>` / `MD<offset>` — markers
//! - `I<offset>.<bit>` / `Q<offset>.<bit>` and `[IQ][BWD]<offset>` —
//!   process image inputs/outputs
//! - `T<n>` timers, `C<n>` counters
//!
//! Bit indices are 0–7. The normalized form is the canonical uppercase
//! spelling, e.g. `DB100.DBX30.0`.

use crate::Validation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// S7 memory areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum S7Area {
    DataBlock,
    Marker,
    Input,
    Output,
    Timer,
    Counter,
}

impl S7Area {
    /// snap7-compatible area code.
    pub fn code(self) -> u8 {
        match self {
            S7Area::DataBlock => 0x84,
            S7Area::Marker => 0x83,
            S7Area::Input => 0x81,
            S7Area::Output => 0x82,
            S7Area::Counter => 0x1C,
            S7Area::Timer => 0x1D,
        }
    }

    fn letter(self) -> &'static str {
        match self {
            S7Area::DataBlock => "DB",
            S7Area::Marker => "M",
            S7Area::Input => "I",
            S7Area::Output => "Q",
            S7Area::Timer => "T",
            S7Area::Counter => "C",
        }
    }
}

/// Access width of an S7 address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum S7Width {
    Bit,
    Byte,
    Word,
    DWord,
}

impl S7Width {
    /// Bytes read or written for this width (a bit still transfers one byte).
    pub fn size(self) -> usize {
        match self {
            S7Width::Bit | S7Width::Byte => 1,
            S7Width::Word => 2,
            S7Width::DWord => 4,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            S7Width::Bit => "X",
            S7Width::Byte => "B",
            S7Width::Word => "W",
            S7Width::DWord => "D",
        }
    }

    fn from_letter(letter: u8) -> Option<Self> {
        Some(match letter {
            b'X' => S7Width::Bit,
            b'B' => S7Width::Byte,
            b'W' => S7Width::Word,
            b'D' => S7Width::DWord,
            _ => return None,
        })
    }
}

/// A parsed S7 address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct S7Address {
    pub area: S7Area,
    /// Data block number, present only for [`S7Area::DataBlock`].
    pub db_number: Option<u16>,
    /// Byte offset within the area (timer/counter number for T/C).
    pub offset: u32,
    /// Bit index 0–7 for bit access.
    pub bit: Option<u8>,
    pub width: S7Width,
}

impl S7Address {
    /// Bytes transferred for this address.
    pub fn size(&self) -> usize {
        match self.area {
            S7Area::Timer | S7Area::Counter => 2,
            _ => self.width.size(),
        }
    }
}

impl std::fmt::Display for S7Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.area {
            S7Area::DataBlock => {
                write!(
                    f,
                    "DB{}.DB{}{}",
                    self.db_number.unwrap_or(0),
                    self.width.suffix(),
                    self.offset
                )?;
                if let Some(bit) = self.bit {
                    write!(f, ".{bit}")?;
                }
                Ok(())
            }
            S7Area::Timer | S7Area::Counter => {
                write!(f, "{}{}", self.area.letter(), self.offset)
            }
            area => {
                if let Some(bit) = self.bit {
                    write!(f, "{}{}.{}", area.letter(), self.offset, bit)
                } else {
                    write!(f, "{}{}{}", area.letter(), self.width.suffix(), self.offset)
                }
            }
        }
    }
}

/// S7 address parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum S7AddrError {
    #[error("invalid s7 address: '{0}'")]
    Invalid(String),

    #[error("bit index {0} out of range 0-7")]
    BitOutOfRange(u32),

    #[error("DBX requires a bit index: '{0}'")]
    MissingBit(String),

    #[error("bit index not allowed on {0}: '{1}'")]
    UnexpectedBit(String, String),
}

/// Parse an S7 address string.
pub fn parse_s7_address(address: &str) -> Result<S7Address, S7AddrError> {
    let upper = address.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(S7AddrError::Invalid(address.to_string()));
    }

    if upper.starts_with("DB") && upper.len() > 2 && upper.as_bytes()[2].is_ascii_digit() {
        return parse_db(&upper, address);
    }

    let bytes = upper.as_bytes();
    match bytes[0] {
        b'M' => parse_area(S7Area::Marker, &upper[1..], address),
        b'I' => parse_area(S7Area::Input, &upper[1..], address),
        b'Q' => parse_area(S7Area::Output, &upper[1..], address),
        b'T' => parse_plain(S7Area::Timer, &upper[1..], address),
        b'C' => parse_plain(S7Area::Counter, &upper[1..], address),
        _ => Err(S7AddrError::Invalid(address.to_string())),
    }
}

/// `DB<n>.DB<width><offset>[.bit]`
fn parse_db(upper: &str, original: &str) -> Result<S7Address, S7AddrError> {
    let rest = &upper[2..];
    let Some((num_str, access)) = rest.split_once('.') else {
        return Err(S7AddrError::Invalid(original.to_string()));
    };
    let db_number: u16 = num_str
        .parse()
        .map_err(|_| S7AddrError::Invalid(original.to_string()))?;

    let Some(access) = access.strip_prefix("DB") else {
        return Err(S7AddrError::Invalid(original.to_string()));
    };
    if access.is_empty() {
        return Err(S7AddrError::Invalid(original.to_string()));
    }
    let width = S7Width::from_letter(access.as_bytes()[0])
        .ok_or_else(|| S7AddrError::Invalid(original.to_string()))?;

    let (offset_str, bit) = split_bit(&access[1..], original)?;
    let offset: u32 = offset_str
        .parse()
        .map_err(|_| S7AddrError::Invalid(original.to_string()))?;

    match (width, bit) {
        (S7Width::Bit, None) => Err(S7AddrError::MissingBit(original.to_string())),
        (S7Width::Bit, Some(_)) => Ok(()),
        (_, Some(_)) => Err(S7AddrError::UnexpectedBit(
            format!("DB{}", width.suffix()),
            original.to_string(),
        )),
        (_, None) => Ok(()),
    }?;

    Ok(S7Address { area: S7Area::DataBlock, db_number: Some(db_number), offset, bit, width })
}

/// `M0.0`, `MB100`, `MW100`, `MD100` and the I/Q equivalents.
fn parse_area(area: S7Area, rest: &str, original: &str) -> Result<S7Address, S7AddrError> {
    if rest.is_empty() {
        return Err(S7AddrError::Invalid(original.to_string()));
    }

    let first = rest.as_bytes()[0];
    if first.is_ascii_digit() {
        // Bit form: <offset>.<bit>
        let (offset_str, bit) = split_bit(rest, original)?;
        let offset: u32 = offset_str
            .parse()
            .map_err(|_| S7AddrError::Invalid(original.to_string()))?;
        let bit = bit.ok_or_else(|| S7AddrError::Invalid(original.to_string()))?;
        return Ok(S7Address {
            area,
            db_number: None,
            offset,
            bit: Some(bit),
            width: S7Width::Bit,
        });
    }

    // Data form: [BWD]<offset>, no bit allowed
    let width = S7Width::from_letter(first)
        .filter(|w| *w != S7Width::Bit)
        .ok_or_else(|| S7AddrError::Invalid(original.to_string()))?;
    let (offset_str, bit) = split_bit(&rest[1..], original)?;
    if bit.is_some() {
        return Err(S7AddrError::UnexpectedBit(
            format!("{}{}", area.letter(), width.suffix()),
            original.to_string(),
        ));
    }
    let offset: u32 = offset_str
        .parse()
        .map_err(|_| S7AddrError::Invalid(original.to_string()))?;
    Ok(S7Address { area, db_number: None, offset, bit: None, width })
}

/// `T<n>` / `C<n>` timers and counters.
fn parse_plain(area: S7Area, rest: &str, original: &str) -> Result<S7Address, S7AddrError> {
    let offset: u32 = rest
        .parse()
        .map_err(|_| S7AddrError::Invalid(original.to_string()))?;
    Ok(S7Address { area, db_number: None, offset, bit: None, width: S7Width::Word })
}

fn split_bit<'a>(s: &'a str, original: &str) -> Result<(&'a str, Option<u8>), S7AddrError> {
    match s.split_once('.') {
        Some((offset, bit_str)) => {
            let bit: u32 = bit_str
                .parse()
                .map_err(|_| S7AddrError::Invalid(original.to_string()))?;
            if bit > 7 {
                return Err(S7AddrError::BitOutOfRange(bit));
            }
            Ok((offset, Some(bit as u8)))
        }
        None => Ok((s, None)),
    }
}

/// Validate an address for the config validator's strict mode.
pub fn validate(address: &str) -> Validation {
    match parse_s7_address(address) {
        Ok(parsed) => Validation::ok(parsed.to_string()),
        Err(e) => Validation::err(e),
    }
}

#[cfg(test)]
#[path = "s7_tests.rs"]
mod tests;
