// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allen-Bradley EtherNet/IP (CIP) symbolic address parsing.
//!
//! EIP addresses are symbolic tag paths rather than memory offsets:
//! - `MyGlobalTag` — controller-scoped tag
//! - `Program:MainProgram.MyTag` — program-scoped tag
//! - `MyUDT.Member.Sub` — nested UDT members
//! - `MyArray[3]`, `Matrix[1,2]` — array elements (multi-dimensional)
//! - `MyTag{5}` — bit access
//!
//! Identifiers follow `[A-Za-z_][A-Za-z0-9_]*`. The normalized form
//! reconstructs the path verbatim from its parsed parts.

use crate::Validation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One dotted segment of a symbolic path, with optional array indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EipSegment {
    pub name: String,
    pub indices: Vec<u32>,
}

/// A parsed EIP symbolic address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EipAddress {
    /// Program scope from a `Program:<name>.` prefix.
    pub program: Option<String>,
    pub segments: Vec<EipSegment>,
    /// Bit number from a trailing `{n}`.
    pub bit: Option<u32>,
}

impl EipAddress {
    /// The full tag path without the bit suffix (what goes on the wire).
    pub fn tag_path(&self) -> String {
        let mut out = String::new();
        if let Some(program) = &self.program {
            out.push_str("Program:");
            out.push_str(program);
            out.push('.');
        }
        for (i, seg) in self.segments.iter().enumerate() {
            if i > 0 {
                out.push('.');
            }
            out.push_str(&seg.name);
            if !seg.indices.is_empty() {
                out.push('[');
                for (j, idx) in seg.indices.iter().enumerate() {
                    if j > 0 {
                        out.push(',');
                    }
                    out.push_str(&idx.to_string());
                }
                out.push(']');
            }
        }
        out
    }
}

impl std::fmt::Display for EipAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tag_path())?;
        if let Some(bit) = self.bit {
            write!(f, "{{{bit}}}")?;
        }
        Ok(())
    }
}

/// EIP address parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EipAddrError {
    #[error("invalid eip address: '{0}'")]
    Invalid(String),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("invalid array index in '{0}'")]
    InvalidIndex(String),

    #[error("invalid bit access in '{0}'")]
    InvalidBit(String),
}

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Parse an EIP symbolic address string.
pub fn parse_eip_address(address: &str) -> Result<EipAddress, EipAddrError> {
    let mut rest = address.trim();
    if rest.is_empty() {
        return Err(EipAddrError::Invalid(address.to_string()));
    }

    // Program:<name>. prefix
    let mut program = None;
    if let Some(after) = rest.strip_prefix("Program:") {
        let Some((name, tail)) = after.split_once('.') else {
            return Err(EipAddrError::Invalid(address.to_string()));
        };
        if !is_identifier(name) {
            return Err(EipAddrError::InvalidIdentifier(name.to_string()));
        }
        program = Some(name.to_string());
        rest = tail;
    }

    // Trailing {bit}
    let mut bit = None;
    if let Some(open) = rest.find('{') {
        let brace = &rest[open..];
        let Some(inner) = brace.strip_prefix('{').and_then(|s| s.strip_suffix('}')) else {
            return Err(EipAddrError::InvalidBit(address.to_string()));
        };
        bit = Some(
            inner
                .parse::<u32>()
                .map_err(|_| EipAddrError::InvalidBit(address.to_string()))?,
        );
        rest = &rest[..open];
    } else if rest.contains('}') {
        return Err(EipAddrError::InvalidBit(address.to_string()));
    }

    // Dotted segments with optional [n] / [n,n,...] indices
    let mut segments = Vec::new();
    for part in rest.split('.') {
        if part.is_empty() {
            return Err(EipAddrError::Invalid(address.to_string()));
        }
        let (name, indices) = match part.find('[') {
            Some(open) => {
                let name = &part[..open];
                let Some(inner) = part[open..]
                    .strip_prefix('[')
                    .and_then(|s| s.strip_suffix(']'))
                else {
                    return Err(EipAddrError::InvalidIndex(address.to_string()));
                };
                let indices = inner
                    .split(',')
                    .map(|idx| idx.trim().parse::<u32>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| EipAddrError::InvalidIndex(address.to_string()))?;
                if indices.is_empty() {
                    return Err(EipAddrError::InvalidIndex(address.to_string()));
                }
                (name, indices)
            }
            None => {
                if part.contains(']') {
                    return Err(EipAddrError::InvalidIndex(address.to_string()));
                }
                (part, Vec::new())
            }
        };
        if !is_identifier(name) {
            return Err(EipAddrError::InvalidIdentifier(name.to_string()));
        }
        segments.push(EipSegment { name: name.to_string(), indices });
    }

    if segments.is_empty() {
        return Err(EipAddrError::Invalid(address.to_string()));
    }

    Ok(EipAddress { program, segments, bit })
}

/// Validate an address for the config validator's strict mode.
pub fn validate(address: &str) -> Validation {
    match parse_eip_address(address) {
        Ok(parsed) => Validation::ok(parsed.to_string()),
        Err(e) => Validation::err(e),
    }
}

#[cfg(test)]
#[path = "eip_tests.rs"]
mod tests;
