// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OPC UA NodeId string parsing.
//!
//! Accepted forms (namespace defaults to index 0 when omitted):
//! - `ns=<n>;i=<numeric>` — numeric identifier
//! - `ns=<n>;s=<string>` — string identifier
//! - `ns=<n>;g=<guid>` — GUID identifier (8-4-4-4-12 hex)
//! - `ns=<n>;b=<base64>` — opaque identifier
//! - `nsu=<uri>;…` — expanded form with a namespace URI
//!
//! The normalized form always spells the namespace out, e.g. `ns=0;i=2258`.

use crate::Validation;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Namespace of a NodeId: an index or an expanded URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Index(u16),
    Uri(String),
}

/// The identifier part of a NodeId.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeIdentifier {
    Numeric(u32),
    Str(String),
    Guid(String),
    Opaque(String),
}

/// A parsed OPC UA NodeId.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub namespace: Namespace,
    pub identifier: NodeIdentifier,
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Namespace::Index(idx) => write!(f, "ns={idx};")?,
            Namespace::Uri(uri) => write!(f, "nsu={uri};")?,
        }
        match &self.identifier {
            NodeIdentifier::Numeric(n) => write!(f, "i={n}"),
            NodeIdentifier::Str(s) => write!(f, "s={s}"),
            NodeIdentifier::Guid(g) => write!(f, "g={g}"),
            NodeIdentifier::Opaque(b) => write!(f, "b={b}"),
        }
    }
}

/// NodeId parse errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeIdError {
    #[error("invalid node id: '{0}'")]
    Invalid(String),

    #[error("invalid namespace in '{0}'")]
    InvalidNamespace(String),

    #[error("invalid numeric identifier in '{0}'")]
    InvalidNumeric(String),

    #[error("invalid guid identifier in '{0}'")]
    InvalidGuid(String),

    #[error("invalid base64 identifier in '{0}'")]
    InvalidOpaque(String),
}

fn is_guid(s: &str) -> bool {
    let groups: Vec<&str> = s.split('-').collect();
    let lens = [8usize, 4, 4, 4, 12];
    groups.len() == 5
        && groups
            .iter()
            .zip(lens.iter())
            .all(|(g, len)| g.len() == *len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn is_base64(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
}

/// Parse an OPC UA NodeId string.
pub fn parse_node_id(address: &str) -> Result<NodeId, NodeIdError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(NodeIdError::Invalid(address.to_string()));
    }

    let (namespace, rest) = if let Some(after) = trimmed.strip_prefix("nsu=") {
        let Some((uri, rest)) = after.split_once(';') else {
            return Err(NodeIdError::InvalidNamespace(address.to_string()));
        };
        if uri.is_empty() {
            return Err(NodeIdError::InvalidNamespace(address.to_string()));
        }
        (Namespace::Uri(uri.to_string()), rest)
    } else if let Some(after) = trimmed.strip_prefix("ns=") {
        let Some((idx_str, rest)) = after.split_once(';') else {
            return Err(NodeIdError::InvalidNamespace(address.to_string()));
        };
        let idx: u16 = idx_str
            .parse()
            .map_err(|_| NodeIdError::InvalidNamespace(address.to_string()))?;
        (Namespace::Index(idx), rest)
    } else {
        (Namespace::Index(0), trimmed)
    };

    let identifier = if let Some(num) = rest.strip_prefix("i=") {
        NodeIdentifier::Numeric(
            num.parse()
                .map_err(|_| NodeIdError::InvalidNumeric(address.to_string()))?,
        )
    } else if let Some(s) = rest.strip_prefix("s=") {
        if s.is_empty() {
            return Err(NodeIdError::Invalid(address.to_string()));
        }
        NodeIdentifier::Str(s.to_string())
    } else if let Some(guid) = rest.strip_prefix("g=") {
        if !is_guid(guid) {
            return Err(NodeIdError::InvalidGuid(address.to_string()));
        }
        NodeIdentifier::Guid(guid.to_ascii_lowercase())
    } else if let Some(b64) = rest.strip_prefix("b=") {
        if !is_base64(b64) {
            return Err(NodeIdError::InvalidOpaque(address.to_string()));
        }
        NodeIdentifier::Opaque(b64.to_string())
    } else {
        return Err(NodeIdError::Invalid(address.to_string()));
    };

    Ok(NodeId { namespace, identifier })
}

/// Validate an address for the config validator's strict mode.
pub fn validate(address: &str) -> Validation {
    match parse_node_id(address) {
        Ok(parsed) => Validation::ok(parsed.to_string()),
        Err(e) => Validation::err(e),
    }
}

#[cfg(test)]
#[path = "opcua_tests.rs"]
mod tests;
