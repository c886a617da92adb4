// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-northbound: the MTP-facing surface.
//!
//! A deterministic OPC UA address space (PEA / DataAssemblies / Services /
//! Tags / Diagnostics), its runtime binding to the tag and service
//! managers, and the two exporters whose NodeIds must match the space
//! bit-for-bit: the AutomationML/CAEX manifest and the NodeSet2 XML.

pub mod binding;
pub mod builder;
pub mod manifest;
pub mod node_ids;
pub mod nodeset;
pub mod space;

pub use binding::{ExternalWriteOutcome, NorthboundBinding};
pub use builder::build_address_space;
pub use manifest::{ManifestGenerator, ManifestTriple};
pub use node_ids::NodeIdStrategy;
pub use nodeset::NodeSetGenerator;
pub use space::{AddressSpace, Node, NodeDataType, NodeKind, ServiceNodes, VariableState};

use thiserror::Error;

/// Errors from the northbound exporters.
#[derive(Debug, Error)]
pub enum NorthboundError {
    #[error("xml error: {0}")]
    Xml(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("zip error: {0}")]
    Zip(String),

    #[error("manifest parse error: {0}")]
    Parse(String),
}

impl From<quick_xml::Error> for NorthboundError {
    fn from(e: quick_xml::Error) -> Self {
        NorthboundError::Xml(e.to_string())
    }
}
