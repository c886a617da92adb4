// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-process OPC UA address space.
//!
//! Owns the node tree and every variable's current value. Value writes
//! come from two distinct entry points: [`AddressSpace::write_internal`]
//! (subscription-driven, never re-dispatched) and the binding layer's
//! external write handler — keeping the two apart is what prevents
//! feedback loops.

use crate::node_ids::NodeIdStrategy;
use chrono::{DateTime, Utc};
use mtpgw_core::tag::Value;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Kind of node in the space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Folder,
    Object,
    Variable,
}

/// Variable data types exposed northbound (NodeSet2 alias set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeDataType {
    Boolean,
    Int16,
    Int32,
    UInt32,
    Float,
    Double,
    String,
}

impl NodeDataType {
    /// NodeSet2 alias name.
    pub fn alias(self) -> &'static str {
        match self {
            NodeDataType::Boolean => "Boolean",
            NodeDataType::Int16 => "Int16",
            NodeDataType::Int32 => "Int32",
            NodeDataType::UInt32 => "UInt32",
            NodeDataType::Float => "Float",
            NodeDataType::Double => "Double",
            NodeDataType::String => "String",
        }
    }
}

/// One node in the tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Dot-joined path, the string part of the NodeId.
    pub path: String,
    pub browse_name: String,
    pub kind: NodeKind,
    pub data_type: Option<NodeDataType>,
    /// Whether external clients may write this variable.
    pub writable: bool,
    pub parent: Option<String>,
}

/// Current value of a variable node.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableState {
    pub value: Value,
    /// OPC UA status code of the last write.
    pub status_code: u32,
    pub source_timestamp: Option<DateTime<Utc>>,
    pub server_timestamp: DateTime<Utc>,
}

/// The retained control nodes of one service.
#[derive(Debug, Clone)]
pub struct ServiceNodes {
    pub command_op: String,
    pub state_cur: String,
    pub procedure_cur: String,
    pub procedure_req: String,
}

/// The address space: node tree, values, and the four binding maps.
pub struct AddressSpace {
    strategy: NodeIdStrategy,
    pea_name: String,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    values: RwLock<HashMap<String, VariableState>>,
    /// tag name → node paths of data-assembly attributes bound to it
    pub tag_bindings: HashMap<String, Vec<String>>,
    /// tag name → its direct variable under `Tags/`
    pub tag_nodes: HashMap<String, String>,
    /// service name → retained control nodes
    pub service_nodes: HashMap<String, ServiceNodes>,
    /// source tag → interlock node paths
    pub interlock_bindings: HashMap<String, Vec<String>>,
}

impl AddressSpace {
    pub(crate) fn new(strategy: NodeIdStrategy, pea_name: String) -> Self {
        Self {
            strategy,
            pea_name,
            nodes: Vec::new(),
            index: HashMap::new(),
            values: RwLock::new(HashMap::new()),
            tag_bindings: HashMap::new(),
            tag_nodes: HashMap::new(),
            service_nodes: HashMap::new(),
            interlock_bindings: HashMap::new(),
        }
    }

    pub fn strategy(&self) -> &NodeIdStrategy {
        &self.strategy
    }

    pub fn pea_name(&self) -> &str {
        &self.pea_name
    }

    pub(crate) fn add_node(&mut self, node: Node, initial: Option<(Value, u32)>) {
        if let Some((value, status_code)) = initial {
            self.values.write().insert(
                node.path.clone(),
                VariableState {
                    value,
                    status_code,
                    source_timestamp: None,
                    server_timestamp: Utc::now(),
                },
            );
        }
        self.index.insert(node.path.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    pub fn node(&self, path: &str) -> Option<&Node> {
        self.index.get(path).map(|i| &self.nodes[*i])
    }

    /// All nodes in creation order (deterministic for a given config).
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Expanded NodeIds of every node, in creation order.
    pub fn all_node_ids(&self) -> Vec<String> {
        self.nodes
            .iter()
            .map(|node| self.strategy.expanded(&node.path))
            .collect()
    }

    /// Current state of a variable.
    pub fn read(&self, path: &str) -> Option<VariableState> {
        self.values.read().get(path).cloned()
    }

    /// Internal (subscription-driven) write to a variable node.
    pub fn write_internal(
        &self,
        path: &str,
        value: Value,
        status_code: u32,
        source_timestamp: Option<DateTime<Utc>>,
    ) {
        let mut values = self.values.write();
        if let Some(state) = values.get_mut(path) {
            state.value = value;
            state.status_code = status_code;
            state.source_timestamp = source_timestamp;
            state.server_timestamp = Utc::now();
        } else {
            tracing::debug!(node = %path, "internal write to unknown node ignored");
        }
    }

    /// Whether the path names a writable variable (for the binding layer).
    pub fn is_writable_variable(&self, path: &str) -> bool {
        self.node(path)
            .map(|n| n.kind == NodeKind::Variable && n.writable)
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "space_tests.rs"]
mod tests;
