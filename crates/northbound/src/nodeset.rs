// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NodeSet2 export: the address-space shape as OPC Foundation UANodeSet
//! XML, loadable by external modelling tools.
//!
//! NodeIds use namespace index 1 with the same string paths the server
//! exposes. In deterministic mode `LastModified` is fixed so identical
//! configurations produce byte-identical output.

use crate::builder::build_address_space;
use crate::space::{AddressSpace, NodeKind};
use crate::NorthboundError;
use chrono::Utc;
use mtpgw_config::GatewayConfig;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

const NODESET_NS: &str = "http://opcfoundation.org/UA/2011/03/UANodeSet.xsd";
const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

const ALIASES: &[(&str, &str)] = &[
    ("Boolean", "i=1"),
    ("Int16", "i=4"),
    ("Int32", "i=6"),
    ("UInt32", "i=7"),
    ("Float", "i=10"),
    ("Double", "i=11"),
    ("String", "i=12"),
    ("Organizes", "i=35"),
    ("HasComponent", "i=47"),
];

/// NodeSet2 generator for one configuration.
pub struct NodeSetGenerator<'a> {
    config: &'a GatewayConfig,
    deterministic: bool,
}

impl<'a> NodeSetGenerator<'a> {
    pub fn new(config: &'a GatewayConfig, deterministic: bool) -> Self {
        Self { config, deterministic }
    }

    /// Generate the UANodeSet XML string.
    pub fn generate(&self) -> Result<String, NorthboundError> {
        let space = build_address_space(self.config);
        self.generate_for_space(&space)
    }

    /// Generate against an already-built space (shares the server's shape).
    pub fn generate_for_space(&self, space: &AddressSpace) -> Result<String, NorthboundError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut root = BytesStart::new("UANodeSet");
        root.push_attribute(("xmlns", NODESET_NS));
        root.push_attribute((
            "LastModified",
            if self.deterministic {
                FIXED_TIMESTAMP.to_string()
            } else {
                Utc::now().to_rfc3339()
            }
            .as_str(),
        ));
        writer.write_event(Event::Start(root))?;

        // Namespace table: index 1 is the application namespace
        writer.write_event(Event::Start(BytesStart::new("NamespaceUris")))?;
        writer.write_event(Event::Start(BytesStart::new("Uri")))?;
        writer.write_event(Event::Text(BytesText::new(&self.config.opcua.namespace_uri)))?;
        writer.write_event(Event::End(BytesEnd::new("Uri")))?;
        writer.write_event(Event::End(BytesEnd::new("NamespaceUris")))?;

        writer.write_event(Event::Start(BytesStart::new("Aliases")))?;
        for (alias, node_id) in ALIASES {
            let mut a = BytesStart::new("Alias");
            a.push_attribute(("Alias", *alias));
            writer.write_event(Event::Start(a))?;
            writer.write_event(Event::Text(BytesText::new(node_id)))?;
            writer.write_event(Event::End(BytesEnd::new("Alias")))?;
        }
        writer.write_event(Event::End(BytesEnd::new("Aliases")))?;

        for node in space.nodes() {
            match node.kind {
                NodeKind::Folder | NodeKind::Object => {
                    self.object_node(&mut writer, space, node)?
                }
                NodeKind::Variable => self.variable_node(&mut writer, space, node)?,
            }
        }

        writer.write_event(Event::End(BytesEnd::new("UANodeSet")))?;
        let bytes = writer.into_inner();
        String::from_utf8(bytes).map_err(|e| NorthboundError::Xml(e.to_string()))
    }

    fn object_node(
        &self,
        w: &mut Writer<Vec<u8>>,
        space: &AddressSpace,
        node: &crate::space::Node,
    ) -> Result<(), NorthboundError> {
        let mut obj = BytesStart::new("UAObject");
        obj.push_attribute(("NodeId", space.strategy().indexed(&node.path).as_str()));
        obj.push_attribute(("BrowseName", format!("1:{}", node.browse_name).as_str()));
        w.write_event(Event::Start(obj))?;

        display_name(w, &node.browse_name)?;
        references(w, space, node)?;

        w.write_event(Event::End(BytesEnd::new("UAObject")))?;
        Ok(())
    }

    fn variable_node(
        &self,
        w: &mut Writer<Vec<u8>>,
        space: &AddressSpace,
        node: &crate::space::Node,
    ) -> Result<(), NorthboundError> {
        let mut var = BytesStart::new("UAVariable");
        var.push_attribute(("NodeId", space.strategy().indexed(&node.path).as_str()));
        var.push_attribute(("BrowseName", format!("1:{}", node.browse_name).as_str()));
        if let Some(data_type) = node.data_type {
            var.push_attribute(("DataType", data_type.alias()));
        }
        if node.writable {
            // CurrentRead | CurrentWrite
            var.push_attribute(("AccessLevel", "3"));
        }
        w.write_event(Event::Start(var))?;

        display_name(w, &node.browse_name)?;
        references(w, space, node)?;

        w.write_event(Event::End(BytesEnd::new("UAVariable")))?;
        Ok(())
    }
}

fn display_name(w: &mut Writer<Vec<u8>>, name: &str) -> Result<(), NorthboundError> {
    w.write_event(Event::Start(BytesStart::new("DisplayName")))?;
    w.write_event(Event::Text(BytesText::new(name)))?;
    w.write_event(Event::End(BytesEnd::new("DisplayName")))?;
    Ok(())
}

fn references(
    w: &mut Writer<Vec<u8>>,
    space: &AddressSpace,
    node: &crate::space::Node,
) -> Result<(), NorthboundError> {
    w.write_event(Event::Start(BytesStart::new("References")))?;
    if let Some(parent) = &node.parent {
        let reference_type = match node.kind {
            NodeKind::Folder | NodeKind::Object => "Organizes",
            NodeKind::Variable => "HasComponent",
        };
        let mut reference = BytesStart::new("Reference");
        reference.push_attribute(("ReferenceType", reference_type));
        reference.push_attribute(("IsForward", "false"));
        w.write_event(Event::Start(reference))?;
        w.write_event(Event::Text(BytesText::new(&space.strategy().indexed(parent))))?;
        w.write_event(Event::End(BytesEnd::new("Reference")))?;
    }
    w.write_event(Event::End(BytesEnd::new("References")))?;
    Ok(())
}

#[cfg(test)]
#[path = "nodeset_tests.rs"]
mod tests;
