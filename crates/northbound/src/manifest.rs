// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AutomationML/CAEX 3.0 manifest generation and parsing.
//!
//! The manifest carries, for every data-assembly binding and every service
//! state-machine variable, an attribute `<name>NodeId` holding the same
//! expanded NodeId string the server exposes. In deterministic mode all
//! element ids derive from a stable hash of the configuration slice and
//! the write timestamp is fixed, so identical input yields byte-identical
//! XML.

use crate::node_ids::NodeIdStrategy;
use crate::NorthboundError;
use chrono::Utc;
use mtpgw_config::{DataAssemblyConfig, GatewayConfig, ServiceConfig};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use sha2::{Digest, Sha256};
use std::io::Write as _;
use std::path::Path;
use uuid::Uuid;

const CAEX_NS: &str = "http://www.dke.de/CAEX";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const ROLE_CLASS_LIB: &str = "MTPRoleClassLib";
const INTERFACE_CLASS_LIB: &str = "MTPInterfaceClassLib";
const FIXED_TIMESTAMP: &str = "2024-01-01T00:00:00+00:00";

/// One `(owner, attribute, node-id)` triple recovered from a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestTriple {
    pub owner: String,
    pub attribute: String,
    pub node_id: String,
}

/// CAEX manifest generator for one configuration.
pub struct ManifestGenerator<'a> {
    config: &'a GatewayConfig,
    strategy: NodeIdStrategy,
    deterministic: bool,
    seed: Uuid,
}

impl<'a> ManifestGenerator<'a> {
    pub fn new(config: &'a GatewayConfig, deterministic: bool) -> Self {
        // Stable seed over the identity slice of the configuration
        let mut hasher = Sha256::new();
        hasher.update(config.gateway.name.as_bytes());
        hasher.update(config.opcua.namespace_uri.as_bytes());
        hasher.update(config.opcua.endpoint.as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&digest[..16]);

        Self {
            strategy: NodeIdStrategy::new(config.opcua.namespace_uri.clone()),
            config,
            deterministic,
            seed: Uuid::from_bytes(bytes),
        }
    }

    fn element_id(&self, label: &str) -> String {
        if self.deterministic {
            Uuid::new_v5(&self.seed, label.as_bytes()).to_string()
        } else {
            Uuid::new_v4().to_string()
        }
    }

    fn timestamp(&self) -> String {
        if self.deterministic {
            FIXED_TIMESTAMP.to_string()
        } else {
            Utc::now().to_rfc3339()
        }
    }

    fn pea(&self) -> String {
        format!("PEA_{}", self.config.gateway.name)
    }

    /// Generate the manifest XML string.
    pub fn generate(&self) -> Result<String, NorthboundError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

        let mut root = BytesStart::new("CAEXFile");
        root.push_attribute(("xmlns", CAEX_NS));
        root.push_attribute(("xmlns:xsi", XSI_NS));
        root.push_attribute((
            "xsi:schemaLocation",
            format!("{CAEX_NS} CAEX_ClassModel_V.3.0.xsd").as_str(),
        ));
        root.push_attribute((
            "FileName",
            format!("{}_manifest.aml", self.config.gateway.name).as_str(),
        ));
        root.push_attribute(("SchemaVersion", "3.0"));
        writer.write_event(Event::Start(root))?;

        self.additional_information(&mut writer)?;
        self.role_class_lib(&mut writer)?;
        self.interface_class_lib(&mut writer)?;
        self.instance_hierarchy(&mut writer)?;

        writer.write_event(Event::End(BytesEnd::new("CAEXFile")))?;
        let bytes = writer.into_inner();
        String::from_utf8(bytes).map_err(|e| NorthboundError::Xml(e.to_string()))
    }

    /// Write the `.mtp` package: a ZIP holding `manifest.aml` and
    /// `manifest.info`.
    pub fn generate_package(&self, output_path: &Path) -> Result<(), NorthboundError> {
        let xml = self.generate()?;
        let file = std::fs::File::create(output_path)?;
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::FileOptions::default();

        zip.start_file("manifest.aml", options)
            .map_err(|e| NorthboundError::Zip(e.to_string()))?;
        zip.write_all(xml.as_bytes())?;

        zip.start_file("manifest.info", options)
            .map_err(|e| NorthboundError::Zip(e.to_string()))?;
        let info = format!(
            "MTP Package Information\nName: {}\nVersion: {}\nGenerated: {}\nGenerator: mtpgw\n",
            self.config.gateway.name,
            self.config.gateway.version,
            self.timestamp(),
        );
        zip.write_all(info.as_bytes())?;

        zip.finish().map_err(|e| NorthboundError::Zip(e.to_string()))?;
        tracing::info!(path = %output_path.display(), "mtp package written");
        Ok(())
    }

    /// All NodeId strings the manifest will carry. Contract: a subset of
    /// the server's node ids, with equality on service state-machine
    /// variables.
    pub fn all_node_ids(&self) -> Vec<String> {
        let pea = self.pea();
        let mut ids = Vec::new();
        for da in &self.config.data_assemblies {
            for attr in da.bindings.keys() {
                ids.push(
                    self.strategy
                        .expanded(&format!("{pea}.DataAssemblies.{}.{attr}", da.name)),
                );
            }
        }
        for service in &self.config.services {
            for var in ["CommandOp", "StateCur", "ProcedureCur", "ProcedureReq"] {
                ids.push(
                    self.strategy
                        .expanded(&format!("{pea}.Services.{}.{var}", service.name)),
                );
            }
        }
        ids
    }

    fn additional_information(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        w.write_event(Event::Start(BytesStart::new("AdditionalInformation")))?;
        text_element(w, "WriterHeader", "MTP Gateway Manifest Generator")?;
        text_element(w, "WriterID", "mtpgw")?;
        let vendor = self
            .config
            .gateway
            .vendor
            .clone()
            .unwrap_or_else(|| self.config.gateway.name.clone());
        text_element(w, "WriterVendor", &vendor)?;
        if let Some(url) = &self.config.gateway.vendor_url {
            text_element(w, "WriterVendorURL", url)?;
        }
        text_element(w, "WriterVersion", &self.config.gateway.version)?;
        text_element(w, "LastWritingDateTime", &self.timestamp())?;
        w.write_event(Event::End(BytesEnd::new("AdditionalInformation")))?;
        Ok(())
    }

    fn role_class_lib(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        let mut lib = BytesStart::new("RoleClassLib");
        lib.push_attribute(("Name", ROLE_CLASS_LIB));
        w.write_event(Event::Start(lib))?;
        for role in [
            "ModuleTypePackage",
            "ProcessEquipmentAssembly",
            "Service",
            "DataAssembly",
            "CommunicationInterface",
        ] {
            let mut rc = BytesStart::new("RoleClass");
            rc.push_attribute(("Name", role));
            w.write_event(Event::Empty(rc))?;
        }
        w.write_event(Event::End(BytesEnd::new("RoleClassLib")))?;
        Ok(())
    }

    fn interface_class_lib(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        let mut lib = BytesStart::new("InterfaceClassLib");
        lib.push_attribute(("Name", INTERFACE_CLASS_LIB));
        w.write_event(Event::Start(lib))?;
        let mut ic = BytesStart::new("InterfaceClass");
        ic.push_attribute(("Name", "OPCUAInterface"));
        w.write_event(Event::Empty(ic))?;
        w.write_event(Event::End(BytesEnd::new("InterfaceClassLib")))?;
        Ok(())
    }

    fn instance_hierarchy(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        let mut ih = BytesStart::new("InstanceHierarchy");
        ih.push_attribute((
            "Name",
            format!("{}_Hierarchy", self.config.gateway.name).as_str(),
        ));
        w.write_event(Event::Start(ih))?;

        let pea = self.pea();
        self.internal_element_open(w, &pea, &pea)?;
        role_requirement(w, "ProcessEquipmentAssembly")?;
        attribute(w, "Name", &self.config.gateway.name, "xs:string")?;
        attribute(w, "Version", &self.config.gateway.version, "xs:string")?;
        attribute(w, "Description", &self.config.gateway.description, "xs:string")?;

        self.communication(w)?;
        self.data_assemblies(w)?;
        self.services(w)?;

        w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        w.write_event(Event::End(BytesEnd::new("InstanceHierarchy")))?;
        Ok(())
    }

    fn communication(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        self.internal_element_open(w, "Communication", "Communication")?;
        role_requirement(w, "CommunicationInterface")?;

        let mut ei = BytesStart::new("ExternalInterface");
        ei.push_attribute(("Name", "OPCUAServer"));
        ei.push_attribute(("ID", self.element_id("Communication.OPCUAServer").as_str()));
        ei.push_attribute((
            "RefBaseClassPath",
            format!("{INTERFACE_CLASS_LIB}/OPCUAInterface").as_str(),
        ));
        w.write_event(Event::Start(ei))?;
        attribute(w, "Endpoint", &self.config.opcua.endpoint, "xs:anyURI")?;
        attribute(w, "NamespaceURI", &self.config.opcua.namespace_uri, "xs:anyURI")?;
        w.write_event(Event::End(BytesEnd::new("ExternalInterface")))?;

        w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        Ok(())
    }

    fn data_assemblies(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        self.internal_element_open(w, "DataAssemblies", "DataAssemblies")?;
        for da in &self.config.data_assemblies {
            self.data_assembly(w, da)?;
        }
        w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        Ok(())
    }

    fn data_assembly(
        &self,
        w: &mut Writer<Vec<u8>>,
        da: &DataAssemblyConfig,
    ) -> Result<(), NorthboundError> {
        let base = format!("{}.DataAssemblies.{}", self.pea(), da.name);
        self.internal_element_open(w, &da.name, &base)?;
        role_requirement(w, "DataAssembly")?;
        attribute(w, "Type", &da.da_type, "xs:string")?;
        if !da.description.is_empty() {
            attribute(w, "Description", &da.description, "xs:string")?;
        }

        for attr in da.bindings.keys() {
            let node_id = self.strategy.expanded(&format!("{base}.{attr}"));
            attribute(w, &format!("{attr}NodeId"), &node_id, "xs:string")?;
        }

        if let Some(min) = da.v_scl_min {
            attribute(w, "VSclMin", &min.to_string(), "xs:double")?;
        }
        if let Some(max) = da.v_scl_max {
            attribute(w, "VSclMax", &max.to_string(), "xs:double")?;
        }
        if let Some(unit) = da.v_unit {
            attribute(w, "VUnit", &unit.to_string(), "xs:unsignedInt")?;
        }

        w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        Ok(())
    }

    fn services(&self, w: &mut Writer<Vec<u8>>) -> Result<(), NorthboundError> {
        self.internal_element_open(w, "Services", "Services")?;
        for service in &self.config.services {
            self.service(w, service)?;
        }
        w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        Ok(())
    }

    fn service(
        &self,
        w: &mut Writer<Vec<u8>>,
        service: &ServiceConfig,
    ) -> Result<(), NorthboundError> {
        let base = format!("{}.Services.{}", self.pea(), service.name);
        self.internal_element_open(w, &service.name, &base)?;
        role_requirement(w, "Service")?;
        attribute(w, "ProxyMode", &service.mode.to_string(), "xs:string")?;

        for var in ["CommandOp", "StateCur", "ProcedureCur", "ProcedureReq"] {
            let node_id = self.strategy.expanded(&format!("{base}.{var}"));
            attribute(w, &format!("{var}NodeId"), &node_id, "xs:string")?;
        }

        if !service.procedures.is_empty() {
            self.internal_element_open(w, "Procedures", &format!("{base}.Procedures"))?;
            for procedure in &service.procedures {
                self.internal_element_open(
                    w,
                    &procedure.name,
                    &format!("{base}.Procedures.{}", procedure.name),
                )?;
                attribute(w, "ProcedureId", &procedure.id.to_string(), "xs:unsignedInt")?;
                attribute(w, "IsDefault", &procedure.is_default.to_string(), "xs:boolean")?;
                w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
            }
            w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        }

        if !service.parameters.is_empty() {
            self.internal_element_open(w, "Parameters", &format!("{base}.Parameters"))?;
            for param in &service.parameters {
                self.internal_element_open(
                    w,
                    &param.name,
                    &format!("{base}.Parameters.{}", param.name),
                )?;
                attribute(w, "DataAssembly", &param.data_assembly, "xs:string")?;
                attribute(w, "Required", &param.required.to_string(), "xs:boolean")?;
                w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
            }
            w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        }

        w.write_event(Event::End(BytesEnd::new("InternalElement")))?;
        Ok(())
    }

    fn internal_element_open(
        &self,
        w: &mut Writer<Vec<u8>>,
        name: &str,
        id_label: &str,
    ) -> Result<(), NorthboundError> {
        let mut ie = BytesStart::new("InternalElement");
        ie.push_attribute(("Name", name));
        ie.push_attribute(("ID", self.element_id(id_label).as_str()));
        w.write_event(Event::Start(ie))?;
        Ok(())
    }
}

fn text_element(w: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<(), NorthboundError> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// `<Attribute Name=".." AttributeDataType=".."><Value>..</Value></Attribute>`
fn attribute(
    w: &mut Writer<Vec<u8>>,
    name: &str,
    value: &str,
    datatype: &str,
) -> Result<(), NorthboundError> {
    let mut attr = BytesStart::new("Attribute");
    attr.push_attribute(("Name", name));
    attr.push_attribute(("AttributeDataType", datatype));
    w.write_event(Event::Start(attr))?;
    w.write_event(Event::Start(BytesStart::new("Value")))?;
    w.write_event(Event::Text(BytesText::new(value)))?;
    w.write_event(Event::End(BytesEnd::new("Value")))?;
    w.write_event(Event::End(BytesEnd::new("Attribute")))?;
    Ok(())
}

fn role_requirement(w: &mut Writer<Vec<u8>>, role: &str) -> Result<(), NorthboundError> {
    let mut rr = BytesStart::new("RoleRequirements");
    rr.push_attribute((
        "RefBaseRoleClassPath",
        format!("{ROLE_CLASS_LIB}/{role}").as_str(),
    ));
    w.write_event(Event::Empty(rr))?;
    Ok(())
}

/// Parse a manifest back into its `(owner, attribute, node-id)` triples.
pub fn parse_triples(xml: &str) -> Result<Vec<ManifestTriple>, NorthboundError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut owners: Vec<String> = Vec::new();
    let mut triples = Vec::new();
    let mut pending: Option<(String, String)> = None;
    let mut in_value = false;
    let mut buf = Vec::new();

    loop {
        match reader
            .read_event_into(&mut buf)
            .map_err(|e| NorthboundError::Parse(e.to_string()))?
        {
            Event::Start(start) => {
                let tag = start.name().as_ref().to_vec();
                match tag.as_slice() {
                    b"InternalElement" => {
                        let name = attr_value(&start, b"Name")?.unwrap_or_default();
                        owners.push(name);
                    }
                    b"Attribute" => {
                        if let Some(name) = attr_value(&start, b"Name")? {
                            if let Some(attribute) = name.strip_suffix("NodeId") {
                                let owner = owners.last().cloned().unwrap_or_default();
                                pending = Some((owner, attribute.to_string()));
                            }
                        }
                    }
                    b"Value" => in_value = pending.is_some(),
                    _ => {}
                }
            }
            Event::Text(text) if in_value => {
                if let Some((owner, attribute)) = pending.take() {
                    triples.push(ManifestTriple {
                        owner,
                        attribute,
                        node_id: text
                            .unescape()
                            .map_err(|e| NorthboundError::Parse(e.to_string()))?
                            .into_owned(),
                    });
                }
                in_value = false;
            }
            Event::End(end) => {
                if end.name().as_ref() == b"InternalElement" {
                    owners.pop();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(triples)
}

fn attr_value(start: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, NorthboundError> {
    for attr in start.attributes() {
        let attr = attr.map_err(|e| NorthboundError::Parse(e.to_string()))?;
        if attr.key.as_ref() == key {
            return Ok(Some(
                attr.unescape_value()
                    .map_err(|e| NorthboundError::Parse(e.to_string()))?
                    .into_owned(),
            ));
        }
    }
    Ok(None)
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
