// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deterministic construction of the MTP address space from configuration.
//!
//! `Objects/PEA_<name>/{DataAssemblies,Services,Tags,Diagnostics}` with the
//! canonical per-type variable set for each data assembly and the VDI
//! 2658-4 state-machine variables for each service. Node creation order
//! follows document order, so two builds of the same configuration yield
//! identical NodeId sequences.

use crate::node_ids::NodeIdStrategy;
use crate::space::{AddressSpace, Node, NodeDataType, NodeKind, ServiceNodes};
use mtpgw_config::{DataAssemblyConfig, GatewayConfig, ServiceConfig};
use mtpgw_core::tag::{DataType, Value};

/// Build the address space for a configuration.
pub fn build_address_space(config: &GatewayConfig) -> AddressSpace {
    let pea_name = config.gateway.name.clone();
    let strategy = NodeIdStrategy::new(config.opcua.namespace_uri.clone());
    let mut builder = Builder {
        space: AddressSpace::new(strategy, pea_name.clone()),
        pea: format!("PEA_{pea_name}"),
    };

    builder.folder(&builder.pea.clone(), None);
    let da_folder = builder.child_folder("DataAssemblies");
    let services_folder = builder.child_folder("Services");
    let diagnostics_folder = builder.child_folder("Diagnostics");
    let tags_folder = builder.child_folder("Tags");

    for da in &config.data_assemblies {
        builder.data_assembly(&da_folder, da);
    }
    for service in &config.services {
        builder.service(&services_folder, service);
    }
    for tag in &config.tags {
        builder.tag_variable(&tags_folder, &tag.name, tag.datatype, tag.writable);
    }
    builder.diagnostics(&diagnostics_folder, config);

    tracing::info!(
        pea = %pea_name,
        total_nodes = builder.space.nodes().len(),
        services = builder.space.service_nodes.len(),
        interlock_bindings = builder.space.interlock_bindings.len(),
        "address space built"
    );
    builder.space
}

struct Builder {
    space: AddressSpace,
    pea: String,
}

impl Builder {
    fn folder(&mut self, path: &str, parent: Option<&str>) {
        let browse_name = path.rsplit('.').next().unwrap_or(path).to_string();
        self.space.add_node(
            Node {
                path: path.to_string(),
                browse_name,
                kind: NodeKind::Folder,
                data_type: None,
                writable: false,
                parent: parent.map(str::to_string),
            },
            None,
        );
    }

    fn child_folder(&mut self, name: &str) -> String {
        let path = format!("{}.{name}", self.pea);
        let parent = self.pea.clone();
        self.folder(&path, Some(&parent));
        path
    }

    fn object(&mut self, parent: &str, name: &str) -> String {
        let path = format!("{parent}.{name}");
        self.space.add_node(
            Node {
                path: path.clone(),
                browse_name: name.to_string(),
                kind: NodeKind::Object,
                data_type: None,
                writable: false,
                parent: Some(parent.to_string()),
            },
            None,
        );
        path
    }

    fn variable(
        &mut self,
        parent: &str,
        name: &str,
        data_type: NodeDataType,
        initial: Value,
        writable: bool,
    ) -> String {
        let path = format!("{parent}.{name}");
        self.space.add_node(
            Node {
                path: path.clone(),
                browse_name: name.to_string(),
                kind: NodeKind::Variable,
                data_type: Some(data_type),
                writable,
                parent: Some(parent.to_string()),
            },
            Some((initial, 0)),
        );
        path
    }

    fn data_assembly(&mut self, parent: &str, config: &DataAssemblyConfig) {
        let base = self.object(parent, &config.name);
        let da_type = config.da_type.as_str();
        let serv_param = da_type.contains("ServParam");

        match da_type {
            "AnaView" | "AnaServParam" | "AnaMon" | "AnaVlv" | "AnaDrv" => {
                self.analog_variables(&base, config, serv_param);
            }
            "BinView" | "BinServParam" | "BinMon" | "BinVlv" | "BinDrv" => {
                self.binary_variables(&base, config, serv_param);
            }
            "DIntView" | "DIntServParam" => {
                self.integer_variables(&base, config, serv_param);
            }
            "StringView" => {
                self.variable(&base, "V", NodeDataType::String, Value::Text(String::new()), false);
            }
            "PIDCtrl" => {
                self.pid_variables(&base);
            }
            other => {
                tracing::warn!(da = %config.name, da_type = %other, "unknown data assembly type");
            }
        }

        // Worst quality code, common to every assembly
        self.variable(&base, "WQC", NodeDataType::UInt32, Value::Int(0), false);

        // Record tag bindings for runtime wiring
        for (attr, tag_name) in &config.bindings {
            let node_path = format!("{base}.{attr}");
            self.space
                .tag_bindings
                .entry(tag_name.clone())
                .or_default()
                .push(node_path);
        }
    }

    fn analog_variables(&mut self, base: &str, config: &DataAssemblyConfig, serv_param: bool) {
        self.variable(base, "V", NodeDataType::Float, Value::Float(0.0), false);
        let scl_min = config.v_scl_min.unwrap_or(0.0);
        let scl_max = config.v_scl_max.unwrap_or(100.0);
        self.variable(base, "VSclMin", NodeDataType::Float, Value::Float(scl_min), false);
        self.variable(base, "VSclMax", NodeDataType::Float, Value::Float(scl_max), false);
        let unit = config.v_unit.unwrap_or(0);
        self.variable(base, "VUnit", NodeDataType::UInt32, Value::Int(unit.into()), false);

        if serv_param {
            self.variable(base, "VInt", NodeDataType::Float, Value::Float(0.0), false);
            self.variable(base, "VReq", NodeDataType::Float, Value::Float(0.0), true);
            self.variable(base, "VOpMin", NodeDataType::Float, Value::Float(0.0), false);
            self.variable(base, "VOpMax", NodeDataType::Float, Value::Float(100.0), false);
            self.variable(base, "SrcMode", NodeDataType::UInt32, Value::Int(0), false);
        }

        if matches!(config.da_type.as_str(), "AnaVlv" | "AnaDrv") {
            self.variable(base, "VFbk", NodeDataType::Float, Value::Float(0.0), false);
            self.variable(base, "OpMode", NodeDataType::UInt32, Value::Int(0), false);
            self.variable(base, "Interlock", NodeDataType::UInt32, Value::Int(0), false);
            self.variable(base, "Permit", NodeDataType::UInt32, Value::Int(1), false);
            self.register_interlock(base, config);
        }
    }

    fn binary_variables(&mut self, base: &str, config: &DataAssemblyConfig, serv_param: bool) {
        self.variable(base, "V", NodeDataType::Boolean, Value::Bool(false), false);
        let state0 = config.v_state_0.clone().unwrap_or_else(|| "Off".to_string());
        let state1 = config.v_state_1.clone().unwrap_or_else(|| "On".to_string());
        self.variable(base, "VState0", NodeDataType::String, Value::Text(state0), false);
        self.variable(base, "VState1", NodeDataType::String, Value::Text(state1), false);

        if serv_param {
            self.variable(base, "VInt", NodeDataType::Boolean, Value::Bool(false), false);
            self.variable(base, "VReq", NodeDataType::Boolean, Value::Bool(false), true);
            self.variable(base, "SrcMode", NodeDataType::UInt32, Value::Int(0), false);
        }

        if matches!(config.da_type.as_str(), "BinVlv" | "BinDrv") {
            self.variable(base, "VFbkOpen", NodeDataType::Boolean, Value::Bool(false), false);
            self.variable(base, "VFbkClose", NodeDataType::Boolean, Value::Bool(false), false);
            self.variable(base, "OpMode", NodeDataType::UInt32, Value::Int(0), false);
            self.variable(base, "Interlock", NodeDataType::UInt32, Value::Int(0), false);
            self.variable(base, "Permit", NodeDataType::UInt32, Value::Int(1), false);
            self.variable(base, "MonPosErr", NodeDataType::Boolean, Value::Bool(false), false);
            self.register_interlock(base, config);
        }
    }

    fn integer_variables(&mut self, base: &str, config: &DataAssemblyConfig, serv_param: bool) {
        self.variable(base, "V", NodeDataType::Int32, Value::Int(0), false);
        let scl_min = config.v_scl_min.map(|v| v as i64).unwrap_or(0);
        let scl_max = config.v_scl_max.map(|v| v as i64).unwrap_or(65535);
        self.variable(base, "VSclMin", NodeDataType::Int32, Value::Int(scl_min), false);
        self.variable(base, "VSclMax", NodeDataType::Int32, Value::Int(scl_max), false);
        let unit = config.v_unit.unwrap_or(0);
        self.variable(base, "VUnit", NodeDataType::UInt32, Value::Int(unit.into()), false);

        if serv_param {
            self.variable(base, "VInt", NodeDataType::Int32, Value::Int(0), false);
            self.variable(base, "VReq", NodeDataType::Int32, Value::Int(0), true);
            self.variable(base, "VOpMin", NodeDataType::Int32, Value::Int(0), false);
            self.variable(base, "VOpMax", NodeDataType::Int32, Value::Int(65535), false);
        }
    }

    fn pid_variables(&mut self, base: &str) {
        for (name, initial) in [
            ("PV", 0.0),
            ("PVSclMin", 0.0),
            ("PVSclMax", 100.0),
        ] {
            self.variable(base, name, NodeDataType::Float, Value::Float(initial), false);
        }
        self.variable(base, "PVUnit", NodeDataType::UInt32, Value::Int(0), false);
        for (name, initial, writable) in [
            ("SP", 0.0, true),
            ("SPInt", 0.0, false),
            ("SPSclMin", 0.0, false),
            ("SPSclMax", 100.0, false),
            ("MV", 0.0, false),
            ("MVSclMin", 0.0, false),
            ("MVSclMax", 100.0, false),
        ] {
            self.variable(base, name, NodeDataType::Float, Value::Float(initial), writable);
        }
        self.variable(base, "MVUnit", NodeDataType::UInt32, Value::Int(0), false);
        self.variable(base, "Gain", NodeDataType::Float, Value::Float(1.0), false);
        self.variable(base, "Ti", NodeDataType::Float, Value::Float(10.0), false);
        self.variable(base, "Td", NodeDataType::Float, Value::Float(0.0), false);
        self.variable(base, "OpMode", NodeDataType::UInt32, Value::Int(0), false);
        self.variable(base, "ManMode", NodeDataType::Boolean, Value::Bool(false), false);
    }

    fn register_interlock(&mut self, base: &str, config: &DataAssemblyConfig) {
        if let Some(binding) = &config.interlock_binding {
            self.space
                .interlock_bindings
                .entry(binding.source_tag.clone())
                .or_default()
                .push(format!("{base}.Interlock"));
        }
    }

    fn service(&mut self, parent: &str, config: &ServiceConfig) {
        let base = self.object(parent, &config.name);

        // VDI 2658-4 state machine variables
        let command_op = self.variable(&base, "CommandOp", NodeDataType::UInt32, Value::Int(0), true);
        self.variable(&base, "CommandInt", NodeDataType::UInt32, Value::Int(0), false);
        self.variable(&base, "CommandExt", NodeDataType::UInt32, Value::Int(0), false);
        let state_cur = self.variable(&base, "StateCur", NodeDataType::UInt32, Value::Int(1), false);
        self.variable(&base, "StateChannel", NodeDataType::UInt32, Value::Int(0), false);
        let procedure_cur =
            self.variable(&base, "ProcedureCur", NodeDataType::UInt32, Value::Int(0), false);
        let procedure_req =
            self.variable(&base, "ProcedureReq", NodeDataType::UInt32, Value::Int(0), true);

        self.space.service_nodes.insert(
            config.name.clone(),
            ServiceNodes { command_op, state_cur, procedure_cur, procedure_req },
        );

        let params = self.object(&base, "Parameters");
        for param in &config.parameters {
            self.variable(
                &params,
                &param.name,
                NodeDataType::String,
                Value::Text(param.data_assembly.clone()),
                false,
            );
        }

        let report = self.object(&base, "ReportValues");
        for name in &config.report_values {
            self.variable(&report, name, NodeDataType::String, Value::Text(name.clone()), false);
        }

        let procedures = self.object(&base, "Procedures");
        for procedure in &config.procedures {
            let proc_path = self.object(&procedures, &procedure.name);
            self.variable(
                &proc_path,
                "ProcedureId",
                NodeDataType::UInt32,
                Value::Int(procedure.id.into()),
                false,
            );
            self.variable(
                &proc_path,
                "IsDefault",
                NodeDataType::Boolean,
                Value::Bool(procedure.is_default),
                false,
            );
        }
    }

    fn tag_variable(&mut self, parent: &str, name: &str, datatype: DataType, writable: bool) {
        let (data_type, initial) = match datatype {
            DataType::Bool => (NodeDataType::Boolean, Value::Bool(false)),
            DataType::Int16 => (NodeDataType::Int16, Value::Int(0)),
            DataType::Int32 | DataType::Uint16 => (NodeDataType::Int32, Value::Int(0)),
            DataType::Uint32 | DataType::Int64 | DataType::Uint64 => {
                (NodeDataType::UInt32, Value::Int(0))
            }
            DataType::Float32 => (NodeDataType::Float, Value::Float(0.0)),
            DataType::Float64 => (NodeDataType::Double, Value::Float(0.0)),
            DataType::String => (NodeDataType::String, Value::Text(String::new())),
        };
        let path = self.variable(parent, name, data_type, initial, writable);
        self.space.tag_nodes.insert(name.to_string(), path);
    }

    fn diagnostics(&mut self, parent: &str, config: &GatewayConfig) {
        self.variable(
            parent,
            "GatewayVersion",
            NodeDataType::String,
            Value::Text(config.gateway.version.clone()),
            false,
        );
        self.variable(
            parent,
            "ConnectorCount",
            NodeDataType::UInt32,
            Value::Int(config.connectors.len() as i64),
            false,
        );
        self.variable(
            parent,
            "TagCount",
            NodeDataType::UInt32,
            Value::Int(config.tags.len() as i64),
            false,
        );
        self.variable(
            parent,
            "ServiceCount",
            NodeDataType::UInt32,
            Value::Int(config.services.len() as i64),
            false,
        );
        self.variable(parent, "HealthStatus", NodeDataType::String, Value::Text("OK".into()), false);
        self.variable(parent, "LastError", NodeDataType::String, Value::Text(String::new()), false);
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
