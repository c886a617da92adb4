// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::space::NodeKind;
use mtpgw_config::load_str;

fn config(yaml: &str) -> mtpgw_config::GatewayConfig {
    load_str(yaml).unwrap()
}

fn example() -> mtpgw_config::GatewayConfig {
    config(&mtpgw_config::example_yaml())
}

#[test]
fn sections_exist_under_pea() {
    let space = build_address_space(&example());
    for path in [
        "PEA_DemoPlant",
        "PEA_DemoPlant.DataAssemblies",
        "PEA_DemoPlant.Services",
        "PEA_DemoPlant.Diagnostics",
        "PEA_DemoPlant.Tags",
    ] {
        assert!(space.node(path).is_some(), "{path} missing");
    }
}

#[test]
fn ana_mon_variable_set() {
    let space = build_address_space(&example());
    let base = "PEA_DemoPlant.DataAssemblies.TempMon";
    for attr in ["V", "VSclMin", "VSclMax", "VUnit", "WQC"] {
        assert!(space.node(&format!("{base}.{attr}")).is_some(), "{attr} missing");
    }
    // Configured scale range flows into initial values
    assert_eq!(
        space.read(&format!("{base}.VSclMax")).unwrap().value,
        mtpgw_core::tag::Value::Float(150.0)
    );
}

#[test]
fn bin_view_state_texts() {
    let space = build_address_space(&example());
    let base = "PEA_DemoPlant.DataAssemblies.RunState";
    assert_eq!(
        space.read(&format!("{base}.VState0")).unwrap().value,
        mtpgw_core::tag::Value::Text("Stopped".into())
    );
    assert_eq!(
        space.read(&format!("{base}.VState1")).unwrap().value,
        mtpgw_core::tag::Value::Text("Running".into())
    );
}

#[test]
fn valve_gets_interlock_binding() {
    let yaml = r#"
gateway:
  name: X
opcua:
  endpoint: opc.tcp://0.0.0.0:4840/x
  namespace_uri: urn:x
connectors:
  - name: plc1
    type: modbus_tcp
    host: h
tags:
  - name: valve_fb
    connector: plc1
    address: "10001"
    datatype: bool
  - name: safe
    connector: plc1
    address: "10002"
    datatype: bool
data_assemblies:
  - name: FeedValve
    type: BinVlv
    bindings:
      V: valve_fb
    interlock_binding:
      source_tag: safe
"#;
    let space = build_address_space(&config(yaml));
    let base = "PEA_X.DataAssemblies.FeedValve";
    for attr in ["V", "VState0", "VState1", "VFbkOpen", "VFbkClose", "OpMode", "Interlock", "Permit", "MonPosErr", "WQC"] {
        assert!(space.node(&format!("{base}.{attr}")).is_some(), "{attr} missing");
    }
    assert_eq!(
        space.interlock_bindings.get("safe").unwrap(),
        &vec![format!("{base}.Interlock")]
    );
    // Permit defaults to 1
    assert_eq!(
        space.read(&format!("{base}.Permit")).unwrap().value,
        mtpgw_core::tag::Value::Int(1)
    );
}

#[test]
fn pid_variable_set() {
    let yaml = r#"
gateway:
  name: X
opcua:
  endpoint: opc.tcp://0.0.0.0:4840/x
  namespace_uri: urn:x
data_assemblies:
  - name: TempCtrl
    type: PIDCtrl
"#;
    let space = build_address_space(&config(yaml));
    let base = "PEA_X.DataAssemblies.TempCtrl";
    for attr in [
        "PV", "PVSclMin", "PVSclMax", "PVUnit", "SP", "SPInt", "SPSclMin", "SPSclMax",
        "MV", "MVSclMin", "MVSclMax", "MVUnit", "Gain", "Ti", "Td", "OpMode", "ManMode",
    ] {
        assert!(space.node(&format!("{base}.{attr}")).is_some(), "{attr} missing");
    }
}

#[test]
fn service_nodes_retained() {
    let space = build_address_space(&example());
    let nodes = space.service_nodes.get("Mix").unwrap();
    assert_eq!(nodes.command_op, "PEA_DemoPlant.Services.Mix.CommandOp");
    assert_eq!(nodes.state_cur, "PEA_DemoPlant.Services.Mix.StateCur");
    assert_eq!(nodes.procedure_cur, "PEA_DemoPlant.Services.Mix.ProcedureCur");
    assert_eq!(nodes.procedure_req, "PEA_DemoPlant.Services.Mix.ProcedureReq");

    // The full VDI state machine variable set
    for var in [
        "CommandOp", "CommandInt", "CommandExt", "StateCur", "StateChannel",
        "ProcedureCur", "ProcedureReq",
    ] {
        assert!(space
            .node(&format!("PEA_DemoPlant.Services.Mix.{var}"))
            .is_some());
    }
    // Sub-folders and procedure metadata
    assert!(space.node("PEA_DemoPlant.Services.Mix.Parameters").is_some());
    assert!(space.node("PEA_DemoPlant.Services.Mix.ReportValues").is_some());
    assert!(space
        .node("PEA_DemoPlant.Services.Mix.Procedures.Default.ProcedureId")
        .is_some());
}

#[test]
fn command_op_writable_state_cur_not() {
    let space = build_address_space(&example());
    assert!(space.is_writable_variable("PEA_DemoPlant.Services.Mix.CommandOp"));
    assert!(space.is_writable_variable("PEA_DemoPlant.Services.Mix.ProcedureReq"));
    assert!(!space.is_writable_variable("PEA_DemoPlant.Services.Mix.StateCur"));
}

#[test]
fn tag_nodes_and_bindings() {
    let space = build_address_space(&example());
    assert_eq!(
        space.tag_nodes.get("temp").unwrap(),
        "PEA_DemoPlant.Tags.temp"
    );
    // temp is bound to TempMon.V
    assert_eq!(
        space.tag_bindings.get("temp").unwrap(),
        &vec!["PEA_DemoPlant.DataAssemblies.TempMon.V".to_string()]
    );
    // Writable flag follows the tag definition
    assert!(space.is_writable_variable("PEA_DemoPlant.Tags.run_cmd"));
    assert!(!space.is_writable_variable("PEA_DemoPlant.Tags.temp"));
}

#[test]
fn diagnostics_variables() {
    let space = build_address_space(&example());
    let base = "PEA_DemoPlant.Diagnostics";
    for attr in ["GatewayVersion", "ConnectorCount", "TagCount", "ServiceCount", "HealthStatus", "LastError"] {
        assert!(space.node(&format!("{base}.{attr}")).is_some(), "{attr} missing");
    }
    assert_eq!(
        space.read(&format!("{base}.TagCount")).unwrap().value,
        mtpgw_core::tag::Value::Int(5)
    );
}

#[test]
fn identical_configs_build_identical_node_id_sets() {
    let a = build_address_space(&example());
    let b = build_address_space(&example());
    assert_eq!(a.all_node_ids(), b.all_node_ids());

    let variables = a
        .nodes()
        .iter()
        .filter(|n| n.kind == NodeKind::Variable)
        .count();
    assert!(variables > 20);
}
