// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The manifest/server NodeId contract: two services (one THICK with two
//! procedures, one THIN) and two data assemblies (AnaView, BinVlv).

use mtpgw_northbound::{build_address_space, manifest, ManifestGenerator, NodeSetGenerator};
use std::collections::HashSet;

const CONFIG: &str = r#"
gateway:
  name: Contract
opcua:
  endpoint: opc.tcp://0.0.0.0:4840/contract
  namespace_uri: urn:contract:pea
connectors:
  - name: plc1
    type: modbus_tcp
    host: h
tags:
  - name: level
    connector: plc1
    address: "40001"
    datatype: float32
  - name: valve_fb
    connector: plc1
    address: "10001"
    datatype: bool
  - name: sc
    connector: plc1
    address: "40003"
    datatype: int32
  - name: co
    connector: plc1
    address: "40004"
    datatype: int32
    writable: true
data_assemblies:
  - name: LevelView
    type: AnaView
    bindings:
      V: level
    v_scl_min: 0.0
    v_scl_max: 100.0
  - name: FeedValve
    type: BinVlv
    bindings:
      V: valve_fb
      VFbkOpen: valve_fb
services:
  - name: Mix
    mode: thick
    procedures:
      - id: 0
        name: Standard
        is_default: true
      - id: 1
        name: Gentle
  - name: Heat
    mode: thin
    state_cur_tag: sc
    command_op_tag: co
"#;

fn config() -> mtpgw_config::GatewayConfig {
    let config = mtpgw_config::load_str(CONFIG).unwrap();
    let report = mtpgw_config::validate(&config, true);
    assert!(!report.has_errors(), "{report}");
    config
}

// Every *NodeId value in the manifest XML is also reported by the
// server's address space, and successive deterministic generations are
// byte-identical.
#[test]
fn manifest_node_ids_exist_on_server() {
    let config = config();
    let generator = ManifestGenerator::new(&config, true);
    let xml = generator.generate().unwrap();

    let server_ids: HashSet<String> = build_address_space(&config).all_node_ids().into_iter().collect();
    let triples = manifest::parse_triples(&xml).unwrap();
    assert!(!triples.is_empty());
    for triple in &triples {
        assert!(
            server_ids.contains(&triple.node_id),
            "{} not exposed by the server",
            triple.node_id
        );
    }

    let again = ManifestGenerator::new(&config, true).generate().unwrap();
    assert_eq!(xml, again, "deterministic manifests must be byte-identical");
}

#[test]
fn service_variable_sets_are_equal() {
    let config = config();
    let space = build_address_space(&config);
    let generator = ManifestGenerator::new(&config, true);

    let manifest_service_ids: HashSet<String> = generator
        .all_node_ids()
        .into_iter()
        .filter(|id| id.contains(".Services."))
        .collect();
    let server_service_ids: HashSet<String> = space
        .service_nodes
        .values()
        .flat_map(|nodes| {
            [
                nodes.command_op.clone(),
                nodes.state_cur.clone(),
                nodes.procedure_cur.clone(),
                nodes.procedure_req.clone(),
            ]
        })
        .map(|path| space.strategy().expanded(&path))
        .collect();

    assert_eq!(manifest_service_ids, server_service_ids);
    // Two services, four variables each
    assert_eq!(server_service_ids.len(), 8);
}

#[test]
fn two_server_builds_expose_identical_node_id_sets() {
    let config = config();
    let first = build_address_space(&config).all_node_ids();
    let second = build_address_space(&config).all_node_ids();
    assert_eq!(first, second);
}

#[test]
fn nodeset_is_deterministic_and_aligned() {
    let config = config();
    let a = NodeSetGenerator::new(&config, true).generate().unwrap();
    let b = NodeSetGenerator::new(&config, true).generate().unwrap();
    assert_eq!(a, b);

    // The nodeset uses the same path strings under index 1
    for path in ["PEA_Contract.Services.Mix.StateCur", "PEA_Contract.DataAssemblies.LevelView.V"] {
        assert!(a.contains(&format!("ns=1;s={path}")), "{path} missing");
    }
}
