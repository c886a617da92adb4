// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service scenarios driven from configuration documents: the THICK
//! happy path, the THIN proxy, and interlocked starts.

use mtpgw_adapters::{Connector, FakeConnector};
use mtpgw_core::packml::{PackMlCommand, PackMlState};
use mtpgw_core::tag::Value;
use mtpgw_engine::{ServiceManager, ServiceManagerConfig, TagManager};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

struct Rig {
    fake: Arc<FakeConnector>,
    tags: TagManager,
    services: ServiceManager,
}

async fn rig(yaml: &str, with_interlocks: bool) -> Rig {
    let config = mtpgw_config::load_str(yaml).unwrap();
    let report = mtpgw_config::validate(&config, false);
    assert!(!report.has_errors(), "config invalid:\n{report}");

    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
    connectors.insert("plc1".to_string(), Arc::clone(&fake) as Arc<dyn Connector>);
    let mut intervals = HashMap::new();
    intervals.insert("plc1".to_string(), Duration::from_millis(20));

    let tags = TagManager::new(connectors, config.tag_definitions(), intervals, None, None);
    let services = ServiceManager::new(
        tags.clone(),
        config.service_definitions(),
        ServiceManagerConfig {
            interlocks: with_interlocks.then(|| config.interlock_evaluator()),
            ..Default::default()
        },
    );
    Rig { fake, tags, services }
}

async fn wait_for_state(rig: &Rig, service: &str, state: PackMlState) -> bool {
    for _ in 0..100 {
        if rig.services.get_service_state(service) == Some(state) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// Scenario: THICK self-completing service traverses
// IDLE → STARTING → EXECUTE → COMPLETING → COMPLETED with two hook writes.
#[tokio::test]
async fn thick_service_happy_path() {
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
  - name: PLC.Start
    connector: plc1
    address: "1"
    datatype: bool
    writable: true
  - name: PLC.Run
    connector: plc1
    address: "2"
    datatype: bool
    writable: true
services:
  - name: Mix
    mode: thick
    completion:
      self_completing: true
    state_hooks:
      on_starting:
        - tag: PLC.Start
          value: true
      on_execute:
        - tag: PLC.Run
          value: true
"#;
    let rig = rig(yaml, false).await;

    let traversal = Arc::new(Mutex::new(vec![]));
    let seen = Arc::clone(&traversal);
    rig.services.subscribe(Arc::new(move |_, from, to| {
        seen.lock().push((from, to));
    }));

    let result = rig.services.send_command("Mix", PackMlCommand::Start, None).await;
    assert!(result.success);
    assert!(wait_for_state(&rig, "Mix", PackMlState::Completed).await);

    assert_eq!(
        *traversal.lock(),
        vec![
            (PackMlState::Idle, PackMlState::Starting),
            (PackMlState::Starting, PackMlState::Execute),
            (PackMlState::Execute, PackMlState::Completing),
            (PackMlState::Completing, PackMlState::Completed),
        ]
    );
    assert_eq!(
        rig.fake.recorded_writes(),
        vec![
            ("1".to_string(), Value::Bool(true)),
            ("2".to_string(), Value::Bool(true)),
        ]
    );
}

// Scenario: THIN service writes command value 2 to the PLC; a reported
// state change from 1 to 3 is adopted as IDLE → EXECUTE.
#[tokio::test]
async fn thin_service_proxies_to_plc() {
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
    poll_interval_ms: 20
tags:
  - name: PLC.SC
    connector: plc1
    address: "40010"
    datatype: int32
  - name: PLC.CO
    connector: plc1
    address: "40011"
    datatype: int32
    writable: true
services:
  - name: Heat
    mode: thin
    state_cur_tag: PLC.SC
    command_op_tag: PLC.CO
"#;
    let rig = rig(yaml, false).await;
    rig.fake.set_value("40010", 1i64);
    rig.tags.read_tag("PLC.SC").await;
    rig.tags.start();
    rig.services.start();

    let notified = Arc::new(Mutex::new(vec![]));
    let seen = Arc::clone(&notified);
    rig.services.subscribe(Arc::new(move |_, from, to| {
        seen.lock().push((from, to));
    }));

    let result = rig.services.send_command("Heat", PackMlCommand::Start, None).await;
    assert!(result.success);
    assert_eq!(result.to_state, None);
    assert_eq!(
        rig.fake.recorded_writes(),
        vec![("40011".to_string(), Value::Int(2))],
        "exactly one write: the START command value"
    );

    rig.fake.set_value("40010", 3i64);
    assert!(wait_for_state(&rig, "Heat", PackMlState::Execute).await);
    assert!(notified
        .lock()
        .contains(&(PackMlState::Idle, PackMlState::Execute)));

    rig.services.stop().await;
    rig.tags.stop().await;
}

// Scenario: an interlocked START is refused with the reason and no state
// change; clearing the source lets the retry through.
#[tokio::test]
async fn interlock_gates_start() {
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
  - name: valve_safe
    connector: plc1
    address: "10001"
    datatype: bool
services:
  - name: Dosing
    mode: thick
interlocks:
  Dosing:
    - source_tag: valve_safe
      required_value: true
      message: dosing interlock active
"#;
    let rig = rig(yaml, true).await;
    rig.fake.set_value("10001", false);
    rig.tags.read_tag("valve_safe").await;

    let blocked = rig.services.send_command("Dosing", PackMlCommand::Start, None).await;
    assert!(!blocked.success);
    assert!(blocked.error.unwrap().contains("interlock"));
    assert_eq!(rig.services.get_service_state("Dosing"), Some(PackMlState::Idle));

    rig.fake.set_value("10001", true);
    rig.tags.read_tag("valve_safe").await;

    let allowed = rig.services.send_command("Dosing", PackMlCommand::Start, None).await;
    assert!(allowed.success);
}
