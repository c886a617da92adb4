// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Example configuration emitted by `mtpgw generate-example`.

/// A complete, valid example document exercising every section.
pub fn example_yaml() -> String {
    EXAMPLE.to_string()
}

const EXAMPLE: &str = r#"version: "1.2"

gateway:
  name: DemoPlant
  version: 1.0.0
  description: Demonstration PEA bridging a Modbus PLC

opcua:
  endpoint: opc.tcp://0.0.0.0:4840/mtpgw
  namespace_uri: urn:demo:mtpgw:pea1

connectors:
  - name: plc1
    type: modbus_tcp
    host: 192.168.1.10
    port: 502
    unit_id: 1
    poll_interval_ms: 1000
    timeout_ms: 2000
    retry_delay_ms: 1000
    retry_count: 10

tags:
  - name: temp
    connector: plc1
    address: "40001"
    datatype: float32
    scale:
      gain: 1.0
      offset: 0.0
    unit: degC
    description: Reactor temperature
  - name: level
    connector: plc1
    address: "40003"
    datatype: float32
    unit: percent
  - name: run_cmd
    connector: plc1
    address: "1"
    datatype: bool
    writable: true
  - name: running
    connector: plc1
    address: "10001"
    datatype: bool
  - name: valve_safe
    connector: plc1
    address: "10002"
    datatype: bool

data_assemblies:
  - name: TempMon
    type: AnaMon
    bindings:
      V: temp
    v_scl_min: 0.0
    v_scl_max: 150.0
    v_unit: 1001
    monitor_limits:
      hh_limit: 95.0
      h_limit: 90.0
      l_limit: 10.0
      ll_limit: 5.0
  - name: LevelView
    type: AnaView
    bindings:
      V: level
    v_scl_min: 0.0
    v_scl_max: 100.0
  - name: RunState
    type: BinView
    bindings:
      V: running
    v_state_0: Stopped
    v_state_1: Running

services:
  - name: Mix
    mode: thick
    procedures:
      - id: 0
        name: Default
        is_default: true
    state_hooks:
      on_starting:
        - tag: run_cmd
          value: true
      on_stopping:
        - tag: run_cmd
          value: false
      on_aborting:
        - tag: run_cmd
          value: false
    completion:
      condition:
        tag: level
        op: ">="
        ref: 90.0
      timeout_s: 600.0

interlocks:
  Mix:
    - source_tag: valve_safe
      required_value: true
      message: safety valve not confirmed

safety:
  write_allowlist:
    - run_cmd
  max_writes_per_second: 10.0
  burst: 5
  safe_state:
    run_cmd: false

webui:
  enabled: true
  bind: 0.0.0.0
  port: 8080
  min_update_interval_ms: 100
  history:
    flush_interval_ms: 1000
    max_buffer_size: 100
  auth:
    jwt_secret: change-me
    token_ttl_minutes: 60
    users:
      - username: operator
        password: operator
        role: operator
      - username: admin
        password: admin
        role: admin

storage:
  data_dir: ./data
"#;

#[cfg(test)]
#[path = "example_tests.rs"]
mod tests;
