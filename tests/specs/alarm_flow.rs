// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The AnaMon limit scenario: feeding 50, 85, 95, 85, 50 through limits
//! hh=90 / h=80 / l=20 / ll=10 raises H, then HH, then clears them in
//! reverse as the value recedes.

use mtpgw_core::alarm::AlarmState;
use mtpgw_core::tag::TagValue;
use mtpgw_gateway::AlarmDetector;
use mtpgw_storage::{AlarmFilter, AlarmRepository, MemoryAlarmRepository};
use std::sync::Arc;

const CONFIG: &str = r#"
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
  - name: temp
    connector: plc1
    address: "40001"
    datatype: float32
data_assemblies:
  - name: TempMon
    type: AnaMon
    bindings:
      V: temp
    monitor_limits:
      hh_limit: 90.0
      h_limit: 80.0
      l_limit: 20.0
      ll_limit: 10.0
"#;

fn active(repo: &MemoryAlarmRepository) -> Vec<String> {
    let mut ids: Vec<String> = repo
        .list(&AlarmFilter { state: Some(AlarmState::Active), ..Default::default() })
        .unwrap()
        .into_iter()
        .map(|a| a.alarm_id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn ana_mon_limit_scenario() {
    let config = mtpgw_config::load_str(CONFIG).unwrap();
    let repo = Arc::new(MemoryAlarmRepository::new());
    let detector =
        AlarmDetector::from_config(&config, Arc::clone(&repo) as Arc<dyn AlarmRepository>, None);

    for (value, expected_active) in [
        (50.0, vec![]),
        (85.0, vec!["TempMon_H"]),
        (95.0, vec!["TempMon_H", "TempMon_HH"]),
        (85.0, vec!["TempMon_H"]),
        (50.0, vec![]),
    ] {
        detector.on_tag_change("temp", &TagValue::good(value));
        assert_eq!(active(&repo), expected_active, "after feeding {value}");
    }

    // Both alarms exist and are auto-cleared with full timestamps
    let all = repo.list(&AlarmFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
    for alarm in &all {
        assert_eq!(alarm.state, AlarmState::Cleared);
        assert!(alarm.cleared_at.is_some());
    }
}

#[test]
fn acknowledged_alarm_still_auto_clears() {
    let config = mtpgw_config::load_str(CONFIG).unwrap();
    let repo = Arc::new(MemoryAlarmRepository::new());
    let detector =
        AlarmDetector::from_config(&config, Arc::clone(&repo) as Arc<dyn AlarmRepository>, None);

    detector.on_tag_change("temp", &TagValue::good(85.0));
    let alarm = repo.find_active("TempMon_H", "TempMon").unwrap().unwrap();
    repo.acknowledge(alarm.id, "op", chrono::Utc::now()).unwrap();

    detector.on_tag_change("temp", &TagValue::good(50.0));
    let cleared = repo.get(alarm.id).unwrap();
    assert_eq!(cleared.state, AlarmState::Cleared);
    assert!(cleared.acknowledged_at.is_some());
    assert!(cleared.cleared_at.is_some());
}
