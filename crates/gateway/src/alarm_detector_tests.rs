// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mtpgw_core::alarm::AlarmState;
use mtpgw_core::tag::TagValue;
use mtpgw_storage::{AlarmFilter, MemoryAlarmRepository};

fn ana_mon_config() -> GatewayConfig {
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
  - name: temp
    connector: plc1
    address: "40001"
    datatype: float32
  - name: pump_ok
    connector: plc1
    address: "10001"
    datatype: bool
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
  - name: PumpMon
    type: BinMon
    bindings:
      V: pump_ok
    expected_state: true
"#;
    mtpgw_config::load_str(yaml).unwrap()
}

fn detector_with_repo() -> (AlarmDetector, Arc<MemoryAlarmRepository>) {
    let repo = Arc::new(MemoryAlarmRepository::new());
    let detector = AlarmDetector::from_config(
        &ana_mon_config(),
        Arc::clone(&repo) as Arc<dyn AlarmRepository>,
        None,
    );
    (detector, repo)
}

fn active_ids(repo: &MemoryAlarmRepository) -> Vec<String> {
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
fn monitors_indexed_by_source_tag() {
    let (detector, _) = detector_with_repo();
    assert_eq!(detector.monitor_count(), 2);
}

// Feeding 50, 85, 95, 85, 50 through limits 90/80/20/10 raises H, then
// HH, then clears them in reverse as the value recedes.
#[test]
fn analog_limit_sequence() {
    let (detector, repo) = detector_with_repo();

    detector.on_tag_change("temp", &TagValue::good(50.0));
    assert!(active_ids(&repo).is_empty());

    detector.on_tag_change("temp", &TagValue::good(85.0));
    assert_eq!(active_ids(&repo), vec!["TempMon_H"]);

    detector.on_tag_change("temp", &TagValue::good(95.0));
    assert_eq!(active_ids(&repo), vec!["TempMon_H", "TempMon_HH"]);

    detector.on_tag_change("temp", &TagValue::good(85.0));
    assert_eq!(active_ids(&repo), vec!["TempMon_H"]);

    detector.on_tag_change("temp", &TagValue::good(50.0));
    assert!(active_ids(&repo).is_empty());

    // Everything raised along the way ended up cleared
    let all = repo.list(&AlarmFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
    assert!(all.iter().all(|a| a.state == AlarmState::Cleared));
}

#[test]
fn low_limits_and_priorities() {
    let (detector, repo) = detector_with_repo();

    detector.on_tag_change("temp", &TagValue::good(15.0));
    let alarms = repo.list(&AlarmFilter::default()).unwrap();
    assert_eq!(alarms.len(), 1);
    assert_eq!(alarms[0].alarm_id, "TempMon_L");
    assert_eq!(alarms[0].priority, 2);

    detector.on_tag_change("temp", &TagValue::good(5.0));
    let ll = repo.find_active("TempMon_LL", "TempMon").unwrap().unwrap();
    assert_eq!(ll.priority, 1);
    assert_eq!(ll.value, Some(5.0));
}

#[test]
fn raising_is_idempotent_across_repeated_edges() {
    let (detector, repo) = detector_with_repo();

    detector.on_tag_change("temp", &TagValue::good(85.0));
    detector.on_tag_change("temp", &TagValue::good(86.0));
    detector.on_tag_change("temp", &TagValue::good(87.0));

    let alarms = repo.list(&AlarmFilter::default()).unwrap();
    assert_eq!(alarms.len(), 1, "one active H alarm, not three");
}

#[test]
fn binary_state_error() {
    let (detector, repo) = detector_with_repo();

    detector.on_tag_change("pump_ok", &TagValue::good(true));
    assert!(active_ids(&repo).is_empty());

    detector.on_tag_change("pump_ok", &TagValue::good(false));
    assert_eq!(active_ids(&repo), vec!["PumpMon_STATE_ERR"]);
    let alarm = repo.find_active("PumpMon_STATE_ERR", "PumpMon").unwrap().unwrap();
    assert_eq!(alarm.priority, 2);

    detector.on_tag_change("pump_ok", &TagValue::good(true));
    assert!(active_ids(&repo).is_empty());
}

#[test]
fn unmonitored_tags_ignored() {
    let (detector, repo) = detector_with_repo();
    detector.on_tag_change("unrelated", &TagValue::good(1000.0));
    assert!(repo.list(&AlarmFilter::default()).unwrap().is_empty());
}

#[test]
fn default_limits_applied_when_unconfigured() {
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
  - name: temp
    connector: plc1
    address: "40001"
    datatype: float32
data_assemblies:
  - name: TempMon
    type: AnaMon
    bindings:
      V: temp
"#;
    let config = mtpgw_config::load_str(yaml).unwrap();
    let repo = Arc::new(MemoryAlarmRepository::new());
    let detector =
        AlarmDetector::from_config(&config, Arc::clone(&repo) as Arc<dyn AlarmRepository>, None);

    // Defaults are hh=95, h=90
    detector.on_tag_change("temp", &TagValue::good(92.0));
    assert_eq!(active_ids(&repo), vec!["TempMon_H"]);
    detector.on_tag_change("temp", &TagValue::good(96.0));
    assert_eq!(active_ids(&repo), vec!["TempMon_H", "TempMon_HH"]);
}
