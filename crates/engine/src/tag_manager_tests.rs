// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mtpgw_adapters::{Connector, FakeConnector};
use mtpgw_core::safety::SafetyConfig;
use mtpgw_core::tag::{DataType, ScaleConfig, TagDefinition};

fn float_tag(name: &str, address: &str) -> TagDefinition {
    TagDefinition::builder()
        .name(name)
        .address(address)
        .datatype(DataType::Float32)
        .build()
}

fn writable_bool(name: &str, address: &str) -> TagDefinition {
    TagDefinition::builder()
        .name(name)
        .address(address)
        .datatype(DataType::Bool)
        .writable(true)
        .build()
}

fn manager_with(
    fake: &Arc<FakeConnector>,
    definitions: Vec<TagDefinition>,
    safety: Option<Arc<Safety>>,
) -> TagManager {
    let mut connectors: HashMap<String, Arc<dyn mtpgw_adapters::Connector>> = HashMap::new();
    connectors.insert("plc1".to_string(), Arc::clone(fake) as Arc<dyn mtpgw_adapters::Connector>);
    let mut intervals = HashMap::new();
    intervals.insert("plc1".to_string(), Duration::from_millis(20));
    TagManager::new(connectors, definitions, intervals, safety, None)
}

#[tokio::test]
async fn poll_loop_updates_values() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 10.0);

    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);
    manager.start();
    tokio::time::sleep(Duration::from_millis(80)).await;
    manager.stop().await;

    let value = manager.get_value("temp").unwrap();
    assert_eq!(value.value, Value::Float(10.0));
    assert_eq!(value.quality, Quality::Good);
}

#[tokio::test]
async fn scaling_applied_on_read() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 500.0);

    let definition = TagDefinition::builder()
        .name("temp")
        .address("40001")
        .datatype(DataType::Float32)
        .scale(Some(ScaleConfig { gain: 0.1, offset: -40.0 }))
        .build();

    let manager = manager_with(&fake, vec![definition], None);
    let value = manager.read_tag("temp").await.unwrap();
    assert_eq!(value.value, Value::Float(10.0));
}

#[tokio::test]
async fn subscribers_notified_only_on_change() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 1.0);

    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    manager.subscribe(Arc::new(move |name, value| {
        seen_cb.lock().push((name.to_string(), value.value.clone()));
    }));

    manager.read_tag("temp").await;
    manager.read_tag("temp").await; // unchanged, no second event
    fake.set_value("40001", 2.0);
    manager.read_tag("temp").await;

    let events = seen.lock().clone();
    assert_eq!(
        events,
        vec![
            ("temp".to_string(), Value::Float(1.0)),
            ("temp".to_string(), Value::Float(2.0)),
        ]
    );
}

#[tokio::test]
async fn unsubscribe_stops_notifications() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 1.0);

    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let count_cb = Arc::clone(&count);
    let id = manager.subscribe(Arc::new(move |_, _| {
        count_cb.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }));

    manager.read_tag("temp").await;
    manager.unsubscribe(id);
    fake.set_value("40001", 2.0);
    manager.read_tag("temp").await;

    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test]
async fn comm_loss_promotes_last_good_to_uncertain() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 7.0);

    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);
    manager.read_tag("temp").await;

    fake.set_fail_reads(true);
    manager.read_tag("temp").await;

    let value = manager.get_value("temp").unwrap();
    assert_eq!(value.quality, Quality::UncertainNoCommLastUsable);
    assert_eq!(value.value, Value::Float(7.0));
    assert!(value.source_timestamp.is_some());
}

#[tokio::test]
async fn comm_loss_substitution_is_not_rescaled() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 500.0);

    let definition = TagDefinition::builder()
        .name("temp")
        .address("40001")
        .datatype(DataType::Float32)
        .scale(Some(ScaleConfig { gain: 0.1, offset: -40.0 }))
        .build();
    let manager = manager_with(&fake, vec![definition], None);

    let good = manager.read_tag("temp").await.unwrap();
    assert_eq!(good.value, Value::Float(10.0));

    fake.set_fail_reads(true);
    manager.read_tag("temp").await;

    // The held-out value is the already-scaled last good one, untouched
    let value = manager.get_value("temp").unwrap();
    assert_eq!(value.quality, Quality::UncertainNoCommLastUsable);
    assert_eq!(value.value, Value::Float(10.0));
}

#[tokio::test]
async fn comm_loss_without_prior_value_is_bad() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_fail_reads(true);
    fake.set_value("40001", 7.0);

    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);
    manager.read_tag("temp").await;

    let value = manager.get_value("temp").unwrap();
    assert_eq!(value.quality, Quality::BadNoCommunication);
}

#[tokio::test]
async fn write_refused_for_unknown_or_readonly() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);

    assert!(!manager.write_tag("ghost", Value::Float(1.0)).await);
    assert!(!manager.write_tag("temp", Value::Float(1.0)).await);
    assert!(fake.recorded_writes().is_empty());
}

#[tokio::test]
async fn write_coerces_and_confirms() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("1", false);

    let manager = manager_with(&fake, vec![writable_bool("run_cmd", "1")], None);
    assert!(manager.write_tag("run_cmd", Value::Bool(true)).await);

    assert_eq!(fake.recorded_writes(), vec![("1".to_string(), Value::Bool(true))]);
    // Confirm re-read updated the cache
    assert_eq!(manager.get_value("run_cmd").unwrap().value, Value::Bool(true));
    assert_eq!(manager.get_tag("run_cmd").unwrap().write_count, 1);
}

#[tokio::test]
async fn write_rejects_uncoercible_values() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    let manager = manager_with(&fake, vec![writable_bool("run_cmd", "1")], None);

    assert!(!manager.write_tag("run_cmd", Value::Text("on".into())).await);
    assert!(fake.recorded_writes().is_empty());
}

#[tokio::test]
async fn write_applies_inverse_scaling() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();

    let definition = TagDefinition::builder()
        .name("sp")
        .address("40005")
        .datatype(DataType::Float32)
        .writable(true)
        .scale(Some(ScaleConfig { gain: 0.1, offset: 0.0 }))
        .build();
    let manager = manager_with(&fake, vec![definition], None);

    assert!(manager.write_tag("sp", Value::Float(10.0)).await);
    // 10.0 scaled back through gain 0.1 → raw 100.0
    assert_eq!(fake.recorded_writes()[0].1, Value::Float(100.0));
}

#[tokio::test]
async fn safety_allowlist_gates_writes() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();

    let mut config = SafetyConfig::default();
    config.write_allowlist.insert("allowed".to_string());
    let safety = Arc::new(Safety::new(config));

    let manager = manager_with(
        &fake,
        vec![writable_bool("allowed", "1"), writable_bool("blocked", "2")],
        Some(safety),
    );

    assert!(manager.write_tag("allowed", Value::Bool(true)).await);
    assert!(!manager.write_tag("blocked", Value::Bool(true)).await);
    assert_eq!(fake.recorded_writes().len(), 1);
}

#[tokio::test]
async fn statistics_aggregate() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("40001", 1.0);

    let manager = manager_with(&fake, vec![float_tag("temp", "40001")], None);
    manager.read_tag("temp").await;

    let stats = manager.statistics();
    assert_eq!(stats.total_tags, 1);
    assert_eq!(stats.total_reads, 1);
    assert_eq!(stats.good_quality_count, 1);
    assert_eq!(stats.bad_quality_count, 0);
}

#[tokio::test]
async fn value_snapshot_collects_current_values() {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    fake.set_value("10002", true);

    let manager = manager_with(
        &fake,
        vec![TagDefinition::builder()
            .name("valve_safe")
            .address("10002")
            .datatype(DataType::Bool)
            .build()],
        None,
    );
    manager.read_tag("valve_safe").await;

    let snapshot = manager.value_snapshot(&["valve_safe", "missing"]);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot["valve_safe"], Value::Bool(true));
}
