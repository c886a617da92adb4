// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::tag_manager::TagManager;
use mtpgw_adapters::{Connector, FakeConnector};
use mtpgw_core::service::{
    CompletionCondition, CompletionSpec, ComparisonOp, ProcedureDefinition, StateHooks,
};
use mtpgw_core::interlock::InterlockBinding;
use mtpgw_core::tag::{DataType, TagDefinition};
use std::time::Duration;

fn bool_tag(name: &str, address: &str, writable: bool) -> TagDefinition {
    TagDefinition::builder()
        .name(name)
        .address(address)
        .datatype(DataType::Bool)
        .writable(writable)
        .build()
}

fn int_tag(name: &str, address: &str, writable: bool) -> TagDefinition {
    TagDefinition::builder()
        .name(name)
        .address(address)
        .datatype(DataType::Int32)
        .writable(writable)
        .build()
}

fn float_tag(name: &str, address: &str) -> TagDefinition {
    TagDefinition::builder()
        .name(name)
        .address(address)
        .datatype(DataType::Float32)
        .build()
}

struct Fixture {
    fake: Arc<FakeConnector>,
    tags: TagManager,
}

async fn fixture(definitions: Vec<TagDefinition>) -> Fixture {
    let fake = Arc::new(FakeConnector::new("plc1"));
    fake.connect().await.unwrap();
    let mut connectors: HashMap<String, Arc<dyn mtpgw_adapters::Connector>> = HashMap::new();
    connectors.insert("plc1".to_string(), Arc::clone(&fake) as Arc<dyn mtpgw_adapters::Connector>);
    let mut intervals = HashMap::new();
    intervals.insert("plc1".to_string(), Duration::from_millis(20));
    let tags = TagManager::new(connectors, definitions, intervals, None, None);
    Fixture { fake, tags }
}

fn hooks(entries: &[(PackMlState, &str, Value)]) -> StateHooks {
    let mut map: HashMap<PackMlState, Vec<WriteAction>> = HashMap::new();
    for (state, tag, value) in entries {
        map.entry(*state).or_default().push(WriteAction {
            tag: (*tag).to_string(),
            value: value.clone(),
        });
    }
    StateHooks::new(map)
}

fn subscribe_log(manager: &ServiceManager) -> Arc<parking_lot::Mutex<Vec<(String, PackMlState, PackMlState)>>> {
    let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let log_cb = Arc::clone(&log);
    manager.subscribe(Arc::new(move |service, from, to| {
        log_cb.lock().push((service.to_string(), from, to));
    }));
    log
}

async fn wait_for_state(
    manager: &ServiceManager,
    service: &str,
    state: PackMlState,
    timeout: Duration,
) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if manager.get_service_state(service) == Some(state) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

// THICK happy path: IDLE → STARTING → EXECUTE → COMPLETING → COMPLETED
// with two hook writes and an immediate COMPLETE from the self-completing
// monitor.
#[tokio::test]
async fn thick_self_completing_happy_path() {
    let fx = fixture(vec![
        bool_tag("PLC.Start", "1", true),
        bool_tag("PLC.Run", "2", true),
    ])
    .await;

    let definition = ServiceDefinition::builder()
        .name("Mix")
        .state_hooks(hooks(&[
            (PackMlState::Starting, "PLC.Start", Value::Bool(true)),
            (PackMlState::Execute, "PLC.Run", Value::Bool(true)),
        ]))
        .completion(CompletionSpec { self_completing: true, condition: None, timeout_s: None })
        .build();

    let manager =
        ServiceManager::new(fx.tags.clone(), vec![definition], ServiceManagerConfig::default());
    let log = subscribe_log(&manager);

    let result = manager.send_command("Mix", PackMlCommand::Start, None).await;
    assert!(result.success);

    assert!(wait_for_state(&manager, "Mix", PackMlState::Completed, Duration::from_secs(2)).await);

    let traversal: Vec<(PackMlState, PackMlState)> =
        log.lock().iter().map(|(_, from, to)| (*from, *to)).collect();
    assert_eq!(
        traversal,
        vec![
            (PackMlState::Idle, PackMlState::Starting),
            (PackMlState::Starting, PackMlState::Execute),
            (PackMlState::Execute, PackMlState::Completing),
            (PackMlState::Completing, PackMlState::Completed),
        ]
    );

    let writes = fx.fake.recorded_writes();
    assert_eq!(
        writes,
        vec![
            ("1".to_string(), Value::Bool(true)),
            ("2".to_string(), Value::Bool(true)),
        ]
    );
}

#[tokio::test]
async fn thick_condition_completion() {
    let fx = fixture(vec![float_tag("level", "40003")]).await;
    fx.fake.set_value("40003", 10.0);
    fx.tags.read_tag("level").await;

    let definition = ServiceDefinition::builder()
        .name("Fill")
        .completion(CompletionSpec {
            self_completing: false,
            condition: Some(CompletionCondition {
                tag: "level".into(),
                op: ComparisonOp::Ge,
                reference: Value::Float(90.0),
            }),
            timeout_s: None,
        })
        .build();

    let manager =
        ServiceManager::new(fx.tags.clone(), vec![definition], ServiceManagerConfig::default());
    manager.send_command("Fill", PackMlCommand::Start, None).await;
    assert!(wait_for_state(&manager, "Fill", PackMlState::Execute, Duration::from_secs(1)).await);

    // Still executing while below the threshold
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(manager.get_service_state("Fill"), Some(PackMlState::Execute));

    fx.fake.set_value("40003", 95.0);
    fx.tags.read_tag("level").await;

    assert!(wait_for_state(&manager, "Fill", PackMlState::Completed, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn thick_timeout_aborts() {
    let fx = fixture(vec![]).await;

    let definition = ServiceDefinition::builder()
        .name("Slow")
        .completion(CompletionSpec {
            self_completing: false,
            condition: None,
            timeout_s: Some(0.2),
        })
        .build();

    let manager =
        ServiceManager::new(fx.tags.clone(), vec![definition], ServiceManagerConfig::default());
    manager.send_command("Slow", PackMlCommand::Start, None).await;

    assert!(wait_for_state(&manager, "Slow", PackMlState::Aborted, Duration::from_secs(2)).await);
}

// THIN proxying: START writes 2 to the command tag, then a PLC state
// change from 1 to 3 is adopted and fanned out.
#[tokio::test]
async fn thin_service_writes_command_and_syncs_state() {
    let fx = fixture(vec![
        int_tag("PLC.SC", "100", false),
        int_tag("PLC.CO", "101", true),
    ])
    .await;
    fx.fake.set_value("100", 1i64);
    fx.tags.read_tag("PLC.SC").await;

    let definition = ServiceDefinition::builder()
        .name("Heat")
        .mode(ProxyMode::Thin)
        .state_cur_tag("PLC.SC")
        .command_op_tag("PLC.CO")
        .build();

    let manager =
        ServiceManager::new(fx.tags.clone(), vec![definition], ServiceManagerConfig::default());
    let log = subscribe_log(&manager);
    manager.start();
    fx.tags.start();

    let result = manager.send_command("Heat", PackMlCommand::Start, None).await;
    assert!(result.success);
    assert_eq!(result.to_state, None, "thin mode defers to the PLC");

    // Exactly one write: command value 2 (START)
    let writes = fx.fake.recorded_writes();
    assert_eq!(writes, vec![("101".to_string(), Value::Int(2))]);

    // PLC reports EXECUTE (3); the sync loop adopts it
    fx.fake.set_value("100", 3i64);
    assert!(wait_for_state(&manager, "Heat", PackMlState::Execute, Duration::from_secs(2)).await);

    let adopted = log
        .lock()
        .iter()
        .any(|(svc, from, to)| svc == "Heat" && *from == PackMlState::Idle && *to == PackMlState::Execute);
    assert!(adopted, "subscribers see IDLE → EXECUTE");

    manager.stop().await;
    fx.tags.stop().await;
}

// An interlocked START is refused with the configured message and leaves
// the state unchanged; clearing the source lets the retry through.
#[tokio::test]
async fn interlock_blocks_start_until_clear() {
    let fx = fixture(vec![bool_tag("valve_safe", "10", false)]).await;
    fx.fake.set_value("10", false);
    fx.tags.read_tag("valve_safe").await;

    let mut bindings = HashMap::new();
    bindings.insert(
        "Dosing".to_string(),
        vec![InterlockBinding {
            source_tag: "valve_safe".into(),
            required_value: Value::Bool(true),
            message: "dosing interlock active".into(),
        }],
    );

    let definition = ServiceDefinition::builder().name("Dosing").build();
    let manager = ServiceManager::new(
        fx.tags.clone(),
        vec![definition],
        ServiceManagerConfig {
            interlocks: Some(InterlockEvaluator::new(bindings)),
            ..Default::default()
        },
    );

    let result = manager.send_command("Dosing", PackMlCommand::Start, None).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("interlock"));
    assert_eq!(manager.get_service_state("Dosing"), Some(PackMlState::Idle));

    fx.fake.set_value("10", true);
    fx.tags.read_tag("valve_safe").await;

    let retry = manager.send_command("Dosing", PackMlCommand::Start, None).await;
    assert!(retry.success);
}

#[tokio::test]
async fn interlock_never_blocks_abort() {
    let fx = fixture(vec![bool_tag("valve_safe", "10", false)]).await;
    // No value at all: the interlock would block START

    let mut bindings = HashMap::new();
    bindings.insert(
        "Dosing".to_string(),
        vec![InterlockBinding {
            source_tag: "valve_safe".into(),
            required_value: Value::Bool(true),
            message: "blocked".into(),
        }],
    );

    let definition = ServiceDefinition::builder().name("Dosing").build();
    let manager = ServiceManager::new(
        fx.tags.clone(),
        vec![definition],
        ServiceManagerConfig {
            interlocks: Some(InterlockEvaluator::new(bindings)),
            ..Default::default()
        },
    );

    let abort = manager.send_command("Dosing", PackMlCommand::Abort, None).await;
    assert!(abort.success);
    let stop_after_clear = manager.send_command("Dosing", PackMlCommand::Stop, None).await;
    // ABORTING accepts no STOP, but the refusal came from the table, not
    // the interlock evaluator
    assert!(!stop_after_clear.success);
    assert!(!stop_after_clear.error.unwrap().contains("interlock"));
}

#[tokio::test]
async fn start_selects_default_procedure() {
    let fx = fixture(vec![]).await;
    let definition = ServiceDefinition::builder()
        .name("Mix")
        .procedures(vec![
            ProcedureDefinition { id: 0, name: "A".into(), is_default: false, parameters: vec![] },
            ProcedureDefinition { id: 2, name: "B".into(), is_default: true, parameters: vec![] },
        ])
        .completion(CompletionSpec { self_completing: true, condition: None, timeout_s: None })
        .build();

    let manager =
        ServiceManager::new(fx.tags.clone(), vec![definition], ServiceManagerConfig::default());

    manager.send_command("Mix", PackMlCommand::Start, None).await;
    assert_eq!(manager.get_status("Mix").unwrap().current_procedure_id, Some(2));

    wait_for_state(&manager, "Mix", PackMlState::Completed, Duration::from_secs(2)).await;
    manager.send_command("Mix", PackMlCommand::Reset, None).await;
    wait_for_state(&manager, "Mix", PackMlState::Idle, Duration::from_secs(2)).await;

    manager.send_command("Mix", PackMlCommand::Start, Some(7)).await;
    assert_eq!(manager.get_status("Mix").unwrap().current_procedure_id, Some(7));
}

#[tokio::test]
async fn unknown_service_rejected() {
    let fx = fixture(vec![]).await;
    let manager = ServiceManager::new(fx.tags.clone(), vec![], ServiceManagerConfig::default());
    let result = manager.send_command("Ghost", PackMlCommand::Start, None).await;
    assert!(!result.success);
    assert_eq!(result.from_state, PackMlState::Undefined);
}

#[tokio::test]
async fn emergency_stop_forces_safe_state_and_aborts() {
    let fx = fixture(vec![bool_tag("run_cmd", "1", true)]).await;

    let mut safety_config = mtpgw_core::safety::SafetyConfig::default();
    safety_config.safe_state.insert("run_cmd".to_string(), Value::Bool(false));
    let safety = Arc::new(Safety::new(safety_config));

    let definition = ServiceDefinition::builder().name("Mix").build();
    let manager = ServiceManager::new(
        fx.tags.clone(),
        vec![definition],
        ServiceManagerConfig { safety: Some(safety), ..Default::default() },
    );

    manager.send_command("Mix", PackMlCommand::Start, None).await;
    manager.emergency_stop().await;

    assert!(wait_for_state(&manager, "Mix", PackMlState::Aborted, Duration::from_secs(2)).await);
    assert!(fx
        .fake
        .recorded_writes()
        .contains(&("1".to_string(), Value::Bool(false))));

    // Idempotent: a second stop leaves the same final state
    manager.emergency_stop().await;
    assert_eq!(manager.get_service_state("Mix"), Some(PackMlState::Aborted));
}

#[tokio::test]
async fn recovery_restores_and_consumes_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path().join("snap.json")).unwrap());
    store
        .save(ServiceSnapshot {
            service_name: "Mix".into(),
            state: "HELD".into(),
            procedure_id: Some(3),
            saved_at: Utc::now(),
        })
        .unwrap();
    store
        .save(ServiceSnapshot {
            service_name: "Ghost".into(),
            state: "EXECUTE".into(),
            procedure_id: None,
            saved_at: Utc::now(),
        })
        .unwrap();

    let fx = fixture(vec![]).await;
    let definition = ServiceDefinition::builder().name("Mix").build();
    let manager = ServiceManager::new(
        fx.tags.clone(),
        vec![definition],
        ServiceManagerConfig { snapshots: Some(Arc::clone(&store)), ..Default::default() },
    );

    manager.recover().await;

    assert_eq!(manager.get_service_state("Mix"), Some(PackMlState::Held));
    assert_eq!(manager.get_status("Mix").unwrap().current_procedure_id, Some(3));
    // Consumed snapshot is gone; the unknown one is left for inspection
    assert!(store.get("Mix").is_none());
    assert!(store.get("Ghost").is_some());
}

#[tokio::test]
async fn failed_transition_leaves_state_unchanged() {
    let fx = fixture(vec![]).await;
    let definition = ServiceDefinition::builder().name("Mix").build();
    let manager =
        ServiceManager::new(fx.tags.clone(), vec![definition], ServiceManagerConfig::default());

    let before = manager.get_service_state("Mix").unwrap();
    let result = manager.send_command("Mix", PackMlCommand::Complete, None).await;
    assert!(!result.success);
    assert_eq!(manager.get_service_state("Mix").unwrap(), before);
}
