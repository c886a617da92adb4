// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::packml::PackMlState;

#[yare::parameterized(
    eq_true   = { ComparisonOp::Eq, Value::Float(5.0), Value::Int(5), true },
    eq_false  = { ComparisonOp::Eq, Value::Float(5.1), Value::Int(5), false },
    ne_true   = { ComparisonOp::Ne, Value::Int(4), Value::Int(5), true },
    gt_true   = { ComparisonOp::Gt, Value::Float(5.5), Value::Int(5), true },
    gt_false  = { ComparisonOp::Gt, Value::Int(5), Value::Int(5), false },
    ge_true   = { ComparisonOp::Ge, Value::Int(5), Value::Float(5.0), true },
    lt_true   = { ComparisonOp::Lt, Value::Int(4), Value::Float(4.5), true },
    le_true   = { ComparisonOp::Le, Value::Float(4.5), Value::Float(4.5), true },
    le_false  = { ComparisonOp::Le, Value::Float(4.6), Value::Float(4.5), false },
)]
fn comparison_ops(op: ComparisonOp, current: Value, reference: Value, expected: bool) {
    assert_eq!(op.evaluate(&current, &reference), expected);
}

#[test]
fn comparison_incomparable_operands() {
    // String vs number: only != holds
    assert!(!ComparisonOp::Eq.evaluate(&Value::Text("x".into()), &Value::Int(1)));
    assert!(ComparisonOp::Ne.evaluate(&Value::Text("x".into()), &Value::Int(1)));
    assert!(!ComparisonOp::Gt.evaluate(&Value::Text("x".into()), &Value::Int(1)));
}

#[test]
fn completion_condition_evaluates() {
    let cond = CompletionCondition {
        tag: "level".into(),
        op: ComparisonOp::Ge,
        reference: Value::Float(90.0),
    };
    assert!(!cond.evaluate(&Value::Float(89.9)));
    assert!(cond.evaluate(&Value::Float(90.0)));
    assert!(cond.evaluate(&Value::Int(91)));
}

#[test]
fn state_hooks_lookup() {
    let mut map = HashMap::new();
    map.insert(
        PackMlState::Starting,
        vec![WriteAction { tag: "PLC.Start".into(), value: Value::Bool(true) }],
    );
    map.insert(PackMlState::Execute, vec![]);
    let hooks = StateHooks::new(map);

    assert_eq!(hooks.for_state(PackMlState::Starting).len(), 1);
    assert!(hooks.for_state(PackMlState::Execute).is_empty());
    assert!(hooks.for_state(PackMlState::Aborting).is_empty());

    let states: Vec<_> = hooks.states().collect();
    assert_eq!(states, vec![PackMlState::Starting]);
}

#[test]
fn default_procedure_prefers_flagged() {
    let svc = ServiceDefinition::builder()
        .procedures(vec![
            ProcedureDefinition { id: 0, name: "a".into(), is_default: false, parameters: vec![] },
            ProcedureDefinition { id: 2, name: "b".into(), is_default: true, parameters: vec![] },
        ])
        .build();
    assert_eq!(svc.default_procedure_id(), 2);
}

#[test]
fn default_procedure_falls_back_to_zero() {
    let svc = ServiceDefinition::builder()
        .procedures(vec![ProcedureDefinition {
            id: 3,
            name: "only".into(),
            is_default: false,
            parameters: vec![],
        }])
        .build();
    assert_eq!(svc.default_procedure_id(), 0);
}

#[test]
fn acting_condition_lookup() {
    let svc = ServiceDefinition::builder()
        .acting_state_conditions(vec![ActingStateCondition {
            state: PackMlState::Starting,
            condition: CompletionCondition {
                tag: "ready".into(),
                op: ComparisonOp::Eq,
                reference: Value::Bool(true),
            },
        }])
        .build();
    assert!(svc.acting_condition(PackMlState::Starting).is_some());
    assert!(svc.acting_condition(PackMlState::Stopping).is_none());
}

#[test]
fn proxy_mode_serde() {
    assert_eq!(serde_json::to_string(&ProxyMode::Thin).unwrap(), "\"thin\"");
    let parsed: ProxyMode = serde_json::from_str("\"hybrid\"").unwrap();
    assert_eq!(parsed, ProxyMode::Hybrid);
}

#[test]
fn comparison_op_serde_symbols() {
    assert_eq!(serde_json::to_string(&ComparisonOp::Ge).unwrap(), "\">=\"");
    let parsed: ComparisonOp = serde_json::from_str("\"!=\"").unwrap();
    assert_eq!(parsed, ComparisonOp::Ne);
}
