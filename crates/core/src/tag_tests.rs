// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::strategies::*;
use proptest::prelude::*;

#[yare::parameterized(
    good            = { Quality::Good, true, false, false },
    local_override  = { Quality::GoodLocalOverride, true, false, false },
    uncertain       = { Quality::Uncertain, false, true, false },
    no_comm_last    = { Quality::UncertainNoCommLastUsable, false, true, false },
    bad             = { Quality::Bad, false, false, true },
    no_comm         = { Quality::BadNoCommunication, false, false, true },
    config_err      = { Quality::BadConfigError, false, false, true },
)]
fn quality_bands(q: Quality, good: bool, uncertain: bool, bad: bool) {
    assert_eq!(q.is_good(), good);
    assert_eq!(q.is_uncertain(), uncertain);
    assert_eq!(q.is_bad(), bad);
}

#[yare::parameterized(
    good      = { Quality::Good, 0x0000_0000 },
    uncertain = { Quality::UncertainNoCommLastUsable, 0x408F_0000 },
    no_comm   = { Quality::BadNoCommunication, 0x8031_0000 },
    config    = { Quality::BadConfigError, 0x8089_0000 },
    not_conn  = { Quality::BadNotConnected, 0x80AB_0000 },
)]
fn quality_status_codes(q: Quality, code: u32) {
    assert_eq!(q.status_code(), code);
}

#[test]
fn quality_serde_uses_opcua_names() {
    let json = serde_json::to_string(&Quality::UncertainNoCommLastUsable).unwrap();
    assert_eq!(json, "\"Uncertain_NoCommunicationLastUsable\"");
    let parsed: Quality = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, Quality::UncertainNoCommLastUsable);
}

#[test]
fn scale_apply_and_reverse() {
    let scale = ScaleConfig { gain: 2.0, offset: 10.0 };
    assert_eq!(scale.apply(5.0), 20.0);
    assert_eq!(scale.reverse(20.0), Some(5.0));
}

#[test]
fn scale_reverse_zero_gain() {
    let scale = ScaleConfig { gain: 0.0, offset: 10.0 };
    assert_eq!(scale.reverse(20.0), None);
}

#[test]
fn value_coerce_int_range() {
    assert_eq!(Value::Int(70000).coerce(DataType::Uint16), None);
    assert_eq!(Value::Int(65535).coerce(DataType::Uint16), Some(Value::Int(65535)));
    assert_eq!(Value::Int(-1).coerce(DataType::Uint32), None);
    assert_eq!(Value::Float(2.7).coerce(DataType::Int16), Some(Value::Int(2)));
}

#[test]
fn value_coerce_string_never_implicit() {
    assert_eq!(Value::Text("5".into()).coerce(DataType::Int32), None);
    assert_eq!(Value::Int(5).coerce(DataType::String), None);
    assert_eq!(
        Value::Text("x".into()).coerce(DataType::String),
        Some(Value::Text("x".into()))
    );
}

#[test]
fn value_compare_mixed_numeric() {
    use std::cmp::Ordering;
    assert_eq!(Value::Int(3).compare(&Value::Float(3.0)), Some(Ordering::Equal));
    assert_eq!(Value::Float(2.5).compare(&Value::Int(3)), Some(Ordering::Less));
    assert_eq!(Value::Text("a".into()).compare(&Value::Int(3)), None);
}

#[test]
fn tag_value_uncertain_last_usable_carries_prior() {
    let good = TagValue::good(42.0);
    let uncertain = TagValue::uncertain_last_usable(&good);
    assert_eq!(uncertain.value, Value::Float(42.0));
    assert_eq!(uncertain.quality, Quality::UncertainNoCommLastUsable);
    assert_eq!(uncertain.source_timestamp, Some(good.timestamp));
}

#[test]
fn tag_state_tracks_last_good_and_errors() {
    let mut state = TagState::new(TagDefinition::builder().build());
    assert_eq!(state.quality(), Quality::BadNotConnected);

    assert!(state.update(TagValue::good(1.0)));
    assert_eq!(state.read_count, 1);
    assert_eq!(state.error_count, 0);
    assert!(state.last_good_value.is_some());

    // Same value: no change notification, still counted as a read
    assert!(!state.update(TagValue::good(1.0)));
    assert_eq!(state.read_count, 2);

    assert!(state.update(TagValue::bad_no_comm()));
    assert_eq!(state.error_count, 1);
    assert_eq!(
        state.last_good_value.as_ref().map(|v| v.value.clone()),
        Some(Value::Float(1.0))
    );
}

#[test]
fn tag_definition_scale_helpers() {
    let def = TagDefinition::builder()
        .scale(Some(ScaleConfig { gain: 0.1, offset: -40.0 }))
        .build();
    assert!((def.apply_scale(500.0) - 10.0).abs() < 1e-9);
    let raw = def.reverse_scale(10.0).unwrap();
    assert!((raw - 500.0).abs() < 1e-9);
}

proptest! {
    #[test]
    fn quality_serde_roundtrip(q in arb_quality()) {
        let json = serde_json::to_string(&q).unwrap();
        let parsed: Quality = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(q, parsed);
    }

    #[test]
    fn value_serde_roundtrip(v in arb_value()) {
        let json = serde_json::to_string(&v).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(v, parsed);
    }

    #[test]
    fn scale_roundtrip(gain in 0.001f64..1000.0, offset in -1e6f64..1e6, raw in -1e6f64..1e6) {
        let scale = ScaleConfig { gain, offset };
        let back = scale.reverse(scale.apply(raw)).unwrap();
        prop_assert!((back - raw).abs() < 1e-3);
    }
}
