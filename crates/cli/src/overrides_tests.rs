// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn doc() -> Value {
    serde_yaml::from_str(
        r#"
gateway:
  name: Demo
webui:
  port: 8080
connectors:
  - name: plc1
    host: 10.0.0.1
"#,
    )
    .unwrap()
}

#[test]
fn override_scalar_field() {
    let mut document = doc();
    apply(&mut document, &["webui.port=9090".to_string()]).unwrap();
    assert_eq!(document["webui"]["port"], Value::Number(9090.into()));
}

#[test]
fn override_preserves_type_semantics() {
    let mut document = doc();
    apply(
        &mut document,
        &["gateway.name=Other".to_string(), "webui.enabled=false".to_string()],
    )
    .unwrap();
    assert_eq!(document["gateway"]["name"], Value::String("Other".into()));
    assert_eq!(document["webui"]["enabled"], Value::Bool(false));
}

#[test]
fn override_into_sequence() {
    let mut document = doc();
    apply(&mut document, &["connectors.0.host=10.0.0.9".to_string()]).unwrap();
    assert_eq!(document["connectors"][0]["host"], Value::String("10.0.0.9".into()));
}

#[test]
fn creates_missing_mapping_levels() {
    let mut document = doc();
    apply(&mut document, &["storage.data_dir=/tmp/x".to_string()]).unwrap();
    assert_eq!(document["storage"]["data_dir"], Value::String("/tmp/x".into()));
}

#[test]
fn malformed_override_rejected() {
    let mut document = doc();
    assert!(apply(&mut document, &["no-equals-sign".to_string()]).is_err());
}

#[test]
fn out_of_bounds_index_rejected() {
    let mut document = doc();
    assert!(apply(&mut document, &["connectors.5.host=x".to_string()]).is_err());
}
