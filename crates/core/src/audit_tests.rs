// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn command_entry_serde() {
    let entry = AuditEntry::command(Utc::now(), "Mix", "START", Some(2), "accepted");
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["kind"], "command");
    assert_eq!(json["service"], "Mix");
    assert_eq!(json["command"], "START");
    assert_eq!(json["procedure_id"], 2);

    let parsed: AuditEntry = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, entry);
}

#[test]
fn state_transition_entry() {
    let entry = AuditEntry::state_transition(Utc::now(), "Mix", "IDLE", "STARTING");
    match &entry.detail {
        AuditDetail::StateTransition { from_state, to_state } => {
            assert_eq!(from_state, "IDLE");
            assert_eq!(to_state, "STARTING");
        }
        other => panic!("unexpected detail: {other:?}"),
    }
}

#[test]
fn security_entry() {
    let entry = AuditEntry::security(
        Utc::now(),
        "ALL_SERVICES",
        "write_refused",
        "heater_cmd",
        "not on allowlist",
    );
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["kind"], "security");
    assert_eq!(json["target"], "heater_cmd");
}

#[test]
fn mask_secret_hides_content() {
    assert_eq!(mask_secret("hunter2"), "***");
    assert_eq!(mask_secret(""), "");
    assert!(!mask_secret("super-secret-token").contains("secret"));
}
