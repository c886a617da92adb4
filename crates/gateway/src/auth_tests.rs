// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mtpgw_config::UserConfig;

fn auth_state() -> AuthState {
    AuthState::new(AuthConfig {
        jwt_secret: "test-secret".into(),
        token_ttl_minutes: 5,
        users: vec![
            UserConfig { username: "op".into(), password: "op-pass".into(), role: "operator".into() },
            UserConfig { username: "eng".into(), password: "eng-pass".into(), role: "engineer".into() },
            UserConfig { username: "root".into(), password: "root-pass".into(), role: "admin".into() },
        ],
    })
}

#[test]
fn login_and_verify_roundtrip() {
    let auth = auth_state();
    let (token, role) = auth.login("op", "op-pass").unwrap();
    assert_eq!(role, Role::Operator);

    let user = auth.verify(&token).unwrap();
    assert_eq!(user.username, "op");
    assert_eq!(user.role, Role::Operator);
}

#[test]
fn wrong_password_rejected() {
    let auth = auth_state();
    assert!(auth.login("op", "nope").is_none());
    assert!(auth.login("ghost", "op-pass").is_none());
}

#[test]
fn tampered_token_rejected() {
    let auth = auth_state();
    let (token, _) = auth.login("op", "op-pass").unwrap();
    let tampered = format!("{token}x");
    assert!(auth.verify(&tampered).is_none());
}

#[test]
fn token_from_other_secret_rejected() {
    let auth = auth_state();
    let other = AuthState::new(AuthConfig {
        jwt_secret: "other-secret".into(),
        token_ttl_minutes: 5,
        users: vec![],
    });
    let token = other.issue("op", Role::Admin).unwrap();
    assert!(auth.verify(&token).is_none());
}

#[yare::parameterized(
    op_reads        = { Role::Operator, "tags:read", true },
    op_commands     = { Role::Operator, "services:command", true },
    op_acks         = { Role::Operator, "alarms:ack", true },
    op_no_write     = { Role::Operator, "tags:write", false },
    op_no_shelve    = { Role::Operator, "alarms:shelve", false },
    op_no_config    = { Role::Operator, "config:read", false },
    eng_writes      = { Role::Engineer, "tags:write", true },
    eng_shelves     = { Role::Engineer, "alarms:shelve", true },
    eng_reads_cfg   = { Role::Engineer, "config:read", true },
    eng_no_cfg_edit = { Role::Engineer, "config:write", false },
    eng_no_users    = { Role::Engineer, "users:write", false },
    admin_users     = { Role::Admin, "users:write", true },
    admin_cfg       = { Role::Admin, "config:write", true },
)]
fn role_permissions(role: Role, permission: &str, expected: bool) {
    assert_eq!(role.has_permission(permission), expected);
}

#[test]
fn permission_lists_nest() {
    let op: std::collections::HashSet<_> = Role::Operator.permissions().into_iter().collect();
    let eng: std::collections::HashSet<_> = Role::Engineer.permissions().into_iter().collect();
    let admin: std::collections::HashSet<_> = Role::Admin.permissions().into_iter().collect();
    assert!(op.is_subset(&eng));
    assert!(eng.is_subset(&admin));
}

#[test]
fn role_parse() {
    assert_eq!(Role::parse("engineer"), Some(Role::Engineer));
    assert_eq!(Role::parse("boss"), None);
}
