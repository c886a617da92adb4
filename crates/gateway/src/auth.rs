// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JWT authentication and role-based access control.
//!
//! Permissions follow `resource:action`. Roles: operator (read, command,
//! ack), engineer (adds tag writes, shelving, config reads), admin (all).

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use mtpgw_config::AuthConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Web UI roles, least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Operator,
    Engineer,
    Admin,
}

mtpgw_core::simple_display! {
    Role {
        Operator => "operator",
        Engineer => "engineer",
        Admin => "admin",
    }
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "operator" => Role::Operator,
            "engineer" => Role::Engineer,
            "admin" => Role::Admin,
            _ => return None,
        })
    }

    /// Check a `resource:action` permission against this role.
    pub fn has_permission(self, permission: &str) -> bool {
        if self == Role::Admin {
            return true;
        }
        let operator = matches!(
            permission,
            "tags:read"
                | "services:read"
                | "services:command"
                | "alarms:read"
                | "alarms:ack"
                | "history:read"
        );
        match self {
            Role::Operator => operator,
            Role::Engineer => {
                operator
                    || matches!(permission, "tags:write" | "alarms:shelve" | "config:read")
            }
            Role::Admin => true,
        }
    }

    /// All permissions this role holds, for `GET /auth/me`.
    pub fn permissions(self) -> Vec<&'static str> {
        const ALL: &[&str] = &[
            "tags:read",
            "tags:write",
            "services:read",
            "services:command",
            "alarms:read",
            "alarms:ack",
            "alarms:shelve",
            "history:read",
            "config:read",
            "config:write",
            "users:read",
            "users:write",
        ];
        ALL.iter()
            .copied()
            .filter(|p| self.has_permission(p))
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
}

/// Authenticated principal extracted from a bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, permission: &str) -> Result<(), crate::webui::ApiError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            Err(crate::webui::ApiError::Forbidden(format!(
                "missing permission {permission}"
            )))
        }
    }
}

/// Shared auth state: configured users and the token key.
pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Verify credentials and mint a token.
    pub fn login(&self, username: &str, password: &str) -> Option<(String, Role)> {
        let user = self
            .config
            .users
            .iter()
            .find(|u| u.username == username && u.password == password)?;
        let role = Role::parse(&user.role)?;
        let token = self.issue(username, role)?;
        Some((token, role))
    }

    /// Mint a fresh token for an already-authenticated user.
    pub fn issue(&self, username: &str, role: Role) -> Option<String> {
        let claims = Claims {
            sub: username.to_string(),
            role,
            exp: (Utc::now() + Duration::minutes(self.config.token_ttl_minutes)).timestamp(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .ok()
    }

    /// Validate a token, returning the principal.
    pub fn verify(&self, token: &str) -> Option<AuthUser> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )
        .ok()?;
        Some(AuthUser { username: data.claims.sub, role: data.claims.role })
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = crate::webui::ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_state = parts
            .extensions
            .get::<Arc<AuthState>>()
            .ok_or_else(|| crate::webui::ApiError::Internal("auth state missing".into()))?;

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| crate::webui::ApiError::Unauthorized("missing bearer token".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| crate::webui::ApiError::Unauthorized("malformed header".into()))?;

        auth_state
            .verify(token)
            .ok_or_else(|| crate::webui::ApiError::Unauthorized("invalid token".into()))
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
