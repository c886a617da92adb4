// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! OPC UA client connector.
//!
//! Wraps the synchronous `opcua` client: session calls run on the blocking
//! pool, batch reads map per-value StatusCodes to Quality, and the
//! connector's security options follow the configured policy/mode pair.

use crate::base::{Connector, ConnectorBase, ConnectorError, ConnectorHealth, ConnectorState};
use async_trait::async_trait;
use mtpgw_addr::opcua::{Namespace, NodeIdentifier};
use mtpgw_addr::parse_node_id;
use mtpgw_config::schema::{SecurityMode, SecurityPolicy as ConfigPolicy};
use mtpgw_config::{ConnectorConfig, ConnectorTransport, OpcUaSecurityConfig};
use mtpgw_core::tag::{DataType, Quality, TagDefinition, TagValue, Value};
use opcua::client::prelude::*;
use opcua::sync::RwLock;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

struct Active {
    // Held so the session's transport is not torn down while in use
    #[allow(dead_code)]
    client: Client,
    session: Arc<RwLock<Session>>,
}

/// OPC UA client connector.
pub struct OpcUaClientConnector {
    base: ConnectorBase,
    endpoint: String,
    security: Option<OpcUaSecurityConfig>,
    active: Arc<std::sync::Mutex<Option<Active>>>,
    timeout: Duration,
}

impl OpcUaClientConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        let (endpoint, security) = match &config.transport {
            ConnectorTransport::OpcuaClient { endpoint, security } => {
                (endpoint.clone(), security.clone())
            }
            _ => (String::new(), None),
        };
        Self {
            base: ConnectorBase::new(
                config.name.clone(),
                Duration::from_millis(config.retry_delay_ms),
                config.retry_count,
            ),
            endpoint,
            security,
            active: Arc::new(std::sync::Mutex::new(None)),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    fn policy_str(&self) -> &'static str {
        match self.security.as_ref().map(|s| s.policy) {
            Some(ConfigPolicy::Basic128Rsa15) => SecurityPolicy::Basic128Rsa15.to_str(),
            Some(ConfigPolicy::Basic256) => SecurityPolicy::Basic256.to_str(),
            Some(ConfigPolicy::Basic256Sha256) => SecurityPolicy::Basic256Sha256.to_str(),
            _ => SecurityPolicy::None.to_str(),
        }
    }

    fn mode(&self) -> MessageSecurityMode {
        match self.security.as_ref().map(|s| s.mode) {
            Some(SecurityMode::Sign) => MessageSecurityMode::Sign,
            Some(SecurityMode::SignAndEncrypt) => MessageSecurityMode::SignAndEncrypt,
            _ => MessageSecurityMode::None,
        }
    }

    fn identity(&self) -> IdentityToken {
        match self.security.as_ref() {
            Some(security) => match (&security.username, &security.password) {
                (Some(user), Some(pass)) => {
                    IdentityToken::UserName(user.clone(), pass.clone())
                }
                _ => IdentityToken::Anonymous,
            },
            None => IdentityToken::Anonymous,
        }
    }

    async fn do_connect(&self) -> Result<(), ConnectorError> {
        let endpoint = self.endpoint.clone();
        let policy = self.policy_str();
        let mode = self.mode();
        let identity = self.identity();
        let needs_keypair = mode != MessageSecurityMode::None;
        let active = Arc::clone(&self.active);
        let name = self.base.name().to_string();

        let result = tokio::task::spawn_blocking(move || -> Result<(), ConnectorError> {
            let mut client = ClientBuilder::new()
                .application_name("mtpgw")
                .application_uri("urn:mtpgw:southbound")
                .trust_server_certs(true)
                .create_sample_keypair(needs_keypair)
                .session_retry_limit(1)
                .client()
                .ok_or_else(|| {
                    ConnectorError::Connect(endpoint.clone(), "invalid client config".into())
                })?;

            let session = client
                .connect_to_endpoint(
                    (endpoint.as_str(), policy, mode, UserTokenPolicy::anonymous()),
                    identity,
                )
                .map_err(|status| {
                    ConnectorError::Connect(endpoint.clone(), status.to_string())
                })?;

            *active.lock().map_err(|_| ConnectorError::Protocol("client poisoned".into()))? =
                Some(Active { client, session });
            tracing::debug!(connector = %name, endpoint = %endpoint, "opcua session open");
            Ok(())
        })
        .await;
        result.map_err(|e| ConnectorError::Protocol(format!("connect task failed: {e}")))?
    }

    fn take_session(&self) -> Result<Arc<RwLock<Session>>, ConnectorError> {
        let guard = self
            .active
            .lock()
            .map_err(|_| ConnectorError::Protocol("client poisoned".into()))?;
        guard
            .as_ref()
            .map(|a| Arc::clone(&a.session))
            .ok_or(ConnectorError::NotConnected)
    }

    async fn read_values(
        &self,
        addresses: Vec<String>,
    ) -> Result<Vec<Result<TagValue, ConnectorError>>, ConnectorError> {
        let session = self.take_session()?;
        let result = tokio::task::spawn_blocking(move || {
            let mut read_ids = Vec::with_capacity(addresses.len());
            let mut parse_errors: Vec<Option<String>> = Vec::with_capacity(addresses.len());
            for address in &addresses {
                match to_ua_node_id(address) {
                    Ok(node_id) => {
                        read_ids.push(ReadValueId::from(&node_id));
                        parse_errors.push(None);
                    }
                    Err(e) => {
                        // Placeholder read keeps indices aligned
                        read_ids.push(ReadValueId::from(&NodeId::null()));
                        parse_errors.push(Some(e));
                    }
                }
            }

            let session = session.read();
            let data_values = session
                .read(&read_ids, TimestampsToReturn::Both, 0.0)
                .map_err(|status| ConnectorError::Protocol(status.to_string()))?;

            let mut out = Vec::with_capacity(addresses.len());
            for (i, data_value) in data_values.into_iter().enumerate() {
                if let Some(Some(err)) = parse_errors.get(i) {
                    out.push(Err(ConnectorError::Address(err.clone())));
                    continue;
                }
                out.push(Ok(data_value_to_tag_value(data_value)));
            }
            Ok::<_, ConnectorError>(out)
        })
        .await;
        result.map_err(|e| ConnectorError::Protocol(format!("read task failed: {e}")))?
    }

    async fn write_value(&self, address: &str, value: &Value, datatype: DataType) -> bool {
        self.base.count_writes(1);
        let session = match self.take_session() {
            Ok(session) => session,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };
        let address = address.to_string();
        let variant = match to_variant(value, datatype) {
            Ok(variant) => variant,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };

        let result = tokio::task::spawn_blocking(move || -> Result<(), ConnectorError> {
            let node_id = to_ua_node_id(&address).map_err(ConnectorError::Address)?;
            let write = WriteValue {
                node_id,
                attribute_id: AttributeId::Value as u32,
                index_range: UAString::null(),
                value: DataValue::value_only(variant),
            };
            let session = session.read();
            let statuses = session
                .write(&[write])
                .map_err(|status| ConnectorError::Protocol(status.to_string()))?;
            match statuses.first() {
                Some(status) if status.is_good() => Ok(()),
                Some(status) => Err(ConnectorError::Protocol(status.to_string())),
                None => Err(ConnectorError::Protocol("empty write response".into())),
            }
        })
        .await;

        match result {
            Ok(Ok(())) => {
                self.base.record_success();
                true
            }
            Ok(Err(e)) => {
                self.base.record_error(&e.to_string());
                tracing::error!(connector = %self.base.name(), error = %e, "write failed");
                false
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                false
            }
        }
    }

    async fn batch(&self, addresses: Vec<String>, keys: Vec<String>) -> HashMap<String, TagValue> {
        let mut out = HashMap::new();
        match self.read_values(addresses).await {
            Ok(values) => {
                for (key, result) in keys.into_iter().zip(values) {
                    match result {
                        Ok(tag_value) => {
                            if tag_value.quality.is_good() {
                                self.base.record_success();
                            } else {
                                self.base.record_error("bad status code");
                            }
                            out.insert(key, tag_value);
                        }
                        Err(e) => {
                            self.base.record_error(&e.to_string());
                            out.insert(key, e.quality_value());
                        }
                    }
                }
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::warn!(connector = %self.base.name(), error = %e, "opcua batch read failed");
                for key in keys {
                    out.insert(key, e.quality_value());
                }
            }
        }
        out
    }
}

#[async_trait]
impl Connector for OpcUaClientConnector {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        let _guard = self.base.connect_lock.lock().await;
        if self.base.state() == ConnectorState::Connected {
            return Ok(());
        }
        self.base.set_state(ConnectorState::Connecting);
        tracing::info!(connector = %self.base.name(), endpoint = %self.endpoint, "connecting");
        match tokio::time::timeout(self.timeout.max(Duration::from_secs(5)), self.do_connect())
            .await
            .unwrap_or(Err(ConnectorError::Timeout(self.timeout)))
        {
            Ok(()) => {
                self.base.set_state(ConnectorState::Connected);
                self.base.record_success();
                Ok(())
            }
            Err(e) => {
                self.base.set_state(ConnectorState::Error);
                self.base.record_error(&e.to_string());
                Err(e)
            }
        }
    }

    async fn disconnect(&self) {
        let _guard = self.base.connect_lock.lock().await;
        let active = Arc::clone(&self.active);
        let _ = tokio::task::spawn_blocking(move || {
            if let Ok(mut guard) = active.lock() {
                if let Some(active) = guard.take() {
                    active.session.read().disconnect();
                }
            }
        })
        .await;
        self.base.set_state(ConnectorState::Stopped);
    }

    async fn read_tags(&self, addresses: &[String]) -> HashMap<String, TagValue> {
        self.base.count_reads(addresses.len() as u64);
        self.batch(addresses.to_vec(), addresses.to_vec()).await
    }

    async fn read_tag_values(&self, tags: &[TagDefinition]) -> HashMap<String, TagValue> {
        self.base.count_reads(tags.len() as u64);
        let addresses: Vec<String> = tags.iter().map(|t| t.address.clone()).collect();
        let keys: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
        self.batch(addresses, keys).await
    }

    async fn write_tag(&self, address: &str, value: &Value) -> bool {
        let datatype = match value {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int64,
            Value::Float(_) => DataType::Float64,
            Value::Text(_) => DataType::String,
        };
        self.write_value(address, value, datatype).await
    }

    async fn write_tag_value(&self, tag: &TagDefinition, value: &Value) -> bool {
        self.write_value(&tag.address, value, tag.datatype).await
    }

    fn health_status(&self) -> ConnectorHealth {
        self.base.health()
    }

    async fn reconnect(&self) -> bool {
        let _guard = self.base.connect_lock.lock().await;
        self.base.set_state(ConnectorState::Reconnecting);

        let Some(delay) = self.base.next_backoff() else {
            tracing::error!(connector = %self.base.name(), "max reconnection attempts reached");
            self.base.set_state(ConnectorState::Error);
            return false;
        };
        tokio::time::sleep(delay).await;

        {
            let active = Arc::clone(&self.active);
            let _ = tokio::task::spawn_blocking(move || {
                if let Ok(mut guard) = active.lock() {
                    guard.take();
                }
            })
            .await;
        }
        match self.do_connect().await {
            Ok(()) => {
                self.base.set_state(ConnectorState::Connected);
                self.base.record_success();
                true
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::warn!(connector = %self.base.name(), error = %e, "reconnection failed");
                false
            }
        }
    }
}

/// Parse our NodeId string form into the client library's NodeId.
fn to_ua_node_id(address: &str) -> Result<NodeId, String> {
    let parsed = parse_node_id(address).map_err(|e| e.to_string())?;
    let namespace = match parsed.namespace {
        Namespace::Index(idx) => idx,
        Namespace::Uri(_) => {
            return Err(format!(
                "expanded node ids are not supported on the client: '{address}'"
            ))
        }
    };
    Ok(match parsed.identifier {
        NodeIdentifier::Numeric(n) => NodeId::new(namespace, n),
        NodeIdentifier::Str(s) => NodeId::new(namespace, s),
        NodeIdentifier::Guid(g) => {
            let guid = Guid::from_str(&g).map_err(|_| format!("invalid guid in '{address}'"))?;
            NodeId::new(namespace, guid)
        }
        NodeIdentifier::Opaque(b) => {
            NodeId::new(namespace, ByteString::from_base64(&b).unwrap_or_default())
        }
    })
}

fn data_value_to_tag_value(data_value: DataValue) -> TagValue {
    let quality = match data_value.status {
        Some(status) if status.is_bad() => {
            if status == StatusCode::BadNodeIdUnknown {
                Quality::BadConfigError
            } else {
                Quality::BadNoCommunication
            }
        }
        Some(status) if !status.is_good() => Quality::Uncertain,
        _ => Quality::Good,
    };
    let value = data_value
        .value
        .and_then(variant_to_value)
        .unwrap_or(Value::Int(0));
    TagValue {
        value,
        timestamp: chrono::Utc::now(),
        quality,
        source_timestamp: data_value
            .source_timestamp
            .map(|t| t.as_chrono()),
    }
}

fn variant_to_value(variant: Variant) -> Option<Value> {
    Some(match variant {
        Variant::Boolean(v) => Value::Bool(v),
        Variant::SByte(v) => Value::Int(v.into()),
        Variant::Byte(v) => Value::Int(v.into()),
        Variant::Int16(v) => Value::Int(v.into()),
        Variant::UInt16(v) => Value::Int(v.into()),
        Variant::Int32(v) => Value::Int(v.into()),
        Variant::UInt32(v) => Value::Int(v.into()),
        Variant::Int64(v) => Value::Int(v),
        Variant::UInt64(v) => Value::Int(v as i64),
        Variant::Float(v) => Value::Float(v.into()),
        Variant::Double(v) => Value::Float(v),
        Variant::String(v) => Value::Text(v.to_string()),
        _ => return None,
    })
}

fn to_variant(value: &Value, datatype: DataType) -> Result<Variant, ConnectorError> {
    let err = || ConnectorError::Unsupported(format!("cannot encode {value:?} as {datatype}"));
    Ok(match datatype {
        DataType::Bool => Variant::Boolean(value.as_bool().ok_or_else(err)?),
        DataType::Int16 => Variant::Int16(value.as_i64().ok_or_else(err)? as i16),
        DataType::Uint16 => Variant::UInt16(value.as_i64().ok_or_else(err)? as u16),
        DataType::Int32 => Variant::Int32(value.as_i64().ok_or_else(err)? as i32),
        DataType::Uint32 => Variant::UInt32(value.as_i64().ok_or_else(err)? as u32),
        DataType::Int64 => Variant::Int64(value.as_i64().ok_or_else(err)?),
        DataType::Uint64 => Variant::UInt64(value.as_i64().ok_or_else(err)? as u64),
        DataType::Float32 => Variant::Float(value.as_f64().ok_or_else(err)? as f32),
        DataType::Float64 => Variant::Double(value.as_f64().ok_or_else(err)?),
        DataType::String => match value {
            Value::Text(s) => Variant::String(UAString::from(s.as_str())),
            _ => return Err(err()),
        },
    })
}
