// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Allen-Bradley EtherNet/IP connector.
//!
//! Symbolic CIP addressing over an encapsulation session. Batch reads go
//! out as one Multiple Service Packet per poll cycle; per-tag status codes
//! in the reply are mapped to per-tag quality.

pub mod protocol;

use crate::base::{Connector, ConnectorBase, ConnectorError, ConnectorHealth, ConnectorState};
use async_trait::async_trait;
use mtpgw_addr::eip::EipAddress;
use mtpgw_addr::parse_eip_address;
use mtpgw_config::{ConnectorConfig, ConnectorTransport};
use mtpgw_core::tag::{DataType, TagDefinition, TagValue, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

struct Session {
    stream: TcpStream,
    session_id: u32,
}

/// EtherNet/IP connector.
pub struct EipConnector {
    base: ConnectorBase,
    host: String,
    port: u16,
    timeout: Duration,
    session: tokio::sync::Mutex<Option<Session>>,
}

impl EipConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        let (host, port) = match &config.transport {
            ConnectorTransport::Eip { host, port } => (host.clone(), *port),
            _ => (String::new(), 44818),
        };
        Self {
            base: ConnectorBase::new(
                config.name.clone(),
                Duration::from_millis(config.retry_delay_ms),
                config.retry_count,
            ),
            host,
            port,
            timeout: Duration::from_millis(config.timeout_ms),
            session: tokio::sync::Mutex::new(None),
        }
    }

    async fn do_connect(&self) -> Result<(), ConnectorError> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ConnectorError::Timeout(self.timeout))?
            .map_err(|e| ConnectorError::Connect(addr.clone(), e.to_string()))?;
        stream.set_nodelay(true)?;

        let register = protocol::encap_frame(
            protocol::ENCAP_REGISTER_SESSION,
            0,
            &protocol::register_session_data(),
        );
        let response = exchange(&mut stream, &register, self.timeout).await?;
        let session_id = protocol::parse_session_id(&response)?;

        *self.session.lock().await = Some(Session { stream, session_id });
        tracing::debug!(connector = %self.base.name(), %addr, session_id, "eip session registered");
        Ok(())
    }

    async fn do_disconnect(&self) {
        let mut guard = self.session.lock().await;
        if let Some(session) = guard.take() {
            let frame =
                protocol::encap_frame(protocol::ENCAP_UNREGISTER_SESSION, session.session_id, &[]);
            let mut stream = session.stream;
            let _ = stream.write_all(&frame).await;
        }
    }

    /// Send one CIP message and return the CIP reply bytes.
    async fn cip_request(&self, cip: &[u8]) -> Result<Vec<u8>, ConnectorError> {
        let mut guard = self.session.lock().await;
        let session = guard.as_mut().ok_or(ConnectorError::NotConnected)?;
        let frame = protocol::encap_frame(
            protocol::ENCAP_SEND_RR_DATA,
            session.session_id,
            &protocol::send_rr_data(cip),
        );
        let response = exchange(&mut session.stream, &frame, self.timeout).await?;
        Ok(protocol::parse_encap_response(&response)?.to_vec())
    }

    async fn read_single(&self, address: &EipAddress) -> Result<Value, ConnectorError> {
        let reply = self.cip_request(&protocol::build_read_request(address)).await?;
        let payload = protocol::parse_reply(&reply)?;
        let value = protocol::decode_typed_value(payload)?;
        Ok(apply_bit(value, address))
    }

    async fn write_single(
        &self,
        address: &EipAddress,
        value: &Value,
        datatype: DataType,
    ) -> Result<(), ConnectorError> {
        if address.bit.is_some() {
            return Err(ConnectorError::Unsupported("EIP bit-level writes".into()));
        }
        let request = protocol::build_write_request(address, value, datatype)?;
        let reply = self.cip_request(&request).await?;
        protocol::parse_reply(&reply)?;
        Ok(())
    }

    async fn write_value(&self, address: &str, value: &Value, datatype: DataType) -> bool {
        self.base.count_writes(1);
        let parsed = match parse_eip_address(address) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };
        match self.write_single(&parsed, value, datatype).await {
            Ok(()) => {
                self.base.record_success();
                true
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::error!(connector = %self.base.name(), %address, error = %e, "write failed");
                false
            }
        }
    }

    /// Batch read as one Multiple Service Packet; failures split per tag.
    async fn read_batch(&self, tags: &[TagDefinition]) -> HashMap<String, TagValue> {
        let mut out = HashMap::new();
        let mut parsed: Vec<(usize, EipAddress)> = Vec::new();
        for (i, tag) in tags.iter().enumerate() {
            match parse_eip_address(&tag.address) {
                Ok(address) => parsed.push((i, address)),
                Err(e) => {
                    self.base.record_error(&e.to_string());
                    out.insert(tag.name.clone(), TagValue::bad_config());
                }
            }
        }
        if parsed.is_empty() {
            return out;
        }

        let requests: Vec<Vec<u8>> = parsed
            .iter()
            .map(|(_, address)| protocol::build_read_request(address))
            .collect();

        let multi = if requests.len() == 1 {
            requests[0].clone()
        } else {
            protocol::build_multi_service(&requests)
        };

        let reply = match self.cip_request(&multi).await {
            Ok(reply) => reply,
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::warn!(connector = %self.base.name(), error = %e, "eip batch read failed");
                for (i, _) in &parsed {
                    out.insert(tags[*i].name.clone(), e.quality_value());
                }
                return out;
            }
        };

        if requests.len() == 1 {
            let (i, address) = &parsed[0];
            let value = protocol::parse_reply(&reply)
                .and_then(protocol::decode_typed_value)
                .map(|v| apply_bit(v, address));
            out.insert(tags[*i].name.clone(), self.settle(value));
            return out;
        }

        match protocol::split_multi_reply(&reply) {
            Ok(replies) => {
                for ((i, address), embedded) in parsed.iter().zip(replies) {
                    let value = protocol::parse_reply(embedded)
                        .and_then(protocol::decode_typed_value)
                        .map(|v| apply_bit(v, address));
                    out.insert(tags[*i].name.clone(), self.settle(value));
                }
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                for (i, _) in &parsed {
                    out.insert(tags[*i].name.clone(), e.quality_value());
                }
            }
        }
        out
    }

    fn settle(&self, result: Result<Value, ConnectorError>) -> TagValue {
        match result {
            Ok(value) => {
                self.base.record_success();
                TagValue::good(value)
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                e.quality_value()
            }
        }
    }
}

fn apply_bit(value: Value, address: &EipAddress) -> Value {
    match address.bit {
        Some(bit) => match value.as_i64() {
            Some(raw) => Value::Bool((raw >> bit) & 1 != 0),
            None => value,
        },
        None => value,
    }
}

#[async_trait]
impl Connector for EipConnector {
    fn name(&self) -> &str {
        self.base.name()
    }

    async fn connect(&self) -> Result<(), ConnectorError> {
        let _guard = self.base.connect_lock.lock().await;
        if self.base.state() == ConnectorState::Connected {
            return Ok(());
        }
        self.base.set_state(ConnectorState::Connecting);
        tracing::info!(connector = %self.base.name(), "connecting");
        match self.do_connect().await {
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
        self.do_disconnect().await;
        self.base.set_state(ConnectorState::Stopped);
    }

    async fn read_tags(&self, addresses: &[String]) -> HashMap<String, TagValue> {
        self.base.count_reads(addresses.len() as u64);
        let mut out = HashMap::new();
        for address in addresses {
            let result = match parse_eip_address(address) {
                Ok(parsed) => self.read_single(&parsed).await,
                Err(e) => Err(ConnectorError::Address(e.to_string())),
            };
            out.insert(address.clone(), self.settle(result));
        }
        out
    }

    async fn read_tag_values(&self, tags: &[TagDefinition]) -> HashMap<String, TagValue> {
        self.base.count_reads(tags.len() as u64);
        self.read_batch(tags).await
    }

    async fn write_tag(&self, address: &str, value: &Value) -> bool {
        let datatype = match value {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int32,
            Value::Float(_) => DataType::Float32,
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
        tracing::info!(
            connector = %self.base.name(),
            delay_ms = delay.as_millis() as u64,
            attempt = self.base.backoff_attempts(),
            "reconnecting after delay"
        );
        tokio::time::sleep(delay).await;

        self.do_disconnect().await;
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

/// Send an encapsulation frame and read the framed response.
async fn exchange(
    stream: &mut TcpStream,
    frame: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, ConnectorError> {
    let io = async {
        stream.write_all(frame).await?;
        let mut header = [0u8; 24];
        stream.read_exact(&mut header).await?;
        let body_len = u16::from_le_bytes([header[2], header[3]]) as usize;
        let mut response = header.to_vec();
        response.resize(24 + body_len, 0);
        stream.read_exact(&mut response[24..]).await?;
        Ok::<Vec<u8>, std::io::Error>(response)
    };
    tokio::time::timeout(timeout, io)
        .await
        .map_err(|_| ConnectorError::Timeout(timeout))?
        .map_err(ConnectorError::Io)
}
