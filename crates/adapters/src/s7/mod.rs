// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Siemens S7 connector over ISO-on-TCP (RFC 1006).
//!
//! The session is established with a COTP connection request (TSAP derived
//! from rack/slot) followed by an S7 setup-communication job. Reads and
//! writes use the S7 read-var/write-var functions with one item per
//! request. All frames are TPKT-framed.

pub mod codec;

use crate::base::{Connector, ConnectorBase, ConnectorError, ConnectorHealth, ConnectorState};
use async_trait::async_trait;
use mtpgw_addr::s7::{S7Address, S7Area};
use mtpgw_addr::parse_s7_address;
use mtpgw_config::{ConnectorConfig, ConnectorTransport};
use mtpgw_core::tag::{DataType, TagDefinition, TagValue, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

// S7 item return codes
const RET_OK: u8 = 0xFF;

// Transport sizes in the item specification
const TS_BIT: u8 = 0x01;
const TS_BYTE: u8 = 0x02;
const TS_COUNTER: u8 = 0x1C;
const TS_TIMER: u8 = 0x1D;

/// Siemens S7 connector.
pub struct S7Connector {
    base: ConnectorBase,
    host: String,
    port: u16,
    rack: u16,
    slot: u16,
    timeout: Duration,
    stream: tokio::sync::Mutex<Option<TcpStream>>,
    pdu_ref: AtomicU16,
}

impl S7Connector {
    pub fn new(config: ConnectorConfig) -> Self {
        let (host, port, rack, slot) = match &config.transport {
            ConnectorTransport::S7 { host, port, rack, slot } => {
                (host.clone(), *port, *rack, *slot)
            }
            _ => (String::new(), 102, 0, 1),
        };
        Self {
            base: ConnectorBase::new(
                config.name.clone(),
                Duration::from_millis(config.retry_delay_ms),
                config.retry_count,
            ),
            host,
            port,
            rack,
            slot,
            timeout: Duration::from_millis(config.timeout_ms),
            stream: tokio::sync::Mutex::new(None),
            pdu_ref: AtomicU16::new(1),
        }
    }

    fn next_ref(&self) -> u16 {
        self.pdu_ref.fetch_add(1, Ordering::Relaxed)
    }

    async fn do_connect(&self) -> Result<(), ConnectorError> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ConnectorError::Timeout(self.timeout))?
            .map_err(|e| ConnectorError::Connect(addr.clone(), e.to_string()))?;
        stream.set_nodelay(true)?;

        // COTP connection request; the remote TSAP selects rack/slot
        let remote_tsap = (self.rack << 5 | self.slot) as u8;
        let cotp_cr: Vec<u8> = vec![
            0x03, 0x00, 0x00, 0x16, // TPKT, length 22
            0x11, 0xE0, 0x00, 0x00, 0x00, 0x01, 0x00, // COTP CR
            0xC0, 0x01, 0x0A, // TPDU size 1024
            0xC1, 0x02, 0x01, 0x00, // local TSAP
            0xC2, 0x02, 0x01, remote_tsap, // remote TSAP
        ];
        let response = exchange(&mut stream, &cotp_cr, self.timeout).await?;
        if response.len() < 6 || response[5] != 0xD0 {
            return Err(ConnectorError::Protocol("COTP connect refused".into()));
        }

        // S7 setup communication: 1 job each way, PDU length 480
        let setup: Vec<u8> = vec![
            0x03, 0x00, 0x00, 0x19, // TPKT, length 25
            0x02, 0xF0, 0x80, // COTP DT
            0x32, 0x01, 0x00, 0x00, 0x04, 0x00, 0x00, 0x08, 0x00, 0x00, // S7 header
            0xF0, 0x00, 0x00, 0x01, 0x00, 0x01, 0x01, 0xE0, // setup params
        ];
        let response = exchange(&mut stream, &setup, self.timeout).await?;
        if response.len() < 9 || response[8] != 0x03 {
            return Err(ConnectorError::Protocol("S7 setup communication failed".into()));
        }

        *self.stream.lock().await = Some(stream);
        tracing::debug!(
            connector = %self.base.name(),
            host = %self.host,
            rack = self.rack,
            slot = self.slot,
            "s7 connected"
        );
        Ok(())
    }

    /// Item specification bytes shared by read and write requests.
    fn item_spec(address: &S7Address) -> (u8, u16, Vec<u8>) {
        let (transport, length, bit_addr) = match address.area {
            S7Area::Counter => (TS_COUNTER, 1u16, address.offset),
            S7Area::Timer => (TS_TIMER, 1u16, address.offset),
            _ => {
                if address.bit.is_some() {
                    (TS_BIT, 1, address.offset * 8 + u32::from(address.bit.unwrap_or(0)))
                } else {
                    (TS_BYTE, address.size() as u16, address.offset * 8)
                }
            }
        };
        let db = address.db_number.unwrap_or(0);
        let mut spec = Vec::with_capacity(12);
        spec.extend_from_slice(&[0x12, 0x0A, 0x10, transport]);
        spec.extend_from_slice(&length.to_be_bytes());
        spec.extend_from_slice(&db.to_be_bytes());
        spec.push(address.area.code());
        spec.extend_from_slice(&bit_addr.to_be_bytes()[1..4]);
        (transport, length, spec)
    }

    async fn read_area(&self, address: &S7Address) -> Result<Vec<u8>, ConnectorError> {
        let (_transport, _length, spec) = Self::item_spec(address);
        let pdu_ref = self.next_ref();

        let mut frame = Vec::with_capacity(31);
        frame.extend_from_slice(&[0x03, 0x00, 0x00, 0x1F]); // TPKT, length 31
        frame.extend_from_slice(&[0x02, 0xF0, 0x80]); // COTP DT
        frame.extend_from_slice(&[0x32, 0x01, 0x00, 0x00]); // S7 job
        frame.extend_from_slice(&pdu_ref.to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x0E, 0x00, 0x00]); // param len 14, data len 0
        frame.extend_from_slice(&[0x04, 0x01]); // read var, 1 item
        frame.extend_from_slice(&spec);

        let response = self.request(&frame).await?;
        // TPKT(4) + COTP(3) + S7 ack header(12) + param(2) = 21
        if response.len() < 25 {
            return Err(ConnectorError::Protocol("short S7 read response".into()));
        }
        if response[19] != 0x04 {
            return Err(ConnectorError::Protocol("unexpected S7 function in reply".into()));
        }
        let item = &response[21..];
        if item[0] != RET_OK {
            return Err(ConnectorError::Protocol(format!(
                "S7 item error 0x{:02X}",
                item[0]
            )));
        }
        // length field is in bits for transport 0x03/0x04, bytes otherwise
        let transport = item[1];
        let raw_len = u16::from_be_bytes([item[2], item[3]]) as usize;
        let byte_len = match transport {
            0x03 | 0x04 => raw_len.div_ceil(8),
            _ => raw_len,
        };
        if item.len() < 4 + byte_len {
            return Err(ConnectorError::Protocol("truncated S7 data".into()));
        }
        Ok(item[4..4 + byte_len].to_vec())
    }

    async fn write_area(&self, address: &S7Address, data: &[u8]) -> Result<(), ConnectorError> {
        let (transport, _length, spec) = Self::item_spec(address);
        let pdu_ref = self.next_ref();

        let is_bit = transport == TS_BIT;
        let data_transport: u8 = if is_bit { 0x03 } else { 0x04 };
        let bit_len = if is_bit { 1u16 } else { (data.len() * 8) as u16 };

        let param_len: u16 = 14;
        let data_len = (4 + data.len()) as u16;
        let total = 4 + 3 + 12 + param_len + data_len;

        let mut frame = Vec::with_capacity(total as usize);
        frame.extend_from_slice(&[0x03, 0x00]);
        frame.extend_from_slice(&total.to_be_bytes());
        frame.extend_from_slice(&[0x02, 0xF0, 0x80]);
        frame.extend_from_slice(&[0x32, 0x01, 0x00, 0x00]);
        frame.extend_from_slice(&pdu_ref.to_be_bytes());
        frame.extend_from_slice(&param_len.to_be_bytes());
        frame.extend_from_slice(&data_len.to_be_bytes());
        frame.extend_from_slice(&[0x05, 0x01]); // write var, 1 item
        frame.extend_from_slice(&spec);
        frame.push(0x00); // data item: reserved
        frame.push(data_transport);
        frame.extend_from_slice(&bit_len.to_be_bytes());
        frame.extend_from_slice(data);

        let response = self.request(&frame).await?;
        if response.len() < 22 {
            return Err(ConnectorError::Protocol("short S7 write response".into()));
        }
        if response[21] != RET_OK {
            return Err(ConnectorError::Protocol(format!(
                "S7 write refused 0x{:02X}",
                response[21]
            )));
        }
        Ok(())
    }

    async fn request(&self, frame: &[u8]) -> Result<Vec<u8>, ConnectorError> {
        let mut guard = self.stream.lock().await;
        let stream = guard.as_mut().ok_or(ConnectorError::NotConnected)?;
        exchange(stream, frame, self.timeout).await
    }

    async fn read_one_value(&self, tag: &TagDefinition) -> TagValue {
        let parsed = match parse_s7_address(&tag.address) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return TagValue::bad_config();
            }
        };
        match self.read_area(&parsed).await {
            Ok(bytes) => match codec::decode_s7_value(&bytes, &parsed, tag.datatype) {
                Ok(value) => {
                    self.base.record_success();
                    TagValue::good(value)
                }
                Err(e) => {
                    self.base.record_error(&e.to_string());
                    TagValue::bad_config()
                }
            },
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::warn!(
                    connector = %self.base.name(),
                    address = %tag.address,
                    error = %e,
                    "s7 read failed"
                );
                e.quality_value()
            }
        }
    }

    async fn write_value(&self, address: &str, value: &Value, datatype: DataType) -> bool {
        self.base.count_writes(1);
        let parsed = match parse_s7_address(address) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };
        let data = match codec::encode_s7_value(value, &parsed, datatype) {
            Ok(data) => data,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };
        match self.write_area(&parsed, &data).await {
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
}

#[async_trait]
impl Connector for S7Connector {
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
        *self.stream.lock().await = None;
        self.base.set_state(ConnectorState::Stopped);
    }

    async fn read_tags(&self, addresses: &[String]) -> HashMap<String, TagValue> {
        self.base.count_reads(addresses.len() as u64);
        let mut out = HashMap::new();
        for address in addresses {
            let tag = TagDefinition {
                name: address.clone(),
                connector: self.base.name().to_string(),
                address: address.clone(),
                datatype: DataType::Uint16,
                writable: false,
                scale: None,
                unit: String::new(),
                description: String::new(),
                byte_order: Default::default(),
                word_order: Default::default(),
            };
            out.insert(address.clone(), self.read_one_value(&tag).await);
        }
        out
    }

    async fn read_tag_values(&self, tags: &[TagDefinition]) -> HashMap<String, TagValue> {
        self.base.count_reads(tags.len() as u64);
        let mut out = HashMap::new();
        for tag in tags {
            out.insert(tag.name.clone(), self.read_one_value(tag).await);
        }
        out
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

        *self.stream.lock().await = None;
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

/// Send a TPKT frame and read the TPKT-framed response.
async fn exchange(
    stream: &mut TcpStream,
    frame: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, ConnectorError> {
    let io = async {
        stream.write_all(frame).await?;
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).await?;
        let total = u16::from_be_bytes([header[2], header[3]]) as usize;
        let mut response = header.to_vec();
        if total > 4 {
            response.resize(total, 0);
            stream.read_exact(&mut response[4..]).await?;
        }
        Ok::<Vec<u8>, std::io::Error>(response)
    };
    tokio::time::timeout(timeout, io)
        .await
        .map_err(|_| ConnectorError::Timeout(timeout))?
        .map_err(ConnectorError::Io)
}
