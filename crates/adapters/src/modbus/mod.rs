// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Modbus TCP and RTU connector.
//!
//! PDU framing is delegated to `rmodbus`; the transport (TCP socket or
//! serial line) is owned here. TCP uses the MBAP length field to frame
//! responses; RTU responses are sized with `guess_response_frame_len`.

pub mod codec;

use crate::base::{Connector, ConnectorBase, ConnectorError, ConnectorHealth, ConnectorState};
use async_trait::async_trait;
use mtpgw_addr::modbus::{ModbusAddress, RegisterType};
use mtpgw_addr::parse_modbus_address;
use mtpgw_config::{ConnectorConfig, ConnectorTransport};
use mtpgw_core::tag::{ByteOrder, DataType, TagDefinition, TagValue, Value};
use rmodbus::client::ModbusRequest;
use rmodbus::{guess_response_frame_len, ModbusProto};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

enum Link {
    Down,
    Tcp(TcpStream),
}

/// Modbus connector covering both TCP and RTU transports.
pub struct ModbusConnector {
    base: ConnectorBase,
    config: ConnectorConfig,
    timeout: Duration,
    default_unit: u8,
    tcp: tokio::sync::Mutex<Link>,
    rtu: Arc<parking_lot::Mutex<Option<serial::SystemPort>>>,
}

impl ModbusConnector {
    pub fn new(config: ConnectorConfig) -> Self {
        let default_unit = match &config.transport {
            ConnectorTransport::ModbusTcp { unit_id, .. }
            | ConnectorTransport::ModbusRtu { unit_id, .. } => *unit_id,
            _ => 1,
        };
        Self {
            base: ConnectorBase::new(
                config.name.clone(),
                Duration::from_millis(config.retry_delay_ms),
                config.retry_count,
            ),
            timeout: Duration::from_millis(config.timeout_ms),
            default_unit,
            tcp: tokio::sync::Mutex::new(Link::Down),
            rtu: Arc::new(parking_lot::Mutex::new(None)),
            config,
        }
    }

    fn proto(&self) -> ModbusProto {
        match self.config.transport {
            ConnectorTransport::ModbusRtu { .. } => ModbusProto::Rtu,
            _ => ModbusProto::TcpUdp,
        }
    }

    async fn do_connect(&self) -> Result<(), ConnectorError> {
        match &self.config.transport {
            ConnectorTransport::ModbusTcp { host, port, .. } => {
                let addr = format!("{host}:{port}");
                let stream = tokio::time::timeout(self.timeout, TcpStream::connect(&addr))
                    .await
                    .map_err(|_| ConnectorError::Timeout(self.timeout))?
                    .map_err(|e| ConnectorError::Connect(addr.clone(), e.to_string()))?;
                stream.set_nodelay(true)?;
                *self.tcp.lock().await = Link::Tcp(stream);
                tracing::debug!(connector = %self.base.name(), %addr, "modbus tcp connected");
                Ok(())
            }
            ConnectorTransport::ModbusRtu {
                device,
                baudrate,
                parity,
                stopbits,
                bytesize,
                ..
            } => {
                let port = open_serial(
                    device,
                    *baudrate,
                    parity,
                    *stopbits,
                    *bytesize,
                    self.timeout,
                )?;
                *self.rtu.lock() = Some(port);
                tracing::debug!(connector = %self.base.name(), device = %device, "modbus rtu connected");
                Ok(())
            }
            _ => Err(ConnectorError::Unsupported("not a modbus transport".into())),
        }
    }

    async fn do_disconnect(&self) {
        *self.tcp.lock().await = Link::Down;
        *self.rtu.lock() = None;
    }

    /// Run one request/response exchange.
    async fn transact(
        &self,
        unit: u8,
        build: impl FnOnce(&mut ModbusRequest, &mut Vec<u8>) -> Result<(), rmodbus::ErrorKind>,
    ) -> Result<(ModbusRequest, Vec<u8>), ConnectorError> {
        let mut mreq = ModbusRequest::new(unit, self.proto());
        let mut request = Vec::with_capacity(16);
        build(&mut mreq, &mut request)
            .map_err(|e| ConnectorError::Protocol(e.to_string()))?;

        let response = match self.proto() {
            ModbusProto::TcpUdp => self.exchange_tcp(&request).await?,
            _ => self.exchange_rtu(request).await?,
        };
        Ok((mreq, response))
    }

    async fn exchange_tcp(&self, request: &[u8]) -> Result<Vec<u8>, ConnectorError> {
        let mut link = self.tcp.lock().await;
        let Link::Tcp(stream) = &mut *link else {
            return Err(ConnectorError::NotConnected);
        };
        let io = async {
            stream.write_all(request).await?;
            let mut header = [0u8; 6];
            stream.read_exact(&mut header).await?;
            let body_len = u16::from_be_bytes([header[4], header[5]]) as usize;
            let mut frame = header.to_vec();
            frame.resize(6 + body_len, 0);
            stream.read_exact(&mut frame[6..]).await?;
            Ok::<Vec<u8>, std::io::Error>(frame)
        };
        tokio::time::timeout(self.timeout, io)
            .await
            .map_err(|_| ConnectorError::Timeout(self.timeout))?
            .map_err(ConnectorError::Io)
    }

    async fn exchange_rtu(&self, request: Vec<u8>) -> Result<Vec<u8>, ConnectorError> {
        let rtu = Arc::clone(&self.rtu);
        let result = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, ConnectorError> {
            let mut guard = rtu.lock();
            let port = guard.as_mut().ok_or(ConnectorError::NotConnected)?;
            port.write_all(&request)?;
            let mut frame = vec![0u8; 4];
            port.read_exact(&mut frame)?;
            let total = guess_response_frame_len(&frame, ModbusProto::Rtu)
                .map_err(|e| ConnectorError::Protocol(e.to_string()))?
                as usize;
            if total > frame.len() {
                let mut rest = vec![0u8; total - frame.len()];
                port.read_exact(&mut rest)?;
                frame.extend_from_slice(&rest);
            }
            Ok(frame)
        })
        .await;
        result.map_err(|e| ConnectorError::Protocol(format!("serial task failed: {e}")))?
    }

    async fn read_single(
        &self,
        parsed: &ModbusAddress,
        datatype: DataType,
        byte_order: ByteOrder,
        word_order: ByteOrder,
    ) -> Result<Value, ConnectorError> {
        let unit = parsed.unit.unwrap_or(self.default_unit);
        let count = codec::register_count(datatype);

        match parsed.register_type {
            RegisterType::Coil | RegisterType::DiscreteInput => {
                let addr = parsed.address;
                let is_coil = parsed.register_type == RegisterType::Coil;
                let (mreq, response) = self
                    .transact(unit, |mreq, out| {
                        if is_coil {
                            mreq.generate_get_coils(addr, 1, out)
                        } else {
                            mreq.generate_get_discretes(addr, 1, out)
                        }
                    })
                    .await?;
                let mut bits = Vec::new();
                mreq.parse_bool(&response, &mut bits)
                    .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
                bits.first()
                    .map(|b| Value::Bool(*b))
                    .ok_or_else(|| ConnectorError::Protocol("empty coil response".into()))
            }
            RegisterType::InputRegister | RegisterType::HoldingRegister => {
                let addr = parsed.address;
                let is_input = parsed.register_type == RegisterType::InputRegister;
                let (mreq, response) = self
                    .transact(unit, |mreq, out| {
                        if is_input {
                            mreq.generate_get_inputs(addr, count, out)
                        } else {
                            mreq.generate_get_holdings(addr, count, out)
                        }
                    })
                    .await?;
                let mut registers = Vec::new();
                mreq.parse_u16(&response, &mut registers)
                    .map_err(|e| ConnectorError::Protocol(e.to_string()))?;
                if let Some(bit) = parsed.bit_offset {
                    let word = registers
                        .first()
                        .ok_or_else(|| ConnectorError::Protocol("empty register response".into()))?;
                    return Ok(Value::Bool((word >> bit) & 0x01 != 0));
                }
                codec::decode_registers(&registers, datatype, byte_order, word_order)
            }
        }
    }

    async fn write_single(
        &self,
        parsed: &ModbusAddress,
        value: &Value,
        datatype: DataType,
        byte_order: ByteOrder,
        word_order: ByteOrder,
    ) -> Result<(), ConnectorError> {
        let unit = parsed.unit.unwrap_or(self.default_unit);
        match parsed.register_type {
            RegisterType::Coil => {
                let state = value
                    .as_bool()
                    .ok_or_else(|| ConnectorError::Unsupported("coil write needs bool".into()))?;
                let addr = parsed.address;
                let (mreq, response) = self
                    .transact(unit, |mreq, out| mreq.generate_set_coil(addr, state, out))
                    .await?;
                mreq.parse_ok(&response)
                    .map_err(|e| ConnectorError::Protocol(e.to_string()))
            }
            RegisterType::HoldingRegister => {
                if parsed.bit_offset.is_some() {
                    return Err(ConnectorError::Unsupported(
                        "bit-level register writes are not supported".into(),
                    ));
                }
                let registers = codec::encode_value(value, datatype, byte_order, word_order)?;
                let addr = parsed.address;
                let (mreq, response) = self
                    .transact(unit, |mreq, out| {
                        if registers.len() == 1 {
                            mreq.generate_set_holding(addr, registers[0], out)
                        } else {
                            mreq.generate_set_holdings_bulk(addr, &registers, out)
                        }
                    })
                    .await?;
                mreq.parse_ok(&response)
                    .map_err(|e| ConnectorError::Protocol(e.to_string()))
            }
            other => Err(ConnectorError::Unsupported(format!("cannot write to {other:?}"))),
        }
    }

    async fn read_one_value(&self, tag: &TagDefinition) -> TagValue {
        let parsed = match parse_modbus_address(&tag.address) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return TagValue::bad_config();
            }
        };
        match self
            .read_single(&parsed, tag.datatype, tag.byte_order, tag.word_order)
            .await
        {
            Ok(value) => {
                self.base.record_success();
                TagValue::good(value)
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::warn!(
                    connector = %self.base.name(),
                    address = %tag.address,
                    error = %e,
                    "modbus read failed"
                );
                e.quality_value()
            }
        }
    }
}

#[async_trait]
impl Connector for ModbusConnector {
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
            let tag = TagDefinition {
                name: address.clone(),
                connector: self.base.name().to_string(),
                address: address.clone(),
                datatype: DataType::Uint16,
                writable: false,
                scale: None,
                unit: String::new(),
                description: String::new(),
                byte_order: ByteOrder::Big,
                word_order: ByteOrder::Big,
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
        self.base.count_writes(1);
        let parsed = match parse_modbus_address(address) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };
        // Without metadata, infer the wire type from the value itself
        let datatype = match value {
            Value::Bool(_) => DataType::Bool,
            Value::Int(_) => DataType::Int16,
            Value::Float(_) => DataType::Float32,
            Value::Text(_) => DataType::String,
        };
        match self
            .write_single(&parsed, value, datatype, ByteOrder::Big, ByteOrder::Big)
            .await
        {
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

    async fn write_tag_value(&self, tag: &TagDefinition, value: &Value) -> bool {
        self.base.count_writes(1);
        let parsed = match parse_modbus_address(&tag.address) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.base.record_error(&e.to_string());
                return false;
            }
        };
        match self
            .write_single(&parsed, value, tag.datatype, tag.byte_order, tag.word_order)
            .await
        {
            Ok(()) => {
                self.base.record_success();
                true
            }
            Err(e) => {
                self.base.record_error(&e.to_string());
                tracing::error!(
                    connector = %self.base.name(),
                    address = %tag.address,
                    error = %e,
                    "write failed"
                );
                false
            }
        }
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

fn open_serial(
    device: &str,
    baudrate: u32,
    parity: &str,
    stopbits: u8,
    bytesize: u8,
    timeout: Duration,
) -> Result<serial::SystemPort, ConnectorError> {
    use serial::SerialPort;

    let mut port = serial::open(device)
        .map_err(|e| ConnectorError::Connect(device.to_string(), e.to_string()))?;
    port.reconfigure(&|settings| {
        settings.set_baud_rate(serial::BaudRate::from_speed(baudrate as usize))?;
        settings.set_char_size(match bytesize {
            7 => serial::Bits7,
            _ => serial::Bits8,
        });
        settings.set_parity(match parity {
            "E" | "e" => serial::ParityEven,
            "O" | "o" => serial::ParityOdd,
            _ => serial::ParityNone,
        });
        settings.set_stop_bits(match stopbits {
            2 => serial::Stop2,
            _ => serial::Stop1,
        });
        settings.set_flow_control(serial::FlowNone);
        Ok(())
    })
    .map_err(|e| ConnectorError::Connect(device.to_string(), e.to_string()))?;
    port.set_timeout(timeout)
        .map_err(|e| ConnectorError::Connect(device.to_string(), e.to_string()))?;
    Ok(port)
}
