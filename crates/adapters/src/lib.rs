// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mtpgw-adapters: southbound PLC connectors.
//!
//! One adapter per protocol (Modbus TCP/RTU, Siemens S7, EtherNet/IP,
//! OPC UA client), all implementing the [`Connector`] trait. Adapters never
//! raise past their public methods: failed reads come back as
//! quality-bearing `TagValue`s and failed writes as `false`, while the
//! shared health tracker records the error for the tag manager's reconnect
//! decisions.

pub mod base;
pub mod eip;
pub mod modbus;
pub mod opcua_client;
pub mod s7;

#[cfg(any(test, feature = "test-support"))]
pub mod fake;

pub use base::{
    Connector, ConnectorBase, ConnectorError, ConnectorHealth, ConnectorState, ExponentialBackoff,
};
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeConnector;

use mtpgw_config::{ConnectorConfig, ConnectorTransport};
use std::sync::Arc;

/// Build a connector from configuration.
pub fn create_connector(config: &ConnectorConfig) -> Arc<dyn Connector> {
    match &config.transport {
        ConnectorTransport::ModbusTcp { .. } | ConnectorTransport::ModbusRtu { .. } => {
            Arc::new(modbus::ModbusConnector::new(config.clone()))
        }
        ConnectorTransport::S7 { .. } => Arc::new(s7::S7Connector::new(config.clone())),
        ConnectorTransport::Eip { .. } => Arc::new(eip::EipConnector::new(config.clone())),
        ConnectorTransport::OpcuaClient { .. } => {
            Arc::new(opcua_client::OpcUaClientConnector::new(config.clone()))
        }
    }
}
