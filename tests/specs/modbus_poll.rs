// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Modbus polling scenario: a FLOAT32 tag at 40001 against a PLC
//! holding registers [0x4120, 0x0000] reads 10.0 with good quality.

use mtpgw_adapters::Connector;
use mtpgw_config::{ConnectorConfig, ConnectorTransport};
use mtpgw_core::tag::{Quality, Value};
use mtpgw_engine::TagManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A minimal Modbus TCP responder: answers any read-holding-registers
/// request with [0x4120, 0x0000] and any write with an echo.
async fn mock_plc() -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(async move {
                let mut header = [0u8; 6];
                loop {
                    if stream.read_exact(&mut header).await.is_err() {
                        return;
                    }
                    let body_len = u16::from_be_bytes([header[4], header[5]]) as usize;
                    let mut body = vec![0u8; body_len];
                    if stream.read_exact(&mut body).await.is_err() {
                        return;
                    }
                    let unit = body[0];
                    let func = body[1];
                    let response_body: Vec<u8> = match func {
                        // read holding registers → 0x4120 0x0000
                        0x03 => vec![unit, 0x03, 0x04, 0x41, 0x20, 0x00, 0x00],
                        // echo writes back
                        0x05 | 0x06 => {
                            let mut echo = vec![unit, func];
                            echo.extend_from_slice(&body[2..6]);
                            echo
                        }
                        other => vec![unit, other | 0x80, 0x01],
                    };
                    let mut frame = Vec::with_capacity(6 + response_body.len());
                    frame.extend_from_slice(&header[0..4]);
                    frame.extend_from_slice(&(response_body.len() as u16).to_be_bytes());
                    frame.extend_from_slice(&response_body);
                    if stream.write_all(&frame).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test]
async fn modbus_poll_decodes_float32() {
    let addr = mock_plc().await;

    let connector_config = ConnectorConfig {
        name: "plc1".to_string(),
        transport: ConnectorTransport::ModbusTcp {
            host: addr.ip().to_string(),
            port: addr.port(),
            unit_id: 1,
        },
        poll_interval_ms: 1000,
        timeout_ms: 2000,
        retry_delay_ms: 100,
        retry_count: 3,
    };
    let connector = mtpgw_adapters::create_connector(&connector_config);
    connector.connect().await.unwrap();
    assert!(connector.health_status().is_healthy());

    let mut connectors: HashMap<String, Arc<dyn Connector>> = HashMap::new();
    connectors.insert("plc1".to_string(), connector);
    let mut intervals = HashMap::new();
    intervals.insert("plc1".to_string(), Duration::from_millis(1000));

    let yaml = r#"
name: temp
connector: plc1
address: "40001"
datatype: float32
scale:
  gain: 1.0
  offset: 0.0
"#;
    let tag: mtpgw_config::TagConfig = serde_yaml::from_str(yaml).unwrap();
    let manager = TagManager::new(connectors, vec![tag.to_definition()], intervals, None, None);

    // One on-demand poll of the tag
    let value = manager.read_tag("temp").await.unwrap();
    assert_eq!(value.value, Value::Float(10.0));
    assert_eq!(value.quality, Quality::Good);
}
