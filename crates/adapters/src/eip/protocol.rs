// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CIP message encoding for EtherNet/IP.
//!
//! Everything below the TCP socket is little-endian: the encapsulation
//! header, the common packet format, and CIP itself. Symbolic addressing
//! uses ANSI extended symbol segments padded to even length.

use crate::base::ConnectorError;
use mtpgw_addr::eip::EipAddress;
use mtpgw_core::tag::{DataType, Value};

// CIP services
pub const SVC_READ_TAG: u8 = 0x4C;
pub const SVC_WRITE_TAG: u8 = 0x4D;
pub const SVC_MULTI: u8 = 0x0A;

// CIP elementary data types
pub const CIP_BOOL: u16 = 0x00C1;
pub const CIP_SINT: u16 = 0x00C2;
pub const CIP_INT: u16 = 0x00C3;
pub const CIP_DINT: u16 = 0x00C4;
pub const CIP_LINT: u16 = 0x00C5;
pub const CIP_USINT: u16 = 0x00C6;
pub const CIP_UINT: u16 = 0x00C7;
pub const CIP_UDINT: u16 = 0x00C8;
pub const CIP_ULINT: u16 = 0x00C9;
pub const CIP_REAL: u16 = 0x00CA;
pub const CIP_LREAL: u16 = 0x00CB;

// Encapsulation commands
pub const ENCAP_REGISTER_SESSION: u16 = 0x0065;
pub const ENCAP_UNREGISTER_SESSION: u16 = 0x0066;
pub const ENCAP_SEND_RR_DATA: u16 = 0x006F;

/// Encode the padded EPATH for a symbolic address.
pub fn encode_path(address: &EipAddress) -> Vec<u8> {
    let mut path = Vec::new();

    fn push_symbol(path: &mut Vec<u8>, name: &str) {
        path.push(0x91);
        path.push(name.len() as u8);
        path.extend_from_slice(name.as_bytes());
        if name.len() % 2 == 1 {
            path.push(0x00);
        }
    }

    if let Some(program) = &address.program {
        push_symbol(&mut path, &format!("Program:{program}"));
    }
    for segment in &address.segments {
        push_symbol(&mut path, &segment.name);
        for index in &segment.indices {
            if *index <= 0xFF {
                path.extend_from_slice(&[0x28, *index as u8]);
            } else if *index <= 0xFFFF {
                path.push(0x29);
                path.push(0x00);
                path.extend_from_slice(&(*index as u16).to_le_bytes());
            } else {
                path.push(0x2A);
                path.push(0x00);
                path.extend_from_slice(&index.to_le_bytes());
            }
        }
    }
    path
}

fn with_path(service: u8, path: &[u8]) -> Vec<u8> {
    let mut cip = Vec::with_capacity(2 + path.len());
    cip.push(service);
    cip.push((path.len() / 2) as u8);
    cip.extend_from_slice(path);
    cip
}

/// CIP Read Tag request.
pub fn build_read_request(address: &EipAddress) -> Vec<u8> {
    let mut cip = with_path(SVC_READ_TAG, &encode_path(address));
    cip.extend_from_slice(&1u16.to_le_bytes()); // element count
    cip
}

/// CIP Write Tag request.
pub fn build_write_request(
    address: &EipAddress,
    value: &Value,
    datatype: DataType,
) -> Result<Vec<u8>, ConnectorError> {
    let (type_code, data) = encode_typed_value(value, datatype)?;
    let mut cip = with_path(SVC_WRITE_TAG, &encode_path(address));
    cip.extend_from_slice(&type_code.to_le_bytes());
    cip.extend_from_slice(&1u16.to_le_bytes());
    cip.extend_from_slice(&data);
    Ok(cip)
}

/// Wrap several embedded requests into a Multiple Service Packet.
pub fn build_multi_service(requests: &[Vec<u8>]) -> Vec<u8> {
    // Path to the message router: class 0x02, instance 1
    let mut cip = vec![SVC_MULTI, 0x02, 0x20, 0x02, 0x24, 0x01];
    let count = requests.len() as u16;
    cip.extend_from_slice(&count.to_le_bytes());

    let mut offset = 2 + 2 * requests.len() as u16;
    for request in requests {
        cip.extend_from_slice(&offset.to_le_bytes());
        offset += request.len() as u16;
    }
    for request in requests {
        cip.extend_from_slice(request);
    }
    cip
}

/// Strip the CIP reply header, returning the payload after status checks.
pub fn parse_reply(cip: &[u8]) -> Result<&[u8], ConnectorError> {
    if cip.len() < 4 {
        return Err(ConnectorError::Protocol("short CIP reply".into()));
    }
    let status = cip[2];
    if status != 0 {
        return Err(ConnectorError::Protocol(format!("CIP status 0x{status:02X}")));
    }
    let extra = cip[3] as usize * 2;
    if cip.len() < 4 + extra {
        return Err(ConnectorError::Protocol("truncated CIP reply".into()));
    }
    Ok(&cip[4 + extra..])
}

/// Split a Multiple Service Packet reply into its embedded replies.
pub fn split_multi_reply(cip: &[u8]) -> Result<Vec<&[u8]>, ConnectorError> {
    let payload = parse_reply(cip)?;
    if payload.len() < 2 {
        return Err(ConnectorError::Protocol("short multi-service reply".into()));
    }
    let count = u16::from_le_bytes([payload[0], payload[1]]) as usize;
    if payload.len() < 2 + 2 * count {
        return Err(ConnectorError::Protocol("truncated multi-service offsets".into()));
    }
    let mut offsets = Vec::with_capacity(count);
    for i in 0..count {
        offsets.push(u16::from_le_bytes([payload[2 + 2 * i], payload[3 + 2 * i]]) as usize);
    }
    let mut replies = Vec::with_capacity(count);
    for (i, start) in offsets.iter().enumerate() {
        let end = offsets.get(i + 1).copied().unwrap_or(payload.len());
        if *start > end || end > payload.len() {
            return Err(ConnectorError::Protocol("bad multi-service offset".into()));
        }
        replies.push(&payload[*start..end]);
    }
    Ok(replies)
}

/// Decode a typed CIP value (`type code + data`, as in a read reply).
pub fn decode_typed_value(payload: &[u8]) -> Result<Value, ConnectorError> {
    if payload.len() < 2 {
        return Err(ConnectorError::Protocol("missing CIP type code".into()));
    }
    let type_code = u16::from_le_bytes([payload[0], payload[1]]);
    let data = &payload[2..];

    let need = |n: usize| -> Result<(), ConnectorError> {
        if data.len() < n {
            Err(ConnectorError::Protocol(format!(
                "short CIP data for type 0x{type_code:04X}"
            )))
        } else {
            Ok(())
        }
    };

    Ok(match type_code {
        CIP_BOOL => {
            need(1)?;
            Value::Bool(data[0] != 0)
        }
        CIP_SINT => {
            need(1)?;
            Value::Int((data[0] as i8).into())
        }
        CIP_USINT => {
            need(1)?;
            Value::Int(data[0].into())
        }
        CIP_INT => {
            need(2)?;
            Value::Int(i16::from_le_bytes([data[0], data[1]]).into())
        }
        CIP_UINT => {
            need(2)?;
            Value::Int(u16::from_le_bytes([data[0], data[1]]).into())
        }
        CIP_DINT => {
            need(4)?;
            Value::Int(i32::from_le_bytes([data[0], data[1], data[2], data[3]]).into())
        }
        CIP_UDINT => {
            need(4)?;
            Value::Int(u32::from_le_bytes([data[0], data[1], data[2], data[3]]).into())
        }
        CIP_LINT | CIP_ULINT => {
            need(8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[..8]);
            Value::Int(i64::from_le_bytes(buf))
        }
        CIP_REAL => {
            need(4)?;
            Value::Float(f32::from_le_bytes([data[0], data[1], data[2], data[3]]).into())
        }
        CIP_LREAL => {
            need(8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&data[..8]);
            Value::Float(f64::from_le_bytes(buf))
        }
        other => {
            return Err(ConnectorError::Unsupported(format!(
                "CIP data type 0x{other:04X}"
            )))
        }
    })
}

/// Encode a value for a Write Tag request.
pub fn encode_typed_value(
    value: &Value,
    datatype: DataType,
) -> Result<(u16, Vec<u8>), ConnectorError> {
    let err = || ConnectorError::Unsupported(format!("cannot encode {value:?} as {datatype}"));
    Ok(match datatype {
        DataType::Bool => (CIP_BOOL, vec![u8::from(value.as_bool().ok_or_else(err)?)]),
        DataType::Int16 => {
            (CIP_INT, (value.as_i64().ok_or_else(err)? as i16).to_le_bytes().to_vec())
        }
        DataType::Uint16 => {
            (CIP_UINT, (value.as_i64().ok_or_else(err)? as u16).to_le_bytes().to_vec())
        }
        DataType::Int32 => {
            (CIP_DINT, (value.as_i64().ok_or_else(err)? as i32).to_le_bytes().to_vec())
        }
        DataType::Uint32 => {
            (CIP_UDINT, (value.as_i64().ok_or_else(err)? as u32).to_le_bytes().to_vec())
        }
        DataType::Int64 => (CIP_LINT, value.as_i64().ok_or_else(err)?.to_le_bytes().to_vec()),
        DataType::Uint64 => (CIP_ULINT, value.as_i64().ok_or_else(err)?.to_le_bytes().to_vec()),
        DataType::Float32 => {
            (CIP_REAL, (value.as_f64().ok_or_else(err)? as f32).to_le_bytes().to_vec())
        }
        DataType::Float64 => {
            (CIP_LREAL, value.as_f64().ok_or_else(err)?.to_le_bytes().to_vec())
        }
        DataType::String => return Err(ConnectorError::Unsupported("EIP string write".into())),
    })
}

/// Build an encapsulation frame.
pub fn encap_frame(command: u16, session: u32, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(24 + data.len());
    frame.extend_from_slice(&command.to_le_bytes());
    frame.extend_from_slice(&(data.len() as u16).to_le_bytes());
    frame.extend_from_slice(&session.to_le_bytes());
    frame.extend_from_slice(&0u32.to_le_bytes()); // status
    frame.extend_from_slice(&[0u8; 8]); // sender context
    frame.extend_from_slice(&0u32.to_le_bytes()); // options
    frame.extend_from_slice(data);
    frame
}

/// RegisterSession request data.
pub fn register_session_data() -> Vec<u8> {
    let mut data = Vec::with_capacity(4);
    data.extend_from_slice(&1u16.to_le_bytes()); // protocol version
    data.extend_from_slice(&0u16.to_le_bytes()); // options
    data
}

/// SendRRData payload wrapping a CIP message in the common packet format.
pub fn send_rr_data(cip: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(16 + cip.len());
    data.extend_from_slice(&0u32.to_le_bytes()); // interface handle
    data.extend_from_slice(&10u16.to_le_bytes()); // timeout
    data.extend_from_slice(&2u16.to_le_bytes()); // item count
    data.extend_from_slice(&0x0000u16.to_le_bytes()); // null address item
    data.extend_from_slice(&0u16.to_le_bytes());
    data.extend_from_slice(&0x00B2u16.to_le_bytes()); // unconnected data item
    data.extend_from_slice(&(cip.len() as u16).to_le_bytes());
    data.extend_from_slice(cip);
    data
}

/// Extract the CIP payload from a SendRRData response frame (header included).
pub fn parse_encap_response(frame: &[u8]) -> Result<&[u8], ConnectorError> {
    if frame.len() < 24 {
        return Err(ConnectorError::Protocol("short encapsulation frame".into()));
    }
    let status = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
    if status != 0 {
        return Err(ConnectorError::Protocol(format!(
            "encapsulation status 0x{status:08X}"
        )));
    }
    let body = &frame[24..];
    // interface handle (4) + timeout (2) + item count (2)
    if body.len() < 8 {
        return Err(ConnectorError::Protocol("short CPF".into()));
    }
    let item_count = u16::from_le_bytes([body[6], body[7]]) as usize;
    let mut cursor = 8;
    for _ in 0..item_count {
        if body.len() < cursor + 4 {
            return Err(ConnectorError::Protocol("truncated CPF item".into()));
        }
        let item_type = u16::from_le_bytes([body[cursor], body[cursor + 1]]);
        let item_len = u16::from_le_bytes([body[cursor + 2], body[cursor + 3]]) as usize;
        cursor += 4;
        if body.len() < cursor + item_len {
            return Err(ConnectorError::Protocol("truncated CPF payload".into()));
        }
        if item_type == 0x00B2 {
            return Ok(&body[cursor..cursor + item_len]);
        }
        cursor += item_len;
    }
    Err(ConnectorError::Protocol("no unconnected data item in reply".into()))
}

/// Session id from a RegisterSession response frame.
pub fn parse_session_id(frame: &[u8]) -> Result<u32, ConnectorError> {
    if frame.len() < 24 {
        return Err(ConnectorError::Protocol("short register-session reply".into()));
    }
    let status = u32::from_le_bytes([frame[8], frame[9], frame[10], frame[11]]);
    if status != 0 {
        return Err(ConnectorError::Protocol(format!(
            "register session refused 0x{status:08X}"
        )));
    }
    Ok(u32::from_le_bytes([frame[4], frame[5], frame[6], frame[7]]))
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
