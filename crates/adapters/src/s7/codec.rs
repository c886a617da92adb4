// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S7 value encoding. Everything on the wire is big-endian.
//!
//! Four-byte areas (`DBD`, `MD`, …) are ambiguous between DINT and REAL;
//! they decode as float only when the consuming tag says so.

use crate::base::ConnectorError;
use mtpgw_addr::s7::{S7Address, S7Width};
use mtpgw_core::tag::{DataType, Value};

/// Decode raw bytes read from the PLC into a typed value.
pub fn decode_s7_value(
    bytes: &[u8],
    address: &S7Address,
    datatype: DataType,
) -> Result<Value, ConnectorError> {
    let need = address.size();
    if bytes.len() < need {
        return Err(ConnectorError::Protocol(format!(
            "short S7 read: got {} bytes, need {need}",
            bytes.len()
        )));
    }

    if let Some(bit) = address.bit {
        return Ok(Value::Bool(bytes[0] & (1 << bit) != 0));
    }

    Ok(match address.width {
        S7Width::Bit => Value::Bool(bytes[0] & 0x01 != 0),
        S7Width::Byte => Value::Int(i64::from(bytes[0])),
        S7Width::Word => {
            let raw = [bytes[0], bytes[1]];
            if signed(datatype) {
                Value::Int(i16::from_be_bytes(raw).into())
            } else {
                Value::Int(u16::from_be_bytes(raw).into())
            }
        }
        S7Width::DWord => {
            let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
            if datatype.is_float() {
                Value::Float(f32::from_be_bytes(raw).into())
            } else if signed(datatype) {
                Value::Int(i32::from_be_bytes(raw).into())
            } else {
                Value::Int(u32::from_be_bytes(raw).into())
            }
        }
    })
}

/// Encode a typed value for writing to the PLC.
pub fn encode_s7_value(
    value: &Value,
    address: &S7Address,
    datatype: DataType,
) -> Result<Vec<u8>, ConnectorError> {
    if let Some(bit) = address.bit {
        let state = value
            .as_bool()
            .ok_or_else(|| encode_err(value, "bit"))?;
        return Ok(vec![if state { 1 << bit } else { 0 }]);
    }

    Ok(match address.width {
        S7Width::Bit => {
            let state = value.as_bool().ok_or_else(|| encode_err(value, "bit"))?;
            vec![u8::from(state)]
        }
        S7Width::Byte => {
            let v = value.as_i64().ok_or_else(|| encode_err(value, "byte"))?;
            vec![(v & 0xFF) as u8]
        }
        S7Width::Word => {
            let v = value.as_i64().ok_or_else(|| encode_err(value, "word"))?;
            ((v as i16).to_be_bytes()).to_vec()
        }
        S7Width::DWord => {
            if datatype.is_float() {
                let v = value.as_f64().ok_or_else(|| encode_err(value, "real"))?;
                ((v as f32).to_be_bytes()).to_vec()
            } else {
                let v = value.as_i64().ok_or_else(|| encode_err(value, "dword"))?;
                ((v as i32).to_be_bytes()).to_vec()
            }
        }
    })
}

fn signed(datatype: DataType) -> bool {
    matches!(datatype, DataType::Int16 | DataType::Int32 | DataType::Int64)
}

fn encode_err(value: &Value, kind: &str) -> ConnectorError {
    ConnectorError::Unsupported(format!("cannot encode {value:?} as S7 {kind}"))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
