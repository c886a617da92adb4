// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Register-level encoding for Modbus values.
//!
//! Multi-register values are assembled from 16-bit words honoring the
//! tag's configured byte order (within a word) and word order (across
//! words). The wire itself is always big-endian per word.

use crate::base::ConnectorError;
use mtpgw_core::tag::{ByteOrder, DataType, Value};

/// Number of 16-bit registers a datatype occupies.
pub fn register_count(datatype: DataType) -> u16 {
    match datatype {
        DataType::Bool | DataType::Int16 | DataType::Uint16 | DataType::String => 1,
        DataType::Int32 | DataType::Uint32 | DataType::Float32 => 2,
        DataType::Int64 | DataType::Uint64 | DataType::Float64 => 4,
    }
}

fn to_bytes(registers: &[u16], byte_order: ByteOrder, word_order: ByteOrder) -> Vec<u8> {
    let mut words: Vec<u16> = registers.to_vec();
    if word_order == ByteOrder::Little && words.len() > 1 {
        words.reverse();
    }
    let mut bytes = Vec::with_capacity(words.len() * 2);
    for word in words {
        let pair = word.to_be_bytes();
        match byte_order {
            ByteOrder::Big => bytes.extend_from_slice(&pair),
            ByteOrder::Little => bytes.extend_from_slice(&[pair[1], pair[0]]),
        }
    }
    bytes
}

fn from_bytes(bytes: &[u8], byte_order: ByteOrder, word_order: ByteOrder) -> Vec<u16> {
    let mut words: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| match byte_order {
            ByteOrder::Big => u16::from_be_bytes([pair[0], pair[1]]),
            ByteOrder::Little => u16::from_be_bytes([pair[1], pair[0]]),
        })
        .collect();
    if word_order == ByteOrder::Little && words.len() > 1 {
        words.reverse();
    }
    words
}

/// Decode registers into a typed value.
pub fn decode_registers(
    registers: &[u16],
    datatype: DataType,
    byte_order: ByteOrder,
    word_order: ByteOrder,
) -> Result<Value, ConnectorError> {
    let needed = register_count(datatype) as usize;
    if registers.len() < needed {
        return Err(ConnectorError::Protocol(format!(
            "not enough registers for {datatype}: got {}, need {needed}",
            registers.len()
        )));
    }
    if datatype == DataType::Bool {
        return Ok(Value::Bool(registers[0] & 0x01 != 0));
    }

    let bytes = to_bytes(&registers[..needed], byte_order, word_order);
    Ok(match datatype {
        DataType::Int16 => Value::Int(i16::from_be_bytes([bytes[0], bytes[1]]).into()),
        DataType::Uint16 => Value::Int(u16::from_be_bytes([bytes[0], bytes[1]]).into()),
        DataType::Int32 => {
            Value::Int(i32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).into())
        }
        DataType::Uint32 => {
            Value::Int(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).into())
        }
        DataType::Int64 | DataType::Uint64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            Value::Int(i64::from_be_bytes(buf))
        }
        DataType::Float32 => {
            Value::Float(f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]).into())
        }
        DataType::Float64 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes[..8]);
            Value::Float(f64::from_be_bytes(buf))
        }
        DataType::Bool | DataType::String => {
            return Err(ConnectorError::Unsupported(format!(
                "modbus decode for {datatype}"
            )))
        }
    })
}

/// Encode a typed value into registers.
pub fn encode_value(
    value: &Value,
    datatype: DataType,
    byte_order: ByteOrder,
    word_order: ByteOrder,
) -> Result<Vec<u16>, ConnectorError> {
    let bytes: Vec<u8> = match datatype {
        DataType::Bool => {
            let v = value
                .as_bool()
                .ok_or_else(|| type_err(value, datatype))?;
            return Ok(vec![u16::from(v)]);
        }
        DataType::Int16 => (value.as_i64().ok_or_else(|| type_err(value, datatype))? as i16)
            .to_be_bytes()
            .to_vec(),
        DataType::Uint16 => (value.as_i64().ok_or_else(|| type_err(value, datatype))? as u16)
            .to_be_bytes()
            .to_vec(),
        DataType::Int32 => (value.as_i64().ok_or_else(|| type_err(value, datatype))? as i32)
            .to_be_bytes()
            .to_vec(),
        DataType::Uint32 => (value.as_i64().ok_or_else(|| type_err(value, datatype))? as u32)
            .to_be_bytes()
            .to_vec(),
        DataType::Int64 | DataType::Uint64 => value
            .as_i64()
            .ok_or_else(|| type_err(value, datatype))?
            .to_be_bytes()
            .to_vec(),
        DataType::Float32 => (value.as_f64().ok_or_else(|| type_err(value, datatype))? as f32)
            .to_be_bytes()
            .to_vec(),
        DataType::Float64 => value
            .as_f64()
            .ok_or_else(|| type_err(value, datatype))?
            .to_be_bytes()
            .to_vec(),
        DataType::String => {
            return Err(ConnectorError::Unsupported("modbus string write".into()))
        }
    };

    let registers = from_bytes(&bytes, ByteOrder::Big, ByteOrder::Big);
    // Re-apply the configured orders on the way out
    let mut words = registers;
    if word_order == ByteOrder::Little && words.len() > 1 {
        words.reverse();
    }
    if byte_order == ByteOrder::Little {
        for word in &mut words {
            *word = word.swap_bytes();
        }
    }
    Ok(words)
}

fn type_err(value: &Value, datatype: DataType) -> ConnectorError {
    ConnectorError::Unsupported(format!("cannot encode {value:?} as {datatype}"))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
