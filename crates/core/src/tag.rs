// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tag model: values, quality, scaling, definitions, and runtime state.
//!
//! A tag is a named data point bound to a connector address. Sampled values
//! are immutable [`TagValue`]s carrying an OPC UA-aligned [`Quality`];
//! per-tag counters and the last-good value live in [`TagState`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OPC UA-compatible data quality codes.
///
/// Three bands (Good / Uncertain / Bad) with sub-codes, each mapping to an
/// OPC UA StatusCode numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "Good")]
    Good,
    #[serde(rename = "Good_LocalOverride")]
    GoodLocalOverride,
    #[serde(rename = "Uncertain")]
    Uncertain,
    #[serde(rename = "Uncertain_NoCommunicationLastUsable")]
    UncertainNoCommLastUsable,
    #[serde(rename = "Uncertain_SensorNotAccurate")]
    UncertainSensorNotAccurate,
    #[serde(rename = "Uncertain_LastUsableValue")]
    UncertainLastUsableValue,
    #[serde(rename = "Bad")]
    Bad,
    #[serde(rename = "Bad_NoCommunication")]
    BadNoCommunication,
    #[serde(rename = "Bad_SensorFailure")]
    BadSensorFailure,
    #[serde(rename = "Bad_NotConnected")]
    BadNotConnected,
    #[serde(rename = "Bad_DeviceFailure")]
    BadDeviceFailure,
    #[serde(rename = "Bad_ConfigurationError")]
    BadConfigError,
    #[serde(rename = "Bad_OutOfService")]
    BadOutOfService,
}

crate::simple_display! {
    Quality {
        Good => "Good",
        GoodLocalOverride => "Good_LocalOverride",
        Uncertain => "Uncertain",
        UncertainNoCommLastUsable => "Uncertain_NoCommunicationLastUsable",
        UncertainSensorNotAccurate => "Uncertain_SensorNotAccurate",
        UncertainLastUsableValue => "Uncertain_LastUsableValue",
        Bad => "Bad",
        BadNoCommunication => "Bad_NoCommunication",
        BadSensorFailure => "Bad_SensorFailure",
        BadNotConnected => "Bad_NotConnected",
        BadDeviceFailure => "Bad_DeviceFailure",
        BadConfigError => "Bad_ConfigurationError",
        BadOutOfService => "Bad_OutOfService",
    }
}

impl Quality {
    pub fn is_good(self) -> bool {
        matches!(self, Quality::Good | Quality::GoodLocalOverride)
    }

    pub fn is_uncertain(self) -> bool {
        matches!(
            self,
            Quality::Uncertain
                | Quality::UncertainNoCommLastUsable
                | Quality::UncertainSensorNotAccurate
                | Quality::UncertainLastUsableValue
        )
    }

    pub fn is_bad(self) -> bool {
        !self.is_good() && !self.is_uncertain()
    }

    /// OPC UA StatusCode numeric value (OPC UA Part 8).
    pub fn status_code(self) -> u32 {
        match self {
            Quality::Good => 0x0000_0000,
            Quality::GoodLocalOverride => 0x00D8_0000,
            Quality::Uncertain => 0x4000_0000,
            Quality::UncertainNoCommLastUsable => 0x408F_0000,
            Quality::UncertainSensorNotAccurate => 0x4093_0000,
            Quality::UncertainLastUsableValue => 0x408C_0000,
            Quality::Bad => 0x8000_0000,
            Quality::BadNoCommunication => 0x8031_0000,
            Quality::BadSensorFailure => 0x8032_0000,
            Quality::BadNotConnected => 0x80AB_0000,
            Quality::BadDeviceFailure => 0x8033_0000,
            Quality::BadConfigError => 0x8089_0000,
            Quality::BadOutOfService => 0x808A_0000,
        }
    }
}

/// Supported PLC data types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Bool,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
    String,
}

crate::simple_display! {
    DataType {
        Bool => "bool",
        Int16 => "int16",
        Uint16 => "uint16",
        Int32 => "int32",
        Uint32 => "uint32",
        Int64 => "int64",
        Uint64 => "uint64",
        Float32 => "float32",
        Float64 => "float64",
        String => "string",
    }
}

impl DataType {
    /// Size in bytes (0 for variable-length types).
    pub fn byte_size(self) -> usize {
        match self {
            DataType::Bool => 1,
            DataType::Int16 | DataType::Uint16 => 2,
            DataType::Int32 | DataType::Uint32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Uint64 | DataType::Float64 => 8,
            DataType::String => 0,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, DataType::Bool | DataType::String)
    }
}

/// A dynamically-typed tag value scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Int(i) => Some(*i != 0),
            Value::Float(f) => Some(*f != 0.0),
            Value::Text(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => Some(*f as i64),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Text(_) => None,
        }
    }

    /// Numeric values are Int and Float (Bool and Text are not scaled).
    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// A value is truthy when it is a set bool, a non-zero number, or a
    /// non-empty string. Used for interlock node projection.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Text(s) => !s.is_empty(),
        }
    }

    /// Coerce into the declared datatype, rejecting impossible conversions.
    ///
    /// Integer targets truncate floats; float targets widen integers;
    /// strings never convert implicitly.
    pub fn coerce(&self, datatype: DataType) -> Option<Value> {
        match datatype {
            DataType::Bool => self.as_bool().map(Value::Bool),
            DataType::Int16 => self
                .as_i64()
                .filter(|v| i16::try_from(*v).is_ok())
                .map(Value::Int),
            DataType::Uint16 => self
                .as_i64()
                .filter(|v| u16::try_from(*v).is_ok())
                .map(Value::Int),
            DataType::Int32 => self
                .as_i64()
                .filter(|v| i32::try_from(*v).is_ok())
                .map(Value::Int),
            DataType::Uint32 => self
                .as_i64()
                .filter(|v| u32::try_from(*v).is_ok())
                .map(Value::Int),
            DataType::Int64 | DataType::Uint64 => self.as_i64().map(Value::Int),
            DataType::Float32 | DataType::Float64 => self.as_f64().map(Value::Float),
            DataType::String => match self {
                Value::Text(s) => Some(Value::Text(s.clone())),
                _ => None,
            },
        }
    }

    /// Compare two values, promoting numerics to f64. Bools and strings
    /// compare only for equality ordering.
    pub fn compare(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => {
                let a = self.as_f64()?;
                let b = other.as_f64()?;
                a.partial_cmp(&b)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

/// Immutable snapshot of a tag's value at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagValue {
    pub value: Value,
    pub timestamp: DateTime<Utc>,
    pub quality: Quality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_timestamp: Option<DateTime<Utc>>,
}

impl TagValue {
    /// A good quality value sampled now.
    pub fn good(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            timestamp: Utc::now(),
            quality: Quality::Good,
            source_timestamp: None,
        }
    }

    pub fn with_quality(value: impl Into<Value>, quality: Quality) -> Self {
        Self {
            value: value.into(),
            timestamp: Utc::now(),
            quality,
            source_timestamp: None,
        }
    }

    /// Communication failure with no usable prior value.
    pub fn bad_no_comm() -> Self {
        Self::with_quality(Value::Int(0), Quality::BadNoCommunication)
    }

    /// Address or datatype problem; the connector stays connected.
    pub fn bad_config() -> Self {
        Self::with_quality(Value::Int(0), Quality::BadConfigError)
    }

    /// Promote a previously good value after a communication failure.
    pub fn uncertain_last_usable(last_good: &TagValue) -> Self {
        Self {
            value: last_good.value.clone(),
            timestamp: Utc::now(),
            quality: Quality::UncertainNoCommLastUsable,
            source_timestamp: Some(last_good.timestamp),
        }
    }
}

/// Linear scaling configuration for analog values.
///
/// Applies `scaled = raw * gain + offset`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfig {
    pub gain: f64,
    pub offset: f64,
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self { gain: 1.0, offset: 0.0 }
    }
}

impl ScaleConfig {
    pub fn apply(&self, raw: f64) -> f64 {
        raw * self.gain + self.offset
    }

    /// Reverse scaling to get the raw value. None when gain is zero.
    pub fn reverse(&self, scaled: f64) -> Option<f64> {
        if self.gain == 0.0 {
            return None;
        }
        Some((scaled - self.offset) / self.gain)
    }
}

/// Byte or word ordering for multi-register values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Big,
    Little,
}

/// Configuration for a tag mapping from PLC to gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagDefinition {
    pub name: String,
    pub connector: String,
    pub address: String,
    pub datatype: DataType,
    pub writable: bool,
    pub scale: Option<ScaleConfig>,
    pub unit: String,
    pub description: String,
    pub byte_order: ByteOrder,
    pub word_order: ByteOrder,
}

impl TagDefinition {
    /// Apply scaling if configured (numeric raw values only).
    pub fn apply_scale(&self, raw: f64) -> f64 {
        match &self.scale {
            Some(s) => s.apply(raw),
            None => raw,
        }
    }

    /// Reverse scaling if configured. None when the configured gain is zero.
    pub fn reverse_scale(&self, scaled: f64) -> Option<f64> {
        match &self.scale {
            Some(s) => s.reverse(scaled),
            None => Some(scaled),
        }
    }
}

crate::builder! {
    pub struct TagDefinitionBuilder => TagDefinition {
        into {
            name: String = "temp",
            connector: String = "plc1",
            address: String = "40001",
            unit: String = "",
            description: String = "",
        }
        set {
            datatype: DataType = DataType::Float32,
            writable: bool = false,
            scale: Option<ScaleConfig> = None,
            byte_order: ByteOrder = ByteOrder::Big,
            word_order: ByteOrder = ByteOrder::Big,
        }
    }
}

/// Mutable per-tag runtime state.
///
/// Created at startup from configuration, updated by polling or confirmed
/// writes, never destroyed during runtime.
#[derive(Debug, Clone)]
pub struct TagState {
    pub definition: TagDefinition,
    pub current_value: Option<TagValue>,
    pub last_good_value: Option<TagValue>,
    pub read_count: u64,
    pub write_count: u64,
    pub error_count: u64,
}

impl TagState {
    pub fn new(definition: TagDefinition) -> Self {
        Self {
            definition,
            current_value: None,
            last_good_value: None,
            read_count: 0,
            write_count: 0,
            error_count: 0,
        }
    }

    /// Update the tag with a new value. Returns true when the value changed
    /// (the caller notifies subscribers on change).
    pub fn update(&mut self, new_value: TagValue) -> bool {
        let changed = match &self.current_value {
            Some(old) => old.value != new_value.value,
            None => true,
        };

        self.read_count += 1;
        if new_value.quality.is_good() {
            self.last_good_value = Some(new_value.clone());
        } else if new_value.quality.is_bad() {
            self.error_count += 1;
        }
        self.current_value = Some(new_value);
        changed
    }

    /// Current quality, or BadNotConnected before the first sample.
    pub fn quality(&self) -> Quality {
        self.current_value
            .as_ref()
            .map(|v| v.quality)
            .unwrap_or(Quality::BadNotConnected)
    }
}

#[cfg(test)]
#[path = "tag_tests.rs"]
mod tests;
