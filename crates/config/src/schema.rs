// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration document schema.
//!
//! Field names and defaults are part of the external contract; the schema
//! version is semver and checked on load (`major` must match, newer `minor`
//! within the same major is accepted).

use indexmap::IndexMap;
use mtpgw_core::service::TimeoutAction;
use mtpgw_core::tag::{ByteOrder, DataType, Value};
use serde::{Deserialize, Serialize};

/// Schema version written by `generate-example` and checked by `validate`.
pub const CONFIG_SCHEMA_VERSION: &str = "1.2";

/// The complete gateway configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_version")]
    pub version: String,
    pub gateway: GatewayInfo,
    pub opcua: OpcUaConfig,
    #[serde(default)]
    pub connectors: Vec<ConnectorConfig>,
    #[serde(default)]
    pub tags: Vec<TagConfig>,
    #[serde(default)]
    pub data_assemblies: Vec<DataAssemblyConfig>,
    #[serde(default)]
    pub services: Vec<ServiceConfig>,
    #[serde(default)]
    pub webui: WebUiConfig,
    #[serde(default)]
    pub safety: SafetySection,
    /// Interlock bindings per service name.
    #[serde(default)]
    pub interlocks: IndexMap<String, Vec<InterlockBindingConfig>>,
    #[serde(default)]
    pub storage: StorageConfig,
}

fn default_version() -> String {
    CONFIG_SCHEMA_VERSION.to_string()
}

/// Gateway identity. `name` becomes the PEA name in every NodeId.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayInfo {
    pub name: String,
    #[serde(default = "default_gateway_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub vendor_url: Option<String>,
}

fn default_gateway_version() -> String {
    "1.0.0".to_string()
}

/// Northbound OPC UA surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcUaConfig {
    /// opc.tcp endpoint URL, e.g. `opc.tcp://0.0.0.0:4840/mtpgw`.
    pub endpoint: String,
    /// Application namespace URI registered on the server.
    pub namespace_uri: String,
    #[serde(default)]
    pub security: Option<OpcUaSecurityConfig>,
}

/// Security options for OPC UA (server side and client connectors).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcUaSecurityConfig {
    #[serde(default)]
    pub policy: SecurityPolicy,
    #[serde(default)]
    pub mode: SecurityMode,
    #[serde(default)]
    pub certificate: Option<String>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityPolicy {
    #[default]
    None,
    Basic128Rsa15,
    Basic256,
    Basic256Sha256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SecurityMode {
    #[default]
    None,
    Sign,
    SignAndEncrypt,
}

/// One southbound connector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,
    #[serde(flatten)]
    pub transport: ConnectorTransport,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_retry_count() -> u32 {
    10
}

/// Protocol-specific connector settings, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorTransport {
    ModbusTcp {
        host: String,
        #[serde(default = "default_modbus_port")]
        port: u16,
        #[serde(default = "default_unit_id")]
        unit_id: u8,
    },
    ModbusRtu {
        /// Serial device path, e.g. `/dev/ttyUSB0`.
        device: String,
        #[serde(default = "default_baudrate")]
        baudrate: u32,
        #[serde(default = "default_parity")]
        parity: String,
        #[serde(default = "default_stopbits")]
        stopbits: u8,
        #[serde(default = "default_bytesize")]
        bytesize: u8,
        #[serde(default = "default_unit_id")]
        unit_id: u8,
    },
    S7 {
        host: String,
        #[serde(default = "default_s7_port")]
        port: u16,
        #[serde(default)]
        rack: u16,
        #[serde(default = "default_slot")]
        slot: u16,
    },
    Eip {
        host: String,
        #[serde(default = "default_eip_port")]
        port: u16,
    },
    OpcuaClient {
        endpoint: String,
        #[serde(default)]
        security: Option<OpcUaSecurityConfig>,
    },
}

fn default_modbus_port() -> u16 {
    502
}

fn default_unit_id() -> u8 {
    1
}

fn default_baudrate() -> u32 {
    9600
}

fn default_parity() -> String {
    "N".to_string()
}

fn default_stopbits() -> u8 {
    1
}

fn default_bytesize() -> u8 {
    8
}

fn default_s7_port() -> u16 {
    102
}

fn default_slot() -> u16 {
    1
}

fn default_eip_port() -> u16 {
    44818
}

impl ConnectorTransport {
    /// Protocol name as used by the address validators.
    pub fn protocol(&self) -> &'static str {
        match self {
            ConnectorTransport::ModbusTcp { .. } => "modbus_tcp",
            ConnectorTransport::ModbusRtu { .. } => "modbus_rtu",
            ConnectorTransport::S7 { .. } => "s7",
            ConnectorTransport::Eip { .. } => "eip",
            ConnectorTransport::OpcuaClient { .. } => "opcua_client",
        }
    }
}

/// Linear scaling in configuration form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleConfigEntry {
    #[serde(default = "default_gain")]
    pub gain: f64,
    #[serde(default)]
    pub offset: f64,
}

fn default_gain() -> f64 {
    1.0
}

/// One tag binding a connector address into the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagConfig {
    pub name: String,
    pub connector: String,
    pub address: String,
    pub datatype: DataType,
    #[serde(default)]
    pub writable: bool,
    #[serde(default)]
    pub scale: Option<ScaleConfigEntry>,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub byte_order: ByteOrder,
    #[serde(default)]
    pub word_order: ByteOrder,
}

/// HH/H/L/LL limits for `AnaMon` assemblies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MonitorLimits {
    pub hh_limit: Option<f64>,
    pub h_limit: Option<f64>,
    pub l_limit: Option<f64>,
    pub ll_limit: Option<f64>,
}

/// Interlock source for valve/drive assemblies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaInterlockBinding {
    pub source_tag: String,
}

/// One data assembly exposed northbound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataAssemblyConfig {
    pub name: String,
    /// Type tag: AnaView, AnaServParam, AnaMon, AnaVlv, AnaDrv, BinView,
    /// BinServParam, BinMon, BinVlv, BinDrv, DIntView, DIntServParam,
    /// StringView, PIDCtrl.
    #[serde(rename = "type")]
    pub da_type: String,
    /// Attribute name → tag name.
    #[serde(default)]
    pub bindings: IndexMap<String, String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub v_scl_min: Option<f64>,
    #[serde(default)]
    pub v_scl_max: Option<f64>,
    #[serde(default)]
    pub v_unit: Option<u32>,
    #[serde(default)]
    pub v_state_0: Option<String>,
    #[serde(default)]
    pub v_state_1: Option<String>,
    #[serde(default)]
    pub monitor_limits: Option<MonitorLimits>,
    /// Expected state for `BinMon` state-error detection.
    #[serde(default)]
    pub expected_state: Option<bool>,
    #[serde(default)]
    pub interlock_binding: Option<DaInterlockBinding>,
}

pub const DATA_ASSEMBLY_TYPES: &[&str] = &[
    "AnaView",
    "AnaServParam",
    "AnaMon",
    "AnaVlv",
    "AnaDrv",
    "BinView",
    "BinServParam",
    "BinMon",
    "BinVlv",
    "BinDrv",
    "DIntView",
    "DIntServParam",
    "StringView",
    "PIDCtrl",
];

/// One write executed when a service enters a state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteActionConfig {
    pub tag: String,
    pub value: Value,
}

/// Per-state write hooks. Only states that can carry hooks are listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateHooksConfig {
    pub on_starting: Vec<WriteActionConfig>,
    pub on_execute: Vec<WriteActionConfig>,
    pub on_completing: Vec<WriteActionConfig>,
    pub on_completed: Vec<WriteActionConfig>,
    pub on_stopping: Vec<WriteActionConfig>,
    pub on_stopped: Vec<WriteActionConfig>,
    pub on_aborting: Vec<WriteActionConfig>,
    pub on_aborted: Vec<WriteActionConfig>,
    pub on_holding: Vec<WriteActionConfig>,
    pub on_held: Vec<WriteActionConfig>,
    pub on_unholding: Vec<WriteActionConfig>,
    pub on_resetting: Vec<WriteActionConfig>,
}

/// Completion condition in configuration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionConfig {
    pub tag: String,
    pub op: mtpgw_core::service::ComparisonOp,
    #[serde(rename = "ref")]
    pub reference: Value,
}

/// Completion detection for a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    pub self_completing: bool,
    pub condition: Option<ConditionConfig>,
    pub timeout_s: Option<f64>,
}

/// State timeout section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateTimeoutsConfig {
    pub auto_complete_acting_states: bool,
    /// State name (e.g. `EXECUTE`) → timeout seconds.
    pub timeouts: IndexMap<String, f64>,
    pub on_timeout: TimeoutAction,
}

impl Default for StateTimeoutsConfig {
    fn default() -> Self {
        Self {
            auto_complete_acting_states: true,
            timeouts: IndexMap::new(),
            on_timeout: TimeoutAction::Abort,
        }
    }
}

/// Parameter referencing a data assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterConfig {
    pub name: String,
    pub data_assembly: String,
    #[serde(default)]
    pub required: bool,
}

/// One procedure of a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureConfig {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
}

/// One PackML-governed service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub mode: mtpgw_core::service::ProxyMode,
    #[serde(default)]
    pub procedures: Vec<ProcedureConfig>,
    #[serde(default)]
    pub parameters: Vec<ParameterConfig>,
    #[serde(default)]
    pub report_values: Vec<String>,
    #[serde(default)]
    pub state_hooks: StateHooksConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub timeouts: StateTimeoutsConfig,
    /// State name → condition holding that acting state open.
    #[serde(default)]
    pub acting_state_conditions: IndexMap<String, ConditionConfig>,
    #[serde(default)]
    pub state_cur_tag: Option<String>,
    #[serde(default)]
    pub command_op_tag: Option<String>,
}

/// History recorder options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub flush_interval_ms: u64,
    pub max_buffer_size: usize,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 1000,
            max_buffer_size: 100,
            include_tags: Vec::new(),
            exclude_tags: Vec::new(),
        }
    }
}

/// A Web UI user with a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    pub password: String,
    pub role: String,
}

/// JWT auth options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub users: Vec<UserConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_minutes: 60,
            users: Vec::new(),
        }
    }
}

/// Web UI server options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebUiConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
    pub min_update_interval_ms: u64,
    pub history: HistoryConfig,
    pub auth: AuthConfig,
}

impl Default for WebUiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0".to_string(),
            port: 8080,
            min_update_interval_ms: 100,
            history: HistoryConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Safety section: allowlist, rate limit, safe-state outputs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetySection {
    pub write_allowlist: Vec<String>,
    pub max_writes_per_second: Option<f64>,
    pub burst: Option<u32>,
    pub safe_state: IndexMap<String, Value>,
}

/// One interlock binding row in the `interlocks` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterlockBindingConfig {
    pub source_tag: String,
    pub required_value: Value,
    #[serde(default)]
    pub message: String,
}

/// Persistence options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: "./data".to_string() }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
