// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service and procedure domain model.
//!
//! A service encapsulates a unit operation governed by the PackML state
//! machine: procedures, state-entry hooks, completion detection, and the
//! thin-proxy tag bindings.

use crate::packml::PackMlState;
use crate::tag::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where the PackML state machine lives for a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyMode {
    /// State machine in the PLC; the gateway mirrors it.
    Thin,
    /// State machine in the gateway; hooks drive the PLC.
    Thick,
    /// Both: commands go to the PLC and are tracked locally; the PLC wins.
    Hybrid,
}

crate::simple_display! {
    ProxyMode {
        Thin => "thin",
        Thick => "thick",
        Hybrid => "hybrid",
    }
}

/// Comparison operator for completion and acting-state conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

crate::simple_display! {
    ComparisonOp {
        Eq => "==",
        Ne => "!=",
        Gt => ">",
        Ge => ">=",
        Lt => "<",
        Le => "<=",
    }
}

impl ComparisonOp {
    /// Evaluate `current OP reference`, promoting mixed int/float operands.
    /// Incomparable operands (e.g. string vs number) evaluate to false.
    pub fn evaluate(self, current: &Value, reference: &Value) -> bool {
        use std::cmp::Ordering;

        let Some(ord) = current.compare(reference) else {
            return matches!(self, ComparisonOp::Ne);
        };
        match self {
            ComparisonOp::Eq => ord == Ordering::Equal,
            ComparisonOp::Ne => ord != Ordering::Equal,
            ComparisonOp::Gt => ord == Ordering::Greater,
            ComparisonOp::Ge => ord != Ordering::Less,
            ComparisonOp::Lt => ord == Ordering::Less,
            ComparisonOp::Le => ord != Ordering::Greater,
        }
    }
}

/// A single tag write executed as part of a state hook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteAction {
    pub tag: String,
    pub value: Value,
}

/// Condition for service completion detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionCondition {
    pub tag: String,
    pub op: ComparisonOp,
    pub reference: Value,
}

impl CompletionCondition {
    pub fn evaluate(&self, current: &Value) -> bool {
        self.op.evaluate(current, &self.reference)
    }
}

/// Service completion detection configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionSpec {
    pub self_completing: bool,
    pub condition: Option<CompletionCondition>,
    pub timeout_s: Option<f64>,
}

/// Action taken when a state timeout elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    #[default]
    Abort,
    Stop,
    Hold,
}

/// Timeout configuration for service states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTimeoutSpec {
    pub auto_complete_acting_states: bool,
    pub timeouts: HashMap<PackMlState, f64>,
    pub on_timeout: TimeoutAction,
}

impl Default for StateTimeoutSpec {
    fn default() -> Self {
        Self {
            auto_complete_acting_states: true,
            timeouts: HashMap::new(),
            on_timeout: TimeoutAction::Abort,
        }
    }
}

/// Condition gating completion of a specific acting state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActingStateCondition {
    pub state: PackMlState,
    pub condition: CompletionCondition,
}

/// Ordered write actions per PackML state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateHooks(HashMap<PackMlState, Vec<WriteAction>>);

impl StateHooks {
    pub fn new(hooks: HashMap<PackMlState, Vec<WriteAction>>) -> Self {
        Self(hooks)
    }

    pub fn for_state(&self, state: PackMlState) -> &[WriteAction] {
        self.0.get(&state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// States that have at least one hook configured.
    pub fn states(&self) -> impl Iterator<Item = PackMlState> + '_ {
        self.0
            .iter()
            .filter(|(_, actions)| !actions.is_empty())
            .map(|(state, _)| *state)
    }
}

/// Parameter for a service or procedure, referencing a data assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureParameter {
    pub name: String,
    pub data_assembly: String,
    pub required: bool,
}

/// Definition of a service procedure (operational mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureDefinition {
    pub id: u32,
    pub name: String,
    pub is_default: bool,
    pub parameters: Vec<ProcedureParameter>,
}

/// Definition of an MTP service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub name: String,
    pub mode: ProxyMode,
    pub procedures: Vec<ProcedureDefinition>,
    pub parameters: Vec<ProcedureParameter>,
    pub state_hooks: StateHooks,
    pub completion: CompletionSpec,
    pub timeouts: StateTimeoutSpec,
    pub acting_state_conditions: Vec<ActingStateCondition>,
    /// Tag mirroring the PLC-reported state (thin/hybrid proxy).
    pub state_cur_tag: Option<String>,
    /// Tag receiving numeric command values (thin/hybrid proxy).
    pub command_op_tag: Option<String>,
}

impl ServiceDefinition {
    /// Procedure selected by a START without an explicit id: the default
    /// procedure, or 0 when none is marked default.
    pub fn default_procedure_id(&self) -> u32 {
        self.procedures
            .iter()
            .find(|p| p.is_default)
            .map(|p| p.id)
            .unwrap_or(0)
    }

    /// Condition holding the given acting state open, if configured.
    pub fn acting_condition(&self, state: PackMlState) -> Option<&CompletionCondition> {
        self.acting_state_conditions
            .iter()
            .find(|c| c.state == state)
            .map(|c| &c.condition)
    }
}

crate::builder! {
    pub struct ServiceDefinitionBuilder => ServiceDefinition {
        into {
            name: String = "svc",
        }
        set {
            mode: ProxyMode = ProxyMode::Thick,
            procedures: Vec<ProcedureDefinition> = Vec::new(),
            parameters: Vec<ProcedureParameter> = Vec::new(),
            state_hooks: StateHooks = StateHooks::default(),
            completion: CompletionSpec = CompletionSpec::default(),
            timeouts: StateTimeoutSpec = StateTimeoutSpec::default(),
            acting_state_conditions: Vec<ActingStateCondition> = Vec::new(),
        }
        option {
            state_cur_tag: String = None,
            command_op_tag: String = None,
        }
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
