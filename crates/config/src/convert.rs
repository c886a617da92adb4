// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conversion from configuration structs into the domain model.

use crate::schema::{
    ConditionConfig, GatewayConfig, ProcedureConfig, SafetySection, ServiceConfig,
    StateHooksConfig, TagConfig, WriteActionConfig,
};
use mtpgw_core::interlock::{InterlockBinding, InterlockEvaluator};
use mtpgw_core::packml::PackMlState;
use mtpgw_core::safety::SafetyConfig;
use mtpgw_core::service::{
    ActingStateCondition, CompletionCondition, CompletionSpec, ProcedureDefinition,
    ProcedureParameter, ServiceDefinition, StateHooks, StateTimeoutSpec, WriteAction,
};
use mtpgw_core::tag::{ScaleConfig, TagDefinition};
use std::collections::HashMap;

impl TagConfig {
    pub fn to_definition(&self) -> TagDefinition {
        TagDefinition {
            name: self.name.clone(),
            connector: self.connector.clone(),
            address: self.address.clone(),
            datatype: self.datatype,
            writable: self.writable,
            scale: self.scale.map(|s| ScaleConfig { gain: s.gain, offset: s.offset }),
            unit: self.unit.clone(),
            description: self.description.clone(),
            byte_order: self.byte_order,
            word_order: self.word_order,
        }
    }
}

impl ConditionConfig {
    pub fn to_condition(&self) -> CompletionCondition {
        CompletionCondition {
            tag: self.tag.clone(),
            op: self.op,
            reference: self.reference.clone(),
        }
    }
}

fn actions(configs: &[WriteActionConfig]) -> Vec<WriteAction> {
    configs
        .iter()
        .map(|a| WriteAction { tag: a.tag.clone(), value: a.value.clone() })
        .collect()
}

impl StateHooksConfig {
    pub fn to_hooks(&self) -> StateHooks {
        let mut map = HashMap::new();
        let entries = [
            (PackMlState::Starting, &self.on_starting),
            (PackMlState::Execute, &self.on_execute),
            (PackMlState::Completing, &self.on_completing),
            (PackMlState::Completed, &self.on_completed),
            (PackMlState::Stopping, &self.on_stopping),
            (PackMlState::Stopped, &self.on_stopped),
            (PackMlState::Aborting, &self.on_aborting),
            (PackMlState::Aborted, &self.on_aborted),
            (PackMlState::Holding, &self.on_holding),
            (PackMlState::Held, &self.on_held),
            (PackMlState::Unholding, &self.on_unholding),
            (PackMlState::Resetting, &self.on_resetting),
        ];
        for (state, configs) in entries {
            if !configs.is_empty() {
                map.insert(state, actions(configs));
            }
        }
        StateHooks::new(map)
    }
}

fn parameters(configs: &[crate::schema::ParameterConfig]) -> Vec<ProcedureParameter> {
    configs
        .iter()
        .map(|p| ProcedureParameter {
            name: p.name.clone(),
            data_assembly: p.data_assembly.clone(),
            required: p.required,
        })
        .collect()
}

impl ProcedureConfig {
    pub fn to_definition(&self) -> ProcedureDefinition {
        ProcedureDefinition {
            id: self.id,
            name: self.name.clone(),
            is_default: self.is_default,
            parameters: parameters(&self.parameters),
        }
    }
}

impl ServiceConfig {
    pub fn to_definition(&self) -> ServiceDefinition {
        let completion = CompletionSpec {
            self_completing: self.completion.self_completing,
            condition: self.completion.condition.as_ref().map(|c| c.to_condition()),
            timeout_s: self.completion.timeout_s,
        };

        let timeouts = StateTimeoutSpec {
            auto_complete_acting_states: self.timeouts.auto_complete_acting_states,
            timeouts: self
                .timeouts
                .timeouts
                .iter()
                .filter_map(|(name, secs)| PackMlState::from_name(name).map(|s| (s, *secs)))
                .collect(),
            on_timeout: self.timeouts.on_timeout,
        };

        let acting_state_conditions = self
            .acting_state_conditions
            .iter()
            .filter_map(|(name, cond)| {
                PackMlState::from_name(name).map(|state| ActingStateCondition {
                    state,
                    condition: cond.to_condition(),
                })
            })
            .collect();

        ServiceDefinition {
            name: self.name.clone(),
            mode: self.mode,
            procedures: self.procedures.iter().map(|p| p.to_definition()).collect(),
            parameters: parameters(&self.parameters),
            state_hooks: self.state_hooks.to_hooks(),
            completion,
            timeouts,
            acting_state_conditions,
            state_cur_tag: self.state_cur_tag.clone(),
            command_op_tag: self.command_op_tag.clone(),
        }
    }
}

impl SafetySection {
    pub fn to_safety_config(&self) -> SafetyConfig {
        SafetyConfig {
            write_allowlist: self.write_allowlist.iter().cloned().collect(),
            max_writes_per_second: self.max_writes_per_second,
            burst: self.burst.unwrap_or(5),
            safe_state: self
                .safe_state
                .iter()
                .map(|(tag, value)| (tag.clone(), value.clone()))
                .collect(),
        }
    }
}

impl GatewayConfig {
    /// Build the interlock evaluator from the `interlocks` section.
    pub fn interlock_evaluator(&self) -> InterlockEvaluator {
        let bindings = self
            .interlocks
            .iter()
            .map(|(service, rows)| {
                let converted = rows
                    .iter()
                    .map(|row| InterlockBinding {
                        source_tag: row.source_tag.clone(),
                        required_value: row.required_value.clone(),
                        message: if row.message.is_empty() {
                            format!("{service} interlock active")
                        } else {
                            row.message.clone()
                        },
                    })
                    .collect();
                (service.clone(), converted)
            })
            .collect();
        InterlockEvaluator::new(bindings)
    }

    /// All tag definitions in document order.
    pub fn tag_definitions(&self) -> Vec<TagDefinition> {
        self.tags.iter().map(|t| t.to_definition()).collect()
    }

    /// All service definitions in document order.
    pub fn service_definitions(&self) -> Vec<ServiceDefinition> {
        self.services.iter().map(|s| s.to_definition()).collect()
    }
}

#[cfg(test)]
#[path = "convert_tests.rs"]
mod tests;
