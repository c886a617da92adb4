// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime wiring between the address space and the managers.
//!
//! Tag changes flow into bound variables (with mapped status codes and
//! interlock 0/1 projection); service state changes flow into `StateCur`.
//! External client writes route through [`NorthboundBinding::handle_external_write`]
//! only — internal subscription writes never re-enter the command path, so
//! a StateCur update can't echo back as a command.

use crate::space::AddressSpace;
use mtpgw_core::packml::{PackMlCommand, TransitionResult};
use mtpgw_core::tag::Value;
use mtpgw_engine::{ServiceManager, SubscriptionId, TagManager};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of an external client write.
#[derive(Debug)]
pub enum ExternalWriteOutcome {
    /// A CommandOp write decoded and dispatched.
    Command(TransitionResult),
    /// A ProcedureReq write stored for the next START.
    ProcedureStored(u32),
    /// A writable tag-bound node forwarded to the tag manager.
    TagWrite(bool),
    /// The write did not map to anything actionable.
    Ignored(String),
}

/// Live wiring for one gateway instance.
pub struct NorthboundBinding {
    space: Arc<AddressSpace>,
    tag_manager: TagManager,
    service_manager: ServiceManager,
    pending_procedures: Arc<Mutex<HashMap<String, u32>>>,
    tag_subscription: Option<SubscriptionId>,
    service_subscription: Option<u64>,
}

impl NorthboundBinding {
    /// Subscribe the space to both managers.
    pub fn wire(
        space: Arc<AddressSpace>,
        tag_manager: TagManager,
        service_manager: ServiceManager,
    ) -> Self {
        let tag_space = Arc::clone(&space);
        let tag_subscription = tag_manager.subscribe(Arc::new(move |tag_name, value| {
            let status = value.quality.status_code();

            if let Some(paths) = tag_space.tag_bindings.get(tag_name) {
                for path in paths {
                    tag_space.write_internal(
                        path,
                        value.value.clone(),
                        status,
                        value.source_timestamp.or(Some(value.timestamp)),
                    );
                }
            }
            if let Some(path) = tag_space.tag_nodes.get(tag_name) {
                tag_space.write_internal(
                    path,
                    value.value.clone(),
                    status,
                    value.source_timestamp.or(Some(value.timestamp)),
                );
            }
            // Interlock projection: truthy source → 1, else 0
            if let Some(paths) = tag_space.interlock_bindings.get(tag_name) {
                let projected = Value::Int(i64::from(value.value.is_truthy()));
                for path in paths {
                    tag_space.write_internal(path, projected.clone(), status, None);
                }
            }
        }));

        let service_space = Arc::clone(&space);
        let service_subscription =
            service_manager.subscribe(Arc::new(move |service, _from, to_state| {
                if let Some(nodes) = service_space.service_nodes.get(service) {
                    service_space.write_internal(
                        &nodes.state_cur,
                        Value::Int(to_state.value().into()),
                        0,
                        None,
                    );
                }
            }));

        Self {
            space,
            tag_manager,
            service_manager,
            pending_procedures: Arc::new(Mutex::new(HashMap::new())),
            tag_subscription: Some(tag_subscription),
            service_subscription: Some(service_subscription),
        }
    }

    pub fn space(&self) -> &Arc<AddressSpace> {
        &self.space
    }

    /// Handle a write arriving from an external OPC UA client.
    pub async fn handle_external_write(&self, path: &str, value: Value) -> ExternalWriteOutcome {
        // CommandOp: decode and dispatch
        if let Some((service, nodes)) = self
            .space
            .service_nodes
            .iter()
            .find(|(_, nodes)| nodes.command_op == path)
        {
            let Some(raw) = value.as_i64() else {
                return ExternalWriteOutcome::Ignored(format!(
                    "non-numeric CommandOp write to {path}"
                ));
            };
            let Some(command) = u32::try_from(raw).ok().and_then(PackMlCommand::from_value)
            else {
                tracing::warn!(service = %service, value = raw, "invalid command value");
                return ExternalWriteOutcome::Ignored(format!("command value {raw} not in 1..=10"));
            };

            let procedure = if command == PackMlCommand::Start {
                self.pending_procedures.lock().remove(service)
            } else {
                None
            };
            let result = self
                .service_manager
                .send_command(service, command, procedure)
                .await;
            if result.success {
                self.space
                    .write_internal(path, Value::Int(raw), 0, None);
                if let Some(procedure) = procedure {
                    self.space.write_internal(
                        &nodes.procedure_cur,
                        Value::Int(procedure.into()),
                        0,
                        None,
                    );
                }
            }
            return ExternalWriteOutcome::Command(result);
        }

        // ProcedureReq: stash for the next START
        if let Some((service, _)) = self
            .space
            .service_nodes
            .iter()
            .find(|(_, nodes)| nodes.procedure_req == path)
        {
            let Some(raw) = value.as_i64().and_then(|v| u32::try_from(v).ok()) else {
                return ExternalWriteOutcome::Ignored(format!(
                    "non-numeric ProcedureReq write to {path}"
                ));
            };
            self.pending_procedures.lock().insert(service.clone(), raw);
            self.space.write_internal(path, Value::Int(raw.into()), 0, None);
            return ExternalWriteOutcome::ProcedureStored(raw);
        }

        // Writable tag-bound node: forward to the tag manager
        if let Some((tag_name, _)) = self
            .space
            .tag_nodes
            .iter()
            .find(|(_, node_path)| node_path.as_str() == path)
        {
            if !self.space.is_writable_variable(path) {
                return ExternalWriteOutcome::Ignored(format!("{path} is not writable"));
            }
            let ok = self.tag_manager.write_tag(tag_name, value).await;
            return ExternalWriteOutcome::TagWrite(ok);
        }

        ExternalWriteOutcome::Ignored(format!("no handler for {path}"))
    }

    /// Pending procedure stored for a service, if any (for inspection).
    pub fn pending_procedure(&self, service: &str) -> Option<u32> {
        self.pending_procedures.lock().get(service).copied()
    }

    /// Unsubscribe from both managers (shutdown path).
    pub fn unwire(&mut self) {
        if let Some(id) = self.tag_subscription.take() {
            self.tag_manager.unsubscribe(id);
        }
        if let Some(id) = self.service_subscription.take() {
            self.service_manager.unsubscribe(id);
        }
    }
}

impl Drop for NorthboundBinding {
    fn drop(&mut self) {
        self.unwire();
    }
}

#[cfg(test)]
#[path = "binding_tests.rs"]
mod tests;
