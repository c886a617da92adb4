// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The service manager: command routing across proxy modes, completion
//! monitoring, interlock gating, emergency stop, and crash recovery.
//!
//! | Mode   | State machine | Command handling        | Completion          |
//! |--------|---------------|-------------------------|---------------------|
//! | thin   | in PLC        | write to command_op_tag | poll state_cur_tag  |
//! | thick  | in gateway    | hooks + auto-complete   | condition / timeout |
//! | hybrid | both          | write to PLC + track    | poll + condition    |

use crate::packml::{PackMlMachine, StateHook};
use crate::tag_manager::{Safety, TagManager};
use crate::MONITOR_INTERVAL;
use chrono::{DateTime, Utc};
use mtpgw_core::audit::AuditEntry;
use mtpgw_core::interlock::InterlockEvaluator;
use mtpgw_core::packml::{PackMlCommand, PackMlState, TransitionResult};
use mtpgw_core::service::{ProxyMode, ServiceDefinition, TimeoutAction, WriteAction};
use mtpgw_core::tag::Value;
use mtpgw_storage::{AuditLog, ServiceSnapshot, SnapshotStore};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

type StateChangeCallback = Arc<dyn Fn(&str, PackMlState, PackMlState) + Send + Sync>;

/// Optional collaborators wired in at startup.
#[derive(Default)]
pub struct ServiceManagerConfig {
    pub snapshots: Option<Arc<SnapshotStore>>,
    pub audit: Option<Arc<AuditLog>>,
    pub safety: Option<Arc<Safety>>,
    pub interlocks: Option<InterlockEvaluator>,
}

/// Status row for the API surface.
#[derive(Debug, Clone)]
pub struct ServiceStatus {
    pub name: String,
    pub mode: ProxyMode,
    pub state: PackMlState,
    pub current_procedure_id: Option<u32>,
    pub execute_start_time: Option<DateTime<Utc>>,
    pub procedures: Vec<(u32, String, bool)>,
}

struct ServiceRuntime {
    definition: ServiceDefinition,
    machine: PackMlMachine,
    current_procedure_id: Mutex<Option<u32>>,
    execute_start_time: Mutex<Option<DateTime<Utc>>>,
}

struct Inner {
    tag_manager: TagManager,
    services: HashMap<String, Arc<ServiceRuntime>>,
    subscribers: RwLock<Vec<(u64, StateChangeCallback)>>,
    next_subscription: Mutex<u64>,
    snapshots: Option<Arc<SnapshotStore>>,
    audit: Option<Arc<AuditLog>>,
    safety: Option<Arc<Safety>>,
    interlocks: Option<InterlockEvaluator>,
    cancel: CancellationToken,
    monitor_tasks: Mutex<HashMap<String, JoinHandle<()>>>,
    sync_tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Shared service manager handle.
#[derive(Clone)]
pub struct ServiceManager {
    inner: Arc<Inner>,
}

impl ServiceManager {
    pub fn new(
        tag_manager: TagManager,
        definitions: Vec<ServiceDefinition>,
        config: ServiceManagerConfig,
    ) -> Self {
        let mut services = HashMap::new();
        for definition in definitions {
            let mut machine = PackMlMachine::new(definition.name.clone(), PackMlState::Idle);
            register_hooks(&mut machine, &definition, &tag_manager);
            tracing::info!(service = %definition.name, mode = %definition.mode, "service initialized");
            services.insert(
                definition.name.clone(),
                Arc::new(ServiceRuntime {
                    machine,
                    current_procedure_id: Mutex::new(None),
                    execute_start_time: Mutex::new(None),
                    definition,
                }),
            );
        }

        Self {
            inner: Arc::new(Inner {
                tag_manager,
                services,
                subscribers: RwLock::new(Vec::new()),
                next_subscription: Mutex::new(0),
                snapshots: config.snapshots,
                audit: config.audit,
                safety: config.safety,
                interlocks: config.interlocks,
                cancel: CancellationToken::new(),
                monitor_tasks: Mutex::new(HashMap::new()),
                sync_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Start PLC sync loops for thin/hybrid services.
    pub fn start(&self) {
        for runtime in self.inner.services.values() {
            if matches!(runtime.definition.mode, ProxyMode::Thin | ProxyMode::Hybrid) {
                let manager = self.clone();
                let runtime = Arc::clone(runtime);
                let cancel = self.inner.cancel.clone();
                let handle = tokio::spawn(async move {
                    manager.plc_sync_loop(runtime, cancel).await;
                });
                self.inner.sync_tasks.lock().push(handle);
            }
        }
        tracing::info!("service manager started");
    }

    /// Cancel monitors and sync loops, joining with a bounded grace period.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        let sync_tasks: Vec<_> = self.inner.sync_tasks.lock().drain(..).collect();
        let monitor_tasks: Vec<_> = {
            let mut monitors = self.inner.monitor_tasks.lock();
            monitors.drain().map(|(_, task)| task).collect()
        };
        for task in sync_tasks.into_iter().chain(monitor_tasks) {
            if tokio::time::timeout(crate::SHUTDOWN_GRACE, task).await.is_err() {
                tracing::warn!("service loop did not stop in time, aborting");
            }
        }
        self.inner.subscribers.write().clear();
        tracing::info!("service manager stopped");
    }

    /// Route a command to a service per its proxy mode.
    pub async fn send_command(
        &self,
        service_name: &str,
        command: PackMlCommand,
        procedure_id: Option<u32>,
    ) -> TransitionResult {
        let Some(runtime) = self.inner.services.get(service_name).cloned() else {
            return TransitionResult::rejected(
                PackMlState::Undefined,
                format!("service '{service_name}' not found"),
            );
        };

        // ABORT and STOP are never blocked by interlocks
        if matches!(command, PackMlCommand::Start | PackMlCommand::Unhold) {
            if let Some(evaluator) = &self.inner.interlocks {
                let snapshot = self
                    .inner
                    .tag_manager
                    .value_snapshot(&evaluator.source_tags());
                let result = evaluator.check_service_interlocks(service_name, &snapshot);
                if result.interlocked {
                    let reason = result.reason.unwrap_or_else(|| "interlock active".into());
                    tracing::warn!(
                        service = %service_name,
                        command = %command,
                        %reason,
                        "command blocked by interlock"
                    );
                    self.audit_command(service_name, command, procedure_id, &reason);
                    return TransitionResult::rejected(
                        runtime.machine.current_state(),
                        format!("interlock: {reason}"),
                    );
                }
            }
        }

        if command == PackMlCommand::Start {
            let selected = procedure_id.unwrap_or_else(|| runtime.definition.default_procedure_id());
            *runtime.current_procedure_id.lock() = Some(selected);
        }

        let result = match runtime.definition.mode {
            ProxyMode::Thick => self.send_command_thick(&runtime, command).await,
            ProxyMode::Thin => self.send_command_thin(&runtime, command).await,
            ProxyMode::Hybrid => self.send_command_hybrid(&runtime, command).await,
        };

        self.audit_command(
            service_name,
            command,
            procedure_id,
            if result.success { "accepted" } else { "rejected" },
        );
        result
    }

    async fn send_command_thick(
        &self,
        runtime: &Arc<ServiceRuntime>,
        command: PackMlCommand,
    ) -> TransitionResult {
        let result = runtime.machine.send_command(command).await;
        if result.success {
            if let Some(to_state) = result.to_state {
                self.after_transition(runtime, result.from_state, to_state).await;
            }
        }
        result
    }

    async fn send_command_thin(
        &self,
        runtime: &Arc<ServiceRuntime>,
        command: PackMlCommand,
    ) -> TransitionResult {
        let from_state = runtime.machine.current_state();
        let Some(command_tag) = &runtime.definition.command_op_tag else {
            return TransitionResult::rejected(from_state, "thin proxy service missing command_op_tag");
        };

        let written = self
            .inner
            .tag_manager
            .write_tag(command_tag, Value::Int(i64::from(command.value())))
            .await;
        if written {
            // The PLC owns the state machine; the sync loop will adopt the
            // reported state.
            TransitionResult { success: true, from_state, to_state: None, error: None }
        } else {
            TransitionResult::rejected(from_state, "failed to write command to PLC")
        }
    }

    async fn send_command_hybrid(
        &self,
        runtime: &Arc<ServiceRuntime>,
        command: PackMlCommand,
    ) -> TransitionResult {
        let thin_result = self.send_command_thin(runtime, command).await;
        if thin_result.success {
            let local = runtime.machine.send_command(command).await;
            if local.success {
                if let Some(to_state) = local.to_state {
                    self.after_transition(runtime, local.from_state, to_state).await;
                }
            }
        }
        thin_result
    }

    /// Post-transition bookkeeping for locally-driven state changes:
    /// notify, snapshot, arm monitors, chain acting-state auto-completion.
    async fn after_transition(
        &self,
        runtime: &Arc<ServiceRuntime>,
        from_state: PackMlState,
        to_state: PackMlState,
    ) {
        self.notify_subscribers(&runtime.definition.name, from_state, to_state);

        let mut current = to_state;
        loop {
            if current == PackMlState::Execute {
                *runtime.execute_start_time.lock() = Some(Utc::now());
                self.start_completion_monitor(runtime);
                break;
            }
            if !current.is_acting() {
                break;
            }
            // Park in the acting state when a condition gates it or
            // auto-completion is disabled; the acting monitor advances it.
            if runtime.definition.acting_condition(current).is_some()
                || !runtime.definition.timeouts.auto_complete_acting_states
            {
                self.start_acting_monitor(runtime, current);
                break;
            }

            let result = runtime.machine.complete_acting_state().await;
            if !result.success {
                break;
            }
            let Some(next) = result.to_state else { break };
            self.notify_subscribers(&runtime.definition.name, result.from_state, next);
            current = next;
        }
    }

    fn start_completion_monitor(&self, runtime: &Arc<ServiceRuntime>) {
        let name = runtime.definition.name.clone();
        let manager = self.clone();
        let runtime = Arc::clone(runtime);
        let cancel = self.inner.cancel.clone();

        let task = tokio::spawn(async move {
            manager.completion_monitor_loop(runtime, cancel).await;
        });
        if let Some(previous) = self.inner.monitor_tasks.lock().insert(name, task) {
            previous.abort();
        }
    }

    /// Wake every 100 ms while in EXECUTE: self-completing → COMPLETE;
    /// condition true → COMPLETE; timeout elapsed → configured action.
    async fn completion_monitor_loop(&self, runtime: Arc<ServiceRuntime>, cancel: CancellationToken) {
        let completion = runtime.definition.completion.clone();
        let name = runtime.definition.name.clone();
        let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if runtime.machine.current_state() != PackMlState::Execute {
                return;
            }

            if completion.self_completing {
                self.send_command(&name, PackMlCommand::Complete, None).await;
                return;
            }

            if let Some(condition) = &completion.condition {
                if let Some(value) = self.inner.tag_manager.get_value(&condition.tag) {
                    if condition.evaluate(&value.value) {
                        self.send_command(&name, PackMlCommand::Complete, None).await;
                        return;
                    }
                }
            }

            if let Some(timeout_s) = completion.timeout_s {
                let started = *runtime.execute_start_time.lock();
                if let Some(started) = started {
                    let elapsed = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;
                    if elapsed >= timeout_s {
                        tracing::warn!(service = %name, timeout_s, "service execution timeout");
                        let command = match runtime.definition.timeouts.on_timeout {
                            TimeoutAction::Abort => PackMlCommand::Abort,
                            TimeoutAction::Stop => PackMlCommand::Stop,
                            TimeoutAction::Hold => PackMlCommand::Hold,
                        };
                        self.send_command(&name, command, None).await;
                        return;
                    }
                }
            }
        }
    }

    /// Monitor holding an acting state open until its condition reads true
    /// (or indefinitely when auto-completion is disabled and no condition
    /// is configured — an external COMPLETE/ABORT moves it on).
    fn start_acting_monitor(&self, runtime: &Arc<ServiceRuntime>, state: PackMlState) {
        let Some(condition) = runtime.definition.acting_condition(state).cloned() else {
            return;
        };
        let manager = self.clone();
        let runtime = Arc::clone(runtime);
        let cancel = self.inner.cancel.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if runtime.machine.current_state() != state {
                    return;
                }
                let satisfied = manager
                    .inner
                    .tag_manager
                    .get_value(&condition.tag)
                    .map(|v| condition.evaluate(&v.value))
                    .unwrap_or(false);
                if satisfied {
                    let result = runtime.machine.complete_acting_state().await;
                    if result.success {
                        if let Some(to_state) = result.to_state {
                            manager
                                .after_transition(&runtime, result.from_state, to_state)
                                .await;
                        }
                    }
                    return;
                }
            }
        });
    }

    /// 100 ms loop adopting the PLC-reported state for thin/hybrid modes.
    async fn plc_sync_loop(&self, runtime: Arc<ServiceRuntime>, cancel: CancellationToken) {
        let Some(state_tag) = runtime.definition.state_cur_tag.clone() else {
            tracing::warn!(
                service = %runtime.definition.name,
                "thin/hybrid service missing state_cur_tag"
            );
            return;
        };
        let mut ticker = tokio::time::interval(MONITOR_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }
            let Some(value) = self.inner.tag_manager.get_value(&state_tag) else {
                continue;
            };
            let Some(raw) = value.value.as_i64() else { continue };
            let Some(plc_state) = u32::try_from(raw).ok().and_then(PackMlState::from_value) else {
                tracing::warn!(
                    service = %runtime.definition.name,
                    value = raw,
                    "invalid state value from PLC"
                );
                continue;
            };
            if plc_state != runtime.machine.current_state() {
                let (from_state, to_state) = runtime.machine.adopt_state(plc_state).await;
                self.notify_subscribers(&runtime.definition.name, from_state, to_state);
                if to_state == PackMlState::Execute {
                    *runtime.execute_start_time.lock() = Some(Utc::now());
                }
            }
        }
    }

    /// Force safe-state outputs, then abort every service. Idempotent.
    pub async fn emergency_stop(&self) {
        tracing::warn!("emergency stop triggered");
        if let Some(audit) = &self.inner.audit {
            let entry = AuditEntry::security(
                Utc::now(),
                "ALL_SERVICES",
                "emergency_stop",
                "ALL",
                "safe-state outputs forced, all services aborted",
            );
            if let Err(e) = audit.append(&entry) {
                tracing::warn!(error = %e, "failed to audit emergency stop");
            }
        }

        if let Some(safety) = &self.inner.safety {
            let safe_values: Vec<(String, Value)> = safety
                .safe_state_values()
                .iter()
                .map(|(tag, value)| (tag.clone(), value.clone()))
                .collect();
            for (tag, value) in safe_values {
                if !self.inner.tag_manager.write_tag(&tag, value.clone()).await {
                    tracing::error!(tag = %tag, ?value, "failed to set safe state output");
                }
            }
        }

        let names: Vec<String> = self.inner.services.keys().cloned().collect();
        for name in names {
            self.send_command(&name, PackMlCommand::Abort, None).await;
        }
        tracing::warn!("emergency stop completed");
    }

    /// Restore persisted service states after a restart, then delete the
    /// consumed snapshots.
    pub async fn recover(&self) {
        let Some(snapshots) = &self.inner.snapshots else {
            return;
        };
        for snapshot in snapshots.all() {
            let Some(runtime) = self.inner.services.get(&snapshot.service_name) else {
                tracing::warn!(service = %snapshot.service_name, "persisted state for unknown service");
                continue;
            };
            let Some(state) = PackMlState::from_name(&snapshot.state) else {
                tracing::warn!(
                    service = %snapshot.service_name,
                    state = %snapshot.state,
                    "persisted state is not a PackML state"
                );
                continue;
            };
            runtime.machine.adopt_state(state).await;
            *runtime.current_procedure_id.lock() = snapshot.procedure_id;
            tracing::info!(
                service = %snapshot.service_name,
                state = %snapshot.state,
                procedure_id = ?snapshot.procedure_id,
                "service state recovered"
            );
            if let Err(e) = snapshots.delete(&snapshot.service_name) {
                tracing::warn!(error = %e, "failed to delete consumed snapshot");
            }
        }
    }

    pub fn get_service_state(&self, name: &str) -> Option<PackMlState> {
        self.inner
            .services
            .get(name)
            .map(|runtime| runtime.machine.current_state())
    }

    pub fn get_status(&self, name: &str) -> Option<ServiceStatus> {
        self.inner.services.get(name).map(|runtime| status(runtime))
    }

    /// All services, sorted by name.
    pub fn all_statuses(&self) -> Vec<ServiceStatus> {
        let mut all: Vec<ServiceStatus> =
            self.inner.services.values().map(|r| status(r)).collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.services.keys().cloned().collect();
        names.sort();
        names
    }

    /// Subscribe to `(service, from, to)` state changes. Callbacks are
    /// synchronous and must not block.
    pub fn subscribe(&self, callback: StateChangeCallback) -> u64 {
        let mut next = self.inner.next_subscription.lock();
        *next += 1;
        let id = *next;
        self.inner.subscribers.write().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.inner.subscribers.write().retain(|(sid, _)| *sid != id);
    }

    fn notify_subscribers(&self, service: &str, from_state: PackMlState, to_state: PackMlState) {
        self.persist_state(service);
        if let Some(audit) = &self.inner.audit {
            let entry = AuditEntry::state_transition(
                Utc::now(),
                service,
                from_state.to_string(),
                to_state.to_string(),
            );
            if let Err(e) = audit.append(&entry) {
                tracing::warn!(error = %e, "failed to audit state transition");
            }
        }
        let subscribers = self.inner.subscribers.read();
        for (_, callback) in subscribers.iter() {
            callback(service, from_state, to_state);
        }
    }

    /// Fire-and-forget snapshot write on every state change.
    fn persist_state(&self, service: &str) {
        let Some(snapshots) = self.inner.snapshots.clone() else {
            return;
        };
        let Some(runtime) = self.inner.services.get(service).cloned() else {
            return;
        };
        let service = service.to_string();
        tokio::task::spawn_blocking(move || {
            let snapshot = ServiceSnapshot {
                service_name: service.clone(),
                state: runtime.machine.current_state().to_string(),
                procedure_id: *runtime.current_procedure_id.lock(),
                saved_at: Utc::now(),
            };
            if let Err(e) = snapshots.save(snapshot) {
                tracing::warn!(service = %service, error = %e, "failed to persist service state");
            }
        });
    }

    fn audit_command(
        &self,
        service: &str,
        command: PackMlCommand,
        procedure_id: Option<u32>,
        result: &str,
    ) {
        if let Some(audit) = &self.inner.audit {
            let entry = AuditEntry::command(
                Utc::now(),
                service,
                command.to_string(),
                procedure_id,
                result,
            );
            if let Err(e) = audit.append(&entry) {
                tracing::warn!(error = %e, "failed to audit command");
            }
        }
    }
}

/// Wire the definition's state hooks into the machine as on-enter hooks:
/// sequential tag writes through the tag manager.
fn register_hooks(machine: &mut PackMlMachine, definition: &ServiceDefinition, tags: &TagManager) {
    let states: Vec<PackMlState> = definition.state_hooks.states().collect();
    for state in states {
        let actions: Vec<WriteAction> = definition.state_hooks.for_state(state).to_vec();
        let tag_manager = tags.clone();
        let service = definition.name.clone();
        let hook: StateHook = Arc::new(move |entered: PackMlState| {
            let actions = actions.clone();
            let tag_manager = tag_manager.clone();
            let service = service.clone();
            Box::pin(async move {
                for action in &actions {
                    if !tag_manager.write_tag(&action.tag, action.value.clone()).await {
                        return Err(format!(
                            "hook write {}={:?} failed for {service} entering {entered}",
                            action.tag, action.value
                        ));
                    }
                }
                tracing::debug!(
                    service = %service,
                    state = %entered,
                    hook_count = actions.len(),
                    "executed state hooks"
                );
                Ok(())
            })
        });
        machine.on_enter(state, hook);
    }
}

fn status(runtime: &Arc<ServiceRuntime>) -> ServiceStatus {
    ServiceStatus {
        name: runtime.definition.name.clone(),
        mode: runtime.definition.mode,
        state: runtime.machine.current_state(),
        current_procedure_id: *runtime.current_procedure_id.lock(),
        execute_start_time: *runtime.execute_start_time.lock(),
        procedures: runtime
            .definition
            .procedures
            .iter()
            .map(|p| (p.id, p.name.clone(), p.is_default))
            .collect(),
    }
}

#[cfg(test)]
#[path = "service_manager_tests.rs"]
mod tests;
