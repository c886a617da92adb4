// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-service PackML state machine.
//!
//! Transitions are serialized by a per-instance async lock. Within one
//! transition the order is fixed: all on-exit hooks for the old state, the
//! state update, then all on-enter hooks for the new state. A failing hook
//! aborts the remaining hooks of that batch but never undoes the state
//! change.

use futures_util::future::BoxFuture;
use mtpgw_core::packml::{
    acting_target, command_transition, PackMlCommand, PackMlState, TransitionResult,
};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// An async hook fired on state entry or exit. An `Err` aborts the
/// remaining hooks of the same batch.
pub type StateHook =
    Arc<dyn Fn(PackMlState) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// PackML state machine instance for one service.
pub struct PackMlMachine {
    name: String,
    state: RwLock<PackMlState>,
    on_enter: HashMap<PackMlState, Vec<StateHook>>,
    on_exit: HashMap<PackMlState, Vec<StateHook>>,
    transition_lock: tokio::sync::Mutex<()>,
}

impl PackMlMachine {
    pub fn new(name: impl Into<String>, initial_state: PackMlState) -> Self {
        Self {
            name: name.into(),
            state: RwLock::new(initial_state),
            on_enter: HashMap::new(),
            on_exit: HashMap::new(),
            transition_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn current_state(&self) -> PackMlState {
        *self.state.read()
    }

    /// Register an on-enter hook. Hooks are registered before the machine
    /// starts processing commands and run in registration order.
    pub fn on_enter(&mut self, state: PackMlState, hook: StateHook) {
        self.on_enter.entry(state).or_default().push(hook);
    }

    /// Register an on-exit hook.
    pub fn on_exit(&mut self, state: PackMlState, hook: StateHook) {
        self.on_exit.entry(state).or_default().push(hook);
    }

    pub fn can_accept_command(&self, command: PackMlCommand) -> bool {
        command_transition(self.current_state(), command).is_some()
    }

    /// Send a command. Serialized with all other transitions on this
    /// instance.
    pub async fn send_command(&self, command: PackMlCommand) -> TransitionResult {
        let _guard = self.transition_lock.lock().await;
        let from_state = self.current_state();

        let Some(to_state) = command_transition(from_state, command) else {
            return TransitionResult::rejected(
                from_state,
                format!("command {command} not valid in state {from_state}"),
            );
        };

        self.run_transition(from_state, to_state).await;
        TransitionResult::ok(from_state, to_state)
    }

    /// Complete the current acting state to its stable target.
    pub async fn complete_acting_state(&self) -> TransitionResult {
        let _guard = self.transition_lock.lock().await;
        let from_state = self.current_state();

        let Some(to_state) = acting_target(from_state) else {
            return TransitionResult::rejected(
                from_state,
                format!("state {from_state} is not an acting state"),
            );
        };

        self.run_transition(from_state, to_state).await;
        TransitionResult::ok(from_state, to_state)
    }

    /// Adopt an externally-reported state (thin/hybrid PLC sync).
    ///
    /// Bypasses the transition table and fires no hooks; the PLC already
    /// performed whatever the state change implies. Returns the `(from,
    /// to)` pair so the caller can notify subscribers.
    pub async fn adopt_state(&self, new_state: PackMlState) -> (PackMlState, PackMlState) {
        let _guard = self.transition_lock.lock().await;
        let from_state = self.current_state();
        *self.state.write() = new_state;
        (from_state, new_state)
    }

    async fn run_transition(&self, from_state: PackMlState, to_state: PackMlState) {
        self.fire(&self.on_exit, from_state, "exit").await;
        *self.state.write() = to_state;
        self.fire(&self.on_enter, to_state, "enter").await;
    }

    async fn fire(
        &self,
        hooks: &HashMap<PackMlState, Vec<StateHook>>,
        state: PackMlState,
        phase: &str,
    ) {
        let Some(hooks) = hooks.get(&state) else {
            return;
        };
        for hook in hooks {
            if let Err(error) = hook(state).await {
                tracing::warn!(
                    machine = %self.name,
                    state = %state,
                    phase,
                    %error,
                    "state hook failed, skipping remaining hooks"
                );
                break;
            }
        }
    }
}

#[cfg(test)]
#[path = "packml_tests.rs"]
mod tests;
