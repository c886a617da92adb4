// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interlock evaluation for service commands.
//!
//! Bindings are resolved by tag name, never by reference: the caller hands
//! the evaluator a snapshot of current source-tag values at decision time.

use crate::tag::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single interlock binding: the source tag must hold the required value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterlockBinding {
    pub source_tag: String,
    pub required_value: Value,
    pub message: String,
}

/// Result of an interlock check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterlockResult {
    pub interlocked: bool,
    pub reason: Option<String>,
}

impl InterlockResult {
    pub fn clear() -> Self {
        Self { interlocked: false, reason: None }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self { interlocked: true, reason: Some(reason.into()) }
    }
}

/// Evaluates per-service interlock bindings against a value snapshot.
#[derive(Debug, Clone, Default)]
pub struct InterlockEvaluator {
    bindings: HashMap<String, Vec<InterlockBinding>>,
}

impl InterlockEvaluator {
    pub fn new(bindings: HashMap<String, Vec<InterlockBinding>>) -> Self {
        Self { bindings }
    }

    /// All source tags referenced by any binding. The caller snapshots
    /// these before asking for a decision.
    pub fn source_tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self
            .bindings
            .values()
            .flatten()
            .map(|b| b.source_tag.as_str())
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }

    pub fn bindings_for(&self, service: &str) -> &[InterlockBinding] {
        self.bindings.get(service).map(Vec::as_slice).unwrap_or(&[])
    }

    /// A service is interlocked when any binding's source value does not
    /// equal its required value. A source tag missing from the snapshot
    /// counts as interlocked.
    pub fn check_service_interlocks(
        &self,
        service: &str,
        snapshot: &HashMap<String, Value>,
    ) -> InterlockResult {
        for binding in self.bindings_for(service) {
            match snapshot.get(&binding.source_tag) {
                Some(value) if *value == binding.required_value => {}
                Some(_) => return InterlockResult::blocked(binding.message.clone()),
                None => {
                    return InterlockResult::blocked(format!(
                        "{} (no value for interlock source '{}')",
                        binding.message, binding.source_tag
                    ))
                }
            }
        }
        InterlockResult::clear()
    }
}

#[cfg(test)]
#[path = "interlock_tests.rs"]
mod tests;
