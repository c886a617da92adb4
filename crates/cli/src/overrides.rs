// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--override dotted.path=value` handling for the `run` command.
//!
//! Overrides are applied to the parsed YAML document before it is
//! deserialized, so any scalar field can be overridden. Values parse as
//! YAML scalars (`8081` is a number, `true` a bool, the rest strings).

use anyhow::{bail, Context};
use serde_yaml::Value;

/// Apply `key=value` overrides to a YAML document.
pub fn apply(document: &mut Value, overrides: &[String]) -> anyhow::Result<()> {
    for entry in overrides {
        let Some((path, raw)) = entry.split_once('=') else {
            bail!("override '{entry}' is not KEY=VALUE");
        };
        let value: Value = serde_yaml::from_str(raw)
            .with_context(|| format!("invalid override value '{raw}'"))?;
        set_path(document, path, value)
            .with_context(|| format!("cannot apply override '{path}'"))?;
    }
    Ok(())
}

fn set_path(document: &mut Value, path: &str, value: Value) -> anyhow::Result<()> {
    let mut current = document;
    let parts: Vec<&str> = path.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        let last = i == parts.len() - 1;
        match current {
            Value::Mapping(map) => {
                let key = Value::String((*part).to_string());
                if last {
                    map.insert(key, value);
                    return Ok(());
                }
                current = map
                    .entry(key)
                    .or_insert_with(|| Value::Mapping(Default::default()));
            }
            Value::Sequence(seq) => {
                let index: usize = part
                    .parse()
                    .with_context(|| format!("'{part}' is not a sequence index"))?;
                let slot = seq
                    .get_mut(index)
                    .with_context(|| format!("index {index} out of bounds"))?;
                if last {
                    *slot = value;
                    return Ok(());
                }
                current = slot;
            }
            other => bail!("'{part}' does not address into {other:?}"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "overrides_tests.rs"]
mod tests;
