// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn expanded_form() {
    let strategy = NodeIdStrategy::new("urn:demo:pea1");
    assert_eq!(
        strategy.expanded("PEA_Demo.Services.Mix.StateCur"),
        "nsu=urn:demo:pea1;s=PEA_Demo.Services.Mix.StateCur"
    );
}

#[test]
fn indexed_form() {
    let strategy = NodeIdStrategy::new("urn:demo:pea1");
    assert_eq!(strategy.indexed("PEA_Demo.Tags.temp"), "ns=1;s=PEA_Demo.Tags.temp");
}

#[test]
fn join_parts() {
    assert_eq!(NodeIdStrategy::join(&["PEA_X", "Tags", "t1"]), "PEA_X.Tags.t1");
}
