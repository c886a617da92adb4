// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios, wired from configuration
//! documents through the engine and northbound surfaces.

mod specs {
    mod alarm_flow;
    mod manifest_contract;
    mod modbus_poll;
    mod service_flows;
}
