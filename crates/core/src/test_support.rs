// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Proptest strategies shared by this crate's tests and by downstream
//! crates that enable the `test-support` feature.

pub mod strategies {
    use crate::packml::{PackMlCommand, PackMlState};
    use crate::tag::{Quality, Value};
    use proptest::prelude::*;

    pub fn arb_quality() -> impl Strategy<Value = Quality> {
        prop_oneof![
            Just(Quality::Good),
            Just(Quality::GoodLocalOverride),
            Just(Quality::Uncertain),
            Just(Quality::UncertainNoCommLastUsable),
            Just(Quality::UncertainSensorNotAccurate),
            Just(Quality::UncertainLastUsableValue),
            Just(Quality::Bad),
            Just(Quality::BadNoCommunication),
            Just(Quality::BadSensorFailure),
            Just(Quality::BadNotConnected),
            Just(Quality::BadDeviceFailure),
            Just(Quality::BadConfigError),
            Just(Quality::BadOutOfService),
        ]
    }

    pub fn arb_state() -> impl Strategy<Value = PackMlState> {
        (0u32..=17).prop_filter_map("state value", PackMlState::from_value)
    }

    pub fn arb_command() -> impl Strategy<Value = PackMlCommand> {
        (1u32..=10).prop_filter_map("command value", PackMlCommand::from_value)
    }

    pub fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i32>().prop_map(|v| Value::Int(v.into())),
            (-1.0e9f64..1.0e9).prop_map(Value::Float),
            "[a-z]{0,8}".prop_map(Value::Text),
        ]
    }
}
