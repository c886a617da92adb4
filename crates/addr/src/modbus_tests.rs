// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[yare::parameterized(
    first_coil      = { "1", RegisterType::Coil, 0 },
    coil            = { "50", RegisterType::Coil, 49 },
    last_coil       = { "9999", RegisterType::Coil, 9998 },
    first_discrete  = { "10001", RegisterType::DiscreteInput, 0 },
    discrete        = { "10010", RegisterType::DiscreteInput, 9 },
    first_input     = { "30001", RegisterType::InputRegister, 0 },
    input           = { "30500", RegisterType::InputRegister, 499 },
    first_holding   = { "40001", RegisterType::HoldingRegister, 0 },
    holding         = { "40100", RegisterType::HoldingRegister, 99 },
    last_holding    = { "49999", RegisterType::HoldingRegister, 9998 },
)]
fn five_digit_ranges(addr: &str, register_type: RegisterType, offset: u16) {
    let parsed = parse_modbus_address(addr).unwrap();
    assert_eq!(parsed.register_type, register_type);
    assert_eq!(parsed.address, offset);
    assert_eq!(parsed.bit_offset, None);
}

#[yare::parameterized(
    ext_coil_first    = { "000001", RegisterType::Coil, 0 },
    ext_coil_last     = { "065536", RegisterType::Coil, 65535 },
    ext_discrete      = { "100001", RegisterType::DiscreteInput, 0 },
    ext_input         = { "300001", RegisterType::InputRegister, 0 },
    ext_holding       = { "400001", RegisterType::HoldingRegister, 0 },
    ext_holding_last  = { "465536", RegisterType::HoldingRegister, 65535 },
)]
fn six_digit_extended_ranges(addr: &str, register_type: RegisterType, offset: u16) {
    let parsed = parse_modbus_address(addr).unwrap();
    assert_eq!(parsed.register_type, register_type);
    assert_eq!(parsed.address, offset);
}

#[yare::parameterized(
    hr = { "HR100", RegisterType::HoldingRegister, 100 },
    ir = { "IR200", RegisterType::InputRegister, 200 },
    di = { "DI10", RegisterType::DiscreteInput, 10 },
    c  = { "C50", RegisterType::Coil, 50 },
    lower = { "hr100", RegisterType::HoldingRegister, 100 },
)]
fn named_prefixes(addr: &str, register_type: RegisterType, offset: u16) {
    let parsed = parse_modbus_address(addr).unwrap();
    assert_eq!(parsed.register_type, register_type);
    assert_eq!(parsed.address, offset);
}

// Classic data-model boundary: 9999 is a coil, 10000 is nothing,
// 10001 is a discrete input.
#[test]
fn classic_range_boundaries() {
    assert_eq!(parse_modbus_address("9999").unwrap().register_type, RegisterType::Coil);
    assert_eq!(
        parse_modbus_address("10000").unwrap_err(),
        ModbusAddrError::OutOfRange(10000)
    );
    assert_eq!(
        parse_modbus_address("10001").unwrap().register_type,
        RegisterType::DiscreteInput
    );
}

#[test]
fn bit_access() {
    let parsed = parse_modbus_address("40001.2").unwrap();
    assert_eq!(parsed.register_type, RegisterType::HoldingRegister);
    assert_eq!(parsed.address, 0);
    assert_eq!(parsed.bit_offset, Some(2));

    assert_eq!(parse_modbus_address("40001.15").unwrap().bit_offset, Some(15));
    assert_eq!(
        parse_modbus_address("40001.16").unwrap_err(),
        ModbusAddrError::BitOutOfRange(16)
    );
}

#[test]
fn bit_access_rejected_on_coils() {
    assert!(matches!(
        parse_modbus_address("50.3").unwrap_err(),
        ModbusAddrError::BitOnBoolean(RegisterType::Coil)
    ));
}

#[test]
fn unit_prefix() {
    let parsed = parse_modbus_address("2:40001").unwrap();
    assert_eq!(parsed.unit, Some(2));
    assert_eq!(parsed.register_type, RegisterType::HoldingRegister);

    let full = parse_modbus_address("7:HR10.4").unwrap();
    assert_eq!(full.unit, Some(7));
    assert_eq!(full.address, 10);
    assert_eq!(full.bit_offset, Some(4));

    assert!(matches!(
        parse_modbus_address("x:40001").unwrap_err(),
        ModbusAddrError::InvalidUnit(_)
    ));
}

#[yare::parameterized(
    empty    = { "" },
    garbage  = { "pump" },
    zero     = { "0" },
    too_big  = { "465537" },
    in_gap   = { "20000" },
    ext_gap  = { "200000" },
)]
fn invalid_addresses(addr: &str) {
    assert!(parse_modbus_address(addr).is_err());
}

#[test]
fn writable_register_types() {
    assert!(RegisterType::Coil.writable());
    assert!(RegisterType::HoldingRegister.writable());
    assert!(!RegisterType::DiscreteInput.writable());
    assert!(!RegisterType::InputRegister.writable());
}

#[test]
fn normalized_form() {
    assert_eq!(parse_modbus_address("40001").unwrap().to_string(), "HR0");
    assert_eq!(parse_modbus_address("3:30011.7").unwrap().to_string(), "3:IR10.7");
}

proptest! {
    // parse → format → parse is the identity on the structured form
    #[test]
    fn roundtrip_numeric(addr in 1u32..=9999) {
        let parsed = parse_modbus_address(&addr.to_string()).unwrap();
        let reparsed = parse_modbus_address(&parsed.to_string()).unwrap();
        prop_assert_eq!(parsed, reparsed);
    }

    #[test]
    fn roundtrip_holding_with_bit(offset in 0u16..=9998, bit in 0u8..=15, unit in 0u8..=31) {
        let addr = format!("{unit}:HR{offset}.{bit}");
        let parsed = parse_modbus_address(&addr).unwrap();
        let reparsed = parse_modbus_address(&parsed.to_string()).unwrap();
        prop_assert_eq!(parsed, reparsed);
    }
}
