// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use mtpgw_addr::parse_eip_address;

#[test]
fn symbolic_path_even_length_name() {
    let address = parse_eip_address("Tank").unwrap();
    let path = encode_path(&address);
    assert_eq!(path, vec![0x91, 4, b'T', b'a', b'n', b'k']);
}

#[test]
fn symbolic_path_odd_length_padded() {
    let address = parse_eip_address("Pump1").unwrap();
    let path = encode_path(&address);
    assert_eq!(path, vec![0x91, 5, b'P', b'u', b'm', b'p', b'1', 0x00]);
}

#[test]
fn dotted_members_and_small_index() {
    let address = parse_eip_address("Line[2].Speed").unwrap();
    let path = encode_path(&address);
    let expected = vec![
        0x91, 4, b'L', b'i', b'n', b'e', // Line
        0x28, 2, // element 2
        0x91, 5, b'S', b'p', b'e', b'e', b'd', 0x00, // Speed (padded)
    ];
    assert_eq!(path, expected);
}

#[test]
fn large_index_uses_16_bit_segment() {
    let address = parse_eip_address("Big[300]").unwrap();
    let path = encode_path(&address);
    assert_eq!(&path[6..], &[0x29, 0x00, 0x2C, 0x01]);
}

#[test]
fn program_scope_is_own_segment() {
    let address = parse_eip_address("Program:Main.Tag1").unwrap();
    let path = encode_path(&address);
    // "Program:Main" is 12 bytes, even, then Tag1
    assert_eq!(path[0], 0x91);
    assert_eq!(path[1], 12);
    assert_eq!(&path[2..14], b"Program:Main");
    assert_eq!(path[14], 0x91);
    assert_eq!(path[15], 4);
}

#[test]
fn read_request_shape() {
    let address = parse_eip_address("Tank").unwrap();
    let cip = build_read_request(&address);
    assert_eq!(cip[0], SVC_READ_TAG);
    assert_eq!(cip[1], 3); // path words: 6 bytes / 2
    assert_eq!(&cip[cip.len() - 2..], &[1, 0]); // element count 1 LE
}

#[test]
fn write_request_embeds_type_and_data() {
    let address = parse_eip_address("Speed").unwrap();
    let cip = build_write_request(&address, &Value::Float(1.5), DataType::Float32).unwrap();
    assert_eq!(cip[0], SVC_WRITE_TAG);
    let tail = &cip[cip.len() - 8..];
    assert_eq!(&tail[..2], &CIP_REAL.to_le_bytes());
    assert_eq!(&tail[2..4], &[1, 0]);
    assert_eq!(&tail[4..], &1.5f32.to_le_bytes());
}

#[yare::parameterized(
    bool_v  = { &[0xC1, 0x00, 0x01], Value::Bool(true) },
    int_v   = { &[0xC3, 0x00, 0xFE, 0xFF], Value::Int(-2) },
    dint_v  = { &[0xC4, 0x00, 0x01, 0x00, 0x00, 0x00], Value::Int(1) },
    real_v  = { &[0xCA, 0x00, 0x00, 0x00, 0x20, 0x41], Value::Float(10.0) },
)]
fn typed_value_decode(payload: &[u8], expected: Value) {
    assert_eq!(decode_typed_value(payload).unwrap(), expected);
}

#[test]
fn unknown_type_rejected() {
    assert!(decode_typed_value(&[0xA0, 0x02, 0x00]).is_err());
}

#[test]
fn reply_status_checked() {
    // service reply, reserved, status 0x05 (path unknown), no extra words
    assert!(parse_reply(&[0xCC, 0x00, 0x05, 0x00]).is_err());
    let ok = parse_reply(&[0xCC, 0x00, 0x00, 0x00, 0xC3, 0x00, 0x07, 0x00]).unwrap();
    assert_eq!(decode_typed_value(ok).unwrap(), Value::Int(7));
}

#[test]
fn multi_service_roundtrip_shape() {
    let a = parse_eip_address("A").unwrap();
    let b = parse_eip_address("B").unwrap();
    let requests = vec![build_read_request(&a), build_read_request(&b)];
    let multi = build_multi_service(&requests);

    assert_eq!(multi[0], SVC_MULTI);
    // count at start of data section
    assert_eq!(&multi[6..8], &[2, 0]);
    // first offset points past count + two offsets
    assert_eq!(&multi[8..10], &[6, 0]);
}

#[test]
fn split_multi_reply_extracts_embedded() {
    // Embedded replies: INT 7 and a failed read
    let r1: &[u8] = &[0xCC, 0x00, 0x00, 0x00, 0xC3, 0x00, 0x07, 0x00];
    let r2: &[u8] = &[0xCC, 0x00, 0x05, 0x00];
    let mut payload = Vec::new();
    payload.extend_from_slice(&2u16.to_le_bytes());
    let base = 2 + 4;
    payload.extend_from_slice(&(base as u16).to_le_bytes());
    payload.extend_from_slice(&((base + r1.len()) as u16).to_le_bytes());
    payload.extend_from_slice(r1);
    payload.extend_from_slice(r2);

    // Wrap in a successful outer reply
    let mut outer = vec![0x8A, 0x00, 0x00, 0x00];
    outer.extend_from_slice(&payload);

    let replies = split_multi_reply(&outer).unwrap();
    assert_eq!(replies.len(), 2);
    assert!(parse_reply(replies[0]).is_ok());
    assert!(parse_reply(replies[1]).is_err());
}

#[test]
fn encap_frame_header() {
    let frame = encap_frame(ENCAP_SEND_RR_DATA, 0xAABBCCDD, &[1, 2, 3]);
    assert_eq!(frame.len(), 27);
    assert_eq!(&frame[..2], &ENCAP_SEND_RR_DATA.to_le_bytes());
    assert_eq!(&frame[2..4], &[3, 0]);
    assert_eq!(&frame[4..8], &0xAABBCCDDu32.to_le_bytes());
}

#[test]
fn parse_session_id_from_reply() {
    let mut frame = encap_frame(ENCAP_REGISTER_SESSION, 0x1234, &register_session_data());
    assert_eq!(parse_session_id(&frame).unwrap(), 0x1234);

    // Non-zero status refused
    frame[8] = 1;
    assert!(parse_session_id(&frame).is_err());
}

#[test]
fn parse_encap_response_finds_data_item() {
    let cip = [0xCC, 0x00, 0x00, 0x00, 0xC1, 0x00, 0x01];
    let frame = encap_frame(ENCAP_SEND_RR_DATA, 1, &send_rr_data(&cip));
    let extracted = parse_encap_response(&frame).unwrap();
    assert_eq!(extracted, &cip);
}
