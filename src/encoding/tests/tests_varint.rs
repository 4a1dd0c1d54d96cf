//! Tests for varint (LEB128-style) coding.

use crate::encoding::*;

#[test]
fn varint_u32_roundtrip_small() {
    let mut buf = Vec::new();
    put_varint_u32(&mut buf, 5);
    assert_eq!(buf, [5]);
    let (v, consumed) = get_varint_u32(&buf).unwrap();
    assert_eq!(v, 5);
    assert_eq!(consumed, 1);
}

#[test]
fn varint_u32_roundtrip_multi_byte() {
    let mut buf = Vec::new();
    put_varint_u32(&mut buf, 300);
    assert_eq!(buf.len(), 2);
    let (v, consumed) = get_varint_u32(&buf).unwrap();
    assert_eq!(v, 300);
    assert_eq!(consumed, 2);
}

#[test]
fn varint_u32_roundtrip_max() {
    let mut buf = Vec::new();
    put_varint_u32(&mut buf, u32::MAX);
    let (v, consumed) = get_varint_u32(&buf).unwrap();
    assert_eq!(v, u32::MAX);
    assert_eq!(consumed, buf.len());
}

#[test]
fn varint_u32_zero() {
    let mut buf = Vec::new();
    put_varint_u32(&mut buf, 0);
    assert_eq!(buf, [0]);
    let (v, consumed) = get_varint_u32(&buf).unwrap();
    assert_eq!(v, 0);
    assert_eq!(consumed, 1);
}

#[test]
fn varint_u32_truncated_is_eof() {
    let mut buf = Vec::new();
    put_varint_u32(&mut buf, 300);
    // Keep only the first (continuation) byte.
    buf.truncate(1);
    assert!(get_varint_u32(&buf).is_err());
}

#[test]
fn varint_u32_multiple_values_back_to_back() {
    let mut buf = Vec::new();
    put_varint_u32(&mut buf, 1);
    put_varint_u32(&mut buf, 128);
    put_varint_u32(&mut buf, 16384);

    let (a, n1) = get_varint_u32(&buf).unwrap();
    let (b, n2) = get_varint_u32(&buf[n1..]).unwrap();
    let (c, n3) = get_varint_u32(&buf[n1 + n2..]).unwrap();
    assert_eq!((a, b, c), (1, 128, 16384));
    assert_eq!(n1 + n2 + n3, buf.len());
}

#[test]
fn varint_u64_roundtrip_max() {
    let mut buf = Vec::new();
    put_varint_u64(&mut buf, u64::MAX);
    let (v, consumed) = get_varint_u64(&buf).unwrap();
    assert_eq!(v, u64::MAX);
    assert_eq!(consumed, buf.len());
}

#[test]
fn varint_u64_empty_buffer_is_eof() {
    assert!(get_varint_u32(&[]).is_err());
    assert!(get_varint_u64(&[]).is_err());
}
