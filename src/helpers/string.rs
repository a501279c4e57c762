//! Little-endian conversion helpers for fixed-width values inside BIFF12
//! record payloads.

/// Converts the first 8 bytes of a slice to a 64-bit floating point number.
#[inline]
pub(crate) fn to_f64(s: &[u8]) -> f64 {
    f64::from_le_bytes(s[..8].try_into().expect("f64"))
}

/// Converts the first 4 bytes of a slice to a 32-bit unsigned integer.
#[inline]
pub(crate) fn to_u32(s: &[u8]) -> u32 {
    u32::from_le_bytes(s[..4].try_into().expect("u32"))
}

/// Converts the first 4 bytes of a slice to a 32-bit signed integer.
#[inline]
pub(crate) fn to_i32(s: &[u8]) -> i32 {
    i32::from_le_bytes(s[..4].try_into().expect("i32"))
}

/// Converts the first 2 bytes of a slice to a 16-bit unsigned integer.
#[inline]
pub(crate) fn to_u16(s: &[u8]) -> u16 {
    u16::from_le_bytes(s[..2].try_into().expect("u16"))
}

/// Converts the first 4 bytes of a slice to a usize value.
#[inline]
pub(crate) fn to_usize(s: &[u8]) -> usize {
    to_u32(s).try_into().expect("usize")
}
