//! Sign-magnitude integers of the patch format.
//!
//! Every integer in a patch occupies 8 bytes: a 63-bit little-endian
//! magnitude whose top bit (bit 7 of byte 7) is the sign flag. This is not
//! two's complement, so `-1` is `01 00 00 00 00 00 00 80`.
use super::error::{Error, Result};
use byteorder::{ByteOrder, LE};

/// Width of an encoded integer.
pub const INT_SIZE: usize = 8;

/// Largest magnitude that fits in 63 bits.
pub const MAX_MAGNITUDE: u64 = 0x7fff_ffff_ffff_ffff;

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;

/// Decodes integer.
///
/// A set sign bit over a zero magnitude decodes to `0`.
#[inline]
pub fn decode_int(b: &[u8; INT_SIZE]) -> i64 {
    let x = LE::read_u64(b);
    let magnitude = (x & MAX_MAGNITUDE) as i64;
    if x & SIGN_BIT == 0 {
        magnitude
    } else {
        -magnitude
    }
}

/// Encodes integer.
///
/// `i64::MIN` has no sign-magnitude form and is rejected.
#[inline]
pub fn encode_int(x: i64) -> Result<[u8; INT_SIZE]> {
    let magnitude = x.unsigned_abs();
    if magnitude > MAX_MAGNITUDE {
        return Err(Error::Overflow(format!("{} has no 63-bit magnitude", x)));
    }
    let sign = if x < 0 { SIGN_BIT } else { 0 };
    let mut b = [0; INT_SIZE];
    LE::write_u64(&mut b, magnitude | sign);
    Ok(b)
}
