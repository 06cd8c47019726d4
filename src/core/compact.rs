//! Compact difficulty ("bits") decoding
//!
//! A 4-byte compact value packs a 256-bit proof-of-work target as a
//! 1-byte base-256 exponent and a 3-byte mantissa whose top bit is a sign
//! flag. Decoding is total: every input yields some target, so callers must
//! not rely on this codec to reject malformed values.

use primitive_types::U256;

/// Mask selecting the 23 magnitude bits of the mantissa
const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Sign flag inside the mantissa
const SIGN_BIT: u32 = 0x0080_0000;

/// A decoded compact target together with the canonical-format flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactTarget {
    /// Target magnitude, truncated modulo 2^256
    pub target: U256,
    /// The sign bit was set on a non-zero mantissa
    pub negative: bool,
    /// Significant bits were shifted past 256 bits
    pub overflow: bool,
}

/// Decode compact bits into a 256-bit target
pub fn decode(bits: u32) -> U256 {
    decode_detailed(bits).target
}

/// Decode compact bits, also reporting the sign and overflow conditions
pub fn decode_detailed(bits: u32) -> CompactTarget {
    let exponent = bits >> 24;
    let mantissa = bits & MANTISSA_MASK;

    let target = if exponent <= 3 {
        U256::from(mantissa >> (8 * (3 - exponent)))
    } else {
        let shift = 8 * (exponent - 3) as usize;
        if shift >= 256 {
            U256::zero()
        } else {
            U256::from(mantissa) << shift
        }
    };

    let negative = mantissa != 0 && bits & SIGN_BIT != 0;
    let overflow = mantissa != 0
        && (exponent > 34 || (mantissa > 0xff && exponent > 33) || (mantissa > 0xffff && exponent > 32));

    CompactTarget {
        target,
        negative,
        overflow,
    }
}
