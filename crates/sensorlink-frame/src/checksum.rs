//! CRC-8 used by the envelope header.
//!
//! Reflected CRC over GF(2) with polynomial `0x8C` (0x31 bit-reversed) and a
//! non-zero seed. The host-side verifier computes the identical value, so the
//! constants are part of the wire format.

/// Initial value of the running checksum.
pub const SEED: u8 = 0x15;

/// Reflected polynomial applied on every shifted-out 1 bit.
pub const POLYNOMIAL: u8 = 0x8C;

/// Compute the envelope checksum of `bytes`.
///
/// Empty input yields [`SEED`].
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(SEED, |crc, &byte| {
        let mut value = crc ^ byte;
        for _ in 0..8 {
            let lsb = value & 0x01;
            value >>= 1;
            if lsb != 0 {
                value ^= POLYNOMIAL;
            }
        }
        value
    })
}
