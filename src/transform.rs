//! Keyed byte transforms
//!
//! The decoder only relies on [`ByteTransform`]: a deterministic, reversible,
//! integer-keyed function over bytes. The two implementations here are the
//! reference pair used by [`crate::decoder::decode_payload`]; both draw from
//! the same 23-bit linear congruential keystream.

use crate::error::TransformError;

/// Printable ASCII range rotated by [`CharSubstitution`]
const PRINTABLE_START: u8 = 0x20;
const PRINTABLE_LEN: u32 = 95;

/// De-obfuscating transform applied to the sensor body
pub trait ByteTransform {
    /// Undo the keyed obfuscation of `input`
    fn transform(&self, input: &[u8], key: u32) -> Result<Vec<u8>, TransformError>;
}

impl<T: ByteTransform + ?Sized> ByteTransform for &T {
    fn transform(&self, input: &[u8], key: u32) -> Result<Vec<u8>, TransformError> {
        (**self).transform(input, key)
    }
}

struct Keystream(u32);

impl Keystream {
    fn next(&mut self) -> u32 {
        let out = (self.0 >> 8) & 0xFFFF;
        self.0 = self.0.wrapping_mul(65793).wrapping_add(4282663) & 8388607;
        out
    }
}

/// Position-keyed rotation of printable ASCII characters.
///
/// Control characters pass through unchanged but still consume keystream;
/// bytes above 0x7F are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharSubstitution;

impl CharSubstitution {
    const NAME: &'static str = "char substitution";

    /// Forward direction, the inverse of [`ByteTransform::transform`]
    pub fn obfuscate(&self, input: &[u8], key: u32) -> Result<Vec<u8>, TransformError> {
        Self::rotate(input, key, |index, shift| (index + shift) % PRINTABLE_LEN)
    }

    fn rotate(
        input: &[u8],
        key: u32,
        step: impl Fn(u32, u32) -> u32,
    ) -> Result<Vec<u8>, TransformError> {
        let mut keystream = Keystream(key);
        let mut out = Vec::with_capacity(input.len());

        for (offset, &byte) in input.iter().enumerate() {
            let shift = keystream.next() % PRINTABLE_LEN;
            if !byte.is_ascii() {
                return Err(TransformError {
                    transform: Self::NAME,
                    key,
                    reason: format!("non-ASCII byte 0x{:02x} at offset {}", byte, offset),
                });
            }
            if byte < PRINTABLE_START || byte == 0x7F {
                out.push(byte);
                continue;
            }
            let index = u32::from(byte - PRINTABLE_START);
            // step() is always below PRINTABLE_LEN, so the cast cannot truncate
            out.push(step(index, shift) as u8 + PRINTABLE_START);
        }

        Ok(out)
    }
}

impl ByteTransform for CharSubstitution {
    fn transform(&self, input: &[u8], key: u32) -> Result<Vec<u8>, TransformError> {
        Self::rotate(input, key, |index, shift| {
            (index + PRINTABLE_LEN - shift) % PRINTABLE_LEN
        })
    }
}

/// Keyed swap permutation of the `,`-separated elements of the input
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldShuffle;

impl FieldShuffle {
    /// Forward direction, the inverse of [`ByteTransform::transform`]
    pub fn obfuscate(&self, input: &[u8], key: u32) -> Vec<u8> {
        let mut elements: Vec<&[u8]> = input.split(|&b| b == b',').collect();
        for (a, b) in Self::swaps(elements.len(), key) {
            elements.swap(a, b);
        }
        elements.join(&b","[..])
    }

    fn swaps(len: usize, key: u32) -> Vec<(usize, usize)> {
        let mut keystream = Keystream(key);
        (0..len)
            .map(|_| {
                let a = keystream.next() as usize % len;
                let b = keystream.next() as usize % len;
                (a, b)
            })
            .collect()
    }
}

impl ByteTransform for FieldShuffle {
    fn transform(&self, input: &[u8], key: u32) -> Result<Vec<u8>, TransformError> {
        let mut elements: Vec<&[u8]> = input.split(|&b| b == b',').collect();
        for (a, b) in Self::swaps(elements.len(), key).into_iter().rev() {
            elements.swap(a, b);
        }
        Ok(elements.join(&b","[..]))
    }
}
