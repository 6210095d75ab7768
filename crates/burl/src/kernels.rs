//! Scalar mutation kernels.
//!
//! Numeric kinds flip one random bit of the little-endian representation:
//! the smallest structural step that can still reach any value in a bounded
//! number of hops. Bool negates, enum rotates to a uniformly chosen *other*
//! value, and byte strings shrink, grow toward `size_hint`, then take one
//! bit flip.

use crate::rng::EngineRng;

macro_rules! bitflip_kernel {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(value: $ty, rng: &mut EngineRng) -> $ty {
            let mut raw = value.to_le_bytes();
            rng.flip_bit(&mut raw);
            <$ty>::from_le_bytes(raw)
        }
    };
}

bitflip_kernel!(
    /// Flips one random bit of the value's representation.
    mutate_i32,
    i32
);
bitflip_kernel!(mutate_i64, i64);
bitflip_kernel!(mutate_u32, u32);
bitflip_kernel!(mutate_u64, u64);
bitflip_kernel!(mutate_f32, f32);
bitflip_kernel!(mutate_f64, f64);

/// Negates the value.
pub fn mutate_bool(value: bool) -> bool {
    !value
}

/// Returns a uniformly chosen enum index different from `index`.
///
/// Requires a domain of at least two values; one-value domains are rejected
/// at schema build time.
pub fn mutate_enum(index: u32, count: u32, rng: &mut EngineRng) -> u32 {
    debug_assert!(count >= 2, "enum mutation needs at least two values");
    debug_assert!(index < count);
    (index + 1 + rng.uniform_index(count as usize - 1) as u32) % count
}

/// Mutates a byte string.
///
/// Shrinks by random erasures, grows toward `size_hint` by random single-byte
/// insertions, then flips one bit if anything is left. Both loops continue on
/// a coin flip, so the expected edit run is short and the average length is
/// governed by `size_hint`.
pub fn mutate_str(value: &[u8], size_hint: usize, rng: &mut EngineRng) -> Vec<u8> {
    let mut result = value.to_vec();

    while !result.is_empty() && rng.coin() {
        let index = rng.uniform_index(result.len());
        result.remove(index);
    }

    while result.len() < size_hint && rng.coin() {
        let index = rng.uniform_index(result.len() + 1);
        let byte = rng.uniform_index(1 << 8) as u8;
        result.insert(index, byte);
    }

    if !result.is_empty() {
        rng.flip_bit(&mut result);
    }
    result
}
