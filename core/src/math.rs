//! Fixed-point primitives shared by every kernel.
//!
//! All activations are Q7 (`i8`) with `i32` accumulators. Converting an
//! accumulator back to Q7 is always "shift right, then saturate". Whether the
//! shift rounds (adds `1 << (shift - 1)` first) or truncates is a build-time
//! policy selected by the `truncate` cargo feature, and it applies to every
//! kernel uniformly.

use crate::error::{expect_len, NanoResult};

/// `true` unless the crate is built with the `truncate` feature.
pub const ROUNDING: bool = !cfg!(feature = "truncate");

/// Saturate a wide integer into the Q7 range `[-128, 127]`.
#[inline(always)]
pub fn saturate8(x: i32) -> i8 {
    x.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Saturate into an unsigned range of `bits` bits: `[0, 2^bits - 1]`.
///
/// Used for table indexing and the shift amounts of the softmax.
#[inline(always)]
pub fn saturate_unsigned(x: i32, bits: u32) -> u32 {
    if x <= 0 {
        return 0;
    }
    let max = if bits >= 31 { i32::MAX } else { (1i32 << bits) - 1 };
    x.min(max) as u32
}

/// Rounding term added before a right shift of `shift` bits.
///
/// Zero when truncating, and zero for a zero shift.
#[inline(always)]
pub const fn round_term(shift: u32) -> i32 {
    if ROUNDING && shift > 0 && shift < 32 {
        1 << (shift - 1)
    } else {
        0
    }
}

/// Right shift with the global rounding policy applied.
///
/// Computed in 64 bits so the rounding term can never overflow near `i32::MAX`.
#[inline(always)]
pub fn round_shift(value: i32, shift: u32) -> i32 {
    let shift = shift.min(63);
    let term = if ROUNDING && shift > 0 { 1i64 << (shift - 1) } else { 0 };
    ((value as i64 + term) >> shift) as i32
}

/// Narrow an accumulator to Q7: `saturate8(round_shift(v, s))`.
#[inline(always)]
pub fn requantize(value: i32, shift: u32) -> i8 {
    saturate8(round_shift(value, shift))
}

/// Initial accumulator for a biased dot product: `bias << bias_shift` plus
/// the rounding term of the output shift.
#[inline(always)]
pub fn bias_accumulator(bias: i8, bias_shift: u32, output_shift: u32) -> i32 {
    ((bias as i32) << bias_shift) + round_term(output_shift)
}

/// Narrow an accumulator whose rounding term was already folded in.
#[inline(always)]
pub fn narrow(acc: i32, output_shift: u32) -> i8 {
    saturate8(acc >> output_shift.min(31))
}

/// Smallest non-negative `s` with `127 * (1 + s) >= max(|v|)`.
///
/// This is the dynamic requantization search used by sum pooling. The bound is
/// linear in `s`, matching the fixed-point format change the caller records.
pub fn dynamic_shift(values: &[i32]) -> u32 {
    let max_abs = values
        .iter()
        .map(|v| v.unsigned_abs())
        .max()
        .unwrap_or(0) as u64;
    if max_abs <= 127 {
        return 0;
    }
    // ceil(max_abs / 127) - 1
    (max_abs.div_ceil(127) - 1) as u32
}

/// Shift every element right by the [`dynamic_shift`] of the whole array and
/// narrow to Q7. Returns the chosen shift.
pub fn requantize_dynamic(values: &[i32], output: &mut [i8]) -> NanoResult<u32> {
    expect_len(output.len(), values.len())?;
    let shift = dynamic_shift(values);
    for (o, &v) in output.iter_mut().zip(values.iter()) {
        *o = saturate8(v >> shift.min(31));
    }
    Ok(shift)
}

/// Index of the first maximum. `None` for an empty slice.
pub fn argmax_i8(data: &[i8]) -> Option<usize> {
    let mut best: Option<(usize, i8)> = None;
    for (i, &v) in data.iter().enumerate() {
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
