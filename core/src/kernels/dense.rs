//! Fully-connected kernels.
//!
//! `out[row] = saturate8((bias[row] << bias_shift + round + sum_d in[d] * w[row][d]) >> output_shift)`
//!
//! Weights are row-major `[rows][dim]`. The unrolled variant walks four rows
//! and four columns per step with remainder loops for the leftovers; it reads
//! the same layout and produces bit-identical results.

use crate::error::{expect_len, NanoResult};
use crate::math::{bias_accumulator, narrow};

use super::Shifts;

fn check(input: &[i8], weights: &[i8], bias: &[i8], shifts: Shifts, output: &[i8]) -> NanoResult<()> {
    shifts.validate()?;
    expect_len(bias.len(), output.len())?;
    expect_len(weights.len(), output.len() * input.len())?;
    Ok(())
}

/// Row-by-row reference implementation.
pub fn fully_connected(
    input: &[i8],
    weights: &[i8],
    bias: &[i8],
    shifts: Shifts,
    output: &mut [i8],
) -> NanoResult<()> {
    check(input, weights, bias, shifts, output)?;
    let dim = input.len();
    for (row, out) in output.iter_mut().enumerate() {
        let mut acc = bias_accumulator(bias[row], shifts.bias_shift, shifts.output_shift);
        for (&x, &w) in input.iter().zip(&weights[row * dim..(row + 1) * dim]) {
            acc += x as i32 * w as i32;
        }
        *out = narrow(acc, shifts.output_shift);
    }
    Ok(())
}

/// Four output rows and four input columns per iteration.
pub fn fully_connected_unrolled(
    input: &[i8],
    weights: &[i8],
    bias: &[i8],
    shifts: Shifts,
    output: &mut [i8],
) -> NanoResult<()> {
    check(input, weights, bias, shifts, output)?;
    let dim = input.len();
    let rows = output.len();
    let row_blocks = rows / 4;
    let col_blocks = dim / 4;

    for rb in 0..row_blocks {
        let r0 = rb * 4;
        let mut acc = [0i32; 4];
        for (i, a) in acc.iter_mut().enumerate() {
            *a = bias_accumulator(bias[r0 + i], shifts.bias_shift, shifts.output_shift);
        }
        let w0 = &weights[r0 * dim..(r0 + 1) * dim];
        let w1 = &weights[(r0 + 1) * dim..(r0 + 2) * dim];
        let w2 = &weights[(r0 + 2) * dim..(r0 + 3) * dim];
        let w3 = &weights[(r0 + 3) * dim..(r0 + 4) * dim];

        for cb in 0..col_blocks {
            let c = cb * 4;
            let x = [input[c] as i32, input[c + 1] as i32, input[c + 2] as i32, input[c + 3] as i32];
            acc[0] += x[0] * w0[c] as i32 + x[1] * w0[c + 1] as i32 + x[2] * w0[c + 2] as i32 + x[3] * w0[c + 3] as i32;
            acc[1] += x[0] * w1[c] as i32 + x[1] * w1[c + 1] as i32 + x[2] * w1[c + 2] as i32 + x[3] * w1[c + 3] as i32;
            acc[2] += x[0] * w2[c] as i32 + x[1] * w2[c + 1] as i32 + x[2] * w2[c + 2] as i32 + x[3] * w2[c + 3] as i32;
            acc[3] += x[0] * w3[c] as i32 + x[1] * w3[c + 1] as i32 + x[2] * w3[c + 2] as i32 + x[3] * w3[c + 3] as i32;
        }
        for c in col_blocks * 4..dim {
            let x = input[c] as i32;
            acc[0] += x * w0[c] as i32;
            acc[1] += x * w1[c] as i32;
            acc[2] += x * w2[c] as i32;
            acc[3] += x * w3[c] as i32;
        }
        for (i, a) in acc.iter().enumerate() {
            output[r0 + i] = narrow(*a, shifts.output_shift);
        }
    }

    for row in row_blocks * 4..rows {
        let mut acc = bias_accumulator(bias[row], shifts.bias_shift, shifts.output_shift);
        for (&x, &w) in input.iter().zip(&weights[row * dim..(row + 1) * dim]) {
            acc += x as i32 * w as i32;
        }
        output[row] = narrow(acc, shifts.output_shift);
    }
    Ok(())
}
