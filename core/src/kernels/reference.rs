//! Float kernels for host-side validation.
//!
//! Not used by the int8 engine. They exist to check that quantized outputs
//! rank classes the same way a float model would.

use crate::error::{expect_len, NanoResult};

/// Softmax with max subtraction.
pub fn softmax_f32(input: &[f32], output: &mut [f32]) -> NanoResult<()> {
    expect_len(output.len(), input.len())?;
    let max = input.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for (o, &x) in output.iter_mut().zip(input) {
        *o = libm::expf(x - max);
        sum += *o;
    }
    if sum > 0.0 {
        for o in output.iter_mut() {
            *o /= sum;
        }
    }
    Ok(())
}

/// Row/column swap of a `rows x cols` row-major matrix.
pub fn transpose<T: Copy>(input: &[T], rows: usize, cols: usize, output: &mut [T]) -> NanoResult<()> {
    expect_len(input.len(), rows * cols)?;
    expect_len(output.len(), rows * cols)?;
    for r in 0..rows {
        for c in 0..cols {
            output[c * rows + r] = input[r * cols + c];
        }
    }
    Ok(())
}

/// `out[row] = bias[row] + sum_d in[d] * w[row][d]` with row-major weights.
pub fn dense_f32(input: &[f32], weights: &[f32], bias: &[f32], output: &mut [f32]) -> NanoResult<()> {
    let dim = input.len();
    expect_len(bias.len(), output.len())?;
    expect_len(weights.len(), output.len() * dim)?;
    for (row, o) in output.iter_mut().enumerate() {
        *o = bias[row]
            + input
                .iter()
                .zip(&weights[row * dim..(row + 1) * dim])
                .map(|(&x, &w)| x * w)
                .sum::<f32>();
    }
    Ok(())
}
