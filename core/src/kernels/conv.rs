//! HWC convolution kernels.
//!
//! Weight layout for the full convolution is
//! `[out_ch][kernel_y][kernel_x][in_ch]`; for depthwise it is
//! `[kernel_y][kernel_x][ch]`. Padding taps contribute nothing.

use crate::error::{expect_len, NanoError, NanoResult};
use crate::math::{bias_accumulator, narrow};
use crate::tensor::Shape;

use super::{Shifts, Window};

/// Full convolution, all input channels into every output channel.
pub fn convolve_hwc(
    input: &[i8],
    in_shape: Shape,
    weights: &[i8],
    bias: &[i8],
    window: &Window,
    shifts: Shifts,
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<()> {
    shifts.validate()?;
    let (in_h, in_w, in_ch) = (in_shape.height(), in_shape.width(), in_shape.channels());
    let (out_h, out_w, out_ch) = (out_shape.height(), out_shape.width(), out_shape.channels());
    let (kh, kw) = (window.kernel_h, window.kernel_w);

    expect_len(input.len(), in_shape.size())?;
    expect_len(weights.len(), out_ch * kh * kw * in_ch)?;
    expect_len(bias.len(), out_ch)?;
    expect_len(output.len(), out_shape.size())?;
    window.validate()?;

    for oc in 0..out_ch {
        let filter = &weights[oc * kh * kw * in_ch..(oc + 1) * kh * kw * in_ch];
        for oy in 0..out_h {
            for ox in 0..out_w {
                let mut acc = bias_accumulator(bias[oc], shifts.bias_shift, shifts.output_shift);
                for ky in 0..kh {
                    for kx in 0..kw {
                        let Some((iy, ix)) = window.tap(oy, ox, ky, kx, in_h, in_w) else {
                            continue;
                        };
                        let pixel = &input[(iy * in_w + ix) * in_ch..(iy * in_w + ix + 1) * in_ch];
                        let taps = &filter[(ky * kw + kx) * in_ch..(ky * kw + kx + 1) * in_ch];
                        for (&x, &w) in pixel.iter().zip(taps.iter()) {
                            acc += x as i32 * w as i32;
                        }
                    }
                }
                output[(oy * out_w + ox) * out_ch + oc] = narrow(acc, shifts.output_shift);
            }
        }
    }
    Ok(())
}

/// Depthwise convolution: output channel `c` only reads input channel `c`.
///
/// Only a channel multiplier of 1 is supported, and both channel counts must
/// be even. Those constraints are checked before any buffer is read.
pub fn depthwise_conv_hwc(
    input: &[i8],
    in_shape: Shape,
    weights: &[i8],
    bias: &[i8],
    multiplier: usize,
    window: &Window,
    shifts: Shifts,
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<()> {
    if multiplier != 1 {
        return Err(NanoError::InvalidArgument("depthwise multiplier must be 1"));
    }
    if in_shape.channels() % 2 != 0 || out_shape.channels() % 2 != 0 {
        return Err(NanoError::InvalidArgument("depthwise channel counts must be even"));
    }
    shifts.validate()?;
    let (in_h, in_w, ch) = (in_shape.height(), in_shape.width(), in_shape.channels());
    let (out_h, out_w) = (out_shape.height(), out_shape.width());
    let (kh, kw) = (window.kernel_h, window.kernel_w);

    expect_len(out_shape.channels(), ch)?;
    expect_len(input.len(), in_shape.size())?;
    expect_len(weights.len(), kh * kw * ch)?;
    expect_len(bias.len(), ch)?;
    expect_len(output.len(), out_shape.size())?;
    window.validate()?;

    for oy in 0..out_h {
        for ox in 0..out_w {
            for c in 0..ch {
                let mut acc = bias_accumulator(bias[c], shifts.bias_shift, shifts.output_shift);
                for ky in 0..kh {
                    for kx in 0..kw {
                        if let Some((iy, ix)) = window.tap(oy, ox, ky, kx, in_h, in_w) {
                            acc += input[(iy * in_w + ix) * ch + c] as i32
                                * weights[(ky * kw + kx) * ch + c] as i32;
                        }
                    }
                }
                output[(oy * out_w + ox) * ch + c] = narrow(acc, shifts.output_shift);
            }
        }
    }
    Ok(())
}

/// Multiply-accumulate count of a full convolution.
pub fn conv_macs(out_shape: Shape, window: &Window, in_ch: usize) -> u64 {
    (out_shape.size() * window.area() * in_ch) as u64
}

/// Multiply-accumulate count of a depthwise convolution.
pub fn depthwise_macs(out_shape: Shape, window: &Window) -> u64 {
    (out_shape.size() * window.area()) as u64
}
