//! Pooling kernels: max, average, sum, and nearest-neighbour upsampling.
//!
//! All windowed kernels share the convolution boundary rule: taps that land
//! in the padding are skipped and are not counted. Output extents come from
//! the caller's shape; taps past the input edge are skipped the same way.

use crate::error::{expect_capacity, expect_len, NanoResult};
use crate::math::{requantize_dynamic, saturate8};
use crate::tensor::Shape;

use super::Window;

fn check_pool(
    input: &[i8],
    in_shape: Shape,
    window: &Window,
    output: &[i8],
    out_shape: Shape,
) -> NanoResult<()> {
    expect_len(input.len(), in_shape.size())?;
    expect_len(output.len(), out_shape.size())?;
    expect_len(out_shape.channels(), in_shape.channels())?;
    window.validate()
}

/// Visit the in-bounds taps of every output element.
///
/// `f` receives the output index and an iterator over the tap values.
fn for_each_window<F>(input: &[i8], in_shape: Shape, window: &Window, out_shape: Shape, mut f: F)
where
    F: FnMut(usize, &mut dyn Iterator<Item = i8>),
{
    let (in_h, in_w, ch) = (in_shape.height(), in_shape.width(), in_shape.channels());
    let (out_h, out_w) = (out_shape.height(), out_shape.width());
    for oy in 0..out_h {
        for ox in 0..out_w {
            for c in 0..ch {
                let mut taps = (0..window.kernel_h)
                    .flat_map(|ky| (0..window.kernel_w).map(move |kx| (ky, kx)))
                    .filter_map(|(ky, kx)| window.tap(oy, ox, ky, kx, in_h, in_w))
                    .map(|(iy, ix)| input[(iy * in_w + ix) * ch + c]);
                f((oy * out_w + ox) * ch + c, &mut taps);
            }
        }
    }
}

/// Running maximum over the in-bounds taps. A window with no in-bounds tap
/// yields -128.
pub fn max_pool_hwc(
    input: &[i8],
    in_shape: Shape,
    window: &Window,
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<()> {
    check_pool(input, in_shape, window, output, out_shape)?;
    for_each_window(input, in_shape, window, out_shape, |idx, taps| {
        // starts below the representable minimum
        let max = taps.fold(i8::MIN as i32 - 1, |m, v| m.max(v as i32));
        output[idx] = saturate8(max);
    });
    Ok(())
}

/// Mean over the in-bounds taps; edge windows divide by their own tap count.
/// A window with no in-bounds tap yields 0.
pub fn avg_pool_hwc(
    input: &[i8],
    in_shape: Shape,
    window: &Window,
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<()> {
    check_pool(input, in_shape, window, output, out_shape)?;
    for_each_window(input, in_shape, window, out_shape, |idx, taps| {
        let (sum, count) = taps.fold((0i32, 0i32), |(s, n), v| (s + v as i32, n + 1));
        output[idx] = if count == 0 { 0 } else { saturate8(sum / count) };
    });
    Ok(())
}

/// Sum over the in-bounds taps into `scratch` (one `i32` per output element),
/// then requantize the whole output with the dynamic shift search.
///
/// Returns the chosen shift; the output format loses that many fractional
/// bits relative to the input.
pub fn sum_pool_hwc(
    input: &[i8],
    in_shape: Shape,
    window: &Window,
    scratch: &mut [i32],
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<u32> {
    check_pool(input, in_shape, window, output, out_shape)?;
    let size = out_shape.size();
    expect_capacity(scratch.len(), size)?;
    let sums = &mut scratch[..size];
    for_each_window(input, in_shape, window, out_shape, |idx, taps| {
        sums[idx] = taps.map(|v| v as i32).sum();
    });
    requantize_dynamic(sums, output)
}

/// Nearest-neighbour upsampling: every input pixel becomes a
/// `kernel_h x kernel_w` block of identical channel vectors.
///
/// The pixel is first replicated along x by contiguous copies, then the
/// expanded row segment is block-copied into the remaining rows.
pub fn upsample_hwc(
    input: &[i8],
    in_shape: Shape,
    kernel_h: usize,
    kernel_w: usize,
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<()> {
    let (in_h, in_w, ch) = (in_shape.height(), in_shape.width(), in_shape.channels());
    expect_len(input.len(), in_shape.size())?;
    expect_len(output.len(), out_shape.size())?;
    expect_len(out_shape.height(), in_h * kernel_h)?;
    expect_len(out_shape.width(), in_w * kernel_w)?;
    expect_len(out_shape.channels(), ch)?;

    let out_row = out_shape.row_size();
    let segment = kernel_w * ch;
    for y in 0..in_h {
        for x in 0..in_w {
            let pixel = &input[(y * in_w + x) * ch..(y * in_w + x + 1) * ch];
            let base = y * kernel_h * out_row + x * segment;
            for i in 0..kernel_w {
                output[base + i * ch..base + (i + 1) * ch].copy_from_slice(pixel);
            }
            for r in 1..kernel_h {
                output.copy_within(base..base + segment, base + r * out_row);
            }
        }
    }
    Ok(())
}
