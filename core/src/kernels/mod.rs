//! Q7 operator kernels.
//!
//! Each kernel works on plain slices in HWC layout and validates every length
//! before touching its output, so a rejected call leaves the destination
//! untouched. Kernels never allocate; wide scratch space is passed in.
//!
//! - `conv`: full and depthwise convolution
//! - `pool`: max / average / sum pooling and nearest-neighbour upsampling
//! - `dense`: fully-connected, basic and 4x4 unrolled
//! - `elementwise`: add / sub / mult with left-to-right folding
//! - `activation`: relu, table sigmoid/tanh, base-2 softmax
//! - `concat`: concatenation along height, width or channel
//! - `reference`: float kernels for host-side validation only

pub mod activation;
pub mod concat;
pub mod conv;
pub mod dense;
pub mod elementwise;
pub mod pool;
pub mod reference;

use crate::error::{NanoError, NanoResult};

/// Sliding-window geometry shared by convolution and pooling.
///
/// Non-square kernels, strides and paddings are expressed per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Window {
    pub kernel_h: usize,
    pub kernel_w: usize,
    pub stride_h: usize,
    pub stride_w: usize,
    pub pad_h: usize,
    pub pad_w: usize,
}

impl Window {
    pub const fn new(kernel_h: usize, kernel_w: usize) -> Self {
        Self { kernel_h, kernel_w, stride_h: 1, stride_w: 1, pad_h: 0, pad_w: 0 }
    }

    pub const fn square(kernel: usize) -> Self {
        Self::new(kernel, kernel)
    }

    pub const fn stride(mut self, stride_h: usize, stride_w: usize) -> Self {
        self.stride_h = stride_h;
        self.stride_w = stride_w;
        self
    }

    pub const fn pad(mut self, pad_h: usize, pad_w: usize) -> Self {
        self.pad_h = pad_h;
        self.pad_w = pad_w;
        self
    }

    pub fn area(&self) -> usize {
        self.kernel_h * self.kernel_w
    }

    pub fn validate(&self) -> NanoResult<()> {
        if self.kernel_h == 0 || self.kernel_w == 0 {
            return Err(NanoError::InvalidArgument("kernel extent must be non-zero"));
        }
        if self.stride_h == 0 || self.stride_w == 0 {
            return Err(NanoError::InvalidArgument("stride must be non-zero"));
        }
        Ok(())
    }

    /// Output `(height, width)` for an input of `in_h x in_w`:
    /// `(in + 2 * pad - kernel) / stride + 1` on each axis.
    pub fn output_hw(&self, in_h: usize, in_w: usize) -> NanoResult<(usize, usize)> {
        self.validate()?;
        let h = output_extent(in_h, self.kernel_h, self.stride_h, self.pad_h)?;
        let w = output_extent(in_w, self.kernel_w, self.stride_w, self.pad_w)?;
        Ok((h, w))
    }

    /// Input coordinates of window tap `(ky, kx)` for output pixel `(oy, ox)`,
    /// or `None` when the tap falls in the padding.
    #[inline(always)]
    pub(crate) fn tap(
        &self,
        oy: usize,
        ox: usize,
        ky: usize,
        kx: usize,
        in_h: usize,
        in_w: usize,
    ) -> Option<(usize, usize)> {
        let iy = (oy * self.stride_h + ky).checked_sub(self.pad_h)?;
        let ix = (ox * self.stride_w + kx).checked_sub(self.pad_w)?;
        if iy < in_h && ix < in_w {
            Some((iy, ix))
        } else {
            None
        }
    }
}

fn output_extent(input: usize, kernel: usize, stride: usize, pad: usize) -> NanoResult<usize> {
    let padded = input + 2 * pad;
    if padded < kernel {
        return Err(NanoError::InvalidArgument("kernel larger than padded input"));
    }
    Ok((padded - kernel) / stride + 1)
}

/// Pre-baked shifts reconciling bias, accumulator and output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shifts {
    pub bias_shift: u32,
    pub output_shift: u32,
}

impl Shifts {
    pub const fn new(bias_shift: u32, output_shift: u32) -> Self {
        Self { bias_shift, output_shift }
    }

    pub(crate) fn validate(&self) -> NanoResult<()> {
        if self.bias_shift > 24 || self.output_shift > 31 {
            return Err(NanoError::InvalidArgument("shift out of range"));
        }
        Ok(())
    }
}
