//! Shape and fixed-point format descriptors.
//!
//! Tensors are stored HWC: channel varies fastest, then width, then height.
//! A fourth extent is reserved for batch/time and defaults to 1, so every
//! shape is a full 4-tuple and `size()` is simply the product of extents.

use crate::error::{NanoError, NanoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Shape {
    /// `[height, width, channels, reserved]`
    pub dims: [usize; 4],
}

impl Shape {
    pub const fn new(h: usize, w: usize, c: usize) -> Self {
        Self { dims: [h, w, c, 1] }
    }

    /// A flat vector of `len` elements, laid out along the channel axis.
    pub const fn vector(len: usize) -> Self {
        Self::new(1, 1, len)
    }

    /// A `(1, timesteps, features)` sequence, the layout recurrent layers expect.
    pub const fn sequence(timesteps: usize, features: usize) -> Self {
        Self::new(1, timesteps, features)
    }

    pub const fn with_reserved(mut self, n: usize) -> Self {
        self.dims[3] = n;
        self
    }

    #[inline(always)]
    pub const fn height(&self) -> usize {
        self.dims[0]
    }

    #[inline(always)]
    pub const fn width(&self) -> usize {
        self.dims[1]
    }

    #[inline(always)]
    pub const fn channels(&self) -> usize {
        self.dims[2]
    }

    /// Number of elements (bytes, for Q7 data).
    pub fn size(&self) -> usize {
        self.dims.iter().product()
    }

    /// Elements in one row (`width * channels`).
    pub fn row_size(&self) -> usize {
        self.width() * self.channels()
    }
}

/// Fixed-point format `Qm.n`: a stored integer `v` means `v / 2^frac_bits`.
///
/// For Q7 data `int_bits + frac_bits == 7`, but the pair is kept explicit
/// because activation tables branch on `int_bits` and shifts are derived
/// from `frac_bits` differences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QFormat {
    pub int_bits: i8,
    pub frac_bits: i8,
}

impl QFormat {
    pub const fn new(int_bits: i8, frac_bits: i8) -> Self {
        Self { int_bits, frac_bits }
    }

    /// Q7 data with `frac_bits` fractional bits (`int_bits = 7 - frac_bits`).
    pub const fn q7(frac_bits: i8) -> Self {
        Self::new(7 - frac_bits, frac_bits)
    }

    /// The format activation tables and the softmax produce: Q0.7.
    pub const fn unit() -> Self {
        Self::q7(7)
    }

    pub fn to_f32(&self, value: i8) -> f32 {
        value as f32 / libm::powf(2.0, self.frac_bits as f32)
    }

    /// Quantize a real value, rounding to nearest and saturating.
    pub fn from_f32(&self, value: f32) -> i8 {
        let scaled = libm::roundf(value * libm::powf(2.0, self.frac_bits as f32));
        scaled.clamp(i8::MIN as f32, i8::MAX as f32) as i8
    }

    /// Format after an extra right shift of `shift` bits.
    pub fn shifted(&self, shift: u32) -> Self {
        let s = shift.min(i8::MAX as u32) as i8;
        Self::new(self.int_bits.saturating_add(s), self.frac_bits.saturating_sub(s))
    }

    /// Left shift applied to a bias so it lines up with `input * weight`.
    pub fn bias_shift(input: QFormat, weight: QFormat, bias: QFormat) -> NanoResult<u32> {
        let shift = input.frac_bits as i32 + weight.frac_bits as i32 - bias.frac_bits as i32;
        u32::try_from(shift).map_err(|_| NanoError::InvalidArgument("negative bias shift"))
    }

    /// Right shift narrowing an `input * weight` accumulator to `output`.
    pub fn output_shift(input: QFormat, weight: QFormat, output: QFormat) -> NanoResult<u32> {
        let shift = input.frac_bits as i32 + weight.frac_bits as i32 - output.frac_bits as i32;
        u32::try_from(shift).map_err(|_| NanoError::InvalidArgument("negative output shift"))
    }
}

impl Default for QFormat {
    fn default() -> Self {
        Self::q7(7)
    }
}

/// Shape plus format of one tensor endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorDesc {
    pub shape: Shape,
    pub format: QFormat,
}

impl TensorDesc {
    pub const fn new(shape: Shape, format: QFormat) -> Self {
        Self { shape, format }
    }

    pub fn size(&self) -> usize {
        self.shape.size()
    }
}
