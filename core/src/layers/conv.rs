//! Conv2D and depthwise Conv2D layers over frozen weights.

use crate::error::{expect_len, NanoResult};
use crate::kernels::conv::{conv_macs, convolve_hwc, depthwise_conv_hwc, depthwise_macs};
use crate::kernels::{Shifts, Window};
use crate::tensor::{QFormat, Shape};

use super::{unary, Padding, RunContext, TensorId, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConvParams {
    /// Output channels.
    pub filters: usize,
    /// `(height, width)`
    pub kernel: (usize, usize),
    /// `(height, width)`
    pub stride: (usize, usize),
    pub padding: Padding,
    pub shifts: Shifts,
    pub output_format: QFormat,
}

impl ConvParams {
    pub fn new(filters: usize, kernel: (usize, usize)) -> Self {
        Self {
            filters,
            kernel,
            stride: (1, 1),
            padding: Padding::Valid,
            shifts: Shifts::default(),
            output_format: QFormat::default(),
        }
    }

    pub fn stride(mut self, h: usize, w: usize) -> Self {
        self.stride = (h, w);
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn shifts(mut self, bias_shift: u32, output_shift: u32) -> Self {
        self.shifts = Shifts::new(bias_shift, output_shift);
        self
    }

    pub fn output_format(mut self, format: QFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Window, output shape and MAC count of a full convolution.
    pub(crate) fn plan(&self, input: Shape, weights: &Weights) -> NanoResult<(Window, Shape, u64)> {
        let (window, h, w) = self.padding.resolve(input.height(), input.width(), self.kernel, self.stride)?;
        expect_len(weights.kernel.len(), self.filters * window.area() * input.channels())?;
        expect_len(weights.bias.len(), self.filters)?;
        let out = Shape::new(h, w, self.filters);
        Ok((window, out, conv_macs(out, &window, input.channels())))
    }

    /// Window, output shape, channel multiplier and MAC count of a depthwise
    /// convolution. The multiplier is 0 when `filters` is not a multiple of
    /// the input channels; the kernel rejects it when the layer runs.
    pub(crate) fn plan_depthwise(&self, input: Shape, weights: &Weights) -> NanoResult<(Window, Shape, usize, u64)> {
        let (window, h, w) = self.padding.resolve(input.height(), input.width(), self.kernel, self.stride)?;
        expect_len(weights.kernel.len(), window.area() * self.filters)?;
        expect_len(weights.bias.len(), self.filters)?;
        let in_ch = input.channels();
        let multiplier = if in_ch > 0 && self.filters % in_ch == 0 { self.filters / in_ch } else { 0 };
        let out = Shape::new(h, w, self.filters);
        Ok((window, out, multiplier, depthwise_macs(out, &window)))
    }
}

pub(crate) fn run_conv(
    ctx: &mut RunContext<'_>,
    input: TensorId,
    output: TensorId,
    weights: &Weights,
    window: &Window,
    shifts: Shifts,
) -> NanoResult<()> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    convolve_hwc(io.input, io.in_shape, weights.kernel, weights.bias, window, shifts, io.output, io.out_shape)
}

pub(crate) fn run_depthwise(
    ctx: &mut RunContext<'_>,
    input: TensorId,
    output: TensorId,
    weights: &Weights,
    window: &Window,
    shifts: Shifts,
    multiplier: usize,
) -> NanoResult<()> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    depthwise_conv_hwc(
        io.input,
        io.in_shape,
        weights.kernel,
        weights.bias,
        multiplier,
        window,
        shifts,
        io.output,
        io.out_shape,
    )
}
