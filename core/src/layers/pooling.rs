//! Pooling and upsampling layers.
//!
//! Pooling windows default to non-overlapping (stride equal to the kernel).
//! Sum pooling changes its output format at run time; the chosen shift is
//! kept on the layer.

use crate::error::{NanoError, NanoResult};
use crate::kernels::pool::{avg_pool_hwc, max_pool_hwc, sum_pool_hwc, upsample_hwc};
use crate::kernels::Window;
use crate::tensor::Shape;

use super::{unary, Padding, RunContext, TensorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolParams {
    /// `(height, width)`
    pub kernel: (usize, usize),
    /// `(height, width)`
    pub stride: (usize, usize),
    pub padding: Padding,
}

impl PoolParams {
    pub fn new(kernel: (usize, usize)) -> Self {
        Self { kernel, stride: kernel, padding: Padding::Valid }
    }

    pub fn stride(mut self, h: usize, w: usize) -> Self {
        self.stride = (h, w);
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub(crate) fn plan(&self, input: Shape) -> NanoResult<(Window, Shape)> {
        let (window, h, w) = self.padding.resolve(input.height(), input.width(), self.kernel, self.stride)?;
        Ok((window, Shape::new(h, w, input.channels())))
    }
}

/// Nearest-neighbour upsampling factors, `(height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UpSampleParams {
    pub kernel: (usize, usize),
}

impl UpSampleParams {
    pub fn new(kernel: (usize, usize)) -> Self {
        Self { kernel }
    }

    pub(crate) fn plan(&self, input: Shape) -> NanoResult<Shape> {
        if self.kernel.0 == 0 || self.kernel.1 == 0 {
            return Err(NanoError::InvalidArgument("upsample factor must be non-zero"));
        }
        Ok(Shape::new(input.height() * self.kernel.0, input.width() * self.kernel.1, input.channels()))
    }
}

pub(crate) fn run_max(ctx: &mut RunContext<'_>, input: TensorId, output: TensorId, window: &Window) -> NanoResult<()> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    max_pool_hwc(io.input, io.in_shape, window, io.output, io.out_shape)
}

pub(crate) fn run_avg(ctx: &mut RunContext<'_>, input: TensorId, output: TensorId, window: &Window) -> NanoResult<()> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    avg_pool_hwc(io.input, io.in_shape, window, io.output, io.out_shape)
}

/// Returns the dynamic shift the kernel picked.
pub(crate) fn run_sum(ctx: &mut RunContext<'_>, input: TensorId, output: TensorId, window: &Window) -> NanoResult<u32> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    sum_pool_hwc(io.input, io.in_shape, window, ctx.scratch, io.output, io.out_shape)
}

pub(crate) fn run_upsample(
    ctx: &mut RunContext<'_>,
    input: TensorId,
    output: TensorId,
    params: &UpSampleParams,
) -> NanoResult<()> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    upsample_hwc(io.input, io.in_shape, params.kernel.0, params.kernel.1, io.output, io.out_shape)
}
