//! Fully-connected layer over frozen weights.

use crate::config::DenseKernel;
use crate::error::{expect_len, NanoResult};
use crate::kernels::dense::{fully_connected, fully_connected_unrolled};
use crate::kernels::Shifts;
use crate::tensor::{QFormat, Shape};

use super::{unary, RunContext, TensorId, Weights};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DenseParams {
    pub units: usize,
    pub shifts: Shifts,
    pub output_format: QFormat,
}

impl DenseParams {
    pub fn new(units: usize) -> Self {
        Self { units, shifts: Shifts::default(), output_format: QFormat::default() }
    }

    pub fn shifts(mut self, bias_shift: u32, output_shift: u32) -> Self {
        self.shifts = Shifts::new(bias_shift, output_shift);
        self
    }

    pub fn output_format(mut self, format: QFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Output shape and MAC count. The whole input is one feature vector.
    pub(crate) fn plan(&self, input: Shape, weights: &Weights) -> NanoResult<(Shape, u64)> {
        let dim = input.size();
        expect_len(weights.kernel.len(), self.units * dim)?;
        expect_len(weights.bias.len(), self.units)?;
        Ok((Shape::vector(self.units), (dim * self.units) as u64))
    }
}

pub(crate) fn run_dense(
    ctx: &mut RunContext<'_>,
    input: TensorId,
    output: TensorId,
    weights: &Weights,
    shifts: Shifts,
) -> NanoResult<()> {
    let kernel = ctx.dense_kernel;
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    match kernel {
        DenseKernel::Basic => fully_connected(io.input, weights.kernel, weights.bias, shifts, io.output),
        DenseKernel::Unrolled => fully_connected_unrolled(io.input, weights.kernel, weights.bias, shifts, io.output),
    }
}
