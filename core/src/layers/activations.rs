//! Activation layers.
//!
//! ReLU, sigmoid and tanh rewrite their input tensor in place; the builder
//! gives them an output that aliases the input storage. Softmax needs the
//! whole vector before writing, so it gets a separate output.

use crate::error::NanoResult;
use crate::kernels::activation::{relu_q7, sigmoid_q7, softmax_q7, tanh_q7};
use crate::tensor::QFormat;

use super::{unary, RunContext, TensorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn name(self) -> &'static str {
        match self {
            Activation::Relu => "ReLU",
            Activation::Sigmoid => "Sigmoid",
            Activation::Tanh => "Tanh",
        }
    }

    /// Apply in place to data in `format`.
    pub fn apply(self, data: &mut [i8], format: QFormat) {
        match self {
            Activation::Relu => relu_q7(data),
            Activation::Sigmoid => sigmoid_q7(data, format.int_bits),
            Activation::Tanh => tanh_q7(data, format.int_bits),
        }
    }

    /// Format of the result for an input in `format`.
    pub fn output_format(self, format: QFormat) -> QFormat {
        match self {
            Activation::Relu => format,
            Activation::Sigmoid | Activation::Tanh => QFormat::unit(),
        }
    }
}

pub(crate) fn run_activation(
    ctx: &mut RunContext<'_>,
    activation: Activation,
    tensor: TensorId,
    format: QFormat,
) -> NanoResult<()> {
    let slot = ctx.slot(tensor)?;
    activation.apply(ctx.arena.slice_mut(slot.region)?, format);
    Ok(())
}

pub(crate) fn run_softmax(ctx: &mut RunContext<'_>, input: TensorId, output: TensorId) -> NanoResult<()> {
    let io = unary(ctx.tensors, ctx.arena, input, output)?;
    softmax_q7(io.input, io.output)
}
