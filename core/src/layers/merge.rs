//! Fan-in layers: elementwise add / sub / mult and concatenation.
//!
//! Inputs are an ordered list of tensors. Every input must be placed apart
//! from the output, which the arena checks when it hands out the views.

use crate::error::{NanoError, NanoResult};
use crate::kernels::concat::{concat_with, ConcatAxis};
use crate::kernels::elementwise::{fold_with, ElementwiseOp};
use crate::tensor::{QFormat, Shape};

use super::{RunContext, TensorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementwiseParams {
    pub op: ElementwiseOp,
    /// Right shift applied after every pairwise step.
    pub shift: u32,
    pub output_format: QFormat,
}

impl ElementwiseParams {
    pub fn new(op: ElementwiseOp) -> Self {
        Self { op, shift: 0, output_format: QFormat::default() }
    }

    pub fn shift(mut self, shift: u32) -> Self {
        self.shift = shift;
        self
    }

    pub fn output_format(mut self, format: QFormat) -> Self {
        self.output_format = format;
        self
    }

    pub(crate) fn plan(&self, shapes: &[Shape]) -> NanoResult<(Shape, u64)> {
        let [first, rest @ ..] = shapes else {
            return Err(NanoError::InvalidArgument("elementwise ops need at least two inputs"));
        };
        if rest.is_empty() {
            return Err(NanoError::InvalidArgument("elementwise ops need at least two inputs"));
        }
        if rest.iter().any(|s| s != first) {
            return Err(NanoError::InvalidArgument("elementwise inputs must share one shape"));
        }
        Ok((*first, (first.size() * rest.len()) as u64))
    }
}

pub(crate) fn run_elementwise(
    ctx: &mut RunContext<'_>,
    inputs: &[TensorId],
    output: TensorId,
    params: ElementwiseParams,
) -> NanoResult<()> {
    let tensors = ctx.tensors;
    let dst = ctx.slot(output)?;
    let (views, out) = ctx.arena.split(dst.region)?;
    fold_with(params.op, inputs.len(), params.shift, out, |k| {
        let slot = tensors.get(inputs[k].0).ok_or(NanoError::InvalidArgument("unknown tensor"))?;
        views.get(slot.region)
    })
}

pub(crate) fn run_concat(
    ctx: &mut RunContext<'_>,
    inputs: &[TensorId],
    output: TensorId,
    axis: ConcatAxis,
) -> NanoResult<()> {
    let tensors = ctx.tensors;
    let dst = ctx.slot(output)?;
    let (views, out) = ctx.arena.split(dst.region)?;
    concat_with(axis, inputs.len(), out, dst.desc.shape, |k| {
        let slot = tensors.get(inputs[k].0).ok_or(NanoError::InvalidArgument("unknown tensor"))?;
        Ok((views.get(slot.region)?, slot.desc.shape))
    })
}
