//! Boundary layers: raw copies between the model's own buffers and the
//! graph's first and last tensors.
//!
//! The byte length on both sides must match the tensor's `size()` exactly.

use crate::error::{expect_len, NanoResult};
use crate::tensor::Shape;

use super::{RunContext, TensorId};

pub(crate) fn copy_in(ctx: &mut RunContext<'_>, tensor: TensorId) -> NanoResult<()> {
    let slot = ctx.slot(tensor)?;
    expect_len(ctx.input.len(), slot.desc.size())?;
    ctx.arena.slice_mut(slot.region)?.copy_from_slice(ctx.input);
    Ok(())
}

pub(crate) fn copy_out(ctx: &mut RunContext<'_>, tensor: TensorId) -> NanoResult<()> {
    let slot = ctx.slot(tensor)?;
    expect_len(ctx.output.len(), slot.desc.size())?;
    ctx.output.copy_from_slice(ctx.arena.slice(slot.region)?);
    Ok(())
}

/// Shape after flattening: every element along the channel axis.
pub fn flatten_shape(shape: Shape) -> Shape {
    Shape::vector(shape.size())
}
