//! Elementwise add / sub / mult over equally sized Q7 tensors.
//!
//! Each pair combines as `saturate8(round_shift(a op b, shift))`. With more
//! than two inputs the result folds left to right through the output buffer:
//! `out = (in0 op in1)`, then `out = (out op in2)`, and so on.

use crate::error::{expect_len, NanoError, NanoResult};
use crate::math::requantize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementwiseOp {
    Add,
    Sub,
    Mult,
}

impl ElementwiseOp {
    #[inline(always)]
    pub fn apply(self, a: i8, b: i8) -> i32 {
        let (a, b) = (a as i32, b as i32);
        match self {
            ElementwiseOp::Add => a + b,
            ElementwiseOp::Sub => a - b,
            ElementwiseOp::Mult => a * b,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementwiseOp::Add => "Add",
            ElementwiseOp::Sub => "Sub",
            ElementwiseOp::Mult => "Mult",
        }
    }
}

/// `out[i] = a[i] op b[i]`, requantized by `shift`.
pub fn combine(op: ElementwiseOp, a: &[i8], b: &[i8], shift: u32, output: &mut [i8]) -> NanoResult<()> {
    expect_len(a.len(), output.len())?;
    expect_len(b.len(), output.len())?;
    for ((o, &x), &y) in output.iter_mut().zip(a).zip(b) {
        *o = requantize(op.apply(x, y), shift);
    }
    Ok(())
}

/// `acc[i] = acc[i] op b[i]`, requantized by `shift`.
pub fn combine_into(op: ElementwiseOp, acc: &mut [i8], b: &[i8], shift: u32) -> NanoResult<()> {
    expect_len(b.len(), acc.len())?;
    for (o, &y) in acc.iter_mut().zip(b) {
        *o = requantize(op.apply(*o, y), shift);
    }
    Ok(())
}

/// Left-to-right fold over two or more inputs.
pub fn fold(op: ElementwiseOp, inputs: &[&[i8]], shift: u32, output: &mut [i8]) -> NanoResult<()> {
    fold_with(op, inputs.len(), shift, output, |k| Ok(inputs[k]))
}

/// [`fold`] over `count` inputs produced on demand by `input(k)`.
pub fn fold_with<'a, F>(
    op: ElementwiseOp,
    count: usize,
    shift: u32,
    output: &mut [i8],
    mut input: F,
) -> NanoResult<()>
where
    F: FnMut(usize) -> NanoResult<&'a [i8]>,
{
    if count < 2 {
        return Err(NanoError::InvalidArgument("elementwise ops need at least two inputs"));
    }
    for k in 0..count {
        expect_len(input(k)?.len(), output.len())?;
    }
    combine(op, input(0)?, input(1)?, shift, output)?;
    for k in 2..count {
        combine_into(op, output, input(k)?, shift)?;
    }
    Ok(())
}
