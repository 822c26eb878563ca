//! Recurrent layer driver.
//!
//! The driver owns the timestep loop and the state buffer; the per-step math
//! comes from an [`RnnCell`] supplied by the caller. Input is a
//! `(1, timesteps, features)` sequence.

use alloc::boxed::Box;
use alloc::vec::Vec;

use crate::error::{expect_len, NanoError, NanoResult};
use crate::tensor::{QFormat, Shape};

use super::{unary, RunContext, TensorId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RnnParams {
    pub units: usize,
    /// Emit every timestep's output instead of only the last one.
    pub return_sequence: bool,
    /// Carry the state over between runs instead of zeroing it.
    pub stateful: bool,
    pub output_format: QFormat,
}

impl RnnParams {
    pub fn new(units: usize) -> Self {
        Self { units, return_sequence: false, stateful: false, output_format: QFormat::default() }
    }

    pub fn return_sequence(mut self, on: bool) -> Self {
        self.return_sequence = on;
        self
    }

    pub fn stateful(mut self, on: bool) -> Self {
        self.stateful = on;
        self
    }

    pub fn output_format(mut self, format: QFormat) -> Self {
        self.output_format = format;
        self
    }
}

/// One recurrent step: consume `input`, update `state`, write `output`.
pub trait RnnCell: Send {
    /// Length of one step's output.
    fn units(&self) -> usize;

    fn state_len(&self) -> usize {
        self.units()
    }

    fn step(&mut self, input: &[i8], state: &mut [i8], output: &mut [i8]) -> NanoResult<()>;
}

pub struct RnnLayer {
    params: RnnParams,
    cell: Box<dyn RnnCell>,
    state: Vec<i8>,
}

impl RnnLayer {
    pub fn new(params: RnnParams, cell: Box<dyn RnnCell>) -> NanoResult<Self> {
        expect_len(cell.units(), params.units)?;
        let mut state = Vec::new();
        state.try_reserve_exact(cell.state_len()).map_err(|_| NanoError::AllocationFailed)?;
        state.resize(cell.state_len(), 0);
        Ok(Self { params, cell, state })
    }

    pub fn params(&self) -> &RnnParams {
        &self.params
    }

    pub fn state(&self) -> &[i8] {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.fill(0);
    }

    pub(crate) fn plan(&self, input: Shape) -> NanoResult<Shape> {
        if input.height() != 1 {
            return Err(NanoError::InvalidArgument("recurrent input must be (1, timesteps, features)"));
        }
        Ok(if self.params.return_sequence {
            Shape::sequence(input.width(), self.params.units)
        } else {
            Shape::vector(self.params.units)
        })
    }

    pub(crate) fn run(&mut self, ctx: &mut RunContext<'_>, input: TensorId, output: TensorId) -> NanoResult<()> {
        let mut io = unary(ctx.tensors, ctx.arena, input, output)?;
        let (steps, features) = (io.in_shape.width(), io.in_shape.channels());
        let units = self.params.units;
        let expected = if self.params.return_sequence { steps * units } else { units };
        expect_len(io.output.len(), expected)?;

        if !self.params.stateful {
            self.state.fill(0);
        }
        for t in 0..steps {
            let x = &io.input[t * features..(t + 1) * features];
            let y = if self.params.return_sequence {
                &mut io.output[t * units..(t + 1) * units]
            } else {
                &mut io.output[..]
            };
            self.cell.step(x, &mut self.state, y)?;
        }
        Ok(())
    }
}
