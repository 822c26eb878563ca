//! Model: a built layer sequence plus everything it runs on.
//!
//! ```text
//! input buffer -> Input -> Layer[1] -> ... -> Layer[N-2] -> Output -> output buffer
//! ```
//!
//! The caller writes the input buffer, calls [`Model::run`], and reads the
//! output buffer. All tensor storage was sized when the model was built;
//! running never allocates. A model holds no global state, so any number of
//! models can coexist.

use alloc::vec::Vec;

use log::{debug, warn};

use crate::arena::Arena;
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{expect_len, NanoError, NanoResult};
use crate::layers::{Layer, LayerKind, RunContext, TensorId, TensorSlot};
use crate::math;
use crate::stats::{LayerReport, ModelStats};
use crate::tensor::{QFormat, TensorDesc};

pub struct Model {
    layers: Vec<Layer>,
    tensors: Vec<TensorSlot>,
    arena: Arena,
    scratch: Vec<i32>,
    input: Vec<i8>,
    output: Vec<i8>,
    input_desc: TensorDesc,
    output_desc: TensorDesc,
    output_id: TensorId,
    config: EngineConfig,
    total_ops: u64,
    last_run_us: u64,
}

impl Model {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        layers: Vec<Layer>,
        tensors: Vec<TensorSlot>,
        arena: Arena,
        scratch: Vec<i32>,
        input_desc: TensorDesc,
        output_desc: TensorDesc,
        output_id: TensorId,
        config: EngineConfig,
    ) -> NanoResult<Self> {
        let total_ops = layers.iter().map(|l| l.macs).sum();
        Ok(Self {
            layers,
            tensors,
            arena,
            scratch,
            input: zeroed(input_desc.size())?,
            output: zeroed(output_desc.size())?,
            input_desc,
            output_desc,
            output_id,
            config,
            total_ops,
            last_run_us: 0,
        })
    }

    pub fn input_desc(&self) -> TensorDesc {
        self.input_desc
    }

    pub fn output_desc(&self) -> TensorDesc {
        self.output_desc
    }

    /// Copy `data` into the input buffer. Its length must equal the input
    /// tensor's size.
    pub fn set_input(&mut self, data: &[i8]) -> NanoResult<()> {
        expect_len(data.len(), self.input.len())?;
        self.input.copy_from_slice(data);
        Ok(())
    }

    pub fn input_mut(&mut self) -> &mut [i8] {
        &mut self.input
    }

    /// Output of the most recent successful run.
    pub fn output(&self) -> &[i8] {
        &self.output
    }

    /// Format of the output tensor. For a sum-pool output this reflects the
    /// shift chosen by the last run.
    pub fn output_format(&self) -> QFormat {
        self.layers
            .iter()
            .rev()
            .find(|l| l.output == self.output_id && !matches!(l.kind, LayerKind::Output))
            .map(|l| l.output_format())
            .unwrap_or(self.output_desc.format)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Multiply-accumulates of one full run.
    pub fn total_ops(&self) -> u64 {
        self.total_ops
    }

    /// Bytes of activation storage the plan needs.
    pub fn arena_size(&self) -> usize {
        self.arena.capacity()
    }

    /// Duration of the most recent run, in microseconds.
    pub fn last_run_us(&self) -> u64 {
        self.last_run_us
    }

    /// Zero the carried state of every stateful recurrent layer.
    pub fn reset_state(&mut self) {
        for layer in &mut self.layers {
            if let LayerKind::Rnn(rnn) = &mut layer.kind {
                rnn.reset();
            }
        }
    }

    /// Run every layer in order. The first failing layer aborts the run and
    /// its error is returned unchanged; later layers do not execute.
    pub fn run<C: Clock + ?Sized>(&mut self, clock: &C) -> NanoResult<()> {
        let trace = self.config.trace_layers;
        let mut ctx = RunContext {
            tensors: &self.tensors,
            arena: &mut self.arena,
            scratch: &mut self.scratch,
            input: &self.input,
            output: &mut self.output,
            dense_kernel: self.config.dense_kernel,
        };

        let start = clock.now_us();
        for (index, layer) in self.layers.iter_mut().enumerate() {
            let t0 = clock.now_us();
            let result = layer.run(&mut ctx);
            layer.stats.record(clock.now_us().saturating_sub(t0));
            if let Err(e) = result {
                warn!("layer #{} {} failed ({}): {}", index + 1, layer.name(), e.status(), e);
                return Err(e);
            }
            if trace {
                debug!(
                    "#{:<3} {:>10} {:>8}us {:>10} MACs",
                    index + 1,
                    layer.name(),
                    layer.stats.time_us,
                    layer.macs
                );
            }
        }
        self.last_run_us = clock.now_us().saturating_sub(start);
        Ok(())
    }

    /// Run once and return the top-1 class with its share of the output mass,
    /// `max / sum(outputs)` (0.0 when the sum is not positive).
    pub fn predict<C: Clock + ?Sized>(&mut self, clock: &C) -> NanoResult<(usize, f32)> {
        self.run(clock)?;
        let label = math::argmax_i8(&self.output).ok_or(NanoError::InvalidArgument("empty model output"))?;
        let sum: i32 = self.output.iter().map(|&v| v as i32).sum();
        let prob = if sum > 0 { self.output[label] as f32 / sum as f32 } else { 0.0 };
        Ok((label, prob))
    }

    /// Per-layer timing and MAC counts of the last run.
    pub fn stats(&self) -> ModelStats {
        ModelStats::new(
            self.layers
                .iter()
                .enumerate()
                .map(|(i, l)| LayerReport { index: i + 1, name: l.name(), time_us: l.stats.time_us, macs: l.macs })
                .collect(),
        )
    }
}

fn zeroed(len: usize) -> NanoResult<Vec<i8>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| NanoError::AllocationFailed)?;
    v.resize(len, 0);
    Ok(v)
}
