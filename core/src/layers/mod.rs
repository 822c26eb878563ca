//! Layer kinds and the per-kind run contract.
//!
//! The set of layer kinds is closed, so a layer is a tagged variant
//! ([`LayerKind`]) dispatched by one `match` in [`Layer::run`], rather than a
//! trait object per kind. Layers name their tensors by [`TensorId`]; the
//! builder resolves ids to arena regions once, and the engine looks them up
//! in a flat table while running.

pub mod activations;
pub mod conv;
pub mod dense;
pub mod io;
pub mod merge;
pub mod pooling;
pub mod recurrent;

use alloc::vec::Vec;

use crate::arena::{Arena, Region};
use crate::config::DenseKernel;
use crate::error::{NanoError, NanoResult};
use crate::kernels::concat::ConcatAxis;
use crate::kernels::Window;
use crate::tensor::{QFormat, Shape, TensorDesc};

pub use activations::Activation;
pub use conv::ConvParams;
pub use dense::DenseParams;
pub use merge::ElementwiseParams;
pub use pooling::{PoolParams, UpSampleParams};
pub use recurrent::{RnnCell, RnnLayer, RnnParams};

/// Handle to a tensor produced while building a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A placed tensor: what it holds and where it lives in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorSlot {
    pub desc: TensorDesc,
    pub region: Region,
}

/// Frozen kernel and bias arrays. `'static` because on a device they sit in
/// flash next to the program.
#[derive(Debug, Clone, Copy)]
pub struct Weights {
    pub kernel: &'static [i8],
    pub bias: &'static [i8],
}

impl Weights {
    pub const fn new(kernel: &'static [i8], bias: &'static [i8]) -> Self {
        Self { kernel, bias }
    }
}

/// How a windowed layer pads its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Padding {
    /// No padding; windows stay inside the input.
    #[default]
    Valid,
    /// Output extent `ceil(in / stride)`; the padding is split with the
    /// smaller half leading.
    Same,
    /// Fixed leading pad per axis.
    Explicit { x: usize, y: usize },
}

impl Padding {
    /// Resolve against an input extent into a kernel window and the output
    /// `(height, width)`.
    pub fn resolve(
        self,
        in_h: usize,
        in_w: usize,
        kernel: (usize, usize),
        stride: (usize, usize),
    ) -> NanoResult<(Window, usize, usize)> {
        let window = Window::new(kernel.0, kernel.1).stride(stride.0, stride.1);
        window.validate()?;
        if in_h == 0 || in_w == 0 {
            return Err(NanoError::InvalidArgument("empty spatial extent"));
        }
        match self {
            Padding::Valid => {
                let (h, w) = window.output_hw(in_h, in_w)?;
                Ok((window, h, w))
            }
            Padding::Explicit { x, y } => {
                let window = window.pad(y, x);
                let (h, w) = window.output_hw(in_h, in_w)?;
                Ok((window, h, w))
            }
            Padding::Same => {
                let h = in_h.div_ceil(stride.0);
                let w = in_w.div_ceil(stride.1);
                let pad_h = ((h - 1) * stride.0 + kernel.0).saturating_sub(in_h) / 2;
                let pad_w = ((w - 1) * stride.1 + kernel.1).saturating_sub(in_w) / 2;
                Ok((window.pad(pad_h, pad_w), h, w))
            }
        }
    }
}

/// Per-kind parameters. Geometry is resolved at build time.
pub enum LayerKind {
    /// Copy the model's input buffer into the graph.
    Input,
    /// Copy the final tensor out to the model's output buffer.
    Output,
    /// Reshape to a vector. Aliases its input, so running it is a no-op.
    Flatten,
    Conv2d { params: ConvParams, weights: Weights, window: Window },
    DepthwiseConv2d { params: ConvParams, weights: Weights, window: Window, multiplier: usize },
    Dense { params: DenseParams, weights: Weights },
    /// In place on its input; `input` is the format it was built against.
    Activation { activation: Activation, input: QFormat },
    Softmax,
    MaxPool(Window),
    AvgPool(Window),
    SumPool(Window),
    UpSample(UpSampleParams),
    Elementwise(ElementwiseParams),
    Concat(ConcatAxis),
    Rnn(RnnLayer),
}

impl LayerKind {
    pub fn name(&self) -> &'static str {
        match self {
            LayerKind::Input => "Input",
            LayerKind::Output => "Output",
            LayerKind::Flatten => "Flatten",
            LayerKind::Conv2d { .. } => "Conv2D",
            LayerKind::DepthwiseConv2d { .. } => "DW_Conv2D",
            LayerKind::Dense { .. } => "Dense",
            LayerKind::Activation { activation, .. } => activation.name(),
            LayerKind::Softmax => "Softmax",
            LayerKind::MaxPool(_) => "MaxPool",
            LayerKind::AvgPool(_) => "AvgPool",
            LayerKind::SumPool(_) => "SumPool",
            LayerKind::UpSample(_) => "UpSample",
            LayerKind::Elementwise(p) => p.op.name(),
            LayerKind::Concat(_) => "Concat",
            LayerKind::Rnn(_) => "RNN",
        }
    }

    /// Kinds whose output shares storage with their first input.
    pub fn aliases_input(&self) -> bool {
        matches!(self, LayerKind::Flatten | LayerKind::Activation { .. })
    }
}

/// Timing of one layer across runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerStats {
    /// Duration of the most recent run.
    pub time_us: u64,
    pub total_time_us: u64,
    pub runs: u32,
}

impl LayerStats {
    pub(crate) fn record(&mut self, elapsed_us: u64) {
        self.time_us = elapsed_us;
        self.total_time_us = self.total_time_us.saturating_add(elapsed_us);
        self.runs = self.runs.saturating_add(1);
    }
}

/// One node of the execution order.
pub struct Layer {
    pub(crate) kind: LayerKind,
    pub(crate) inputs: Vec<TensorId>,
    pub(crate) output: TensorId,
    pub(crate) format: QFormat,
    pub(crate) macs: u64,
    pub(crate) dynamic_shift: Option<u32>,
    pub(crate) stats: LayerStats,
}

impl Layer {
    pub(crate) fn new(kind: LayerKind, inputs: Vec<TensorId>, output: TensorId, format: QFormat, macs: u64) -> Self {
        Self { kind, inputs, output, format, macs, dynamic_shift: None, stats: LayerStats::default() }
    }

    pub fn kind(&self) -> &LayerKind {
        &self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    pub fn output(&self) -> TensorId {
        self.output
    }

    /// Multiply-accumulates per run.
    pub fn macs(&self) -> u64 {
        self.macs
    }

    pub fn stats(&self) -> &LayerStats {
        &self.stats
    }

    /// Shift chosen by the last sum-pool run; `None` for every other kind
    /// and before the first run.
    pub fn dynamic_shift(&self) -> Option<u32> {
        self.dynamic_shift
    }

    /// Format of the output tensor, including any dynamic shift applied
    /// during the last run.
    pub fn output_format(&self) -> QFormat {
        self.format.shifted(self.dynamic_shift.unwrap_or(0))
    }

    pub(crate) fn run(&mut self, ctx: &mut RunContext<'_>) -> NanoResult<()> {
        let inputs = &self.inputs;
        let output = self.output;
        match &mut self.kind {
            LayerKind::Input => io::copy_in(ctx, output),
            LayerKind::Output => io::copy_out(ctx, inputs[0]),
            LayerKind::Flatten => Ok(()),
            LayerKind::Conv2d { weights, window, params } => {
                conv::run_conv(ctx, inputs[0], output, weights, window, params.shifts)
            }
            LayerKind::DepthwiseConv2d { weights, window, params, multiplier } => {
                conv::run_depthwise(ctx, inputs[0], output, weights, window, params.shifts, *multiplier)
            }
            LayerKind::Dense { params, weights } => dense::run_dense(ctx, inputs[0], output, weights, params.shifts),
            LayerKind::Activation { activation, input } => {
                activations::run_activation(ctx, *activation, output, *input)
            }
            LayerKind::Softmax => activations::run_softmax(ctx, inputs[0], output),
            LayerKind::MaxPool(window) => pooling::run_max(ctx, inputs[0], output, window),
            LayerKind::AvgPool(window) => pooling::run_avg(ctx, inputs[0], output, window),
            LayerKind::SumPool(window) => {
                let shift = pooling::run_sum(ctx, inputs[0], output, window)?;
                self.dynamic_shift = Some(shift);
                Ok(())
            }
            LayerKind::UpSample(params) => pooling::run_upsample(ctx, inputs[0], output, params),
            LayerKind::Elementwise(params) => merge::run_elementwise(ctx, inputs, output, *params),
            LayerKind::Concat(axis) => merge::run_concat(ctx, inputs, output, *axis),
            LayerKind::Rnn(rnn) => rnn.run(ctx, inputs[0], output),
        }
    }
}

/// Everything a layer may touch while it runs.
pub(crate) struct RunContext<'m> {
    pub tensors: &'m [TensorSlot],
    pub arena: &'m mut Arena,
    pub scratch: &'m mut [i32],
    pub input: &'m [i8],
    pub output: &'m mut [i8],
    pub dense_kernel: DenseKernel,
}

impl RunContext<'_> {
    pub fn slot(&self, id: TensorId) -> NanoResult<TensorSlot> {
        self.tensors
            .get(id.0)
            .copied()
            .ok_or(NanoError::InvalidArgument("unknown tensor"))
    }
}

/// Input and output of a one-input layer, borrowed together.
pub(crate) struct Unary<'c> {
    pub input: &'c [i8],
    pub in_shape: Shape,
    pub output: &'c mut [i8],
    pub out_shape: Shape,
}

pub(crate) fn unary<'c>(
    tensors: &[TensorSlot],
    arena: &'c mut Arena,
    input: TensorId,
    output: TensorId,
) -> NanoResult<Unary<'c>> {
    let lookup = |id: TensorId| tensors.get(id.0).copied().ok_or(NanoError::InvalidArgument("unknown tensor"));
    let (src, dst) = (lookup(input)?, lookup(output)?);
    let (inputs, out) = arena.split(dst.region)?;
    Ok(Unary {
        input: inputs.get(src.region)?,
        in_shape: src.desc.shape,
        output: out,
        out_shape: dst.desc.shape,
    })
}
