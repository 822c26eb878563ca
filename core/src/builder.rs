//! Graph construction and memory planning.
//!
//! Layers are appended in execution order. Each `add_*` call checks shapes
//! and weight lengths, infers the output shape, and returns a [`TensorId`]
//! for the result. Fan-in layers take an ordered slice of ids.
//!
//! Storage is tracked per block. A block is one arena allocation shared by
//! every tensor that aliases it: activations rewrite their input block in
//! place and flatten reinterprets it. Rewriting a block bumps its generation,
//! and a tensor whose generation is behind its block's can no longer be read.
//!
//! [`ModelBuilder::build`] walks the layers once. At each layer it first
//! places the block the layer defines, then releases every block whose last
//! reader is that layer, so a layer's output never shares bytes with its
//! inputs.

use alloc::vec;
use alloc::vec::Vec;

use log::debug;

use crate::arena::{wide_scratch, Arena, ArenaPlanner, Region};
use crate::config::EngineConfig;
use crate::error::{NanoError, NanoResult};
use crate::kernels::concat::ConcatAxis;
use crate::kernels::elementwise::ElementwiseOp;
use crate::layers::io::flatten_shape;
use crate::layers::{
    Activation, ConvParams, DenseParams, ElementwiseParams, Layer, LayerKind, PoolParams, RnnLayer, TensorId,
    TensorSlot, UpSampleParams, Weights,
};
use crate::model::Model;
use crate::tensor::{QFormat, Shape, TensorDesc};

struct TensorInfo {
    desc: TensorDesc,
    block: usize,
    generation: u32,
}

struct Block {
    len: usize,
    defined_at: usize,
    last_use: usize,
    generation: u32,
}

#[derive(Default)]
pub struct ModelBuilder {
    config: EngineConfig,
    tensors: Vec<TensorInfo>,
    blocks: Vec<Block>,
    layers: Vec<Layer>,
    input: Option<TensorId>,
}

impl ModelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Declare the model input. Exactly one per model.
    pub fn input(&mut self, shape: Shape, format: QFormat) -> NanoResult<TensorId> {
        if self.input.is_some() {
            return Err(NanoError::InvalidArgument("model input already declared"));
        }
        if shape.size() == 0 {
            return Err(NanoError::InvalidArgument("model input is empty"));
        }
        let id = self.define(TensorDesc::new(shape, format));
        self.push(LayerKind::Input, &[], id, 0);
        self.input = Some(id);
        Ok(id)
    }

    pub fn desc(&self, id: TensorId) -> NanoResult<TensorDesc> {
        self.tensors
            .get(id.0)
            .map(|t| t.desc)
            .ok_or(NanoError::InvalidArgument("unknown tensor"))
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn conv2d(&mut self, input: TensorId, params: ConvParams, weights: Weights) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let (window, shape, macs) = params.plan(src.shape, &weights)?;
        let out = self.define(TensorDesc::new(shape, params.output_format));
        self.push(LayerKind::Conv2d { params, weights, window }, &[input], out, macs);
        Ok(out)
    }

    /// Depthwise convolution; `params.filters` is the output channel count.
    pub fn depthwise_conv2d(&mut self, input: TensorId, params: ConvParams, weights: Weights) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let (window, shape, multiplier, macs) = params.plan_depthwise(src.shape, &weights)?;
        let out = self.define(TensorDesc::new(shape, params.output_format));
        self.push(LayerKind::DepthwiseConv2d { params, weights, window, multiplier }, &[input], out, macs);
        Ok(out)
    }

    pub fn dense(&mut self, input: TensorId, params: DenseParams, weights: Weights) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let (shape, macs) = params.plan(src.shape, &weights)?;
        let out = self.define(TensorDesc::new(shape, params.output_format));
        self.push(LayerKind::Dense { params, weights }, &[input], out, macs);
        Ok(out)
    }

    /// Reinterpret as a vector. No data moves.
    pub fn flatten(&mut self, input: TensorId) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let out = self.alias(input, TensorDesc::new(flatten_shape(src.shape), src.format), false);
        self.push(LayerKind::Flatten, &[input], out, 0);
        Ok(out)
    }

    /// Apply `activation` in place. `input` cannot be read afterwards; use
    /// the returned id.
    pub fn activation(&mut self, input: TensorId, activation: Activation) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let out = self.alias(input, TensorDesc::new(src.shape, activation.output_format(src.format)), true);
        self.push(LayerKind::Activation { activation, input: src.format }, &[input], out, 0);
        Ok(out)
    }

    pub fn relu(&mut self, input: TensorId) -> NanoResult<TensorId> {
        self.activation(input, Activation::Relu)
    }

    pub fn sigmoid(&mut self, input: TensorId) -> NanoResult<TensorId> {
        self.activation(input, Activation::Sigmoid)
    }

    pub fn tanh(&mut self, input: TensorId) -> NanoResult<TensorId> {
        self.activation(input, Activation::Tanh)
    }

    pub fn softmax(&mut self, input: TensorId) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let out = self.define(TensorDesc::new(src.shape, QFormat::unit()));
        self.push(LayerKind::Softmax, &[input], out, 0);
        Ok(out)
    }

    pub fn max_pool(&mut self, input: TensorId, params: PoolParams) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let (window, shape) = params.plan(src.shape)?;
        let out = self.define(TensorDesc::new(shape, src.format));
        self.push(LayerKind::MaxPool(window), &[input], out, 0);
        Ok(out)
    }

    pub fn avg_pool(&mut self, input: TensorId, params: PoolParams) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let (window, shape) = params.plan(src.shape)?;
        let out = self.define(TensorDesc::new(shape, src.format));
        self.push(LayerKind::AvgPool(window), &[input], out, 0);
        Ok(out)
    }

    /// Sum pooling. The output format is only known after a run; see
    /// [`Layer::output_format`].
    pub fn sum_pool(&mut self, input: TensorId, params: PoolParams) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let (window, shape) = params.plan(src.shape)?;
        let out = self.define(TensorDesc::new(shape, src.format));
        self.push(LayerKind::SumPool(window), &[input], out, 0);
        Ok(out)
    }

    pub fn upsample(&mut self, input: TensorId, params: UpSampleParams) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let shape = params.plan(src.shape)?;
        let out = self.define(TensorDesc::new(shape, src.format));
        self.push(LayerKind::UpSample(params), &[input], out, 0);
        Ok(out)
    }

    /// Fold `inputs` left to right with `params.op`.
    pub fn elementwise(&mut self, inputs: &[TensorId], params: ElementwiseParams) -> NanoResult<TensorId> {
        let shapes = self.readable_shapes(inputs)?;
        let (shape, macs) = params.plan(&shapes)?;
        let out = self.define(TensorDesc::new(shape, params.output_format));
        self.push(LayerKind::Elementwise(params), inputs, out, macs);
        Ok(out)
    }

    pub fn add(&mut self, inputs: &[TensorId], shift: u32) -> NanoResult<TensorId> {
        self.merge(inputs, ElementwiseOp::Add, shift)
    }

    pub fn sub(&mut self, inputs: &[TensorId], shift: u32) -> NanoResult<TensorId> {
        self.merge(inputs, ElementwiseOp::Sub, shift)
    }

    pub fn mult(&mut self, inputs: &[TensorId], shift: u32) -> NanoResult<TensorId> {
        self.merge(inputs, ElementwiseOp::Mult, shift)
    }

    /// Concatenate along `axis`; the output takes the first input's format.
    pub fn concat(&mut self, inputs: &[TensorId], axis: ConcatAxis) -> NanoResult<TensorId> {
        let shapes = self.readable_shapes(inputs)?;
        let shape = axis.output_shape(&shapes)?;
        let format = self.readable(inputs[0])?.format;
        let out = self.define(TensorDesc::new(shape, format));
        self.push(LayerKind::Concat(axis), inputs, out, 0);
        Ok(out)
    }

    pub fn rnn(&mut self, input: TensorId, layer: RnnLayer) -> NanoResult<TensorId> {
        let src = self.readable(input)?;
        let shape = layer.plan(src.shape)?;
        let out = self.define(TensorDesc::new(shape, layer.params().output_format));
        self.push(LayerKind::Rnn(layer), &[input], out, 0);
        Ok(out)
    }

    /// Finish the graph with `output` as the model output and plan the arena.
    pub fn build(mut self, output: TensorId) -> NanoResult<Model> {
        let input = self.input.ok_or(NanoError::InvalidArgument("model input not declared"))?;
        let out_desc = self.readable(output)?;
        self.push(LayerKind::Output, &[output], output, 0);

        let mut planner = ArenaPlanner::new(self.config.memory_limit);
        let mut regions = vec![Region::default(); self.blocks.len()];
        for step in 0..self.layers.len() {
            for (b, block) in self.blocks.iter().enumerate() {
                if block.defined_at == step {
                    regions[b] = planner.allocate(block.len)?;
                }
            }
            for (b, block) in self.blocks.iter().enumerate() {
                if block.last_use == step {
                    planner.release(regions[b]);
                }
            }
        }

        let scratch_words = self
            .layers
            .iter()
            .filter(|l| matches!(l.kind, LayerKind::SumPool(_)))
            .filter_map(|l| self.tensors.get(l.output.0))
            .map(|t| t.desc.size())
            .max()
            .unwrap_or(0);

        debug!(
            "memory plan: {} layers, {} blocks, {} arena bytes, {} scratch words",
            self.layers.len(),
            self.blocks.len(),
            planner.size(),
            scratch_words
        );

        let slots = self
            .tensors
            .iter()
            .map(|t| TensorSlot { desc: t.desc, region: regions[t.block] })
            .collect();
        let in_desc = self.desc(input)?;
        Model::from_parts(
            self.layers,
            slots,
            Arena::new(planner.size())?,
            wide_scratch(scratch_words)?,
            in_desc,
            out_desc,
            output,
            self.config,
        )
    }

    fn merge(&mut self, inputs: &[TensorId], op: ElementwiseOp, shift: u32) -> NanoResult<TensorId> {
        self.elementwise(inputs, ElementwiseParams::new(op).shift(shift))
    }

    /// Descriptor of a tensor that still holds its data.
    fn readable(&self, id: TensorId) -> NanoResult<TensorDesc> {
        let t = self.tensors.get(id.0).ok_or(NanoError::InvalidArgument("unknown tensor"))?;
        if t.generation != self.blocks[t.block].generation {
            return Err(NanoError::InvalidArgument("tensor was overwritten by an in-place layer"));
        }
        Ok(t.desc)
    }

    fn readable_shapes(&self, ids: &[TensorId]) -> NanoResult<Vec<Shape>> {
        ids.iter().map(|&id| self.readable(id).map(|d| d.shape)).collect()
    }

    /// New tensor in a new block, defined by the next layer.
    fn define(&mut self, desc: TensorDesc) -> TensorId {
        let step = self.layers.len();
        self.blocks.push(Block { len: desc.size(), defined_at: step, last_use: step, generation: 0 });
        self.tensors.push(TensorInfo { desc, block: self.blocks.len() - 1, generation: 0 });
        TensorId(self.tensors.len() - 1)
    }

    /// New tensor sharing `source`'s block. `rewrite` marks the block as
    /// overwritten, retiring every older tensor on it.
    fn alias(&mut self, source: TensorId, desc: TensorDesc, rewrite: bool) -> TensorId {
        let block = self.tensors[source.0].block;
        if rewrite {
            self.blocks[block].generation += 1;
        }
        let generation = self.blocks[block].generation;
        self.tensors.push(TensorInfo { desc, block, generation });
        TensorId(self.tensors.len() - 1)
    }

    fn push(&mut self, kind: LayerKind, inputs: &[TensorId], output: TensorId, macs: u64) {
        let step = self.layers.len();
        for id in inputs.iter().chain(core::iter::once(&output)) {
            let block = self.tensors[id.0].block;
            let b = &mut self.blocks[block];
            b.last_use = b.last_use.max(step);
        }
        let format = self.tensors[output.0].desc.format;
        self.layers.push(Layer::new(kind, inputs.to_vec(), output, format, macs));
    }
}
