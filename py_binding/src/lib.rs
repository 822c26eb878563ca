//! Python bindings for nano-infer-core via PyO3.
//!
//! Weight arrays passed from Python are leaked into `'static` slices so they
//! live as long as the process, the same way flash-resident weights do on a
//! device.

use std::collections::HashMap;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use nano_infer_core::{
    Activation, ConcatAxis, ConvParams, DenseKernel, DenseParams, ElementwiseOp, ElementwiseParams, EngineConfig,
    Model, ModelBuilder, NanoError, Padding, PoolParams, Prediction, QFormat, Shape, StdClock, TensorId,
    UpSampleParams, Weights,
};

fn to_py_err(e: NanoError) -> PyErr {
    PyValueError::new_err(format!("{} ({})", e, e.status()))
}

fn leak(data: Vec<i8>) -> &'static [i8] {
    Box::leak(data.into_boxed_slice())
}

fn shape_from(dims: &[usize]) -> PyResult<Shape> {
    match *dims {
        [n] => Ok(Shape::vector(n)),
        [t, f] => Ok(Shape::sequence(t, f)),
        [h, w, c] => Ok(Shape::new(h, w, c)),
        _ => Err(PyValueError::new_err("shape must have 1-3 dimensions")),
    }
}

fn padding_from(mode: &str, pad: Option<(usize, usize)>) -> PyResult<Padding> {
    if let Some((y, x)) = pad {
        return Ok(Padding::Explicit { x, y });
    }
    match mode {
        "valid" => Ok(Padding::Valid),
        "same" => Ok(Padding::Same),
        other => Err(PyValueError::new_err(format!("unknown padding mode '{}'", other))),
    }
}

fn dense_kernel_from(name: &str) -> PyResult<DenseKernel> {
    match name {
        "basic" => Ok(DenseKernel::Basic),
        "unrolled" => Ok(DenseKernel::Unrolled),
        other => Err(PyValueError::new_err(format!("unknown dense kernel '{}'", other))),
    }
}

/// Incremental graph builder. Every `add_*` returns the integer id of the
/// produced tensor.
#[pyclass]
pub struct PyModelBuilder {
    inner: Option<ModelBuilder>,
    ids: Vec<TensorId>,
}

impl PyModelBuilder {
    fn builder(&mut self) -> PyResult<&mut ModelBuilder> {
        self.inner
            .as_mut()
            .ok_or_else(|| PyValueError::new_err("builder already compiled"))
    }

    fn id(&self, index: usize) -> PyResult<TensorId> {
        self.ids
            .get(index)
            .copied()
            .ok_or_else(|| PyValueError::new_err(format!("unknown tensor id {}", index)))
    }

    fn record(&mut self, result: Result<TensorId, NanoError>) -> PyResult<usize> {
        let id = result.map_err(to_py_err)?;
        self.ids.push(id);
        Ok(self.ids.len() - 1)
    }

    fn unary<F>(&mut self, input: usize, f: F) -> PyResult<usize>
    where
        F: FnOnce(&mut ModelBuilder, TensorId) -> Result<TensorId, NanoError>,
    {
        let x = self.id(input)?;
        let result = f(self.builder()?, x);
        self.record(result)
    }

    fn fan_in<F>(&mut self, inputs: Vec<usize>, f: F) -> PyResult<usize>
    where
        F: FnOnce(&mut ModelBuilder, &[TensorId]) -> Result<TensorId, NanoError>,
    {
        let ids = inputs.into_iter().map(|i| self.id(i)).collect::<PyResult<Vec<_>>>()?;
        let result = f(self.builder()?, &ids);
        self.record(result)
    }
}

#[pymethods]
impl PyModelBuilder {
    #[new]
    #[pyo3(signature = (dense_kernel="unrolled", memory_limit=None, trace=false))]
    fn new(dense_kernel: &str, memory_limit: Option<usize>, trace: bool) -> PyResult<Self> {
        let mut config = EngineConfig::default()
            .with_dense_kernel(dense_kernel_from(dense_kernel)?)
            .with_trace(trace);
        if let Some(limit) = memory_limit {
            config = config.with_memory_limit(limit);
        }
        Ok(Self { inner: Some(ModelBuilder::with_config(config)), ids: Vec::new() })
    }

    #[pyo3(signature = (shape, frac_bits=7))]
    fn input(&mut self, shape: Vec<usize>, frac_bits: i8) -> PyResult<usize> {
        let shape = shape_from(&shape)?;
        let result = self.builder()?.input(shape, QFormat::q7(frac_bits));
        self.record(result)
    }

    #[pyo3(signature = (
        input, kernel, bias, filters, kernel_size,
        stride=(1, 1), padding="valid", pad=None, bias_shift=0, output_shift=0, frac_bits=7
    ))]
    #[allow(clippy::too_many_arguments)]
    fn add_conv2d(
        &mut self,
        input: usize,
        kernel: Vec<i8>,
        bias: Vec<i8>,
        filters: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: &str,
        pad: Option<(usize, usize)>,
        bias_shift: u32,
        output_shift: u32,
        frac_bits: i8,
    ) -> PyResult<usize> {
        let params = ConvParams::new(filters, kernel_size)
            .stride(stride.0, stride.1)
            .padding(padding_from(padding, pad)?)
            .shifts(bias_shift, output_shift)
            .output_format(QFormat::q7(frac_bits));
        let weights = Weights::new(leak(kernel), leak(bias));
        self.unary(input, |b, x| b.conv2d(x, params, weights))
    }

    #[pyo3(signature = (
        input, kernel, bias, filters, kernel_size,
        stride=(1, 1), padding="valid", pad=None, bias_shift=0, output_shift=0, frac_bits=7
    ))]
    #[allow(clippy::too_many_arguments)]
    fn add_depthwise_conv2d(
        &mut self,
        input: usize,
        kernel: Vec<i8>,
        bias: Vec<i8>,
        filters: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: &str,
        pad: Option<(usize, usize)>,
        bias_shift: u32,
        output_shift: u32,
        frac_bits: i8,
    ) -> PyResult<usize> {
        let params = ConvParams::new(filters, kernel_size)
            .stride(stride.0, stride.1)
            .padding(padding_from(padding, pad)?)
            .shifts(bias_shift, output_shift)
            .output_format(QFormat::q7(frac_bits));
        let weights = Weights::new(leak(kernel), leak(bias));
        self.unary(input, |b, x| b.depthwise_conv2d(x, params, weights))
    }

    #[pyo3(signature = (input, weights, bias, bias_shift=0, output_shift=0, frac_bits=7))]
    fn add_dense(
        &mut self,
        input: usize,
        weights: Vec<i8>,
        bias: Vec<i8>,
        bias_shift: u32,
        output_shift: u32,
        frac_bits: i8,
    ) -> PyResult<usize> {
        let params = DenseParams::new(bias.len())
            .shifts(bias_shift, output_shift)
            .output_format(QFormat::q7(frac_bits));
        let weights = Weights::new(leak(weights), leak(bias));
        self.unary(input, |b, x| b.dense(x, params, weights))
    }

    fn add_flatten(&mut self, input: usize) -> PyResult<usize> {
        self.unary(input, |b, x| b.flatten(x))
    }

    fn add_relu(&mut self, input: usize) -> PyResult<usize> {
        self.unary(input, |b, x| b.activation(x, Activation::Relu))
    }

    fn add_sigmoid(&mut self, input: usize) -> PyResult<usize> {
        self.unary(input, |b, x| b.activation(x, Activation::Sigmoid))
    }

    fn add_tanh(&mut self, input: usize) -> PyResult<usize> {
        self.unary(input, |b, x| b.activation(x, Activation::Tanh))
    }

    fn add_softmax(&mut self, input: usize) -> PyResult<usize> {
        self.unary(input, |b, x| b.softmax(x))
    }

    #[pyo3(signature = (input, kernel, stride=None, padding="valid", pad=None))]
    fn add_max_pool(
        &mut self,
        input: usize,
        kernel: (usize, usize),
        stride: Option<(usize, usize)>,
        padding: &str,
        pad: Option<(usize, usize)>,
    ) -> PyResult<usize> {
        let params = pool_params(kernel, stride, padding, pad)?;
        self.unary(input, |b, x| b.max_pool(x, params))
    }

    #[pyo3(signature = (input, kernel, stride=None, padding="valid", pad=None))]
    fn add_avg_pool(
        &mut self,
        input: usize,
        kernel: (usize, usize),
        stride: Option<(usize, usize)>,
        padding: &str,
        pad: Option<(usize, usize)>,
    ) -> PyResult<usize> {
        let params = pool_params(kernel, stride, padding, pad)?;
        self.unary(input, |b, x| b.avg_pool(x, params))
    }

    #[pyo3(signature = (input, kernel, stride=None, padding="valid", pad=None))]
    fn add_sum_pool(
        &mut self,
        input: usize,
        kernel: (usize, usize),
        stride: Option<(usize, usize)>,
        padding: &str,
        pad: Option<(usize, usize)>,
    ) -> PyResult<usize> {
        let params = pool_params(kernel, stride, padding, pad)?;
        self.unary(input, |b, x| b.sum_pool(x, params))
    }

    fn add_upsample(&mut self, input: usize, kernel: (usize, usize)) -> PyResult<usize> {
        self.unary(input, |b, x| b.upsample(x, UpSampleParams::new(kernel)))
    }

    #[pyo3(signature = (inputs, op="add", shift=0, frac_bits=7))]
    fn add_elementwise(&mut self, inputs: Vec<usize>, op: &str, shift: u32, frac_bits: i8) -> PyResult<usize> {
        let op = match op {
            "add" => ElementwiseOp::Add,
            "sub" => ElementwiseOp::Sub,
            "mult" => ElementwiseOp::Mult,
            other => return Err(PyValueError::new_err(format!("unknown elementwise op '{}'", other))),
        };
        let params = ElementwiseParams::new(op).shift(shift).output_format(QFormat::q7(frac_bits));
        self.fan_in(inputs, |b, ids| b.elementwise(ids, params))
    }

    #[pyo3(signature = (inputs, axis=-1))]
    fn add_concat(&mut self, inputs: Vec<usize>, axis: isize) -> PyResult<usize> {
        let axis = ConcatAxis::from_index(axis).map_err(to_py_err)?;
        self.fan_in(inputs, |b, ids| b.concat(ids, axis))
    }

    /// Shape of a tensor as `[h, w, c]`.
    fn shape_of(&self, id: usize) -> PyResult<Vec<usize>> {
        let x = self.id(id)?;
        let builder = self
            .inner
            .as_ref()
            .ok_or_else(|| PyValueError::new_err("builder already compiled"))?;
        let desc = builder.desc(x).map_err(to_py_err)?;
        Ok(desc.shape.dims[..3].to_vec())
    }

    /// Plan memory with `output` as the model output. The builder cannot be
    /// used afterwards.
    fn compile(&mut self, output: usize) -> PyResult<PyModel> {
        let out = self.id(output)?;
        let builder = self
            .inner
            .take()
            .ok_or_else(|| PyValueError::new_err("builder already compiled"))?;
        let model = builder.build(out).map_err(to_py_err)?;
        Ok(PyModel { model, clock: StdClock::new() })
    }
}

fn pool_params(
    kernel: (usize, usize),
    stride: Option<(usize, usize)>,
    padding: &str,
    pad: Option<(usize, usize)>,
) -> PyResult<PoolParams> {
    let mut params = PoolParams::new(kernel).padding(padding_from(padding, pad)?);
    if let Some((h, w)) = stride {
        params = params.stride(h, w);
    }
    Ok(params)
}

/// A compiled model with its own arena.
#[pyclass]
pub struct PyModel {
    model: Model,
    clock: StdClock,
}

#[pymethods]
impl PyModel {
    /// Run one inference and return the output tensor.
    fn run(&mut self, input: Vec<i8>) -> PyResult<Vec<i8>> {
        self.model.set_input(&input).map_err(to_py_err)?;
        self.model.run(&self.clock).map_err(to_py_err)?;
        Ok(self.model.output().to_vec())
    }

    /// Top-1 class and its share of the output mass.
    fn predict(&mut self, input: Vec<i8>) -> PyResult<(usize, f32)> {
        self.model.set_input(&input).map_err(to_py_err)?;
        self.model.predict(&self.clock).map_err(to_py_err)
    }

    /// Per-layer statistics of the last run as text.
    fn stats(&self) -> String {
        self.model.stats().to_string()
    }

    fn reset_state(&mut self) {
        self.model.reset_state();
    }

    fn layer_names(&self) -> Vec<String> {
        self.model.layers().iter().map(|l| l.name().to_string()).collect()
    }

    fn output_shape(&self) -> Vec<usize> {
        self.model.output_desc().shape.dims[..3].to_vec()
    }

    /// Fractional bits of the output after the last run.
    fn output_frac_bits(&self) -> i8 {
        self.model.output_format().frac_bits
    }

    fn arena_size(&self) -> usize {
        self.model.arena_size()
    }

    fn total_ops(&self) -> u64 {
        self.model.total_ops()
    }

    /// Score the model on labelled samples. Returns the report figures as
    /// strings, plus the full text under `"summary"`.
    #[pyo3(signature = (samples, labels, top_k=4, label_count=None))]
    fn evaluate(
        &mut self,
        samples: Vec<Vec<i8>>,
        labels: Vec<usize>,
        top_k: usize,
        label_count: Option<usize>,
    ) -> PyResult<HashMap<String, String>> {
        if samples.len() != labels.len() {
            return Err(PyValueError::new_err("samples and labels differ in length"));
        }
        let label_count = label_count.unwrap_or(self.model.output().len());
        let mut session = Prediction::new(&mut self.model, &self.clock, label_count, top_k).map_err(to_py_err)?;
        for (sample, &label) in samples.iter().zip(&labels) {
            session.run_sample(sample, label).map_err(to_py_err)?;
        }
        session.finish();
        let report = session.report();

        let opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |x| format!("{:.2}", x));
        let mut out = HashMap::new();
        out.insert("frames".to_string(), report.frames.to_string());
        out.insert("total_time_us".to_string(), report.total_time_us.to_string());
        out.insert("run_time_us".to_string(), report.run_time_us.to_string());
        out.insert("average_latency_us".to_string(), opt(report.average_latency_us()));
        out.insert("efficiency".to_string(), opt(report.efficiency()));
        out.insert("frame_rate_hz".to_string(), opt(report.frame_rate_hz()));
        for k in 1..=report.top_k.len() {
            out.insert(format!("top_{}", k), opt(report.top_k_accuracy(k)));
        }
        out.insert("summary".to_string(), report.to_string());
        Ok(out)
    }
}

#[pymodule]
fn nano_infer_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyModelBuilder>()?;
    m.add_class::<PyModel>()?;
    Ok(())
}
