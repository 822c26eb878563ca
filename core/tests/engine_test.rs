//! Engine tests: building, memory planning, running and statistics.

use nano_infer_core::*;

static ID3_W: [i8; 9] = [1, 0, 0, 0, 1, 0, 0, 0, 1];
static ZERO3: [i8; 3] = [0; 3];
static ID2_W: [i8; 4] = [1, 0, 0, 1];
static ZERO2: [i8; 2] = [0; 2];
static SUM2_W: [i8; 2] = [1, 1];
static ZERO1: [i8; 1] = [0];
static FC8_W: [i8; 64] = [0; 64];
static ZERO8: [i8; 8] = [0; 8];
static ONES9: [i8; 9] = [1; 9];

fn identity_model(config: EngineConfig) -> Model {
    let mut b = ModelBuilder::with_config(config);
    let x = b.input(Shape::vector(3), QFormat::default()).unwrap();
    let x = b.dense(x, DenseParams::new(3), Weights::new(&ID3_W, &ZERO3)).unwrap();
    b.build(x).unwrap()
}

fn dense_chain(config: EngineConfig) -> NanoResult<Model> {
    let mut b = ModelBuilder::with_config(config);
    let mut x = b.input(Shape::vector(8), QFormat::default())?;
    for _ in 0..3 {
        x = b.dense(x, DenseParams::new(8), Weights::new(&FC8_W, &ZERO8))?;
    }
    b.build(x)
}

// =============================================================================
// Running
// =============================================================================

#[test]
fn test_identity_dense_both_kernels() {
    for kernel in [DenseKernel::Basic, DenseKernel::Unrolled] {
        let mut model = identity_model(EngineConfig::default().with_dense_kernel(kernel));
        model.set_input(&[7, -3, 100]).unwrap();
        model.run(&ManualClock::new(0)).unwrap();
        assert_eq!(model.output(), &[7, -3, 100], "{:?}", kernel);
    }
}

#[test]
fn test_relu_in_place_on_input() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(3), QFormat::default()).unwrap();
    let y = b.relu(x).unwrap();
    let mut model = b.build(y).unwrap();
    model.set_input(&[-5, 0, 5]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[0, 0, 5]);
    // two tensors, one block
    assert_eq!(model.arena_size(), 3);
}

#[test]
fn test_failing_layer_stops_the_run() {
    static DW: [i8; 3] = [1, 1, 1];
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::new(1, 1, 3), QFormat::default()).unwrap();
    let x = b.depthwise_conv2d(x, ConvParams::new(3, (1, 1)), Weights::new(&DW, &ZERO3)).unwrap();
    let mut model = b.build(x).unwrap();
    model.set_input(&[1, 2, 3]).unwrap();

    let result = model.run(&ManualClock::new(1));
    assert_eq!(Status::from_result(&result), Status::ArgumentError);
    assert_eq!(model.output(), &[0, 0, 0]);

    let runs: Vec<u32> = model.layers().iter().map(|l| l.stats().runs).collect();
    assert_eq!(runs, [1, 1, 0]);
}

#[test]
fn test_concat_keeps_input_order() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(2), QFormat::default()).unwrap();
    let a = b.dense(x, DenseParams::new(2), Weights::new(&ID2_W, &ZERO2)).unwrap();
    let s = b.dense(x, DenseParams::new(1), Weights::new(&SUM2_W, &ZERO1)).unwrap();
    let y = b.concat(&[s, a], ConcatAxis::Channel).unwrap();
    assert_eq!(b.desc(y).unwrap().shape, Shape::new(1, 1, 3));
    let mut model = b.build(y).unwrap();

    model.set_input(&[1, 2]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[3, 1, 2]);
}

#[test]
fn test_elementwise_fan_in() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(2), QFormat::default()).unwrap();
    assert!(b.add(&[x], 0).is_err());
    let y = b.add(&[x, x, x], 0).unwrap();
    let mut model = b.build(y).unwrap();

    model.set_input(&[1, 2]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[3, 6]);
    // two pairwise steps over two elements
    assert_eq!(model.total_ops(), 4);
}

#[test]
fn test_elementwise_rejects_mixed_shapes() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(2), QFormat::default()).unwrap();
    let s = b.dense(x, DenseParams::new(1), Weights::new(&SUM2_W, &ZERO1)).unwrap();
    assert!(matches!(b.mult(&[x, s], 0), Err(NanoError::InvalidArgument(_))));
}

// =============================================================================
// Recurrent
// =============================================================================

/// Running sum of the single input feature.
struct Accumulate;

impl RnnCell for Accumulate {
    fn units(&self) -> usize {
        1
    }

    fn step(&mut self, input: &[i8], state: &mut [i8], output: &mut [i8]) -> NanoResult<()> {
        state[0] = state[0].saturating_add(input[0]);
        output[0] = state[0];
        Ok(())
    }
}

fn rnn_model(params: RnnParams) -> Model {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::sequence(3, 1), QFormat::default()).unwrap();
    let rnn = RnnLayer::new(params, Box::new(Accumulate)).unwrap();
    let y = b.rnn(x, rnn).unwrap();
    b.build(y).unwrap()
}

#[test]
fn test_rnn_sequence_and_last_step() {
    let mut model = rnn_model(RnnParams::new(1).return_sequence(true));
    model.set_input(&[1, 2, 3]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[1, 3, 6]);

    let mut model = rnn_model(RnnParams::new(1));
    model.set_input(&[1, 2, 3]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[6]);
    // stateless: the second run starts from zero again
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[6]);
}

#[test]
fn test_rnn_stateful_carries_over() {
    let mut model = rnn_model(RnnParams::new(1).stateful(true));
    model.set_input(&[1, 2, 3]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[12]);

    model.reset_state();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[6]);
}

#[test]
fn test_rnn_rejects_mismatched_units() {
    assert!(RnnLayer::new(RnnParams::new(4), Box::new(Accumulate)).is_err());
}

// =============================================================================
// Pooling Formats
// =============================================================================

#[test]
fn test_sum_pool_records_dynamic_shift() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::new(2, 2, 1), QFormat::q7(4)).unwrap();
    let y = b.sum_pool(x, PoolParams::new((2, 2))).unwrap();
    let mut model = b.build(y).unwrap();

    let pool = &model.layers()[1];
    assert_eq!(pool.name(), "SumPool");
    assert_eq!(pool.dynamic_shift(), None);

    model.set_input(&[100; 4]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[50]);
    assert_eq!(model.layers()[1].dynamic_shift(), Some(3));
    assert_eq!(model.output_format(), QFormat::q7(4).shifted(3));
}

#[test]
fn test_same_padding_conv() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::new(5, 5, 1), QFormat::default()).unwrap();
    let params = ConvParams::new(1, (3, 3)).stride(2, 2).padding(Padding::Same);
    let y = b.conv2d(x, params, Weights::new(&ONES9, &ZERO1)).unwrap();
    assert_eq!(b.desc(y).unwrap().shape, Shape::new(3, 3, 1));
    let mut model = b.build(y).unwrap();

    model.set_input(&[1; 25]).unwrap();
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.output(), &[4, 6, 4, 6, 9, 6, 4, 6, 4]);
}

// =============================================================================
// Memory Planning
// =============================================================================

#[test]
fn test_dense_chain_reuses_blocks() {
    let model = dense_chain(EngineConfig::default()).unwrap();
    // four 8-byte tensors, at most two live at once
    assert_eq!(model.arena_size(), 16);
}

#[test]
fn test_memory_limit_fails_the_build() {
    let err = dense_chain(EngineConfig::default().with_memory_limit(12)).err();
    assert_eq!(err, Some(NanoError::ArenaExhausted { requested: 8, remaining: 4 }));
    assert!(dense_chain(EngineConfig::default().with_memory_limit(16)).is_ok());
}

#[test]
fn test_in_place_layer_retires_its_input() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(3), QFormat::default()).unwrap();
    let y = b.relu(x).unwrap();
    assert_eq!(
        b.dense(x, DenseParams::new(3), Weights::new(&ID3_W, &ZERO3)).err(),
        Some(NanoError::InvalidArgument("tensor was overwritten by an in-place layer"))
    );
    // flatten aliases without rewriting, so both ids stay readable
    let f = b.flatten(y).unwrap();
    assert!(b.desc(y).is_ok());
    assert!(b.dense(y, DenseParams::new(3), Weights::new(&ID3_W, &ZERO3)).is_ok());
    assert!(b.dense(f, DenseParams::new(3), Weights::new(&ID3_W, &ZERO3)).is_ok());
}

#[test]
fn test_build_needs_input() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(2), QFormat::default()).unwrap();
    assert!(b.input(Shape::vector(2), QFormat::default()).is_err());
    assert!(ModelBuilder::new().input(Shape::vector(0), QFormat::default()).is_err());
    assert!(b.build(x).is_ok());
}

// =============================================================================
// Statistics
// =============================================================================

#[test]
fn test_stats_with_manual_clock() {
    let mut model = identity_model(EngineConfig::default().with_trace(true));
    model.set_input(&[1, 2, 3]).unwrap();
    model.run(&ManualClock::new(1)).unwrap();

    let stats = model.stats();
    assert_eq!(stats.layers.len(), 3);
    assert!(stats.layers.iter().all(|l| l.time_us == 1));
    assert_eq!(stats.total_macs(), 9);
    assert_eq!(stats.total_time_us(), 3);
    assert_eq!(stats.efficiency(), Some(3.0));
    assert!(model.last_run_us() > 0);

    let text = stats.to_string();
    assert!(text.starts_with("Layer(#)"));
    assert!(text.contains("Dense"));
    assert!(text.contains("Total ops (MAC): 9 (9)"));
    assert!(text.contains("Efficiency: 3.00 ops/us"));
}

#[test]
fn test_stats_without_time() {
    let mut model = identity_model(EngineConfig::default());
    model.run(&ManualClock::new(0)).unwrap();
    assert_eq!(model.stats().efficiency(), None);
    assert!(model.stats().to_string().contains("Efficiency: n/a ops/us"));
}

#[test]
fn test_macs_scaling() {
    assert_eq!(Macs(9_999).to_string(), "9999");
    assert_eq!(Macs(12_346).to_string(), "12.35k");
    assert_eq!(Macs(2_500_000).to_string(), "2.50M");
    assert_eq!(Macs(3_000_000_000).to_string(), "3.00G");
}

#[test]
fn test_predict_top_class() {
    let mut model = identity_model(EngineConfig::default());
    model.set_input(&[10, 30, 20]).unwrap();
    let (label, prob) = model.predict(&ManualClock::new(0)).unwrap();
    assert_eq!(label, 1);
    assert!((prob - 0.5).abs() < 1e-6);

    model.set_input(&[-1, -2, -3]).unwrap();
    assert_eq!(model.predict(&ManualClock::new(0)).unwrap(), (0, 0.0));
}

// =============================================================================
// Configuration
// =============================================================================

#[cfg(feature = "serde")]
#[test]
fn test_engine_config_serde() {
    let config = EngineConfig::default().with_dense_kernel(DenseKernel::Basic).with_memory_limit(1024);
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(json, r#"{"dense_kernel":"basic","memory_limit":1024,"trace_layers":false}"#);
    assert_eq!(serde_json::from_str::<EngineConfig>(&json).unwrap(), config);
    assert_eq!(serde_json::from_str::<EngineConfig>("{}").unwrap(), EngineConfig::default());
}
