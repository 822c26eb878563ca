//! General-purpose integration tests.
//!
//! Shapes and formats, arena planning, activation range checks and a small
//! conv -> relu -> flatten -> dense model end to end.

use nano_infer_core::*;

// =============================================================================
// Shape Tests
// =============================================================================

#[test]
fn test_shape_creation_and_size() {
    let s = Shape::new(28, 28, 3);
    assert_eq!(s.size(), 2352);
    assert_eq!(s.height(), 28);
    assert_eq!(s.width(), 28);
    assert_eq!(s.channels(), 3);
    assert_eq!(s.row_size(), 84);

    let v = Shape::vector(10);
    assert_eq!(v.dims, [1, 1, 10, 1]);
    assert_eq!(v.size(), 10);

    let seq = Shape::sequence(5, 4);
    assert_eq!((seq.height(), seq.width(), seq.channels()), (1, 5, 4));

    assert_eq!(Shape::new(2, 2, 2).with_reserved(3).size(), 24);
    assert_eq!(Shape::new(4, 0, 3).size(), 0);
}

// =============================================================================
// Q-Format Tests
// =============================================================================

#[test]
fn test_qformat_conversion() {
    let q = QFormat::q7(4);
    assert_eq!(q.int_bits, 3);
    assert_eq!(q.to_f32(16), 1.0);
    assert_eq!(q.from_f32(1.0), 16);
    assert_eq!(q.from_f32(-0.5), -8);
    // saturates instead of wrapping
    assert_eq!(q.from_f32(100.0), 127);
    assert_eq!(q.from_f32(-100.0), -128);
    assert_eq!(QFormat::default(), QFormat::unit());
}

#[test]
fn test_qformat_shift_derivation() {
    let input = QFormat::q7(7);
    let weight = QFormat::q7(6);
    assert_eq!(QFormat::bias_shift(input, weight, QFormat::q7(7)).unwrap(), 6);
    assert_eq!(QFormat::output_shift(input, weight, QFormat::q7(5)).unwrap(), 8);
    assert!(matches!(
        QFormat::output_shift(QFormat::q7(0), QFormat::q7(0), QFormat::q7(7)),
        Err(NanoError::InvalidArgument(_))
    ));
    assert_eq!(QFormat::q7(7).shifted(3), QFormat::new(3, 4));
}

// =============================================================================
// Arena Tests
// =============================================================================

#[test]
fn test_planner_first_fit_reuses_released_hole() {
    let mut p = ArenaPlanner::new(None);
    let a = p.allocate(16).unwrap();
    let b = p.allocate(8).unwrap();
    assert_eq!((a.offset, b.offset), (0, 16));

    p.release(a);
    let c = p.allocate(10).unwrap();
    assert_eq!(c.offset, 0);
    // 6 bytes left at the front are too few; goes after b
    let d = p.allocate(10).unwrap();
    assert_eq!(d.offset, 24);
    assert_eq!(p.size(), 34);
}

#[test]
fn test_planner_zero_length_takes_no_space() {
    let mut p = ArenaPlanner::new(None);
    let z = p.allocate(0).unwrap();
    assert_eq!(z.len, 0);
    assert_eq!(p.size(), 0);
}

#[test]
fn test_planner_limit_returns_error() {
    let mut p = ArenaPlanner::new(Some(20));
    p.allocate(16).unwrap();
    let err = p.allocate(8).unwrap_err();
    assert_eq!(err, NanoError::ArenaExhausted { requested: 8, remaining: 4 });
    assert_eq!(err.status(), Status::AllocationFailure);
}

#[test]
fn test_arena_split_views() {
    let mut arena = Arena::new(32).unwrap();
    arena.slice_mut(Region::new(0, 4)).unwrap().copy_from_slice(&[1, 2, 3, 4]);
    arena.slice_mut(Region::new(20, 2)).unwrap().copy_from_slice(&[9, 9]);

    let (inputs, out) = arena.split(Region::new(8, 8)).unwrap();
    assert_eq!(out.len(), 8);
    assert_eq!(inputs.get(Region::new(0, 4)).unwrap(), &[1, 2, 3, 4]);
    assert_eq!(inputs.get(Region::new(20, 2)).unwrap(), &[9, 9]);
    assert_eq!(inputs.get(Region::new(4, 8)), Err(NanoError::RegionOverlap));
}

#[test]
fn test_arena_out_of_bounds_region() {
    let mut arena = Arena::new(8).unwrap();
    assert!(matches!(
        arena.slice_mut(Region::new(4, 8)),
        Err(NanoError::BufferTooSmall { required: 12, available: 8 })
    ));
}

// =============================================================================
// Activation Function Tests
// =============================================================================

#[test]
fn test_relu_q7() {
    let mut data = [-5i8, -1, 0, 1, 5, 127, -128];
    kernels::activation::relu_q7(&mut data);
    assert_eq!(data, [0, 0, 0, 1, 5, 127, 0]);
}

#[test]
fn test_sigmoid_q7_range_and_monotonic() {
    let mut data: Vec<i8> = (-128..=127).map(|x| x as i8).collect();
    kernels::activation::sigmoid_q7(&mut data, 3);
    for &val in data.iter() {
        assert!(val >= 0, "sigmoid output {} < 0", val);
    }
    for i in 1..data.len() {
        assert!(data[i] >= data[i - 1], "sigmoid not monotonic at {}", i);
    }
}

#[test]
fn test_tanh_q7_range_and_monotonic() {
    let mut data: Vec<i8> = (-128..=127).map(|x| x as i8).collect();
    kernels::activation::tanh_q7(&mut data, 3);
    assert_eq!(data[128], 0);
    for i in 1..data.len() {
        assert!(data[i] >= data[i - 1], "tanh not monotonic at {}", i);
    }
}

#[test]
fn test_argmax_i8_first_maximum() {
    assert_eq!(argmax_i8(&[3, -1, 10, 5, 10]), Some(2));
    assert_eq!(argmax_i8(&[]), None);
}

// =============================================================================
// Status Tests
// =============================================================================

#[test]
fn test_status_mapping() {
    assert_eq!(Status::from_result(&Ok::<(), NanoError>(())), Status::Success);
    assert_eq!(NanoError::InvalidArgument("x").status(), Status::ArgumentError);
    assert_eq!(NanoError::RegionOverlap.status(), Status::ArgumentError);
    assert_eq!(NanoError::AllocationFailed.status(), Status::AllocationFailure);
    assert_eq!(NanoError::Unimplemented("op").status(), Status::Unimplemented);
    assert_eq!(Status::ArgumentError.to_string(), "argument error");
    assert!(!Status::Unimplemented.is_success());
}

// =============================================================================
// Model Tests
// =============================================================================

static CONV_W: [i8; 1] = [1];
static CONV_B: [i8; 1] = [0];
static FC_W: [i8; 4] = [1, 1, 1, 1];
static FC_B: [i8; 1] = [0];

#[test]
fn test_conv_relu_flatten_dense_model() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::new(2, 2, 1), QFormat::q7(0)).unwrap();
    let x = b.conv2d(x, ConvParams::new(1, (1, 1)), Weights::new(&CONV_W, &CONV_B)).unwrap();
    let x = b.relu(x).unwrap();
    let x = b.flatten(x).unwrap();
    assert_eq!(b.desc(x).unwrap().shape, Shape::vector(4));
    let x = b.dense(x, DenseParams::new(1), Weights::new(&FC_W, &FC_B)).unwrap();
    let mut model = b.build(x).unwrap();

    model.set_input(&[1, -2, 3, 4]).unwrap();
    model.run(&ManualClock::new(1)).unwrap();
    assert_eq!(model.output(), &[8]);

    let names: Vec<_> = model.layers().iter().map(|l| l.name()).collect();
    assert_eq!(names, ["Input", "Conv2D", "ReLU", "Flatten", "Dense", "Output"]);
    assert_eq!(model.total_ops(), 4 + 4);
}

#[test]
fn test_set_input_rejects_wrong_length() {
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(3), QFormat::default()).unwrap();
    let mut model = b.build(x).unwrap();
    assert_eq!(
        model.set_input(&[1, 2]),
        Err(NanoError::DimensionMismatch { expected: 3, actual: 2 })
    );
}

#[test]
fn test_weight_length_checked_at_build() {
    static W: [i8; 3] = [1, 2, 3];
    static B: [i8; 1] = [0];
    let mut b = ModelBuilder::new();
    let x = b.input(Shape::vector(4), QFormat::default()).unwrap();
    let err = b.dense(x, DenseParams::new(1), Weights::new(&W, &B)).err();
    assert_eq!(err, Some(NanoError::DimensionMismatch { expected: 4, actual: 3 }));
}
