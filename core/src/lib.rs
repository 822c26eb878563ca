//! # nano-infer-core: int8 inference engine for microcontrollers
//!
//! A `no_std` library that runs pre-quantized layer graphs over Q7 (`i8`)
//! tensors with `i32` accumulators, with deterministic memory use.
//!
//! ## Architecture
//!
//! - **Fixed-point primitives** (`math`): saturation, rounding shifts,
//!   dynamic requantization. Rounding vs truncation is one build-time switch.
//! - **Kernels** (`kernels`): conv, depthwise conv, pooling, dense,
//!   elementwise, activations, concat over plain HWC slices.
//! - **Layer graph** (`layers`, `builder`): tagged layer kinds, tensor
//!   handles, fan-in by ordered input lists, liveness-planned arena.
//! - **Engine** (`model`): runs layers in build order, records time and MACs,
//!   stops at the first failing layer.
//! - **Harness** (`predict`): confusion matrix, top-k ranking, throughput.
//!
//! ## Usage
//!
//! ```ignore
//! use nano_infer_core::*;
//!
//! let mut b = ModelBuilder::new();
//! let x = b.input(Shape::new(28, 28, 1), QFormat::q7(7))?;
//! let x = b.conv2d(x, ConvParams::new(8, (3, 3)).shifts(0, 7), Weights::new(CONV_W, CONV_B))?;
//! let x = b.relu(x)?;
//! let x = b.max_pool(x, PoolParams::new((2, 2)))?;
//! let x = b.flatten(x)?;
//! let x = b.dense(x, DenseParams::new(10).shifts(0, 7), Weights::new(FC_W, FC_B))?;
//! let x = b.softmax(x)?;
//! let mut model = b.build(x)?;
//!
//! model.set_input(&image)?;
//! let (class, prob) = model.predict(&StdClock::new())?;
//! ```

// Compiles for bare-metal MCU targets.
#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod arena;
pub mod builder;
pub mod clock;
pub mod config;
pub mod error;
pub mod kernels;
pub mod layers;
pub mod math;
pub mod model;
pub mod predict;
pub mod stats;
pub mod tensor;

pub use arena::{Arena, ArenaPlanner, Region};
pub use builder::ModelBuilder;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use clock::{Clock, ManualClock};
pub use config::{DenseKernel, EngineConfig};
pub use error::{NanoError, NanoResult, Status};
pub use kernels::concat::ConcatAxis;
pub use kernels::elementwise::ElementwiseOp;
pub use kernels::{Shifts, Window};
pub use layers::{
    Activation, ConvParams, DenseParams, ElementwiseParams, Layer, LayerKind, LayerStats, Padding, PoolParams,
    RnnCell, RnnLayer, RnnParams, TensorId, UpSampleParams, Weights,
};
pub use math::argmax_i8;
pub use model::Model;
pub use predict::{rank_of, Prediction, PredictionReport};
pub use stats::{LayerReport, Macs, ModelStats};
pub use tensor::{QFormat, Shape, TensorDesc};
