//! Run-time engine configuration.
//!
//! The numeric rounding policy is not here: it is the build-time `truncate`
//! feature, see [`crate::math::ROUNDING`].

/// Which fully-connected kernel dense layers dispatch to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DenseKernel {
    Basic,
    #[default]
    Unrolled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    pub dense_kernel: DenseKernel,
    /// Cap on the planned arena, in bytes. Plans that exceed it fail to build.
    pub memory_limit: Option<usize>,
    /// Log every executed layer at debug level.
    pub trace_layers: bool,
}

impl EngineConfig {
    pub fn with_dense_kernel(mut self, kernel: DenseKernel) -> Self {
        self.dense_kernel = kernel;
        self
    }

    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    pub fn with_trace(mut self, on: bool) -> Self {
        self.trace_layers = on;
        self
    }
}
