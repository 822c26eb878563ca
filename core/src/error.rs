//! Error types for the nano-infer-core library.
//!
//! Every kernel, layer and engine entry point returns `NanoResult<T>` instead
//! of panicking: on a microcontroller a panic halts the device. Errors are
//! small `Copy` values so they can be propagated from deep inside a kernel up
//! through the engine without allocation.

use core::fmt;

/// All error conditions reported by the library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NanoError {
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("buffer too small: {required} required, {available} available")]
    BufferTooSmall { required: usize, available: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Two regions that must be disjoint for one layer share bytes.
    #[error("input and output regions overlap")]
    RegionOverlap,

    #[error("arena exhausted: {requested} bytes requested, {remaining} remaining")]
    ArenaExhausted { requested: usize, remaining: usize },

    #[error("allocation failed")]
    AllocationFailed,

    #[error("operator not implemented: {0}")]
    Unimplemented(&'static str),
}

pub type NanoResult<T> = Result<T, NanoError>;

/// Coarse status code of an operator or of a whole inference.
///
/// This is the four-valued status every layer run reduces to; the detailed
/// [`NanoError`] is kept for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    ArgumentError,
    AllocationFailure,
    Unimplemented,
}

impl NanoError {
    pub fn status(&self) -> Status {
        match self {
            NanoError::DimensionMismatch { .. }
            | NanoError::BufferTooSmall { .. }
            | NanoError::InvalidArgument(_)
            | NanoError::RegionOverlap => Status::ArgumentError,
            NanoError::ArenaExhausted { .. } | NanoError::AllocationFailed => {
                Status::AllocationFailure
            }
            NanoError::Unimplemented(_) => Status::Unimplemented,
        }
    }
}

impl Status {
    pub fn from_result<T>(result: &NanoResult<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => e.status(),
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Success => "success",
            Status::ArgumentError => "argument error",
            Status::AllocationFailure => "allocation failure",
            Status::Unimplemented => "unimplemented",
        };
        f.write_str(s)
    }
}

/// Check that a slice has exactly `expected` elements.
#[inline]
pub(crate) fn expect_len(actual: usize, expected: usize) -> NanoResult<()> {
    if actual != expected {
        return Err(NanoError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Check that a buffer holds at least `required` elements.
#[inline]
pub(crate) fn expect_capacity(available: usize, required: usize) -> NanoResult<()> {
    if available < required {
        return Err(NanoError::BufferTooSmall { required, available });
    }
    Ok(())
}
