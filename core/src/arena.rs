//! Activation arena: build-time placement plus the runtime byte store.
//!
//! MCUs have no general-purpose heap at inference time, so every
//! intermediate tensor lives at a fixed offset in one backing buffer sized
//! once when the model is built. [`ArenaPlanner`] assigns those offsets with
//! a first-fit search over the blocks that are live at each step; [`Arena`]
//! owns the bytes and hands out bounds-checked views during a run.
//!
//! Lifetimes are decided by the planner, so the runtime never tracks aliasing.
//! The one check it keeps is that a layer's inputs and its output are
//! disjoint, which is what lets it borrow them at the same time.

use alloc::vec::Vec;

use crate::error::{NanoError, NanoResult};

/// A byte range `[offset, offset + len)` inside the arena.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Region {
    pub offset: usize,
    pub len: usize,
}

impl Region {
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    #[inline(always)]
    pub const fn end(&self) -> usize {
        self.offset + self.len
    }

    /// Empty regions overlap nothing.
    pub fn overlaps(&self, other: &Region) -> bool {
        self.len > 0 && other.len > 0 && self.offset < other.end() && other.offset < self.end()
    }
}

/// First-fit placement over the currently live regions.
///
/// `allocate` picks the lowest offset where `len` bytes fit between live
/// regions; `release` makes a region's bytes available again. The arena size
/// is the high-water mark over the whole plan.
#[derive(Debug, Default)]
pub struct ArenaPlanner {
    /// Live regions, sorted by offset.
    live: Vec<Region>,
    high_water: usize,
    limit: Option<usize>,
}

impl ArenaPlanner {
    pub fn new(limit: Option<usize>) -> Self {
        Self { live: Vec::new(), high_water: 0, limit }
    }

    pub fn allocate(&mut self, len: usize) -> NanoResult<Region> {
        if len == 0 {
            return Ok(Region::new(0, 0));
        }
        let mut offset = 0;
        let mut slot = self.live.len();
        for (i, r) in self.live.iter().enumerate() {
            if r.offset >= offset + len {
                slot = i;
                break;
            }
            offset = offset.max(r.end());
        }
        let region = Region::new(offset, len);
        if let Some(limit) = self.limit {
            if region.end() > limit {
                return Err(NanoError::ArenaExhausted {
                    requested: len,
                    remaining: limit.saturating_sub(self.high_water),
                });
            }
        }
        self.live.insert(slot, region);
        self.high_water = self.high_water.max(region.end());
        Ok(region)
    }

    pub fn release(&mut self, region: Region) {
        if let Some(i) = self.live.iter().position(|r| *r == region) {
            self.live.remove(i);
        }
    }

    /// Bytes the arena needs for everything placed so far.
    #[inline(always)]
    pub fn size(&self) -> usize {
        self.high_water
    }
}

/// The runtime byte store behind every planned region.
pub struct Arena {
    bytes: Vec<i8>,
}

impl Arena {
    /// Allocate a zeroed arena of `size` bytes.
    pub fn new(size: usize) -> NanoResult<Self> {
        let mut bytes = Vec::new();
        bytes.try_reserve_exact(size).map_err(|_| NanoError::AllocationFailed)?;
        bytes.resize(size, 0);
        Ok(Self { bytes })
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    pub fn slice(&self, region: Region) -> NanoResult<&[i8]> {
        self.check(region)?;
        Ok(&self.bytes[region.offset..region.end()])
    }

    pub fn slice_mut(&mut self, region: Region) -> NanoResult<&mut [i8]> {
        self.check(region)?;
        Ok(&mut self.bytes[region.offset..region.end()])
    }

    /// Split the arena around `output`: a mutable view of the output region
    /// plus read-only access to everything before and after it.
    pub fn split(&mut self, output: Region) -> NanoResult<(Inputs<'_>, &mut [i8])> {
        self.check(output)?;
        let (head, rest) = self.bytes.split_at_mut(output.offset);
        let (out, tail) = rest.split_at_mut(output.len);
        let inputs = Inputs { head, tail, tail_start: output.end() };
        Ok((inputs, out))
    }

    /// Zero the whole store.
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    fn check(&self, region: Region) -> NanoResult<()> {
        if region.end() > self.bytes.len() {
            return Err(NanoError::BufferTooSmall {
                required: region.end(),
                available: self.bytes.len(),
            });
        }
        Ok(())
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena").field("capacity", &self.bytes.len()).finish()
    }
}

/// Read-only views on both sides of an output region.
#[derive(Clone, Copy)]
pub struct Inputs<'a> {
    head: &'a [i8],
    tail: &'a [i8],
    tail_start: usize,
}

impl<'a> Inputs<'a> {
    /// Borrow `region`, which must lie entirely on one side of the output.
    pub fn get(&self, region: Region) -> NanoResult<&'a [i8]> {
        if region.len == 0 {
            return Ok(&[]);
        }
        if region.end() <= self.head.len() {
            return Ok(&self.head[region.offset..region.end()]);
        }
        if region.offset >= self.tail_start {
            let start = region.offset - self.tail_start;
            let end = start + region.len;
            if end > self.tail.len() {
                return Err(NanoError::BufferTooSmall {
                    required: region.end(),
                    available: self.tail_start + self.tail.len(),
                });
            }
            return Ok(&self.tail[start..end]);
        }
        Err(NanoError::RegionOverlap)
    }
}

/// Wide `i32` scratch for accumulating kernels.
pub(crate) fn wide_scratch(words: usize) -> NanoResult<Vec<i32>> {
    let mut v = Vec::new();
    v.try_reserve_exact(words).map_err(|_| NanoError::AllocationFailed)?;
    v.resize(words, 0);
    Ok(v)
}
