//! Concatenation along one of the three HWC axes.

use crate::error::{expect_len, NanoError, NanoResult};
use crate::tensor::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConcatAxis {
    /// Outermost axis: whole tensors appended one after another.
    Height,
    /// Rows: per-row blocks of `width * channels`.
    Width,
    /// Channel-minor: per-pixel blocks of `channels`.
    Channel,
}

impl ConcatAxis {
    /// Resolve a Keras-style axis index over `(h, w, c)`; negative counts
    /// from the end, so `-1` is the channel axis.
    pub fn from_index(axis: isize) -> NanoResult<Self> {
        let resolved = if axis < 0 { axis + 3 } else { axis };
        match resolved {
            0 => Ok(ConcatAxis::Height),
            1 => Ok(ConcatAxis::Width),
            2 => Ok(ConcatAxis::Channel),
            _ => Err(NanoError::InvalidArgument("concat axis out of range")),
        }
    }

    /// Output shape of concatenating `shapes` along this axis.
    pub fn output_shape(self, shapes: &[Shape]) -> NanoResult<Shape> {
        let Some(first) = shapes.first() else {
            return Err(NanoError::InvalidArgument("concat needs at least one input"));
        };
        let mut out = *first;
        for s in &shapes[1..] {
            for (axis, (&a, &b)) in first.dims[..3].iter().zip(&s.dims[..3]).enumerate() {
                if axis != self.index() {
                    expect_len(b, a)?;
                }
            }
            out.dims[self.index()] += s.dims[self.index()];
        }
        Ok(out)
    }

    fn index(self) -> usize {
        match self {
            ConcatAxis::Height => 0,
            ConcatAxis::Width => 1,
            ConcatAxis::Channel => 2,
        }
    }
}

/// Concatenate `inputs` into `output`, ordered as given.
pub fn concat(
    axis: ConcatAxis,
    inputs: &[(&[i8], Shape)],
    output: &mut [i8],
    out_shape: Shape,
) -> NanoResult<()> {
    concat_with(axis, inputs.len(), output, out_shape, |k| Ok(inputs[k]))
}

/// [`concat`] over `count` inputs produced on demand by `input(k)`.
pub fn concat_with<'a, F>(
    axis: ConcatAxis,
    count: usize,
    output: &mut [i8],
    out_shape: Shape,
    mut input: F,
) -> NanoResult<()>
where
    F: FnMut(usize) -> NanoResult<(&'a [i8], Shape)>,
{
    expect_len(output.len(), out_shape.size())?;
    let along = axis.index();
    let mut extent = 0;
    for k in 0..count {
        let (data, shape) = input(k)?;
        expect_len(data.len(), shape.size())?;
        for (i, (&d, &o)) in shape.dims[..3].iter().zip(&out_shape.dims[..3]).enumerate() {
            if i != along {
                expect_len(d, o)?;
            }
        }
        extent += shape.dims[along];
    }
    expect_len(extent, out_shape.dims[along])?;

    let blocks = match axis {
        ConcatAxis::Height => 1,
        ConcatAxis::Width => out_shape.height(),
        ConcatAxis::Channel => out_shape.height() * out_shape.width(),
    };
    let mut pos = 0;
    for j in 0..blocks {
        for k in 0..count {
            let (data, shape) = input(k)?;
            let block = match axis {
                ConcatAxis::Height => shape.size(),
                ConcatAxis::Width => shape.row_size(),
                ConcatAxis::Channel => shape.channels(),
            };
            output[pos..pos + block].copy_from_slice(&data[j * block..(j + 1) * block]);
            pos += block;
        }
    }
    Ok(())
}
