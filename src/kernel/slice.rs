use crate::dtype::{Buffer, Dtype};
use crate::error::{CoreError, CoreResult};
use crate::layout::{DimVec, Layout};

/// A half-open `[start, end)` range with a step, per axis, selecting a
/// sub-region of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl AxisRange {
    pub fn full(dim: usize) -> Self {
        AxisRange {
            start: 0,
            end: dim,
            step: 1,
        }
    }

    pub fn len(&self) -> usize {
        if self.end <= self.start {
            0
        } else {
            (self.end - self.start).div_ceil(self.step)
        }
    }
}

/// Copies the region selected by `ranges` (one per input axis) into a fresh
/// C-contiguous output buffer.
pub fn materialize_slice(
    input: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    ranges: &[AxisRange],
) -> CoreResult<(Buffer, DimVec)> {
    if ranges.len() != layout.rank() {
        return Err(CoreError::shape(format!(
            "expected {} axis ranges, got {}",
            layout.rank(),
            ranges.len()
        )));
    }
    for (axis, r) in ranges.iter().enumerate() {
        if r.end > layout.shape[axis] {
            return Err(CoreError::shape(format!(
                "slice range {:?} exceeds dimension {} on axis {axis}",
                r, layout.shape[axis]
            )));
        }
    }

    let out_shape: DimVec = ranges.iter().map(AxisRange::len).collect();
    let out_len: usize = out_shape.iter().product();
    let size = dtype.size();
    let mut out = Buffer::allocate(out_len * size);

    for (i, out_coord) in (0..out_len)
        .map(|i| crate::layout::flat_to_coord(i, &out_shape))
        .enumerate()
    {
        let src_coord: DimVec = out_coord
            .iter()
            .enumerate()
            .map(|(axis, &c)| ranges[axis].start + c * ranges[axis].step)
            .collect();
        let src_off = layout.coord_to_flat(&src_coord) as usize * size;
        let dst_off = i * size;
        out.as_bytes_mut()[dst_off..dst_off + size]
            .copy_from_slice(&input.as_bytes()[src_off..src_off + size]);
    }

    Ok((out, out_shape))
}
