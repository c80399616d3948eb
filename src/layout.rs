//! Shape/stride layout: row-major strides, contiguity, broadcasting, and
//! coordinate/flat-index conversions.

use smallvec::SmallVec;

use crate::error::{CoreError, CoreResult};

/// Inline-capacity vector used for shapes, strides and permutations.
/// Four dims covers the overwhelming majority of tensors without a heap
/// allocation; larger ranks spill transparently.
pub type DimVec = SmallVec<[usize; 4]>;
pub type StrideVec = SmallVec<[isize; 4]>;

/// Shape, row-major stride, and base offset of a tensor view into a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub shape: DimVec,
    pub stride: StrideVec,
    pub offset: usize,
}

impl Layout {
    pub fn new(shape: DimVec, stride: StrideVec, offset: usize) -> Self {
        debug_assert_eq!(shape.len(), stride.len());
        Layout {
            shape,
            stride,
            offset,
        }
    }

    /// Row-major contiguous layout for `shape`, offset 0.
    pub fn row_major(shape: impl Into<DimVec>) -> Self {
        let shape = shape.into();
        let stride = compute_strides(&shape);
        Layout {
            shape,
            stride,
            offset: 0,
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.shape.iter().any(|&d| d == 0)
    }

    pub fn is_contiguous(&self) -> bool {
        is_contiguous(&self.shape, &self.stride)
    }

    /// Converts a flat row-major index into this layout's own coordinates.
    pub fn flat_to_coord(&self, flat: usize) -> DimVec {
        flat_to_coord(flat, &self.shape)
    }

    /// Converts a coordinate (in this layout's own shape) to a byte/element
    /// offset using this layout's strides, including the base offset.
    pub fn coord_to_flat(&self, coord: &[usize]) -> isize {
        self.offset as isize + coord_to_flat(coord, &self.stride)
    }
}

/// Row-major strides for `shape`, in elements (not bytes).
pub fn compute_strides(shape: &[usize]) -> StrideVec {
    let mut stride = StrideVec::with_capacity(shape.len());
    stride.resize(shape.len(), 0);
    let mut acc: isize = 1;
    for i in (0..shape.len()).rev() {
        stride[i] = acc;
        acc *= shape[i] as isize;
    }
    stride
}

/// Whether `stride` is exactly the row-major stride for `shape`.
///
/// Dimensions of size 1 are stride-agnostic (NumPy convention): their
/// stride may be anything since no index ever varies along them.
pub fn is_contiguous(shape: &[usize], stride: &[isize]) -> bool {
    let expected = compute_strides(shape);
    shape
        .iter()
        .zip(stride.iter())
        .zip(expected.iter())
        .all(|((&dim, &s), &e)| dim <= 1 || s == e)
}

/// Right-aligns `a` and `b` and takes the pairwise max dimension, NumPy-style.
/// Two dims are compatible if equal or either is 1.
pub fn broadcast_shapes(a: &[usize], b: &[usize]) -> CoreResult<DimVec> {
    let rank = a.len().max(b.len());
    let mut out = DimVec::with_capacity(rank);
    out.resize(rank, 1);
    for offset in 0..rank {
        let da = dim_at_from_end(a, offset);
        let db = dim_at_from_end(b, offset);
        let merged = match (da, db) {
            (x, y) if x == y => x,
            (1, y) => y,
            (x, 1) => x,
            (x, y) => {
                return Err(CoreError::shape(format!(
                    "cannot broadcast dimensions {x} and {y}"
                )))
            }
        };
        out[rank - 1 - offset] = merged;
    }
    Ok(out)
}

fn dim_at_from_end(shape: &[usize], offset_from_end: usize) -> usize {
    if offset_from_end >= shape.len() {
        1
    } else {
        shape[shape.len() - 1 - offset_from_end]
    }
}

/// Row-major coordinate for flat index `i` within `shape`.
pub fn flat_to_coord(mut i: usize, shape: &[usize]) -> DimVec {
    let mut coord = DimVec::with_capacity(shape.len());
    coord.resize(shape.len(), 0);
    for d in (0..shape.len()).rev() {
        let dim = shape[d].max(1);
        coord[d] = i % dim;
        i /= dim;
    }
    coord
}

/// Element offset for `coord` under `stride` (no base offset applied).
pub fn coord_to_flat(coord: &[usize], stride: &[isize]) -> isize {
    coord
        .iter()
        .zip(stride.iter())
        .map(|(&c, &s)| c as isize * s)
        .sum()
}

/// Produces, in row-major order of `out_shape`, the corresponding input
/// coordinate for each of `in_shapes` — broadcasting a size-1 input dim to
/// index 0 for every output index along that axis. Iteration is
/// deterministic and lazy.
pub struct BroadcastIter<'a> {
    out_shape: &'a [usize],
    in_shapes: Vec<&'a [usize]>,
    next: usize,
    total: usize,
}

impl<'a> BroadcastIter<'a> {
    pub fn new(out_shape: &'a [usize], in_shapes: Vec<&'a [usize]>) -> Self {
        let total = out_shape.iter().product();
        BroadcastIter {
            out_shape,
            in_shapes,
            next: 0,
            total,
        }
    }
}

impl<'a> Iterator for BroadcastIter<'a> {
    /// (output coordinate, one input coordinate per registered input shape)
    type Item = (DimVec, Vec<DimVec>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let out_coord = flat_to_coord(self.next, self.out_shape);
        let rank = self.out_shape.len();
        let in_coords = self
            .in_shapes
            .iter()
            .map(|shape| {
                let offset = rank - shape.len();
                let mut c = DimVec::with_capacity(shape.len());
                for (axis, &dim) in shape.iter().enumerate() {
                    let out_axis = axis + offset;
                    c.push(if dim == 1 { 0 } else { out_coord[out_axis] });
                }
                c
            })
            .collect();
        self.next += 1;
        Some((out_coord, in_coords))
    }
}

pub fn broadcast_iter<'a>(
    out_shape: &'a [usize],
    in_shapes: Vec<&'a [usize]>,
) -> BroadcastIter<'a> {
    BroadcastIter::new(out_shape, in_shapes)
}
