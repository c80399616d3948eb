use crate::dtype::{Buffer, Dtype, NumericClass};
use crate::error::CoreResult;
use crate::layout::{compute_strides, DimVec, Layout};

use super::elem::{read_f64, read_wide, write_f64, write_wide};
use super::offsets;

/// Reductions over one or more axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Mean,
}

/// Reduces `input` over `axes` (negative axes normalized against rank).
/// `axes == None` reduces to a scalar; `axes == Some(&[])` is an identity
/// copy. Accumulation is f64 for float inputs, wide-integer for wide
/// integer inputs, and f64 otherwise (to avoid overflow accumulating many
/// small integers).
pub fn reduce(
    op: ReduceOp,
    input: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    axes: Option<&[isize]>,
    keep_dims: bool,
) -> CoreResult<(Buffer, Dtype, DimVec)> {
    let rank = layout.rank();
    let reduced: Vec<usize> = match axes {
        None => (0..rank).collect(),
        Some(axes) => {
            let mut normalized: Vec<usize> = axes
                .iter()
                .map(|&a| if a < 0 { (a + rank as isize) as usize } else { a as usize })
                .collect();
            normalized.sort_unstable();
            normalized.dedup();
            normalized
        }
    };

    if reduced.is_empty() {
        // Identity: copy through.
        let len = layout.len();
        let mut out = Buffer::allocate(len * dtype.size());
        for (i, off) in offsets(layout).enumerate() {
            let bytes_at = off as usize * dtype.size();
            let size = dtype.size();
            let src = &input.as_bytes()[bytes_at..bytes_at + size];
            out.as_bytes_mut()[i * size..(i + 1) * size].copy_from_slice(src);
        }
        return Ok((out, dtype, layout.shape.clone()));
    }

    let out_shape_full: DimVec = layout
        .shape
        .iter()
        .enumerate()
        .map(|(axis, &dim)| if reduced.contains(&axis) { 1 } else { dim })
        .collect();
    let out_shape: DimVec = if keep_dims {
        out_shape_full.clone()
    } else {
        layout
            .shape
            .iter()
            .enumerate()
            .filter(|(axis, _)| !reduced.contains(axis))
            .map(|(_, &dim)| dim)
            .collect()
    };

    let count: usize = reduced.iter().map(|&a| layout.shape[a]).product();
    let out_len: usize = out_shape_full.iter().product();
    let out_stride_full = compute_strides(&out_shape_full);

    match dtype.class() {
        NumericClass::WideInteger => {
            let mut acc = vec![0i128; out_len];
            for i in 0..layout.len() {
                let coord = layout.flat_to_coord(i);
                let off = layout.coord_to_flat(&coord);
                let x = read_wide(input, dtype, off);
                let out_coord: DimVec = coord
                    .iter()
                    .enumerate()
                    .map(|(axis, &c)| if reduced.contains(&axis) { 0 } else { c })
                    .collect();
                let out_flat =
                    crate::layout::coord_to_flat(&out_coord, &out_stride_full) as usize;
                acc[out_flat] += x;
            }
            let mut out = Buffer::allocate(out_len * dtype.size());
            for (i, &a) in acc.iter().enumerate() {
                let value = match op {
                    ReduceOp::Sum => a,
                    ReduceOp::Mean => a / count as i128,
                };
                write_wide(&mut out, dtype, i as isize, value);
            }
            Ok((out, dtype, out_shape))
        }
        NumericClass::Integer | NumericClass::Float => {
            let mut acc = vec![0f64; out_len];
            for i in 0..layout.len() {
                let coord = layout.flat_to_coord(i);
                let off = layout.coord_to_flat(&coord);
                let x = read_f64(input, dtype, off);
                let out_coord: DimVec = coord
                    .iter()
                    .enumerate()
                    .map(|(axis, &c)| if reduced.contains(&axis) { 0 } else { c })
                    .collect();
                let out_flat =
                    crate::layout::coord_to_flat(&out_coord, &out_stride_full) as usize;
                acc[out_flat] += x;
            }
            let mut out = Buffer::allocate(out_len * dtype.size());
            for (i, &a) in acc.iter().enumerate() {
                let value = match op {
                    ReduceOp::Sum => a,
                    ReduceOp::Mean => a / count as f64,
                };
                write_f64(&mut out, dtype, i as isize, value);
            }
            Ok((out, dtype, out_shape))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn buf_i32(values: &[i32]) -> Buffer {
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Buffer::from_bytes(bytes)
    }

    #[test]
    fn sum_rows() {
        // [[1,2,3],[4,5,6]] -> sum over axis 1 -> [6, 15]
        let input = buf_i32(&[1, 2, 3, 4, 5, 6]);
        let layout = Layout::row_major([2usize, 3]);
        let (out, dtype, shape) =
            reduce(ReduceOp::Sum, &input, Dtype::I32, &layout, Some(&[1]), false).unwrap();
        assert_eq!(dtype, Dtype::I32);
        assert_eq!(&shape[..], &[2]);
        let view: Vec<i32> = out.typed_view(Dtype::I32).unwrap();
        assert_eq!(view, vec![6, 15]);
    }

    #[test]
    fn keep_dims_preserves_rank() {
        let input = buf_i32(&[1, 2, 3, 4, 5, 6]);
        let layout = Layout::row_major([2usize, 3]);
        let (_out, _dtype, shape) =
            reduce(ReduceOp::Sum, &input, Dtype::I32, &layout, Some(&[1]), true).unwrap();
        assert_eq!(&shape[..], &[2, 1]);
    }

    #[test]
    fn empty_axes_is_identity() {
        let input = buf_i32(&[1, 2, 3]);
        let layout = Layout::row_major([3usize]);
        let (out, _dtype, shape) =
            reduce(ReduceOp::Sum, &input, Dtype::I32, &layout, Some(&[]), false).unwrap();
        assert_eq!(&shape[..], &[3]);
        let view: Vec<i32> = out.typed_view(Dtype::I32).unwrap();
        assert_eq!(view, vec![1, 2, 3]);
    }
}
