use rayon::prelude::*;

use crate::config::CoreConfig;
use crate::dtype::{Buffer, Dtype};
use crate::error::CoreResult;
use crate::layout::{broadcast_shapes, compute_strides, DimVec, Layout};

use super::elem::{read_f64, read_wide, wide_div, write_f64, write_wide};

/// Binary elementwise operations with NumPy-style broadcasting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Output dtype resolution per the component design's promotion rules.
fn output_dtype(a: Dtype, b: Dtype) -> Dtype {
    match (a.is_wide_integer(), b.is_wide_integer()) {
        (true, true) => a,
        (true, false) | (false, true) => Dtype::F64,
        (false, false) if a == b => a,
        (false, false) => Dtype::F64,
    }
}

/// Applies `op` elementwise to `(a, b)`, broadcasting shapes, under the
/// default [`CoreConfig`]. See [`binary_op_with_config`] to control
/// parallelism.
pub fn binary_op(
    op: BinaryOp,
    a: &Buffer,
    a_dtype: Dtype,
    a_layout: &Layout,
    b: &Buffer,
    b_dtype: Dtype,
    b_layout: &Layout,
) -> CoreResult<(Buffer, Dtype, DimVec)> {
    binary_op_with_config(op, a, a_dtype, a_layout, b, b_dtype, b_layout, &CoreConfig::default())
}

/// Applies `op` elementwise to `(a, b)`, broadcasting shapes. Fast path when
/// shapes match exactly and both operands are C-contiguous; slow path
/// drives the traversal through `broadcast_iter`. On the fast path, above
/// `config.parallel_threshold` elements the per-element compute is spread
/// across `rayon`'s thread pool.
#[allow(clippy::too_many_arguments)]
pub fn binary_op_with_config(
    op: BinaryOp,
    a: &Buffer,
    a_dtype: Dtype,
    a_layout: &Layout,
    b: &Buffer,
    b_dtype: Dtype,
    b_layout: &Layout,
    config: &CoreConfig,
) -> CoreResult<(Buffer, Dtype, DimVec)> {
    let out_shape = broadcast_shapes(&a_layout.shape, &b_layout.shape)?;
    let out_dtype = output_dtype(a_dtype, b_dtype);
    let len: usize = out_shape.iter().product();
    let mut out = Buffer::allocate(len * out_dtype.size());

    let fast_path = a_layout.shape == b_layout.shape
        && a_layout.shape == out_shape
        && a_layout.is_contiguous()
        && b_layout.is_contiguous();
    let parallel = config.use_parallelism && len >= config.parallel_threshold;

    if fast_path && out_dtype.is_wide_integer() && a_dtype.is_wide_integer() {
        let indices: Vec<usize> = (0..len).collect();
        let compute = |i: usize| {
            let off = (a_layout.offset + i) as isize;
            apply_wide(op, out_dtype, read_wide(a, a_dtype, off), read_wide(b, b_dtype, off))
        };
        let values: Vec<i128> = if parallel {
            indices.par_iter().map(|&i| compute(i)).collect()
        } else {
            indices.iter().map(|&i| compute(i)).collect()
        };
        for (i, v) in values.into_iter().enumerate() {
            write_wide(&mut out, out_dtype, i as isize, v);
        }
        return Ok((out, out_dtype, out_shape));
    }

    if fast_path {
        let indices: Vec<usize> = (0..len).collect();
        let compute = |i: usize| {
            let off = (a_layout.offset + i) as isize;
            apply_f64(op, read_f64(a, a_dtype, off), read_f64(b, b_dtype, off))
        };
        let values: Vec<f64> = if parallel {
            indices.par_iter().map(|&i| compute(i)).collect()
        } else {
            indices.iter().map(|&i| compute(i)).collect()
        };
        for (i, v) in values.into_iter().enumerate() {
            write_f64(&mut out, out_dtype, i as isize, v);
        }
        return Ok((out, out_dtype, out_shape));
    }

    let out_stride = compute_strides(&out_shape);
    let a_shape = a_layout.shape.clone();
    let b_shape = b_layout.shape.clone();
    for (out_coord, ins) in
        crate::layout::broadcast_iter(&out_shape, vec![&a_shape, &b_shape])
    {
        let flat_out = crate::layout::coord_to_flat(&out_coord, &out_stride) as usize;
        let a_off = a_layout.offset as isize
            + crate::layout::coord_to_flat(&ins[0], &a_layout.stride);
        let b_off = b_layout.offset as isize
            + crate::layout::coord_to_flat(&ins[1], &b_layout.stride);

        if out_dtype.is_wide_integer() && a_dtype.is_wide_integer() && b_dtype.is_wide_integer() {
            let x = read_wide(a, a_dtype, a_off);
            let y = read_wide(b, b_dtype, b_off);
            write_wide(
                &mut out,
                out_dtype,
                flat_out as isize,
                apply_wide(op, out_dtype, x, y),
            );
        } else {
            let x = read_f64(a, a_dtype, a_off);
            let y = read_f64(b, b_dtype, b_off);
            write_f64(&mut out, out_dtype, flat_out as isize, apply_f64(op, x, y));
        }
    }

    Ok((out, out_dtype, out_shape))
}

fn apply_f64(op: BinaryOp, x: f64, y: f64) -> f64 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => x / y,
    }
}

fn apply_wide(op: BinaryOp, dtype: Dtype, x: i128, y: i128) -> i128 {
    match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div => wide_div(dtype, x, y),
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
    fn add_same_shape_fast_path() {
        let a = buf_i32(&[1, 2, 3]);
        let b = buf_i32(&[10, 20, 30]);
        let layout = Layout::row_major([3usize]);
        let (out, dtype, shape) =
            binary_op(BinaryOp::Add, &a, Dtype::I32, &layout, &b, Dtype::I32, &layout).unwrap();
        assert_eq!(dtype, Dtype::I32);
        assert_eq!(&shape[..], &[3]);
        let view: Vec<i32> = out.typed_view(Dtype::I32).unwrap();
        assert_eq!(view, vec![11, 22, 33]);
    }

    #[test]
    fn broadcast_add_ones() {
        let ones_n1 = buf_i32(&[1, 1]);
        let ones_1m = buf_i32(&[1, 1, 1]);
        let la = Layout::row_major([2usize, 1]);
        let lb = Layout::row_major([1usize, 3]);
        let (out, dtype, shape) = binary_op(
            BinaryOp::Add,
            &ones_n1,
            Dtype::I32,
            &la,
            &ones_1m,
            Dtype::I32,
            &lb,
        )
        .unwrap();
        assert_eq!(dtype, Dtype::I32);
        assert_eq!(&shape[..], &[2, 3]);
        let view: Vec<i32> = out.typed_view(Dtype::I32).unwrap();
        assert_eq!(view, vec![2; 6]);
    }

    #[test]
    fn parallel_fast_path_matches_sequential() {
        let a = buf_i32(&[1, 2, 3, 4]);
        let b = buf_i32(&[10, 20, 30, 40]);
        let layout = Layout::row_major([4usize]);
        let (seq, ..) =
            binary_op_with_config(BinaryOp::Add, &a, Dtype::I32, &layout, &b, Dtype::I32, &layout, &CoreConfig::safe())
                .unwrap();
        let parallel_cfg = CoreConfig::default().with_parallel_threshold(0);
        let (par, ..) = binary_op_with_config(
            BinaryOp::Add, &a, Dtype::I32, &layout, &b, Dtype::I32, &layout, &parallel_cfg,
        )
        .unwrap();
        assert_eq!(seq.as_bytes(), par.as_bytes());
    }

    #[test]
    fn wide_integer_division_by_zero_uses_sentinel() {
        let mut a_bytes = Vec::new();
        a_bytes.extend_from_slice(&5i64.to_le_bytes());
        let mut b_bytes = Vec::new();
        b_bytes.extend_from_slice(&0i64.to_le_bytes());
        let a = Buffer::from_bytes(a_bytes);
        let b = Buffer::from_bytes(b_bytes);
        let layout = Layout::row_major([1usize]);
        let (out, dtype, _) =
            binary_op(BinaryOp::Div, &a, Dtype::I64, &layout, &b, Dtype::I64, &layout).unwrap();
        assert_eq!(dtype, Dtype::I64);
        let view: Vec<i64> = out.typed_view(Dtype::I64).unwrap();
        assert_eq!(view[0], i64::MAX);
    }
}
