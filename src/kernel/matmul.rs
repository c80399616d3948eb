use crate::dtype::{Buffer, Dtype};
use crate::error::{CoreError, CoreResult};
use crate::layout::{compute_strides, DimVec, Layout};

use super::elem::{read_f64, write_f64};

/// Matmul dtype promotion: int × int stays int (if equal dtypes), any float
/// operand promotes the result to f64.
fn output_dtype(a: Dtype, b: Dtype) -> Dtype {
    if a.is_float() || b.is_float() || a != b {
        Dtype::F64
    } else {
        a
    }
}

/// NumPy/PyTorch-style matmul: 1D×1D dot product, 1D×2D vector-matrix,
/// 2D×1D matrix-vector, 2D×2D matrix-matrix, ≥3D batched with broadcasting
/// batch dims (a size-1 batch dim is replicated).
pub fn matmul(
    a: &Buffer,
    a_dtype: Dtype,
    a_layout: &Layout,
    b: &Buffer,
    b_dtype: Dtype,
    b_layout: &Layout,
) -> CoreResult<(Buffer, Dtype, DimVec)> {
    let a_rank = a_layout.rank();
    let b_rank = b_layout.rank();

    if a_rank == 0 || b_rank == 0 {
        return Err(CoreError::shape("matmul does not accept rank-0 tensors"));
    }

    let out_dtype = output_dtype(a_dtype, b_dtype);

    match (a_rank, b_rank) {
        (1, 1) => {
            let k = a_layout.shape[0];
            if k != b_layout.shape[0] {
                return Err(CoreError::shape(format!(
                    "matmul inner dimension mismatch: {} vs {}",
                    k, b_layout.shape[0]
                )));
            }
            let mut acc = 0f64;
            for i in 0..k {
                let x = read_f64(a, a_dtype, a_layout.coord_to_flat(&[i]));
                let y = read_f64(b, b_dtype, b_layout.coord_to_flat(&[i]));
                acc += x * y;
            }
            let mut out = Buffer::allocate(out_dtype.size());
            write_f64(&mut out, out_dtype, 0, acc);
            Ok((out, out_dtype, DimVec::new()))
        }
        (1, 2) => {
            // [k] x [k,n] -> [n]
            let k = a_layout.shape[0];
            let (k2, n) = (b_layout.shape[0], b_layout.shape[1]);
            if k != k2 {
                return Err(CoreError::shape(format!(
                    "matmul inner dimension mismatch: {k} vs {k2}"
                )));
            }
            let mut out = Buffer::allocate(n * out_dtype.size());
            for j in 0..n {
                let mut acc = 0f64;
                for i in 0..k {
                    let x = read_f64(a, a_dtype, a_layout.coord_to_flat(&[i]));
                    let y = read_f64(b, b_dtype, b_layout.coord_to_flat(&[i, j]));
                    acc += x * y;
                }
                write_f64(&mut out, out_dtype, j as isize, acc);
            }
            Ok((out, out_dtype, DimVec::from_slice(&[n])))
        }
        (2, 1) => {
            // [m,k] x [k] -> [m]
            let (m, k) = (a_layout.shape[0], a_layout.shape[1]);
            let k2 = b_layout.shape[0];
            if k != k2 {
                return Err(CoreError::shape(format!(
                    "matmul inner dimension mismatch: {k} vs {k2}"
                )));
            }
            let mut out = Buffer::allocate(m * out_dtype.size());
            for i in 0..m {
                let mut acc = 0f64;
                for kk in 0..k {
                    let x = read_f64(a, a_dtype, a_layout.coord_to_flat(&[i, kk]));
                    let y = read_f64(b, b_dtype, b_layout.coord_to_flat(&[kk]));
                    acc += x * y;
                }
                write_f64(&mut out, out_dtype, i as isize, acc);
            }
            Ok((out, out_dtype, DimVec::from_slice(&[m])))
        }
        _ => batched(a, a_dtype, a_layout, b, b_dtype, b_layout, out_dtype),
    }
}

/// Factors both operands into `[batch..., M, K]` / `[batch..., K, N]`,
/// broadcasts the batch dims pairwise, and runs a plain loop-nest matmul
/// per batch element.
fn batched(
    a: &Buffer,
    a_dtype: Dtype,
    a_layout: &Layout,
    b: &Buffer,
    b_dtype: Dtype,
    b_layout: &Layout,
    out_dtype: Dtype,
) -> CoreResult<(Buffer, Dtype, DimVec)> {
    let a_rank = a_layout.rank();
    let b_rank = b_layout.rank();
    if a_rank < 2 || b_rank < 2 {
        return Err(CoreError::shape(
            "batched matmul requires at least 2D operands",
        ));
    }

    let (m, k) = (a_layout.shape[a_rank - 2], a_layout.shape[a_rank - 1]);
    let (k2, n) = (b_layout.shape[b_rank - 2], b_layout.shape[b_rank - 1]);
    if k != k2 {
        return Err(CoreError::shape(format!(
            "matmul inner dimension mismatch: {k} vs {k2}"
        )));
    }

    let a_batch = &a_layout.shape[..a_rank - 2];
    let b_batch = &b_layout.shape[..b_rank - 2];
    let batch_shape = crate::layout::broadcast_shapes(a_batch, b_batch)?;
    let batch_len: usize = batch_shape.iter().product();

    let mut out_shape = batch_shape.clone();
    out_shape.push(m);
    out_shape.push(n);
    let out_len: usize = out_shape.iter().product();
    let mut out = Buffer::allocate(out_len * out_dtype.size());
    let out_stride = compute_strides(&out_shape);

    for batch_idx in 0..batch_len.max(1) {
        let batch_coord = crate::layout::flat_to_coord(batch_idx, &batch_shape);
        let a_batch_coord = project_batch(&batch_coord, a_batch);
        let b_batch_coord = project_batch(&batch_coord, b_batch);

        for i in 0..m {
            for j in 0..n {
                let mut acc = 0f64;
                for kk in 0..k {
                    let mut a_coord = a_batch_coord.clone();
                    a_coord.push(i);
                    a_coord.push(kk);
                    let mut b_coord = b_batch_coord.clone();
                    b_coord.push(kk);
                    b_coord.push(j);
                    let x = read_f64(a, a_dtype, a_layout.coord_to_flat(&a_coord));
                    let y = read_f64(b, b_dtype, b_layout.coord_to_flat(&b_coord));
                    acc += x * y;
                }
                let mut out_coord = batch_coord.clone();
                out_coord.push(i);
                out_coord.push(j);
                let flat = crate::layout::coord_to_flat(&out_coord, &out_stride) as isize;
                write_f64(&mut out, out_dtype, flat, acc);
            }
        }
    }

    Ok((out, out_dtype, out_shape))
}

/// Projects a broadcast batch coordinate down onto an operand's own
/// (possibly shorter, possibly size-1-dim) batch shape.
fn project_batch(batch_coord: &[usize], own_batch: &[usize]) -> DimVec {
    let rank = batch_coord.len();
    let offset = rank - own_batch.len();
    own_batch
        .iter()
        .enumerate()
        .map(|(axis, &dim)| if dim == 1 { 0 } else { batch_coord[offset + axis] })
        .collect()
}
