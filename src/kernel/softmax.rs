use crate::dtype::{Buffer, Dtype};
use crate::error::{CoreError, CoreResult};
use crate::layout::Layout;

use super::elem::{read_f64, write_f64};

/// Numerically stable softmax along `axis`:
/// `softmax(x) = exp(x - max(x)) / sum(exp(x - max(x)))`.
pub fn softmax(input: &Buffer, dtype: Dtype, layout: &Layout, axis: isize) -> CoreResult<Buffer> {
    run(input, dtype, layout, axis, false)
}

/// `log_softmax(x) = x - max(x) - log(sum(exp(x - max(x))))`.
pub fn log_softmax(
    input: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    axis: isize,
) -> CoreResult<Buffer> {
    run(input, dtype, layout, axis, true)
}

fn run(
    input: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    axis: isize,
    log: bool,
) -> CoreResult<Buffer> {
    let rank = layout.rank() as isize;
    let axis = if axis < 0 { axis + rank } else { axis };
    if axis < 0 || axis >= rank {
        return Err(CoreError::shape(format!(
            "softmax axis {axis} out of range for rank {rank}"
        )));
    }
    let axis = axis as usize;
    let axis_len = layout.shape[axis];
    let mut out = Buffer::allocate(layout.len() * dtype.size());

    // Iterate over every coordinate with `axis` fixed to 0: each such
    // coordinate names one independent slice along `axis`.
    let mut outer_shape = layout.shape.clone();
    outer_shape[axis] = 1;
    let outer_len: usize = outer_shape.iter().product();

    for outer_flat in 0..outer_len {
        let mut coord = crate::layout::flat_to_coord(outer_flat, &outer_shape);
        let in_offsets: Vec<isize> = (0..axis_len)
            .map(|a| {
                coord[axis] = a;
                layout.coord_to_flat(&coord)
            })
            .collect();

        let max = in_offsets
            .iter()
            .map(|&off| read_f64(input, dtype, off))
            .fold(f64::NEG_INFINITY, f64::max);

        let exps: Vec<f64> = in_offsets
            .iter()
            .map(|&off| (read_f64(input, dtype, off) - max).exp())
            .collect();
        let sum: f64 = exps.iter().sum();

        for (a, &off) in in_offsets.iter().enumerate() {
            coord[axis] = a;
            let out_flat = out_flat_index(&coord, &layout.shape);
            let value = if log {
                let x = read_f64(input, dtype, off);
                x - max - sum.ln()
            } else {
                exps[a] / sum
            };
            write_f64(&mut out, dtype, out_flat as isize, value);
        }
    }

    Ok(out)
}

fn out_flat_index(coord: &[usize], shape: &[usize]) -> usize {
    let stride = crate::layout::compute_strides(shape);
    crate::layout::coord_to_flat(coord, &stride) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    fn buf_f64(values: &[f64]) -> Buffer {
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Buffer::from_bytes(bytes)
    }

    #[test]
    fn softmax_sums_to_one() {
        let input = buf_f64(&[1.0, 2.0, 3.0]);
        let layout = Layout::row_major([3usize]);
        let out = softmax(&input, Dtype::F64, &layout, 0).unwrap();
        let view: Vec<f64> = out.typed_view(Dtype::F64).unwrap();
        let sum: f64 = view.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(view.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn log_softmax_matches_log_of_softmax() {
        let input = buf_f64(&[1.0, 2.0, 3.0]);
        let layout = Layout::row_major([3usize]);
        let soft = softmax(&input, Dtype::F64, &layout, 0).unwrap();
        let log_soft = log_softmax(&input, Dtype::F64, &layout, 0).unwrap();
        let a: Vec<f64> = soft.typed_view(Dtype::F64).unwrap();
        let b: Vec<f64> = log_soft.typed_view(Dtype::F64).unwrap();
        for (s, l) in a.iter().zip(b.iter()) {
            assert!((s.ln() - l).abs() < 1e-6);
        }
    }
}
