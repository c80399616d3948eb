//! Executes a [`Plan`] against a buffer, dispatching each step to the
//! kernel primitives or to pure shape/stride bookkeeping.

use std::rc::Rc;

use crate::dtype::{Buffer, Dtype};
use crate::einops::plan::{Plan, PlanStep};
use crate::error::CoreResult;
use crate::kernel::{self, reduce as reduce_kernel};
use crate::layout::{compute_strides, DimVec, Layout, StrideVec};

/// A tensor view mid-execution: a shared buffer plus the layout describing
/// how to read it. Reshape/permute only ever touch the layout; a step
/// materializes a new buffer only when the current layout can't express
/// the next step without one (a non-contiguous reshape, or a broadcast
/// expand).
struct Working {
    buffer: Rc<Buffer>,
    dtype: Dtype,
    layout: Layout,
}

/// Runs `plan` against `(buffer, dtype, layout)`, returning the final
/// buffer, dtype and layout (always C-contiguous on return).
pub fn execute(plan: &Plan, buffer: &Buffer, dtype: Dtype, layout: &Layout) -> CoreResult<(Buffer, Dtype, Layout)> {
    let mut working = Working {
        buffer: Rc::new(buffer.clone()),
        dtype,
        layout: layout.clone(),
    };

    for step in &plan.steps {
        working = apply_step(working, step)?;
    }

    if !working.layout.is_contiguous() || working.layout.offset != 0 {
        working = materialize(&working);
    }

    Ok((
        Rc::try_unwrap(working.buffer).unwrap_or_else(|rc| (*rc).clone()),
        working.dtype,
        working.layout,
    ))
}

fn apply_step(working: Working, step: &PlanStep) -> CoreResult<Working> {
    match step {
        PlanStep::Identity => Ok(working),
        PlanStep::Reshape(target) => Ok(reshape(working, target)),
        PlanStep::Permute(perm) => Ok(permute(working, perm)),
        PlanStep::Expand(target) => Ok(expand(&working, target)),
        PlanStep::Reduce { axes, op, keep_dims } => reduce_step(&working, axes, *op, *keep_dims),
    }
}

fn reshape(working: Working, target: &[usize]) -> Working {
    if working.layout.is_contiguous() {
        let stride = compute_strides(target);
        Working {
            layout: Layout::new(target.iter().copied().collect(), stride, working.layout.offset),
            ..working
        }
    } else {
        let materialized = materialize(&working);
        let stride = compute_strides(target);
        Working {
            layout: Layout::new(target.iter().copied().collect(), stride, 0),
            ..materialized
        }
    }
}

fn permute(working: Working, perm: &[usize]) -> Working {
    let shape: DimVec = perm.iter().map(|&i| working.layout.shape[i]).collect();
    let stride: StrideVec = perm.iter().map(|&i| working.layout.stride[i]).collect();
    Working {
        layout: Layout::new(shape, stride, working.layout.offset),
        ..working
    }
}

fn expand(working: &Working, target: &[usize]) -> Working {
    let out_shape: DimVec = target.iter().copied().collect();
    let len: usize = out_shape.iter().product();
    let mut out = Buffer::allocate(len * working.dtype.size());
    let size = working.dtype.size();

    let src_shape = working.layout.shape.clone();
    for (out_coord, ins) in crate::layout::broadcast_iter(&out_shape, vec![&src_shape]) {
        let src_off = working.layout.coord_to_flat(&ins[0]) as usize * size;
        let dst_flat = crate::layout::coord_to_flat(&out_coord, &compute_strides(&out_shape)) as usize;
        let dst_off = dst_flat * size;
        out.as_bytes_mut()[dst_off..dst_off + size]
            .copy_from_slice(&working.buffer.as_bytes()[src_off..src_off + size]);
    }

    Working {
        buffer: Rc::new(out),
        dtype: working.dtype,
        layout: Layout::row_major(out_shape),
    }
}

fn reduce_step(
    working: &Working,
    axes: &[usize],
    op: crate::kernel::ReduceOp,
    keep_dims: bool,
) -> CoreResult<Working> {
    let axes_i: Vec<isize> = axes.iter().map(|&a| a as isize).collect();
    let (out, dtype, shape) = reduce_kernel(
        op,
        &working.buffer,
        working.dtype,
        &working.layout,
        Some(&axes_i),
        keep_dims,
    )?;
    Ok(Working {
        buffer: Rc::new(out),
        dtype,
        layout: Layout::row_major(shape),
    })
}

/// Copies the current (possibly strided/offset) view into a fresh
/// C-contiguous buffer of the same shape.
fn materialize(working: &Working) -> Working {
    let shape = working.layout.shape.clone();
    let ranges: Vec<kernel::AxisRange> = shape
        .iter()
        .map(|&d| kernel::AxisRange::full(d))
        .collect();
    let (out, out_shape) =
        kernel::materialize_slice(&working.buffer, working.dtype, &working.layout, &ranges)
            .expect("full-range slice never fails shape validation");
    Working {
        buffer: Rc::new(out),
        dtype: working.dtype,
        layout: Layout::row_major(out_shape),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::einops::parse::parse;
    use crate::einops::plan::plan_rearrange_or_reduce;
    use crate::einops::resolve::resolve;

    fn buf_i32(values: &[i32]) -> Buffer {
        let mut bytes = Vec::new();
        for v in values {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        Buffer::from_bytes(bytes)
    }

    #[test]
    fn transpose_executes_correctly() {
        let ast = parse("h w -> w h").unwrap();
        let resolved = resolve(&ast, &[2, 2], None).unwrap();
        let plan = plan_rearrange_or_reduce(&ast, &resolved, None, false).unwrap();
        let input = buf_i32(&[1, 2, 3, 4]);
        let layout = Layout::row_major([2usize, 2]);
        let (out, dtype, out_layout) = execute(&plan, &input, Dtype::I32, &layout).unwrap();
        assert_eq!(dtype, Dtype::I32);
        assert_eq!(&out_layout.shape[..], &[2, 2]);
        let view: Vec<i32> = out.typed_view(Dtype::I32).unwrap();
        assert_eq!(view, vec![1, 3, 2, 4]);
    }

    #[test]
    fn reduce_executes_sum_over_axis() {
        let ast = parse("b c -> b").unwrap();
        let resolved = resolve(&ast, &[2, 3], None).unwrap();
        let plan =
            plan_rearrange_or_reduce(&ast, &resolved, Some(crate::kernel::ReduceOp::Sum), false)
                .unwrap();
        let input = buf_i32(&[1, 2, 3, 4, 5, 6]);
        let layout = Layout::row_major([2usize, 3]);
        let (out, _dtype, out_layout) = execute(&plan, &input, Dtype::I32, &layout).unwrap();
        assert_eq!(&out_layout.shape[..], &[2]);
        let view: Vec<i32> = out.typed_view(Dtype::I32).unwrap();
        assert_eq!(view, vec![6, 15]);
    }
}
