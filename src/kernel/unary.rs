use rayon::prelude::*;

use crate::config::CoreConfig;
use crate::dtype::{Buffer, Dtype, NumericClass};
use crate::error::CoreResult;
use crate::layout::Layout;

use super::elem::{read_f64, read_wide, write_f64, write_wide};
use super::offsets;

/// Unary elementwise operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Abs,
    Square,
    Sqrt,
    Exp,
    Log,
    Sin,
    Cos,
}

impl UnaryOp {
    /// Float-output ops widen integer inputs to f64 before computing.
    fn is_float_output(self) -> bool {
        matches!(
            self,
            UnaryOp::Sqrt | UnaryOp::Exp | UnaryOp::Log | UnaryOp::Sin | UnaryOp::Cos
        )
    }

    fn apply_f64(self, x: f64) -> f64 {
        match self {
            UnaryOp::Neg => -x,
            UnaryOp::Abs => x.abs(),
            UnaryOp::Square => x * x,
            UnaryOp::Sqrt => x.sqrt(),
            UnaryOp::Exp => x.exp(),
            UnaryOp::Log => x.ln(),
            UnaryOp::Sin => x.sin(),
            UnaryOp::Cos => x.cos(),
        }
    }
}

/// Applies `op` to every logical element of `input` under `layout`,
/// producing a fresh C-contiguous output buffer and its dtype. Runs under
/// the default [`CoreConfig`]; see [`unary_op_with_config`] to control
/// parallelism.
pub fn unary_op(op: UnaryOp, input: &Buffer, dtype: Dtype, layout: &Layout) -> CoreResult<(Buffer, Dtype)> {
    unary_op_with_config(op, input, dtype, layout, &CoreConfig::default())
}

/// Applies `op` to every logical element of `input` under `layout`,
/// producing a fresh C-contiguous output buffer and its dtype. Above
/// `config.parallel_threshold` elements, the per-element compute (not the
/// write-back) is spread across `rayon`'s thread pool.
pub fn unary_op_with_config(
    op: UnaryOp,
    input: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    config: &CoreConfig,
) -> CoreResult<(Buffer, Dtype)> {
    let len = layout.len();
    let offs: Vec<isize> = offsets(layout).collect();
    let parallel = config.use_parallelism && len >= config.parallel_threshold;

    if op.is_float_output() {
        let out_dtype = if dtype.is_float() { dtype } else { Dtype::F64 };
        let mut out = Buffer::allocate(len * out_dtype.size());
        let values = compute_f64(&offs, parallel, |off| op.apply_f64(read_f64(input, dtype, off)));
        for (i, v) in values.into_iter().enumerate() {
            write_f64(&mut out, out_dtype, i as isize, v);
        }
        return Ok((out, out_dtype));
    }

    match dtype.class() {
        NumericClass::WideInteger => {
            let mut out = Buffer::allocate(len * dtype.size());
            let values = compute_wide(&offs, parallel, |off| {
                let x = read_wide(input, dtype, off);
                match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Abs => {
                        if dtype.is_signed() {
                            x.abs()
                        } else {
                            x
                        }
                    }
                    UnaryOp::Square => x * x,
                    _ => unreachable!("float-output ops handled above"),
                }
            });
            for (i, v) in values.into_iter().enumerate() {
                write_wide(&mut out, dtype, i as isize, v);
            }
            Ok((out, dtype))
        }
        NumericClass::Integer | NumericClass::Float => {
            let mut out = Buffer::allocate(len * dtype.size());
            let values = compute_f64(&offs, parallel, |off| {
                let x = read_f64(input, dtype, off);
                match op {
                    UnaryOp::Neg => -x,
                    UnaryOp::Abs => {
                        if dtype.is_signed() {
                            x.abs()
                        } else {
                            x
                        }
                    }
                    UnaryOp::Square => x * x,
                    _ => unreachable!("float-output ops handled above"),
                }
            });
            for (i, v) in values.into_iter().enumerate() {
                write_f64(&mut out, dtype, i as isize, v);
            }
            Ok((out, dtype))
        }
    }
}

fn compute_f64(offs: &[isize], parallel: bool, f: impl Fn(isize) -> f64 + Sync) -> Vec<f64> {
    if parallel {
        offs.par_iter().map(|&off| f(off)).collect()
    } else {
        offs.iter().map(|&off| f(off)).collect()
    }
}

fn compute_wide(offs: &[isize], parallel: bool, f: impl Fn(isize) -> i128 + Sync) -> Vec<i128> {
    if parallel {
        offs.par_iter().map(|&off| f(off)).collect()
    } else {
        offs.iter().map(|&off| f(off)).collect()
    }
}
