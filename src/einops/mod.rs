//! The einops pattern engine: scan → parse → validate → resolve → plan →
//! execute, driving `rearrange`, `reduce`, and `repeat` against the
//! strided kernel core.

pub mod ast;
pub mod exec;
pub mod parse;
pub mod plan;
pub mod resolve;
pub mod scan;
pub mod validate;

use hashbrown::HashMap;

use crate::dtype::{Buffer, Dtype};
use crate::error::CoreResult;
use crate::kernel::ReduceOp;
use crate::layout::Layout;

pub use ast::Position;
pub use validate::OpKind;

/// `rearrange(buffer, pattern, axes)`: validates and resolves `pattern`
/// against `layout`, plans a sequence of reshape/permute steps, and
/// executes them.
pub fn rearrange(
    buffer: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    pattern: &str,
    axes: Option<&HashMap<String, usize>>,
) -> CoreResult<(Buffer, Dtype, Layout)> {
    let ast = parse::parse(pattern)?;
    validate::validate(&ast, OpKind::Rearrange, axes)?;
    let resolved = resolve::resolve(&ast, &layout.shape, axes)?;
    let plan = plan::plan_rearrange_or_reduce(&ast, &resolved, None, false)?;
    exec::execute(&plan, buffer, dtype, layout)
}

/// `reduce(buffer, pattern, op, axes, keep_dims)`: same pipeline as
/// [`rearrange`] but the planner emits a `Reduce` step for axes dropped
/// between input and output.
pub fn reduce(
    buffer: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    pattern: &str,
    op: ReduceOp,
    axes: Option<&HashMap<String, usize>>,
    keep_dims: bool,
) -> CoreResult<(Buffer, Dtype, Layout)> {
    let ast = parse::parse(pattern)?;
    validate::validate(&ast, OpKind::Reduce, axes)?;
    let resolved = resolve::resolve(&ast, &layout.shape, axes)?;
    let plan = plan::plan_rearrange_or_reduce(&ast, &resolved, Some(op), keep_dims)?;
    exec::execute(&plan, buffer, dtype, layout)
}

/// `repeat(buffer, pattern, axes)`: `axes` must supply a size for every
/// axis that appears only in the output.
pub fn repeat(
    buffer: &Buffer,
    dtype: Dtype,
    layout: &Layout,
    pattern: &str,
    axes: &HashMap<String, usize>,
) -> CoreResult<(Buffer, Dtype, Layout)> {
    let ast = parse::parse(pattern)?;
    validate::validate(&ast, OpKind::Repeat, Some(axes))?;
    let resolved = resolve::resolve(&ast, &layout.shape, Some(axes))?;
    let plan = plan::plan_repeat(&ast, &resolved)?;
    exec::execute(&plan, buffer, dtype, layout)
}
