//! Strided tensor kernel primitives: unary/binary elementwise ops with
//! broadcasting, reductions, softmax, matmul, and materializing slice.
//!
//! All kernels accept typed buffer views plus shape/stride metadata and
//! produce a fresh, C-contiguous output buffer.

mod binary;
mod elem;
mod matmul;
mod reduce;
mod slice;
mod softmax;
mod unary;

pub use binary::{binary_op, binary_op_with_config, BinaryOp};
pub use matmul::matmul;
pub use reduce::{reduce, ReduceOp};
pub use slice::{materialize_slice, AxisRange};
pub use softmax::{log_softmax, softmax};
pub use unary::{unary_op, unary_op_with_config, UnaryOp};

use crate::layout::Layout;

/// Element offsets (in elements, including the layout's base offset) for
/// every logical position of `layout`, in row-major order of its shape.
pub(crate) fn offsets(layout: &Layout) -> impl Iterator<Item = isize> + '_ {
    let len = layout.len();
    (0..len).map(move |i| layout.coord_to_flat(&layout.flat_to_coord(i)))
}
