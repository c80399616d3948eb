//! Per-dtype scalar read/write helpers shared by the kernel primitives.
//!
//! Kernels work against two numeric domains: `f64` for floating and narrow
//! integer dtypes (narrow integers are widened for the duration of the
//! computation, matching the component design's float-coercion rule), and
//! `i128` for the two wide integer dtypes, which keep their own arithmetic
//! path to avoid precision loss.

use crate::dtype::{Buffer, Dtype};

pub(crate) fn byte_offset(elem_offset: isize, dtype: Dtype) -> usize {
    (elem_offset as usize) * dtype.size()
}

pub(crate) fn read_f64(buf: &Buffer, dtype: Dtype, elem_offset: isize) -> f64 {
    let at = byte_offset(elem_offset, dtype);
    let bytes = &buf.as_bytes()[at..at + dtype.size()];
    match dtype {
        Dtype::I8 => bytes[0] as i8 as f64,
        Dtype::U8 => bytes[0] as f64,
        Dtype::I16 => i16::from_le_bytes(bytes.try_into().unwrap()) as f64,
        Dtype::U16 => u16::from_le_bytes(bytes.try_into().unwrap()) as f64,
        Dtype::I32 => i32::from_le_bytes(bytes.try_into().unwrap()) as f64,
        Dtype::U32 => u32::from_le_bytes(bytes.try_into().unwrap()) as f64,
        Dtype::F32 => f32::from_le_bytes(bytes.try_into().unwrap()) as f64,
        Dtype::F64 => f64::from_le_bytes(bytes.try_into().unwrap()),
        Dtype::I64 => i64::from_le_bytes(bytes.try_into().unwrap()) as f64,
        Dtype::U64 => u64::from_le_bytes(bytes.try_into().unwrap()) as f64,
    }
}

pub(crate) fn write_f64(buf: &mut Buffer, dtype: Dtype, elem_offset: isize, value: f64) {
    let at = byte_offset(elem_offset, dtype);
    let size = dtype.size();
    let out = &mut buf.as_bytes_mut()[at..at + size];
    match dtype {
        Dtype::I8 => out[0] = (value as i8) as u8,
        Dtype::U8 => out[0] = value as u8,
        Dtype::I16 => out.copy_from_slice(&(value as i16).to_le_bytes()),
        Dtype::U16 => out.copy_from_slice(&(value as u16).to_le_bytes()),
        Dtype::I32 => out.copy_from_slice(&(value as i32).to_le_bytes()),
        Dtype::U32 => out.copy_from_slice(&(value as u32).to_le_bytes()),
        Dtype::F32 => out.copy_from_slice(&(value as f32).to_le_bytes()),
        Dtype::F64 => out.copy_from_slice(&value.to_le_bytes()),
        Dtype::I64 => out.copy_from_slice(&(value as i64).to_le_bytes()),
        Dtype::U64 => out.copy_from_slice(&(value as u64).to_le_bytes()),
    }
}

pub(crate) fn read_wide(buf: &Buffer, dtype: Dtype, elem_offset: isize) -> i128 {
    let at = byte_offset(elem_offset, dtype);
    let bytes = &buf.as_bytes()[at..at + dtype.size()];
    match dtype {
        Dtype::I64 => i64::from_le_bytes(bytes.try_into().unwrap()) as i128,
        Dtype::U64 => u64::from_le_bytes(bytes.try_into().unwrap()) as i128,
        other => panic!("read_wide called on non-wide dtype {other:?}"),
    }
}

pub(crate) fn write_wide(buf: &mut Buffer, dtype: Dtype, elem_offset: isize, value: i128) {
    let at = byte_offset(elem_offset, dtype);
    let size = dtype.size();
    let out = &mut buf.as_bytes_mut()[at..at + size];
    match dtype {
        Dtype::I64 => out.copy_from_slice(&(value as i64).to_le_bytes()),
        Dtype::U64 => out.copy_from_slice(&(value as u64).to_le_bytes()),
        other => panic!("write_wide called on non-wide dtype {other:?}"),
    }
}

/// Division by zero for wide integers: `+MAX` if the dividend is positive,
/// else `-MAX` (for unsigned dtypes the low sentinel is 0).
pub(crate) fn wide_div(dtype: Dtype, a: i128, b: i128) -> i128 {
    if b == 0 {
        let (max, min) = dtype.wide_extremes();
        if a > 0 {
            max
        } else {
            min
        }
    } else {
        a / b
    }
}
