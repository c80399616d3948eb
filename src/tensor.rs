//! The public tensor handle: binds a device allocation to a dtype and
//! layout, and exposes the kernel primitives and einops operations as
//! methods.

use std::rc::Rc;

use hashbrown::HashMap;
use tracing::{debug, error, instrument};

use crate::config::CoreConfig;
use crate::device::{Device, DeviceHandle};
use crate::dtype::{Buffer, Dtype, FromLeBytes};
use crate::error::{CoreError, CoreResult};
use crate::kernel::{self, BinaryOp, ReduceOp, UnaryOp};
use crate::layout::Layout;

/// A tensor: a device-resident buffer described by a dtype and a
/// shape/stride layout. Views (produced by `rearrange`'s cheap
/// reshape/permute steps) would share a device allocation with their
/// producer; this crate's executor always materializes before returning,
/// so every `Tensor` here owns its allocation outright.
pub struct Tensor<D: Device> {
    device: Rc<D>,
    handle: DeviceHandle,
    dtype: Dtype,
    layout: Layout,
    config: CoreConfig,
}

impl<D: Device> Tensor<D> {
    /// Creates a tensor from raw little-endian bytes, validating that the
    /// byte length matches `shape` under `dtype`.
    #[instrument(skip(device, data))]
    pub fn from_bytes(
        device: Rc<D>,
        shape: impl Into<crate::layout::DimVec>,
        dtype: Dtype,
        data: &[u8],
    ) -> CoreResult<Self> {
        let shape = shape.into();
        let expected = shape.iter().product::<usize>() * dtype.size();
        if data.len() != expected {
            error!(
                got = data.len(),
                expected, "tensor byte length does not match shape/dtype"
            );
            return Err(CoreError::shape(format!(
                "data length {} does not match shape*dtype size {expected}",
                data.len()
            )));
        }
        debug!(?shape, ?dtype, "creating tensor");
        let handle = device.allocate(data.len())?;
        device.write(handle, data)?;
        Ok(Tensor {
            device,
            handle,
            dtype,
            layout: Layout::row_major(shape),
            config: CoreConfig::default(),
        })
    }

    /// Creates a zero-filled tensor of `shape`.
    pub fn zeros(device: Rc<D>, shape: impl Into<crate::layout::DimVec>, dtype: Dtype) -> CoreResult<Self> {
        let shape = shape.into();
        let byte_len = shape.iter().product::<usize>() * dtype.size();
        let handle = device.allocate(byte_len)?;
        Ok(Tensor {
            device,
            handle,
            dtype,
            layout: Layout::row_major(shape),
            config: CoreConfig::default(),
        })
    }

    /// Returns a copy of this tensor's handle with execution tuned by
    /// `config` (e.g. `CoreConfig::fast()` to always parallelize kernels).
    pub fn with_config(mut self, config: CoreConfig) -> Self {
        self.config = config;
        self
    }

    pub fn shape(&self) -> &[usize] {
        &self.layout.shape
    }

    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Reads the tensor's data out as a typed `Vec<T>`, in row-major order
    /// of its logical shape (not necessarily the physical buffer order,
    /// if the layout is non-contiguous).
    pub fn to_vec<T: FromLeBytes>(&self) -> CoreResult<Vec<T>> {
        let bytes = self.device.read(self.handle)?;
        let buffer = Buffer::from_bytes(bytes);
        if self.layout.is_contiguous() && self.layout.offset == 0 {
            return buffer.typed_view(self.dtype);
        }
        let ranges: Vec<kernel::AxisRange> = self
            .layout
            .shape
            .iter()
            .map(|&d| kernel::AxisRange::full(d))
            .collect();
        let (contiguous, _) = kernel::materialize_slice(&buffer, self.dtype, &self.layout, &ranges)?;
        contiguous.typed_view(self.dtype)
    }

    fn read_buffer(&self) -> CoreResult<Buffer> {
        Ok(Buffer::from_bytes(self.device.read(self.handle)?))
    }

    fn from_materialized(
        device: Rc<D>,
        buffer: Buffer,
        dtype: Dtype,
        layout: Layout,
        config: CoreConfig,
    ) -> CoreResult<Self> {
        let handle = device.allocate(buffer.byte_len())?;
        device.write(handle, buffer.as_bytes())?;
        Ok(Tensor {
            device,
            handle,
            dtype,
            layout,
            config,
        })
    }

    #[instrument(skip(self))]
    pub fn unary(&self, op: UnaryOp) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let (out, dtype) = kernel::unary_op_with_config(op, &input, self.dtype, &self.layout, &self.config)?;
        debug!(?op, "unary op complete");
        Self::from_materialized(
            self.device.clone(),
            out,
            dtype,
            Layout::row_major(self.layout.shape.clone()),
            self.config.clone(),
        )
    }

    #[instrument(skip(self, other))]
    pub fn binary(&self, op: BinaryOp, other: &Self) -> CoreResult<Self> {
        let a = self.read_buffer()?;
        let b = other.read_buffer()?;
        let (out, dtype, shape) = kernel::binary_op_with_config(
            op,
            &a,
            self.dtype,
            &self.layout,
            &b,
            other.dtype,
            &other.layout,
            &self.config,
        )?;
        debug!(?op, ?shape, "binary op complete");
        Self::from_materialized(self.device.clone(), out, dtype, Layout::row_major(shape), self.config.clone())
    }

    pub fn matmul(&self, other: &Self) -> CoreResult<Self> {
        let a = self.read_buffer()?;
        let b = other.read_buffer()?;
        let (out, dtype, shape) =
            kernel::matmul(&a, self.dtype, &self.layout, &b, other.dtype, &other.layout)?;
        Self::from_materialized(self.device.clone(), out, dtype, Layout::row_major(shape), self.config.clone())
    }

    pub fn reduce(&self, op: ReduceOp, axes: Option<&[isize]>, keep_dims: bool) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let (out, dtype, shape) =
            kernel::reduce(op, &input, self.dtype, &self.layout, axes, keep_dims)?;
        Self::from_materialized(self.device.clone(), out, dtype, Layout::row_major(shape), self.config.clone())
    }

    pub fn softmax(&self, axis: isize) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let out = kernel::softmax(&input, self.dtype, &self.layout, axis)?;
        Self::from_materialized(self.device.clone(), out, self.dtype, self.layout.clone(), self.config.clone())
    }

    pub fn log_softmax(&self, axis: isize) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let out = kernel::log_softmax(&input, self.dtype, &self.layout, axis)?;
        Self::from_materialized(self.device.clone(), out, self.dtype, self.layout.clone(), self.config.clone())
    }

    #[instrument(skip(self, axes))]
    pub fn rearrange(&self, pattern: &str, axes: Option<&HashMap<String, usize>>) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let (out, dtype, layout) =
            crate::einops::rearrange(&input, self.dtype, &self.layout, pattern, axes)?;
        debug!(pattern, "rearrange complete");
        Self::from_materialized(self.device.clone(), out, dtype, layout, self.config.clone())
    }

    pub fn reduce_pattern(
        &self,
        pattern: &str,
        op: ReduceOp,
        axes: Option<&HashMap<String, usize>>,
        keep_dims: bool,
    ) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let (out, dtype, layout) =
            crate::einops::reduce(&input, self.dtype, &self.layout, pattern, op, axes, keep_dims)?;
        Self::from_materialized(self.device.clone(), out, dtype, layout, self.config.clone())
    }

    pub fn repeat(&self, pattern: &str, axes: &HashMap<String, usize>) -> CoreResult<Self> {
        let input = self.read_buffer()?;
        let (out, dtype, layout) =
            crate::einops::repeat(&input, self.dtype, &self.layout, pattern, axes)?;
        Self::from_materialized(self.device.clone(), out, dtype, layout, self.config.clone())
    }
}

impl<D: Device> Drop for Tensor<D> {
    fn drop(&mut self) {
        let _ = self.device.dispose(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::HostDevice;

    fn i32_bytes(values: &[i32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn binary_add_roundtrip() {
        let device = HostDevice::new(0);
        let a = Tensor::from_bytes(device.clone(), [3usize], Dtype::I32, &i32_bytes(&[1, 2, 3])).unwrap();
        let b = Tensor::from_bytes(device.clone(), [3usize], Dtype::I32, &i32_bytes(&[10, 20, 30])).unwrap();
        let c = a.binary(BinaryOp::Add, &b).unwrap();
        assert_eq!(c.to_vec::<i32>().unwrap(), vec![11, 22, 33]);
    }

    #[test]
    fn rearrange_transpose() {
        let device = HostDevice::new(0);
        let t = Tensor::from_bytes(device, [2usize, 2], Dtype::I32, &i32_bytes(&[1, 2, 3, 4])).unwrap();
        let out = t.rearrange("h w -> w h", None).unwrap();
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![1, 3, 2, 4]);
    }

    #[test]
    fn shape_mismatch_on_construction_is_shape_error() {
        let device = HostDevice::new(0);
        let err = Tensor::from_bytes(device, [3usize], Dtype::I32, &i32_bytes(&[1, 2])).unwrap_err();
        assert!(matches!(err, CoreError::Shape { .. }));
    }
}
