//! # ndcore
//!
//! A type-safe, strided multidimensional tensor core with an einops-style
//! pattern engine built on top of it.
//!
//! ## Features
//!
//! - A typed, dtype-generic strided tensor kernel (elementwise ops with
//!   NumPy broadcasting, reductions, softmax, matmul, slicing)
//! - `rearrange`/`reduce`/`repeat` einops notation, including ellipsis and
//!   composite axis groups
//! - A pluggable device interface with an in-process reference backend
//!
//! ## Example
//!
//! ```ignore
//! use ndcore::{Tensor, device::HostDevice};
//!
//! let device = HostDevice::new(0);
//! let t = Tensor::from_bytes(device, [2usize, 3], ndcore::Dtype::F32, &bytes)?;
//! let out = t.rearrange("h w -> w h", None)?;
//! ```

pub mod config;
pub mod device;
pub mod dtype;
pub mod einops;
pub mod error;
pub mod kernel;
pub mod layout;
pub mod tensor;

pub use config::CoreConfig;
pub use device::{Device, DeviceHandle, HostDevice};
pub use dtype::{Buffer, Dtype, FromLeBytes, NumericClass};
pub use error::{CoreError, CoreResult};
pub use kernel::{BinaryOp, ReduceOp, UnaryOp};
pub use layout::{DimVec, Layout, StrideVec};
pub use tensor::Tensor;
