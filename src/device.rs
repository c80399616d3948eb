//! The device interface consumed by the core, and an in-process reference
//! implementation (`HostDevice`) so the crate is runnable standalone
//! without a separate allocator backend.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, instrument};

use crate::dtype::Buffer;
use crate::error::{CoreError, CoreResult};

/// Opaque handle to device-resident memory. Two handles are equal only if
/// they name the same allocation on the same device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceHandle {
    device_id: u32,
    slot: u32,
}

/// The allocate/read/write/dispose contract the core needs from a device.
/// `HostDevice` is the only implementation shipped here; other backends
/// (e.g. a WASM or GPU allocator) are out of scope for this crate.
pub trait Device {
    fn id(&self) -> u32;
    fn allocate(&self, byte_len: usize) -> CoreResult<DeviceHandle>;
    fn read(&self, handle: DeviceHandle) -> CoreResult<Vec<u8>>;
    fn write(&self, handle: DeviceHandle, bytes: &[u8]) -> CoreResult<()>;
    /// Replaces the handle's buffer with an empty one. Safe to call more
    /// than once on the same handle.
    fn dispose(&self, handle: DeviceHandle) -> CoreResult<()>;
}

/// An in-process device: allocations are plain [`Buffer`]s kept in a
/// vector, indexed by `DeviceHandle::slot`.
#[derive(Debug)]
pub struct HostDevice {
    id: u32,
    slots: RefCell<Vec<Buffer>>,
}

impl HostDevice {
    pub fn new(id: u32) -> Rc<Self> {
        Rc::new(HostDevice {
            id,
            slots: RefCell::new(Vec::new()),
        })
    }

    fn check_owner(&self, handle: DeviceHandle) -> CoreResult<()> {
        if handle.device_id != self.id {
            return Err(CoreError::device(format!(
                "handle belongs to device {} but was used against device {}",
                handle.device_id, self.id
            )));
        }
        Ok(())
    }
}

impl Device for HostDevice {
    fn id(&self) -> u32 {
        self.id
    }

    #[instrument(skip(self))]
    fn allocate(&self, byte_len: usize) -> CoreResult<DeviceHandle> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.len() as u32;
        slots.push(Buffer::allocate(byte_len));
        debug!(byte_len, slot, "allocated host buffer");
        Ok(DeviceHandle {
            device_id: self.id,
            slot,
        })
    }

    fn read(&self, handle: DeviceHandle) -> CoreResult<Vec<u8>> {
        self.check_owner(handle)?;
        let slots = self.slots.borrow();
        let buf = slots.get(handle.slot as usize).ok_or_else(|| {
            CoreError::device(format!("no allocation at slot {}", handle.slot))
        })?;
        Ok(buf.read_copy())
    }

    fn write(&self, handle: DeviceHandle, bytes: &[u8]) -> CoreResult<()> {
        self.check_owner(handle)?;
        let mut slots = self.slots.borrow_mut();
        let buf = slots.get_mut(handle.slot as usize).ok_or_else(|| {
            CoreError::device(format!("no allocation at slot {}", handle.slot))
        })?;
        buf.write_from(bytes)
    }

    fn dispose(&self, handle: DeviceHandle) -> CoreResult<()> {
        self.check_owner(handle)?;
        let mut slots = self.slots.borrow_mut();
        if let Some(buf) = slots.get_mut(handle.slot as usize) {
            buf.dispose();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_read_write_roundtrip() {
        let device = HostDevice::new(0);
        let handle = device.allocate(4).unwrap();
        device.write(handle, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.read(handle).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn write_length_mismatch_is_io_error() {
        let device = HostDevice::new(0);
        let handle = device.allocate(4).unwrap();
        let err = device.write(handle, &[1, 2]).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[test]
    fn cross_device_handle_is_device_error() {
        let a = HostDevice::new(0);
        let b = HostDevice::new(1);
        let handle = a.allocate(4).unwrap();
        let err = b.read(handle).unwrap_err();
        assert!(matches!(err, CoreError::Device { .. }));
    }

    #[test]
    fn dispose_is_idempotent() {
        let device = HostDevice::new(0);
        let handle = device.allocate(4).unwrap();
        device.dispose(handle).unwrap();
        device.dispose(handle).unwrap();
        assert_eq!(device.read(handle).unwrap().len(), 0);
    }
}
