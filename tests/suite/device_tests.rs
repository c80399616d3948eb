use ndcore::{CoreError, Device, HostDevice};

#[test]
fn allocate_write_read_roundtrip() {
    let device = HostDevice::new(7);
    let handle = device.allocate(4).unwrap();
    device.write(handle, &[9, 8, 7, 6]).unwrap();
    assert_eq!(device.read(handle).unwrap(), vec![9, 8, 7, 6]);
}

#[test]
fn handle_from_another_device_is_device_error() {
    let a = HostDevice::new(1);
    let b = HostDevice::new(2);
    let handle = a.allocate(4).unwrap();
    let err = b.write(handle, &[1, 2, 3, 4]).unwrap_err();
    assert!(matches!(err, CoreError::Device { .. }));
}

#[test]
fn dispose_then_read_returns_empty_bytes() {
    let device = HostDevice::new(0);
    let handle = device.allocate(8).unwrap();
    device.dispose(handle).unwrap();
    assert!(device.read(handle).unwrap().is_empty());
}

#[test]
fn dropping_a_tensor_disposes_its_device_allocation_without_panicking() {
    use ndcore::{Dtype, Tensor};

    let device = HostDevice::new(0);
    {
        let t = Tensor::from_bytes(device.clone(), vec![2usize], Dtype::I32, &[0u8; 8]).unwrap();
        assert_eq!(t.shape(), &[2]);
    }
    // The device itself is still usable after its tensors have dropped.
    let handle = device.allocate(4).unwrap();
    assert_eq!(device.read(handle).unwrap().len(), 4);
}
