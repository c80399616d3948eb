use ndcore::{BinaryOp, CoreError, Dtype, HostDevice, ReduceOp, Tensor, UnaryOp};

fn i32_tensor(shape: &[usize], values: &[i32]) -> Tensor<HostDevice> {
    let device = HostDevice::new(0);
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    Tensor::from_bytes(device, shape.to_vec(), Dtype::I32, &bytes).unwrap()
}

fn f32_tensor(shape: &[usize], values: &[f32]) -> Tensor<HostDevice> {
    let device = HostDevice::new(0);
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    Tensor::from_bytes(device, shape.to_vec(), Dtype::F32, &bytes).unwrap()
}

#[test]
fn matmul_matches_concrete_scenario() {
    let a = i32_tensor(&[2, 3], &[1, 2, 3, 4, 5, 6]);
    let b = i32_tensor(&[3, 4], &[7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18]);
    let c = a.matmul(&b).unwrap();
    assert_eq!(c.shape(), &[2, 4]);
    assert_eq!(c.to_vec::<i32>().unwrap(), vec![74, 80, 86, 92, 173, 188, 203, 218]);
}

#[test]
fn matmul_rank_zero_is_shape_error() {
    let device = HostDevice::new(0);
    let a = Tensor::from_bytes(device.clone(), Vec::<usize>::new(), Dtype::I32, &5i32.to_le_bytes()).unwrap();
    let b = Tensor::from_bytes(device, Vec::<usize>::new(), Dtype::I32, &6i32.to_le_bytes()).unwrap();
    let err = a.matmul(&b).unwrap_err();
    assert!(matches!(err, CoreError::Shape { .. }));
}

#[test]
fn subtracting_back_an_added_tensor_recovers_the_original() {
    let a = i32_tensor(&[3], &[10, 20, 30]);
    let b = i32_tensor(&[3], &[1, 2, 3]);
    let sum = a.binary(BinaryOp::Add, &b).unwrap();
    let back = sum.binary(BinaryOp::Sub, &b).unwrap();
    assert_eq!(back.to_vec::<i32>().unwrap(), a.to_vec::<i32>().unwrap());
}

#[test]
fn broadcasting_ones_produces_full_of_twos() {
    let a = i32_tensor(&[4, 1], &[1, 1, 1, 1]);
    let b = i32_tensor(&[1, 3], &[1, 1, 1]);
    let out = a.binary(BinaryOp::Add, &b).unwrap();
    assert_eq!(out.shape(), &[4, 3]);
    assert_eq!(out.to_vec::<i32>().unwrap(), vec![2; 12]);
}

#[test]
fn reduce_sum_matches_concrete_scenario() {
    let t = i32_tensor(&[2, 3], &[1, 2, 3, 4, 5, 6]);
    let out = t.reduce(ReduceOp::Sum, Some(&[1]), false).unwrap();
    assert_eq!(out.shape(), &[2]);
    assert_eq!(out.to_vec::<i32>().unwrap(), vec![6, 15]);
}

#[test]
fn reduce_keep_dims_preserves_rank() {
    let t = i32_tensor(&[2, 3], &[1, 2, 3, 4, 5, 6]);
    let out = t.reduce(ReduceOp::Sum, Some(&[1]), true).unwrap();
    assert_eq!(out.shape(), &[2, 1]);
}

#[test]
fn softmax_sums_to_one_and_matches_formula() {
    let t = f32_tensor(&[3], &[1.0, 2.0, 3.0]);
    let out = t.softmax(0).unwrap();
    let values = out.to_vec::<f32>().unwrap();
    let sum: f32 = values.iter().sum();
    assert!((sum - 1.0).abs() < 1e-6);
    let denom: f32 = [1.0f32, 2.0, 3.0].iter().map(|v| (v - 3.0f32).exp()).sum();
    for (v, expected_raw) in values.iter().zip([1.0f32, 2.0, 3.0]) {
        let expected = (expected_raw - 3.0).exp() / denom;
        assert!((v - expected).abs() < 1e-6);
    }
}

#[test]
fn log_softmax_equals_log_of_softmax() {
    let t = f32_tensor(&[4], &[0.5, -1.0, 2.0, 0.25]);
    let soft = t.softmax(0).unwrap().to_vec::<f32>().unwrap();
    let log_soft = t.log_softmax(0).unwrap().to_vec::<f32>().unwrap();
    for (s, l) in soft.iter().zip(log_soft.iter()) {
        assert!((l - s.ln()).abs() < 1e-6);
    }
}

#[test]
fn unary_square_then_sqrt_recovers_absolute_value() {
    let t = f32_tensor(&[3], &[-2.0, 3.0, -4.0]);
    let squared = t.unary(UnaryOp::Square).unwrap();
    let rooted = squared.unary(UnaryOp::Sqrt).unwrap();
    let values = rooted.to_vec::<f32>().unwrap();
    assert_eq!(values, vec![2.0, 3.0, 4.0]);
}

#[test]
fn shape_dtype_mismatch_on_construction_is_shape_error() {
    let device = HostDevice::new(0);
    let err = Tensor::from_bytes(device, vec![2usize, 2], Dtype::I32, &[0u8; 15]).unwrap_err();
    assert!(matches!(err, CoreError::Shape { .. }));
}
