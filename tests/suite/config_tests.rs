use ndcore::{BinaryOp, CoreConfig, Dtype, HostDevice, Tensor, UnaryOp};

fn f32_tensor(shape: &[usize], values: &[f32]) -> Tensor<HostDevice> {
    let device = HostDevice::new(0);
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    Tensor::from_bytes(device, shape.to_vec(), Dtype::F32, &bytes).unwrap()
}

#[test]
fn safe_and_fast_presets_produce_identical_unary_results() {
    let values: Vec<f32> = (0..64).map(|i| i as f32 - 32.0).collect();
    let a = f32_tensor(&[64], &values).with_config(CoreConfig::safe());
    let b = f32_tensor(&[64], &values).with_config(CoreConfig::fast());
    let out_a = a.unary(UnaryOp::Square).unwrap();
    let out_b = b.unary(UnaryOp::Square).unwrap();
    assert_eq!(out_a.to_vec::<f32>().unwrap(), out_b.to_vec::<f32>().unwrap());
}

#[test]
fn safe_and_fast_presets_produce_identical_binary_results() {
    let values: Vec<f32> = (0..64).map(|i| i as f32).collect();
    let a = f32_tensor(&[64], &values).with_config(CoreConfig::safe());
    let b = f32_tensor(&[64], &values).with_config(CoreConfig::safe());
    let fast_a = f32_tensor(&[64], &values).with_config(CoreConfig::fast());
    let fast_b = f32_tensor(&[64], &values).with_config(CoreConfig::fast());

    let safe_out = a.binary(BinaryOp::Mul, &b).unwrap();
    let fast_out = fast_a.binary(BinaryOp::Mul, &fast_b).unwrap();
    assert_eq!(safe_out.to_vec::<f32>().unwrap(), fast_out.to_vec::<f32>().unwrap());
}

#[test]
fn builder_methods_override_defaults() {
    let cfg = CoreConfig::default().with_validation(false).with_parallel_threshold(100);
    assert!(!cfg.validate_shapes);
    assert_eq!(cfg.parallel_threshold, 100);
}
