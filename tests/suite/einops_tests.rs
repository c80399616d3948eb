use hashbrown::HashMap;

use ndcore::{CoreError, Dtype, HostDevice, Tensor};

fn i32_tensor(shape: &[usize], values: &[i32]) -> Tensor<HostDevice> {
    let device = HostDevice::new(0);
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    Tensor::from_bytes(device, shape.to_vec(), Dtype::I32, &bytes).unwrap()
}

#[test]
fn rearrange_transpose_matches_concrete_scenario() {
    let t = i32_tensor(&[2, 2], &[1, 2, 3, 4]);
    let out = t.rearrange("h w -> w h", None).unwrap();
    assert_eq!(out.shape(), &[2, 2]);
    assert_eq!(out.to_vec::<i32>().unwrap(), vec![1, 3, 2, 4]);
}

#[test]
fn rearrange_is_its_own_inverse() {
    let t = i32_tensor(&[2, 3], &[1, 2, 3, 4, 5, 6]);
    let forward = t.rearrange("h w -> w h", None).unwrap();
    let back = forward.rearrange("w h -> h w", None).unwrap();
    assert_eq!(back.shape(), t.shape());
    assert_eq!(back.to_vec::<i32>().unwrap(), t.to_vec::<i32>().unwrap());
}

#[test]
fn rearrange_with_composite_and_inferred_factor() {
    // b (h ph) w -> b h (ph w), ph=2, on shape [2,4,6] -> output [2,2,12]
    let device = HostDevice::new(0);
    let len = 2 * 4 * 6;
    let values: Vec<i32> = (0..len as i32).collect();
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let t = Tensor::from_bytes(device, vec![2usize, 4, 6], Dtype::I32, &bytes).unwrap();

    let mut axes = HashMap::new();
    axes.insert("ph".to_string(), 2);
    let out = t.rearrange("b (h ph) w -> b h (ph w)", Some(&axes)).unwrap();
    assert_eq!(out.shape(), &[2, 2, 12]);

    // value at out[1,1,11] should equal input at [1,3,5]
    let out_values = out.to_vec::<i32>().unwrap();
    let out_flat = 1 * (2 * 12) + 1 * 12 + 11;
    let in_flat = 1 * (4 * 6) + 3 * 6 + 5;
    assert_eq!(out_values[out_flat], values[in_flat]);
}

#[test]
fn repeat_doubles_each_element() {
    let t = i32_tensor(&[3], &[1, 2, 3]);
    let mut axes = HashMap::new();
    axes.insert("w2".to_string(), 2);
    let out = t.repeat("w -> (w w2)", &axes).unwrap();
    assert_eq!(out.shape(), &[6]);
    assert_eq!(out.to_vec::<i32>().unwrap(), vec![1, 1, 2, 2, 3, 3]);
}

#[test]
fn rearrange_preserves_multiset_of_values() {
    let t = i32_tensor(&[2, 3], &[1, 2, 3, 4, 5, 6]);
    let out = t.rearrange("h w -> w h", None).unwrap();
    let mut original = t.to_vec::<i32>().unwrap();
    let mut rearranged = out.to_vec::<i32>().unwrap();
    original.sort();
    rearranged.sort();
    assert_eq!(original, rearranged);
}

#[test]
fn unknown_output_axis_is_pattern_validation_error() {
    let t = i32_tensor(&[2, 3], &[1, 2, 3, 4, 5, 6]);
    let err = t.rearrange("h w -> h w c", None).unwrap_err();
    assert!(matches!(err, CoreError::PatternValidation { .. }));
}

#[test]
fn non_divisible_composite_is_shape_error() {
    let t = i32_tensor(&[4, 6], &[0; 24]);
    let mut axes = HashMap::new();
    axes.insert("h".to_string(), 3);
    let err = t.rearrange("(h h2) w -> h h2 w", Some(&axes)).unwrap_err();
    assert!(matches!(err, CoreError::Shape { .. }));
}

#[test]
fn unbalanced_paren_is_pattern_parse_error() {
    let t = i32_tensor(&[2, 2], &[1, 2, 3, 4]);
    let err = t.rearrange("(h w -> h w", None).unwrap_err();
    assert!(matches!(err, CoreError::PatternParse { .. }));
}

#[test]
fn repeat_new_output_axis_with_no_provided_size_is_axis_error() {
    let t = i32_tensor(&[3], &[1, 2, 3]);
    let axes = HashMap::new();
    let err = t.repeat("w -> w c", &axes).unwrap_err();
    assert!(matches!(err, CoreError::Axis { .. }));
}

#[test]
fn repeat_non_positive_provided_size_is_axis_error() {
    let t = i32_tensor(&[3], &[1, 2, 3]);
    let mut axes = HashMap::new();
    axes.insert("w2".to_string(), 0);
    let err = t.repeat("w -> (w w2)", &axes).unwrap_err();
    assert!(matches!(err, CoreError::Axis { .. }));
}

#[test]
fn empty_composite_is_pattern_validation_error() {
    let t = i32_tensor(&[1, 3], &[1, 2, 3]);
    let err = t.rearrange("() w -> w", None).unwrap_err();
    assert!(matches!(err, CoreError::PatternValidation { .. }));
}
