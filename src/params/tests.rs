//! 参数集合单元测试

use approx::assert_abs_diff_eq;
use ndarray::{ArrayD, IxDyn};

use super::{ParamSet, scaled_normal};
use crate::assert_err;
use crate::errors::NetError;

#[test]
fn test_scaled_normal_shape_and_finiteness() {
    let w = scaled_normal(1e-2, &[3, 2, 5, 5]);
    assert_eq!(w.shape(), &[3, 2, 5, 5]);
    assert!(w.iter().all(|v| v.is_finite()));
}

/// scale 为 0 时所有取值为 0（缩放语义）
#[test]
fn test_scaled_normal_zero_scale() {
    let w = scaled_normal(0.0, &[4, 4]);
    assert!(w.iter().all(|&v| v == 0.0));
}

/// L2 统计只计权重（W 开头），不计偏置
#[test]
fn test_weight_square_sum_ignores_biases() {
    let mut params = ParamSet::new();
    params.insert("W1", ArrayD::from_elem(IxDyn(&[2, 2]), 2.0));
    params.insert("b1", ArrayD::from_elem(IxDyn(&[2]), 100.0));

    assert_abs_diff_eq!(params.weight_square_sum(), 16.0);
}

#[test]
fn test_get_missing_param() {
    let params = ParamSet::new();
    let result = params.get("W1");
    assert_err!(result, NetError::ComputationError { .. });
}

/// 维度视图访问器校验维度
#[test]
fn test_typed_views() {
    let mut params = ParamSet::new();
    params.insert("W1", ArrayD::zeros(IxDyn(&[2, 1, 3, 3])));
    params.insert("b1", ArrayD::zeros(IxDyn(&[2])));

    assert_eq!(params.get4("W1").unwrap().dim(), (2, 1, 3, 3));
    assert_eq!(params.get1("b1").unwrap().len(), 2);
    assert_err!(params.get2("W1"), NetError::ShapeMismatch { .. });
}

/// get_mut 支持外部优化器原地更新
#[test]
fn test_in_place_update() {
    let mut params = ParamSet::new();
    params.insert("W1", ArrayD::from_elem(IxDyn(&[2, 2]), 1.0));

    {
        let w = params.get_mut("W1").unwrap();
        w.mapv_inplace(|v| v - 0.5);
    }
    assert_abs_diff_eq!(params.weight_square_sum(), 1.0);
}
