/*
 * @Author       : 老董
 * @Description  : 层原语单元测试
 *
 * 测试策略：
 * 1. 前向：已知小例的精确值 + 形状
 * 2. 反向：中心差分数值梯度对照解析梯度
 * 3. 错误路径：形状不匹配、非法配置
 */

mod affine;
mod conv2d;

use ndarray::{Array1, Array2, Array4};

/// 生成确定性的「伪随机」数组（sin 打散，无对称性），测试可复现。
pub(crate) fn patterned4(shape: (usize, usize, usize, usize), phase: f32) -> Array4<f32> {
    let len = shape.0 * shape.1 * shape.2 * shape.3;
    Array4::from_shape_vec(
        shape,
        (0..len)
            .map(|i| ((i as f32) * 0.37 + phase).sin() * 0.5)
            .collect(),
    )
    .unwrap()
}

pub(crate) fn patterned2(shape: (usize, usize), phase: f32) -> Array2<f32> {
    let len = shape.0 * shape.1;
    Array2::from_shape_vec(
        shape,
        (0..len)
            .map(|i| ((i as f32) * 0.53 + phase).sin() * 0.5)
            .collect(),
    )
    .unwrap()
}

pub(crate) fn patterned1(len: usize, phase: f32) -> Array1<f32> {
    Array1::from_vec(
        (0..len)
            .map(|i| ((i as f32) * 0.71 + phase).sin() * 0.5)
            .collect(),
    )
}
