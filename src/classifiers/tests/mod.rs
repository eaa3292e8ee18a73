/*
 * @Author       : 老董
 * @Description  : 分类器端到端测试
 *
 * 测试策略：
 * 1. 构造：合法配置形状链通，非法配置报错
 * 2. 前向：分数形状、确定性（解析路径）
 * 3. 反向：全参数数值梯度对照、正则单调性
 * 4. 硬件采样路径：形状不变、梯度齐全
 */


use ndarray::Array4;

use crate::params::ParamSet;

/// 把参数覆写为确定性的小值（sin 打散），使前向可复现、梯度检查可做。
pub(crate) fn fill_deterministic(params: &mut ParamSet, seed: f32) {
    let names: Vec<String> = params.names().map(str::to_string).collect();
    for (k, name) in names.iter().enumerate() {
        let p = params.get_mut(name).unwrap();
        for (i, v) in p.iter_mut().enumerate() {
            *v = ((i as f32) * 0.7 + (k as f32) * 1.3 + seed).sin() * 0.1;
        }
    }
}

/// 把 `src` 的参数逐名拷贝进 `dst`（形状须一致）。
pub(crate) fn copy_params(src: &ParamSet, dst: &mut ParamSet) {
    for (name, value) in src.iter() {
        *dst.get_mut(name).unwrap() = value.clone();
    }
}

/// 确定性的输入小批量。
pub(crate) fn input_batch(shape: (usize, usize, usize, usize), phase: f32) -> Array4<f32> {
    let len = shape.0 * shape.1 * shape.2 * shape.3;
    Array4::from_shape_vec(
        shape,
        (0..len)
            .map(|i| ((i as f32) * 0.41 + phase).sin() * 0.5)
            .collect(),
    )
    .unwrap()
}
