/*
 * @Author       : 老董
 * @Date         : 2026-07-18
 * @Description  : 网络参数集合（名字 -> 数组）与梯度映射
 */

use std::collections::BTreeMap;

use ndarray::{ArrayD, ArrayView1, ArrayView2, ArrayView4, Ix1, Ix2, Ix4};
use rand::Rng;

use crate::errors::NetError;

/// 梯度映射：参数名 -> 梯度数组，形状与同名参数一致。
pub type GradMap = BTreeMap<String, ArrayD<f32>>;

/// 参数集合。
///
/// 按名字（"W1"、"b1"…）存放权重/偏置数组。约定权重名以 `W` 开头、
/// 偏置名以 `b` 开头，L2 正则只统计权重。参数在网络构造时创建，
/// 之后由外部优化器通过 [`ParamSet::get_mut`] 原地更新；
/// 网络求损失时只读。
#[derive(Debug, Clone, Default)]
pub struct ParamSet {
    entries: BTreeMap<String, ArrayD<f32>>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, name: &str, value: ArrayD<f32>) {
        self.entries.insert(name.to_string(), value);
    }

    /// 按名字取参数。名字不存在视为 crate 内部错误。
    pub fn get(&self, name: &str) -> Result<&ArrayD<f32>, NetError> {
        self.entries.get(name).ok_or_else(|| {
            NetError::ComputationError(format!("参数{name}不存在。不该触及本错误，否则说明网络构造与阶段列表不一致"))
        })
    }

    /// 按名字取可变参数（供外部优化器原地更新）。
    pub fn get_mut(&mut self, name: &str) -> Result<&mut ArrayD<f32>, NetError> {
        self.entries.get_mut(name).ok_or_else(|| {
            NetError::ComputationError(format!("参数{name}不存在。不该触及本错误，否则说明网络构造与阶段列表不一致"))
        })
    }

    /// 以 4 维视图取参数（卷积核）。
    pub fn get4(&self, name: &str) -> Result<ArrayView4<f32>, NetError> {
        let value = self.get(name)?;
        value
            .view()
            .into_dimensionality::<Ix4>()
            .map_err(|_| NetError::ShapeMismatch {
                expected: vec![0, 0, 0, 0],
                got: value.shape().to_vec(),
                message: format!("参数{name}应为 4 维数组"),
            })
    }

    /// 以 2 维视图取参数（全连接权重）。
    pub fn get2(&self, name: &str) -> Result<ArrayView2<f32>, NetError> {
        let value = self.get(name)?;
        value
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| NetError::ShapeMismatch {
                expected: vec![0, 0],
                got: value.shape().to_vec(),
                message: format!("参数{name}应为 2 维数组"),
            })
    }

    /// 以 1 维视图取参数（偏置）。
    pub fn get1(&self, name: &str) -> Result<ArrayView1<f32>, NetError> {
        let value = self.get(name)?;
        value
            .view()
            .into_dimensionality::<Ix1>()
            .map_err(|_| NetError::ShapeMismatch {
                expected: vec![0],
                got: value.shape().to_vec(),
                message: format!("参数{name}应为 1 维数组"),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArrayD<f32>)> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 所有权重（名字以 `W` 开头）的平方和 ΣW·W，用于 L2 正则项。
    pub fn weight_square_sum(&self) -> f32 {
        self.entries
            .iter()
            .filter(|(name, _)| name.starts_with('W'))
            .map(|(_, w)| w.iter().map(|v| v * v).sum::<f32>())
            .sum()
    }
}

/// 生成按 `scale` 缩放的标准正态随机数组（Box-Muller 变换）。
///
/// 权重初始化用；偏置直接用 [`ArrayD::zeros`]。
pub fn scaled_normal(scale: f32, shape: &[usize]) -> ArrayD<f32> {
    let mut rng = rand::thread_rng();
    let data_len: usize = shape.iter().product();
    let mut data = Vec::with_capacity(data_len);

    while data.len() < data_len {
        let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
        let u2: f32 = rng.gen_range(0.0..1.0);
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f32::consts::PI * u2;
        let z0 = scale * r * theta.cos();
        let z1 = scale * r * theta.sin();

        if z0.is_finite() {
            data.push(z0);
        }
        if data.len() < data_len && z1.is_finite() {
            data.push(z1);
        }
    }

    ArrayD::from_shape_vec(ndarray::IxDyn(shape), data)
        .expect("shape 与数据长度一致，构造不会失败")
}

#[cfg(test)]
mod tests;
