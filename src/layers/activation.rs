/*
 * @Author       : 老董
 * @Date         : 2026-07-19
 * @Description  : 非线性策略：解析函数（relu / sigmoid）与硬件查表采样
 *
 * 非线性在构造网络时一次性选定（而非每次前向传一个开关），每种策略
 * 同时给出前向取值与反向求导两种能力：
 * - Relu / Logistic：前向与反向都是解析的；
 * - TableSampled：前向从实测硬件响应表查表采样，反向用解析 sigmoid
 *   的导数（查表本身没有定义的导数，见该类型的文档）。
 */

use std::sync::Arc;

use ndarray::{ArrayD, ArrayViewD};

use crate::errors::NetError;
use crate::sampling::SampleTable;

/// 非线性阶段的反向缓存。内容的语义由产生它的策略决定：
/// relu 存原始预激活，sigmoid 系存前向输出 s（导数为 s·(1-s)）。
pub struct ActivationCache(ArrayD<f32>);

/// 非线性策略。
///
/// `forward` 返回（激活输出, 反向缓存），`backward` 用缓存把上游梯度
/// 变换为对预激活的梯度。
pub trait Nonlinearity: Send + Sync {
    fn forward(&self, a: &ArrayViewD<f32>) -> Result<(ArrayD<f32>, ActivationCache), NetError>;
    fn backward(&self, dout: &ArrayViewD<f32>, cache: &ActivationCache) -> ArrayD<f32>;
}

/// ReLU：`max(0, x)`。
pub struct Relu;

impl Nonlinearity for Relu {
    fn forward(&self, a: &ArrayViewD<f32>) -> Result<(ArrayD<f32>, ActivationCache), NetError> {
        let out = a.mapv(|v| v.max(0.0));
        Ok((out, ActivationCache(a.to_owned())))
    }

    fn backward(&self, dout: &ArrayViewD<f32>, cache: &ActivationCache) -> ArrayD<f32> {
        let mut grad = dout.to_owned();
        ndarray::Zip::from(&mut grad)
            .and(&cache.0)
            .for_each(|g, &a| {
                if a <= 0.0 {
                    *g = 0.0;
                }
            });
        grad
    }
}

/// 逐元素 sigmoid(x) = 1 / (1 + e^(-x))。
pub(crate) fn sigmoid(a: &ArrayViewD<f32>) -> ArrayD<f32> {
    a.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

/// 逻辑斯蒂（sigmoid）非线性。
///
/// forward: s = 1 / (1 + e^(-x))
/// backward: dL/dx = dout · s · (1 - s)
pub struct Logistic;

impl Nonlinearity for Logistic {
    fn forward(&self, a: &ArrayViewD<f32>) -> Result<(ArrayD<f32>, ActivationCache), NetError> {
        let s = sigmoid(a);
        Ok((s.clone(), ActivationCache(s)))
    }

    fn backward(&self, dout: &ArrayViewD<f32>, cache: &ActivationCache) -> ArrayD<f32> {
        let mut grad = dout.to_owned();
        ndarray::Zip::from(&mut grad)
            .and(&cache.0)
            .for_each(|g, &s| {
                *g *= s * (1.0 - s);
            });
        grad
    }
}

/// 硬件查表采样非线性。
///
/// 前向不计算解析函数：把原始激活量化为桶索引，再为每个元素均匀
/// 随机抽一列，以表中对应的实测硬件响应替代激活值——用带噪声、
/// 离散化的硬件行为替换精确非线性，是保真度与噪声之间的显式取舍，
/// 不是性能优化。输出形状与输入一致（采样改变取值，不改变形状）。
///
/// 反向**有意**使用解析 sigmoid 的导数（缓存的是 sigmoid(a)）：
/// 查表替代本身没有定义的导数，穿过它的训练从构造上就是近似的。
/// 原型实现中这一前向/反向不一致是隐式的，这里将其定为该策略的
/// 明确行为。
pub struct TableSampled {
    table: Arc<SampleTable>,
}

impl TableSampled {
    pub fn new(table: Arc<SampleTable>) -> Self {
        Self { table }
    }
}

impl Nonlinearity for TableSampled {
    fn forward(&self, a: &ArrayViewD<f32>) -> Result<(ArrayD<f32>, ActivationCache), NetError> {
        let sampled = self.table.sample(a);
        Ok((sampled, ActivationCache(sigmoid(a))))
    }

    fn backward(&self, dout: &ArrayViewD<f32>, cache: &ActivationCache) -> ArrayD<f32> {
        // 与 Logistic 相同：dout · s · (1 - s)
        let mut grad = dout.to_owned();
        ndarray::Zip::from(&mut grad)
            .and(&cache.0)
            .for_each(|g, &s| {
                *g *= s * (1.0 - s);
            });
        grad
    }
}
