/*
 * @Author       : 老董
 * @Date         : 2026-07-20
 * @Description  : 三层卷积网络分类器
 *
 * 拓扑：conv - relu - 2x2 max pool - affine - relu - affine - softmax
 *
 * 输入为形状 [batch, C, H, W] 的图像小批量。参数在构造时按缩放的
 * 标准正态初始化（偏置置零），之后由外部优化器经 params_mut 原地更新。
 */

use std::sync::Arc;

use ndarray::{Array2, Array4, ArrayD, IxDyn, Zip};

use crate::classifiers::stage::{AffineStage, ConvStage, Stage, run_backward, run_forward};
use crate::errors::NetError;
use crate::layers::activation::{Nonlinearity, Relu};
use crate::layers::{Conv2dParam, MaxPool2dParam, softmax};
use crate::params::{GradMap, ParamSet, scaled_normal};

pub struct ThreeLayerConvNet {
    params: ParamSet,
    stages: Vec<Box<dyn Stage>>,
    reg: f32,
    num_classes: usize,
}

impl ThreeLayerConvNet {
    /// 创建新网络。
    ///
    /// # 参数
    /// - `input_dim`: 输入尺寸 (C, H, W)
    /// - `num_filters`: 卷积层的滤波器个数
    /// - `filter_size`: 卷积核边长（须为奇数，same 填充）
    /// - `hidden_dim`: 全连接隐层宽度
    /// - `num_classes`: 类别数
    /// - `weight_scale`: 权重初始化的标准差
    /// - `reg`: L2 正则强度
    ///
    /// 形状在此一次性链通：合法配置下构造不会再出现维度错误。
    pub fn new(
        input_dim: (usize, usize, usize),
        num_filters: usize,
        filter_size: usize,
        hidden_dim: usize,
        num_classes: usize,
        weight_scale: f32,
        reg: f32,
    ) -> Result<Self, NetError> {
        let (c, h, w) = input_dim;

        // 1. 验证配置
        let conv = Conv2dParam::same(filter_size)?;
        if h % 2 != 0 || w % 2 != 0 {
            return Err(NetError::InvalidOperation(format!(
                "2x2 池化要求空间尺寸为偶数，得到{h}x{w}"
            )));
        }
        if num_filters == 0 || hidden_dim == 0 || num_classes == 0 {
            return Err(NetError::InvalidOperation(
                "滤波器数、隐层宽度与类别数都必须大于 0".to_string(),
            ));
        }

        // 2. 初始化参数（same 卷积不改空间尺寸，池化后减半）
        let mut params = ParamSet::new();
        params.insert(
            "W1",
            scaled_normal(weight_scale, &[num_filters, c, filter_size, filter_size]),
        );
        params.insert("b1", ArrayD::zeros(IxDyn(&[num_filters])));
        let pooled_dim = num_filters * (h / 2) * (w / 2);
        params.insert("W2", scaled_normal(weight_scale, &[pooled_dim, hidden_dim]));
        params.insert("b2", ArrayD::zeros(IxDyn(&[hidden_dim])));
        params.insert("W3", scaled_normal(weight_scale, &[hidden_dim, num_classes]));
        params.insert("b3", ArrayD::zeros(IxDyn(&[num_classes])));

        // 3. 组装阶段列表
        let relu: Arc<dyn Nonlinearity> = Arc::new(Relu);
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ConvStage {
                weight: "W1".to_string(),
                bias: "b1".to_string(),
                conv,
                activation: relu.clone(),
                pool: Some(MaxPool2dParam::half()),
            }),
            Box::new(AffineStage {
                weight: "W2".to_string(),
                bias: "b2".to_string(),
                activation: Some(relu),
            }),
            Box::new(AffineStage {
                weight: "W3".to_string(),
                bias: "b3".to_string(),
                activation: None,
            }),
        ];

        Ok(Self {
            params,
            stages,
            reg,
            num_classes,
        })
    }

    /// 推理：返回形状 [batch, num_classes] 的分数，不计算梯度、不保留缓存。
    pub fn scores(&self, x: &Array4<f32>) -> Result<Array2<f32>, NetError> {
        let (scores, _) = run_forward(&self.stages, &self.params, &x.view())?;
        Ok(scores)
    }

    /// 训练：返回（softmax 交叉熵 + L2 正则的总损失, 参数名 -> 梯度）。
    /// 梯度形状与同名参数一致。
    pub fn loss(&self, x: &Array4<f32>, y: &[usize]) -> Result<(f32, GradMap), NetError> {
        let (scores, caches) = run_forward(&self.stages, &self.params, &x.view())?;

        let (mut loss, dscores) = softmax::cross_entropy(&scores.view(), y)?;
        loss += 0.5 * self.reg * self.params.weight_square_sum();

        let mut grads = GradMap::new();
        run_backward(&self.stages, &self.params, dscores, caches, &mut grads)?;
        add_l2_to_grads(&self.params, self.reg, &mut grads)?;

        Ok((loss, grads))
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    /// 供外部优化器原地更新参数。
    pub fn params_mut(&mut self) -> &mut ParamSet {
        &mut self.params
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn reg(&self) -> f32 {
        self.reg
    }
}

/// 给每个权重梯度叠加 L2 项：dW += reg·W。
pub(crate) fn add_l2_to_grads(
    params: &ParamSet,
    reg: f32,
    grads: &mut GradMap,
) -> Result<(), NetError> {
    if reg == 0.0 {
        return Ok(());
    }
    for (name, w) in params.iter().filter(|(name, _)| name.starts_with('W')) {
        let grad = grads.get_mut(name).ok_or_else(|| {
            NetError::ComputationError(format!(
                "反向传播未产生参数{name}的梯度。不该触及本错误，否则说明阶段列表不完整"
            ))
        })?;
        Zip::from(grad).and(w).for_each(|g, &wv| *g += reg * wv);
    }
    Ok(())
}
