/*
 * @Author       : 老董
 * @Date         : 2026-07-21
 * @Description  : 四层卷积网络分类器（ConvNet2），支持硬件采样非线性
 *
 * 拓扑：
 *   [conv - 非线性 - 2x2 max pool] x2
 *   -> conv - 非线性（第三段不池化）
 *   -> affine - 非线性 -> softmax
 *
 * 非线性策略在构造时一次性选定：解析 sigmoid（Logistic）复刻精确推理；
 * TableSampled 用注入的硬件采样表逐元素查表取值，模拟模拟器件的噪声
 * 推理。两种策略下各层输出形状一致（采样只改变取值）。
 */

use std::sync::Arc;

use ndarray::{Array2, Array4, ArrayD, IxDyn};

use crate::classifiers::stage::{AffineStage, ConvStage, Stage, run_backward, run_forward};
use crate::classifiers::three_layer::add_l2_to_grads;
use crate::errors::NetError;
use crate::layers::activation::{Logistic, Nonlinearity, TableSampled};
use crate::layers::{Conv2dParam, MaxPool2dParam, softmax};
use crate::params::{GradMap, ParamSet, scaled_normal};
use crate::sampling::SampleTable;

/// 前向的运行模式，由是否带标签求损失决定。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Test,
}

/// 预留的归一化参数记录。
///
/// 原型为将来接入批归一化而声明，损失计算从未读取它；仅模式标志
/// 在每次 scores/loss 调用时同步刷新。按「声明而未接线」的现状保留。
#[derive(Debug, Clone, Copy)]
pub struct NormParam {
    pub mode: Mode,
}

pub struct ConvNet2 {
    params: ParamSet,
    stages: Vec<Box<dyn Stage>>,
    bn_params: [NormParam; 4],
    reg: f32,
    num_classes: usize,
}

impl ConvNet2 {
    /// 创建新网络，非线性策略（解析 sigmoid 或硬件查表采样）在此选定。
    ///
    /// # 参数
    /// - `input_dim`: 输入尺寸 (C, H, W)；H、W 须能被 4 整除（两次池化）
    /// - `num_filters`: 三个卷积段的滤波器个数
    /// - `filter_size`: 共用的卷积核边长（须为奇数，same 填充）
    /// - `num_classes`: 类别数
    /// - `weight_scale`: 四组权重各自的初始化标准差
    /// - `reg`: L2 正则强度
    /// - `activation`: 四个非线性段共用的策略
    pub fn new(
        input_dim: (usize, usize, usize),
        num_filters: [usize; 3],
        filter_size: usize,
        num_classes: usize,
        weight_scale: [f32; 4],
        reg: f32,
        activation: Arc<dyn Nonlinearity>,
    ) -> Result<Self, NetError> {
        let (c, h, w) = input_dim;
        let [f1, f2, f3] = num_filters;

        // 1. 验证配置
        let conv = Conv2dParam::same(filter_size)?;
        if h % 4 != 0 || w % 4 != 0 {
            return Err(NetError::InvalidOperation(format!(
                "两次 2x2 池化要求空间尺寸能被 4 整除，得到{h}x{w}"
            )));
        }
        if f1 == 0 || f2 == 0 || f3 == 0 || num_classes == 0 {
            return Err(NetError::InvalidOperation(
                "滤波器数与类别数都必须大于 0".to_string(),
            ));
        }

        // 2. 初始化参数：三段卷积核与一组全连接，形状沿拓扑链通
        //    （same 卷积不改空间尺寸，两次池化共缩小 16 倍）
        let mut params = ParamSet::new();
        params.insert(
            "W1",
            scaled_normal(weight_scale[0], &[f1, c, filter_size, filter_size]),
        );
        params.insert("b1", ArrayD::zeros(IxDyn(&[f1])));
        params.insert(
            "W2",
            scaled_normal(weight_scale[1], &[f2, f1, filter_size, filter_size]),
        );
        params.insert("b2", ArrayD::zeros(IxDyn(&[f2])));
        params.insert(
            "W3",
            scaled_normal(weight_scale[2], &[f3, f2, filter_size, filter_size]),
        );
        params.insert("b3", ArrayD::zeros(IxDyn(&[f3])));
        let flat_dim = f3 * (h / 4) * (w / 4);
        params.insert("W4", scaled_normal(weight_scale[3], &[flat_dim, num_classes]));
        params.insert("b4", ArrayD::zeros(IxDyn(&[num_classes])));

        // 3. 组装阶段列表（第三段卷积不池化；最后的仿射带同款非线性）
        let pool = MaxPool2dParam::half();
        let stages: Vec<Box<dyn Stage>> = vec![
            Box::new(ConvStage {
                weight: "W1".to_string(),
                bias: "b1".to_string(),
                conv,
                activation: activation.clone(),
                pool: Some(pool),
            }),
            Box::new(ConvStage {
                weight: "W2".to_string(),
                bias: "b2".to_string(),
                conv,
                activation: activation.clone(),
                pool: Some(pool),
            }),
            Box::new(ConvStage {
                weight: "W3".to_string(),
                bias: "b3".to_string(),
                conv,
                activation: activation.clone(),
                pool: None,
            }),
            Box::new(AffineStage {
                weight: "W4".to_string(),
                bias: "b4".to_string(),
                activation: Some(activation),
            }),
        ];

        Ok(Self {
            params,
            stages,
            bn_params: [NormParam { mode: Mode::Test }; 4],
            reg,
            num_classes,
        })
    }

    /// 解析 sigmoid 路径（精确推理，前向无随机性）。
    pub fn with_logistic(
        input_dim: (usize, usize, usize),
        num_filters: [usize; 3],
        filter_size: usize,
        num_classes: usize,
        weight_scale: [f32; 4],
        reg: f32,
    ) -> Result<Self, NetError> {
        Self::new(
            input_dim,
            num_filters,
            filter_size,
            num_classes,
            weight_scale,
            reg,
            Arc::new(Logistic),
        )
    }

    /// 硬件采样路径：前向从注入的采样表查表取值。
    pub fn with_sample_table(
        input_dim: (usize, usize, usize),
        num_filters: [usize; 3],
        filter_size: usize,
        num_classes: usize,
        weight_scale: [f32; 4],
        reg: f32,
        table: Arc<SampleTable>,
    ) -> Result<Self, NetError> {
        Self::new(
            input_dim,
            num_filters,
            filter_size,
            num_classes,
            weight_scale,
            reg,
            Arc::new(TableSampled::new(table)),
        )
    }

    /// 把运行模式同步进预留的归一化参数记录（下游暂无人读取）。
    fn set_mode(&mut self, mode: Mode) {
        for bn in &mut self.bn_params {
            bn.mode = mode;
        }
    }

    /// 推理：返回形状 [batch, num_classes] 的分数。
    pub fn scores(&mut self, x: &Array4<f32>) -> Result<Array2<f32>, NetError> {
        self.set_mode(Mode::Test);
        let (scores, _) = run_forward(&self.stages, &self.params, &x.view())?;
        Ok(scores)
    }

    /// 训练：返回（总损失, 8 项梯度映射 W1..W4 / b1..b4）。
    pub fn loss(&mut self, x: &Array4<f32>, y: &[usize]) -> Result<(f32, GradMap), NetError> {
        self.set_mode(Mode::Train);
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

    /// 预留的归一化参数记录（只读暴露，便于检视模式同步）。
    pub fn bn_params(&self) -> &[NormParam; 4] {
        &self.bn_params
    }
}
