/*
 * @Author       : 老董
 * @Date         : 2026-07-20
 * @Description  : 网络阶段（stage）：可按序组合的 {前向, 反向} 层记录
 *
 * 网络不再逐类手写配对的前向/反向调用序列，而是持有一个有序的
 * `Vec<Box<dyn Stage>>`：前向按序遍历，反向逆序遍历。阶段按名字从
 * ParamSet 读参数、往 GradMap 写同名梯度，缓存经 StageCache 在配对的
 * 前向/反向之间传递一次后丢弃。
 */

use std::sync::Arc;

use ndarray::{ArrayD, ArrayView4, Ix2, Ix4};

use crate::errors::NetError;
use crate::layers::activation::{ActivationCache, Nonlinearity};
use crate::layers::affine::AffineCache;
use crate::layers::conv2d::Conv2dCache;
use crate::layers::max_pool2d::MaxPool2dCache;
use crate::layers::{Conv2dParam, MaxPool2dParam, affine, conv2d, max_pool2d};
use crate::params::{GradMap, ParamSet};

/// 单个阶段的反向缓存。
pub(crate) enum StageCache {
    Conv {
        conv: Conv2dCache,
        act: ActivationCache,
        pool: Option<MaxPool2dCache>,
    },
    Affine {
        affine: AffineCache,
        act: Option<ActivationCache>,
    },
}

/// 网络阶段：一段「卷积/仿射 + 非线性 (+ 池化)」的前向与配对反向。
pub(crate) trait Stage: Send + Sync {
    fn forward(&self, params: &ParamSet, x: ArrayD<f32>)
    -> Result<(ArrayD<f32>, StageCache), NetError>;

    /// 把上游梯度传回输入，并把本阶段参数的梯度写入 `grads`
    /// （权重梯度不含 L2 项，由网络统一叠加）。
    fn backward(
        &self,
        params: &ParamSet,
        dout: ArrayD<f32>,
        cache: StageCache,
        grads: &mut GradMap,
    ) -> Result<ArrayD<f32>, NetError>;
}

fn view4<'a>(x: &'a ArrayD<f32>, what: &str) -> Result<ndarray::ArrayView4<'a, f32>, NetError> {
    x.view()
        .into_dimensionality::<Ix4>()
        .map_err(|_| NetError::ShapeMismatch {
            expected: vec![0, 0, 0, 0],
            got: x.shape().to_vec(),
            message: format!("{what}应为 4 维 [batch, C, H, W]"),
        })
}

/// 卷积阶段：conv -> 非线性 -> （可选）2x2 最大池化。
pub(crate) struct ConvStage {
    pub weight: String,
    pub bias: String,
    pub conv: Conv2dParam,
    pub activation: Arc<dyn Nonlinearity>,
    pub pool: Option<MaxPool2dParam>,
}

impl Stage for ConvStage {
    fn forward(
        &self,
        params: &ParamSet,
        x: ArrayD<f32>,
    ) -> Result<(ArrayD<f32>, StageCache), NetError> {
        let w = params.get4(&self.weight)?;
        let b = params.get1(&self.bias)?;
        let x4 = view4(&x, "卷积阶段输入")?;

        let (a, conv_cache) = conv2d::forward(&x4, &w, &b, &self.conv)?;
        let (s, act_cache) = self.activation.forward(&a.view().into_dyn())?;

        let (out, pool_cache) = match &self.pool {
            Some(pool_param) => {
                let s4 = view4(&s, "池化输入")?;
                let (pooled, cache) = max_pool2d::forward(&s4, pool_param)?;
                (pooled.into_dyn(), Some(cache))
            }
            None => (s, None),
        };

        Ok((
            out,
            StageCache::Conv {
                conv: conv_cache,
                act: act_cache,
                pool: pool_cache,
            },
        ))
    }

    fn backward(
        &self,
        _params: &ParamSet,
        dout: ArrayD<f32>,
        cache: StageCache,
        grads: &mut GradMap,
    ) -> Result<ArrayD<f32>, NetError> {
        let StageCache::Conv { conv, act, pool } = cache else {
            return Err(NetError::ComputationError(
                "卷积阶段收到了非卷积缓存。不该触及本错误，否则说明阶段列表与缓存错位".to_string(),
            ));
        };

        // 逆序：池化 -> 非线性 -> 卷积
        let ds = match (&pool, self.pool.as_ref()) {
            (Some(pool_cache), Some(_)) => {
                let dout4 = view4(&dout, "池化上游梯度")?;
                max_pool2d::backward(&dout4, pool_cache)?.into_dyn()
            }
            (None, None) => dout,
            _ => {
                return Err(NetError::ComputationError(
                    "池化缓存与阶段配置不一致".to_string(),
                ));
            }
        };

        let da = self.activation.backward(&ds.view(), &act);
        let da4 = view4(&da, "卷积上游梯度")?;
        let (dx, dw, db) = conv2d::backward(&da4, &conv)?;

        grads.insert(self.weight.clone(), dw.into_dyn());
        grads.insert(self.bias.clone(), db.into_dyn());
        Ok(dx.into_dyn())
    }
}

/// 仿射阶段：展平 -> x·W + b -> （可选）非线性。
pub(crate) struct AffineStage {
    pub weight: String,
    pub bias: String,
    pub activation: Option<Arc<dyn Nonlinearity>>,
}

impl Stage for AffineStage {
    fn forward(
        &self,
        params: &ParamSet,
        x: ArrayD<f32>,
    ) -> Result<(ArrayD<f32>, StageCache), NetError> {
        let w = params.get2(&self.weight)?;
        let b = params.get1(&self.bias)?;

        let (out, affine_cache) = affine::forward(&x.view(), &w, &b)?;
        let (out, act_cache) = match &self.activation {
            Some(act) => {
                let (s, cache) = act.forward(&out.view().into_dyn())?;
                (s, Some(cache))
            }
            None => (out.into_dyn(), None),
        };

        Ok((
            out,
            StageCache::Affine {
                affine: affine_cache,
                act: act_cache,
            },
        ))
    }

    fn backward(
        &self,
        _params: &ParamSet,
        dout: ArrayD<f32>,
        cache: StageCache,
        grads: &mut GradMap,
    ) -> Result<ArrayD<f32>, NetError> {
        let StageCache::Affine { affine, act } = cache else {
            return Err(NetError::ComputationError(
                "仿射阶段收到了非仿射缓存。不该触及本错误，否则说明阶段列表与缓存错位".to_string(),
            ));
        };

        let dpre = match (&self.activation, &act) {
            (Some(activation), Some(act_cache)) => activation.backward(&dout.view(), act_cache),
            (None, None) => dout,
            _ => {
                return Err(NetError::ComputationError(
                    "非线性缓存与阶段配置不一致".to_string(),
                ));
            }
        };

        let dpre2 = dpre
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| NetError::ShapeMismatch {
                expected: vec![0, 0],
                got: dpre.shape().to_vec(),
                message: "仿射上游梯度应为 2 维 [batch, M]".to_string(),
            })?;
        let (dx, dw, db) = affine::backward(&dpre2, &affine)?;

        grads.insert(self.weight.clone(), dw.into_dyn());
        grads.insert(self.bias.clone(), db.into_dyn());
        Ok(dx)
    }
}

/// 供网络复用的前向遍历。
pub(crate) fn run_forward(
    stages: &[Box<dyn Stage>],
    params: &ParamSet,
    x: &ArrayView4<f32>,
) -> Result<(ndarray::Array2<f32>, Vec<StageCache>), NetError> {
    let mut cur: ArrayD<f32> = x.to_owned().into_dyn();
    let mut caches = Vec::with_capacity(stages.len());
    for stage in stages {
        let (next, cache) = stage.forward(params, cur)?;
        cur = next;
        caches.push(cache);
    }
    let scores = cur
        .into_dimensionality::<Ix2>()
        .map_err(|e| NetError::ComputationError(format!("最终分数应为 2 维：{e}")))?;
    Ok((scores, caches))
}

/// 供网络复用的反向遍历（逆序），返回对输入的梯度。
pub(crate) fn run_backward(
    stages: &[Box<dyn Stage>],
    params: &ParamSet,
    dscores: ndarray::Array2<f32>,
    caches: Vec<StageCache>,
    grads: &mut GradMap,
) -> Result<ArrayD<f32>, NetError> {
    let mut dx: ArrayD<f32> = dscores.into_dyn();
    for (stage, cache) in stages.iter().rev().zip(caches.into_iter().rev()) {
        dx = stage.backward(params, dx, cache, grads)?;
    }
    Ok(dx)
}
