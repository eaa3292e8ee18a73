/*
 * @Author       : 老董
 * @Date         : 2026-07-18
 * @Description  : 2D 最大池化原语（前向/反向）
 *
 * 前向记录每个输出位置最大值在输入中的展平索引（c*H*W + h*W + w），
 * 反向按索引把上游梯度稀疏散回（其余位置梯度为 0）。
 * 使用 Rayon 在 batch 维度并行加速。
 */

use ndarray::{Array4, ArrayView4};
use rayon::prelude::*;

use crate::errors::NetError;

/// 池化超参数。构造网络时确定，之后不可变。
#[derive(Debug, Clone, Copy)]
pub struct MaxPool2dParam {
    pub height: usize,
    pub width: usize,
    pub stride: usize,
}

impl MaxPool2dParam {
    /// 2x2、步长 2 的标准池化窗口（空间尺寸减半）。
    pub const fn half() -> Self {
        Self {
            height: 2,
            width: 2,
            stride: 2,
        }
    }
}

/// 反向传播所需的中间值。
pub struct MaxPool2dCache {
    /// 每个输出元素对应的最大值展平索引（样本内 c*H*W + h*W + w）
    max_indices: Vec<usize>,
    /// 原始输入形状 [batch, C, H, W]
    input_shape: [usize; 4],
    /// 输出形状 [batch, C, H', W']
    output_shape: [usize; 4],
}

/// 最大池化前向。
pub fn forward(
    x: &ArrayView4<f32>,
    param: &MaxPool2dParam,
) -> Result<(Array4<f32>, MaxPool2dCache), NetError> {
    let (batch, channels, in_h, in_w) = x.dim();
    let (k_h, k_w, stride) = (param.height, param.width, param.stride);

    if k_h > in_h || k_w > in_w {
        return Err(NetError::InvalidOperation(format!(
            "池化窗口{k_h}x{k_w}超出输入尺寸{in_h}x{in_w}"
        )));
    }

    let out_h = (in_h - k_h) / stride + 1;
    let out_w = (in_w - k_w) / stride + 1;
    let single_sample_size = channels * out_h * out_w;

    // Rayon 并行处理每个 batch 样本
    let batch_results: Vec<(Vec<f32>, Vec<usize>)> = (0..batch)
        .into_par_iter()
        .map(|bi| {
            let mut sample_out = vec![0.0f32; single_sample_size];
            let mut sample_idx = vec![0usize; single_sample_size];
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let h_start = oh * stride;
                        let w_start = ow * stride;
                        let mut max_val = f32::NEG_INFINITY;
                        let mut max_pos = 0usize;
                        for kh in 0..k_h {
                            for kw in 0..k_w {
                                let ih = h_start + kh;
                                let iw = w_start + kw;
                                let val = x[[bi, c, ih, iw]];
                                if val > max_val {
                                    max_val = val;
                                    max_pos = c * in_h * in_w + ih * in_w + iw;
                                }
                            }
                        }
                        let idx = c * out_h * out_w + oh * out_w + ow;
                        sample_out[idx] = max_val;
                        sample_idx[idx] = max_pos;
                    }
                }
            }
            (sample_out, sample_idx)
        })
        .collect();

    let mut all_out = Vec::with_capacity(batch * single_sample_size);
    let mut all_idx = Vec::with_capacity(batch * single_sample_size);
    for (out, idx) in batch_results {
        all_out.extend(out);
        all_idx.extend(idx);
    }

    let out = Array4::from_shape_vec((batch, channels, out_h, out_w), all_out)
        .map_err(|e| NetError::ComputationError(format!("池化输出构造失败：{e}")))?;
    let cache = MaxPool2dCache {
        max_indices: all_idx,
        input_shape: [batch, channels, in_h, in_w],
        output_shape: [batch, channels, out_h, out_w],
    };
    Ok((out, cache))
}

/// 最大池化反向：最大值位置的梯度为上游梯度，其余位置为 0。
pub fn backward(dout: &ArrayView4<f32>, cache: &MaxPool2dCache) -> Result<Array4<f32>, NetError> {
    let [batch, channels, in_h, in_w] = cache.input_shape;
    let [_, _, out_h, out_w] = cache.output_shape;

    if dout.dim() != (batch, channels, out_h, out_w) {
        return Err(NetError::ShapeMismatch {
            expected: cache.output_shape.to_vec(),
            got: dout.shape().to_vec(),
            message: "上游梯度形状与池化输出不一致".to_string(),
        });
    }

    let single_in_size = channels * in_h * in_w;
    let single_out_size = channels * out_h * out_w;
    let max_indices = &cache.max_indices;

    let batch_results: Vec<Vec<f32>> = (0..batch)
        .into_par_iter()
        .map(|bi| {
            let mut sample = vec![0.0f32; single_in_size];
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let out_idx = c * out_h * out_w + oh * out_w + ow;
                        let max_pos = max_indices[bi * single_out_size + out_idx];
                        sample[max_pos] += dout[[bi, c, oh, ow]];
                    }
                }
            }
            sample
        })
        .collect();

    let all_data: Vec<f32> = batch_results.into_iter().flatten().collect();
    Array4::from_shape_vec((batch, channels, in_h, in_w), all_data)
        .map_err(|e| NetError::ComputationError(format!("池化梯度构造失败：{e}")))
}
