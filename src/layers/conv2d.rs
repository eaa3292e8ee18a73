/*
 * @Author       : 老董
 * @Date         : 2026-07-18
 * @Description  : 2D 卷积原语（前向/反向）
 *
 * 形状约定：
 * - 输入：[batch, C_in, H, W]
 * - 卷积核：[C_out, C_in, kH, kW]
 * - 输出：[batch, C_out, H', W']，H' = (H + 2*pad - kH) / stride + 1
 *
 * 使用 Rayon 在 batch 维度并行加速。
 */

use ndarray::{Array1, Array4, ArrayView1, ArrayView4};
use rayon::prelude::*;

use crate::errors::NetError;

/// 卷积超参数。构造网络时确定，之后不可变。
#[derive(Debug, Clone, Copy)]
pub struct Conv2dParam {
    pub stride: usize,
    pub pad: usize,
}

impl Conv2dParam {
    /// `(filter_size - 1) / 2` 的「same」填充：步长 1 时输出空间尺寸不变。
    /// 要求卷积核边长为奇数。
    pub fn same(filter_size: usize) -> Result<Self, NetError> {
        if filter_size % 2 == 0 {
            return Err(NetError::InvalidOperation(format!(
                "same 填充要求卷积核边长为奇数，得到{filter_size}"
            )));
        }
        Ok(Self {
            stride: 1,
            pad: (filter_size - 1) / 2,
        })
    }
}

/// 反向传播所需的中间值。由 [`forward`] 产生，由 [`backward`] 独占消费。
pub struct Conv2dCache {
    /// 填充后的输入
    padded: Array4<f32>,
    /// 原始输入形状 [batch, C_in, H, W]
    input_shape: [usize; 4],
    /// 卷积核 [C_out, C_in, kH, kW]
    weight: Array4<f32>,
    param: Conv2dParam,
}

/// 对输入进行零填充。
fn pad_input(x: &ArrayView4<f32>, pad: usize) -> Array4<f32> {
    if pad == 0 {
        return x.to_owned();
    }
    let (batch, c, h, w) = x.dim();
    let mut padded = Array4::zeros((batch, c, h + 2 * pad, w + 2 * pad));
    padded
        .slice_mut(ndarray::s![.., .., pad..pad + h, pad..pad + w])
        .assign(x);
    padded
}

/// 卷积前向：`out = conv(x, w) + b`。
///
/// 输入通道数与卷积核不一致时返回 [`NetError::ShapeMismatch`]。
pub fn forward(
    x: &ArrayView4<f32>,
    w: &ArrayView4<f32>,
    b: &ArrayView1<f32>,
    param: &Conv2dParam,
) -> Result<(Array4<f32>, Conv2dCache), NetError> {
    let (batch, in_c, in_h, in_w) = x.dim();
    let (out_c, kernel_c, k_h, k_w) = w.dim();

    // 1. 验证通道数匹配
    if in_c != kernel_c {
        return Err(NetError::ShapeMismatch {
            expected: vec![kernel_c],
            got: vec![in_c],
            message: format!("输入通道数{in_c}与卷积核输入通道数{kernel_c}不匹配"),
        });
    }
    if b.len() != out_c {
        return Err(NetError::ShapeMismatch {
            expected: vec![out_c],
            got: vec![b.len()],
            message: "偏置长度应等于输出通道数".to_string(),
        });
    }

    // 2. 计算输出尺寸
    let stride = param.stride;
    let pad = param.pad;
    let padded_h = in_h + 2 * pad;
    let padded_w = in_w + 2 * pad;
    if padded_h < k_h || padded_w < k_w {
        return Err(NetError::InvalidOperation(format!(
            "卷积输出尺寸无效：输入{in_h}x{in_w}，核{k_h}x{k_w}，步长{stride}，填充{pad}"
        )));
    }
    let out_h = (padded_h - k_h) / stride + 1;
    let out_w = (padded_w - k_w) / stride + 1;

    let padded = pad_input(x, pad);
    let single_sample_size = out_c * out_h * out_w;

    // 3. Rayon 并行计算每个 batch 样本
    let batch_results: Vec<Vec<f32>> = (0..batch)
        .into_par_iter()
        .map(|bi| {
            let mut sample = vec![0.0f32; single_sample_size];
            for oc in 0..out_c {
                let bias = b[oc];
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let h_start = oh * stride;
                        let w_start = ow * stride;
                        let mut sum = bias;
                        for ic in 0..in_c {
                            for kh in 0..k_h {
                                for kw in 0..k_w {
                                    sum += padded[[bi, ic, h_start + kh, w_start + kw]]
                                        * w[[oc, ic, kh, kw]];
                                }
                            }
                        }
                        sample[oc * out_h * out_w + oh * out_w + ow] = sum;
                    }
                }
            }
            sample
        })
        .collect();

    let all_data: Vec<f32> = batch_results.into_iter().flatten().collect();
    let out = Array4::from_shape_vec((batch, out_c, out_h, out_w), all_data)
        .map_err(|e| NetError::ComputationError(format!("卷积输出构造失败：{e}")))?;

    let cache = Conv2dCache {
        padded,
        input_shape: [batch, in_c, in_h, in_w],
        weight: w.to_owned(),
        param: *param,
    };
    Ok((out, cache))
}

/// 卷积反向：返回 (dx, dw, db)。
///
/// - dx：把上游梯度经卷积核散回输入位置（转置卷积）
/// - dw：填充输入与上游梯度的相关运算，跨 batch 累加
/// - db：上游梯度按输出通道求和
pub fn backward(
    dout: &ArrayView4<f32>,
    cache: &Conv2dCache,
) -> Result<(Array4<f32>, Array4<f32>, Array1<f32>), NetError> {
    let (batch, out_c, out_h, out_w) = dout.dim();
    let [_, in_c, in_h, in_w] = cache.input_shape;
    let (_, _, k_h, k_w) = cache.weight.dim();
    let stride = cache.param.stride;
    let pad = cache.param.pad;

    if batch != cache.input_shape[0] {
        return Err(NetError::ShapeMismatch {
            expected: vec![cache.input_shape[0]],
            got: vec![batch],
            message: "上游梯度的 batch 维与前向输入不一致".to_string(),
        });
    }

    // 1. dx：每个样本独立，Rayon 并行
    let single_sample_size = in_c * in_h * in_w;
    let dx_batches: Vec<Vec<f32>> = (0..batch)
        .into_par_iter()
        .map(|bi| {
            let mut sample = vec![0.0f32; single_sample_size];
            for oc in 0..out_c {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let grad_val = dout[[bi, oc, oh, ow]];
                        let h_start = oh * stride;
                        let w_start = ow * stride;
                        for ic in 0..in_c {
                            for kh in 0..k_h {
                                for kw in 0..k_w {
                                    let orig_h = (h_start + kh) as isize - pad as isize;
                                    let orig_w = (w_start + kw) as isize - pad as isize;
                                    if orig_h >= 0
                                        && orig_h < in_h as isize
                                        && orig_w >= 0
                                        && orig_w < in_w as isize
                                    {
                                        let idx = ic * in_h * in_w
                                            + orig_h as usize * in_w
                                            + orig_w as usize;
                                        sample[idx] +=
                                            grad_val * cache.weight[[oc, ic, kh, kw]];
                                    }
                                }
                            }
                        }
                    }
                }
            }
            sample
        })
        .collect();

    let dx_data: Vec<f32> = dx_batches.into_iter().flatten().collect();
    let dx = Array4::from_shape_vec((batch, in_c, in_h, in_w), dx_data)
        .map_err(|e| NetError::ComputationError(format!("dx 构造失败：{e}")))?;

    // 2. dw：每个样本算局部梯度，再 reduce 累加
    let kernel_size = out_c * in_c * k_h * k_w;
    let dw_batches: Vec<Vec<f32>> = (0..batch)
        .into_par_iter()
        .map(|bi| {
            let mut sample = vec![0.0f32; kernel_size];
            for oc in 0..out_c {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let grad_val = dout[[bi, oc, oh, ow]];
                        let h_start = oh * stride;
                        let w_start = ow * stride;
                        for ic in 0..in_c {
                            for kh in 0..k_h {
                                for kw in 0..k_w {
                                    let idx =
                                        oc * in_c * k_h * k_w + ic * k_h * k_w + kh * k_w + kw;
                                    sample[idx] += grad_val
                                        * cache.padded[[bi, ic, h_start + kh, w_start + kw]];
                                }
                            }
                        }
                    }
                }
            }
            sample
        })
        .collect();

    let mut dw_data = vec![0.0f32; kernel_size];
    for sample in dw_batches {
        for (acc, g) in dw_data.iter_mut().zip(sample) {
            *acc += g;
        }
    }
    let dw = Array4::from_shape_vec((out_c, in_c, k_h, k_w), dw_data)
        .map_err(|e| NetError::ComputationError(format!("dw 构造失败：{e}")))?;

    // 3. db：按输出通道求和
    let mut db = Array1::zeros(out_c);
    for bi in 0..batch {
        for oc in 0..out_c {
            for oh in 0..out_h {
                for ow in 0..out_w {
                    db[oc] += dout[[bi, oc, oh, ow]];
                }
            }
        }
    }

    Ok((dx, dw, db))
}
