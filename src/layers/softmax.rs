/*
 * @Author       : 老董
 * @Date         : 2026-07-19
 * @Description  : softmax + 交叉熵损失（数值稳定版）
 *
 * 数值稳定计算（log-sum-exp 技巧）：
 * softmax(x)_i = exp(x_i - max(x)) / Σ exp(x_j - max(x))
 * L = mean_b[ -(x_y - max(x) - log Σ exp(x_j - max(x))) ]
 * dL/dx = (softmax(x) - onehot(y)) / N
 */

use ndarray::{Array2, ArrayView2};

use crate::errors::NetError;

/// 对 `[batch, num_classes]` 的分数与整数标签计算交叉熵损失（batch 均值）
/// 及其对分数的梯度。
///
/// 标签数量与 batch 不符返回 [`NetError::ShapeMismatch`]；
/// 标签越界返回 [`NetError::InvalidOperation`]。
pub fn cross_entropy(
    scores: &ArrayView2<f32>,
    labels: &[usize],
) -> Result<(f32, Array2<f32>), NetError> {
    let (batch, num_classes) = scores.dim();

    // 1. 验证标签
    if labels.len() != batch {
        return Err(NetError::ShapeMismatch {
            expected: vec![batch],
            got: vec![labels.len()],
            message: "标签数量应等于 batch 大小".to_string(),
        });
    }
    if let Some(&bad) = labels.iter().find(|&&y| y >= num_classes) {
        return Err(NetError::InvalidOperation(format!(
            "标签{bad}越界（类别数为{num_classes}）"
        )));
    }

    // 2. 数值稳定的 softmax 与损失
    let mut probs = Array2::zeros((batch, num_classes));
    let mut loss = 0.0f32;
    for bi in 0..batch {
        let mut max_val = scores[[bi, 0]];
        for c in 1..num_classes {
            if scores[[bi, c]] > max_val {
                max_val = scores[[bi, c]];
            }
        }

        let mut sum_exp = 0.0f32;
        for c in 0..num_classes {
            let e = (scores[[bi, c]] - max_val).exp();
            probs[[bi, c]] = e;
            sum_exp += e;
        }
        for c in 0..num_classes {
            probs[[bi, c]] /= sum_exp;
        }

        loss -= scores[[bi, labels[bi]]] - max_val - sum_exp.ln();
    }
    loss /= batch as f32;

    // 3. 梯度：(softmax - onehot) / N
    let mut dscores = probs;
    for (bi, &y) in labels.iter().enumerate() {
        dscores[[bi, y]] -= 1.0;
    }
    dscores.mapv_inplace(|v| v / batch as f32);

    Ok((loss, dscores))
}
