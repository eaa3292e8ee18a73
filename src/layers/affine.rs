/*
 * @Author       : 老董
 * @Date         : 2026-07-18
 * @Description  : 仿射（全连接）原语（前向/反向）
 *
 * 输入可为任意维度 [batch, ...]：每个样本先展平为一行再做 x·W + b。
 * 反向把 dx 还原为前向输入的原始形状。
 */

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis, IxDyn};

use crate::errors::NetError;

/// 反向传播所需的中间值。
pub struct AffineCache {
    /// 展平成行的输入 [batch, D]
    rows: Array2<f32>,
    /// 原始输入形状
    input_shape: Vec<usize>,
    /// 权重 [D, M]
    weight: Array2<f32>,
}

/// 仿射前向：`out = flatten(x)·W + b`。
pub fn forward(
    x: &ArrayViewD<f32>,
    w: &ArrayView2<f32>,
    b: &ArrayView1<f32>,
) -> Result<(Array2<f32>, AffineCache), NetError> {
    let input_shape = x.shape().to_vec();
    if input_shape.is_empty() {
        return Err(NetError::InvalidOperation(
            "仿射层输入至少需要 1 个维度（batch）".to_string(),
        ));
    }
    let batch = input_shape[0];
    let flat: usize = input_shape[1..].iter().product();

    let (in_dim, out_dim) = (w.dim().0, w.dim().1);
    if flat != in_dim {
        return Err(NetError::ShapeMismatch {
            expected: vec![batch, in_dim],
            got: input_shape,
            message: "展平后的样本维度与权重行数不匹配".to_string(),
        });
    }
    if b.len() != out_dim {
        return Err(NetError::ShapeMismatch {
            expected: vec![out_dim],
            got: vec![b.len()],
            message: "偏置长度应等于权重列数".to_string(),
        });
    }

    // 逐元素收集保证行主序，对非标准内存布局的视图同样正确
    let rows = Array2::from_shape_vec((batch, flat), x.iter().copied().collect())
        .map_err(|e| NetError::ComputationError(format!("展平输入失败：{e}")))?;

    let mut out = rows.dot(w);
    out += &b.insert_axis(Axis(0));

    let cache = AffineCache {
        rows,
        input_shape,
        weight: w.to_owned(),
    };
    Ok((out, cache))
}

/// 仿射反向：返回 (dx, dw, db)，dx 形状与前向输入一致。
pub fn backward(
    dout: &ArrayView2<f32>,
    cache: &AffineCache,
) -> Result<(ArrayD<f32>, Array2<f32>, Array1<f32>), NetError> {
    let (batch, _) = cache.rows.dim();
    if dout.dim().0 != batch {
        return Err(NetError::ShapeMismatch {
            expected: vec![batch, cache.weight.dim().1],
            got: dout.shape().to_vec(),
            message: "上游梯度的 batch 维与前向输入不一致".to_string(),
        });
    }

    let dw = cache.rows.t().dot(dout);
    let db = dout.sum_axis(Axis(0));
    let dx_rows = dout.dot(&cache.weight.t());

    let dx = ArrayD::from_shape_vec(
        IxDyn(&cache.input_shape),
        dx_rows.iter().copied().collect(),
    )
    .map_err(|e| NetError::ComputationError(format!("dx 还原形状失败：{e}")))?;

    Ok((dx, dw, db))
}
