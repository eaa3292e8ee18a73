//! 数值梯度工具（仅测试用）。
//!
//! 用中心差分验证解析梯度：grad[i] ≈ (f(x+h·e_i) - f(x-h·e_i)) / (2h)。

/// 对长度为 `len` 的展平参数逐元素做中心差分。
///
/// `eval(i, d)` 的约定：把第 i 个元素临时加 d，求一次损失，再把
/// 元素还原，返回损失值。
pub fn central_diff<F>(len: usize, h: f32, mut eval: F) -> Vec<f32>
where
    F: FnMut(usize, f32) -> f32,
{
    (0..len)
        .map(|i| (eval(i, h) - eval(i, -h)) / (2.0 * h))
        .collect()
}

/// 断言解析梯度与数值梯度逐元素接近：|a-n| <= tol + tol·(|a|+|n|)。
///
/// 绝对项吸收 f32 中心差分在零附近的噪声，相对项约束大梯度。
pub fn assert_grad_close(analytic: &[f32], numeric: &[f32], tol: f32) {
    assert_eq!(analytic.len(), numeric.len(), "梯度长度不一致");
    for (i, (&a, &n)) in analytic.iter().zip(numeric).enumerate() {
        let bound = tol + tol * (a.abs() + n.abs());
        assert!(
            (a - n).abs() <= bound,
            "第{i}个梯度元素偏差过大：解析{a}，数值{n}（容限{bound}）"
        );
    }
}
