//! 卷积原语单元测试

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array4};

use super::{patterned1, patterned4};
use crate::assert_err;
use crate::errors::NetError;
use crate::layers::Conv2dParam;
use crate::layers::conv2d;
use crate::utils::grad_check::{assert_grad_close, central_diff};

/// same 填充、步长 1：空间尺寸不变
#[test]
fn test_conv2d_same_padding_shape() {
    let x = patterned4((2, 3, 8, 8), 0.0);
    let w = patterned4((4, 3, 3, 3), 1.0);
    let b = Array1::zeros(4);
    let param = Conv2dParam::same(3).unwrap();

    let (out, _) = conv2d::forward(&x.view(), &w.view(), &b.view(), &param).unwrap();
    assert_eq!(out.dim(), (2, 4, 8, 8));
}

/// same 填充要求卷积核边长为奇数
#[test]
fn test_conv2d_same_padding_rejects_even_kernel() {
    let result = Conv2dParam::same(4);
    assert_err!(result, NetError::InvalidOperation { .. });
}

/// 全 1 输入与全 1 核、pad 1：输出等于窗口内的有效元素个数
#[test]
fn test_conv2d_known_values() {
    let x = Array4::from_elem((1, 1, 3, 3), 1.0);
    let w = Array4::from_elem((1, 1, 3, 3), 1.0);
    let b = Array1::zeros(1);
    let param = Conv2dParam { stride: 1, pad: 1 };

    let (out, _) = conv2d::forward(&x.view(), &w.view(), &b.view(), &param).unwrap();
    assert_eq!(out.dim(), (1, 1, 3, 3));
    // 角落窗口覆盖 4 个有效元素，边 6 个，中心 9 个
    assert_abs_diff_eq!(out[[0, 0, 0, 0]], 4.0);
    assert_abs_diff_eq!(out[[0, 0, 0, 1]], 6.0);
    assert_abs_diff_eq!(out[[0, 0, 1, 1]], 9.0);
    assert_abs_diff_eq!(out[[0, 0, 2, 2]], 4.0);
}

/// 偏置逐输出通道叠加
#[test]
fn test_conv2d_bias() {
    let x = Array4::zeros((1, 1, 2, 2));
    let w = Array4::from_elem((2, 1, 1, 1), 1.0);
    let b = Array1::from_vec(vec![0.5, -1.5]);
    let param = Conv2dParam { stride: 1, pad: 0 };

    let (out, _) = conv2d::forward(&x.view(), &w.view(), &b.view(), &param).unwrap();
    assert_abs_diff_eq!(out[[0, 0, 1, 1]], 0.5);
    assert_abs_diff_eq!(out[[0, 1, 0, 0]], -1.5);
}

/// 输入通道数与卷积核不匹配
#[test]
fn test_conv2d_channel_mismatch() {
    let x = patterned4((1, 2, 4, 4), 0.0);
    let w = patterned4((3, 1, 3, 3), 1.0);
    let b = Array1::zeros(3);
    let param = Conv2dParam::same(3).unwrap();

    let result = conv2d::forward(&x.view(), &w.view(), &b.view(), &param);
    assert_err!(result, NetError::ShapeMismatch { .. });
}

/// 数值梯度对照：dx、dw、db
#[test]
fn test_conv2d_gradients() {
    let x = patterned4((2, 2, 4, 4), 0.2);
    let w = patterned4((3, 2, 3, 3), 1.1);
    let b = patterned1(3, 2.3);
    let param = Conv2dParam::same(3).unwrap();
    // 以 L = Σ out·pat 为标量损失，dL/dout = pat
    let pat = patterned4((2, 3, 4, 4), 3.7);

    let (_, cache) = conv2d::forward(&x.view(), &w.view(), &b.view(), &param).unwrap();
    let (dx, dw, db) = conv2d::backward(&pat.view(), &cache).unwrap();

    let loss = |x: &Array4<f32>, w: &Array4<f32>, b: &Array1<f32>| -> f32 {
        let (out, _) = conv2d::forward(&x.view(), &w.view(), &b.view(), &param).unwrap();
        (&out * &pat).sum()
    };

    let h = 1e-2;
    let mut xm = x.clone();
    let dx_num = central_diff(xm.len(), h, |i, d| {
        xm.as_slice_mut().unwrap()[i] += d;
        let l = loss(&xm, &w, &b);
        xm.as_slice_mut().unwrap()[i] -= d;
        l
    });
    assert_grad_close(dx.as_slice().unwrap(), &dx_num, 1e-2);

    let mut wm = w.clone();
    let dw_num = central_diff(wm.len(), h, |i, d| {
        wm.as_slice_mut().unwrap()[i] += d;
        let l = loss(&x, &wm, &b);
        wm.as_slice_mut().unwrap()[i] -= d;
        l
    });
    assert_grad_close(dw.as_slice().unwrap(), &dw_num, 1e-2);

    let mut bm = b.clone();
    let db_num = central_diff(bm.len(), h, |i, d| {
        bm.as_slice_mut().unwrap()[i] += d;
        let l = loss(&x, &w, &bm);
        bm.as_slice_mut().unwrap()[i] -= d;
        l
    });
    assert_grad_close(db.as_slice().unwrap(), &db_num, 1e-2);
}
