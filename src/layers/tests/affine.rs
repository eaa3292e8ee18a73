//! 仿射原语单元测试

use approx::assert_abs_diff_eq;
use ndarray::{Array1, Array2};

use super::{patterned1, patterned2, patterned4};
use crate::assert_err;
use crate::errors::NetError;
use crate::layers::affine;
use crate::utils::grad_check::{assert_grad_close, central_diff};

/// 2 维输入的已知小例
#[test]
fn test_affine_forward_values() {
    let x = Array2::from_shape_vec((2, 3), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let w = Array2::from_shape_vec((3, 2), vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
    let b = Array1::from_vec(vec![0.5, -0.5]);

    let (out, _) = affine::forward(&x.view().into_dyn(), &w.view(), &b.view()).unwrap();
    assert_eq!(out.dim(), (2, 2));
    assert_abs_diff_eq!(out[[0, 0]], 1.0 + 3.0 + 0.5);
    assert_abs_diff_eq!(out[[0, 1]], 2.0 + 3.0 - 0.5);
    assert_abs_diff_eq!(out[[1, 0]], 4.0 + 6.0 + 0.5);
    assert_abs_diff_eq!(out[[1, 1]], 5.0 + 6.0 - 0.5);
}

/// 4 维输入逐样本展平，dx 还原为输入形状
#[test]
fn test_affine_flattens_4d_input() {
    let x = patterned4((2, 2, 3, 3), 0.3);
    let w = patterned2((18, 4), 1.2);
    let b = patterned1(4, 2.1);

    let (out, cache) = affine::forward(&x.view().into_dyn(), &w.view(), &b.view()).unwrap();
    assert_eq!(out.dim(), (2, 4));

    let dout = patterned2((2, 4), 3.3);
    let (dx, dw, db) = affine::backward(&dout.view(), &cache).unwrap();
    assert_eq!(dx.shape(), &[2, 2, 3, 3]);
    assert_eq!(dw.dim(), (18, 4));
    assert_eq!(db.len(), 4);
}

/// 展平维度与权重行数不匹配
#[test]
fn test_affine_dim_mismatch() {
    let x = patterned4((2, 2, 3, 3), 0.0);
    let w = patterned2((10, 4), 0.0);
    let b = patterned1(4, 0.0);
    let result = affine::forward(&x.view().into_dyn(), &w.view(), &b.view());
    assert_err!(result, NetError::ShapeMismatch { .. });
}

/// 数值梯度对照：dx、dw、db
#[test]
fn test_affine_gradients() {
    let x = patterned2((3, 5), 0.4);
    let w = patterned2((5, 4), 1.5);
    let b = patterned1(4, 2.6);
    let pat = patterned2((3, 4), 3.7);

    let (_, cache) = affine::forward(&x.view().into_dyn(), &w.view(), &b.view()).unwrap();
    let (dx, dw, db) = affine::backward(&pat.view(), &cache).unwrap();

    let loss = |x: &Array2<f32>, w: &Array2<f32>, b: &Array1<f32>| -> f32 {
        let (out, _) = affine::forward(&x.view().into_dyn(), &w.view(), &b.view()).unwrap();
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
