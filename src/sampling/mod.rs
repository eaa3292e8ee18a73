/*
 * @Author       : 老董
 * @Date         : 2026-07-19
 * @Description  : 硬件采样表（实测忆阻器响应的稠密查找表）
 *
 * 表按（量化激活桶, 随机试次列）二维索引：行固定 500 个量化桶，
 * 列为同一激活水平下的多次实测响应。采样时每个元素独立均匀抽列，
 * 以模拟器件的逐次噪声。表是只读资源，构造后注入网络使用，
 * 网络前向不再接触文件系统。
 */

use std::fs::File;
use std::path::Path;

use ndarray::{Array2, ArrayD, ArrayViewD};
use ndarray_npy::ReadNpyExt;
use rand::Rng;

use crate::errors::NetError;

/// 量化比例：桶索引 = round(50·x) + 250
pub const QUANT_SCALE: f32 = 50.0;
/// 量化偏移
pub const QUANT_OFFSET: f32 = 250.0;
/// 量化桶数（表的行数），对应激活值约 [-5, +5] 的范围
pub const QUANT_BUCKETS: usize = 500;

/// 硬件采样表。
///
/// 形状为 `[500, 试次数]` 的只读数组：第 r 行是量化桶 r 对应激活水平
/// 的全部实测响应。
pub struct SampleTable {
    data: Array2<f32>,
}

impl SampleTable {
    /// 用现成数组构造。行数必须正好是 [`QUANT_BUCKETS`]，列数至少为 1。
    pub fn new(data: Array2<f32>) -> Result<Self, NetError> {
        let (rows, cols) = data.dim();
        if rows != QUANT_BUCKETS {
            return Err(NetError::ShapeMismatch {
                expected: vec![QUANT_BUCKETS, cols],
                got: vec![rows, cols],
                message: format!("采样表行数必须等于量化桶数{QUANT_BUCKETS}"),
            });
        }
        if cols == 0 {
            return Err(NetError::InvalidOperation(
                "采样表至少需要 1 列试次".to_string(),
            ));
        }
        Ok(Self { data })
    }

    /// 从 npy 文件加载采样表。
    pub fn open(path: &Path) -> Result<Self, NetError> {
        let file = File::open(path)?;
        let data = Array2::<f32>::read_npy(file)?;
        Self::new(data)
    }

    /// 试次列数。
    pub fn trials(&self) -> usize {
        self.data.dim().1
    }

    /// 把激活值量化为 0 起始的桶索引：clamp(round(50·x) + 250, 1, 500) - 1。
    pub fn bucket(x: f32) -> usize {
        let raw = (QUANT_SCALE * x).round() + QUANT_OFFSET;
        let clamped = raw.clamp(1.0, QUANT_BUCKETS as f32);
        clamped as usize - 1
    }

    /// 逐元素采样：输出形状与输入一致，取值为
    /// `table[bucket(x), uniform(0..trials)]`。
    pub fn sample(&self, a: &ArrayViewD<f32>) -> ArrayD<f32> {
        let mut rng = rand::thread_rng();
        let trials = self.trials();
        a.mapv(|v| {
            let row = Self::bucket(v);
            let col = rng.gen_range(0..trials);
            self.data[[row, col]]
        })
    }
}
