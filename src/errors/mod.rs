//! 网络计算错误类型定义

use thiserror::Error;

/// 分类器与各层原语共用的错误类型。
///
/// 本 crate 属于研究性代码：错误不做恢复，统一通过 `Result` 立即上抛。
#[derive(Debug, Error)]
pub enum NetError {
    /// 形状不匹配
    #[error("形状不匹配：期望{expected:?}，实际{got:?}（{message}）")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
        message: String,
    },

    /// 无效操作（参数配置不合法等）
    #[error("无效操作：{0}")]
    InvalidOperation(String),

    /// 计算错误（不该触及，否则说明 crate 代码有问题）
    #[error("计算错误：{0}")]
    ComputationError(String),

    /// IO 错误
    #[error("IO 错误：{0}")]
    IoError(#[from] std::io::Error),

    /// 读取采样表（npy 文件）失败
    #[error("读取采样表失败：{0}")]
    NpyError(#[from] ndarray_npy::ReadNpyError),
}
