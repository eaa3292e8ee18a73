//! 层原语：卷积、池化、仿射、非线性、softmax 交叉熵。
//!
//! 每个原语都是一对函数：`forward` 返回（输出, 缓存），`backward`
//! 消费缓存返回各输入的梯度。缓存由前向产生、由配对的反向独占消费，
//! 用完即弃。卷积与池化在 batch 维度用 rayon 并行。

pub mod activation;
pub mod affine;
pub mod conv2d;
pub mod max_pool2d;
pub mod softmax;

pub use conv2d::Conv2dParam;
pub use max_pool2d::MaxPool2dParam;

#[cfg(test)]
mod tests;
