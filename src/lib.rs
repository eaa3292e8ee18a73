//! # Sampled ConvNet
//!
//! 本 crate 实现两个固定拓扑的小型卷积网络分类器（三层与四层变体），
//! 以及一条实验性的「硬件采样」非线性替换路径：前向时不计算解析的
//! 非线性函数，而是按量化后的激活值从一张实测的硬件响应表中随机取样，
//! 用于模拟忆阻器等模拟器件的噪声推理（硬件在环实验）。
//!
//! 设计要点：
//! - 每个网络持有一个有序的阶段（stage）列表，阶段各自实现前向/反向，
//!   前向按序遍历、反向逆序遍历，不再逐网络手写重复的调用序列；
//! - 非线性是构造期选定的策略（解析 sigmoid/relu 或查表采样），
//!   采样表作为显式资源注入，而非在前向中临时从硬盘加载；
//! - 参数以名字（"W1"、"b1"…）映射到数组，梯度以同名键返回，
//!   参数的原地更新由外部优化器负责，本 crate 在求损失时只读参数。

pub mod classifiers;
pub mod errors;
pub mod layers;
pub mod params;
pub mod sampling;
pub mod utils;

pub use classifiers::{ConvNet2, ThreeLayerConvNet};
pub use errors::NetError;
pub use layers::activation::{Logistic, Nonlinearity, Relu, TableSampled};
pub use params::{GradMap, ParamSet};
pub use sampling::SampleTable;
