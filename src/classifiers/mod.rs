//! 分类器：固定拓扑的前向/反向由有序阶段列表驱动。

mod convnet2;
mod stage;
mod three_layer;

pub use convnet2::{ConvNet2, Mode, NormParam};
pub use three_layer::ThreeLayerConvNet;

#[cfg(test)]
mod tests;
