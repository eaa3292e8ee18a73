//! # 常用接口模块
//!
//! 本模块提供单元测试用的断言宏与数值梯度工具。


#[cfg(test)]
pub mod grad_check;
