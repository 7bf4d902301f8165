//! # 单次计算结果数据模型
//!
//! 每次成功的 run 产生一条不可变记录，整体覆盖上一条，不做合并。
//!
//! ## 依赖关系
//! - 被 `engine.rs`, `calculator.rs` 使用

use serde::{Deserialize, Serialize};

/// 单次引擎调用的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// 总能量 (eV)
    pub energy: f64,

    /// 每原子受力 (N x 3, eV/Å)
    pub forces: Vec<[f64; 3]>,

    /// 应力张量 (3x3, eV/Å³)
    pub stress: [[f64; 3]; 3],
}

impl RunResult {
    pub fn new(energy: f64, forces: Vec<[f64; 3]>, stress: [[f64; 3]; 3]) -> Self {
        RunResult {
            energy,
            forces,
            stress,
        }
    }
}
