//! # 原子结构数据模型
//!
//! 一个计算器实例生命周期内，物种列表与原子数不可变；
//! 两次 run 之间仅允许坐标与晶胞变化。
//!
//! ## 依赖关系
//! - 被 `parsers/fdf.rs`, `input.rs`, `calculator.rs` 使用
//! - 无外部模块依赖

use serde::{Deserialize, Serialize};

/// 化学物种
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// 物种标签（如 "C", "Si", "C_surf"）
    pub label: String,

    /// 原子序数
    pub atomic_number: i32,
}

impl Species {
    pub fn new(label: impl Into<String>, atomic_number: i32) -> Self {
        Species {
            label: label.into(),
            atomic_number,
        }
    }
}

/// 单个原子：物种索引 + 笛卡尔坐标 (Å)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 指向 `Geometry::species` 的索引（从 0 开始）
    pub species: usize,

    /// 笛卡尔坐标 [x, y, z]
    pub xyz: [f64; 3],
}

impl Atom {
    pub fn new(species: usize, xyz: [f64; 3]) -> Self {
        Atom { species, xyz }
    }
}

/// 原子结构：物种表、原子列表（顺序有意义）、晶胞矩阵
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    /// 物种表
    pub species: Vec<Species>,

    /// 原子列表，顺序与引擎内部编号一致
    pub atoms: Vec<Atom>,

    /// 晶胞行向量矩阵 (3x3, Å)
    pub cell: [[f64; 3]; 3],
}

impl Geometry {
    pub fn new(species: Vec<Species>, atoms: Vec<Atom>, cell: [[f64; 3]; 3]) -> Self {
        Geometry {
            species,
            atoms,
            cell,
        }
    }

    /// 原子数
    pub fn natoms(&self) -> usize {
        self.atoms.len()
    }

    /// 判断是否与另一结构共享同一物种表与原子数
    ///
    /// 计算器实例在两次 run 之间只接受满足此条件的结构。
    pub fn same_composition(&self, other: &Geometry) -> bool {
        self.species == other.species
            && self.atoms.len() == other.atoms.len()
            && self
                .atoms
                .iter()
                .zip(other.atoms.iter())
                .all(|(a, b)| a.species == b.species)
    }

    /// 逐轴位移范数：对每个笛卡尔轴，取所有原子在该轴位移分量的 2-范数
    ///
    /// 返回 [|Δx|, |Δy|, |Δz|]。变更检测据此逐轴比较阈值，
    /// 而不是合并为单一欧氏距离。
    pub fn axis_displacement_norms(&self, other: &Geometry) -> [f64; 3] {
        let mut sums = [0.0f64; 3];
        for (a, b) in self.atoms.iter().zip(other.atoms.iter()) {
            for k in 0..3 {
                let d = a.xyz[k] - b.xyz[k];
                sums[k] += d * d;
            }
        }
        [sums[0].sqrt(), sums[1].sqrt(), sums[2].sqrt()]
    }

    /// 返回替换坐标后的新结构（物种表与晶胞不变）
    pub fn with_positions(&self, positions: &[[f64; 3]]) -> Geometry {
        let atoms = self
            .atoms
            .iter()
            .zip(positions.iter())
            .map(|(a, &xyz)| Atom::new(a.species, xyz))
            .collect();
        Geometry {
            species: self.species.clone(),
            atoms,
            cell: self.cell,
        }
    }
}
