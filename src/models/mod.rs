//! # 数据模型模块
//!
//! 定义原子结构与单次计算结果的数据模型。
//!
//! ## 依赖关系
//! - 被 `parsers/`, `input.rs`, `instance.rs`, `calculator.rs` 使用
//! - 子模块: geometry, result

pub mod geometry;
pub mod result;

pub use geometry::{Atom, Geometry, Species};
pub use result::RunResult;
