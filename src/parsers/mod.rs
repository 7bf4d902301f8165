//! # 解析器模块
//!
//! 引擎自有的结果文件格式（哈密顿量、密度矩阵等）不在此解析，
//! 由外部结构化读取器负责；这里只处理本 crate 自己写出的 fdf 结构。
//!
//! ## 依赖关系
//! - 被 `input.rs`, `calculator.rs` 使用
//! - 使用 `models/` 数据模型
//! - 子模块: fdf

pub mod fdf;
