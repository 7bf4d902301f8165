//! # 工具模块
//!
//! ## 依赖关系
//! - 被所有模块使用
//! - 子模块: output

pub mod output;
