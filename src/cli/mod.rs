//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `buildcfg`: 从已构建的引擎 Obj 目录生成链接描述文件 (pkg-config)
//! - `clean`: 清理泄漏的私有引擎镜像
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: buildcfg, clean

pub mod buildcfg;
pub mod clean;

use clap::{Parser, Subcommand};

/// fsiesta - SIESTA 计算器辅助工具
#[derive(Parser)]
#[command(name = "fsiesta")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Helper tools for the fsiesta calculator library", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// Generate an improvised pkg-config file from a built engine Obj directory
    Buildcfg(buildcfg::BuildcfgArgs),

    /// Remove private engine images leaked by crashed processes
    Clean(clean::CleanArgs),
}
