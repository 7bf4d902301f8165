//! # clean 子命令 CLI 定义
//!
//! 清理崩溃进程遗留的私有引擎镜像
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/clean.rs`

use clap::Args;
use std::path::PathBuf;

/// clean 子命令参数
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Temp root to scan (defaults to the system temp directory)
    #[arg(long)]
    pub tmp_root: Option<PathBuf>,

    /// Also remove image directories whose owning process still seems alive
    #[arg(long, default_value_t = false)]
    pub force: bool,

    /// Report what would be removed without touching anything
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}
