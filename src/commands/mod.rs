//! # 命令执行模块
//!
//! 实现各子命令的业务逻辑。
//!
//! ## 依赖关系
//! - 被 `main.rs` 调用
//! - 使用 `cli/`, `image.rs`, `utils/`
//! - 子模块: buildcfg, clean

pub mod buildcfg;
pub mod clean;

use crate::cli::Commands;
use crate::error::Result;

/// 执行命令
pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Buildcfg(args) => buildcfg::execute(args),
        Commands::Clean(args) => clean::execute(args),
    }
}
