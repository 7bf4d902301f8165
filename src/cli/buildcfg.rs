//! # buildcfg 子命令 CLI 定义
//!
//! 从引擎 Obj 目录提取编译/链接参数并生成 pkg-config 文件
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/buildcfg.rs`

use clap::Args;
use std::path::PathBuf;

/// buildcfg 子命令参数
#[derive(Args, Debug)]
pub struct BuildcfgArgs {
    /// The engine Obj dir where the engine has already been built (`make lib`)
    #[arg(env = "OBJ")]
    pub objdir: PathBuf,

    /// Where to put the generated pkg-config file
    #[arg(long, default_value = ".")]
    pub pkgdir: PathBuf,

    /// Package name used in the pkg-config file
    #[arg(long, default_value = "Siesta")]
    pub name: String,

    /// Version string recorded in the pkg-config file
    #[arg(long, default_value = "4.2")]
    pub pkg_version: String,

    /// Run the archiver to create libsiesta.a for engine versions that do not ship it
    #[arg(long, default_value_t = false)]
    pub create_lib: bool,
}
