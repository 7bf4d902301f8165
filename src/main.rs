//! # fsiesta 命令行入口
//!
//! ## 子命令
//! - `buildcfg` - 从已构建的引擎 Obj 目录生成 pkg-config 链接描述
//! - `clean`    - 清理崩溃进程泄漏的私有引擎镜像
//!
//! ## 依赖关系
//! ```text
//! main.rs
//!   ├── cli/        (命令行参数定义)
//!   ├── commands/   (命令执行逻辑)
//!   └── utils/      (输出工具)
//! ```

use clap::Parser;
use fsiesta::cli::Cli;
use fsiesta::{commands, utils};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
