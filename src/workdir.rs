//! # 工作目录作用域管理
//!
//! 引擎的全部文件 I/O 使用编译期写死的相对路径，进程当前目录因此成为
//! 隐式输入。本模块把 cwd 当作作用域资源：进入时记录并切换，退出时
//! 无条件恢复（包括错误路径），嵌套作用域按 LIFO 恢复。
//!
//! cwd 是进程级全局资源，不支持多线程并发驱动多个实例；
//! 预期模型是单线程驱动、按 rank 多进程并行。
//!
//! ## 依赖关系
//! - 被 `calculator.rs`, `instance.rs` 使用
//! - 使用 `error.rs`

use crate::error::{FsiestaError, Result};
use std::env;
use std::path::{Path, PathBuf};

/// RAII 工作目录作用域
///
/// 构造时切换到目标目录，Drop 时恢复原目录。
/// 恢复失败只能尽力而为：Drop 不允许抛错。
pub struct WorkdirScope {
    original: PathBuf,
}

impl WorkdirScope {
    /// 记录当前目录并切换到 `path`
    pub fn enter(path: &Path) -> Result<WorkdirScope> {
        let original = env::current_dir().map_err(|e| FsiestaError::WorkdirError {
            path: path.display().to_string(),
            source: e,
        })?;
        env::set_current_dir(path).map_err(|e| FsiestaError::WorkdirError {
            path: path.display().to_string(),
            source: e,
        })?;
        Ok(WorkdirScope { original })
    }
}

impl Drop for WorkdirScope {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.original);
    }
}

/// 在 `path` 作用域内执行 `body`，任何退出路径都恢复原目录
pub fn with_workdir<T, F>(path: &Path, body: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _scope = WorkdirScope::enter(path)?;
    body()
}

/// cwd 是进程级全局，凡切换目录的测试必须串行
#[cfg(test)]
pub static TEST_CWD_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// 拿到 cwd 测试锁，容忍前一个持有者 panic
#[cfg(test)]
pub fn test_cwd_guard() -> std::sync::MutexGuard<'static, ()> {
    TEST_CWD_LOCK
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
