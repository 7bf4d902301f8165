//! # 引擎镜像隔离
//!
//! 引擎从未被设计为可多次实例化：模块级变量、打开的文件句柄等隐藏
//! 全局状态会在两个逻辑实例共享同一份加载代码时静默互相破坏。
//! 对策是代价高昂但有效的绕行：每个实例把共享库复制为一份私有镜像，
//! 依赖操作系统对独立加载单元分配独立静态数据段。若将来有可重入的
//! 引擎构建，这一层可以整体替换。
//!
//! 镜像源路径每进程只发现一次并记忆。重复发现不安全：加载器可能对
//! 已复制又删除的二进制报告过期路径，故首次成功发现后只读不重置。
//!
//! ## 依赖关系
//! - 被 `instance.rs`, `commands/clean.rs` 使用
//! - 使用 `error.rs`

use crate::error::{FsiestaError, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 指向引擎共享库的环境变量
pub const ENGINE_IMAGE_ENV: &str = "FSIESTA_ENGINE_IMAGE";

/// 私有镜像目录名前缀（`fsiesta-<pid>`）
pub const IMAGE_DIR_PREFIX: &str = "fsiesta-";

static ENGINE_IMAGE: OnceLock<PathBuf> = OnceLock::new();

/// 显式注册引擎镜像路径；首个写入者生效
///
/// 返回实际生效的路径。已注册后再次调用不会覆盖。
pub fn set_engine_image(path: impl Into<PathBuf>) -> Result<&'static Path> {
    let path = path.into();
    if !path.is_file() {
        return Err(FsiestaError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(ENGINE_IMAGE.get_or_init(|| path).as_path())
}

/// 进程级引擎镜像路径：首次调用从环境发现并记忆
pub fn engine_image() -> Result<&'static Path> {
    if let Some(p) = ENGINE_IMAGE.get() {
        return Ok(p.as_path());
    }
    let discovered = discover_from_env()?;
    Ok(ENGINE_IMAGE.get_or_init(|| discovered).as_path())
}

/// 从 `FSIESTA_ENGINE_IMAGE` 解析引擎库路径
fn discover_from_env() -> Result<PathBuf> {
    let raw = env::var(ENGINE_IMAGE_ENV)
        .map_err(|_| FsiestaError::EnvVarMissing(ENGINE_IMAGE_ENV.to_string()))?;
    let path = PathBuf::from(raw);
    if !path.is_file() {
        return Err(FsiestaError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    Ok(path)
}

/// 本进程的私有镜像目录（系统临时目录下，按 pid 唯一）
pub fn private_image_root() -> PathBuf {
    env::temp_dir().join(format!("{}{}", IMAGE_DIR_PREFIX, std::process::id()))
}

/// 私有镜像文件名：进程内实例编号 + rank
///
/// 多 rank 可能共享文件系统（但 pid 不同、临时目录亦不同），
/// rank 后缀确保即使共享也不冲突。
pub fn private_image_name(instance_seq: usize, rank: usize) -> String {
    format!("{:#x}-r{}", instance_seq, rank)
}

/// 把引擎镜像逐字节复制为一份私有副本
///
/// 失败即中止实例构造，不留下任何半成品状态。
pub fn acquire_private_image(source: &Path, name: &str) -> Result<PathBuf> {
    acquire_private_image_in(&private_image_root(), source, name)
}

/// 同 [`acquire_private_image`]，但指定镜像目录（测试用）
pub fn acquire_private_image_in(root: &Path, source: &Path, name: &str) -> Result<PathBuf> {
    if !source.is_file() {
        return Err(FsiestaError::FileNotFound {
            path: source.display().to_string(),
        });
    }
    fs::create_dir_all(root).map_err(|e| FsiestaError::FileWriteError {
        path: root.display().to_string(),
        source: e,
    })?;
    let private = root.join(name);
    if let Err(e) = fs::copy(source, &private) {
        if e.kind() != std::io::ErrorKind::NotFound {
            return Err(FsiestaError::ImageCopyError {
                from: source.to_path_buf(),
                to: private,
                source: e,
            });
        }
        // 另一实例的销毁可能刚移除了空目录，重建后重试一次
        fs::create_dir_all(root).map_err(|e| FsiestaError::FileWriteError {
            path: root.display().to_string(),
            source: e,
        })?;
        fs::copy(source, &private).map_err(|e| FsiestaError::ImageCopyError {
            from: source.to_path_buf(),
            to: private.clone(),
            source: e,
        })?;
    }
    Ok(private)
}

/// 删除私有镜像；若所在目录已空则一并删除
///
/// 文件删除失败向调用方返回（泄漏的私有二进制会静默占用磁盘，
/// 非关停路径上必须可见）；目录删除失败忽略。
pub fn release_private_image(private: &Path) -> Result<()> {
    fs::remove_file(private).map_err(|e| FsiestaError::FileWriteError {
        path: private.display().to_string(),
        source: e,
    })?;
    if let Some(dir) = private.parent() {
        if let Ok(mut entries) = fs::read_dir(dir) {
            if entries.next().is_none() {
                let _ = fs::remove_dir(dir);
            }
        }
    }
    Ok(())
}
