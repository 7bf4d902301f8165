//! # clean 命令实现
//!
//! 正常销毁总会删掉私有镜像，但进程被强杀时镜像会留在系统临时目录
//! 里静默占用磁盘（每份都是完整的引擎二进制）。本命令扫描
//! `fsiesta-<pid>` 目录，对持有进程已消失的目录做清理。
//!
//! ## 依赖关系
//! - 使用 `cli/clean.rs` 定义的参数
//! - 使用 `image.rs` 的目录命名约定
//! - 使用 `utils/output.rs`
//! - 使用 `regex` 解析目录名、`walkdir` 统计泄漏文件

use crate::cli::clean::CleanArgs;
use crate::error::{FsiestaError, Result};
use crate::image::IMAGE_DIR_PREFIX;
use crate::utils::output;
use regex::Regex;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// 执行 clean 命令
pub fn execute(args: CleanArgs) -> Result<()> {
    output::print_header("Sweeping leaked private engine images");

    let root = args
        .tmp_root
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    if !root.is_dir() {
        return Err(FsiestaError::DirectoryNotFound {
            path: root.display().to_string(),
        });
    }

    let dir_re = image_dir_regex();
    let mut removed_dirs = 0usize;
    let mut removed_files = 0usize;
    let mut skipped_alive = 0usize;

    let entries = fs::read_dir(&root).map_err(|e| FsiestaError::FileReadError {
        path: root.display().to_string(),
        source: e,
    })?;

    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(pid) = dir_re
            .captures(&name)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        if process_alive(pid) && !args.force {
            skipped_alive += 1;
            continue;
        }

        let files = count_files(&path);
        if args.dry_run {
            output::print_info(&format!(
                "Would remove {} ({} leaked images)",
                path.display(),
                files
            ));
            continue;
        }
        match fs::remove_dir_all(&path) {
            Ok(()) => {
                removed_dirs += 1;
                removed_files += files;
                output::print_success(&format!(
                    "Removed {} ({} leaked images)",
                    path.display(),
                    files
                ));
            }
            Err(e) => {
                output::print_warning(&format!("Could not remove {}: {}", path.display(), e));
            }
        }
    }

    if skipped_alive > 0 {
        output::print_info(&format!(
            "Skipped {} directories with live owners (use --force to override)",
            skipped_alive
        ));
    }
    output::print_done(&format!(
        "Removed {} directories, {} leaked images",
        removed_dirs, removed_files
    ));
    Ok(())
}

/// 匹配 `fsiesta-<pid>` 目录名
fn image_dir_regex() -> Regex {
    // 前缀来自 image.rs 的命名约定
    Regex::new(&format!(r"^{}(\d+)$", regex::escape(IMAGE_DIR_PREFIX)))
        .expect("static regex must compile")
}

/// 持有进程是否仍存活
///
/// 只在能读 /proc 的平台上可判定；判定不了时保守地视为存活，
/// 避免删掉仍被加载的镜像。
fn process_alive(pid: u32) -> bool {
    let proc_root = Path::new("/proc");
    if proc_root.is_dir() {
        proc_root.join(pid.to_string()).is_dir()
    } else {
        true
    }
}

/// 统计目录下的泄漏镜像数
fn count_files(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count()
}
