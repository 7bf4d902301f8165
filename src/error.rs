//! # 统一错误处理模块
//!
//! 定义 fsiesta 的所有错误类型，使用 `thiserror` 派生。
//!
//! ## 错误分类
//! - `Usage` - API 误用（状态机违规、错误的配置来源类型等）
//! - `EngineFailure` - 引擎原生调用失败，诊断信息原样透传
//! - I/O 错误 - 镜像复制、文件读写失败
//! - CLI 错误 - 外部命令、环境变量（仅 `commands/` 使用）
//!
//! ## 依赖关系
//! - 被所有其他模块使用
//! - 无外部模块依赖

use std::path::PathBuf;
use thiserror::Error;

/// fsiesta 统一错误类型
#[derive(Error, Debug)]
pub enum FsiestaError {
    // ─────────────────────────────────────────────────────────────
    // API 误用
    // ─────────────────────────────────────────────────────────────
    #[error("Usage error: {0}")]
    Usage(String),

    // ─────────────────────────────────────────────────────────────
    // 引擎错误
    // ─────────────────────────────────────────────────────────────
    #[error("Engine failure in session '{label}': {message}")]
    EngineFailure { label: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // I/O 错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to read file: {path}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}")]
    FileWriteError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to copy engine image: {from} -> {to}")]
    ImageCopyError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to switch working directory to: {path}")]
    WorkdirError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: String },

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ─────────────────────────────────────────────────────────────
    // 解析错误
    // ─────────────────────────────────────────────────────────────
    #[error("Failed to parse {format} content: {path}\nReason: {reason}")]
    ParseError {
        format: String,
        path: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // 外部命令错误（buildcfg 子命令）
    // ─────────────────────────────────────────────────────────────
    #[error("External command '{command}' not found in PATH")]
    CommandNotFound { command: String },

    #[error("External command failed: {command}\n{stderr}")]
    CommandFailed { command: String, stderr: String },

    #[error("Environment variable not set: {0}")]
    EnvVarMissing(String),

    // ─────────────────────────────────────────────────────────────
    // 其他
    // ─────────────────────────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

impl FsiestaError {
    /// 构造 `Usage` 错误的便捷方法
    pub fn usage(msg: impl Into<String>) -> Self {
        FsiestaError::Usage(msg.into())
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, FsiestaError>;
