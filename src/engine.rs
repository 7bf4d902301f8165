//! # 引擎原生调用边界
//!
//! 数值引擎本身是外部协作者：一个以库形式构建的整体式 Fortran 程序。
//! 本模块只定义核心所需的窄接口。加载私有镜像、绑定符号等 FFI 细节
//! 由实现方（独立的绑定 crate）完成。
//!
//! 引擎可能因内部错误自行终止，因此每次调用前都应查询 `active`。
//!
//! ## 依赖关系
//! - 被 `instance.rs` 使用
//! - 使用 `models/`, `comm.rs`, `error.rs`

use crate::comm::Communicator;
use crate::error::Result;
use crate::models::{Geometry, RunResult};
use std::path::Path;

/// 一个已启动的引擎会话（原生句柄的 Rust 侧所有者）
pub trait EngineSession {
    /// 以给定结构执行一次计算，返回能量、力与应力
    ///
    /// 调用方必须保证当前工作目录已切换到会话的工作目录，
    /// 引擎内部全部使用相对路径 I/O。
    fn run(&mut self, geometry: &Geometry) -> Result<RunResult>;

    /// 引擎侧存活标志
    fn active(&self) -> bool;

    /// 查询费米能 (eV)
    fn fermi_energy(&self) -> Result<f64>;

    /// 释放引擎侧资源
    ///
    /// 引擎自行持有宿主无法回收的内存，跳过此调用会泄漏。
    fn quit(&mut self) -> Result<()>;
}

/// 引擎加载器：从一份私有镜像构造会话
pub trait Engine: Send + Sync {
    /// 加载 `image` 指向的私有镜像并构造会话
    ///
    /// `label` 由引擎在当前工作目录下解析为文件命名空间，
    /// 因此调用方必须在工作目录作用域内调用。
    fn launch(
        &self,
        image: &Path,
        label: &str,
        comm: &dyn Communicator,
    ) -> Result<Box<dyn EngineSession>>;
}
