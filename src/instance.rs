//! # 实例生命周期控制
//!
//! 把一份私有引擎镜像包进严格的状态机：
//!
//! ```text
//! Uninitialized → Launched → (run)* → Quit → Disposed
//! ```
//!
//! `run` 是 `Launched` 上的自环。销毁恰好执行一次：先调用引擎侧
//! 释放（引擎自有内存，宿主无法回收），随后无论释放成败都删除私有
//! 镜像。进程关停期间的销毁走降级路径：跳过不安全步骤，仍尝试文件
//! 清理，失败只告警不抛错。
//!
//! ## 依赖关系
//! - 被 `calculator.rs` 使用
//! - 使用 `engine.rs`, `image.rs`, `workdir.rs`, `comm.rs`

use crate::comm::Communicator;
use crate::engine::{Engine, EngineSession};
use crate::error::{FsiestaError, Result};
use crate::image;
use crate::models::{Geometry, RunResult};
use crate::utils::output;
use crate::workdir::with_workdir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// 已持有私有镜像，尚未绑定原生会话
    Uninitialized,
    /// 原生会话已绑定，可以 run
    Launched,
    /// 引擎侧已释放，镜像尚在
    Quit,
    /// 镜像已删除，实例终结
    Disposed,
}

/// 进程内单调递增的实例编号，与 rank 共同构成镜像文件名
static INSTANCE_SEQ: AtomicUsize = AtomicUsize::new(1);

/// 一个引擎实例：私有镜像 + 原生会话 + 状态机
pub struct EngineInstance {
    engine: Arc<dyn Engine>,
    comm: Arc<dyn Communicator>,
    private_image: PathBuf,
    session: Option<Box<dyn EngineSession>>,
    state: State,
    working_dir: Option<PathBuf>,
    label: Option<String>,
}

impl EngineInstance {
    /// 以进程级发现的引擎镜像构造实例
    ///
    /// 镜像复制失败直接中止，不注册任何生命周期状态。
    pub fn new(engine: Arc<dyn Engine>, comm: Arc<dyn Communicator>) -> Result<Self> {
        let source = image::engine_image()?.to_path_buf();
        Self::with_source_image(engine, comm, &source)
    }

    /// 以显式给定的引擎镜像构造实例
    pub fn with_source_image(
        engine: Arc<dyn Engine>,
        comm: Arc<dyn Communicator>,
        source: &Path,
    ) -> Result<Self> {
        let seq = INSTANCE_SEQ.fetch_add(1, Ordering::SeqCst);
        let name = image::private_image_name(seq, comm.rank());
        let private_image = image::acquire_private_image(source, &name)?;
        Ok(EngineInstance {
            engine,
            comm,
            private_image,
            session: None,
            state: State::Uninitialized,
            working_dir: None,
            label: None,
        })
    }

    /// 当前生命周期状态
    pub fn state(&self) -> State {
        self.state
    }

    /// 私有镜像路径
    pub fn private_image(&self) -> &Path {
        &self.private_image
    }

    /// 引擎侧存活标志；未绑定会话时为假
    pub fn active(&self) -> bool {
        self.session.as_ref().map(|s| s.active()).unwrap_or(false)
    }

    /// 在 `working_dir` 作用域内绑定原生会话
    ///
    /// 引擎在当前目录下解析 `label`，因此必须切换目录后调用。
    pub fn launch(&mut self, working_dir: &Path, label: &str) -> Result<()> {
        if self.state != State::Uninitialized {
            return Err(FsiestaError::usage(format!(
                "launch is only valid before the session exists (state: {:?})",
                self.state
            )));
        }
        let session = with_workdir(working_dir, || {
            self.engine
                .launch(&self.private_image, label, self.comm.as_ref())
        })?;
        self.session = Some(session);
        self.state = State::Launched;
        self.working_dir = Some(working_dir.to_path_buf());
        self.label = Some(label.to_string());
        Ok(())
    }

    /// 在工作目录作用域内执行一次计算
    ///
    /// 状态违规是用法错误；引擎侧失败原样透传且不改变状态，
    /// 调用方可自行检查存活后决定重试或销毁。
    pub fn run(&mut self, geometry: &Geometry) -> Result<RunResult> {
        match self.state {
            State::Uninitialized => {
                return Err(FsiestaError::usage("run called before launch"));
            }
            State::Quit | State::Disposed => {
                return Err(FsiestaError::usage("run called after quit"));
            }
            State::Launched => {}
        }
        // 引擎可能因内部错误自行终止，每次调用前都要查存活
        let session = self.session.as_mut().ok_or_else(|| {
            FsiestaError::usage("no native session bound")
        })?;
        if !session.active() {
            return Err(FsiestaError::usage(
                "the engine session is not active - did you quit it?",
            ));
        }
        let working_dir = self.working_dir.clone().ok_or_else(|| {
            FsiestaError::usage("no working directory recorded for this session")
        })?;
        with_workdir(&working_dir, || session.run(geometry))
    }

    /// 查询费米能
    pub fn fermi_energy(&self) -> Result<f64> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| FsiestaError::usage("fermi_energy called before launch"))?;
        if !session.active() {
            return Err(FsiestaError::usage(
                "the engine session is not active - did you quit it?",
            ));
        }
        session.fermi_energy()
    }

    /// 显式销毁：引擎侧释放 + 删除私有镜像
    ///
    /// 幂等；第二次调用是空操作。引擎释放失败只告警，镜像删除失败
    /// 向调用方返回：泄漏的私有二进制必须可见。
    pub fn dispose(&mut self) -> Result<()> {
        if self.state == State::Disposed {
            return Ok(());
        }
        self.quit_engine();
        self.state = State::Disposed;
        image::release_private_image(&self.private_image)
    }

    /// 引擎侧释放；失败告警不抛错
    fn quit_engine(&mut self) {
        if self.state == State::Launched {
            let label = self.label.clone().unwrap_or_default();
            if let Some(session) = self.session.as_mut() {
                if session.active() {
                    if let Err(e) = session.quit() {
                        output::print_warning(&format!(
                            "engine quit failed for session '{}': {}",
                            label, e
                        ));
                    }
                }
            }
        }
        self.session = None;
        if self.state != State::Disposed {
            self.state = State::Quit;
        }
    }
}

impl Drop for EngineInstance {
    /// 降级销毁路径：宿主关停时各辅助设施可能已不可用，
    /// 跳过集合操作，尽力清理文件，失败只告警
    fn drop(&mut self) {
        if self.state == State::Disposed {
            return;
        }
        self.quit_engine();
        self.state = State::Disposed;
        if let Err(e) = image::release_private_image(&self.private_image) {
            output::print_warning(&format!(
                "could not remove private engine image {}: {}",
                self.private_image.display(),
                e
            ));
        }
    }
}
