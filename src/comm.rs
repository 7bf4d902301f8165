//! # 进程间集合通信边界
//!
//! 并行由多进程（rank）协作实现，而非进程内多线程。本 crate 不实现
//! 任何消息传递，只定义所需的最小接口：rank 查询与集合栅栏。
//! 真实 MPI 句柄由外部运行时通过该 trait 注入。
//!
//! ## 依赖关系
//! - 被 `input.rs`, `calculator.rs`, `engine.rs` 使用
//! - 无外部模块依赖

/// 集合通信句柄
///
/// 约定：`barrier` 是所有 rank 共同参与的集合操作；
/// rank 0 负责文件写入类副作用，其余 rank 在栅栏处等待可见性。
pub trait Communicator: Send + Sync {
    /// 本进程的 rank（0 起）
    fn rank(&self) -> usize;

    /// 参与计算的进程总数
    fn size(&self) -> usize;

    /// 集合栅栏：所有 rank 到达后才返回
    fn barrier(&self);
}

/// 串行通信器：单进程运行时的默认实现
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialComm;

impl Communicator for SerialComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn barrier(&self) {}
}
