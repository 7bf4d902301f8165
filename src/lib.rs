//! # fsiesta - SIESTA 的对象式计算器接口
//!
//! SIESTA 是整体式程序，从未打算被同一进程多次实例化：模块级变量、
//! 打开的文件句柄、MPI 通信子都是隐藏全局状态。本 crate 提供一层
//! 生命周期与隔离管理，使外部驱动（分子动力学、结构弛豫）可以反复
//! 调用 run 而不必为每次几何变化重启进程：
//!
//! - 每个实例复制一份引擎共享库（独立加载单元 → 独立静态数据段）
//! - 严格状态机约束 launch/run/quit/dispose
//! - 工作目录作用域化（引擎只做相对路径 I/O）
//! - 结构变更检测，未变不重算
//!
//! ## 模块结构
//! ```text
//! lib.rs
//!   ├── calculator.rs (顶层计算器：输入装配 + 结果缓存)
//!   ├── instance.rs   (生命周期状态机)
//!   ├── image.rs      (私有镜像隔离)
//!   ├── workdir.rs    (工作目录作用域)
//!   ├── input.rs      (输入装配与变更检测)
//!   ├── readers.rs    (结构化输出的作用域访问)
//!   ├── engine.rs     (引擎原生边界 trait)
//!   ├── comm.rs       (集合通信边界 trait)
//!   ├── parsers/      (fdf 结构块读写)
//!   ├── models/       (数据模型)
//!   └── error.rs      (错误处理)
//! ```
//!
//! ## 快速上手
//! ```no_run
//! use fsiesta::{Calculator, SerialComm};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # fn engine() -> Arc<dyn fsiesta::Engine> { unimplemented!() }
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let fdf = "TS.HS.Save True\nSolutionMethod diagon\nPAO.BasisSize SZP\n";
//!     let mut calc = Calculator::new(
//!         engine(),
//!         Arc::new(SerialComm),
//!         fdf,
//!         Path::new("."),
//!         "tenbyten",
//!         None,
//!     )?;
//!     let result = calc.run(None)?;
//!     println!("E = {} eV", result.energy);
//!     Ok(())
//! }
//! ```

pub mod calculator;
pub mod cli;
pub mod comm;
pub mod commands;
pub mod engine;
pub mod error;
pub mod image;
pub mod input;
pub mod instance;
pub mod models;
pub mod parsers;
pub mod readers;
pub mod utils;
pub mod workdir;

pub use calculator::Calculator;
pub use comm::{Communicator, SerialComm};
pub use engine::{Engine, EngineSession};
pub use error::{FsiestaError, Result};
pub use input::{ConfigDocument, ConfigSource, DISPLACEMENT_TOL};
pub use instance::{EngineInstance, State};
pub use models::{Atom, Geometry, RunResult, Species};
pub use readers::OutputKind;
