//! # 文件式计算器
//!
//! 面向外部驱动（分子动力学、弛豫循环）的计算器对象：装配输入、
//! 驱动实例生命周期、缓存最近一次结果并做变更检测。物种与原子数
//! 在实例生命周期内固定，换体系需要新建计算器。
//!
//! 构造顺序：装配文档 → rank 0 写盘 + 集合栅栏 → 复制私有镜像 →
//! 工作目录作用域内 launch。任何一步失败都中止构造，不留半成品。
//!
//! ## 依赖关系
//! - 对外公开的顶层接口
//! - 使用 `input.rs`, `instance.rs`, `readers.rs`, `parsers/fdf.rs`

use crate::comm::Communicator;
use crate::engine::Engine;
use crate::error::{FsiestaError, Result};
use crate::input::{self, ConfigSource};
use crate::instance::EngineInstance;
use crate::models::{Geometry, RunResult};
use crate::parsers::fdf;
use crate::readers::{self, OutputKind};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 文件式计算器实例
pub struct Calculator {
    instance: EngineInstance,
    working_dir: PathBuf,
    label: String,
    geom0: Geometry,
    last_geometry: Geometry,
    last_result: Option<RunResult>,
}

impl Calculator {
    /// 以进程级发现的引擎镜像构造计算器
    ///
    /// `config` 可以是 fdf 路径、含换行的字面内容或逐行序列；
    /// 未给出 `geometry` 时从配置内容解析结构。
    pub fn new(
        engine: Arc<dyn Engine>,
        comm: Arc<dyn Communicator>,
        config: impl Into<ConfigSource>,
        working_dir: &Path,
        label: &str,
        geometry: Option<Geometry>,
    ) -> Result<Self> {
        let source = crate::image::engine_image()?.to_path_buf();
        Self::with_source_image(engine, comm, config, working_dir, label, geometry, &source)
    }

    /// 同 [`Calculator::new`]，但显式指定引擎镜像
    #[allow(clippy::too_many_arguments)]
    pub fn with_source_image(
        engine: Arc<dyn Engine>,
        comm: Arc<dyn Communicator>,
        config: impl Into<ConfigSource>,
        working_dir: &Path,
        label: &str,
        geometry: Option<Geometry>,
        source_image: &Path,
    ) -> Result<Self> {
        if !working_dir.is_dir() {
            return Err(FsiestaError::DirectoryNotFound {
                path: working_dir.display().to_string(),
            });
        }
        let working_dir = working_dir
            .canonicalize()
            .map_err(|e| FsiestaError::WorkdirError {
                path: working_dir.display().to_string(),
                source: e,
            })?;

        let config = config.into();
        let (doc, geom0) = input::assemble(&config, label, geometry.as_ref())?;

        // 所有 rank 看到完整文档之后才允许任何 rank launch
        input::write_document(&working_dir, &doc, &geom0, comm.as_ref())?;

        let mut instance = EngineInstance::with_source_image(engine, comm, source_image)?;
        instance.launch(&working_dir, label)?;

        Ok(Calculator {
            instance,
            working_dir,
            label: label.to_string(),
            last_geometry: geom0.clone(),
            geom0,
            last_result: None,
        })
    }

    /// 无条件执行一次计算（绕过变更检测）
    ///
    /// `geometry` 缺省为构造时的结构。成功后结果与结构快照一起
    /// 原子地更新，绝不只更新其一。
    pub fn run(&mut self, geometry: Option<&Geometry>) -> Result<RunResult> {
        let geom = match geometry {
            Some(g) => g.clone(),
            None => self.geom0.clone(),
        };
        if !geom.same_composition(&self.geom0) {
            return Err(FsiestaError::usage(
                "species and atom count are fixed for the lifetime of a calculator; \
                 start a new calculator to change them",
            ));
        }
        let result = self.instance.run(&geom)?;
        self.last_geometry = geom;
        self.last_result = Some(result.clone());
        Ok(result)
    }

    /// 给定结构是否需要一次新的引擎调用
    ///
    /// 物种或原子数与构造时不一致的结构一律视为需要：缓存结果对
    /// 这样的结构无效（随后的 run 会把它作为用法错误拒绝）。
    pub fn calculation_required(&self, geometry: &Geometry) -> bool {
        !geometry.same_composition(&self.geom0)
            || input::needs_rerun(geometry, self.executed_geometry())
    }

    /// 势能：必要时先重算
    pub fn potential_energy(&mut self, geometry: Option<&Geometry>) -> Result<f64> {
        self.run_if_needed(geometry)?;
        self.cached_result().map(|r| r.energy)
    }

    /// 受力：必要时先重算
    pub fn forces(&mut self, geometry: &Geometry) -> Result<Vec<[f64; 3]>> {
        self.run_if_needed(Some(geometry))?;
        self.cached_result().map(|r| r.forces.clone())
    }

    /// 应力张量：必要时先重算
    pub fn stress(&mut self, geometry: &Geometry) -> Result<[[f64; 3]; 3]> {
        self.run_if_needed(Some(geometry))?;
        self.cached_result().map(|r| r.stress)
    }

    /// 费米能（引擎侧查询，不触发重算）
    ///
    /// 尚无成功的 run 时是用法错误：引擎在首次计算前没有有意义的
    /// 费米能可报。
    pub fn fermi_energy(&self) -> Result<f64> {
        self.cached_result()?;
        self.instance.fermi_energy()
    }

    /// 最近一次成功 run 的结果
    pub fn last_result(&self) -> Option<&RunResult> {
        self.last_result.as_ref()
    }

    /// 最近一次执行的结构快照
    pub fn last_geometry(&self) -> &Geometry {
        &self.last_geometry
    }

    /// 会话标签
    pub fn label(&self) -> &str {
        &self.label
    }

    /// 工作目录（绝对路径）
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// 标签目录 `<working_dir>/<label>`
    pub fn label_dir(&self) -> PathBuf {
        self.working_dir.join(&self.label)
    }

    /// 主配置文档路径 `<working_dir>/<label>/<label>.fdf`
    pub fn main_file(&self) -> PathBuf {
        self.label_dir().join(format!("{}.fdf", self.label))
    }

    /// 从写盘的主文档重新解析结构（经由结构引用指令）
    pub fn read_structure(&self) -> Result<Geometry> {
        fdf::parse_geometry_file(&self.main_file())
    }

    /// 按需打开标签对应的结果文件并交给外部读取器解析
    ///
    /// 不缓存；每次访问重新打开、重新解析，句柄随作用域释放。
    pub fn read_output<T, F>(&self, kind: OutputKind, parse: F) -> Result<T>
    where
        F: FnOnce(&mut BufReader<File>) -> Result<T>,
    {
        let path = readers::output_path(&self.working_dir, &self.label, kind);
        readers::with_output(&path, parse)
    }

    /// 显式销毁：引擎释放 + 删除私有镜像；幂等
    ///
    /// 配置与结果文件留在工作目录中，只有私有镜像被清理。
    pub fn dispose(&mut self) -> Result<()> {
        self.instance.dispose()
    }

    fn executed_geometry(&self) -> Option<&Geometry> {
        if self.last_result.is_some() {
            Some(&self.last_geometry)
        } else {
            None
        }
    }

    fn run_if_needed(&mut self, geometry: Option<&Geometry>) -> Result<()> {
        let geom = match geometry {
            Some(g) => g.clone(),
            None => self.last_geometry.clone(),
        };
        // 逐轴位移比较按原子索引对齐，原子数不一致时无定义；
        // 在变更检测之前拒绝，绝不拿不同组成的缓存结果充数
        if !geom.same_composition(&self.geom0) {
            return Err(FsiestaError::usage(
                "species and atom count are fixed for the lifetime of a calculator; \
                 start a new calculator to change them",
            ));
        }
        if input::needs_rerun(&geom, self.executed_geometry()) {
            self.run(Some(&geom))?;
        }
        Ok(())
    }

    fn cached_result(&self) -> Result<&RunResult> {
        self.last_result
            .as_ref()
            .ok_or_else(|| FsiestaError::usage("no result cached yet"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SerialComm;
    use crate::engine::testing::StubEngine;
    use crate::instance::State;
    use crate::models::{Atom, Species};
    use std::fs;
    use std::io::Read;
    use std::sync::atomic::Ordering;

    fn fake_image(dir: &Path) -> PathBuf {
        let lib = dir.join("libsiesta.so");
        fs::write(&lib, b"not a real shared object").unwrap();
        lib
    }

    fn two_atoms() -> Geometry {
        Geometry::new(
            vec![Species::new("C", 6)],
            vec![
                Atom::new(0, [0.0, 0.0, 0.0]),
                Atom::new(0, [1.42, 0.0, 0.0]),
            ],
            [[10.0, 0.0, 0.0], [0.0, 10.0, 0.0], [0.0, 0.0, 10.0]],
        )
    }

    fn calculator(tmp: &Path, label: &str) -> (Arc<StubEngine>, Calculator, PathBuf) {
        let wd = tmp.join("wd");
        fs::create_dir_all(&wd).unwrap();
        let engine = Arc::new(StubEngine::new());
        let calc = Calculator::with_source_image(
            engine.clone() as Arc<dyn Engine>,
            Arc::new(SerialComm),
            "SolutionMethod diagon\nPAO.BasisSize SZP\n",
            &wd,
            label,
            Some(two_atoms()),
            &fake_image(tmp),
        )
        .unwrap();
        (engine, calc, wd)
    }

    #[test]
    fn test_construction_writes_document_and_launches() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (engine, calc, wd) = calculator(tmp.path(), "t1");

        assert_eq!(engine.counters.launches.load(Ordering::SeqCst), 1);
        assert!(wd.join("t1/t1.fdf").is_file());
        assert!(wd.join("t1/t1_struct.fdf").is_file());

        // launch 发生在工作目录作用域内
        let launch_cwd = engine.launch_cwd.lock().unwrap().clone().unwrap();
        assert_eq!(launch_cwd.canonicalize().unwrap(), wd.canonicalize().unwrap());

        drop(calc);
    }

    #[test]
    fn test_change_detection_skips_redundant_runs() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (engine, mut calc, _wd) = calculator(tmp.path(), "t1");

        let g = two_atoms();
        let e1 = calc.potential_energy(Some(&g)).unwrap();
        let e2 = calc.potential_energy(Some(&g)).unwrap();
        assert_eq!(e1, e2);
        // 结构未变，第二次访问不触发引擎调用
        assert_eq!(engine.counters.runs.load(Ordering::SeqCst), 1);

        let _f = calc.forces(&g).unwrap();
        assert_eq!(engine.counters.runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_md_scenario() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (engine, mut calc, wd) = calculator(tmp.path(), "t1");

        let g = two_atoms();
        let result = calc.run(Some(&g)).unwrap();
        assert_eq!(result.forces.len(), 2);
        assert!(result.energy.is_finite());

        // 移动原子 0，经变更检测路径重算
        let mut moved = g.clone();
        moved.atoms[0].xyz[0] += 0.2;
        let forces = calc.forces(&moved).unwrap();
        assert_eq!(forces.len(), 2);
        assert_eq!(engine.counters.runs.load(Ordering::SeqCst), 2);
        assert!((calc.last_geometry().atoms[0].xyz[0] - 0.2).abs() < 1e-12);

        // 销毁后配置文件保留，私有镜像清理
        let private = calc.instance.private_image().to_path_buf();
        calc.dispose().unwrap();
        assert!(wd.join("t1/t1.fdf").is_file());
        assert!(wd.join("t1/t1_struct.fdf").is_file());
        assert!(!private.exists());
        assert_eq!(engine.counters.quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_after_dispose_is_usage_error() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_engine, mut calc, _wd) = calculator(tmp.path(), "t1");
        calc.dispose().unwrap();
        assert!(matches!(
            calc.run(Some(&two_atoms())),
            Err(FsiestaError::Usage(_))
        ));
    }

    #[test]
    fn test_missing_config_path_aborts_construction() {
        let tmp = tempfile::tempdir().unwrap();
        let wd = tmp.path().join("wd");
        fs::create_dir_all(&wd).unwrap();
        let engine = Arc::new(StubEngine::new());

        // 不含换行的字符串按路径处理，路径不存在是用法错误
        let err = Calculator::with_source_image(
            engine.clone() as Arc<dyn Engine>,
            Arc::new(SerialComm),
            "no_such_file.fdf",
            &wd,
            "t1",
            Some(two_atoms()),
            &fake_image(tmp.path()),
        );
        assert!(matches!(err, Err(FsiestaError::Usage(_))));
        // 构造失败不留下已启动的会话
        assert_eq!(engine.counters.launches.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_composition_change_rejected() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_engine, mut calc, _wd) = calculator(tmp.path(), "t1");

        let mut bigger = two_atoms();
        bigger.atoms.push(Atom::new(0, [3.0, 3.0, 3.0]));
        assert!(matches!(
            calc.run(Some(&bigger)),
            Err(FsiestaError::Usage(_))
        ));
    }

    #[test]
    fn test_grown_geometry_rejected_by_accessors() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (engine, mut calc, _wd) = calculator(tmp.path(), "t1");

        let g = two_atoms();
        calc.run(Some(&g)).unwrap();

        // 前两个原子不动，追加第三个：逐轴比较对这样的结构无定义，
        // 变更检测路径必须拒绝而不是复用 2 原子的缓存结果
        let mut grown = g.clone();
        grown.atoms.push(Atom::new(0, [3.0, 3.0, 3.0]));
        assert!(calc.calculation_required(&grown));
        assert!(matches!(
            calc.potential_energy(Some(&grown)),
            Err(FsiestaError::Usage(_))
        ));
        assert!(matches!(calc.forces(&grown), Err(FsiestaError::Usage(_))));
        assert!(matches!(calc.stress(&grown), Err(FsiestaError::Usage(_))));
        // 既不复用缓存，也不把不合法的结构交给引擎
        assert_eq!(engine.counters.runs.load(Ordering::SeqCst), 1);
        assert_eq!(calc.last_geometry().natoms(), 2);
    }

    #[test]
    fn test_fermi_energy_requires_prior_run() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_engine, mut calc, _wd) = calculator(tmp.path(), "t1");

        assert!(matches!(calc.fermi_energy(), Err(FsiestaError::Usage(_))));
        calc.run(None).unwrap();
        assert!((calc.fermi_energy().unwrap() + 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_read_structure_round_trip() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_engine, calc, _wd) = calculator(tmp.path(), "t1");

        let parsed = calc.read_structure().unwrap();
        let g = two_atoms();
        assert_eq!(parsed.natoms(), g.natoms());
        assert_eq!(parsed.species, g.species);
        for (a, b) in parsed.atoms.iter().zip(g.atoms.iter()) {
            for k in 0..3 {
                assert!((a.xyz[k] - b.xyz[k]).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_read_output_not_cached_and_scoped() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_engine, calc, _wd) = calculator(tmp.path(), "t1");

        // 引擎尚未写出结果文件
        assert!(matches!(
            calc.read_output(OutputKind::Hamiltonian, |_| Ok(())),
            Err(FsiestaError::FileNotFound { .. })
        ));

        let path = calc.label_dir().join("t1.HSX");
        fs::write(&path, b"H data").unwrap();
        let text = calc
            .read_output(OutputKind::Hamiltonian, |r| {
                let mut buf = String::new();
                r.read_to_string(&mut buf)
                    .map_err(|e| FsiestaError::FileReadError {
                        path: "t1.HSX".to_string(),
                        source: e,
                    })?;
                Ok(buf)
            })
            .unwrap();
        assert_eq!(text, "H data");
    }

    #[test]
    fn test_two_calculators_do_not_share_namespaces() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_e1, mut a, wd) = calculator(tmp.path(), "a");
        let engine_b = Arc::new(StubEngine::new());
        let b = Calculator::with_source_image(
            engine_b as Arc<dyn Engine>,
            Arc::new(SerialComm),
            "SolutionMethod diagon\n",
            &wd,
            "b",
            Some(two_atoms()),
            &fake_image(tmp.path()),
        )
        .unwrap();

        assert_ne!(a.label_dir(), b.label_dir());
        a.dispose().unwrap();
        // a 的销毁不影响 b 的镜像与缓存
        assert!(b.main_file().is_file());
        drop(b);
    }

    #[test]
    fn test_dispose_then_drop_is_noop() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (engine, mut calc, _wd) = calculator(tmp.path(), "t1");
        calc.dispose().unwrap();
        drop(calc);
        assert_eq!(engine.counters.quits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_state_visible_through_dispose() {
        let _cwd = crate::workdir::test_cwd_guard();
        let tmp = tempfile::tempdir().unwrap();
        let (_engine, mut calc, _wd) = calculator(tmp.path(), "t1");
        calc.dispose().unwrap();
        assert_eq!(calc.instance.state(), State::Disposed);
    }
}
