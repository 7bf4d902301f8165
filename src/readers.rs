//! # 结构化输出的作用域访问
//!
//! 引擎把结果文件写在 `<working_dir>/<label>/` 下，以标签命名。
//! 这里按需打开文件并把句柄交给外部读取器解析：不缓存，每次访问
//! 重新打开重新解析；句柄在任何路径（包括解析失败）都随作用域释放。
//! 文件格式对本 crate 不透明，解析逻辑由调用方提供。
//!
//! ## 依赖关系
//! - 被 `calculator.rs` 使用
//! - 使用 `error.rs`

use crate::error::{FsiestaError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// 引擎结果文件的种类，决定标签后的文件后缀
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// 哈密顿量与交叠矩阵 (`.HSX`)
    Hamiltonian,
    /// 密度矩阵 (`.DM`)
    DensityMatrix,
    /// 能量密度矩阵 (`.EDM`)
    EnergyDensityMatrix,
}

impl OutputKind {
    /// 对应的文件后缀
    pub fn suffix(&self) -> &'static str {
        match self {
            OutputKind::Hamiltonian => ".HSX",
            OutputKind::DensityMatrix => ".DM",
            OutputKind::EnergyDensityMatrix => ".EDM",
        }
    }
}

/// 按标签定位结果文件：`<working_dir>/<label>/<label><suffix>`
pub fn output_path(working_dir: &Path, label: &str, kind: OutputKind) -> PathBuf {
    working_dir
        .join(label)
        .join(format!("{}{}", label, kind.suffix()))
}

/// 打开结果文件并在作用域内交给 `parse`
///
/// 句柄随作用域结束释放，解析失败亦然。
pub fn with_output<T, F>(path: &Path, parse: F) -> Result<T>
where
    F: FnOnce(&mut BufReader<File>) -> Result<T>,
{
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FsiestaError::FileNotFound {
            path: path.display().to_string(),
        },
        _ => FsiestaError::FileReadError {
            path: path.display().to_string(),
            source: e,
        },
    })?;
    let mut reader = BufReader::new(file);
    parse(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_output_path_keyed_by_label() {
        let p = output_path(Path::new("/tmp/wd"), "t1", OutputKind::Hamiltonian);
        assert_eq!(p, PathBuf::from("/tmp/wd/t1/t1.HSX"));
        let p = output_path(Path::new("/tmp/wd"), "t1", OutputKind::DensityMatrix);
        assert_eq!(p, PathBuf::from("/tmp/wd/t1/t1.DM"));
    }

    #[test]
    fn test_with_output_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1.HSX");
        std::fs::write(&path, b"fake hamiltonian").unwrap();

        let content = with_output(&path, |r| {
            let mut buf = String::new();
            r.read_to_string(&mut buf).map_err(|e| {
                crate::error::FsiestaError::FileReadError {
                    path: path.display().to_string(),
                    source: e,
                }
            })?;
            Ok(buf)
        })
        .unwrap();
        assert_eq!(content, "fake hamiltonian");
    }

    #[test]
    fn test_with_output_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1.DM");
        let err = with_output(&path, |_| Ok(()));
        assert!(matches!(err, Err(FsiestaError::FileNotFound { .. })));
    }

    #[test]
    fn test_handle_released_after_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t1.EDM");
        std::fs::write(&path, b"garbage").unwrap();

        let err: Result<()> = with_output(&path, |_| {
            Err(FsiestaError::Other("parse failed".to_string()))
        });
        assert!(err.is_err());
        // 句柄已释放，文件可以删除
        std::fs::remove_file(&path).unwrap();
    }
}
