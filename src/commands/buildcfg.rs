//! # buildcfg 命令实现
//!
//! 引擎以原生构建工具 (make) 编译；链接其库所需的编译/链接参数只能
//! 从构建系统自身提取。做法：在 Obj 目录里跑 `make --dry-run`，
//! 归组反斜杠续行，从编译命令抽取 `-I`，从链接命令抽取 `-L`/`-l`，
//! 渲染为一份临时性的 pkg-config 文件。
//!
//! ## 依赖关系
//! - 使用 `cli/buildcfg.rs` 定义的参数
//! - 使用 `utils/output.rs`
//! - 使用 `glob` 扫描 Obj 目录

use crate::cli::buildcfg::BuildcfgArgs;
use crate::error::{FsiestaError, Result};
use crate::utils::output;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// 执行 buildcfg 命令
pub fn execute(args: BuildcfgArgs) -> Result<()> {
    output::print_header("Engine linkage discovery");

    if !args.objdir.is_dir() {
        return Err(FsiestaError::DirectoryNotFound {
            path: args.objdir.display().to_string(),
        });
    }
    let objdir = args
        .objdir
        .canonicalize()
        .map_err(|e| FsiestaError::FileReadError {
            path: args.objdir.display().to_string(),
            source: e,
        })?;

    warn_if_no_modules(&objdir);

    let compile_cmds = group_make_commands(&dry_run_make(&objdir, "siesta.o")?);
    let mut includes = include_dirs(&compile_cmds, &objdir)?;
    includes.push(objdir.display().to_string());
    output::print_info(&format!("Found {} include dirs", includes.len()));

    let link_cmds = group_make_commands(&dry_run_make(&objdir, "siesta")?);
    let (mut lpaths, mut libs) = link_args(&link_cmds, &objdir)?;
    lpaths.push(objdir.display().to_string());
    libs.push("siesta".to_string());
    output::print_info(&format!(
        "Found {} library paths, {} libraries",
        lpaths.len(),
        libs.len()
    ));

    if args.create_lib {
        output::print_info(&format!("Creating libsiesta.a in {}", objdir.display()));
        create_libsiesta(&objdir)?;
    }

    let pcfile = args.pkgdir.join(format!("{}.pc", args.name));
    let text = render_pkg_config(&args.name, &args.pkg_version, &lpaths, &libs, &includes);
    fs::write(&pcfile, text).map_err(|e| FsiestaError::FileWriteError {
        path: pcfile.display().to_string(),
        source: e,
    })?;

    output::print_done(&format!("Wrote {}", pcfile.display()));
    Ok(())
}

/// 在 `objdir` 里执行 `make --dry-run <target>` 并返回 stdout
fn dry_run_make(objdir: &Path, target: &str) -> Result<String> {
    let out = Command::new("make")
        .arg("--dry-run")
        .arg(target)
        .current_dir(objdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FsiestaError::CommandNotFound {
                command: "make".to_string(),
            },
            _ => FsiestaError::CommandFailed {
                command: format!("make --dry-run {}", target),
                stderr: e.to_string(),
            },
        })?;
    if !out.status.success() {
        return Err(FsiestaError::CommandFailed {
            command: format!("make --dry-run {}", target),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}

/// 把反斜杠续行归组为完整命令
pub(crate) fn group_make_commands(output_text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in output_text.lines() {
        let line = line.trim();
        let continues = line.ends_with('\\');
        let body = if continues {
            line[..line.len() - 1].trim_end()
        } else {
            line
        };
        current.push(body.to_string());
        if !continues {
            commands.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        commands.push(current.join(" "));
    }
    commands
}

/// 相对路径折算到 `base` 下的绝对路径
fn abs_relative(base: &Path, rel: &str) -> String {
    let rel_path = PathBuf::from(rel);
    if rel_path.is_absolute() {
        rel.to_string()
    } else {
        base.join(rel_path).display().to_string()
    }
}

/// 取以任一前缀开头的参数，剥去前缀
fn strip_prefixed(args: &[&str], prefixes: &[&str]) -> Vec<String> {
    let mut out = Vec::new();
    for prefix in prefixes {
        for arg in args {
            if let Some(rest) = arg.strip_prefix(prefix) {
                if !rest.is_empty() {
                    out.push(rest.to_string());
                }
            }
        }
    }
    out
}

/// 从编译 siesta.F 的命令中提取 `-I` 包含目录
pub(crate) fn include_dirs(commands: &[String], objdir: &Path) -> Result<Vec<String>> {
    let compile_cmd = commands
        .iter()
        .find(|c| c.contains("siesta.F") && c.contains("-c "))
        .ok_or_else(|| FsiestaError::Other(
            "No compile command for siesta.F in make output; did you build the engine here?"
                .to_string(),
        ))?;
    let args: Vec<&str> = compile_cmd.split_whitespace().collect();
    Ok(strip_prefixed(&args, &["-I"])
        .iter()
        .map(|p| abs_relative(objdir, p))
        .collect())
}

/// 从链接命令中提取库搜索路径与库名
pub(crate) fn link_args(commands: &[String], objdir: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let link_cmd = commands
        .iter()
        .find(|c| c.contains("-o siesta"))
        .ok_or_else(|| FsiestaError::Other(
            "No link command for siesta in make output".to_string(),
        ))?;
    let args: Vec<&str> = link_cmd.split_whitespace().collect();
    let lpaths = strip_prefixed(&args, &["-L", "-Wl,rpath="])
        .iter()
        .map(|p| abs_relative(objdir, p))
        .collect();
    let libs = strip_prefixed(&args, &["-l"]);
    Ok((lpaths, libs))
}

/// 渲染临时性 pkg-config 文件
pub(crate) fn render_pkg_config(
    name: &str,
    version: &str,
    lpaths: &[String],
    libs: &[String],
    includes: &[String],
) -> String {
    let lpaths = lpaths
        .iter()
        .map(|p| format!("-L{}", p))
        .collect::<Vec<_>>()
        .join(" ");
    let libs = libs
        .iter()
        .map(|l| format!("-l{}", l))
        .collect::<Vec<_>>()
        .join(" ");
    let includes = includes
        .iter()
        .map(|p| format!("-I{}", p))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"Name: {}
Description: Improper pkgconf-file. Links to a custom engine Obj dir.
Version: {}
Libs: {} {}
Cflags: {}
"#,
        name, version, lpaths, libs, includes
    )
}

/// 老版引擎不生成 libsiesta.a；用归档器自行拼一份
fn create_libsiesta(objdir: &Path) -> Result<()> {
    let thin = objdir.join("libsiesta_thin_nested.a");
    let lib = objdir.join("libsiesta.a");
    for p in [&thin, &lib] {
        if p.exists() {
            return Err(FsiestaError::Other(format!(
                "{} already exists!",
                p.display()
            )));
        }
    }

    let pattern_o = format!("{}/*.o", objdir.display());
    let pattern_a = format!("{}/*.a", objdir.display());
    let mut compiled: Vec<String> = Vec::new();
    for pattern in [&pattern_o, &pattern_a] {
        for entry in glob::glob(pattern)
            .map_err(|e| FsiestaError::Other(format!("Bad glob pattern: {}", e)))?
            .flatten()
        {
            compiled.push(entry.display().to_string());
        }
    }
    if compiled.is_empty() {
        return Err(FsiestaError::Other(format!(
            "No object files in {}; run `make lib` first",
            objdir.display()
        )));
    }

    run_archiver(
        Command::new("ar")
            .arg("rcsT")
            .arg(&thin)
            .args(&compiled)
            .current_dir(objdir),
        "ar rcsT",
    )?;

    // ar 脚本：把 thin archive 展开成常规 archive
    let script = format!(
        "CREATE {}\nADDLIB {}\nSAVE\nEND\n",
        lib.display(),
        thin.display()
    );
    let mut child = Command::new("ar")
        .arg("-M")
        .current_dir(objdir)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| FsiestaError::CommandFailed {
            command: "ar -M".to_string(),
            stderr: e.to_string(),
        })?;
    if let Some(stdin) = child.stdin.as_mut() {
        stdin
            .write_all(script.as_bytes())
            .map_err(|e| FsiestaError::CommandFailed {
                command: "ar -M".to_string(),
                stderr: e.to_string(),
            })?;
    }
    let status = child.wait().map_err(|e| FsiestaError::CommandFailed {
        command: "ar -M".to_string(),
        stderr: e.to_string(),
    })?;
    if !status.success() {
        return Err(FsiestaError::CommandFailed {
            command: "ar -M".to_string(),
            stderr: String::new(),
        });
    }

    run_archiver(
        Command::new("ranlib").arg(&lib).current_dir(objdir),
        "ranlib",
    )
}

fn run_archiver(cmd: &mut Command, name: &str) -> Result<()> {
    let out = cmd.output().map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => FsiestaError::CommandNotFound {
            command: name.split_whitespace().next().unwrap_or(name).to_string(),
        },
        _ => FsiestaError::CommandFailed {
            command: name.to_string(),
            stderr: e.to_string(),
        },
    })?;
    if !out.status.success() {
        return Err(FsiestaError::CommandFailed {
            command: name.to_string(),
            stderr: String::from_utf8_lossy(&out.stderr).to_string(),
        });
    }
    Ok(())
}

/// Obj 目录里没有 .mod 文件多半意味着 `make lib` 还没跑
fn warn_if_no_modules(objdir: &Path) {
    let pattern = format!("{}/*.mod", objdir.display());
    let count = glob::glob(&pattern)
        .map(|paths| paths.flatten().count())
        .unwrap_or(0);
    if count == 0 {
        output::print_warning(&format!(
            "No Fortran .mod files in {}; engine modules may not be built",
            objdir.display()
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_make_commands_joins_continuations() {
        let raw = "gfortran -c \\\n  -I/usr/include \\\n  siesta.F\necho done\n";
        let cmds = group_make_commands(raw);
        assert_eq!(cmds.len(), 2);
        assert_eq!(cmds[0], "gfortran -c -I/usr/include siesta.F");
        assert_eq!(cmds[1], "echo done");
    }

    #[test]
    fn test_include_dirs_resolved_against_objdir() {
        let cmds = vec![
            "rm -f siesta.o".to_string(),
            "mpif90 -c -I../Src -I/opt/include -O2 siesta.F".to_string(),
        ];
        let dirs = include_dirs(&cmds, Path::new("/build/Obj")).unwrap();
        assert_eq!(dirs, vec!["/build/Obj/../Src", "/opt/include"]);
    }

    #[test]
    fn test_include_dirs_requires_compile_command() {
        let cmds = vec!["echo nothing to do".to_string()];
        assert!(include_dirs(&cmds, Path::new("/build/Obj")).is_err());
    }

    #[test]
    fn test_link_args_extraction() {
        let cmds = vec![
            "mpif90 -o siesta *.o -L/opt/lib -Lmylibs -lscalapack -llapack -lblas".to_string(),
        ];
        let (lpaths, libs) = link_args(&cmds, Path::new("/build/Obj")).unwrap();
        assert_eq!(lpaths, vec!["/opt/lib", "/build/Obj/mylibs"]);
        assert_eq!(libs, vec!["scalapack", "lapack", "blas"]);
    }

    #[test]
    fn test_render_pkg_config() {
        let text = render_pkg_config(
            "Siesta",
            "4.2",
            &["/obj".to_string()],
            &["siesta".to_string()],
            &["/obj/include".to_string()],
        );
        assert!(text.contains("Name: Siesta"));
        assert!(text.contains("Version: 4.2"));
        assert!(text.contains("Libs: -L/obj -lsiesta"));
        assert!(text.contains("Cflags: -I/obj/include"));
    }
}
