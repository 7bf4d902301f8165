//! # SIESTA fdf 结构块读写
//!
//! 只覆盖结构所需的三个块，坐标与晶格一律以 Å 的笛卡尔形式写出。
//!
//! ## fdf 结构片段
//! ```text
//! NumberOfAtoms 2
//! NumberOfSpecies 1
//! %block ChemicalSpeciesLabel
//!   1  6  C
//! %endblock ChemicalSpeciesLabel
//! LatticeConstant 1.0 Ang
//! %block LatticeVectors
//!   a1 a2 a3
//!   b1 b2 b3
//!   c1 c2 c3
//! %endblock LatticeVectors
//! AtomicCoordinatesFormat Ang
//! %block AtomicCoordinatesAndAtomicSpecies
//!   x y z ispec
//! %endblock AtomicCoordinatesAndAtomicSpecies
//! ```
//!
//! ## 依赖关系
//! - 被 `input.rs`, `calculator.rs` 使用
//! - 使用 `models/geometry.rs`

use crate::error::{FsiestaError, Result};
use crate::models::{Atom, Geometry, Species};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// 把结构序列化为 fdf 片段
pub fn format_structure(geometry: &Geometry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "NumberOfAtoms {}", geometry.natoms());
    let _ = writeln!(out, "NumberOfSpecies {}", geometry.species.len());

    let _ = writeln!(out, "%block ChemicalSpeciesLabel");
    for (i, sp) in geometry.species.iter().enumerate() {
        let _ = writeln!(out, "  {}  {}  {}", i + 1, sp.atomic_number, sp.label);
    }
    let _ = writeln!(out, "%endblock ChemicalSpeciesLabel");

    let _ = writeln!(out, "LatticeConstant 1.0 Ang");
    let _ = writeln!(out, "%block LatticeVectors");
    for row in &geometry.cell {
        let _ = writeln!(out, "  {:.10}  {:.10}  {:.10}", row[0], row[1], row[2]);
    }
    let _ = writeln!(out, "%endblock LatticeVectors");

    let _ = writeln!(out, "AtomicCoordinatesFormat Ang");
    let _ = writeln!(out, "%block AtomicCoordinatesAndAtomicSpecies");
    for atom in &geometry.atoms {
        let _ = writeln!(
            out,
            "  {:.10}  {:.10}  {:.10}  {}",
            atom.xyz[0],
            atom.xyz[1],
            atom.xyz[2],
            atom.species + 1
        );
    }
    let _ = writeln!(out, "%endblock AtomicCoordinatesAndAtomicSpecies");
    out
}

/// 写出结构文件
pub fn write_structure_file(path: &Path, geometry: &Geometry) -> Result<()> {
    fs::write(path, format_structure(geometry)).map_err(|e| FsiestaError::FileWriteError {
        path: path.display().to_string(),
        source: e,
    })
}

/// 解析 fdf 文件中的结构；块缺失时跟随 `%include` 指令继续查找
pub fn parse_geometry_file(path: &Path) -> Result<Geometry> {
    let content = fs::read_to_string(path).map_err(|e| FsiestaError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    parse_with_includes(&content, base, &path.display().to_string())
}

/// 从字符串内容解析结构（不解析 include）
pub fn parse_geometry_content(content: &str, origin: &str) -> Result<Geometry> {
    let species = parse_species_block(content, origin)?;
    let cell = parse_lattice_block(content, origin)?;
    let atoms = parse_coordinates_block(content, species.len(), origin)?;
    Ok(Geometry::new(species, atoms, cell))
}

/// 内容中是否已包含结构块
pub fn has_structure_blocks(content: &str) -> bool {
    find_block_start(content, "ATOMICCOORDINATESANDATOMICSPECIES").is_some()
}

fn parse_with_includes(content: &str, base: &Path, origin: &str) -> Result<Geometry> {
    if has_structure_blocks(content) {
        return parse_geometry_content(content, origin);
    }
    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("%include") {
            let target = base.join(rest.trim());
            if target.is_file() {
                if let Ok(geom) = parse_geometry_file(&target) {
                    return Ok(geom);
                }
            }
        }
    }
    Err(FsiestaError::ParseError {
        format: "fdf".to_string(),
        path: origin.to_string(),
        reason: "No structure blocks found (directly or via %include)".to_string(),
    })
}

/// 查找 `%block XXX` 的起始行号（大小写不敏感）
fn find_block_start(content: &str, block_upper: &str) -> Option<usize> {
    for (i, line) in content.lines().enumerate() {
        let line = line.trim().to_uppercase();
        if let Some(rest) = line.strip_prefix("%BLOCK") {
            if rest.trim() == block_upper {
                return Some(i);
            }
        }
    }
    None
}

/// 迭代块内容行，跳过空行与注释
fn block_lines<'a>(content: &'a str, start: usize) -> impl Iterator<Item = &'a str> {
    content
        .lines()
        .skip(start + 1)
        .take_while(|l| !l.trim().to_uppercase().starts_with("%ENDBLOCK"))
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('!'))
}

fn parse_species_block(content: &str, origin: &str) -> Result<Vec<Species>> {
    let start = find_block_start(content, "CHEMICALSPECIESLABEL").ok_or_else(|| {
        FsiestaError::ParseError {
            format: "fdf".to_string(),
            path: origin.to_string(),
            reason: "Missing ChemicalSpeciesLabel block".to_string(),
        }
    })?;

    let mut species = Vec::new();
    for line in block_lines(content, start) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 3 {
            return Err(FsiestaError::ParseError {
                format: "fdf".to_string(),
                path: origin.to_string(),
                reason: format!("Malformed species line: '{}'", line),
            });
        }
        let z: i32 = parts[1].parse().map_err(|_| FsiestaError::ParseError {
            format: "fdf".to_string(),
            path: origin.to_string(),
            reason: format!("Invalid atomic number: '{}'", parts[1]),
        })?;
        species.push(Species::new(parts[2], z));
    }
    Ok(species)
}

fn parse_lattice_block(content: &str, origin: &str) -> Result<[[f64; 3]; 3]> {
    let start =
        find_block_start(content, "LATTICEVECTORS").ok_or_else(|| FsiestaError::ParseError {
            format: "fdf".to_string(),
            path: origin.to_string(),
            reason: "Missing LatticeVectors block".to_string(),
        })?;

    let mut matrix = [[0.0; 3]; 3];
    let mut row_idx = 0;
    for line in block_lines(content, start) {
        let parts: Vec<f64> = line
            .split_whitespace()
            .filter_map(|s| s.parse().ok())
            .collect();
        if parts.len() >= 3 && row_idx < 3 {
            matrix[row_idx] = [parts[0], parts[1], parts[2]];
            row_idx += 1;
        }
    }
    if row_idx < 3 {
        return Err(FsiestaError::ParseError {
            format: "fdf".to_string(),
            path: origin.to_string(),
            reason: "Incomplete LatticeVectors block".to_string(),
        });
    }
    Ok(matrix)
}

fn parse_coordinates_block(content: &str, nspecies: usize, origin: &str) -> Result<Vec<Atom>> {
    let start = find_block_start(content, "ATOMICCOORDINATESANDATOMICSPECIES").ok_or_else(|| {
        FsiestaError::ParseError {
            format: "fdf".to_string(),
            path: origin.to_string(),
            reason: "Missing AtomicCoordinatesAndAtomicSpecies block".to_string(),
        }
    })?;

    let mut atoms = Vec::new();
    for line in block_lines(content, start) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            return Err(FsiestaError::ParseError {
                format: "fdf".to_string(),
                path: origin.to_string(),
                reason: format!("Malformed coordinate line: '{}'", line),
            });
        }
        let xyz: Vec<f64> = parts[..3].iter().filter_map(|s| s.parse().ok()).collect();
        let ispec: usize = parts[3].parse().map_err(|_| FsiestaError::ParseError {
            format: "fdf".to_string(),
            path: origin.to_string(),
            reason: format!("Invalid species index: '{}'", parts[3]),
        })?;
        if xyz.len() < 3 || ispec == 0 || ispec > nspecies {
            return Err(FsiestaError::ParseError {
                format: "fdf".to_string(),
                path: origin.to_string(),
                reason: format!("Invalid coordinate line: '{}'", line),
            });
        }
        atoms.push(Atom::new(ispec - 1, [xyz[0], xyz[1], xyz[2]]));
    }
    Ok(atoms)
}
