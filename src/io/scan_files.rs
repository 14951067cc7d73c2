//! Naming and placement of scan and slice files.

use crate::io::{points_to_bytes, read_points, write_points};
use crate::{Point2, Result, Scan, SensorKind};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// The persisted form of a scan.
pub fn scan_to_bytes(scan: &Scan) -> Vec<u8> {
    points_to_bytes(scan.points())
}

/// Builds `<prefix>_scan_<YYYYmmdd-HHMMSS>.csv`, where the prefix is the first letter of the
/// sensor vendor's name.
pub fn scan_file_name(kind: SensorKind, timestamp: &DateTime<Local>) -> String {
    format!(
        "{}_scan_{}.csv",
        kind.file_prefix(),
        timestamp.format("%Y%m%d-%H%M%S")
    )
}

/// Writes a scan to a new timestamped file in `dir`, creating the directory if needed.
pub fn save_scan(dir: &Path, scan: &Scan) -> Result<PathBuf> {
    if scan.is_empty() {
        return Err("scan has no points".into());
    }
    std::fs::create_dir_all(dir)?;
    let path = dir.join(scan_file_name(scan.source(), &Local::now()));
    write_points(&path, scan.points())?;
    log::info!("saved {} points to {}", scan.len(), path.display());
    Ok(path)
}

/// Slice names become file names, so they must be non-empty, free of whitespace, and must not
/// reach outside the slice directory.
pub fn validate_slice_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err("slice name is empty".into());
    }
    if name.chars().any(char::is_whitespace) {
        return Err(format!("slice name '{}' contains whitespace", name).into());
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        return Err(format!("slice name '{}' is not a plain file name", name).into());
    }
    Ok(())
}

fn slice_path(dir: &Path, name: &str) -> PathBuf {
    if name.ends_with(".csv") {
        dir.join(name)
    } else {
        dir.join(format!("{}.csv", name))
    }
}

/// Writes a cropped region of a scan as `<dir>/<name>.csv`.
pub fn save_slice(dir: &Path, name: &str, points: &[Point2]) -> Result<PathBuf> {
    validate_slice_name(name)?;
    if points.is_empty() {
        return Err("no points selected for the slice".into());
    }
    std::fs::create_dir_all(dir)?;
    let path = slice_path(dir, name);
    write_points(&path, points)?;
    Ok(path)
}

/// Loads a slice by name, with or without its `.csv` extension.
pub fn load_slice(dir: &Path, name: &str) -> Result<Vec<Point2>> {
    validate_slice_name(name)?;
    read_points(&slice_path(dir, name))
}

/// Lists the `.csv` file names in `dir`, sorted.
pub fn list_point_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.file_type()?.is_file() && name.ends_with(".csv") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}
