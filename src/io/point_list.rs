use crate::{Point2, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Writes one `x,y` line per point, terminated with CRLF.
pub fn write_points_to<W: Write>(writer: &mut W, points: &[Point2]) -> Result<()> {
    for p in points {
        write!(writer, "{},{}\r\n", p.x, p.y)?;
    }
    Ok(())
}

pub fn points_to_bytes(points: &[Point2]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(points.len() * 24);
    for p in points {
        bytes.extend_from_slice(format!("{},{}\r\n", p.x, p.y).as_bytes());
    }
    bytes
}

pub fn write_points(path: &Path, points: &[Point2]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_points_to(&mut writer, points)?;
    writer.flush()?;
    Ok(())
}

/// Parses delimited point text. Lines may end in LF or CRLF and blank lines are ignored; every
/// other line must hold exactly two numbers separated by a comma.
pub fn parse_points(text: &str) -> Result<Vec<Point2>> {
    let mut points = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields = line.split(',').map(str::trim).collect::<Vec<_>>();
        let [x, y] = fields.as_slice() else {
            return Err(format!("line {}: expected 2 fields, found {}", i + 1, fields.len()).into());
        };

        let x = x
            .parse::<f64>()
            .map_err(|e| format!("line {}: bad x value '{}': {}", i + 1, x, e))?;
        let y = y
            .parse::<f64>()
            .map_err(|e| format!("line {}: bad y value '{}': {}", i + 1, y, e))?;
        points.push(Point2::new(x, y));
    }
    Ok(points)
}

pub fn read_points(path: &Path) -> Result<Vec<Point2>> {
    let text = std::fs::read_to_string(path)?;
    parse_points(&text)
}
