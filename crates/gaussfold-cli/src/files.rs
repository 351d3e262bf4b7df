//! Plain-text inputs and outputs: comma-separated matrices and layouts, and
//! one-code-per-residue label files.

use crate::error::{CliError, Result};
use anyhow::{Context, anyhow};
use gaussfold::core::models::labels::{SecondaryStructure, SolventAccessibility};
use gaussfold::core::models::sequence::AminoAcid;
use nalgebra::{DMatrix, Point3};
use std::path::Path;
use tracing::debug;

fn parsing_error(path: &Path, source: anyhow::Error) -> CliError {
    CliError::FileParsing {
        path: path.to_path_buf(),
        source,
    }
}

/// Empty cells and `NaN` read as missing.
fn parse_cell(cell: &str) -> anyhow::Result<Option<f64>> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let value: f64 = cell
        .parse()
        .with_context(|| format!("'{}' is not a number", cell))?;
    Ok(Some(value))
}

fn parse_line(line: &str) -> anyhow::Result<Vec<Option<f64>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());
    match reader.records().next() {
        Some(record) => record?.iter().map(parse_cell).collect(),
        None => Ok(Vec::new()),
    }
}

/// One entry per line, `#` comment lines excluded. A blank line is an empty
/// row, so row indices stay aligned with line positions in layout files.
fn read_rows(path: &Path) -> Result<Vec<Vec<Option<f64>>>> {
    let content = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim_start().starts_with('#') {
            continue;
        }
        let row = if line.trim().is_empty() {
            Vec::new()
        } else {
            parse_line(line)
                .map_err(|e| parsing_error(path, e.context(format!("line {}", line_no + 1))))?
        };
        rows.push(row);
    }
    debug!("Read {} row(s) from {:?}", rows.len(), path);
    Ok(rows)
}

/// Square matrix; missing cells become NaN.
pub fn read_matrix(path: &Path) -> Result<DMatrix<f64>> {
    let rows: Vec<_> = read_rows(path)?
        .into_iter()
        .filter(|row| !row.is_empty())
        .collect();
    let n = rows.len();
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != n) {
        return Err(parsing_error(
            path,
            anyhow!("row {} has {} columns, expected {}", i + 1, row.len(), n),
        ));
    }
    Ok(DMatrix::from_fn(n, n, |i, j| rows[i][j].unwrap_or(f64::NAN)))
}

/// Layout with possibly unobserved points: a blank line or a row with no
/// values is `None`.
pub fn read_partial_layout(path: &Path) -> Result<Vec<Option<Point3<f64>>>> {
    read_rows(path)?
        .into_iter()
        .enumerate()
        .map(|(i, row)| match row.as_slice() {
            [Some(x), Some(y), Some(z)] => Ok(Some(Point3::new(*x, *y, *z))),
            cells if cells.iter().all(Option::is_none) => Ok(None),
            cells => Err(parsing_error(
                path,
                anyhow!("row {} has {} coordinate(s), expected 3", i + 1, cells.len()),
            )),
        })
        .collect()
}

/// Layout where every point must be present.
pub fn read_layout(path: &Path) -> Result<Vec<Point3<f64>>> {
    read_partial_layout(path)?
        .into_iter()
        .enumerate()
        .map(|(i, p)| p.ok_or_else(|| parsing_error(path, anyhow!("row {} is empty", i + 1))))
        .collect()
}

pub fn write_layout(path: &Path, coords: &[Point3<f64>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| parsing_error(path, e.into()))?;
    for p in coords {
        writer
            .write_record([p.x, p.y, p.z].iter().map(|c| format!("{:.6}", c)))
            .map_err(|e| parsing_error(path, e.into()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes one row per point; missing points become empty cells.
pub fn write_partial_layout(path: &Path, coords: &[Option<Point3<f64>>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| parsing_error(path, e.into()))?;
    for p in coords {
        let record = match p {
            Some(p) => [p.x, p.y, p.z].map(|c| format!("{:.6}", c)),
            None => [String::new(), String::new(), String::new()],
        };
        writer
            .write_record(&record)
            .map_err(|e| parsing_error(path, e.into()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Label text with FASTA-style `>` header lines removed.
fn read_label_text(path: &Path) -> Result<String> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .filter(|line| !line.trim_start().starts_with('>'))
        .collect::<Vec<_>>()
        .join(""))
}

pub fn read_secondary_structure(path: &Path) -> Result<Vec<SecondaryStructure>> {
    let text = read_label_text(path)?;
    SecondaryStructure::parse_sequence(&text).map_err(|e| parsing_error(path, e.into()))
}

pub fn read_accessibility(path: &Path) -> Result<Vec<SolventAccessibility>> {
    let text = read_label_text(path)?;
    SolventAccessibility::parse_sequence(&text).map_err(|e| parsing_error(path, e.into()))
}

pub fn read_sequence(path: &Path) -> Result<Vec<AminoAcid>> {
    let text = read_label_text(path)?;
    AminoAcid::parse_sequence(&text).map_err(|e| parsing_error(path, e.into()))
}
