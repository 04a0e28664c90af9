//! AutoGrid map files (`*.e.map`).

use darcflow_common::DarcError;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::grid::{GridGeometry, ScalarGrid};
use crate::Result;

/// Keywords that open the header lines of an AutoGrid map. Every other line
/// carries one sample.
pub const HEADER_KEYWORDS: [&str; 5] = ["GRID", "MACROMOLECULE", "SPACING", "CENTER", "NELEMENTS"];

pub fn is_header_line(line: &str) -> bool {
    HEADER_KEYWORDS.iter().any(|kw| line.starts_with(kw))
}

/// Metadata declared in a map header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmapHeader {
    pub spacing: Option<f64>,
    pub nelements: Option<[usize; 3]>,
    pub center: Option<[f64; 3]>,
    pub macromolecule: Option<String>,
}

impl EmapHeader {
    /// Read the header lines of `path`, stopping at the first sample.
    pub fn read(path: &Path) -> Result<Self> {
        DarcError::require(path)?;
        let reader = BufReader::new(File::open(path)?);
        let mut header = Self::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if !is_header_line(&line) {
                break;
            }
            let mut fields = line.split_whitespace();
            let keyword = fields.next().unwrap_or_default();
            let rest: Vec<&str> = fields.collect();
            let bad = |what: &str| DarcError::format(path, idx + 1, format!("malformed {what} line"));

            match keyword {
                "SPACING" => {
                    let value = rest.first().and_then(|s| s.parse().ok()).ok_or_else(|| bad("SPACING"))?;
                    header.spacing = Some(value);
                }
                "NELEMENTS" => {
                    let n = parse_triple::<usize>(&rest).ok_or_else(|| bad("NELEMENTS"))?;
                    header.nelements = Some(n);
                }
                "CENTER" => {
                    let c = parse_triple::<f64>(&rest).ok_or_else(|| bad("CENTER"))?;
                    header.center = Some(c);
                }
                "MACROMOLECULE" => {
                    header.macromolecule = rest.first().map(|s| s.to_string());
                }
                _ => {}
            }
        }

        Ok(header)
    }
}

fn parse_triple<T: std::str::FromStr + Copy>(fields: &[&str]) -> Option<[T; 3]> {
    if fields.len() < 3 {
        return None;
    }
    let x = fields[0].parse().ok()?;
    let y = fields[1].parse().ok()?;
    let z = fields[2].parse().ok()?;
    Some([x, y, z])
}

/// Read every sample of a map into memory, checking it against `geometry`.
pub fn read_emap(path: &Path, geometry: GridGeometry) -> Result<ScalarGrid> {
    DarcError::require(path)?;
    let reader = BufReader::new(File::open(path)?);
    let mut values = Vec::with_capacity(geometry.capacity_hint());
    let mut line_no = 0;

    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        if is_header_line(&line) {
            continue;
        }
        let value = line.trim().parse::<f64>().map_err(|_| {
            DarcError::format(path, line_no, format!("`{}` is not a number", line.trim()))
        })?;
        values.push(value);
    }

    let found = values.len();
    ScalarGrid::new(geometry, values).ok_or_else(|| {
        DarcError::format(
            path,
            line_no,
            format!("expected {} values for a {}³ grid, found {}", geometry.len(), geometry.points, found),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const MAP: &str = "GRID_PARAMETER_FILE 1abc.gpf\n\
GRID_DATA_FILE 1abc.maps.fld\n\
MACROMOLECULE 1abc.pdbqt\n\
SPACING 0.375\n\
NELEMENTS 1 1 1\n\
CENTER 10.500 -2.250 3.000\n\
0.1\n0.2\n0.3\n0.4\n0.5\n0.6\n0.7\n0.8\n";

    #[test]
    fn test_header_keywords() {
        assert!(is_header_line("GRID_DATA_FILE x.maps.fld"));
        assert!(is_header_line("CENTER 0 0 0"));
        assert!(!is_header_line("-0.327"));
        assert!(!is_header_line(" SPACING 0.375"));
    }

    #[test]
    fn test_read_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1abc.e.map");
        std::fs::write(&path, MAP).unwrap();

        let header = EmapHeader::read(&path).unwrap();
        assert_eq!(header.spacing, Some(0.375));
        assert_eq!(header.nelements, Some([1, 1, 1]));
        assert_eq!(header.center, Some([10.5, -2.25, 3.0]));
        assert_eq!(header.macromolecule.as_deref(), Some("1abc.pdbqt"));
    }

    #[test]
    fn test_read_emap_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1abc.e.map");
        std::fs::write(&path, MAP).unwrap();

        let geometry = GridGeometry::from_header(&EmapHeader::read(&path).unwrap()).unwrap();
        let grid = read_emap(&path, geometry).unwrap();
        assert_eq!(grid.len(), 8);
        assert_eq!(grid.values()[7], 0.8);
    }

    #[test]
    fn test_read_emap_count_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.e.map");
        std::fs::write(&path, "SPACING 1.0\n1.0\n2.0\n").unwrap();

        let geometry = GridGeometry::new([0.0; 3], 1.0, 2).unwrap();
        let err = read_emap(&path, geometry).unwrap_err();
        assert!(matches!(err, DarcError::FormatViolation { .. }));
    }

    #[test]
    fn test_missing_map() {
        let err = EmapHeader::read(Path::new("/nope/none.e.map")).unwrap_err();
        assert!(matches!(err, DarcError::MissingInput(_)));
    }
}
