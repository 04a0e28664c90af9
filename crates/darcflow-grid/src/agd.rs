//! AGD ASCII grids and the e-map to AGD conversion.
//!
//! Layout:
//!
//! ```text
//! Title:
//! Mid: <x> <y> <z>
//! Dim: <n> <n> <n>
//! Spacing: <s>
//! Values:
//! <one value per line>
//! ```

use darcflow_common::DarcError;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::emap::is_header_line;
use crate::grid::{GridGeometry, ScalarGrid};
use crate::Result;

/// Options for [`convert_emap_to_agd`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConvertOptions {
    /// Parse every sample and check the sample count against the geometry.
    /// Samples are still copied verbatim.
    pub validate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionSummary {
    pub dest: PathBuf,
    pub values_written: usize,
}

/// Default AGD destination for a map: `name.e.map` becomes `name.agd`, next to
/// the map or inside `out_dir`.
pub fn agd_path_for(emap: &Path, out_dir: Option<&Path>) -> PathBuf {
    let file_name = emap
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let agd_name = match file_name.strip_suffix(".e.map") {
        Some(stem) => format!("{stem}.agd"),
        None => format!("{file_name}.agd"),
    };
    match out_dir {
        Some(dir) => dir.join(agd_name),
        None => emap.with_file_name(agd_name),
    }
}

pub(crate) fn write_header<W: Write>(out: &mut W, geometry: &GridGeometry) -> std::io::Result<()> {
    let [x, y, z] = geometry.center;
    let n = geometry.points;
    writeln!(out, "Title:")?;
    writeln!(out, "Mid: {x:.6} {y:.6} {z:.6}")?;
    writeln!(out, "Dim: {n} {n} {n}")?;
    writeln!(out, "Spacing: {:.6}", geometry.spacing)?;
    writeln!(out, "Values:")
}

/// Rewrite an AutoGrid map as an AGD grid in one streaming pass.
///
/// The header comes from `geometry`; every non-header line of the map is
/// copied in order. On error the partially written destination is removed.
pub fn convert_emap_to_agd(
    source: &Path,
    dest: &Path,
    geometry: &GridGeometry,
    options: &ConvertOptions,
) -> Result<ConversionSummary> {
    DarcError::require(source)?;
    info!("Converting {} to {}", source.display(), dest.display());

    let reader = BufReader::new(File::open(source)?);
    match stream_values(reader, source, dest, geometry, options) {
        Ok(values_written) => {
            debug!("Wrote {} values to {}", values_written, dest.display());
            Ok(ConversionSummary {
                dest: dest.to_path_buf(),
                values_written,
            })
        }
        Err(e) => {
            let _ = fs::remove_file(dest);
            Err(e)
        }
    }
}

fn stream_values<R: BufRead>(
    reader: R,
    source: &Path,
    dest: &Path,
    geometry: &GridGeometry,
    options: &ConvertOptions,
) -> Result<usize> {
    let mut out = BufWriter::new(File::create(dest)?);
    write_header(&mut out, geometry)?;

    let mut written = 0;
    let mut line_no = 0;
    for line in reader.lines() {
        let line = line?;
        line_no += 1;
        if is_header_line(&line) {
            continue;
        }
        let value = line.strip_suffix('\r').unwrap_or(&line);
        if options.validate && value.trim().parse::<f64>().is_err() {
            return Err(DarcError::format(
                source,
                line_no,
                format!("`{}` is not a number", value.trim()),
            ));
        }
        writeln!(out, "{value}")?;
        written += 1;
    }

    if options.validate && written != geometry.len() {
        return Err(DarcError::format(
            source,
            line_no,
            format!(
                "expected {} values for a {}³ grid, found {}",
                geometry.len(),
                geometry.points,
                written
            ),
        ));
    }

    out.flush()?;
    Ok(written)
}

/// Parse an AGD grid back into memory.
pub fn read_agd(path: &Path) -> Result<ScalarGrid> {
    DarcError::require(path)?;
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();
    let mut line_no = 0;

    let mut next_header = |key: &str| -> Result<String> {
        line_no += 1;
        let line = lines
            .next()
            .transpose()?
            .ok_or_else(|| DarcError::format(path, line_no, format!("missing `{key}` line")))?;
        line.strip_prefix(key)
            .map(|rest| rest.trim().to_string())
            .ok_or_else(|| DarcError::format(path, line_no, format!("expected `{key}`, got `{line}`")))
    };

    next_header("Title:")?;
    let mid = next_header("Mid:")?;
    let dim = next_header("Dim:")?;
    let spacing = next_header("Spacing:")?;
    next_header("Values:")?;

    let center = parse_numbers::<f64>(&mid)
        .filter(|v| v.len() == 3)
        .ok_or_else(|| DarcError::format(path, 2, format!("bad Mid `{mid}`")))?;
    let dims = parse_numbers::<usize>(&dim)
        .filter(|v| v.len() == 3)
        .ok_or_else(|| DarcError::format(path, 3, format!("bad Dim `{dim}`")))?;
    if dims[0] != dims[1] || dims[1] != dims[2] {
        return Err(DarcError::format(path, 3, format!("non-cubic Dim `{dim}`")));
    }
    let spacing: f64 = spacing
        .parse()
        .map_err(|_| DarcError::format(path, 4, format!("bad Spacing `{spacing}`")))?;

    let geometry = GridGeometry::new([center[0], center[1], center[2]], spacing, dims[0])
        .map_err(|e| DarcError::format(path, 3, e.to_string()))?;

    let mut values = Vec::with_capacity(geometry.capacity_hint());
    let mut line_no = 5;
    for line in lines {
        let line = line?;
        line_no += 1;
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
            format!("Dim declares {} values, found {}", geometry.len(), found),
        )
    })
}

fn parse_numbers<T: std::str::FromStr>(text: &str) -> Option<Vec<T>> {
    text.split_whitespace().map(|s| s.parse().ok()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn sample_map(dir: &Path) -> PathBuf {
        let path = dir.join("target.e.map");
        let mut text = String::from("GRID\nSPACING 0.5\nCENTER 0 0 0\n");
        for v in 1..=8 {
            text.push_str(&format!("{v}.0\n"));
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_agd_path_for() {
        assert_eq!(
            agd_path_for(Path::new("/data/1abc.e.map"), None),
            PathBuf::from("/data/1abc.agd")
        );
        assert_eq!(
            agd_path_for(Path::new("/data/1abc.e.map"), Some(Path::new("/out"))),
            PathBuf::from("/out/1abc.agd")
        );
    }

    #[test]
    fn test_convert_exact_output() {
        let dir = tempdir().unwrap();
        let source = sample_map(dir.path());
        let dest = dir.path().join("target.agd");
        let geometry = GridGeometry::new([0.0; 3], 0.5, 2).unwrap();

        let summary = convert_emap_to_agd(&source, &dest, &geometry, &ConvertOptions::default()).unwrap();
        assert_eq!(summary.values_written, 8);

        let text = fs::read_to_string(&dest).unwrap();
        assert_eq!(
            text,
            "Title:\nMid: 0.000000 0.000000 0.000000\nDim: 2 2 2\nSpacing: 0.500000\nValues:\n\
1.0\n2.0\n3.0\n4.0\n5.0\n6.0\n7.0\n8.0\n"
        );
    }

    #[test]
    fn test_values_copied_verbatim() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("x.e.map");
        fs::write(&source, "SPACING 1\r\n-0.327\r\n1.000e-03\r\n").unwrap();
        let dest = dir.path().join("x.agd");
        let geometry = GridGeometry::new([1.25, -3.5, 0.0], 1.0, 1).unwrap();

        convert_emap_to_agd(&source, &dest, &geometry, &ConvertOptions::default()).unwrap();
        let text = fs::read_to_string(&dest).unwrap();
        assert!(text.starts_with("Title:\nMid: 1.250000 -3.500000 0.000000\nDim: 1 1 1\n"));
        assert!(text.ends_with("Values:\n-0.327\n1.000e-03\n"));
    }

    #[test]
    fn test_validate_rejects_garbage_and_cleans_up() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("bad.e.map");
        fs::write(&source, "SPACING 1\n1.0\nnot-a-number\n").unwrap();
        let dest = dir.path().join("bad.agd");
        let geometry = GridGeometry::new([0.0; 3], 1.0, 1).unwrap();

        let err = convert_emap_to_agd(&source, &dest, &geometry, &ConvertOptions { validate: true })
            .unwrap_err();
        match err {
            DarcError::FormatViolation { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_validate_checks_count() {
        let dir = tempdir().unwrap();
        let source = sample_map(dir.path());
        let dest = dir.path().join("target.agd");
        let geometry = GridGeometry::new([0.0; 3], 0.5, 3).unwrap();

        let err = convert_emap_to_agd(&source, &dest, &geometry, &ConvertOptions { validate: true })
            .unwrap_err();
        assert!(err.to_string().contains("expected 27 values"));
    }

    #[test]
    fn test_missing_source() {
        let dir = tempdir().unwrap();
        let geometry = GridGeometry::new([0.0; 3], 0.5, 2).unwrap();
        let err = convert_emap_to_agd(
            &dir.path().join("absent.e.map"),
            &dir.path().join("absent.agd"),
            &geometry,
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, DarcError::MissingInput(_)));
    }

    #[test]
    fn test_read_back_dim() {
        let dir = tempdir().unwrap();
        let source = sample_map(dir.path());
        let dest = dir.path().join("target.agd");
        let geometry = GridGeometry::new([4.0, 5.0, 6.0], 0.5, 2).unwrap();
        convert_emap_to_agd(&source, &dest, &geometry, &ConvertOptions::default()).unwrap();

        let grid = read_agd(&dest).unwrap();
        assert_eq!(grid.geometry().points, 2);
        assert_eq!(grid.geometry().center, [4.0, 5.0, 6.0]);
        assert_eq!(grid.values(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_read_agd_rejects_bad_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.agd");
        fs::write(&path, "Title:\nMid: 0 0 0\nDim: 2 2 3\nSpacing: 1\nValues:\n").unwrap();
        assert!(read_agd(&path).is_err());

        fs::write(&path, "Title:\nMid: 0 0\n").unwrap();
        assert!(read_agd(&path).is_err());
    }

    #[test]
    fn test_read_agd_rejects_huge_dim() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.agd");
        fs::write(
            &path,
            "Title:\nMid: 0 0 0\nDim: 3000000 3000000 3000000\nSpacing: 1\nValues:\n1.0\n",
        )
        .unwrap();
        let err = read_agd(&path).unwrap_err();
        assert!(matches!(err, DarcError::FormatViolation { line: 3, .. }));

        // Representable but far larger than the payload.
        fs::write(&path, "Title:\nMid: 0 0 0\nDim: 2000 2000 2000\nSpacing: 1\nValues:\n1.0\n").unwrap();
        assert!(matches!(read_agd(&path).unwrap_err(), DarcError::FormatViolation { .. }));
    }
}
