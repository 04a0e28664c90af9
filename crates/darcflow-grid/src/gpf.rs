//! AutoGrid grid parameter files (`.gpf`).

use darcflow_common::DarcError;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::Result;

/// Ligand atom types mapped by default.
pub const DEFAULT_LIGAND_TYPES: [&str; 7] = ["A", "C", "HD", "N", "NA", "OA", "SA"];

/// Margin in Å added to the pocket radius when sizing an AutoGrid box.
pub const BOX_MARGIN: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct GpfSpec {
    /// Prepared receptor (`.pdbqt`)
    pub receptor: PathBuf,
    pub receptor_types: Vec<String>,
    pub ligand_types: Vec<String>,
    pub center: [f64; 3],
    pub spacing: f64,
    /// Points per axis
    pub points: usize,
}

impl GpfSpec {
    /// Box around `center` sized `round((radius + 10) / spacing)` points per
    /// axis, with receptor types read from the receptor file.
    pub fn for_receptor(receptor: &Path, center: [f64; 3], radius: f64, spacing: f64) -> Result<Self> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(DarcError::Config(format!("grid spacing must be positive, got {spacing}")));
        }
        Ok(Self {
            receptor: receptor.to_path_buf(),
            receptor_types: receptor_atom_types(receptor)?,
            ligand_types: DEFAULT_LIGAND_TYPES.iter().map(|t| t.to_string()).collect(),
            center,
            spacing,
            points: ((radius + BOX_MARGIN) / spacing).round() as usize,
        })
    }

    /// Receptor name used as the prefix of every map file.
    pub fn receptor_name(&self) -> String {
        self.receptor
            .file_name()
            .map(|n| n.to_string_lossy().split('.').next().unwrap_or_default().to_string())
            .unwrap_or_default()
    }

    /// The electrostatic map AutoGrid will write for this spec.
    pub fn elecmap_name(&self) -> String {
        format!("{}.e.map", self.receptor_name())
    }
}

/// Unique atom types of a PDBQT receptor in first-seen order.
pub fn receptor_atom_types(pdbqt: &Path) -> Result<Vec<String>> {
    DarcError::require(pdbqt)?;
    let reader = BufReader::new(File::open(pdbqt)?);
    let mut types: Vec<String> = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if !(line.starts_with("ATOM") || line.starts_with("HETATM")) {
            continue;
        }
        if let Some(atom_type) = line.split_whitespace().last() {
            if !types.iter().any(|t| t == atom_type) {
                types.push(atom_type.to_string());
            }
        }
    }

    Ok(types)
}

/// Write the parameter file AutoGrid needs to produce the affinity,
/// electrostatic and desolvation maps.
pub fn write_gpf(spec: &GpfSpec, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let name = spec.receptor_name();
    let n = spec.points;
    let [x, y, z] = spec.center;
    let receptor = fs::canonicalize(&spec.receptor).unwrap_or_else(|_| spec.receptor.clone());

    let mut out = BufWriter::new(File::create(dest)?);
    writeln!(out, "npts {n} {n} {n}                        # num.grid points in xyz")?;
    writeln!(out, "gridfld {name}.maps.fld                # grid_data_file")?;
    writeln!(out, "spacing {}                          # spacing(A)", spec.spacing)?;
    writeln!(out, "receptor_types {}     # receptor atom types", spec.receptor_types.join(" "))?;
    writeln!(out, "ligand_types {}       # ligand atom types", spec.ligand_types.join(" "))?;
    writeln!(out, "receptor {}                  # macromolecule", receptor.display())?;
    writeln!(out, "gridcenter {x} {y} {z}           # xyz-coordinates or auto")?;
    writeln!(out, "smooth 0.5                           # store minimum energy w/in rad(A)")?;
    for atom_type in &spec.ligand_types {
        writeln!(out, "map {name}.{atom_type}.map                       # atom-specific affinity map")?;
    }
    writeln!(out, "elecmap {}                   # electrostatic potential map", spec.elecmap_name())?;
    writeln!(out, "dsolvmap {name}.d.map                  # desolvation potential map")?;
    writeln!(out, "dielectric -0.1465                   # <0, AD4 distance-dep.diel;>0, constant")?;
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PDBQT: &str = "\
ATOM      1  N   MET A   1      27.340  24.430   2.614  1.00  9.67    -0.079 N \n\
ATOM      2  CA  MET A   1      26.266  25.413   2.842  1.00 10.38     0.176 C \n\
TER\n\
ATOM      3  OG  SER A   2      25.112  24.880   3.649  1.00 10.49    -0.398 OA\n\
HETATM    4  C1  LIG A   3      25.112  24.880   3.649  1.00 10.49     0.100 C \n";

    #[test]
    fn test_receptor_types_first_seen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("1abc.pdbqt");
        fs::write(&path, PDBQT).unwrap();

        assert_eq!(receptor_atom_types(&path).unwrap(), vec!["N", "C", "OA"]);
    }

    #[test]
    fn test_write_gpf() {
        let dir = tempdir().unwrap();
        let receptor = dir.path().join("1abc.pdbqt");
        fs::write(&receptor, PDBQT).unwrap();

        let spec = GpfSpec::for_receptor(&receptor, [1.0, 2.0, 3.0], 5.0, 0.375).unwrap();
        assert_eq!(spec.points, 40);
        assert_eq!(spec.elecmap_name(), "1abc.e.map");

        let gpf = dir.path().join("grid/1abc.gpf");
        write_gpf(&spec, &gpf).unwrap();
        let text = fs::read_to_string(&gpf).unwrap();

        assert!(text.starts_with("npts 40 40 40"));
        assert!(text.contains("receptor_types N C OA"));
        assert!(text.contains("gridcenter 1 2 3"));
        assert!(text.contains("map 1abc.HD.map"));
        assert!(text.contains("elecmap 1abc.e.map"));
        assert_eq!(text.lines().filter(|l| l.starts_with("map ")).count(), 7);
        assert!(text.trim_end().ends_with("constant"));
    }
}
