//! Edits on Rosetta `.params` files and ligand PDB files.

use darcflow_common::{DarcError, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// First `IO_STRING` value of a params file.
pub fn io_string(params: &Path) -> Result<Option<String>> {
    DarcError::require(params)?;
    let text = fs::read_to_string(params)?;
    Ok(text.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next()) {
            (Some("IO_STRING"), Some(name)) => Some(name.to_string()),
            _ => None,
        }
    }))
}

/// Point a params file at its merged conformer library.
pub fn append_rotamers_directive(params: &Path, conformers: &str) -> Result<()> {
    DarcError::require(params)?;
    let mut file = OpenOptions::new().append(true).open(params)?;
    writeln!(file, "PDB_ROTAMERS {conformers}")?;
    Ok(())
}

/// Rename the residue of a params file and update its conformer path.
///
/// Rewrites the `NAME`, `IO_STRING` (keeping the one-letter code) and
/// `PDB_ROTAMERS` lines; every other line is kept as is.
pub fn rename_params_file(params: &Path, new_name: &str, conformers: &str) -> Result<()> {
    DarcError::require(params)?;
    let text = fs::read_to_string(params)?;
    let mut out = String::with_capacity(text.len());

    for line in text.lines() {
        let line = line.trim_end();
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.first().copied() {
            Some("NAME") => out.push_str(&format!("NAME {new_name}")),
            Some("IO_STRING") => match fields.get(2) {
                Some(letter) => out.push_str(&format!("IO_STRING {new_name} {letter}")),
                None => out.push_str(&format!("IO_STRING {new_name}")),
            },
            Some("PDB_ROTAMERS") => out.push_str(&format!("PDB_ROTAMERS {conformers}")),
            _ => out.push_str(line),
        }
        out.push('\n');
    }

    fs::write(params, out)?;
    Ok(())
}

/// Set the residue name (columns 18-20) of every `HETATM` record.
pub fn rename_pdb_residues(pdb: &Path, new_name: &str) -> Result<usize> {
    if new_name.len() != 3 || !new_name.is_ascii() {
        return Err(DarcError::InvalidIdentifier(new_name.to_string()));
    }
    DarcError::require(pdb)?;
    let text = fs::read_to_string(pdb)?;
    let mut out = String::with_capacity(text.len());
    let mut renamed = 0;

    for line in text.lines() {
        let line = line.trim_end();
        match (line.starts_with("HETATM"), line.get(..17), line.get(20..)) {
            (true, Some(head), Some(tail)) => {
                out.push_str(head);
                out.push_str(new_name);
                out.push_str(tail);
                renamed += 1;
            }
            _ => out.push_str(line),
        }
        out.push('\n');
    }

    fs::write(pdb, out)?;
    Ok(renamed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const PARAMS: &str = "\
NAME 002
IO_STRING 002 Z
TYPE LIGAND
AA UNK

ATOM  C1  CH1   X   -0.11
PDB_ROTAMERS 002_conformers.pdb
";

    #[test]
    fn test_io_string() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("002.params");
        fs::write(&path, PARAMS).unwrap();
        assert_eq!(io_string(&path).unwrap().as_deref(), Some("002"));

        fs::write(&path, "NAME X\n").unwrap();
        assert_eq!(io_string(&path).unwrap(), None);
    }

    #[test]
    fn test_append_rotamers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("00A.params");
        fs::write(&path, "NAME 00A\nIO_STRING 00A Z\n").unwrap();

        append_rotamers_directive(&path, "00A_conformers.pdb").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.ends_with("IO_STRING 00A Z\nPDB_ROTAMERS 00A_conformers.pdb\n"));
    }

    #[test]
    fn test_rename_params() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("002.params");
        fs::write(&path, PARAMS).unwrap();

        rename_params_file(&path, "LGA", "ligA_conformers.pdb").unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "NAME LGA\nIO_STRING LGA Z\nTYPE LIGAND\nAA UNK\n\nATOM  C1  CH1   X   -0.11\nPDB_ROTAMERS ligA_conformers.pdb\n"
        );
    }

    #[test]
    fn test_rename_pdb_residues() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("002_conformers.pdb");
        fs::write(
            &path,
            "HETATM    1  C1  002 X   1      -0.110   1.200   0.000  1.00  0.00           C\n\
ATOM      2  CA  ALA A   2       0.000   0.000   0.000  1.00  0.00           C\n\
HETATM\n\
END\n",
        )
        .unwrap();

        assert_eq!(rename_pdb_residues(&path, "LGA").unwrap(), 1);
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(&lines[0][17..20], "LGA");
        assert_eq!(&lines[1][17..20], "ALA");
        assert_eq!(lines[2], "HETATM");
        assert!(rename_pdb_residues(&path, "TOOLONG").is_err());
    }
}
