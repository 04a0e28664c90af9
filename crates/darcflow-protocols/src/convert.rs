//! Structure and small-molecule format conversion through OpenBabel.

use darcflow_common::{DarcError, Result, StepOutputs};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

use crate::runner::{Invocation, ToolRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoleculeFormat {
    Pdb,
    Cif,
    Sdf,
    Sd,
    Mol2,
    Smi,
}

impl MoleculeFormat {
    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }

    /// OpenBabel format code, as in `-i<code>`.
    pub fn code(self) -> &'static str {
        match self {
            Self::Pdb => "pdb",
            Self::Cif => "cif",
            Self::Sdf => "sdf",
            Self::Sd => "sd",
            Self::Mol2 => "mol2",
            Self::Smi => "smi",
        }
    }
}

impl fmt::Display for MoleculeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for MoleculeFormat {
    type Err = DarcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pdb" => Ok(Self::Pdb),
            "cif" | "mmcif" => Ok(Self::Cif),
            "sdf" => Ok(Self::Sdf),
            "sd" => Ok(Self::Sd),
            "mol2" => Ok(Self::Mol2),
            "smi" | "smiles" => Ok(Self::Smi),
            other => Err(DarcError::Config(format!("unsupported molecule format `{other}`"))),
        }
    }
}

/// Arguments converting `input` to `output_format`, and the file they write
/// into `out_dir`.
pub fn obabel_args(
    input: &Path,
    output_format: MoleculeFormat,
    out_dir: &Path,
) -> Result<(Vec<String>, PathBuf)> {
    let input_format = MoleculeFormat::from_extension(input).ok_or_else(|| {
        DarcError::Config(format!("cannot tell the format of {}", input.display()))
    })?;
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let output = out_dir.join(format!("{stem}.{}", output_format.code()));
    let args = vec![
        format!("-i{}", input_format.code()),
        input.display().to_string(),
        "-O".to_string(),
        output.display().to_string(),
    ];
    Ok((args, output))
}

pub async fn convert_molecule(
    runner: &ToolRunner,
    obabel: &Path,
    input: &Path,
    output_format: MoleculeFormat,
    out_dir: &Path,
) -> Result<StepOutputs> {
    DarcError::require(input)?;
    fs::create_dir_all(out_dir)?;
    let (args, output) = obabel_args(input, output_format, out_dir)?;

    info!("Converting {} to {}", input.display(), output_format);
    runner
        .run(&Invocation::new(obabel).args(args).current_dir(out_dir))
        .await?;
    DarcError::require(&output)?;
    Ok(StepOutputs::new().with("outputFile", output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(MoleculeFormat::from_extension(Path::new("a.SDF")), Some(MoleculeFormat::Sdf));
        assert_eq!(MoleculeFormat::from_extension(Path::new("a.smiles")), Some(MoleculeFormat::Smi));
        assert_eq!(MoleculeFormat::from_extension(Path::new("a.xyz")), None);
        assert_eq!(MoleculeFormat::from_extension(Path::new("noext")), None);
        assert!("xyz".parse::<MoleculeFormat>().is_err());
    }

    #[test]
    fn test_obabel_args() {
        let (args, out) =
            obabel_args(Path::new("/in/ligA.sdf"), MoleculeFormat::Mol2, Path::new("/out")).unwrap();
        assert_eq!(args, vec!["-isdf", "/in/ligA.sdf", "-O", "/out/ligA.mol2"]);
        assert_eq!(out, PathBuf::from("/out/ligA.mol2"));

        assert!(obabel_args(Path::new("/in/ligA.xyz"), MoleculeFormat::Pdb, Path::new("/out")).is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_convert_with_fake_obabel() {
        use crate::runner::fake_tool;
        use tempfile::tempdir;

        let bin = tempdir().unwrap();
        let obabel = fake_tool(bin.path(), "obabel", r#"cp "$2" "$4""#);

        let data = tempdir().unwrap();
        let input = data.path().join("1abc.cif");
        fs::write(&input, "data_1abc\n").unwrap();
        let out_dir = data.path().join("converted");

        let outputs = convert_molecule(&ToolRunner::new(), &obabel, &input, MoleculeFormat::Pdb, &out_dir)
            .await
            .unwrap();
        let out = outputs.get("outputFile").unwrap();
        assert_eq!(out, out_dir.join("1abc.pdb"));
        assert_eq!(fs::read_to_string(out).unwrap(), "data_1abc\n");
    }
}
