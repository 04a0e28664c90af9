//! Ligand preparation ahead of docking.
//!
//! Every molecule goes through OpenBabel twice, once to SDF and once to a
//! hydrogenated, charged mol2. An optional third pass writes a conformer
//! library. The resulting molfiles are then parameterized in one batch.

use darcflow_common::{DarcError, LigandsConfig, Result};
use darcflow_params::{BatchParameterizer, BatchReport};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

use crate::convert::MoleculeFormat;
use crate::runner::{Invocation, ToolRunner};

pub const MOLFILE_LIST: &str = "molfile_list.txt";
const LOG_FILE: &str = "obabel.log";

/// OpenBabel `--partialcharge` models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChargeMethod {
    #[default]
    Gasteiger,
    Mmff94,
    Qeq,
    Qtpie,
    Eqeq,
    Eem,
    /// Keep the charges of the input file.
    NoCharges,
}

impl ChargeMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gasteiger => "gasteiger",
            Self::Mmff94 => "mmff94",
            Self::Qeq => "qeq",
            Self::Qtpie => "qtpie",
            Self::Eqeq => "eqeq",
            Self::Eem => "eem",
            Self::NoCharges => "none",
        }
    }
}

impl fmt::Display for ChargeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChargeMethod {
    type Err = DarcError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gasteiger" => Ok(Self::Gasteiger),
            "mmff94" => Ok(Self::Mmff94),
            "qeq" => Ok(Self::Qeq),
            "qtpie" => Ok(Self::Qtpie),
            "eqeq" => Ok(Self::Eqeq),
            "eem" => Ok(Self::Eem),
            "none" => Ok(Self::NoCharges),
            other => Err(DarcError::Config(format!("unknown charge method `{other}`"))),
        }
    }
}

/// How hydrogens are added.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Protonation {
    /// `-h`
    AllHydrogens,
    /// `-p <pH>`, using OpenBabel's pH model
    Ph(f64),
}

impl Protonation {
    pub fn from_ph(ph: Option<f64>) -> Self {
        ph.map_or(Self::AllHydrogens, Self::Ph)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConformerSearch {
    /// Genetic algorithm, scored by RMSD diversity.
    Genetic { count: u32 },
    /// Systematic Confab search.
    Confab { count: u32, rmsd_cutoff: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LigandPrepOptions {
    pub charges: ChargeMethod,
    pub protonation: Protonation,
    /// No conformer library is written when `None`.
    pub conformers: Option<ConformerSearch>,
}

impl LigandPrepOptions {
    /// Charges and protonation from the configuration. Conformer search is
    /// off until the caller picks a method.
    pub fn from_config(config: &LigandsConfig) -> Result<Self> {
        Ok(Self {
            charges: config.charge_method.parse()?,
            protonation: Protonation::from_ph(config.ph),
            conformers: None,
        })
    }
}

/// Name used for every file derived from `input`.
fn ligand_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn input_format(input: &Path) -> Result<MoleculeFormat> {
    match MoleculeFormat::from_extension(input) {
        Some(format @ (MoleculeFormat::Pdb | MoleculeFormat::Mol2)) => Ok(format),
        _ => Err(DarcError::Config(format!(
            "{}: ligands must be in pdb or mol2 format",
            input.display()
        ))),
    }
}

/// `-i<fmt> <input> --partialcharge none -O <out_dir>/<name>.sdf`
pub fn sdf_args(input: &Path, out_dir: &Path) -> Result<(Vec<String>, PathBuf)> {
    let format = input_format(input)?;
    let output = out_dir.join(format!("{}.sdf", ligand_name(input)));
    let args = vec![
        format!("-i{}", format.code()),
        input.display().to_string(),
        "--partialcharge".to_string(),
        "none".to_string(),
        "-O".to_string(),
        output.display().to_string(),
    ];
    Ok((args, output))
}

/// `-isdf <sdf> (-p <pH> | -h) --partialcharge <method> -O <out_dir>/<name>.mol2`
pub fn charge_args(
    sdf: &Path,
    charges: ChargeMethod,
    protonation: Protonation,
    out_dir: &Path,
) -> (Vec<String>, PathBuf) {
    let output = out_dir.join(format!("{}.mol2", ligand_name(sdf)));
    let mut args = vec!["-isdf".to_string(), sdf.display().to_string()];
    match protonation {
        Protonation::AllHydrogens => args.push("-h".to_string()),
        Protonation::Ph(ph) => {
            args.push("-p".to_string());
            args.push(ph.to_string());
        }
    }
    args.extend([
        "--partialcharge".to_string(),
        charges.to_string(),
        "-O".to_string(),
        output.display().to_string(),
    ]);
    (args, output)
}

/// Arguments writing the conformers of `mol2` to `<out_dir>/<name>.mol2`.
pub fn conformer_args(mol2: &Path, search: ConformerSearch, out_dir: &Path) -> (Vec<String>, PathBuf) {
    let output = out_dir.join(format!("{}.mol2", ligand_name(mol2)));
    let input = mol2.display().to_string();
    let out = output.display().to_string();
    let args = match search {
        ConformerSearch::Genetic { count } => vec![
            input,
            "--conformer".to_string(),
            "--nconf".to_string(),
            count.to_string(),
            "--score".to_string(),
            "rmsd".to_string(),
            "--writeconformers".to_string(),
            "-O".to_string(),
            out,
        ],
        ConformerSearch::Confab { count, rmsd_cutoff } => vec![
            input,
            "-O".to_string(),
            out,
            "--confab".to_string(),
            "--original".to_string(),
            "--verbose".to_string(),
            "--conf".to_string(),
            count.to_string(),
            "--rcutoff".to_string(),
            rmsd_cutoff.to_string(),
        ],
    };
    (args, output)
}

#[derive(Debug, Clone, Serialize)]
pub struct PreparedLigand {
    pub source: PathBuf,
    pub name: String,
    /// Hydrogenated molecule with partial charges.
    pub charged: PathBuf,
    pub conformers: Option<PathBuf>,
}

impl PreparedLigand {
    /// The file handed to parameterization.
    pub fn molfile(&self) -> &Path {
        self.conformers.as_deref().unwrap_or(&self.charged)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedPreparation {
    pub source: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LigandPreparation {
    pub prepared: Vec<PreparedLigand>,
    pub failed: Vec<FailedPreparation>,
    /// One prepared molfile per line.
    pub molfile_list: PathBuf,
}

impl LigandPreparation {
    pub fn molfiles(&self) -> Vec<PathBuf> {
        self.prepared.iter().map(|l| l.molfile().to_path_buf()).collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LigandRunReport {
    pub preparation: LigandPreparation,
    pub parameterization: BatchReport,
}

async fn run_obabel(
    runner: &ToolRunner,
    obabel: &Path,
    args: Vec<String>,
    output: &Path,
    work_dir: &Path,
) -> Result<()> {
    runner
        .run(
            &Invocation::new(obabel)
                .args(args)
                .current_dir(work_dir)
                .log_to(work_dir.join(LOG_FILE)),
        )
        .await?;
    if !output.exists() {
        return Err(DarcError::ExternalToolFailure {
            program: obabel.display().to_string(),
            status: "exit status: 0".to_string(),
            stderr: format!("{} was not written", output.display()),
        });
    }
    Ok(())
}

async fn prepare_one(
    runner: &ToolRunner,
    obabel: &Path,
    input: &Path,
    options: &LigandPrepOptions,
    work_dir: &Path,
) -> Result<PreparedLigand> {
    let absolute = input.canonicalize()?;
    let (args, sdf) = sdf_args(&absolute, &work_dir.join("sdf"))?;
    run_obabel(runner, obabel, args, &sdf, work_dir).await?;

    let (args, charged) = charge_args(&sdf, options.charges, options.protonation, &work_dir.join("charged"));
    run_obabel(runner, obabel, args, &charged, work_dir).await?;

    let conformers = match options.conformers {
        Some(search) => {
            let (args, out) = conformer_args(&charged, search, &work_dir.join("conformers"));
            run_obabel(runner, obabel, args, &out, work_dir).await?;
            Some(out)
        }
        None => None,
    };

    Ok(PreparedLigand {
        source: input.to_path_buf(),
        name: ligand_name(input),
        charged,
        conformers,
    })
}

/// Convert, protonate and charge every molecule, generating conformers when
/// asked, and write the list of resulting molfiles into `work_dir`.
///
/// Unsupported input formats are rejected before anything runs. Molecules
/// that are missing or that OpenBabel fails on are recorded and skipped.
pub async fn prepare_ligands(
    runner: &ToolRunner,
    obabel: &Path,
    molecules: &[PathBuf],
    options: &LigandPrepOptions,
    work_dir: &Path,
) -> Result<LigandPreparation> {
    for molecule in molecules {
        input_format(molecule)?;
    }

    fs::create_dir_all(work_dir)?;
    let work_dir = work_dir.canonicalize()?;
    for dir in ["sdf", "charged", "conformers"] {
        fs::create_dir_all(work_dir.join(dir))?;
    }

    let mut prepared = Vec::new();
    let mut failed = Vec::new();
    for molecule in molecules {
        if !molecule.exists() {
            let e = DarcError::MissingInput(molecule.clone());
            warn!("Cannot read {}: {}", molecule.display(), e);
            failed.push(FailedPreparation {
                source: molecule.clone(),
                reason: e.to_string(),
            });
            continue;
        }
        match prepare_one(runner, obabel, molecule, options, &work_dir).await {
            Ok(ligand) => {
                info!("Prepared {}", ligand.name);
                prepared.push(ligand);
            }
            Err(e @ DarcError::ExternalToolFailure { .. }) => {
                warn!("Preparation of {} failed: {}", molecule.display(), e);
                failed.push(FailedPreparation {
                    source: molecule.clone(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    let molfile_list = work_dir.join(MOLFILE_LIST);
    let mut listing = String::new();
    for ligand in &prepared {
        listing.push_str(&ligand.molfile().display().to_string());
        listing.push('\n');
    }
    fs::write(&molfile_list, listing)?;

    Ok(LigandPreparation {
        prepared,
        failed,
        molfile_list,
    })
}

/// Prepare `molecules` and parameterize the results with `batch`.
pub async fn prepare_and_parameterize(
    runner: &ToolRunner,
    obabel: &Path,
    molecules: &[PathBuf],
    options: &LigandPrepOptions,
    work_dir: &Path,
    batch: &mut BatchParameterizer,
) -> Result<LigandRunReport> {
    let preparation = prepare_ligands(runner, obabel, molecules, options, work_dir).await?;
    let parameterization = batch.run(&preparation.molfiles()).await?;
    Ok(LigandRunReport {
        preparation,
        parameterization,
    })
}
