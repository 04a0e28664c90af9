//! Target preparation: clean a protein structure and let Rosetta `score`
//! rebuild its missing atoms, hydrogens included.

use darcflow_common::{DarcError, Result, RunConfig, StepOutputs};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::program::{RosettaPaths, RosettaProgram};
use crate::runner::{Invocation, ToolRunner};

/// Record types kept when a scored model is turned back into a plain PDB.
pub const PDB_RECORDS: [&str; 7] = ["REMARK", "ATOM", "HETATM", "HEADER", "EXPDTA", "TER", "END"];

const WATER_RESIDUES: [&str; 4] = ["HOH", "WAT", "H2O", "DOD"];

/// Arguments for `score` with hydrogen optimization enabled.
#[derive(Debug, Clone)]
pub struct ScoreArgs {
    pub structure: PathBuf,
    pub score_file: String,
    pub seed: Vec<String>,
}

impl ScoreArgs {
    pub fn new(structure: impl Into<PathBuf>, score_file: impl Into<String>) -> Self {
        Self {
            structure: structure.into(),
            score_file: score_file.into(),
            seed: Vec::new(),
        }
    }

    pub fn with_run(mut self, run: &RunConfig) -> Self {
        self.seed = run.seed_args();
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-in:file:s".to_string(),
            self.structure.display().to_string(),
            "-out:output".to_string(),
            "-no_optH".to_string(),
            "false".to_string(),
            "-out:file:scorefile".to_string(),
            self.score_file.clone(),
        ];
        args.extend(self.seed.iter().cloned());
        args
    }
}

/// Keep only coordinate and header records; drops the per-residue energy
/// table Rosetta appends to its models.
pub fn keep_pdb_records(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        if PDB_RECORDS.iter().any(|record| line.starts_with(record)) {
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

/// What to strip from a structure before scoring.
#[derive(Debug, Clone)]
pub struct CleanOptions {
    pub remove_waters: bool,
    pub remove_hetatm: bool,
    /// Keep only this chain when set.
    pub chain: Option<char>,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_waters: true,
            remove_hetatm: true,
            chain: None,
        }
    }
}

/// Filter the records of a PDB text according to `options`.
pub fn clean_structure(text: &str, options: &CleanOptions) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        let is_coord = line.starts_with("ATOM") || line.starts_with("HETATM");
        if is_coord {
            let residue = line.get(17..20).map(str::trim).unwrap_or_default();
            if options.remove_waters && WATER_RESIDUES.contains(&residue) {
                continue;
            }
            if options.remove_hetatm && line.starts_with("HETATM") {
                continue;
            }
            if let Some(chain) = options.chain {
                if line.chars().nth(21) != Some(chain) {
                    continue;
                }
            }
        }
        if line.starts_with("TER") {
            if let (Some(chain), Some(c)) = (options.chain, line.chars().nth(21)) {
                if c != ' ' && c != chain {
                    continue;
                }
            }
        }
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Protein name used for the prepared files: the structure file stem up to
/// its first `_`.
pub fn protein_name(structure: &Path) -> String {
    let stem = structure
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match stem.split_once('_') {
        Some((name, _)) => name.to_string(),
        None => stem,
    }
}

/// Clean `structure`, run `score` on it inside `work_dir` and keep the
/// rebuilt model as `<protein>.pdb` with its score file as `<protein>.sc`.
pub async fn prepare_target(
    runner: &ToolRunner,
    paths: &RosettaPaths,
    run: &RunConfig,
    structure: &Path,
    clean: &CleanOptions,
    work_dir: &Path,
) -> Result<StepOutputs> {
    DarcError::require(structure)?;
    fs::create_dir_all(work_dir)?;

    let protein = protein_name(structure);
    let cleaned_name = format!("{protein}_clean");
    let cleaned = work_dir.join(format!("{cleaned_name}.pdb"));
    fs::write(&cleaned, clean_structure(&fs::read_to_string(structure)?, clean))?;
    info!("Preparing target {} from {}", protein, structure.display());

    let cleaned = cleaned.canonicalize()?;
    let args = ScoreArgs::new(&cleaned, format!("{cleaned_name}.sc")).with_run(run);
    let invocation = Invocation::new(paths.program(RosettaProgram::Score, false))
        .args(args.to_args())
        .current_dir(work_dir)
        .log_to(work_dir.join("score.log"));
    runner.run(&invocation).await?;

    let model = work_dir.join(format!("{cleaned_name}_0001.pdb"));
    DarcError::require(&model)?;
    let prepared = work_dir.join(format!("{protein}.pdb"));
    fs::write(&prepared, keep_pdb_records(&fs::read_to_string(&model)?))?;
    debug!("Wrote {}", prepared.display());

    let mut outputs = StepOutputs::new().with("outputStructure", &prepared);
    let score_file = work_dir.join(format!("{cleaned_name}.sc"));
    if score_file.exists() {
        let kept = work_dir.join(format!("{protein}.sc"));
        fs::rename(&score_file, &kept)?;
        outputs.insert("scoreFile", kept);
    }
    Ok(outputs)
}
