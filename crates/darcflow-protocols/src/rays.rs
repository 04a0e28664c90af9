//! Pocket mapping with `make_ray_files`.

use darcflow_common::{DarcError, Result, RunConfig, StepOutputs};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::program::{RosettaPaths, RosettaProgram};
use crate::runner::{Invocation, ToolRunner};

fn residue_separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,; ]").unwrap())
}

/// Split a user residue list on `,`, `;` or spaces and upper-case it.
pub fn parse_residue_list(input: &str) -> Vec<String> {
    residue_separators()
        .split(&input.to_uppercase())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `A.100` (chain, number) to the `100:A` form `make_ray_files` expects.
pub fn pocket_residue(residue: &str) -> Option<String> {
    let (chain, number) = residue.split_once('.')?;
    Some(format!("{number}:{chain}"))
}

#[derive(Debug, Clone)]
pub struct RayArgs {
    pub protein: String,
    pub database: PathBuf,
    pub target_residue: String,
    /// Additional targets; switches on `-multiple_origin`.
    pub extra_targets: Vec<String>,
    pub origin_residue: Option<u32>,
    /// Electrostatic grid in AGD format; shape-only when absent.
    pub esp_grid: Option<PathBuf>,
    pub seed: Vec<String>,
    pub gpu: Option<u32>,
}

impl RayArgs {
    pub fn new(protein: impl Into<String>, database: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            protein: protein.into(),
            database: database.into(),
            target_residue: target.into(),
            extra_targets: Vec::new(),
            origin_residue: None,
            esp_grid: None,
            seed: Vec::new(),
            gpu: None,
        }
    }

    pub fn with_run(mut self, run: &RunConfig) -> Self {
        self.seed = run.seed_args();
        self.gpu = run.gpu_device();
        self
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-protein".to_string(),
            self.protein.clone(),
            "-database".to_string(),
            self.database.display().to_string(),
            "-central_relax_pdb_num".to_string(),
        ];
        if self.extra_targets.is_empty() {
            args.push(self.target_residue.clone());
        } else {
            args.push(format!("{},{}", self.target_residue, self.extra_targets.join(",")));
            args.push("-multiple_origin".to_string());
        }
        args.push("-pocket_static_grid".to_string());

        if let Some(origin) = self.origin_residue {
            args.push("-set_origin".to_string());
            args.push("-origin_res_num".to_string());
            args.push(origin.to_string());
        }
        match &self.esp_grid {
            Some(grid) => {
                args.push("-espGrid_file".to_string());
                args.push(grid.display().to_string());
            }
            None => args.push("-darc_shape_only".to_string()),
        }
        args.extend(self.seed.iter().cloned());
        if let Some(gpu) = self.gpu {
            args.push("-gpu".to_string());
            args.push(gpu.to_string());
        }
        args
    }
}

/// Ray files as written by `make_ray_files` and the names they are moved to.
#[derive(Debug, Clone, PartialEq)]
pub struct RayOutputNames {
    pub written_pdb: String,
    pub written_txt: String,
    pub pdb: String,
    pub txt: String,
}

/// `ray_<protein>_<target>[,<extra>...]` with commas replaced by `_` in the
/// final names.
pub fn ray_output_names(protein: &str, target: &str, extra_targets: &[String]) -> RayOutputNames {
    let (written, renamed) = if extra_targets.is_empty() {
        let stem = format!("ray_{protein}_{target}");
        (stem.clone(), stem)
    } else {
        (
            format!("ray_{protein}_{target},{}", extra_targets.join(",")),
            format!("ray_{protein}_{target}_{}", extra_targets.join("_")),
        )
    };
    RayOutputNames {
        written_pdb: format!("{written}.pdb"),
        written_txt: format!("{written}.txt"),
        pdb: format!("{renamed}.pdb"),
        txt: format!("{renamed}.txt"),
    }
}

/// Inputs of one ray generation run.
#[derive(Debug, Clone)]
pub struct RayRequest {
    pub structure: PathBuf,
    pub target_residue: String,
    pub extra_targets: Vec<String>,
    pub origin_residue: Option<u32>,
    pub esp_grid: Option<PathBuf>,
}

/// Run `make_ray_files` in `work_dir` against a copy of the structure.
///
/// Produces `outputStructure` and `outputRay_TXT`, plus `outputGRID_AGD`
/// when an electrostatic grid was given and the program wrote
/// `DARC_<grid>.agd`.
pub async fn generate_rays(
    runner: &ToolRunner,
    paths: &RosettaPaths,
    run: &RunConfig,
    request: &RayRequest,
    work_dir: &Path,
) -> Result<StepOutputs> {
    DarcError::require(&request.structure)?;
    fs::create_dir_all(work_dir)?;

    let file_name = request
        .structure
        .file_name()
        .ok_or_else(|| DarcError::MissingInput(request.structure.clone()))?;
    let local = work_dir.canonicalize()?.join(file_name);
    if local != request.structure.canonicalize()? {
        fs::copy(&request.structure, &local)?;
    }
    let protein = local
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let esp_grid = match &request.esp_grid {
        Some(grid) => {
            DarcError::require(grid)?;
            Some(grid.canonicalize()?)
        }
        None => None,
    };

    let mut args = RayArgs::new(file_name.to_string_lossy(), paths.database(), &request.target_residue)
        .with_run(run);
    args.extra_targets = request.extra_targets.clone();
    args.origin_residue = request.origin_residue;
    args.esp_grid = esp_grid.clone();

    info!("Mapping pocket around residue {} of {}", request.target_residue, protein);
    let program = paths.program(RosettaProgram::MakeRayFiles, args.gpu.is_some());
    runner
        .run(
            &Invocation::new(program)
                .args(args.to_args())
                .current_dir(work_dir)
                .log_to(work_dir.join("make_ray_files.log")),
        )
        .await?;

    let names = ray_output_names(&protein, &request.target_residue, &request.extra_targets);
    let pdb = work_dir.join(&names.pdb);
    let txt = work_dir.join(&names.txt);
    for (written, renamed) in [(&names.written_pdb, &pdb), (&names.written_txt, &txt)] {
        let written = work_dir.join(written);
        DarcError::require(&written)?;
        if &written != renamed {
            fs::rename(&written, renamed)?;
        }
    }
    debug!("Ray files {} and {}", names.pdb, names.txt);

    let mut outputs = StepOutputs::new()
        .with("outputStructure", pdb)
        .with("outputRay_TXT", txt);

    if let Some(grid) = esp_grid {
        let stem = grid
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let darc_grid = work_dir.join(format!("DARC_{stem}.agd"));
        if darc_grid.exists() {
            outputs.insert("outputGRID_AGD", darc_grid);
        }
    }
    Ok(outputs)
}
