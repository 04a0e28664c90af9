//! Docking with DARC against a precomputed ray file.

use darcflow_common::{DarcError, Result, RunConfig};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::program::{RosettaPaths, RosettaProgram};
use crate::runner::{Invocation, ToolRunner};

#[derive(Debug, Clone)]
pub struct DarcArgs {
    pub protein: PathBuf,
    pub ligand: PathBuf,
    pub params: PathBuf,
    pub ray_file: PathBuf,
    /// Score electrostatics against this AGD grid; shape-only when absent.
    pub esp_grid: Option<PathBuf>,
    pub search_conformers: bool,
    /// Minimize the best pose and report its theta.
    pub minimize_output: bool,
    pub num_runs: u32,
    pub num_particles: u32,
    pub missing_point_weight: f64,
    pub steric_weight: f64,
    pub extra_point_weight: f64,
    pub seed: Vec<String>,
    pub gpu: Option<u32>,
}

impl DarcArgs {
    pub fn new(
        protein: impl Into<PathBuf>,
        ligand: impl Into<PathBuf>,
        params: impl Into<PathBuf>,
        ray_file: impl Into<PathBuf>,
    ) -> Self {
        Self {
            protein: protein.into(),
            ligand: ligand.into(),
            params: params.into(),
            ray_file: ray_file.into(),
            esp_grid: None,
            search_conformers: true,
            minimize_output: true,
            num_runs: 100,
            num_particles: 100,
            missing_point_weight: 5.48,
            steric_weight: 0.61,
            extra_point_weight: 5.47,
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
            self.protein.display().to_string(),
            "-ligand".to_string(),
            self.ligand.display().to_string(),
            "-extra_res_fa".to_string(),
            self.params.display().to_string(),
            "-ray_file".to_string(),
            self.ray_file.display().to_string(),
        ];
        match &self.esp_grid {
            Some(grid) => {
                args.push("-espGrid_file".to_string());
                args.push(grid.display().to_string());
            }
            None => args.push("-darc_shape_only".to_string()),
        }
        if self.search_conformers {
            args.extend(["-search_conformers".to_string(), "True".to_string()]);
        }
        if self.minimize_output {
            args.extend([
                "-minimize_output_complex".to_string(),
                "True".to_string(),
                "-calculate_thetaLig".to_string(),
                "True".to_string(),
            ]);
        }
        args.extend([
            "-print_output_complex".to_string(),
            "True".to_string(),
            "-use_ligand_filename".to_string(),
            "-num_runs".to_string(),
            self.num_runs.to_string(),
            "-num_particles".to_string(),
            self.num_particles.to_string(),
            "-missing_point_weight".to_string(),
            self.missing_point_weight.to_string(),
            "-steric_weight".to_string(),
            self.steric_weight.to_string(),
            "-extra_point_weight".to_string(),
            self.extra_point_weight.to_string(),
        ]);
        args.extend(self.seed.iter().cloned());
        if let Some(gpu) = self.gpu {
            args.push("-gpu".to_string());
            args.push(gpu.to_string());
        }
        args
    }
}

fn sorted_entries(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    DarcError::require(dir)?;
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if keep(&entry.file_name().to_string_lossy()) && entry.path().is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// First `ray_*.txt` in `dir`.
pub fn find_ray_file(dir: &Path) -> Result<Option<PathBuf>> {
    Ok(sorted_entries(dir, |name| name.starts_with("ray_") && name.ends_with(".txt"))?
        .into_iter()
        .next())
}

/// Poses DARC wrote into `dir`: `mini_LIGAND*` after minimization,
/// `LIGAND_*` otherwise.
pub fn ligand_output_files(dir: &Path, minimized: bool) -> Result<Vec<PathBuf>> {
    sorted_entries(dir, |name| {
        if minimized {
            name.starts_with("mini_LIGAND")
        } else {
            name.starts_with("LIGAND_")
        }
    })
}

/// Copy a params or conformer file so its name starts with the ligand name
/// instead of the residue code (`002.params` to `ligA.params`,
/// `002_conformers.pdb` to `ligA_conformers.pdb`). DARC names its output
/// after these files.
pub fn stage_ligand_file(file: &Path, ligand: &str) -> Result<PathBuf> {
    DarcError::require(file)?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| DarcError::MissingInput(file.to_path_buf()))?;
    let sep = if name.ends_with(".params") { '.' } else { '_' };
    let rest = match name.split_once(sep) {
        Some((code, rest)) if !code.is_empty() => rest,
        _ => return Ok(file.to_path_buf()),
    };

    let staged = file.with_file_name(format!("{ligand}{sep}{rest}"));
    if staged != file {
        fs::copy(file, &staged)?;
        debug!("Staged {} as {}", name, staged.display());
    }
    Ok(staged)
}

/// The conformer PDB and params file of a `params/<ligand>/` directory.
pub fn ligand_params_files(params_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let pdb = sorted_entries(params_dir, |name| name.ends_with(".pdb"))?
        .into_iter()
        .next()
        .ok_or_else(|| DarcError::MissingInput(params_dir.join("*.pdb")))?;
    let params = sorted_entries(params_dir, |name| name.ends_with(".params"))?
        .into_iter()
        .next()
        .ok_or_else(|| DarcError::MissingInput(params_dir.join("*.params")))?;
    Ok((pdb, params))
}

/// One ligand to dock into a pocket.
#[derive(Debug, Clone)]
pub struct DockRequest {
    pub protein: PathBuf,
    pub ligand: String,
    pub params_dir: PathBuf,
    /// Directory holding the ray file; DARC runs and writes its poses here.
    pub ray_dir: PathBuf,
    pub esp_grid: Option<PathBuf>,
    pub search_conformers: bool,
    pub minimize_output: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DockingResult {
    pub ligand: String,
    pub poses: Vec<PathBuf>,
}

/// Run DARC for one ligand and collect the poses named after it.
pub async fn dock_ligand(
    runner: &ToolRunner,
    paths: &RosettaPaths,
    run: &RunConfig,
    request: &DockRequest,
) -> Result<DockingResult> {
    DarcError::require(&request.protein)?;
    let ray_file = find_ray_file(&request.ray_dir)?
        .ok_or_else(|| DarcError::MissingInput(request.ray_dir.join("ray_*.txt")))?;

    let (pdb, params) = ligand_params_files(&request.params_dir)?;
    let ligand_pdb = stage_ligand_file(&pdb, &request.ligand)?;
    let ligand_params = stage_ligand_file(&params, &request.ligand)?;

    let mut args = DarcArgs::new(
        request.protein.canonicalize()?,
        ligand_pdb.canonicalize()?,
        ligand_params.canonicalize()?,
        ray_file.canonicalize()?,
    )
    .with_run(run);
    args.search_conformers = request.search_conformers;
    args.minimize_output = request.minimize_output;
    args.esp_grid = match &request.esp_grid {
        Some(grid) => {
            DarcError::require(grid)?;
            Some(grid.canonicalize()?)
        }
        None => None,
    };

    info!("Docking {} with DARC", request.ligand);
    let program = paths.program(RosettaProgram::Darc, args.gpu.is_some());
    runner
        .run(
            &Invocation::new(program)
                .args(args.to_args())
                .current_dir(&request.ray_dir)
                .log_to(request.ray_dir.join(format!("darc_{}.log", request.ligand))),
        )
        .await?;

    let poses: Vec<PathBuf> = ligand_output_files(&request.ray_dir, request.minimize_output)?
        .into_iter()
        .filter(|p| {
            p.file_name()
                .is_some_and(|n| n.to_string_lossy().contains(request.ligand.as_str()))
        })
        .collect();
    if poses.is_empty() {
        warn!("DARC wrote no poses for {}", request.ligand);
    }
    Ok(DockingResult {
        ligand: request.ligand.clone(),
        poses,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_default_args() {
        let args = DarcArgs::new("/p/4erf.pdb", "/l/ligA_conformers.pdb", "/l/ligA.params", "/r/ray.txt");
        assert_eq!(
            args.to_args().join(" "),
            "-protein /p/4erf.pdb -ligand /l/ligA_conformers.pdb -extra_res_fa /l/ligA.params \
             -ray_file /r/ray.txt -darc_shape_only -search_conformers True \
             -minimize_output_complex True -calculate_thetaLig True -print_output_complex True \
             -use_ligand_filename -num_runs 100 -num_particles 100 -missing_point_weight 5.48 \
             -steric_weight 0.61 -extra_point_weight 5.47"
        );
    }

    #[test]
    fn test_electrostatics_without_minimization() {
        let run = RunConfig {
            constant_seed: true,
            seed: 3,
            gpu: Some(0),
        };
        let mut args = DarcArgs::new("p.pdb", "l.pdb", "l.params", "ray.txt").with_run(&run);
        args.esp_grid = Some(PathBuf::from("/g/DARC_4erf.agd"));
        args.minimize_output = false;
        let joined = args.to_args().join(" ");
        assert!(joined.contains("-espGrid_file /g/DARC_4erf.agd"));
        assert!(!joined.contains("-darc_shape_only"));
        assert!(!joined.contains("-calculate_thetaLig"));
        assert!(joined.ends_with("-run:constant_seed -run:jran 3"));
    }

    #[test]
    fn test_find_ray_file_and_outputs() {
        let dir = tempdir().unwrap();
        for name in [
            "ray_4erf_61.pdb",
            "ray_4erf_61.txt",
            "LIGAND_ligA_0001.pdb",
            "mini_LIGAND_ligA.pdb",
            "mini_complex.pdb",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        assert_eq!(
            find_ray_file(dir.path()).unwrap(),
            Some(dir.path().join("ray_4erf_61.txt"))
        );
        assert_eq!(
            ligand_output_files(dir.path(), true).unwrap(),
            vec![dir.path().join("mini_LIGAND_ligA.pdb")]
        );
        assert_eq!(
            ligand_output_files(dir.path(), false).unwrap(),
            vec![dir.path().join("LIGAND_ligA_0001.pdb")]
        );

        let empty = tempdir().unwrap();
        assert_eq!(find_ray_file(empty.path()).unwrap(), None);
    }

    #[test]
    fn test_stage_ligand_files() {
        let dir = tempdir().unwrap();
        let params = dir.path().join("002.params");
        let pdb = dir.path().join("002_conformers.pdb");
        fs::write(&params, "NAME 002\n").unwrap();
        fs::write(&pdb, "HETATM\n").unwrap();

        assert_eq!(stage_ligand_file(&params, "ligA").unwrap(), dir.path().join("ligA.params"));
        assert_eq!(
            stage_ligand_file(&pdb, "ligA").unwrap(),
            dir.path().join("ligA_conformers.pdb")
        );
        assert!(params.exists());
        assert_eq!(fs::read_to_string(dir.path().join("ligA.params")).unwrap(), "NAME 002\n");

        // Only the leading code is replaced.
        let repeated = dir.path().join("0A0_0A0_run2.pdb");
        fs::write(&repeated, "HETATM\n").unwrap();
        assert_eq!(
            stage_ligand_file(&repeated, "ligB").unwrap(),
            dir.path().join("ligB_0A0_run2.pdb")
        );
        fs::remove_file(dir.path().join("ligB_0A0_run2.pdb")).unwrap();
        fs::remove_file(&repeated).unwrap();

        let (found_pdb, found_params) = ligand_params_files(dir.path()).unwrap();
        assert_eq!(found_pdb, pdb);
        assert_eq!(found_params, params);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dock_ligand_with_fake_darc() {
        use crate::runner::fake_tool;
        use darcflow_common::RosettaConfig;

        let home = tempdir().unwrap();
        let paths = RosettaPaths::from_config(&RosettaConfig {
            home: home.path().to_path_buf(),
            ..RosettaConfig::default()
        });
        fs::create_dir_all(&paths.binaries).unwrap();
        // Names the pose after the ligand file, as -use_ligand_filename does.
        fake_tool(
            &paths.binaries,
            "DARC.static.linuxgccrelease",
            r#"lig=$(basename "$4" .pdb)
touch "mini_LIGAND_${lig}.pdb" "LIGAND_${lig}.pdb""#,
        );

        let data = tempdir().unwrap();
        let protein = data.path().join("4erf.pdb");
        fs::write(&protein, "ATOM\n").unwrap();
        let params_dir = data.path().join("params/ligA");
        fs::create_dir_all(&params_dir).unwrap();
        fs::write(params_dir.join("002.params"), "NAME 002\n").unwrap();
        fs::write(params_dir.join("002_conformers.pdb"), "HETATM\n").unwrap();
        let ray_dir = data.path().join("pocket_1");
        fs::create_dir_all(&ray_dir).unwrap();
        fs::write(ray_dir.join("ray_4erf_61.txt"), "").unwrap();

        let request = DockRequest {
            protein,
            ligand: "ligA".into(),
            params_dir,
            ray_dir: ray_dir.clone(),
            esp_grid: None,
            search_conformers: true,
            minimize_output: true,
        };
        let result = dock_ligand(&ToolRunner::new(), &paths, &RunConfig::default(), &request)
            .await
            .unwrap();
        assert_eq!(result.poses, vec![ray_dir.join("mini_LIGAND_ligA_conformers.pdb")]);
    }
}
