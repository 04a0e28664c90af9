//! Configuration for the darcflow tools.
//!
//! Loaded from `darcflow.toml` in the current directory, or from the path in
//! the `DARCFLOW_CONFIG` env var. Files ending in `.yaml`/`.yml` are read as
//! YAML. Every section falls back to its defaults, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{DarcError, Result};

pub const CONFIG_ENV_VAR: &str = "DARCFLOW_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "darcflow.toml";

/// Complete tool configuration, passed explicitly into each step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DarcflowConfig {
    #[serde(default)]
    pub rosetta: RosettaConfig,

    #[serde(default)]
    pub openbabel: OpenBabelConfig,

    #[serde(default)]
    pub autogrid: AutoGridConfig,

    #[serde(default)]
    pub run: RunConfig,

    #[serde(default)]
    pub params: ParamsConfig,

    #[serde(default)]
    pub ligands: LigandsConfig,
}

// ── Rosetta ───────────────────────────────────────────────────────────────────

/// Location of the Rosetta installation and its layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosettaConfig {
    /// Root of the Rosetta bundle (ROSETTA_HOME)
    #[serde(default = "default_rosetta_home")]
    pub home: PathBuf,

    #[serde(default = "default_binaries_path")]
    pub binaries_path: PathBuf,

    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory holding molfile_to_params.py and friends
    #[serde(default = "default_params_scripts_path")]
    pub params_scripts_path: PathBuf,

    /// Interpreter for `.py` scripts. When unset the script is executed directly.
    #[serde(default)]
    pub python: Option<PathBuf>,

    #[serde(default = "default_build_suffix")]
    pub build_suffix: String,

    #[serde(default = "default_gpu_build_suffix")]
    pub gpu_build_suffix: String,
}

fn default_rosetta_home() -> PathBuf {
    std::env::var_os("ROSETTA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("rosetta"))
}
fn default_binaries_path() -> PathBuf { PathBuf::from("main/source/bin") }
fn default_database_path() -> PathBuf { PathBuf::from("main/database") }
fn default_params_scripts_path() -> PathBuf { PathBuf::from("main/source/scripts/python/public") }
fn default_build_suffix() -> String { "static.linuxgccrelease".to_string() }
fn default_gpu_build_suffix() -> String { "opencl.linuxgccrelease".to_string() }

impl Default for RosettaConfig {
    fn default() -> Self {
        Self {
            home: default_rosetta_home(),
            binaries_path: default_binaries_path(),
            database_path: default_database_path(),
            params_scripts_path: default_params_scripts_path(),
            python: None,
            build_suffix: default_build_suffix(),
            gpu_build_suffix: default_gpu_build_suffix(),
        }
    }
}

impl RosettaConfig {
    pub fn database_dir(&self) -> PathBuf {
        self.home.join(&self.database_path)
    }

    pub fn binaries_dir(&self) -> PathBuf {
        self.home.join(&self.binaries_path)
    }

    pub fn params_scripts_dir(&self) -> PathBuf {
        self.home.join(&self.params_scripts_path)
    }
}

// ── Other programs ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenBabelConfig {
    #[serde(default = "default_obabel")]
    pub executable: PathBuf,
}

fn default_obabel() -> PathBuf { PathBuf::from("obabel") }

impl Default for OpenBabelConfig {
    fn default() -> Self {
        Self { executable: default_obabel() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoGridConfig {
    #[serde(default = "default_autogrid")]
    pub executable: PathBuf,

    /// Distance between grid points in Å
    #[serde(default = "default_spacing")]
    pub default_spacing: f64,
}

fn default_autogrid() -> PathBuf { PathBuf::from("autogrid4") }
fn default_spacing() -> f64 { 0.375 }

impl Default for AutoGridConfig {
    fn default() -> Self {
        Self {
            executable: default_autogrid(),
            default_spacing: default_spacing(),
        }
    }
}

// ── Run options ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Pass `-run:constant_seed -run:jran <seed>` for reproducible runs
    #[serde(default)]
    pub constant_seed: bool,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// GPU device index; `None` or 0 runs the CPU build
    #[serde(default)]
    pub gpu: Option<u32>,
}

fn default_seed() -> u64 { 1_111_111 }

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            constant_seed: false,
            seed: default_seed(),
            gpu: None,
        }
    }
}

impl RunConfig {
    /// The GPU device to use, if any.
    pub fn gpu_device(&self) -> Option<u32> {
        self.gpu.filter(|&id| id > 0)
    }

    /// Seed flags shared by every Rosetta program.
    pub fn seed_args(&self) -> Vec<String> {
        if self.constant_seed {
            vec![
                "-run:constant_seed".to_string(),
                "-run:jran".to_string(),
                self.seed.to_string(),
            ]
        } else {
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamsConfig {
    /// File with extra ligand codes to keep out of the enumeration, one per line
    #[serde(default)]
    pub exclusion_list: Option<PathBuf>,

    #[serde(default = "default_output_dir_name")]
    pub output_dir_name: String,
}

fn default_output_dir_name() -> String { "params".to_string() }

impl Default for ParamsConfig {
    fn default() -> Self {
        Self {
            exclusion_list: None,
            output_dir_name: default_output_dir_name(),
        }
    }
}

/// Defaults for ligand preparation with OpenBabel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LigandsConfig {
    /// OpenBabel `--partialcharge` method
    #[serde(default = "default_charge_method")]
    pub charge_method: String,

    /// Protonate for this pH instead of adding every hydrogen
    #[serde(default)]
    pub ph: Option<f64>,

    /// Upper bound on conformers per molecule
    #[serde(default = "default_conformers")]
    pub conformers: u32,

    /// Confab RMSD cutoff in Å
    #[serde(default = "default_rmsd_cutoff")]
    pub rmsd_cutoff: f64,
}

fn default_charge_method() -> String { "gasteiger".to_string() }
fn default_conformers() -> u32 { 200 }
fn default_rmsd_cutoff() -> f64 { 0.5 }

impl Default for LigandsConfig {
    fn default() -> Self {
        Self {
            charge_method: default_charge_method(),
            ph: None,
            conformers: default_conformers(),
            rmsd_cutoff: default_rmsd_cutoff(),
        }
    }
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl DarcflowConfig {
    /// Load from `DARCFLOW_CONFIG` or `darcflow.toml`, falling back to defaults
    /// when neither exists.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let path = Path::new(&path);

        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_path(path)
    }

    /// Load from an explicit file; the format follows the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DarcError::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
            _ => toml::from_str(&content)?,
        };
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| DarcError::Config(e.to_string()))
    }

    /// Problems with the installation. An empty list means the setup looks usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if !self.rosetta.home.exists() {
            problems.push(format!(
                "Rosetta home does not exist: {} (set rosetta.home or ROSETTA_HOME)",
                self.rosetta.home.display()
            ));
            return problems;
        }

        let database = self.rosetta.database_dir();
        if !database.exists() {
            problems.push(format!("Rosetta database not found: {}", database.display()));
        }

        let scripts = self.rosetta.params_scripts_dir();
        if !scripts.join("molfile_to_params.py").exists() {
            problems.push(format!("molfile_to_params.py not found in {}", scripts.display()));
        }

        if self.run.constant_seed && self.run.seed == 0 {
            problems.push("run.seed must be non-zero when constant_seed is set".to_string());
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: DarcflowConfig = toml::from_str("").unwrap();
        assert_eq!(config.rosetta.binaries_path, PathBuf::from("main/source/bin"));
        assert_eq!(config.params.output_dir_name, "params");
        assert_eq!(config.run.seed, 1_111_111);
        assert!((config.autogrid.default_spacing - 0.375).abs() < 1e-12);
        assert_eq!(config.ligands.charge_method, "gasteiger");
        assert_eq!(config.ligands.conformers, 200);
        assert!(config.ligands.ph.is_none());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config: DarcflowConfig = toml::from_str(
            r#"
            [rosetta]
            home = "/opt/rosetta"

            [run]
            constant_seed = true
            seed = 42
            gpu = 1
            "#,
        )
        .unwrap();
        assert_eq!(config.rosetta.database_dir(), PathBuf::from("/opt/rosetta/main/database"));
        assert_eq!(config.run.seed_args(), vec!["-run:constant_seed", "-run:jran", "42"]);
        assert_eq!(config.run.gpu_device(), Some(1));
    }

    #[test]
    fn test_gpu_zero_means_cpu() {
        let run = RunConfig { gpu: Some(0), ..Default::default() };
        assert_eq!(run.gpu_device(), None);
        assert!(run.seed_args().is_empty());
    }

    #[test]
    fn test_yaml_by_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("darcflow.yaml");
        std::fs::write(&path, "openbabel:\n  executable: /usr/local/bin/obabel\n").unwrap();

        let config = DarcflowConfig::from_path(&path).unwrap();
        assert_eq!(config.openbabel.executable, PathBuf::from("/usr/local/bin/obabel"));
    }

    #[test]
    fn test_validate_reports_missing_home() {
        let mut config = DarcflowConfig::default();
        config.rosetta.home = PathBuf::from("/no/such/rosetta");
        let problems = config.validate();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("/no/such/rosetta"));
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = DarcflowConfig::default();
        let text = config.to_toml().unwrap();
        let parsed: DarcflowConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.rosetta.build_suffix, config.rosetta.build_suffix);
    }
}
